//! State commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::error::CliError;
use crate::output::{attribute_rows, print_info, print_success, print_warning};

use super::CommandContext;

/// State commands.
#[derive(Debug, Args)]
pub struct StateCommand {
    #[command(subcommand)]
    command: StateSubcommand,
}

#[derive(Debug, Subcommand)]
enum StateSubcommand {
    /// Show the stored record. Sensitive values are shown as digests.
    Show,

    /// Rewrite the state file at the current schema version.
    Upgrade,
}

impl StateCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            StateSubcommand::Show => show(ctx),
            StateSubcommand::Upgrade => upgrade(ctx),
        }
    }
}

fn show(ctx: CommandContext) -> Result<()> {
    let record = ctx
        .load_state()?
        .ok_or_else(|| CliError::NoState(ctx.state.path().display().to_string()))?;

    let record = ctx.resource.read(record);
    println!("# {}", ctx.resource.type_name());
    for (name, value) in attribute_rows(&record) {
        println!("{name:<30} = {value}");
    }
    Ok(())
}

fn upgrade(ctx: CommandContext) -> Result<()> {
    let persisted = ctx
        .state
        .load()?
        .ok_or_else(|| CliError::NoState(ctx.state.path().display().to_string()))?;

    let from = persisted.schema_version;
    let to = ctx.resource.schema_version();
    if from == to {
        print_info(&format!("State is already at schema version {to}."));
        return Ok(());
    }

    let record = ctx.resource.upgrade_state(persisted)?;
    ctx.state.save(&record)?;

    print_success(&format!("Upgraded state from schema version {from} to {to}."));
    if record.client_configuration.is_null() {
        print_warning(
            "client_configuration could not be carried over; it will be taken from the resource file on the next apply.",
        );
    }
    Ok(())
}
