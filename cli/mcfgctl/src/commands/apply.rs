//! Apply command.

use anyhow::Result;
use clap::Args;

use crate::output::{print_info, print_plan, print_success, Action};

use super::plan::Planned;
use super::CommandContext;

/// Resolve and push the configuration to the node.
#[derive(Debug, Args)]
pub struct ApplyCommand {
    /// Re-apply even when the plan matches the state.
    #[arg(long)]
    force: bool,
}

impl ApplyCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let planned = Planned::compute(&ctx)?;
        print_plan(
            &ctx.resource.type_name(),
            planned.prior.as_ref(),
            &planned.plan,
        );

        let state = match &planned.prior {
            Some(_) if planned.action == Action::NoOp && !self.force => return Ok(()),
            Some(prior) => ctx.resource.update(&planned.plan, prior).await?,
            None => ctx.resource.create(&planned.plan).await?,
        };

        ctx.state.save(&state)?;
        print_success("Machine configuration applied.");
        print_info(&format!("State written to {}", ctx.state.path().display()));
        Ok(())
    }
}
