//! Destroy command.

use anyhow::Result;
use clap::Args;
use machinecfg_resource::Record;

use crate::output::{print_info, print_success};

use super::CommandContext;

/// Forget the record. The node keeps its configuration.
#[derive(Debug, Args)]
pub struct DestroyCommand {}

impl DestroyCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let Some(state) = ctx.load_state()? else {
            print_info("Nothing to destroy.");
            return Ok(());
        };

        let config = Record::default();
        ctx.resource.modify_plan(&config, Some(&state), None)?;
        ctx.resource.delete(&state);
        ctx.state.remove()?;

        print_success("Record removed from state. The node configuration was not changed.");
        Ok(())
    }
}
