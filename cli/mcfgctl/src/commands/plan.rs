//! Plan command.

use anyhow::Result;
use clap::Args;
use machinecfg_resource::{AttrValue, PlanStatus, Record};

use crate::config::load_record;
use crate::error::CliError;
use crate::output::{print_plan, Action};

use super::CommandContext;

/// Show what apply would change.
#[derive(Debug, Args)]
pub struct PlanCommand {}

impl PlanCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let planned = Planned::compute(&ctx)?;
        print_plan(
            &ctx.resource.type_name(),
            planned.prior.as_ref(),
            &planned.plan,
        );
        Ok(())
    }
}

/// A resolved plan alongside the state it was computed against.
pub(super) struct Planned {
    pub prior: Option<Record>,
    pub plan: Record,
    pub action: Action,
}

impl Planned {
    pub fn compute(ctx: &CommandContext) -> Result<Self> {
        let config = load_record(&ctx.resource_file)?;
        let prior = ctx.load_state()?;

        let mut plan = Record {
            id: AttrValue::Unknown,
            machine_configuration: AttrValue::Unknown,
            ..config.clone()
        };
        let status = ctx
            .resource
            .modify_plan(&config, prior.as_ref(), Some(&mut plan))?;

        match status {
            Some(PlanStatus::Resolved) | None => {}
            Some(PlanStatus::InputPending) => {
                return Err(CliError::Incomplete("machine_configuration_input".to_string()).into());
            }
            Some(PlanStatus::Deferred(reason)) => {
                return Err(CliError::Incomplete(reason.to_string()).into());
            }
        }

        let action = Action::between(prior.as_ref(), &plan);
        Ok(Self {
            prior,
            plan,
            action,
        })
    }
}
