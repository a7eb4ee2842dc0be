//! CLI commands.

mod apply;
mod destroy;
mod plan;
mod state;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use machinecfg_resource::{GrpcConnectionFactory, MachineConfigurationApplyResource, Record};
use tracing::info;

use crate::config::{default_state_path, DEFAULT_RESOURCE_FILE};
use crate::state::StateStore;

/// Provider prefix used for the record's type name.
const PROVIDER: &str = "talos";

/// mcfg - apply machine configuration to a node.
#[derive(Debug, Parser)]
#[command(name = "mcfg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Resource file (TOML).
    #[arg(short, long, global = true, env = "MCFG_FILE", default_value = DEFAULT_RESOURCE_FILE)]
    file: PathBuf,

    /// State file. Defaults to `<file>.state.json`.
    #[arg(long, global = true, env = "MCFG_STATE")]
    state: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show what apply would change.
    Plan(plan::PlanCommand),

    /// Resolve and push the configuration to the node.
    Apply(apply::ApplyCommand),

    /// Forget the record. The node is left unchanged.
    Destroy(destroy::DestroyCommand),

    /// Inspect or upgrade the state file.
    State(state::StateCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let state_path = self
            .state
            .clone()
            .unwrap_or_else(|| default_state_path(&self.file));

        let ctx = CommandContext {
            resource_file: self.file,
            state: StateStore::new(state_path),
            resource: MachineConfigurationApplyResource::new(
                PROVIDER,
                GrpcConnectionFactory::default(),
            ),
        };

        match self.command {
            Commands::Plan(cmd) => cmd.run(ctx).await,
            Commands::Apply(cmd) => cmd.run(ctx).await,
            Commands::Destroy(cmd) => cmd.run(ctx).await,
            Commands::State(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("mcfg {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub resource_file: PathBuf,
    pub state: StateStore,
    pub resource: MachineConfigurationApplyResource<GrpcConnectionFactory>,
}

impl CommandContext {
    /// Load prior state, upgrading older schema versions in memory.
    pub fn load_state(&self) -> Result<Option<Record>> {
        let Some(persisted) = self.state.load()? else {
            return Ok(None);
        };

        let version = persisted.schema_version;
        let record = self.resource.upgrade_state(persisted)?;
        if version != self.resource.schema_version() {
            info!(
                from = version,
                to = self.resource.schema_version(),
                path = %self.state.path().display(),
                "Upgraded state in memory"
            );
        }

        Ok(Some(record))
    }
}
