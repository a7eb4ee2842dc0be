//! Host-facing lifecycle of the machine configuration apply record.

use machinecfg_reconcile::BackoffPolicy;
use tracing::{debug, info};

use crate::apply::ApplyOrchestrator;
use crate::error::ResourceError;
use crate::model::{Record, DEFAULT_CREATE_TIMEOUT, DEFAULT_UPDATE_TIMEOUT};
use crate::plan::{self, PlanStatus};
use crate::transport::ConnectionFactory;
use crate::upgrade::{PersistedState, UpgradeChain};
use crate::value::AttrValue;

/// Applies a machine configuration document to a single node.
///
/// The host is expected to serialize operations per record.
pub struct MachineConfigurationApplyResource<F> {
    provider: String,
    orchestrator: ApplyOrchestrator<F>,
    upgrades: UpgradeChain,
}

impl<F: ConnectionFactory> MachineConfigurationApplyResource<F> {
    pub fn new(provider: impl Into<String>, factory: F) -> Self {
        Self {
            provider: provider.into(),
            orchestrator: ApplyOrchestrator::new(factory),
            upgrades: UpgradeChain::standard(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.orchestrator = self.orchestrator.with_backoff(backoff);
        self
    }

    pub fn type_name(&self) -> String {
        Record::type_name(&self.provider)
    }

    pub fn schema_version(&self) -> u64 {
        self.upgrades.current_version()
    }

    /// Resolve the proposed plan.
    ///
    /// Returns `None` for a destroy plan, which needs no resolution.
    pub fn modify_plan(
        &self,
        config: &Record,
        prior: Option<&Record>,
        plan: Option<&mut Record>,
    ) -> Result<Option<PlanStatus>, ResourceError> {
        let Some(plan) = plan else {
            debug!("Destroy plan, nothing to resolve");
            return Ok(None);
        };

        plan::modify_plan(config, prior, plan).map(Some)
    }

    /// First apply of a record.
    pub async fn create(&self, plan: &Record) -> Result<Record, ResourceError> {
        let timeout = plan.timeouts.create(DEFAULT_CREATE_TIMEOUT)?;
        info!(timeout = ?timeout, "Creating machine configuration apply");
        self.orchestrator.apply(plan, timeout).await
    }

    /// Re-apply after inputs changed.
    pub async fn update(&self, plan: &Record, prior: &Record) -> Result<Record, ResourceError> {
        let timeout = plan.timeouts.update(DEFAULT_UPDATE_TIMEOUT)?;
        info!(timeout = ?timeout, "Updating machine configuration apply");

        let mut plan = plan.clone();
        if !plan.id.is_known() {
            plan.id = prior.id.clone();
        }
        if plan.id.is_unknown() {
            plan.id = AttrValue::Null;
        }

        self.orchestrator.apply(&plan, timeout).await
    }

    /// There is no read-back from the node; state is returned as stored.
    pub fn read(&self, state: Record) -> Record {
        state
    }

    /// Removing the record leaves the node untouched.
    pub fn delete(&self, state: &Record) {
        info!(
            node = state.node.known().map(String::as_str).unwrap_or(""),
            "Removing machine configuration apply from state; node is left unchanged"
        );
    }

    /// Bring persisted state up to the current schema.
    pub fn upgrade_state(&self, state: PersistedState) -> Result<Record, ResourceError> {
        Ok(self.upgrades.upgrade_state(state)?)
    }
}
