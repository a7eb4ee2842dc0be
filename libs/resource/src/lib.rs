//! Apply a machine configuration to a node as a managed record.
//!
//! A record binds one configuration document, plus an ordered list of
//! patches, to one node. Its lifecycle has four parts:
//!
//! - **Planning** ([`plan`]): computes the final document deterministically,
//!   before any network call.
//! - **Apply** ([`apply`]): pushes the planned document to the node inside a
//!   deadline-bounded retry loop.
//! - **Transport** ([`transport`]): mTLS connections to the machine API.
//! - **State upgrades** ([`upgrade`]): migrates state persisted by older
//!   schema versions.
//!
//! [`MachineConfigurationApplyResource`] ties them together behind the
//! host-facing lifecycle.

pub mod apply;
pub mod error;
pub mod model;
pub mod plan;
pub mod resource;
pub mod transport;
pub mod upgrade;
pub mod value;

pub use apply::ApplyOrchestrator;
pub use error::{Diagnostic, ResourceError, Severity};
pub use model::{
    ApplyMode, ClientConfiguration, Record, Sensitive, Timeouts, DEFAULT_CREATE_TIMEOUT,
    DEFAULT_UPDATE_TIMEOUT, RECORD_ID,
};
pub use plan::{DeferReason, PlanStatus};
pub use resource::MachineConfigurationApplyResource;
pub use transport::{
    ApplyReport, ClientCredentials, ConnectionFactory, ConnectionTarget, GrpcConnectionFactory,
    MachineApi, NodeReport,
};
pub use upgrade::{PersistedState, UpgradeChain, UpgradeError, CURRENT_SCHEMA_VERSION};
pub use value::AttrValue;
