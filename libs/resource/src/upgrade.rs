//! Versioned state and schema upgrades.
//!
//! State is persisted as `{ "schema_version": N, "attributes": {...} }`.
//! Upgraders are keyed by the version they upgrade *from* and run in order
//! until the current version is reached.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{ApplyMode, Record, Sensitive, Timeouts, RECORD_ID};
use crate::value::AttrValue;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("state schema version {version} is newer than supported version {current}")]
    UnsupportedVersion { version: u64, current: u64 },

    #[error("no upgrader registered for schema version {0}")]
    MissingUpgrader(u64),

    #[error("failed to decode schema v{version} state: {message}")]
    Decode { version: u64, message: String },

    #[error("failed to encode state: {0}")]
    Encode(String),
}

/// Persisted record envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub schema_version: u64,
    pub attributes: Value,
}

impl PersistedState {
    /// Wrap a record at the current schema version.
    pub fn from_record(record: &Record) -> Result<Self, UpgradeError> {
        let attributes =
            serde_json::to_value(record).map_err(|e| UpgradeError::Encode(e.to_string()))?;
        Ok(Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            attributes,
        })
    }

    /// Decode a record already at the current schema version.
    pub fn into_record(self) -> Result<Record, UpgradeError> {
        if self.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(UpgradeError::Decode {
                version: self.schema_version,
                message: format!("expected schema version {CURRENT_SCHEMA_VERSION}"),
            });
        }
        decode(self.schema_version, self.attributes)
    }
}

/// Converts state from one schema version to the next.
pub trait StateUpgrader: Send + Sync {
    fn upgrade(&self, prior: Value) -> Result<Value, UpgradeError>;
}

pub struct UpgradeChain {
    current: u64,
    upgraders: BTreeMap<u64, Box<dyn StateUpgrader>>,
}

impl UpgradeChain {
    pub fn new(current: u64) -> Self {
        Self {
            current,
            upgraders: BTreeMap::new(),
        }
    }

    /// Register the upgrader from `from` to `from + 1`.
    pub fn register(mut self, from: u64, upgrader: impl StateUpgrader + 'static) -> Self {
        self.upgraders.insert(from, Box::new(upgrader));
        self
    }

    /// Every upgrade this build knows about.
    pub fn standard() -> Self {
        Self::new(CURRENT_SCHEMA_VERSION).register(0, V0ToV1)
    }

    pub fn current_version(&self) -> u64 {
        self.current
    }

    /// Upgrade raw attributes from `version` to the current version.
    pub fn upgrade(&self, version: u64, attributes: Value) -> Result<Value, UpgradeError> {
        if version > self.current {
            return Err(UpgradeError::UnsupportedVersion {
                version,
                current: self.current,
            });
        }

        let mut attributes = attributes;
        for from in version..self.current {
            let upgrader = self
                .upgraders
                .get(&from)
                .ok_or(UpgradeError::MissingUpgrader(from))?;
            attributes = upgrader.upgrade(attributes)?;
            info!(from, to = from + 1, "Upgraded state schema");
        }

        Ok(attributes)
    }

    /// Upgrade a persisted envelope and decode the record.
    pub fn upgrade_state(&self, state: PersistedState) -> Result<Record, UpgradeError> {
        let attributes = self.upgrade(state.schema_version, state.attributes)?;
        decode(self.current, attributes)
    }
}

/// Upgrade raw attributes at `version` with the standard chain.
pub fn upgrade_to_current(version: u64, attributes: Value) -> Result<Record, UpgradeError> {
    UpgradeChain::standard().upgrade_state(PersistedState {
        schema_version: version,
        attributes,
    })
}

fn decode(version: u64, attributes: Value) -> Result<Record, UpgradeError> {
    serde_json::from_value(attributes).map_err(|e| UpgradeError::Decode {
        version,
        message: e.to_string(),
    })
}

/// Schema v0 attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyRecordV0 {
    pub mode: Option<String>,
    pub node: Option<String>,
    pub endpoint: Option<String>,
    /// Flat client configuration blob; not carried forward.
    pub talos_config: Option<String>,
    pub machine_configuration: Option<String>,
    pub config_patches: Option<Vec<Option<String>>>,
}

impl LegacyRecordV0 {
    /// Map to the v1 record. Every legacy record has a v1 counterpart.
    ///
    /// Client credentials cannot be derived from the legacy blob and are left
    /// null; the next plan supplies them. v0 never validated `mode`, so an
    /// empty or unrecognized mode is dropped to null and the next plan
    /// resolves `apply_mode` from configuration.
    pub fn into_record(self) -> Record {
        let apply_mode = match self.mode.as_deref().map(str::trim) {
            None | Some("") => AttrValue::Null,
            Some(mode) => match mode.to_ascii_lowercase().parse::<ApplyMode>() {
                Ok(mode) => AttrValue::Known(mode),
                Err(_) => {
                    warn!(mode, "Dropping unrecognized legacy apply mode");
                    AttrValue::Null
                }
            },
        };

        Record {
            id: AttrValue::Known(RECORD_ID.to_string()),
            apply_mode,
            node: self.node.into(),
            endpoint: self.endpoint.into(),
            client_configuration: AttrValue::Null,
            machine_configuration_input: self.machine_configuration.map(Sensitive::new).into(),
            machine_configuration: AttrValue::Null,
            config_patches: self
                .config_patches
                .unwrap_or_default()
                .into_iter()
                .map(|patch| AttrValue::Known(patch.unwrap_or_default()))
                .collect(),
            timeouts: Timeouts::default(),
        }
    }
}

struct V0ToV1;

impl StateUpgrader for V0ToV1 {
    fn upgrade(&self, prior: Value) -> Result<Value, UpgradeError> {
        let legacy: LegacyRecordV0 = serde_json::from_value(prior).map_err(|e| {
            UpgradeError::Decode {
                version: 0,
                message: e.to_string(),
            }
        })?;
        let record = legacy.into_record();
        serde_json::to_value(&record).map_err(|e| UpgradeError::Encode(e.to_string()))
    }
}
