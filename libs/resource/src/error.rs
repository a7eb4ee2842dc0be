//! Resource errors and host-facing diagnostics.

use std::fmt;
use std::time::Duration;

use machinecfg_patch::PatchError;
use thiserror::Error;

use crate::upgrade::UpgradeError;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("invalid apply_mode {0:?}: expected one of auto, reboot, no_reboot, staged")]
    InvalidApplyMode(String),

    #[error("attribute {0} is computed and cannot be set")]
    ComputedAttributeSet(&'static str),

    #[error("invalid client configuration: {0}")]
    Credentials(String),

    #[error("invalid timeout {value:?}: {reason}")]
    InvalidTimeout { value: String, reason: String },

    #[error("missing required attribute {0}")]
    MissingAttribute(&'static str),

    /// The node refused the request; retrying cannot help.
    #[error("configuration rejected by node: {0}")]
    Rejected(String),

    #[error("timed out after {attempts} attempt(s) in {elapsed:?}{}", last_suffix(.last))]
    DeadlineExceeded {
        elapsed: Duration,
        attempts: u32,
        last: Option<String>,
    },

    #[error(transparent)]
    Upgrade(#[from] UpgradeError),
}

fn last_suffix(last: &Option<String>) -> String {
    match last {
        Some(last) => format!(": last error: {last}"),
        None => String::new(),
    }
}

impl ResourceError {
    /// Returns true if the error stems from the caller's configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Patch(_)
                | Self::InvalidApplyMode(_)
                | Self::ComputedAttributeSet(_)
                | Self::Credentials(_)
                | Self::InvalidTimeout { .. }
                | Self::MissingAttribute(_)
        )
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    /// Short, stable summary shown to the operator.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Patch(e) if e.is_load_error() => "Error loading config patches",
            Self::Patch(PatchError::Serialize(_)) => "Error converting config to bytes",
            Self::Patch(_) => "Error applying config patches",
            Self::InvalidApplyMode(_) => "Invalid apply mode",
            Self::ComputedAttributeSet(_) => "Invalid attribute value",
            Self::Credentials(_) => "Error converting config to talos client config",
            Self::InvalidTimeout { .. } => "Invalid timeout",
            Self::MissingAttribute(_) => "Missing required attribute",
            Self::Rejected(_) | Self::DeadlineExceeded { .. } => "Error applying configuration",
            Self::Upgrade(_) => "Error upgrading state",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// A message for the host to show the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
        }
    }
}

impl From<&ResourceError> for Diagnostic {
    fn from(err: &ResourceError) -> Self {
        Self::error(err.summary(), err.to_string())
    }
}

impl From<ResourceError> for Diagnostic {
    fn from(err: ResourceError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.summary, self.detail)
    }
}
