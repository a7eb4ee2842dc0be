//! Error types for patch loading and application.

use thiserror::Error;

/// Errors produced while loading or applying configuration patches.
///
/// Every variant is a configuration mistake; none of them are transient.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The patch text could not be parsed into a known patch format.
    #[error("failed to load patch {index}: {message}")]
    Load { index: usize, message: String },

    /// The patch parsed but could not be applied to the current document.
    #[error("failed to apply patch {index}: {message}")]
    Apply { index: usize, message: String },

    /// JSON patches only address a single document.
    #[error(
        "patch {index}: JSON patches are not supported for multi-document machine configuration"
    )]
    MultiDocumentJsonPatch { index: usize },

    /// The base configuration is not a usable YAML document stream.
    #[error("invalid machine configuration: {0}")]
    InvalidBase(String),

    /// The patched document could not be serialized back to YAML.
    #[error("failed to serialize machine configuration: {0}")]
    Serialize(String),
}

impl PatchError {
    /// Index of the offending patch, if the error is tied to one.
    pub fn patch_index(&self) -> Option<usize> {
        match self {
            Self::Load { index, .. }
            | Self::Apply { index, .. }
            | Self::MultiDocumentJsonPatch { index } => Some(*index),
            Self::InvalidBase(_) | Self::Serialize(_) => None,
        }
    }

    /// Returns true if the error came from parsing patch text.
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Load { .. })
    }
}
