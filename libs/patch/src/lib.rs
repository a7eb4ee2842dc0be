//! Machine configuration patching.
//!
//! Applies an ordered list of patches to a base machine configuration:
//!
//! - **Strategic merge patches**: YAML documents merged into the matching
//!   base documents (mappings recurse, sequences append, `$patch: delete`
//!   removes a key or a typed document).
//! - **JSON patches (RFC 6902)**: operation lists, single-document
//!   configurations only.
//!
//! # Invariants
//!
//! - Patches apply strictly in the order given; patch N sees the result of
//!   patch N-1.
//! - Resolution is all-or-nothing: any load or apply failure returns an error
//!   and no document.
//! - Output is deterministic for the same base and patches.

mod config;
mod error;
mod patch;

use tracing::debug;

pub use config::Configuration;
pub use error::PatchError;
pub use patch::Patch;

/// Parse patch texts, keeping their order and indices.
pub fn load_patches<S: AsRef<str>>(texts: &[S]) -> Result<Vec<Patch>, PatchError> {
    texts
        .iter()
        .enumerate()
        .map(|(index, text)| Patch::parse(index, text.as_ref()))
        .collect()
}

/// Apply parsed patches, in order, to a base configuration.
///
/// With no patches the base is returned untouched, so its bytes round-trip
/// verbatim.
pub fn apply(base: &str, patches: &[Patch]) -> Result<Configuration, PatchError> {
    let mut config = Configuration::parse(base)?;

    for (index, patch) in patches.iter().enumerate() {
        patch.apply_to(index, &mut config)?;
    }

    debug!(
        patches = patches.len(),
        documents = config.len(),
        "Applied configuration patches"
    );

    Ok(config)
}

/// Load, apply and serialize in one step.
pub fn resolve<S: AsRef<str>>(base: &str, patches: &[S]) -> Result<Vec<u8>, PatchError> {
    let patches = load_patches(patches)?;
    apply(base, &patches)?.to_bytes()
}
