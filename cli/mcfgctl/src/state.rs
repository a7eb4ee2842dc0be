//! Local state file.
//!
//! State is a JSON envelope carrying the schema version it was written with.
//! Files may contain credentials, so they are written owner-only.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use machinecfg_resource::{PersistedState, Record};

/// Reads and writes one record's state.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw envelope, if the file exists.
    pub fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state from {}", self.path.display()))?;

        let state = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state from {}", self.path.display()))?;

        Ok(Some(state))
    }

    /// Write `record` at the current schema version.
    pub fn save(&self, record: &Record) -> Result<()> {
        let state = PersistedState::from_record(record)?;
        let contents = serde_json::to_string_pretty(&state)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to write state to {}", self.path.display()))?;
            file.write_all(contents.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write state to {}", self.path.display()))?;
        }

        Ok(())
    }

    /// Delete the state file. Returns false if there was none.
    pub fn remove(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove state {}", self.path.display()))?;
        Ok(true)
    }
}
