//! Persisted chain preference
//!
//! Only the selected chain survives a restart. The file keeps the
//! `{"state": {...}, "version": N}` envelope so older and newer builds can
//! share it.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::chains::ChainId;

/// Current preference file format version
const PREFERENCES_VERSION: u32 = 0;

/// Preference file name inside the config directory
pub const PREFERENCES_FILE: &str = "chain-activity-storage.json";

/// The persisted subset of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSelection {
    pub selected_chain: ChainId,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    state: ChainSelection,
    version: u32,
}

/// Key-value persistence of the chain preference.
pub trait PreferenceStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<ChainSelection>>;

    fn save(&self, selection: &ChainSelection) -> Result<()>;
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> Result<Option<ChainSelection>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| anyhow!("Failed to read preferences file: {}", e))?;

        let envelope: Envelope = serde_json::from_str(&json)
            .map_err(|e| anyhow!("Failed to parse preferences file: {}", e))?;

        Ok(Some(envelope.state))
    }

    fn save(&self, selection: &ChainSelection) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(&Envelope {
            state: *selection,
            version: PREFERENCES_VERSION,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)?;
            use std::io::Write;
            file.write_all(json.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, json)?;
        }

        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    value: Mutex<Option<ChainSelection>>,
    saves: Mutex<u32>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(chain: ChainId) -> Self {
        Self {
            value: Mutex::new(Some(ChainSelection {
                selected_chain: chain,
            })),
            saves: Mutex::new(0),
        }
    }

    pub fn current(&self) -> Option<ChainSelection> {
        *self.value.lock()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> u32 {
        *self.saves.lock()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Option<ChainSelection>> {
        Ok(self.current())
    }

    fn save(&self, selection: &ChainSelection) -> Result<()> {
        *self.value.lock() = Some(*selection);
        *self.saves.lock() += 1;
        Ok(())
    }
}
