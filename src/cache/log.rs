//! Durable storage for the full credential set.
//!
//! The log is a single pretty-printed JSON array. Every write produces a
//! complete new file next to the live one and renames it into place, so a
//! crash mid-write leaves either the old or the new set on disk, never a
//! truncated file.

use super::record::CredentialRecord;
use crate::error::{Error, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// How a corrupt log is handled at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Warn, move the corrupt file aside and start empty.
    #[default]
    Recover,
    /// Fail startup with [`Error::StorageCorrupt`].
    Strict,
}

/// Outcome of loading the log at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No log file existed.
    Missing,
    /// Log parsed successfully.
    Loaded,
    /// Log was unparsable; the store starts empty.
    Recovered {
        /// Parse error that triggered recovery.
        reason: String,
        /// Where the corrupt file was moved, if the move succeeded.
        quarantined: Option<PathBuf>,
    },
}

/// Crash-consistent JSON file holding every credential record.
#[derive(Debug, Clone)]
pub struct PersistentLog {
    path: PathBuf,
    mode: LoadMode,
}

impl PersistentLog {
    /// Create a log backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: LoadMode::default(),
        }
    }

    /// Set how corruption is handled at load time.
    #[must_use]
    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Path of the live log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, or if it is
    /// corrupt and the log is in [`LoadMode::Strict`].
    pub fn load_all(&self) -> Result<(Vec<CredentialRecord>, LoadStatus)> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No credential log at {}, starting empty", self.path.display());
                return Ok((Vec::new(), LoadStatus::Missing));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        match serde_json::from_slice::<Vec<CredentialRecord>>(&content) {
            Ok(records) => {
                info!(
                    "Loaded {} credential records from {}",
                    records.len(),
                    self.path.display()
                );
                Ok((records, LoadStatus::Loaded))
            }
            Err(e) if self.mode == LoadMode::Strict => Err(Error::StorageCorrupt(format!(
                "{}: {e}",
                self.path.display()
            ))),
            Err(e) => {
                let reason = e.to_string();
                let quarantined = self.quarantine();
                warn!(
                    "Could not parse credential log {} ({}), starting fresh{}",
                    self.path.display(),
                    reason,
                    quarantined
                        .as_ref()
                        .map(|p| format!("; corrupt copy kept at {}", p.display()))
                        .unwrap_or_default()
                );
                Ok((Vec::new(), LoadStatus::Recovered { reason, quarantined }))
            }
        }
    }

    /// Durably write the complete record set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWriteFailed`] if the temporary file cannot be
    /// written or renamed over the live log. The live log is left unchanged.
    pub fn persist_all<'a, I>(&self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a CredentialRecord>,
    {
        let records: Vec<&CredentialRecord> = records.into_iter().collect();
        let bytes = serde_json::to_vec_pretty(&records)?;
        self.atomic_write(&bytes).map_err(|source| Error::StorageWriteFailed {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            "Persisted {} credential records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    fn atomic_write(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.as_file_mut().write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Move a corrupt log aside so the next write does not destroy it.
    fn quarantine(&self) -> Option<PathBuf> {
        let mut name = self.path.file_name()?.to_os_string();
        name.push(format!(".corrupt-{}", chrono::Utc::now().timestamp()));
        let target = self.path.with_file_name(name);
        match fs::rename(&self.path, &target) {
            Ok(()) => Some(target),
            Err(e) => {
                warn!("Failed to move corrupt log aside: {}", e);
                None
            }
        }
    }
}
