//! The file passed from the cold bootstrap to its relaunch
//!
//! On disk the handoff is a JSON envelope:
//!
//! ```json
//! { "version": 1, "checksum": "<sha256 of payload>", "payload": { ... } }
//! ```
//!
//! The checksum covers the compact serialization of the payload value, so
//! a truncated or hand-edited file is rejected before anything is installed.

use crate::defaults::HANDOFF_VERSION;
use convenient_actions::CompiledUnitCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tracing::debug;

/// Handoff file failures
#[derive(Debug, Error)]
pub enum HandoffError {
    /// The file could not be read or written
    #[error("{context} {}: {source}", .path.display())]
    Io {
        /// Operation that failed
        context: &'static str,
        /// Handoff file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The file is not a handoff envelope
    #[error("Malformed handoff file {}: {reason}", .path.display())]
    Format {
        /// Handoff file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Written by an incompatible version of the tool
    #[error("Handoff file has version {found}, expected {expected}")]
    Version {
        /// Version in the file
        found: u32,
        /// Version this build understands
        expected: u32,
    },

    /// The payload does not match its checksum
    #[error("Handoff file {} is corrupt: checksum mismatch", .0.display())]
    Checksum(PathBuf),
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    checksum: String,
    payload: serde_json::Value,
}

/// Compiled unit cache plus the classpath needed by the relaunch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapHandoff {
    cache: CompiledUnitCache,
    classpath: Vec<PathBuf>,
}

fn checksum(payload: &serde_json::Value) -> String {
    hex::encode(Sha256::digest(payload.to_string().as_bytes()))
}

fn format_error(path: &Path, error: &serde_json::Error) -> HandoffError {
    HandoffError::Format {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

impl BootstrapHandoff {
    /// Handoff of `cache` and `classpath`
    #[must_use]
    pub fn new(cache: CompiledUnitCache, classpath: Vec<PathBuf>) -> Self {
        Self { cache, classpath }
    }

    /// Compiled unit cache
    #[must_use]
    pub fn cache(&self) -> &CompiledUnitCache {
        &self.cache
    }

    /// Classpath of the relaunch
    #[must_use]
    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    /// Split into cache and classpath
    #[must_use]
    pub fn into_parts(self) -> (CompiledUnitCache, Vec<PathBuf>) {
        (self.cache, self.classpath)
    }

    fn envelope(&self, path: &Path) -> Result<Vec<u8>, HandoffError> {
        let payload = serde_json::to_value(self).map_err(|e| format_error(path, &e))?;
        let envelope = Envelope {
            version: HANDOFF_VERSION,
            checksum: checksum(&payload),
            payload,
        };
        serde_json::to_vec_pretty(&envelope).map_err(|e| format_error(path, &e))
    }

    /// Write to `path` atomically: sibling temp file, fsync, rename
    ///
    /// # Errors
    ///
    /// [`HandoffError::Io`] or [`HandoffError::Format`].
    pub fn write_to(&self, path: &Path) -> Result<(), HandoffError> {
        let data = self.envelope(path)?;
        let io_error = |context: &'static str, source: io::Error| HandoffError::Io {
            context,
            path: path.to_path_buf(),
            source,
        };

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(|e| io_error("Failed to create", e))?;
        file.write_all(&data).map_err(|e| io_error("Failed to write", e))?;
        file.sync_all().map_err(|e| io_error("Failed to fsync", e))?;
        drop(file);
        fs::rename(&temp_path, path).map_err(|e| io_error("Failed to rename into", e))?;

        debug!("Wrote handoff to {}", path.display());
        Ok(())
    }

    /// Write to a fresh temp file that is deleted when the result drops
    ///
    /// # Errors
    ///
    /// See [`write_to`](Self::write_to).
    pub fn persist_temp(&self) -> Result<TempPath, HandoffError> {
        let temp = tempfile::Builder::new()
            .prefix("bob-handoff-")
            .suffix(".json")
            .tempfile()
            .map_err(|source| HandoffError::Io {
                context: "Failed to create",
                path: std::env::temp_dir(),
                source,
            })?
            .into_temp_path();
        self.write_to(&temp)?;
        Ok(temp)
    }

    /// Read and verify the handoff at `path`
    ///
    /// # Errors
    ///
    /// Any [`HandoffError`].
    pub fn read(path: &Path) -> Result<Self, HandoffError> {
        let data = fs::read(path).map_err(|source| HandoffError::Io {
            context: "Failed to read",
            path: path.to_path_buf(),
            source,
        })?;
        let envelope: Envelope = serde_json::from_slice(&data).map_err(|e| format_error(path, &e))?;

        if envelope.version != HANDOFF_VERSION {
            return Err(HandoffError::Version {
                found: envelope.version,
                expected: HANDOFF_VERSION,
            });
        }
        if checksum(&envelope.payload) != envelope.checksum {
            return Err(HandoffError::Checksum(path.to_path_buf()));
        }

        let handoff: Self = serde_json::from_value(envelope.payload).map_err(|e| format_error(path, &e))?;
        debug!(
            "Read handoff from {} ({} classpath entries)",
            path.display(),
            handoff.classpath.len()
        );
        Ok(handoff)
    }
}
