//! Error types for symbol resolution and process launching

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while resolving a classpath or supervising a child process
#[derive(Debug, Error)]
pub enum LaunchError {
    /// One or more required symbols were found in no archive
    #[error(
        "The following symbol(s) couldn't be resolved: {}. Searched the following archives: {}",
        .symbols.join(", "),
        display_paths(.searched)
    )]
    Unresolved {
        /// Every symbol that had no hit
        symbols: Vec<String>,
        /// Every archive that was probed, user archives first
        searched: Vec<PathBuf>,
    },

    /// The child process could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        /// Executable that failed to start
        program: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Waiting for the child was interrupted and the child was killed
    #[error("Interrupted while waiting for {program}; the process was terminated")]
    Interrupted {
        /// Executable that was terminated
        program: String,
    },

    /// An archive could not be indexed
    #[error("Cannot read archive {}: {reason}", .path.display())]
    Archive {
        /// Offending archive
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// I/O failure with context
    #[error("{context}: {source}")]
    Io {
        /// Operation that failed
        context: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result alias for launch operations
pub type LaunchResult<T> = Result<T, LaunchError>;

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(none)".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
