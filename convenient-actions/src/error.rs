//! Error types for action graph evaluation

use crate::compiler::{Diagnostic, Severity};
use convenient_launch::LaunchError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures raised while configuring or processing actions
#[derive(Debug, Error)]
pub enum ActionError {
    /// Builder misuse: reconfiguration after processing or conflicting sources
    #[error("{action}: {message}")]
    State {
        /// Node kind
        action: &'static str,
        /// What was wrong
        message: String,
    },

    /// Requested behavior has no implementation
    #[error("{0} isn't supported yet")]
    Unsupported(String),

    /// A source group was looked up in the cache but never compiled
    #[error("Path {0} was not declared as a source directory.")]
    NotCompiled(String),

    /// A declared input directory does not exist
    #[error("Source directory {} doesn't exist", .0.display())]
    MissingSource(PathBuf),

    /// The compilation service reported errors
    #[error(
        "Compilation of {} failed with {} error(s)",
        .group.display(),
        .diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
    )]
    CompilationFailed {
        /// Source group that failed
        group: PathBuf,
        /// Every diagnostic the compiler reported
        diagnostics: Vec<Diagnostic>,
    },

    /// The compilation service itself could not be run
    #[error("Compiler unavailable: {0}")]
    CompilerUnavailable(String),

    /// I/O failure with operation and path
    #[error("{context} {}: {source}", .path.display())]
    Io {
        /// Operation that failed
        context: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Classpath resolution or child process failure
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// A child process exited unsuccessfully
    #[error("{action} failed: child process exited with code {code}")]
    ProcessFailed {
        /// Node kind
        action: &'static str,
        /// Child exit code
        code: i32,
    },

    /// A results file could not be understood
    #[error("Malformed test report: {0}")]
    MalformedReport(String),

    /// A node was reached again while it was being processed
    #[error("Dependency cycle: {0} depends on itself")]
    Cycle(&'static str),

    /// The process-wide cache slot is already taken
    #[error("A compiled unit cache is already installed")]
    CacheAlreadyInstalled,

    /// Cache base directory is missing or unreadable
    #[error("{} is not an existing, readable directory", .0.display())]
    UnreadableDirectory(PathBuf),

    /// A directory was expected but a file was found
    #[error("Target \"{}\" was found, but is a file, not a directory.", .0.display())]
    NotADirectory(PathBuf),

    /// An artifact was requested from a node that produced none
    #[error("{0} produced no artifact")]
    NothingProduced(&'static str),

    /// Internal consistency violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    pub(crate) fn state(action: &'static str, message: impl Into<String>) -> Self {
        Self::State {
            action,
            message: message.into(),
        }
    }

    pub(crate) fn io(context: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this is a defect rather than a user mistake
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

/// Result alias for action operations
pub type ActionResult<T> = Result<T, ActionError>;
