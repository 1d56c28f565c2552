//! Bootstrap error types and their mapping onto the failure taxonomy

use crate::handoff::HandoffError;
use crate::project::ProjectError;
use crate::target::TargetError;
use convenient_actions::{ActionError, Diagnostic};
use convenient_launch::LaunchError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure class, used for reporting and the exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments, descriptor or target
    Configuration,
    /// The compilation service reported errors
    Compilation,
    /// A required symbol could not be resolved
    Resolution,
    /// A node of the action graph failed
    Execution,
    /// A child process could not be run or failed
    Launch,
    /// A defect in the tool itself
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration error",
            Self::Compilation => "compilation failure",
            Self::Resolution => "resolution failure",
            Self::Execution => "build failure",
            Self::Launch => "process failure",
            Self::Internal => "internal error, please report",
        };
        f.write_str(name)
    }
}

/// Errors raised while bootstrapping and running a build
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Invalid command-line usage
    #[error("{0}")]
    Usage(String),

    /// `bob.yml` could not be read or understood
    #[error("Invalid configuration in {}: {reason}", .path.display())]
    Config {
        /// Configuration file
        path: PathBuf,
        /// What was wrong
        reason: String,
    },

    /// The build descriptor does not exist or is not readable
    #[error("Build file {} doesn't exist or is not readable. Are you sure you're in the right directory?", .0.display())]
    DescriptorNotFound(PathBuf),

    /// The project declaration is invalid
    #[error(transparent)]
    Project(#[from] ProjectError),

    /// No usable target
    #[error(transparent)]
    Target(#[from] TargetError),

    /// The handoff file is unusable
    #[error(transparent)]
    Handoff(#[from] HandoffError),

    /// A required source group is missing
    #[error("Source path {} is not an existing, readable directory", .0.display())]
    MissingSourceGroup(PathBuf),

    /// Compiling a source group or the descriptor failed
    #[error("{}", compilation_message(.subject, .diagnostics))]
    Compilation {
        /// Source group or descriptor file
        subject: PathBuf,
        /// Every diagnostic the compiler reported
        diagnostics: Vec<Diagnostic>,
    },

    /// The descriptor unit names no registered descriptor
    #[error("{} didn't contain a valid build descriptor: no descriptor named \"{name}\" is registered", .unit.display())]
    UnknownDescriptor {
        /// Descriptor name
        name: String,
        /// Compiled unit that was loaded
        unit: PathBuf,
    },

    /// The compiled descriptor unit is missing
    #[error("Compiled build descriptor {} was not found", .0.display())]
    UnitMissing(PathBuf),

    /// A target produced no action
    #[error("{descriptor}.{target}() returned no action")]
    NullAction {
        /// Descriptor name
        descriptor: String,
        /// Target name
        target: String,
    },

    /// The action graph failed
    #[error(transparent)]
    Action(#[from] ActionError),

    /// Symbol resolution or child process failure
    #[error(transparent)]
    Launch(#[from] LaunchError),

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

    /// Internal consistency violation
    #[error("{0}")]
    Internal(String),
}

fn compilation_message(subject: &Path, diagnostics: &[Diagnostic]) -> String {
    let mut message = format!("Compilation of {} halted:", subject.display());
    for diagnostic in diagnostics {
        message.push_str("\n  ");
        message.push_str(&diagnostic.to_string());
    }
    message
}

fn launch_kind(error: &LaunchError) -> ErrorKind {
    match error {
        LaunchError::Unresolved { .. } => ErrorKind::Resolution,
        _ => ErrorKind::Launch,
    }
}

impl BootstrapError {
    pub(crate) fn io(context: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Failure class of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_)
            | Self::Config { .. }
            | Self::DescriptorNotFound(_)
            | Self::Project(_)
            | Self::Target(_)
            | Self::Handoff(_)
            | Self::MissingSourceGroup(_)
            | Self::UnknownDescriptor { .. }
            | Self::UnitMissing(_) => ErrorKind::Configuration,
            Self::Compilation { .. } => ErrorKind::Compilation,
            Self::Action(action) => match action {
                ActionError::CompilationFailed { .. } => ErrorKind::Compilation,
                ActionError::Launch(launch) => launch_kind(launch),
                ActionError::ProcessFailed { .. } => ErrorKind::Launch,
                ActionError::Internal(_) => ErrorKind::Internal,
                _ => ErrorKind::Execution,
            },
            Self::Launch(launch) => launch_kind(launch),
            Self::Io { .. } => ErrorKind::Execution,
            Self::NullAction { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether a running child was stopped by Ctrl-C
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Launch(LaunchError::Interrupted { .. })
                | Self::Action(ActionError::Launch(LaunchError::Interrupted { .. }))
        )
    }
}

/// Result alias for bootstrap operations
pub type BootstrapResult<T> = Result<T, BootstrapError>;
