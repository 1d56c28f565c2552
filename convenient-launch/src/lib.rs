//! Minimal-classpath symbol resolution and supervised child processes
//!
//! Provides:
//! - Per-archive isolated indexes (directories, tar, tar.gz, zip/jar)
//! - Two-tier symbol resolution (user archives, then system archives)
//! - A process launcher that drains the child's streams on dedicated threads
//! - Cooperative cancellation of a running child
//!
//! # Example
//!
//! ```no_run
//! use convenient_launch::{CancelToken, ProcessLauncher, Runtime};
//!
//! let launcher = ProcessLauncher::new(Runtime::jvm(), "org.example.Main")
//!     .require("org.example.Main")
//!     .candidate("lib/example.jar")
//!     .app_arg("--verbose");
//!
//! let exit_code = launcher.run(&CancelToken::new())?;
//! assert_eq!(exit_code, 0);
//! # Ok::<(), convenient_launch::LaunchError>(())
//! ```

pub mod archive;
pub mod cancel;
pub mod error;
pub mod launcher;
pub mod pump;
pub mod resolver;
pub mod symbol;

pub use archive::{ArchiveIndex, ArchiveKind};
pub use cancel::CancelToken;
pub use error::{LaunchError, LaunchResult};
pub use launcher::{ProcessLauncher, Runtime, StdinMode};
pub use pump::{OutputSink, SharedBuffer};
pub use resolver::{Resolution, SymbolResolver, SystemArchives};
pub use symbol::SymbolLayout;

/// Environment variable naming the directory of the tool's own archives
pub const SYSTEM_ARCHIVES_ENV: &str = "BOB_LIB";

/// Platform separator for classpath strings
#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';

/// Platform separator for classpath strings
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';
