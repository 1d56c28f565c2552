//! Lazy, memoized build action graph
//!
//! Build descriptors return a graph of actions. Nodes are cheap handles to
//! shared state, so one node can feed several parents while its side effect
//! still happens at most once.
//!
//! Node kinds:
//! - [`Compilation`]: source group to compiled units (copied from the
//!   [`CompiledUnitCache`] when the bootstrap already compiled the group)
//! - [`Jar`] and [`War`]: compiled units, sources and web content to one archive
//! - [`Zip`]: heterogeneous entries to one archive
//! - [`TestRun`]: compiled tests executed in an isolated child process
//! - [`Clean`]: removes an output directory
//!
//! # Example
//!
//! ```no_run
//! use convenient_actions::{Action, BuildContext, Jar, Toolchain};
//! # fn compiler() -> std::sync::Arc<dyn convenient_actions::Compiler> { unimplemented!() }
//!
//! let ctx = BuildContext::new(".", Toolchain::new(compiler()));
//! let jar = Jar::new().with_sources()?.to("out/app.jar")?;
//! jar.process(&ctx)?;
//! # Ok::<(), convenient_actions::ActionError>(())
//! ```

pub mod action;
pub mod archive;
pub mod cache;
pub mod clean;
pub mod compilation;
pub mod compiler;
pub mod context;
pub mod defaults;
pub mod error;
pub mod jar;
mod packager;
pub mod report;
pub mod test_run;
pub mod zip;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use action::{Action, ActionRef, FileProducer, PathProducer};
pub use archive::{ArchiveEntry, ArchiveWriter, TarArchiveWriter, entry_name};
pub use cache::{CompiledUnitCache, CompiledUnitCacheBuilder, SourceGroupUnits, group_key};
pub use clean::Clean;
pub use compilation::Compilation;
pub use compiler::{CompileOutcome, CompileRequest, Compiler, Diagnostic, Severity};
pub use context::{BuildContext, TestRunner, Toolchain};
pub use error::{ActionError, ActionResult};
pub use jar::{Jar, War};
pub use report::{TestFailure, TestReport};
pub use test_run::TestRun;
pub use zip::Zip;
