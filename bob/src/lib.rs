//! Bob - programmatic build tool
//!
//! A project describes its build in a descriptor (`bob/Default.java` by
//! default) whose target methods return a graph of actions. Bob combines:
//! - **convenient-actions**: the lazy, memoized action graph (compile, package, test, clean)
//! - **convenient-launch**: minimal-classpath symbol resolution and supervised child processes
//!
//! ## Architecture
//!
//! Every build runs in two phases:
//!
//! 1. **Cold**: read the project declaration, compile every declared source
//!    group once into a scratch directory, record the results in a
//!    [`CompiledUnitCache`] and relaunch `bob` with the handoff file
//! 2. **Warm**: read the handoff, compile and load the descriptor, resolve
//!    the requested target and process the action graph it returns. Source
//!    groups the cold pass already compiled are copied, not recompiled
//!
//! `bob -l` lists the targets without compiling anything.
//!
//! ## Usage
//!
//! ```no_run
//! use bob::{BobConfig, BootstrapOrchestrator, Descriptor, Invocation, Registry};
//! use convenient_actions::Jar;
//! # fn example() -> Result<(), bob::BootstrapError> {
//! // 1. Register the descriptor named by bob/Release.java
//! let registry = Registry::with_builtins().register(
//!     Descriptor::<()>::new("Release")
//!         .default_target("dist", |_: &()| Jar::new().with_sources()?.to("out/release.jar")),
//! );
//!
//! // 2. Run the requested phase
//! let root = std::path::PathBuf::from(".");
//! let config = BobConfig::load(&root)?;
//! let invocation = Invocation {
//!     descriptor: Some("bob/Release.java".into()),
//!     ..Invocation::default()
//! };
//! BootstrapOrchestrator::new(root, config, registry)?.run(&invocation)?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod builtin;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod declaration;
pub mod defaults;
pub mod descriptor;
pub mod error;
pub mod handoff;
pub mod loader;
pub mod logging;
pub mod orchestrator;
pub mod project;
pub mod signal;
pub mod target;

pub use compiler::CommandCompiler;
pub use config::BobConfig;
pub use declaration::{DeclarationReader, ProjectReader};
pub use descriptor::{BuildModule, Descriptor, IntoTargetAction, Registry};
pub use error::{BootstrapError, BootstrapResult, ErrorKind};
pub use handoff::{BootstrapHandoff, HandoffError};
pub use loader::{ModuleLoader, RegistryLoader};
pub use orchestrator::{BootstrapOrchestrator, Invocation, Outcome, Phase, PreparedHandoff};
pub use project::{DeclaredPath, ProjectBuilder, ProjectDescriptor, ProjectError};
pub use target::{MethodInfo, TargetError, TargetInfo, TargetResolver, Visibility};

// Re-export the action graph so descriptors need a single dependency
pub use convenient_actions::CompiledUnitCache;
