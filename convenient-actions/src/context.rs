//! Evaluation context passed to every action
//!
//! The context owns the collaborators (compiler, archive writer, runtime)
//! and the write-once slot for the [`CompiledUnitCache`]. One context exists
//! per process.

use crate::archive::{ArchiveWriter, TarArchiveWriter};
use crate::cache::CompiledUnitCache;
use crate::compiler::Compiler;
use crate::error::{ActionError, ActionResult};
use convenient_launch::{CancelToken, Runtime, SYSTEM_ARCHIVES_ENV, SymbolLayout, SystemArchives};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Default entry point of the isolated test runner
pub const DEFAULT_TEST_RUNNER: &str = "bob.runner.TestRunner";

/// Default symbol the test framework must provide
pub const DEFAULT_TEST_FRAMEWORK_SYMBOL: &str = "org.junit.runner.JUnitCore";

/// Program that executes tests in a child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunner {
    /// Entry point handed to the runtime
    pub entry_point: String,
    /// Symbols that must resolve besides the entry point
    pub required_symbols: Vec<String>,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self {
            entry_point: DEFAULT_TEST_RUNNER.to_string(),
            required_symbols: vec![DEFAULT_TEST_FRAMEWORK_SYMBOL.to_string()],
        }
    }
}

/// External collaborators used by actions
#[derive(Clone)]
pub struct Toolchain {
    /// Compilation service
    pub compiler: Arc<dyn Compiler>,
    /// Archive writer
    pub archiver: Arc<dyn ArchiveWriter>,
    /// Runtime hosting child processes
    pub runtime: Runtime,
    /// Where the tool's own archives are found
    pub system_archives: SystemArchives,
    /// Test runner program
    pub test_runner: TestRunner,
}

impl Toolchain {
    /// Toolchain around `compiler` with default collaborators
    #[must_use]
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            archiver: Arc::new(TarArchiveWriter),
            runtime: Runtime::jvm(),
            system_archives: SystemArchives::FromEnv(SYSTEM_ARCHIVES_ENV.to_string()),
            test_runner: TestRunner::default(),
        }
    }

    /// Replace the archive writer
    #[must_use]
    pub fn with_archiver(mut self, archiver: Arc<dyn ArchiveWriter>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Replace the runtime
    #[must_use]
    pub fn with_runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Replace the system archive source
    #[must_use]
    pub fn with_system_archives(mut self, system: SystemArchives) -> Self {
        self.system_archives = system;
        self
    }

    /// Replace the test runner
    #[must_use]
    pub fn with_test_runner(mut self, runner: TestRunner) -> Self {
        self.test_runner = runner;
        self
    }

    /// Symbol layout matching the compiler's unit extension
    #[must_use]
    pub fn layout(&self) -> SymbolLayout {
        SymbolLayout::new(self.compiler.unit_extension())
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain")
            .field("runtime", &self.runtime)
            .field("system_archives", &self.system_archives)
            .field("test_runner", &self.test_runner)
            .finish_non_exhaustive()
    }
}

/// Everything an action needs while processing
#[derive(Debug)]
pub struct BuildContext {
    root: PathBuf,
    toolchain: Toolchain,
    cache: OnceLock<CompiledUnitCache>,
    cancel: CancelToken,
}

impl BuildContext {
    /// Context resolving relative paths against `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, toolchain: Toolchain) -> Self {
        Self {
            root: root.into(),
            toolchain,
            cache: OnceLock::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Use `cancel` to interrupt child processes
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Project root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collaborators
    #[must_use]
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Cancellation token for child processes
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// `path` made absolute against the project root
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Install the compiled unit cache; allowed exactly once
    ///
    /// # Errors
    ///
    /// [`ActionError::CacheAlreadyInstalled`] on a second call, or
    /// [`ActionError::UnreadableDirectory`] when the cache's base directory
    /// is gone.
    pub fn install_cache(&self, cache: CompiledUnitCache) -> ActionResult<()> {
        if self.cache.get().is_some() {
            return Err(ActionError::CacheAlreadyInstalled);
        }
        cache.validate()?;
        let groups: Vec<&str> = cache.groups().collect();
        debug!("Installing compiled unit cache for {}", groups.join(", "));
        self.cache
            .set(cache)
            .map_err(|_| ActionError::CacheAlreadyInstalled)
    }

    /// Installed cache, if any
    #[must_use]
    pub fn cache(&self) -> Option<&CompiledUnitCache> {
        self.cache.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CopyCompiler;
    use tempfile::TempDir;

    fn context(root: &Path) -> BuildContext {
        BuildContext::new(root, Toolchain::new(Arc::new(CopyCompiler::new())))
    }

    #[test]
    fn test_second_install_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let first = CompiledUnitCache::builder(dir.path()).unwrap().commit().unwrap();
        let second = first.clone();

        ctx.install_cache(first).unwrap();
        let err = ctx.install_cache(second).unwrap_err();
        assert!(matches!(err, ActionError::CacheAlreadyInstalled));
    }

    #[test]
    fn test_install_rejects_vanished_base_dir() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("units");
        std::fs::create_dir(&base).unwrap();
        let cache = CompiledUnitCache::builder(&base).unwrap().commit().unwrap();
        std::fs::remove_dir(&base).unwrap();

        let ctx = context(dir.path());
        assert!(matches!(
            ctx.install_cache(cache),
            Err(ActionError::UnreadableDirectory(_))
        ));
        assert!(ctx.cache().is_none());
    }

    #[test]
    fn test_resolve_relative_to_root() {
        let ctx = context(Path::new("/project"));
        assert_eq!(ctx.resolve(Path::new("src")), PathBuf::from("/project/src"));
        assert_eq!(ctx.resolve(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
