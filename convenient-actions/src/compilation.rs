//! Compilation node: a source group turned into a directory of units
//!
//! Groups compiled by the bootstrap are copied out of the installed
//! [`CompiledUnitCache`](crate::CompiledUnitCache). Other groups are compiled
//! through the toolchain's [`Compiler`](crate::Compiler).

use crate::action::{Action, ActionRef, NodeState, PathProducer};
use crate::cache::CompiledUnitCache;
use crate::compiler::{CompileRequest, Severity, collect_files, library_archives};
use crate::context::BuildContext;
use crate::defaults::SOURCE_PATH;
use crate::error::{ActionError, ActionResult};
use std::cell::{OnceCell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

const KIND: &str = "Compilation";

#[derive(Debug, Clone)]
struct CompilationConfig {
    source: PathBuf,
    destination: Option<PathBuf>,
    debug_info: bool,
    archives: Vec<PathBuf>,
    library_dirs: Vec<PathBuf>,
}

#[derive(Debug)]
struct CompilationNode {
    state: NodeState,
    config: RefCell<CompilationConfig>,
    output: OnceCell<PathBuf>,
    scratch: RefCell<Option<TempDir>>,
}

/// Shared handle to a compilation node
#[derive(Debug, Clone)]
pub struct Compilation(Rc<CompilationNode>);

impl Default for Compilation {
    fn default() -> Self {
        Self::new()
    }
}

impl Compilation {
    /// Compilation of the conventional source group into a temporary directory
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(CompilationNode {
            state: NodeState::default(),
            config: RefCell::new(CompilationConfig {
                source: PathBuf::from(SOURCE_PATH),
                destination: None,
                debug_info: true,
                archives: Vec::new(),
                library_dirs: Vec::new(),
            }),
            output: OnceCell::new(),
            scratch: RefCell::new(None),
        }))
    }

    fn configure(self, apply: impl FnOnce(&mut CompilationConfig)) -> ActionResult<Self> {
        self.0.state.check_configurable(KIND)?;
        apply(&mut self.0.config.borrow_mut());
        Ok(self)
    }

    /// Source group to compile
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn source(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        let path = path.into();
        self.configure(|c| c.source = path)
    }

    /// Output directory, created on demand
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn to(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        let path = path.into();
        self.configure(|c| c.destination = Some(path))
    }

    /// Request units without debug information
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn without_debug_info(self) -> ActionResult<Self> {
        self.configure(|c| c.debug_info = false)
    }

    /// Put an archive file on the classpath
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn with_archive(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        let path = path.into();
        self.configure(|c| c.archives.push(path))
    }

    /// Put every library archive directly inside `dir` on the classpath
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn with_library_dir(self, dir: impl Into<PathBuf>) -> ActionResult<Self> {
        let dir = dir.into();
        self.configure(|c| c.library_dirs.push(dir))
    }

    /// Source directory, resolved against the project root
    #[must_use]
    pub fn source_dir(&self, ctx: &BuildContext) -> PathBuf {
        ctx.resolve(&self.0.config.borrow().source)
    }

    /// Classpath handed to the compiler
    #[must_use]
    pub fn classpath(&self, ctx: &BuildContext) -> Vec<PathBuf> {
        let config = self.0.config.borrow();
        let mut classpath = Vec::new();
        for archive in &config.archives {
            let archive = ctx.resolve(archive);
            if archive.is_file() {
                classpath.push(archive);
            } else {
                warn!("Archive {} doesn't exist, leaving it off the classpath", archive.display());
            }
        }
        for dir in &config.library_dirs {
            let dir = ctx.resolve(dir);
            if dir.is_dir() {
                classpath.extend(library_archives(&dir));
            } else {
                debug!("Library directory {} doesn't exist", dir.display());
            }
        }
        classpath
    }

    fn output_dir(&self, ctx: &BuildContext, config: &CompilationConfig) -> ActionResult<PathBuf> {
        let dir = match &config.destination {
            Some(dir) => ctx.resolve(dir),
            None => {
                let scratch = tempfile::Builder::new()
                    .prefix("bob-compilation-")
                    .tempdir()
                    .map_err(|e| ActionError::io("Failed to create temporary directory", &std::env::temp_dir(), e))?;
                let dir = scratch.path().to_path_buf();
                *self.0.scratch.borrow_mut() = Some(scratch);
                dir
            }
        };
        fs::create_dir_all(&dir).map_err(|e| ActionError::io("Failed to create directory", &dir, e))?;
        Ok(dir)
    }

    fn compile(&self, ctx: &BuildContext, source: &Path, output: &Path) -> ActionResult<()> {
        let compiler = &ctx.toolchain().compiler;
        let sources = collect_files(source, Some(compiler.source_extension()))?;
        if sources.is_empty() {
            info!("No sources in {}, nothing to compile", source.display());
            return Ok(());
        }

        let mut classpath = self.classpath(ctx);
        if let Some(cache) = ctx.cache() {
            classpath.push(cache.base_dir().to_path_buf());
        }

        info!("Compiling {} source file(s) from {}", sources.len(), source.display());
        let outcome = compiler.compile(&CompileRequest {
            sources,
            classpath,
            output_dir: output.to_path_buf(),
            debug_info: true,
        })?;

        for diagnostic in &outcome.diagnostics {
            match diagnostic.severity {
                Severity::Error | Severity::Warning => warn!("{diagnostic}"),
                Severity::Note => debug!("{diagnostic}"),
            }
        }
        if outcome.has_errors() {
            return Err(ActionError::CompilationFailed {
                group: source.to_path_buf(),
                diagnostics: outcome.diagnostics,
            });
        }
        Ok(())
    }
}

fn copy_cached_units(cache: &CompiledUnitCache, group: &Path, output: &Path) -> ActionResult<usize> {
    let units = cache.units_for(group)?;
    for unit in &units.units {
        let from = cache.base_dir().join(unit);
        let to = output.join(unit);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ActionError::io("Failed to create directory", parent, e))?;
        }
        let _ = fs::copy(&from, &to).map_err(|e| ActionError::io("Failed to copy compiled unit", &from, e))?;
    }
    Ok(units.units.len())
}

impl Action for Compilation {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn process(&self, ctx: &BuildContext) -> ActionResult<()> {
        self.0.state.run(KIND, || {
            let config = self.0.config.borrow().clone();
            if !config.debug_info {
                return Err(ActionError::Unsupported(
                    "Recompilation for disabling debug information".to_string(),
                ));
            }

            let output = self.output_dir(ctx, &config)?;
            match ctx.cache().filter(|c| c.contains(&config.source)) {
                Some(cache) => {
                    let copied = copy_cached_units(cache, &config.source, &output)?;
                    info!(
                        "Copied {copied} cached unit(s) of {} to {}",
                        config.source.display(),
                        output.display()
                    );
                }
                None => {
                    let source = ctx.resolve(&config.source);
                    self.compile(ctx, &source, &output)?;
                }
            }

            self.0
                .output
                .set(output)
                .map_err(|_| ActionError::Internal("compilation output set twice".to_string()))
        })
    }

    fn is_processed(&self) -> bool {
        self.0.state.is_processed()
    }
}

impl PathProducer for Compilation {
    fn path(&self, ctx: &BuildContext) -> ActionResult<PathBuf> {
        self.process(ctx)?;
        self.0
            .output
            .get()
            .cloned()
            .ok_or_else(|| ActionError::Internal("processed compilation has no output".to_string()))
    }
}

impl From<Compilation> for ActionRef {
    fn from(compilation: Compilation) -> Self {
        Rc::new(compilation)
    }
}
