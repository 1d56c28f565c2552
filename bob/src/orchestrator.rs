//! Two-phase bootstrap
//!
//! Without a handoff the orchestrator runs the cold phase: it reads the
//! project declaration, compiles every source group into a fresh temporary
//! directory, records the units in a [`CompiledUnitCache`], writes a
//! [`BootstrapHandoff`] and relaunches the tool with it. The cold process
//! exits with the relaunch's exit code.
//!
//! With a handoff the warm phase installs the cache, compiles and loads the
//! build descriptor, resolves the target and processes its action graph.

use crate::config::BobConfig;
use crate::declaration::{DeclarationReader, ProjectReader};
use crate::defaults::HANDOFF_ENV;
use crate::descriptor::Registry;
use crate::error::{BootstrapError, BootstrapResult};
use crate::handoff::BootstrapHandoff;
use crate::loader::{ModuleLoader, RegistryLoader};
use crate::project::ProjectDescriptor;
use crate::target::{TargetResolver, render_listing};
use convenient_actions::compiler::collect_files;
use convenient_actions::{BuildContext, CompileRequest, CompiledUnitCache, Compiler, Diagnostic, Severity, Toolchain};
use convenient_launch::{CancelToken, ProcessLauncher, Runtime, SystemArchives};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{TempDir, TempPath};
use tracing::{debug, error, info, info_span, warn};

/// Flag the relaunched process reads its classpath from
pub const RELAUNCH_CLASSPATH_FLAG: &str = "--classpath";

/// Which phase an invocation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Print the targets, build nothing
    List,
    /// Compile, hand off and relaunch
    Cold,
    /// Run the target using the handoff at this path
    Warm(PathBuf),
}

/// One parsed command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Explicit target name
    pub target: Option<String>,
    /// Build descriptor override, relative to the project root
    pub descriptor: Option<PathBuf>,
    /// Handoff file; present only in the relaunched process
    pub handoff: Option<PathBuf>,
    /// Classpath passed explicitly by the cold phase
    pub classpath: Vec<PathBuf>,
    /// Listing mode
    pub list_targets: bool,
    /// Original arguments, forwarded unchanged to the relaunch
    pub raw_args: Vec<OsString>,
}

impl Invocation {
    /// Phase selected by this invocation
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.list_targets {
            Phase::List
        } else if let Some(handoff) = &self.handoff {
            Phase::Warm(handoff.clone())
        } else {
            Phase::Cold
        }
    }
}

/// How a bootstrap ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Listing text to print
    Listed(String),
    /// The cold phase relaunched; exit with this code
    Relaunched(i32),
    /// The warm phase processed the target
    Built,
}

/// Output of the cold phase, alive until the relaunch exits
#[derive(Debug)]
pub struct PreparedHandoff {
    handoff: BootstrapHandoff,
    file: TempPath,
    units: TempDir,
}

impl PreparedHandoff {
    /// Handoff contents
    #[must_use]
    pub fn handoff(&self) -> &BootstrapHandoff {
        &self.handoff
    }

    /// Handoff file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Directory holding every compiled unit
    #[must_use]
    pub fn units_dir(&self) -> &Path {
        self.units.path()
    }
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.severity {
            Severity::Error => error!("{diagnostic}"),
            Severity::Warning => warn!("{diagnostic}"),
            Severity::Note => info!("{diagnostic}"),
        }
    }
}

fn push_unique(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}

fn temp_dir(prefix: &str) -> BootstrapResult<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| BootstrapError::io("Failed to create temporary directory in", &std::env::temp_dir(), e))
}

/// Drives one bootstrap from command line to exit code
pub struct BootstrapOrchestrator {
    root: PathBuf,
    config: BobConfig,
    toolchain: Toolchain,
    reader: Box<dyn ProjectReader>,
    loader: Box<dyn ModuleLoader>,
    resolver: TargetResolver,
    relaunch: Runtime,
    cancel: CancelToken,
}

impl std::fmt::Debug for BootstrapOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapOrchestrator")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("relaunch", &self.relaunch)
            .finish_non_exhaustive()
    }
}

impl BootstrapOrchestrator {
    /// Orchestrator for the project at `root`
    ///
    /// The relaunch runs the current executable.
    ///
    /// # Errors
    ///
    /// When the current executable can't be determined.
    pub fn new(root: impl Into<PathBuf>, config: BobConfig, registry: Registry) -> BootstrapResult<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| BootstrapError::io("Failed to locate the running executable", Path::new("bob"), e))?;
        Ok(Self {
            root: root.into(),
            toolchain: config.toolchain(),
            reader: Box::new(DeclarationReader::new(&config.declaration)?),
            loader: Box::new(RegistryLoader::new(registry)),
            resolver: TargetResolver::new(config.default_target.clone()),
            relaunch: Runtime::new(exe, RELAUNCH_CLASSPATH_FLAG),
            cancel: CancelToken::new(),
            config,
        })
    }

    /// Replace the collaborators used for compiling and running actions
    #[must_use]
    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Replace the project declaration reader
    #[must_use]
    pub fn with_reader(mut self, reader: Box<dyn ProjectReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Replace the descriptor loader
    #[must_use]
    pub fn with_loader(mut self, loader: Box<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Replace the program run by the relaunch
    #[must_use]
    pub fn with_relaunch(mut self, runtime: Runtime) -> Self {
        self.relaunch = runtime;
        self
    }

    /// Use `cancel` to interrupt children
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn compiler(&self) -> &Arc<dyn Compiler> {
        &self.toolchain.compiler
    }

    /// Build descriptor of `invocation`, absolute
    #[must_use]
    pub fn descriptor_path(&self, invocation: &Invocation) -> PathBuf {
        let descriptor = invocation.descriptor.as_ref().unwrap_or(&self.config.descriptor);
        self.root.join(descriptor)
    }

    /// Run the phase selected by `invocation`
    ///
    /// # Errors
    ///
    /// Any failure of the phase.
    pub fn run(&self, invocation: &Invocation) -> BootstrapResult<Outcome> {
        let phase = invocation.phase();
        let _span = info_span!("bootstrap", phase = ?phase).entered();
        match phase {
            Phase::List => self.list(invocation).map(Outcome::Listed),
            Phase::Cold => self.cold(invocation).map(Outcome::Relaunched),
            Phase::Warm(handoff) => self.warm(invocation, &handoff).map(|()| Outcome::Built),
        }
    }

    /// Listing text for the descriptor of `invocation`
    ///
    /// # Errors
    ///
    /// A missing or unknown descriptor.
    pub fn list(&self, invocation: &Invocation) -> BootstrapResult<String> {
        let descriptor = self.descriptor_path(invocation);
        if !descriptor.is_file() {
            return Err(BootstrapError::DescriptorNotFound(descriptor));
        }
        let methods = self.loader.inspect(&descriptor)?;
        let targets = self.resolver.list(&methods);
        let shown = invocation.descriptor.as_ref().unwrap_or(&self.config.descriptor);
        Ok(render_listing(shown, &targets))
    }

    fn read_project(&self, descriptor: &Path) -> BootstrapResult<ProjectDescriptor> {
        if let Some(project) = self.reader.read(descriptor)? {
            return Ok(project);
        }
        info!(
            "{} declares no project, using the conventional layout",
            descriptor.display()
        );
        Ok(ProjectDescriptor::conventional())
    }

    /// Cold phase up to the relaunch
    ///
    /// Compiles every declared source group into one temporary directory
    /// and writes the handoff. Missing optional groups are skipped.
    ///
    /// # Errors
    ///
    /// Missing descriptor or required source group, compilation errors and
    /// I/O failures.
    pub fn prepare(&self, descriptor: &Path) -> BootstrapResult<PreparedHandoff> {
        if !descriptor.is_file() {
            return Err(BootstrapError::DescriptorNotFound(descriptor.to_path_buf()));
        }
        let project = self.read_project(descriptor)?;

        let units = temp_dir("bob-units-")?;
        let mut classpath = project.classpath(&self.root);
        push_unique(&mut classpath, units.path().to_path_buf());

        let compiler = self.compiler();
        let mut builder = CompiledUnitCache::builder(units.path())?;
        for group in project.source_groups() {
            let dir = self.root.join(&group.path);
            if !dir.is_dir() {
                if group.optional {
                    debug!("Optional source group {} is missing, skipping", group.path.display());
                    continue;
                }
                return Err(BootstrapError::MissingSourceGroup(dir));
            }

            let sources = collect_files(&dir, Some(compiler.source_extension()))?;
            if sources.is_empty() {
                debug!("Source group {} has no sources", group.path.display());
                let _ = builder.add(&group.path, Vec::new(), Vec::new())?;
                continue;
            }

            let request = CompileRequest {
                sources: sources.clone(),
                classpath: classpath.clone(),
                output_dir: units.path().to_path_buf(),
                debug_info: true,
            };
            let outcome = compiler.compile(&request)?;
            log_diagnostics(&outcome.diagnostics);
            if outcome.has_errors() {
                return Err(BootstrapError::Compilation {
                    subject: group.path.clone(),
                    diagnostics: outcome.diagnostics,
                });
            }

            info!(
                "Compiled {} source(s) of {} into {} unit(s)",
                sources.len(),
                group.path.display(),
                outcome.units.len()
            );
            let _ = builder.add(&group.path, sources, outcome.units)?;
        }

        let handoff = BootstrapHandoff::new(builder.commit()?, classpath);
        let file = handoff.persist_temp()?;
        Ok(PreparedHandoff { handoff, file, units })
    }

    fn cold(&self, invocation: &Invocation) -> BootstrapResult<i32> {
        let prepared = self.prepare(&self.descriptor_path(invocation))?;

        let launcher = prepared
            .handoff()
            .classpath()
            .iter()
            .fold(ProcessLauncher::without_entry_point(self.relaunch.clone()), |launcher, entry| {
                launcher.force_classpath(entry)
            })
            .env(HANDOFF_ENV, prepared.path())
            .app_args(invocation.raw_args.iter().cloned())
            .system_archives(SystemArchives::Disabled);

        info!("Relaunching with the compiled project");
        let code = launcher.run(&self.cancel)?;
        debug!("Relaunch exited with {code}");
        Ok(code)
    }

    /// Compile the descriptor source and return its unit
    fn compile_descriptor(&self, descriptor: &Path, classpath: &[PathBuf], output: &Path) -> BootstrapResult<PathBuf> {
        let compiler = self.compiler();
        let request = CompileRequest {
            sources: vec![descriptor.to_path_buf()],
            classpath: classpath.to_vec(),
            output_dir: output.to_path_buf(),
            debug_info: true,
        };
        let outcome = compiler.compile(&request)?;
        log_diagnostics(&outcome.diagnostics);
        if outcome.has_errors() {
            return Err(BootstrapError::Compilation {
                subject: descriptor.to_path_buf(),
                diagnostics: outcome.diagnostics,
            });
        }

        let stem = descriptor.file_stem().unwrap_or_default();
        let unit_extension = compiler.unit_extension();
        let expected = output.join(format!("{}.{unit_extension}", stem.to_string_lossy()));
        Ok(outcome
            .units
            .into_iter()
            .find(|unit| {
                unit.file_stem() == Some(stem)
                    && unit.extension().and_then(|e| e.to_str()) == Some(unit_extension)
            })
            .unwrap_or(expected))
    }

    /// Warm phase: install the handoff and process the target
    ///
    /// # Errors
    ///
    /// Any configuration, resolution or graph failure.
    pub fn warm(&self, invocation: &Invocation, handoff: &Path) -> BootstrapResult<()> {
        let (cache, mut classpath) = BootstrapHandoff::read(handoff)?.into_parts();
        for entry in &invocation.classpath {
            push_unique(&mut classpath, entry.clone());
        }

        let ctx = BuildContext::new(&self.root, self.toolchain.clone()).with_cancel_token(self.cancel.clone());
        ctx.install_cache(cache)?;

        let descriptor = self.descriptor_path(invocation);
        if !descriptor.is_file() {
            return Err(BootstrapError::DescriptorNotFound(descriptor));
        }
        let scratch = temp_dir("bob-descriptor-")?;
        let unit = self.compile_descriptor(&descriptor, &classpath, scratch.path())?;
        let module = self.loader.load(&unit)?;

        let methods = module.methods();
        let target = self.resolver.resolve(&methods, invocation.target.as_deref())?;
        info!("Using {} as build target", target.name);

        let action = module.invoke(&target.name)?;
        let _span = info_span!("target", name = %target.name).entered();
        action.process(&ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;
    use convenient_actions::testing::CopyCompiler;
    use convenient_actions::{Clean, Jar};
    use std::fs;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/a")).unwrap();
        fs::create_dir_all(dir.path().join("bob")).unwrap();
        fs::write(dir.path().join("src/a/A.java"), "package a;\nclass A {}").unwrap();
        fs::write(dir.path().join("bob/Default.java"), "public class Default {}").unwrap();
        dir
    }

    fn orchestrator(root: &Path, compiler: Arc<CopyCompiler>) -> BootstrapOrchestrator {
        let registry = Registry::new().register(
            Descriptor::<()>::new("Default")
                .default_target("build", |_: &()| Jar::new().with_sources()?.to("out/x.jar"))
                .target("clean", |_: &()| Clean::new().directory("out")),
        );
        BootstrapOrchestrator::new(root, BobConfig::default(), registry)
            .unwrap()
            .with_toolchain(Toolchain::new(compiler))
    }

    #[test]
    fn test_phase_selection() {
        let mut invocation = Invocation::default();
        assert_eq!(invocation.phase(), Phase::Cold);
        invocation.handoff = Some(PathBuf::from("/tmp/h.json"));
        assert_eq!(invocation.phase(), Phase::Warm(PathBuf::from("/tmp/h.json")));
        invocation.list_targets = true;
        assert_eq!(invocation.phase(), Phase::List);
    }

    #[test]
    fn test_prepare_skips_missing_optional_group() {
        let dir = project();
        let compiler = Arc::new(CopyCompiler::new());
        let prepared = orchestrator(dir.path(), compiler.clone())
            .prepare(&dir.path().join("bob/Default.java"))
            .unwrap();

        assert_eq!(compiler.invocations(), 1);
        let cache = prepared.handoff().cache();
        assert!(cache.contains(Path::new("src")));
        assert!(!cache.contains(Path::new("test")));
        assert!(prepared.units_dir().join("a/A.class").is_file());
        assert!(prepared.handoff().classpath().contains(&prepared.units_dir().to_path_buf()));
        assert!(BootstrapHandoff::read(prepared.path()).is_ok());
    }

    #[test]
    fn test_temporary_outputs_removed_with_prepared_handoff() {
        let dir = project();
        let prepared = orchestrator(dir.path(), Arc::new(CopyCompiler::new()))
            .prepare(&dir.path().join("bob/Default.java"))
            .unwrap();
        let units = prepared.units_dir().to_path_buf();
        let file = prepared.path().to_path_buf();
        drop(prepared);
        assert!(!units.exists());
        assert!(!file.exists());
    }

    #[test]
    fn test_missing_descriptor() {
        let dir = TempDir::new().unwrap();
        let err = orchestrator(dir.path(), Arc::new(CopyCompiler::new()))
            .run(&Invocation::default())
            .unwrap_err();
        assert!(matches!(err, BootstrapError::DescriptorNotFound(_)));
        assert!(err.to_string().contains("Are you sure you're in the right directory?"));
    }

    #[test]
    fn test_second_warm_run_reuses_nothing_from_the_first() {
        let dir = project();
        let compiler = Arc::new(CopyCompiler::new());
        let orchestrator = orchestrator(dir.path(), compiler.clone());
        let first = orchestrator.prepare(&dir.path().join("bob/Default.java")).unwrap();
        let second = orchestrator.prepare(&dir.path().join("bob/Default.java")).unwrap();
        assert_ne!(first.units_dir(), second.units_dir());
        assert_eq!(compiler.invocations(), 2);
    }

    #[test]
    fn test_warm_runs_explicit_target() {
        let dir = project();
        fs::create_dir_all(dir.path().join("out/stale")).unwrap();
        let compiler = Arc::new(CopyCompiler::new());
        let orchestrator = orchestrator(dir.path(), compiler);
        let prepared = orchestrator.prepare(&dir.path().join("bob/Default.java")).unwrap();

        let invocation = Invocation {
            target: Some("clean".into()),
            handoff: Some(prepared.path().to_path_buf()),
            ..Invocation::default()
        };
        assert_eq!(orchestrator.run(&invocation).unwrap(), Outcome::Built);
        assert!(!dir.path().join("out").exists());
    }
}
