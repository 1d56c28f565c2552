//! Test execution in an isolated child process
//!
//! The runner program gets the results-file path and the test names as
//! arguments and writes a [`TestReport`] there. Compiled tests and their
//! targets are forced onto the child's classpath.

use crate::action::{Action, ActionRef, NodeState, PathProducer};
use crate::compilation::Compilation;
use crate::context::BuildContext;
use crate::defaults::TEST_SOURCE_PATH;
use crate::error::{ActionError, ActionResult};
use crate::report::TestReport;
use convenient_launch::ProcessLauncher;
use std::cell::{OnceCell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

const KIND: &str = "TestRun";

#[derive(Debug, Clone, Default)]
struct TestRunConfig {
    tests: Option<Compilation>,
    targets: Option<Compilation>,
    names: Vec<String>,
    archives: Vec<PathBuf>,
}

#[derive(Debug)]
struct TestRunNode {
    state: NodeState,
    config: RefCell<TestRunConfig>,
    report: OnceCell<TestReport>,
}

/// Shared handle to a test-run node
#[derive(Debug, Clone)]
pub struct TestRun(Rc<TestRunNode>);

impl Default for TestRun {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRun {
    /// Test run with conventional test and target compilations and no tests
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(TestRunNode {
            state: NodeState::default(),
            config: RefCell::new(TestRunConfig::default()),
            report: OnceCell::new(),
        }))
    }

    fn configure(self, apply: impl FnOnce(&mut TestRunConfig)) -> ActionResult<Self> {
        self.0.state.check_configurable(KIND)?;
        apply(&mut self.0.config.borrow_mut());
        Ok(self)
    }

    /// Compilation holding the tests
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn tests_from(self, compilation: Compilation) -> ActionResult<Self> {
        self.configure(|c| c.tests = Some(compilation))
    }

    /// Compilation holding the code under test
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn targets_from(self, compilation: Compilation) -> ActionResult<Self> {
        self.configure(|c| c.targets = Some(compilation))
    }

    /// Add tests by name; duplicates are ignored
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn run<I, S>(self, names: I) -> ActionResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configure(|c| {
            for name in names {
                let name = name.into();
                if !c.names.contains(&name) {
                    c.names.push(name);
                }
            }
        })
    }

    /// Extra archive searched for the runner and the test framework
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn with_archive(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        let path = path.into();
        self.configure(|c| c.archives.push(path))
    }

    /// Report of the last run, if the runner produced one
    #[must_use]
    pub fn report(&self) -> Option<&TestReport> {
        self.0.report.get()
    }

    fn resolved_config(&self) -> ActionResult<TestRunConfig> {
        let mut config = self.0.config.borrow_mut();
        if config.targets.is_none() {
            config.targets = Some(Compilation::new());
        }
        if config.tests.is_none() {
            config.tests = Some(Compilation::new().source(TEST_SOURCE_PATH)?);
        }
        Ok(config.clone())
    }

    fn execute(&self, ctx: &BuildContext, config: &TestRunConfig) -> ActionResult<()> {
        let (Some(tests), Some(targets)) = (&config.tests, &config.targets) else {
            return Err(ActionError::Internal("test run without compilations".to_string()));
        };

        let targets_dir = targets.path(ctx)?;
        let tests_dir = tests.path(ctx)?;

        let results = NamedTempFile::new()
            .map_err(|e| ActionError::io("Failed to create results file", &std::env::temp_dir(), e))?;

        let toolchain = ctx.toolchain();
        let runner = &toolchain.test_runner;
        let mut launcher = ProcessLauncher::new(toolchain.runtime.clone(), runner.entry_point.clone())
            .layout(toolchain.layout())
            .system_archives(toolchain.system_archives.clone())
            .require(runner.entry_point.clone())
            .candidates(config.archives.iter().map(|a| ctx.resolve(a)))
            .candidates(tests.classpath(ctx))
            .candidate(tests_dir.clone())
            .candidate(targets_dir.clone())
            .force_classpath(tests_dir)
            .force_classpath(targets_dir)
            .app_arg(results.path())
            .app_args(config.names.iter())
            .working_dir(ctx.root());
        for symbol in &runner.required_symbols {
            launcher = launcher.require(symbol.clone());
        }

        info!("Running {} test(s)", config.names.len());
        let code = launcher.run(ctx.cancel_token())?;

        match TestReport::read(results.path()) {
            Ok(report) => {
                if report.success {
                    info!("{report}");
                } else {
                    error!("{report}");
                }
                let _ = self.0.report.set(report);
            }
            Err(e) if code == 0 => return Err(e),
            Err(e) => warn!("No usable test report: {e}"),
        }

        if code != 0 {
            return Err(ActionError::ProcessFailed { action: KIND, code });
        }
        Ok(())
    }
}

impl Action for TestRun {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn process(&self, ctx: &BuildContext) -> ActionResult<()> {
        self.0.state.run(KIND, || {
            let config = self.resolved_config()?;
            if config.names.is_empty() {
                warn!("No tests marked to run");
                return Ok(());
            }
            self.execute(ctx, &config)
        })
    }

    fn is_processed(&self) -> bool {
        self.0.state.is_processed()
    }
}

impl From<TestRun> for ActionRef {
    fn from(run: TestRun) -> Self {
        Rc::new(run)
    }
}
