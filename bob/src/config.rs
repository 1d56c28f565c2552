//! Optional per-project configuration in `bob.yml`
//!
//! Every key is optional:
//!
//! ```yaml
//! descriptor: bob/Release.java
//! default_target: build
//! compiler:
//!   program: /opt/jdk/bin/javac
//!   extra_args: ["-encoding", "UTF-8"]
//! runtime:
//!   executable: /opt/jdk/bin/java
//! test_runner:
//!   entry_point: bob.runner.TestRunner
//! ```

use crate::compiler::CommandCompiler;
use crate::defaults::{
    COMPILER_PROGRAM, CONFIG_FILE, DECLARATION_FUNCTION, DEFAULT_TARGET_NAME, DESCRIPTOR_PATH, SOURCE_EXTENSION,
    UNIT_EXTENSION,
};
use crate::error::{BootstrapError, BootstrapResult};
use convenient_actions::context::{DEFAULT_TEST_FRAMEWORK_SYMBOL, DEFAULT_TEST_RUNNER};
use convenient_actions::{TestRunner, Toolchain};
use convenient_launch::{Runtime, SYSTEM_ARCHIVES_ENV, SystemArchives};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// External compiler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compiler executable
    pub program: String,
    /// Flag requesting debug information; empty to never pass one
    pub debug_flag: String,
    /// Flag preceding the output directory
    pub output_flag: String,
    /// Flag preceding the classpath
    pub classpath_flag: String,
    /// Arguments placed before the source files
    pub extra_args: Vec<String>,
    /// Extension of source files
    pub source_extension: String,
    /// Extension of compiled units
    pub unit_extension: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: COMPILER_PROGRAM.to_string(),
            debug_flag: "-g".to_string(),
            output_flag: "-d".to_string(),
            classpath_flag: "-classpath".to_string(),
            extra_args: Vec::new(),
            source_extension: SOURCE_EXTENSION.to_string(),
            unit_extension: UNIT_EXTENSION.to_string(),
        }
    }
}

/// Runtime hosting child processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Launcher executable
    pub executable: String,
    /// Flag preceding the classpath
    pub classpath_flag: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let jvm = Runtime::jvm();
        Self {
            executable: jvm.executable().to_string_lossy().into_owned(),
            classpath_flag: jvm.classpath_flag().to_string(),
        }
    }
}

/// Test runner program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRunnerConfig {
    /// Entry point of the runner
    pub entry_point: String,
    /// Symbol the test framework must provide
    pub framework_symbol: String,
}

impl Default for TestRunnerConfig {
    fn default() -> Self {
        Self {
            entry_point: DEFAULT_TEST_RUNNER.to_string(),
            framework_symbol: DEFAULT_TEST_FRAMEWORK_SYMBOL.to_string(),
        }
    }
}

/// Contents of `bob.yml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BobConfig {
    /// Build descriptor used when none is given on the command line
    pub descriptor: PathBuf,
    /// Target run when no default is marked
    pub default_target: String,
    /// Function holding the project declaration
    pub declaration: String,
    /// Compiler settings
    pub compiler: CompilerConfig,
    /// Runtime settings
    pub runtime: RuntimeConfig,
    /// Environment variable naming the system archive directory
    pub system_archives_env: String,
    /// Test runner settings
    pub test_runner: TestRunnerConfig,
}

impl Default for BobConfig {
    fn default() -> Self {
        Self {
            descriptor: PathBuf::from(DESCRIPTOR_PATH),
            default_target: DEFAULT_TARGET_NAME.to_string(),
            declaration: DECLARATION_FUNCTION.to_string(),
            compiler: CompilerConfig::default(),
            runtime: RuntimeConfig::default(),
            system_archives_env: SYSTEM_ARCHIVES_ENV.to_string(),
            test_runner: TestRunnerConfig::default(),
        }
    }
}

impl BobConfig {
    /// Load `bob.yml` from `root`, or the defaults when there is none
    ///
    /// # Errors
    ///
    /// [`BootstrapError::Config`] for an unreadable or invalid file.
    pub fn load(root: &Path) -> BootstrapResult<Self> {
        let path = root.join(CONFIG_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No {CONFIG_FILE}, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(BootstrapError::Config {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config = serde_yaml::from_str(&content).map_err(|e| BootstrapError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!("Loaded {}", path.display());
        Ok(config)
    }

    /// Compilation service described by the compiler settings
    #[must_use]
    pub fn compiler(&self) -> CommandCompiler {
        let c = &self.compiler;
        CommandCompiler::new(&c.program)
            .with_flags(&c.debug_flag, &c.output_flag, &c.classpath_flag)
            .with_extra_args(c.extra_args.clone())
            .with_extensions(&c.source_extension, &c.unit_extension)
    }

    /// Runtime for test children
    #[must_use]
    pub fn runtime(&self) -> Runtime {
        Runtime::new(&self.runtime.executable, self.runtime.classpath_flag.as_str())
    }

    /// Collaborators handed to the action graph
    #[must_use]
    pub fn toolchain(&self) -> Toolchain {
        let runner = &self.test_runner;
        Toolchain::new(Arc::new(self.compiler()))
            .with_runtime(self.runtime())
            .with_system_archives(SystemArchives::FromEnv(self.system_archives_env.clone()))
            .with_test_runner(TestRunner {
                entry_point: runner.entry_point.clone(),
                required_symbols: vec![runner.framework_symbol.clone()],
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = BobConfig::load(dir.path()).unwrap();
        assert_eq!(config, BobConfig::default());
        assert_eq!(config.descriptor, PathBuf::from("bob/Default.java"));
        assert_eq!(config.system_archives_env, "BOB_LIB");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "default_target: dist\ncompiler:\n  program: ecj\n  extra_args: [\"-1.8\"]\n",
        )
        .unwrap();

        let config = BobConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_target, "dist");
        assert_eq!(config.compiler.program, "ecj");
        assert_eq!(config.compiler.extra_args, vec!["-1.8"]);
        assert_eq!(config.compiler.output_flag, "-d");
        assert_eq!(config.declaration, "describeProject");
    }

    #[test]
    fn test_invalid_file_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "compiler: [not, a, map]\n").unwrap();
        let err = BobConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, BootstrapError::Config { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_toolchain_uses_test_runner_settings() {
        let mut config = BobConfig::default();
        config.test_runner.entry_point = "my.Runner".into();
        let toolchain = config.toolchain();
        assert_eq!(toolchain.test_runner.entry_point, "my.Runner");
        assert_eq!(
            toolchain.test_runner.required_symbols,
            vec!["org.junit.runner.JUnitCore".to_string()]
        );
        assert_eq!(toolchain.compiler.unit_extension(), "class");
    }
}
