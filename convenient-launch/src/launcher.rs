//! Supervised launching of a child process on a minimal classpath
//!
//! The command line is assembled in a fixed order:
//! 1. runtime executable
//! 2. classpath flag and the joined classpath (omitted when empty)
//! 3. launcher-level arguments
//! 4. entry point
//! 5. application arguments

use crate::cancel::CancelToken;
use crate::error::{LaunchError, LaunchResult};
use crate::pump::{OutputSink, PumpSet};
use crate::resolver::{SymbolResolver, SystemArchives};
use crate::symbol::SymbolLayout;
use crate::{PATH_SEPARATOR, SYSTEM_ARCHIVES_ENV};
use std::cell::OnceCell;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Executable that hosts the child and how it takes a classpath
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    executable: OsString,
    classpath_flag: String,
}

impl Runtime {
    /// Custom runtime
    #[must_use]
    pub fn new(executable: impl Into<OsString>, classpath_flag: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            classpath_flag: classpath_flag.into(),
        }
    }

    /// The platform's JVM launcher
    #[must_use]
    pub fn jvm() -> Self {
        let executable = if cfg!(windows) { "java.exe" } else { "java" };
        Self::new(executable, "-classpath")
    }

    /// Executable name or path
    #[must_use]
    pub fn executable(&self) -> &OsStr {
        &self.executable
    }

    /// Flag preceding the classpath
    #[must_use]
    pub fn classpath_flag(&self) -> &str {
        &self.classpath_flag
    }
}

/// What the child reads on stdin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdinMode {
    /// Forward this process's stdin
    #[default]
    Forward,
    /// Closed input
    Null,
}

/// Resolves a minimal classpath and runs one child process with it
#[derive(Debug)]
pub struct ProcessLauncher {
    runtime: Runtime,
    entry_point: Option<String>,
    required: Vec<String>,
    candidates: Vec<PathBuf>,
    forced: Vec<PathBuf>,
    launcher_args: Vec<OsString>,
    app_args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    working_dir: Option<PathBuf>,
    layout: SymbolLayout,
    system: SystemArchives,
    stdin: StdinMode,
    stdout: OutputSink,
    stderr: OutputSink,
    poll_interval: Duration,
    resolver: OnceCell<SymbolResolver>,
}

impl ProcessLauncher {
    /// Launcher for `entry_point` hosted by `runtime`
    #[must_use]
    pub fn new(runtime: Runtime, entry_point: impl Into<String>) -> Self {
        let mut launcher = Self::without_entry_point(runtime);
        launcher.entry_point = Some(entry_point.into());
        launcher
    }

    /// Launcher whose runtime executable is itself the program to run
    #[must_use]
    pub fn without_entry_point(runtime: Runtime) -> Self {
        Self {
            runtime,
            entry_point: None,
            required: Vec::new(),
            candidates: Vec::new(),
            forced: Vec::new(),
            launcher_args: Vec::new(),
            app_args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            layout: SymbolLayout::default(),
            system: SystemArchives::FromEnv(SYSTEM_ARCHIVES_ENV.to_string()),
            stdin: StdinMode::default(),
            stdout: OutputSink::default(),
            stderr: OutputSink::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            resolver: OnceCell::new(),
        }
    }

    /// Require `symbol` to be loadable by the child
    #[must_use]
    pub fn require(mut self, symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        if !self.required.contains(&symbol) {
            self.required.push(symbol);
        }
        self
    }

    /// Add a user archive to probe
    #[must_use]
    pub fn candidate(mut self, archive: impl Into<PathBuf>) -> Self {
        self.candidates.push(archive.into());
        self
    }

    /// Add several user archives to probe
    #[must_use]
    pub fn candidates<I, P>(mut self, archives: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.candidates.extend(archives.into_iter().map(Into::into));
        self
    }

    /// Put `path` on the classpath without probing it
    #[must_use]
    pub fn force_classpath(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !self.forced.contains(&path) {
            self.forced.push(path);
        }
        self
    }

    /// Argument placed between the classpath and the entry point
    #[must_use]
    pub fn launcher_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.launcher_args.push(arg.into());
        self
    }

    /// Argument forwarded to the launched program
    #[must_use]
    pub fn app_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.app_args.push(arg.into());
        self
    }

    /// Arguments forwarded to the launched program
    #[must_use]
    pub fn app_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.app_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run the child in `dir`
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Symbol-to-entry layout used while probing
    #[must_use]
    pub fn layout(mut self, layout: SymbolLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Where system archives come from
    #[must_use]
    pub fn system_archives(mut self, system: SystemArchives) -> Self {
        self.system = system;
        self
    }

    /// Stdin handling
    #[must_use]
    pub fn stdin(mut self, mode: StdinMode) -> Self {
        self.stdin = mode;
        self
    }

    /// Where the child's stdout goes
    #[must_use]
    pub fn stdout(mut self, sink: OutputSink) -> Self {
        self.stdout = sink;
        self
    }

    /// Where the child's stderr goes
    #[must_use]
    pub fn stderr(mut self, sink: OutputSink) -> Self {
        self.stderr = sink;
        self
    }

    /// How often the supervisor checks for exit or cancellation
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn resolver(&self) -> &SymbolResolver {
        self.resolver.get_or_init(|| {
            SymbolResolver::new(
                self.layout.clone(),
                self.candidates.clone(),
                self.system.clone(),
            )
        })
    }

    /// Minimal classpath: satisfying archives followed by forced entries
    ///
    /// # Errors
    ///
    /// [`LaunchError::Unresolved`] when a required symbol has no archive.
    pub fn classpath(&self) -> LaunchResult<Vec<PathBuf>> {
        let mut classpath = self.resolver().resolve(&self.required)?.classpath;
        for forced in &self.forced {
            if !classpath.contains(forced) {
                classpath.push(forced.clone());
            }
        }
        Ok(classpath)
    }

    /// Full command line, executable first
    ///
    /// # Errors
    ///
    /// Fails when the classpath cannot be resolved.
    pub fn command_line(&self) -> LaunchResult<Vec<OsString>> {
        let classpath = self.classpath()?;

        let mut line = vec![self.runtime.executable.clone()];
        if !classpath.is_empty() {
            line.push(OsString::from(&self.runtime.classpath_flag));
            line.push(join_classpath(&classpath));
        }
        line.extend(self.launcher_args.iter().cloned());
        if let Some(entry) = &self.entry_point {
            line.push(OsString::from(entry));
        }
        line.extend(self.app_args.iter().cloned());
        Ok(line)
    }

    /// Spawn the child, pump its streams and wait for it
    ///
    /// Returns the child's exit code. A child killed by a signal reports
    /// `128 + signal`.
    ///
    /// # Errors
    ///
    /// Resolution and spawn failures, and [`LaunchError::Interrupted`] when
    /// `cancel` trips while the child runs.
    pub fn run(&self, cancel: &CancelToken) -> LaunchResult<i32> {
        let line = self.command_line()?;
        let Some((program, args)) = line.split_first() else {
            return Err(LaunchError::io(
                "Empty command line",
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            ));
        };
        let program_name = program.to_string_lossy().into_owned();
        info!("Launching {}", display_command(&line));

        let mut command = Command::new(program);
        let _ = command
            .args(args)
            .stdin(match self.stdin {
                StdinMode::Forward => Stdio::piped(),
                StdinMode::Null => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            let _ = command.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            let _ = command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: program_name.clone(),
            source,
        })?;

        let pumps = match PumpSet::start(&mut child, &self.stdout, &self.stderr) {
            Ok(pumps) => pumps,
            Err(e) => {
                terminate(&mut child);
                return Err(LaunchError::io("Failed to start stream pumps", e));
            }
        };

        let waited = self.supervise(&mut child, cancel, &program_name);
        pumps.finish();

        let status = waited?;
        let code = exit_code(status);
        debug!("{program_name} exited with {code}");
        Ok(code)
    }

    fn supervise(&self, child: &mut Child, cancel: &CancelToken, program: &str) -> LaunchResult<ExitStatus> {
        loop {
            if cancel.is_cancelled() {
                warn!("Interrupted, terminating {program}");
                terminate(child);
                return Err(LaunchError::Interrupted {
                    program: program.to_string(),
                });
            }
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    terminate(child);
                    return Err(LaunchError::io(format!("Failed to wait for {program}"), e));
                }
            }
        }
    }
}

fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Kill failed (child may have exited already): {e}");
    }
    let _ = child.wait();
}

fn join_classpath(classpath: &[PathBuf]) -> OsString {
    let mut joined = OsString::new();
    for (i, path) in classpath.iter().enumerate() {
        if i > 0 {
            joined.push(PATH_SEPARATOR.to_string());
        }
        joined.push(path.as_os_str());
    }
    joined
}

fn display_command(line: &[OsString]) -> String {
    line.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher() -> ProcessLauncher {
        ProcessLauncher::new(Runtime::new("runtime", "-cp"), "org.example.Main")
            .system_archives(SystemArchives::Disabled)
    }

    #[test]
    fn test_command_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let forced = dir.path().join("classes");
        let line = launcher()
            .force_classpath(&forced)
            .launcher_arg("-Xmx64m")
            .app_args(["one", "two"])
            .command_line()
            .unwrap();

        let expected: Vec<OsString> = vec![
            "runtime".into(),
            "-cp".into(),
            forced.clone().into_os_string(),
            "-Xmx64m".into(),
            "org.example.Main".into(),
            "one".into(),
            "two".into(),
        ];
        assert_eq!(line, expected);
    }

    #[test]
    fn test_empty_classpath_omits_flag() {
        let line = launcher().app_arg("x").command_line().unwrap();
        assert_eq!(line, vec![OsString::from("runtime"), "org.example.Main".into(), "x".into()]);
    }

    #[test]
    fn test_forced_entries_are_deduplicated() {
        let classpath = launcher()
            .force_classpath("/a")
            .force_classpath("/b")
            .force_classpath("/a")
            .classpath()
            .unwrap();
        assert_eq!(classpath, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_join_classpath() {
        let joined = join_classpath(&[PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(joined, OsString::from(format!("a{PATH_SEPARATOR}b")));
    }

    #[test]
    fn test_jvm_runtime() {
        let runtime = Runtime::jvm();
        assert_eq!(runtime.classpath_flag(), "-classpath");
        assert!(runtime.executable().to_string_lossy().starts_with("java"));
    }
}
