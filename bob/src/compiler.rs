//! Compilation service backed by an external compiler program
//!
//! The program is run once per request with a fixed argument order:
//! debug flag, output flag and directory, classpath flag and classpath,
//! extra arguments, then the source files. Diagnostics are parsed from the
//! `file:line: severity: message` lines it prints.

use convenient_actions::{ActionError, ActionResult, CompileOutcome, CompileRequest, Compiler, Diagnostic, Severity};
use convenient_launch::PATH_SEPARATOR;
use regex::Regex;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;
use tracing::{debug, trace};
use walkdir::WalkDir;

const DIAGNOSTIC_PATTERN: &str = r"^(?:(.+?):(\d+): )?(error|warning|note|Note): (.*)$";

/// Runs a compiler executable such as `javac`
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: OsString,
    debug_flag: String,
    output_flag: String,
    classpath_flag: String,
    extra_args: Vec<String>,
    source_extension: String,
    unit_extension: String,
}

impl CommandCompiler {
    /// `javac`-style compiler called `program`
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            debug_flag: "-g".to_string(),
            output_flag: "-d".to_string(),
            classpath_flag: "-classpath".to_string(),
            extra_args: Vec::new(),
            source_extension: "java".to_string(),
            unit_extension: "class".to_string(),
        }
    }

    /// Replace the flags; an empty debug flag is never passed
    #[must_use]
    pub fn with_flags(mut self, debug: &str, output: &str, classpath: &str) -> Self {
        debug.clone_into(&mut self.debug_flag);
        output.clone_into(&mut self.output_flag);
        classpath.clone_into(&mut self.classpath_flag);
        self
    }

    /// Arguments placed before the source files
    #[must_use]
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Replace the source and unit extensions
    #[must_use]
    pub fn with_extensions(mut self, source: &str, unit: &str) -> Self {
        source.clone_into(&mut self.source_extension);
        unit.clone_into(&mut self.unit_extension);
        self
    }

    /// Arguments for `request`, program excluded
    #[must_use]
    pub fn arguments(&self, request: &CompileRequest) -> Vec<OsString> {
        let mut args = Vec::new();
        if request.debug_info && !self.debug_flag.is_empty() {
            args.push(OsString::from(&self.debug_flag));
        }
        args.push(OsString::from(&self.output_flag));
        args.push(request.output_dir.clone().into_os_string());
        if !request.classpath.is_empty() {
            args.push(OsString::from(&self.classpath_flag));
            let mut joined = OsString::new();
            for (i, entry) in request.classpath.iter().enumerate() {
                if i > 0 {
                    joined.push(PATH_SEPARATOR.to_string());
                }
                joined.push(entry);
            }
            args.push(joined);
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args.extend(request.sources.iter().map(|s| s.clone().into_os_string()));
        args
    }

    fn snapshot(&self, dir: &Path) -> BTreeMap<PathBuf, SystemTime> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| x == self.unit_extension)
            })
            .filter_map(|e| {
                let modified = e.metadata().ok()?.modified().ok()?;
                Some((e.into_path(), modified))
            })
            .collect()
    }
}

/// Diagnostics found in compiler output
///
/// Lines that don't look like a diagnostic (source excerpts, carets,
/// summaries) are skipped.
fn parse_diagnostics(pattern: &Regex, output: &str) -> Vec<Diagnostic> {
    output
        .lines()
        .filter_map(|line| {
            let captures = pattern.captures(line)?;
            let severity = match &captures[3] {
                "error" => Severity::Error,
                "warning" => Severity::Warning,
                _ => Severity::Note,
            };
            Some(Diagnostic {
                severity,
                file: captures.get(1).map(|m| PathBuf::from(m.as_str())),
                line: captures.get(2).and_then(|m| m.as_str().parse().ok()),
                message: captures[4].to_string(),
            })
        })
        .collect()
}

impl Compiler for CommandCompiler {
    fn source_extension(&self) -> &str {
        &self.source_extension
    }

    fn unit_extension(&self) -> &str {
        &self.unit_extension
    }

    fn compile(&self, request: &CompileRequest) -> ActionResult<CompileOutcome> {
        let pattern = Regex::new(DIAGNOSTIC_PATTERN)
            .map_err(|e| ActionError::Internal(format!("invalid diagnostic pattern: {e}")))?;
        fs::create_dir_all(&request.output_dir).map_err(|e| ActionError::Io {
            context: "Failed to create output directory",
            path: request.output_dir.clone(),
            source: e,
        })?;

        let before = self.snapshot(&request.output_dir);
        let args = self.arguments(request);
        debug!(
            "Compiling {} source(s) into {}",
            request.sources.len(),
            request.output_dir.display()
        );
        trace!("{} {:?}", self.program.to_string_lossy(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| ActionError::CompilerUnavailable(format!("{}: {e}", self.program.to_string_lossy())))?;

        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        let mut diagnostics = parse_diagnostics(&pattern, &text);

        let success = output.status.success();
        if !success && !diagnostics.iter().any(|d| d.severity == Severity::Error) {
            diagnostics.push(Diagnostic::error(format!(
                "{} exited with {}",
                self.program.to_string_lossy(),
                output.status
            )));
        }

        let units = self
            .snapshot(&request.output_dir)
            .into_iter()
            .filter(|(path, modified)| before.get(path) != Some(modified))
            .map(|(path, _)| path)
            .collect();

        Ok(CompileOutcome {
            success,
            diagnostics,
            units,
        })
    }
}
