//! Deterministic fake collaborators for tests
//!
//! [`CopyCompiler`] "compiles" `X.java` into `X.class` by copying the
//! source. A `package a.b;` line places the unit under `a/b/`, and a source
//! containing [`COMPILE_ERROR_MARKER`] fails with one error diagnostic.

use crate::archive::{ArchiveEntry, ArchiveWriter, TarArchiveWriter};
use crate::compiler::{CompileOutcome, CompileRequest, Compiler, Diagnostic, Severity};
use crate::error::{ActionError, ActionResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source text that makes [`CopyCompiler`] report an error
pub const COMPILE_ERROR_MARKER: &str = "COMPILE_ERROR";

/// Fake compiler that copies sources to units
#[derive(Debug)]
pub struct CopyCompiler {
    source_extension: String,
    unit_extension: String,
    invocations: AtomicUsize,
    requests: Mutex<Vec<CompileRequest>>,
}

impl Default for CopyCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyCompiler {
    /// Compiler for `.java` sources and `.class` units
    #[must_use]
    pub fn new() -> Self {
        Self::with_extensions("java", "class")
    }

    /// Compiler with custom extensions
    #[must_use]
    pub fn with_extensions(source: &str, unit: &str) -> Self {
        Self {
            source_extension: source.to_string(),
            unit_extension: unit.to_string(),
            invocations: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of compile calls so far
    #[must_use]
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Every request received, in order
    #[must_use]
    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn unit_path(&self, source: &Path, text: &str, output: &Path) -> PathBuf {
        let package = text
            .lines()
            .map(str::trim)
            .find_map(|l| l.strip_prefix("package "))
            .map(|p| p.trim_end_matches(';').trim().replace('.', "/"));
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut unit = output.to_path_buf();
        if let Some(package) = package.filter(|p| !p.is_empty()) {
            unit.push(package);
        }
        unit.push(format!("{stem}.{}", self.unit_extension));
        unit
    }
}

impl Compiler for CopyCompiler {
    fn source_extension(&self) -> &str {
        &self.source_extension
    }

    fn unit_extension(&self) -> &str {
        &self.unit_extension
    }

    fn compile(&self, request: &CompileRequest) -> ActionResult<CompileOutcome> {
        let _ = self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut outcome = CompileOutcome {
            success: true,
            ..CompileOutcome::default()
        };
        for source in &request.sources {
            let text = fs::read_to_string(source)
                .map_err(|e| ActionError::io("Failed to read source", source, e))?;
            if text.contains(COMPILE_ERROR_MARKER) {
                outcome.success = false;
                outcome.diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    file: Some(source.clone()),
                    line: Some(1),
                    message: "cannot compile".to_string(),
                });
                continue;
            }

            let unit = self.unit_path(source, &text, &request.output_dir);
            if let Some(parent) = unit.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ActionError::io("Failed to create directory", parent, e))?;
            }
            fs::write(&unit, &text).map_err(|e| ActionError::io("Failed to write unit", &unit, e))?;
            outcome.units.push(unit);
        }
        Ok(outcome)
    }
}

/// Tar writer that counts how many archives it wrote
#[derive(Debug, Default)]
pub struct CountingArchiveWriter {
    writes: AtomicUsize,
}

impl CountingArchiveWriter {
    /// Fresh writer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of archives written
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ArchiveWriter for CountingArchiveWriter {
    fn write(
        &self,
        destination: &Path,
        entries: &[ArchiveEntry],
        manifest: Option<&Path>,
    ) -> ActionResult<()> {
        let _ = self.writes.fetch_add(1, Ordering::SeqCst);
        TarArchiveWriter.write(destination, entries, manifest)
    }
}

/// Entry names of a tar archive written by [`TarArchiveWriter`]
///
/// # Errors
///
/// I/O failures while reading the archive.
pub fn archive_entries(path: &Path) -> ActionResult<Vec<String>> {
    let file = fs::File::open(path).map_err(|e| ActionError::io("Failed to open archive", path, e))?;
    let mut archive = tar::Archive::new(file);
    let entries = archive
        .entries()
        .map_err(|e| ActionError::io("Failed to read archive", path, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ActionError::io("Failed to read archive", path, e))?;
        let name = entry
            .path()
            .map_err(|e| ActionError::io("Failed to read archive", path, e))?
            .to_string_lossy()
            .into_owned();
        names.push(name);
    }
    names.sort();
    Ok(names)
}
