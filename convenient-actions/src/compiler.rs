//! Compilation service contract
//!
//! The compiler is an external collaborator. Implementations receive the
//! source files, a classpath and an output directory, and report success,
//! diagnostics and the units they produced.

use crate::defaults::LIBRARY_EXTENSION;
use crate::error::{ActionError, ActionResult};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Input of one compiler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Source files to compile
    pub sources: Vec<PathBuf>,
    /// Archives and directories visible to the compiler
    pub classpath: Vec<PathBuf>,
    /// Where produced units go
    pub output_dir: PathBuf,
    /// Whether debug information is emitted
    pub debug_info: bool,
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational note
    Note,
    /// Warning, compilation continues
    Warning,
    /// Error, compilation failed
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Note => "note",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One compiler message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// File the message refers to
    pub file: Option<PathBuf>,
    /// 1-based line number
    pub line: Option<u32>,
    /// Message text
    pub message: String,
}

impl Diagnostic {
    /// Error diagnostic without location
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            file: None,
            line: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{line}: ", file.display())?,
            (Some(file), None) => write!(f, "{}: ", file.display())?,
            _ => {}
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Result of one compiler invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutcome {
    /// Whether the compiler reported success
    pub success: bool,
    /// Messages, in compiler order
    pub diagnostics: Vec<Diagnostic>,
    /// Produced units (absolute paths inside the output directory)
    pub units: Vec<PathBuf>,
}

impl CompileOutcome {
    /// Whether the compilation must be treated as failed
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.success || self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// External compilation service
pub trait Compiler: Send + Sync {
    /// Extension of source files this compiler accepts (without the dot)
    fn source_extension(&self) -> &str;

    /// Extension of produced units (without the dot)
    fn unit_extension(&self) -> &str;

    /// Compile `request.sources` into `request.output_dir`
    ///
    /// # Errors
    ///
    /// Only when the service cannot run at all. Source errors are reported
    /// through [`CompileOutcome::diagnostics`].
    fn compile(&self, request: &CompileRequest) -> ActionResult<CompileOutcome>;
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Non-hidden files under `dir`, recursively, sorted
///
/// `extension` filters by file extension when given.
///
/// # Errors
///
/// [`ActionError::MissingSource`] when `dir` is not a directory.
pub fn collect_files(dir: &Path, extension: Option<&str>) -> ActionResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ActionError::MissingSource(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            extension.is_none_or(|ext| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == ext)
            })
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Library archives directly inside `dir`, sorted
///
/// Unreadable directories yield an empty list.
#[must_use]
pub fn library_archives(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read library directory {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut archives: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(LIBRARY_EXTENSION))
        })
        .collect();
    archives.sort();
    archives
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_skips_hidden_and_filters() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/.git")).unwrap();
        fs::write(dir.path().join("a/One.java"), "").unwrap();
        fs::write(dir.path().join("a/notes.txt"), "").unwrap();
        fs::write(dir.path().join("a/.git/Two.java"), "").unwrap();
        fs::write(dir.path().join(".Hidden.java"), "").unwrap();

        let java = collect_files(dir.path(), Some("java")).unwrap();
        assert_eq!(java, vec![dir.path().join("a/One.java")]);

        let all = collect_files(dir.path(), None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_collect_files_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = collect_files(&dir.path().join("nope"), None).unwrap_err();
        assert!(matches!(err, ActionError::MissingSource(_)));
    }

    #[test]
    fn test_library_archives_top_level_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.jar"), "").unwrap();
        fs::write(dir.path().join("A.JAR"), "").unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();
        fs::write(dir.path().join("nested/c.jar"), "").unwrap();

        let archives = library_archives(dir.path());
        assert_eq!(
            archives,
            vec![dir.path().join("A.JAR"), dir.path().join("b.jar")]
        );
    }

    #[test]
    fn test_outcome_errors() {
        let mut outcome = CompileOutcome {
            success: true,
            ..CompileOutcome::default()
        };
        assert!(!outcome.has_errors());
        outcome.diagnostics.push(Diagnostic::error("bad"));
        assert!(outcome.has_errors());
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic {
            severity: Severity::Warning,
            file: Some(PathBuf::from("src/A.java")),
            line: Some(3),
            message: "unchecked".to_string(),
        };
        assert_eq!(diagnostic.to_string(), "src/A.java:3: warning: unchecked");
    }
}
