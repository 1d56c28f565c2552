//! Project shape: source groups and where external archives live
//!
//! A [`ProjectDescriptor`] is built once through [`ProjectBuilder`] and is
//! immutable afterwards. The builder refuses further declarations once it
//! has been built.

use convenient_actions::compiler::library_archives;
use convenient_actions::defaults::{LIBRARY_PATH, SOURCE_PATH, TEST_SOURCE_PATH};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while declaring a project
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectError {
    /// A declaration arrived after the descriptor was built
    #[error("The project description was already finalized")]
    Finalized,

    /// A declared path was empty
    #[error("Empty path given to {0}")]
    EmptyPath(&'static str),

    /// The declaration source could not be interpreted
    #[error("Cannot read project declaration in {}: {reason}", .file.display())]
    Declaration {
        /// Build descriptor
        file: PathBuf,
        /// What was wrong
        reason: String,
    },
}

/// A declared path and whether its absence is tolerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredPath {
    /// Path relative to the project root
    pub path: PathBuf,
    /// Absence is not an error
    pub optional: bool,
}

/// Immutable description of one project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDescriptor {
    source_groups: Vec<DeclaredPath>,
    archive_dirs: Vec<DeclaredPath>,
    archive_files: Vec<PathBuf>,
}

impl ProjectDescriptor {
    /// Start declaring a project
    #[must_use]
    pub fn builder() -> ProjectBuilder {
        ProjectBuilder::default()
    }

    /// Conventional layout: `src`, optional `test`, optional archive dir `lib`
    #[must_use]
    pub fn conventional() -> Self {
        Self {
            source_groups: vec![
                DeclaredPath {
                    path: PathBuf::from(SOURCE_PATH),
                    optional: false,
                },
                DeclaredPath {
                    path: PathBuf::from(TEST_SOURCE_PATH),
                    optional: true,
                },
            ],
            archive_dirs: vec![DeclaredPath {
                path: PathBuf::from(LIBRARY_PATH),
                optional: true,
            }],
            archive_files: Vec::new(),
        }
    }

    /// Source groups in declaration order
    #[must_use]
    pub fn source_groups(&self) -> &[DeclaredPath] {
        &self.source_groups
    }

    /// Directories whose archives go on the classpath
    #[must_use]
    pub fn archive_dirs(&self) -> &[DeclaredPath] {
        &self.archive_dirs
    }

    /// Archive files put on the classpath as-is
    #[must_use]
    pub fn archive_files(&self) -> &[PathBuf] {
        &self.archive_files
    }

    /// Whether `group` was declared optional
    #[must_use]
    pub fn is_source_optional(&self, group: &Path) -> bool {
        self.source_groups.iter().any(|g| g.path == group && g.optional)
    }

    /// Compile classpath of the project
    ///
    /// Explicit archive files that can't be read are skipped with a warning.
    /// Every library archive directly inside an archive directory is added;
    /// a missing directory warns unless it is optional.
    #[must_use]
    pub fn classpath(&self, root: &Path) -> Vec<PathBuf> {
        debug!("Calculating classpath");
        let mut classpath = Vec::new();

        for file in &self.archive_files {
            let file = root.join(file);
            if file.is_file() && File::open(&file).is_ok() {
                debug!("Added {}", file.display());
                push_unique(&mut classpath, file);
            } else {
                warn!("Could not be read: {}", file.display());
            }
        }

        for dir in &self.archive_dirs {
            let path = root.join(&dir.path);
            if path.is_dir() {
                debug!("Adding all archives from {}", path.display());
                for archive in library_archives(&path) {
                    push_unique(&mut classpath, archive);
                }
            } else if !dir.optional {
                warn!("Could not read directory {}", path.display());
            }
        }

        classpath
    }
}

fn push_unique(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}

fn push_declared(paths: &mut Vec<DeclaredPath>, path: PathBuf, optional: bool) {
    match paths.iter_mut().find(|p| p.path == path) {
        // a later required declaration wins over an optional one
        Some(existing) => existing.optional &= optional,
        None => paths.push(DeclaredPath { path, optional }),
    }
}

/// Collects declarations until [`build`](ProjectBuilder::build) is called
#[derive(Debug, Default)]
pub struct ProjectBuilder {
    project: ProjectDescriptor,
    finalized: bool,
}

impl ProjectBuilder {
    /// Start from the conventional layout
    #[must_use]
    pub fn conventional() -> Self {
        Self {
            project: ProjectDescriptor::conventional(),
            finalized: false,
        }
    }

    fn declare(
        &mut self,
        operation: &'static str,
        path: PathBuf,
        apply: impl FnOnce(&mut ProjectDescriptor, PathBuf),
    ) -> Result<&mut Self, ProjectError> {
        if self.finalized {
            return Err(ProjectError::Finalized);
        }
        if path.as_os_str().is_empty() {
            return Err(ProjectError::EmptyPath(operation));
        }
        apply(&mut self.project, path);
        Ok(self)
    }

    /// Declare a required source group
    ///
    /// # Errors
    ///
    /// [`ProjectError::Finalized`] after [`build`](Self::build), or an empty path.
    pub fn source_path(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self, ProjectError> {
        self.declare("sourcePath", path.into(), |p, path| {
            push_declared(&mut p.source_groups, path, false);
        })
    }

    /// Declare a source group that may be missing
    ///
    /// # Errors
    ///
    /// See [`source_path`](Self::source_path).
    pub fn optional_source_path(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self, ProjectError> {
        self.declare("optionalSourcePath", path.into(), |p, path| {
            push_declared(&mut p.source_groups, path, true);
        })
    }

    /// Declare a required archive directory
    ///
    /// # Errors
    ///
    /// See [`source_path`](Self::source_path).
    pub fn archive_dir(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self, ProjectError> {
        self.declare("jarPath", path.into(), |p, path| {
            push_declared(&mut p.archive_dirs, path, false);
        })
    }

    /// Declare an archive directory that may be missing
    ///
    /// # Errors
    ///
    /// See [`source_path`](Self::source_path).
    pub fn optional_archive_dir(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self, ProjectError> {
        self.declare("optionalJarPath", path.into(), |p, path| {
            push_declared(&mut p.archive_dirs, path, true);
        })
    }

    /// Declare one archive file
    ///
    /// # Errors
    ///
    /// See [`source_path`](Self::source_path).
    pub fn archive_file(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self, ProjectError> {
        self.declare("jarFile", path.into(), |p, path| {
            push_unique(&mut p.archive_files, path);
        })
    }

    /// Seal the declarations
    ///
    /// # Errors
    ///
    /// [`ProjectError::Finalized`] when called twice.
    pub fn build(&mut self) -> Result<ProjectDescriptor, ProjectError> {
        if self.finalized {
            return Err(ProjectError::Finalized);
        }
        self.finalized = true;
        Ok(std::mem::take(&mut self.project))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    #[test]
    fn test_insertion_order_and_duplicates() {
        let mut builder = ProjectDescriptor::builder();
        let _ = builder
            .source_path("src")
            .unwrap()
            .optional_source_path("gen")
            .unwrap()
            .source_path("test")
            .unwrap()
            .source_path("src")
            .unwrap();
        let project = builder.build().unwrap();

        let groups: Vec<_> = project.source_groups().iter().map(|g| g.path.clone()).collect();
        assert_eq!(groups, vec![PathBuf::from("src"), PathBuf::from("gen"), PathBuf::from("test")]);
        assert!(project.is_source_optional(Path::new("gen")));
        assert!(!project.is_source_optional(Path::new("src")));
    }

    #[test]
    fn test_required_declaration_overrides_optional() {
        let mut builder = ProjectDescriptor::builder();
        let _ = builder.optional_archive_dir("lib").unwrap().archive_dir("lib").unwrap();
        let project = builder.build().unwrap();
        assert_eq!(project.archive_dirs().len(), 1);
        assert!(!project.archive_dirs()[0].optional);
    }

    #[test]
    fn test_declarations_after_build_fail() {
        let mut builder = ProjectDescriptor::builder();
        let _ = builder.source_path("src").unwrap();
        let _ = builder.build().unwrap();

        assert_eq!(builder.source_path("more").unwrap_err(), ProjectError::Finalized);
        assert_eq!(builder.archive_file("x.jar").unwrap_err(), ProjectError::Finalized);
        assert_eq!(builder.build().unwrap_err(), ProjectError::Finalized);
    }

    #[test]
    fn test_empty_path_rejected() {
        let mut builder = ProjectDescriptor::builder();
        assert_eq!(
            builder.source_path("").unwrap_err(),
            ProjectError::EmptyPath("sourcePath")
        );
    }

    #[test]
    fn test_conventional_layout() {
        let project = ProjectBuilder::conventional().build().unwrap();
        assert_eq!(project, ProjectDescriptor::conventional());
        assert!(project.is_source_optional(Path::new("test")));
        assert!(project.archive_dirs()[0].optional);
    }

    #[test]
    #[traced_test]
    fn test_classpath_assembly() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/a.jar"), "").unwrap();
        fs::write(dir.path().join("lib/B.JAR"), "").unwrap();
        fs::write(dir.path().join("lib/notes.txt"), "").unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/junit.jar"), "").unwrap();

        let mut builder = ProjectDescriptor::builder();
        let _ = builder
            .archive_dir("lib")
            .unwrap()
            .optional_archive_dir("optional-libs")
            .unwrap()
            .archive_dir("required-libs")
            .unwrap()
            .archive_file("dist/junit.jar")
            .unwrap()
            .archive_file("dist/missing.jar")
            .unwrap();
        let project = builder.build().unwrap();

        let mut classpath = project.classpath(dir.path());
        classpath.sort();
        assert_eq!(
            classpath,
            vec![
                dir.path().join("dist/junit.jar"),
                dir.path().join("lib/B.JAR"),
                dir.path().join("lib/a.jar"),
            ]
        );
        assert!(logs_contain("Could not be read"));
        assert!(logs_contain("required-libs"));
        assert!(!logs_contain("optional-libs"));
    }
}
