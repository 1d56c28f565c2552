//! Jar and war packagers
//!
//! Both take compiled units either from a chained [`Compilation`] (implicit
//! when nothing is declared) or from a pre-built directory, optionally add
//! sources, and write one archive. A war additionally merges a web content
//! directory at the archive root and places units under `WEB-INF/classes/`.

use crate::action::{Action, ActionRef, FileProducer};
use crate::compilation::Compilation;
use crate::context::BuildContext;
use crate::error::ActionResult;
use crate::packager::PackagerNode;
use std::path::PathBuf;
use std::rc::Rc;

/// Shared handle to a jar packager
#[derive(Debug, Clone)]
pub struct Jar(Rc<PackagerNode>);

impl Default for Jar {
    fn default() -> Self {
        Self::new()
    }
}

impl Jar {
    /// Jar of the conventional source group at the conventional destination
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(PackagerNode::jar()))
    }

    /// Take compiled units from `compilation`
    ///
    /// # Errors
    ///
    /// A state error when a class source was already declared or the node
    /// was processed.
    pub fn from_compilation(self, compilation: Compilation) -> ActionResult<Self> {
        self.0.classes_from_compilation(compilation)?;
        Ok(self)
    }

    /// Take compiled units from a pre-built directory
    ///
    /// # Errors
    ///
    /// A state error when a class source was already declared, when sources
    /// were requested from a compilation, or after processing.
    pub fn from_path(self, dir: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.classes_from_dir(dir.into())?;
        Ok(self)
    }

    /// Include the chained compilation's sources
    ///
    /// # Errors
    ///
    /// A state error when sources were already declared, when classes come
    /// from a pre-built directory, or after processing.
    pub fn with_sources(self) -> ActionResult<Self> {
        self.0.include_sources()?;
        Ok(self)
    }

    /// Include sources from `dir`
    ///
    /// # Errors
    ///
    /// A state error when sources were already declared or after processing.
    pub fn with_sources_from(self, dir: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.include_sources_from(dir.into())?;
        Ok(self)
    }

    /// Embed the manifest at `path`
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn with_manifest_from(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.manifest_from(path.into())?;
        Ok(self)
    }

    /// Archive destination
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn to(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.destination(path.into())?;
        Ok(self)
    }
}

/// Shared handle to a web-archive packager
#[derive(Debug, Clone)]
pub struct War(Rc<PackagerNode>);

impl Default for War {
    fn default() -> Self {
        Self::new()
    }
}

impl War {
    /// War of the conventional layout
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(PackagerNode::war()))
    }

    /// Take compiled units from `compilation`
    ///
    /// # Errors
    ///
    /// See [`Jar::from_compilation`].
    pub fn from_compilation(self, compilation: Compilation) -> ActionResult<Self> {
        self.0.classes_from_compilation(compilation)?;
        Ok(self)
    }

    /// Take compiled units from a pre-built directory
    ///
    /// # Errors
    ///
    /// See [`Jar::from_path`].
    pub fn from_path(self, dir: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.classes_from_dir(dir.into())?;
        Ok(self)
    }

    /// Include the chained compilation's sources
    ///
    /// # Errors
    ///
    /// See [`Jar::with_sources`].
    pub fn with_sources(self) -> ActionResult<Self> {
        self.0.include_sources()?;
        Ok(self)
    }

    /// Include sources from `dir`
    ///
    /// # Errors
    ///
    /// See [`Jar::with_sources_from`].
    pub fn with_sources_from(self, dir: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.include_sources_from(dir.into())?;
        Ok(self)
    }

    /// Embed the manifest at `path`
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn with_manifest_from(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.manifest_from(path.into())?;
        Ok(self)
    }

    /// Merge `dir` at the archive root
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn with_web_content_from(self, dir: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.web_content_from(dir.into())?;
        Ok(self)
    }

    /// Use `path` as `WEB-INF/web.xml`, whatever the content directory holds
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn with_web_xml_from(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.web_xml_from(path.into())?;
        Ok(self)
    }

    /// Archive destination
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn to(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.destination(path.into())?;
        Ok(self)
    }
}

macro_rules! packager_action {
    ($handle:ident) => {
        impl Action for $handle {
            fn kind(&self) -> &'static str {
                self.0.kind()
            }

            fn process(&self, ctx: &BuildContext) -> ActionResult<()> {
                self.0.process(ctx)
            }

            fn is_processed(&self) -> bool {
                self.0.is_processed()
            }
        }

        impl FileProducer for $handle {
            fn file(&self, ctx: &BuildContext) -> ActionResult<PathBuf> {
                self.0.file(ctx)
            }
        }

        impl From<$handle> for ActionRef {
            fn from(handle: $handle) -> Self {
                Rc::new(handle)
            }
        }
    };
}

packager_action!(Jar);
packager_action!(War);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Toolchain;
    use crate::error::ActionError;
    use crate::testing::{CopyCompiler, archive_entries};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<CopyCompiler>, BuildContext) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/a")).unwrap();
        fs::write(dir.path().join("src/a/A.java"), "package a;\nclass A {}").unwrap();
        let compiler = Arc::new(CopyCompiler::new());
        let ctx = BuildContext::new(dir.path(), Toolchain::new(compiler.clone()));
        (dir, compiler, ctx)
    }

    #[test]
    fn test_jar_with_sources() {
        let (dir, _compiler, ctx) = setup();
        let jar = Jar::new().with_sources().unwrap().to("out/x.jar").unwrap();

        let file = jar.file(&ctx).unwrap();

        assert_eq!(file, dir.path().join("out/x.jar"));
        assert_eq!(archive_entries(&file).unwrap(), vec!["a/A.class", "a/A.java"]);
    }

    #[test]
    fn test_jar_defaults_to_conventional_destination() {
        let (dir, _compiler, ctx) = setup();
        let file = Jar::new().file(&ctx).unwrap();
        assert_eq!(file, dir.path().join("artifacts/build.jar"));
    }

    #[test]
    fn test_jar_replaces_existing_destination() {
        let (dir, _compiler, ctx) = setup();
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("out/x.jar"), "stale").unwrap();

        let file = Jar::new().to("out/x.jar").unwrap().file(&ctx).unwrap();
        assert_eq!(archive_entries(&file).unwrap(), vec!["a/A.class"]);
    }

    #[test]
    fn test_jar_from_prebuilt_directory() {
        let (dir, compiler, ctx) = setup();
        fs::create_dir_all(dir.path().join("classes/p")).unwrap();
        fs::write(dir.path().join("classes/p/P.class"), "").unwrap();

        let file = Jar::new()
            .from_path("classes")
            .unwrap()
            .with_sources_from("src")
            .unwrap()
            .file(&ctx)
            .unwrap();

        assert_eq!(archive_entries(&file).unwrap(), vec!["a/A.java", "p/P.class"]);
        assert_eq!(compiler.invocations(), 0);
    }

    #[test]
    fn test_manifest_embedded_when_readable() {
        let (dir, _compiler, ctx) = setup();
        fs::create_dir_all(dir.path().join("META-INF")).unwrap();
        fs::write(dir.path().join("META-INF/MANIFEST.MF"), "Manifest-Version: 1.0\n").unwrap();

        let file = Jar::new().file(&ctx).unwrap();
        assert!(archive_entries(&file).unwrap().contains(&"META-INF/MANIFEST.MF".to_string()));
    }

    #[test]
    fn test_embedded_manifest_replaces_one_among_classes() {
        let (dir, _compiler, ctx) = setup();
        fs::create_dir_all(dir.path().join("classes/META-INF")).unwrap();
        fs::write(dir.path().join("classes/META-INF/MANIFEST.MF"), "stale\n").unwrap();
        fs::write(dir.path().join("classes/P.class"), "").unwrap();
        fs::write(dir.path().join("app.MF"), "Manifest-Version: 1.0\n").unwrap();

        let file = Jar::new()
            .from_path("classes")
            .unwrap()
            .with_manifest_from("app.MF")
            .unwrap()
            .file(&ctx)
            .unwrap();

        assert_eq!(archive_entries(&file).unwrap(), vec!["META-INF/MANIFEST.MF", "P.class"]);
    }

    #[test]
    fn test_unreadable_manifest_is_omitted() {
        let (_dir, _compiler, ctx) = setup();
        let file = Jar::new()
            .with_manifest_from("does/not/exist.MF")
            .unwrap()
            .file(&ctx)
            .unwrap();
        assert_eq!(archive_entries(&file).unwrap(), vec!["a/A.class"]);
    }

    #[test]
    fn test_two_class_sources_fail_at_second_call() {
        let err = Jar::new()
            .from_path("classes")
            .unwrap()
            .from_compilation(Compilation::new())
            .unwrap_err();
        assert!(matches!(err, ActionError::State { action: "Jar", .. }));
    }

    #[test]
    fn test_prebuilt_classes_conflict_with_compilation_sources() {
        let err = Jar::new()
            .with_sources()
            .unwrap()
            .from_path("classes")
            .unwrap_err();
        assert!(matches!(err, ActionError::State { .. }));

        let err = Jar::new()
            .from_path("classes")
            .unwrap()
            .with_sources()
            .unwrap_err();
        assert!(matches!(err, ActionError::State { .. }));
    }

    #[test]
    fn test_two_source_declarations_fail() {
        let err = Jar::new()
            .with_sources()
            .unwrap()
            .with_sources_from("elsewhere")
            .unwrap_err();
        assert!(matches!(err, ActionError::State { .. }));
    }

    #[test]
    fn test_setter_after_process_fails() {
        let (_dir, _compiler, ctx) = setup();
        let jar = Jar::new();
        jar.process(&ctx).unwrap();
        assert!(jar.is_processed());

        let err = jar.clone().to("other.jar").unwrap_err();
        assert!(matches!(err, ActionError::State { .. }));
    }

    #[test]
    fn test_war_layout_and_web_xml_override() {
        let (dir, _compiler, ctx) = setup();
        let content = dir.path().join("WebContent");
        fs::create_dir_all(content.join("WEB-INF")).unwrap();
        fs::create_dir_all(content.join("META-INF")).unwrap();
        fs::write(content.join("index.html"), "<html/>").unwrap();
        fs::write(content.join("WEB-INF/web.xml"), "content").unwrap();
        fs::write(content.join("META-INF/MANIFEST.MF"), "Manifest-Version: 1.0\n").unwrap();
        fs::write(dir.path().join("override.xml"), "override").unwrap();

        let file = War::new()
            .with_web_xml_from("override.xml")
            .unwrap()
            .file(&ctx)
            .unwrap();

        assert_eq!(file, dir.path().join("artifacts/build.war"));
        assert_eq!(
            archive_entries(&file).unwrap(),
            vec![
                "META-INF/MANIFEST.MF",
                "WEB-INF/classes/a/A.class",
                "WEB-INF/web.xml",
                "index.html",
            ]
        );

        let mut archive = tar::Archive::new(fs::File::open(&file).unwrap());
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let is_web_xml = entry.path().unwrap().to_string_lossy() == "WEB-INF/web.xml";
            if is_web_xml {
                let mut text = String::new();
                let _ = std::io::Read::read_to_string(&mut entry, &mut text).unwrap();
                assert_eq!(text, "override");
            }
        }
    }
}
