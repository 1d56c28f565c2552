//! The built-in `Default` descriptor
//!
//! Used for projects whose `bob/Default.java` only declares the project
//! shape. Its targets follow the conventional layout.

use crate::defaults::SOURCE_EXTENSION;
use crate::descriptor::Descriptor;
use crate::target::MethodInfo;
use convenient_actions::defaults::TEST_SOURCE_PATH;
use convenient_actions::{ActionResult, Clean, Jar, TestRun, War};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the built-in descriptor
pub const DEFAULT_DESCRIPTOR: &str = "Default";

const TEST_SUFFIX: &str = "Test";

/// State of the built-in descriptor: the project root
#[derive(Debug, Clone)]
pub struct Conventional {
    root: PathBuf,
}

impl Default for Conventional {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl Conventional {
    fn tests(&self) -> ActionResult<TestRun> {
        TestRun::new().run(discover_tests(&self.root.join(TEST_SOURCE_PATH)))
    }
}

/// Dotted names of the `*Test` sources under `dir`, sorted
#[must_use]
pub fn discover_tests(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(dir).ok()?;
            if relative.extension()?.to_str()? != SOURCE_EXTENSION {
                return None;
            }
            let stem = relative.file_stem()?.to_str()?;
            if !stem.ends_with(TEST_SUFFIX) {
                return None;
            }
            let package: Vec<&str> = relative
                .parent()
                .into_iter()
                .flat_map(|p| p.components())
                .filter_map(|c| c.as_os_str().to_str())
                .collect();
            Some(if package.is_empty() {
                stem.to_string()
            } else {
                format!("{}.{stem}", package.join("."))
            })
        })
        .collect();
    names.sort();
    names
}

/// The built-in descriptor
#[must_use]
pub fn default_descriptor() -> Descriptor<Conventional> {
    Descriptor::new(DEFAULT_DESCRIPTOR)
        .default_target("build", |_: &Conventional| Jar::new().with_sources())
        .target("jar", |_: &Conventional| Jar::new())
        .target("war", |_: &Conventional| War::new())
        .target("test", Conventional::tests)
        .target("clean", |_: &Conventional| Clean::new())
        .method(MethodInfo::plain("describeProject").returning_action(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::BuildModule;
    use crate::target::TargetResolver;
    use convenient_actions::Action;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_tests() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/ParserTest.java"), "").unwrap();
        fs::write(dir.path().join("a/Helper.java"), "").unwrap();
        fs::write(dir.path().join("RootTest.java"), "").unwrap();
        fs::write(dir.path().join("NotesTest.txt"), "").unwrap();

        assert_eq!(discover_tests(dir.path()), vec!["RootTest", "a.b.ParserTest"]);
        assert!(discover_tests(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_default_descriptor_targets() {
        let descriptor = default_descriptor();
        let resolver = TargetResolver::new("build");
        let listed: Vec<String> = resolver
            .list(&descriptor.methods())
            .into_iter()
            .map(|t| if t.is_default { format!("{} (default)", t.name) } else { t.name })
            .collect();
        assert_eq!(listed, vec!["build (default)", "clean", "jar", "test", "war"]);
        assert_eq!(descriptor.invoke("war").unwrap().kind(), "War");
    }
}
