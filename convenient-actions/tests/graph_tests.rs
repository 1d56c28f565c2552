//! Whole-graph behavior: memoization across shared nodes, cache reuse and
//! isolated test execution

use convenient_actions::testing::{CopyCompiler, CountingArchiveWriter, archive_entries};
use convenient_actions::{
    Action, ActionError, ActionRef, BuildContext, Compilation, CompiledUnitCache, Jar, PathProducer,
    TestRun, TestRunner, Toolchain, Zip,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src/a")).unwrap();
    fs::write(dir.path().join("src/a/A.java"), "package a;\nclass A {}").unwrap();
    dir
}

#[test]
fn test_compilation_shared_by_jar_and_zip_runs_once() {
    let dir = project();
    let compiler = Arc::new(CopyCompiler::new());
    let writer = Arc::new(CountingArchiveWriter::new());
    let ctx = BuildContext::new(
        dir.path(),
        Toolchain::new(compiler.clone()).with_archiver(writer.clone()),
    );

    let compilation = Compilation::new().to("out/classes").unwrap();
    let jar = Jar::new()
        .from_compilation(compilation.clone())
        .unwrap()
        .to("out/x.jar")
        .unwrap();
    let first = Zip::new()
        .add_dir(compilation.clone(), "classes")
        .unwrap()
        .add_file(jar.clone(), "lib/")
        .unwrap()
        .to("out/first.zip")
        .unwrap();
    let second = Zip::new()
        .add_file(jar.clone(), ".")
        .unwrap()
        .to("out/second.zip")
        .unwrap();

    let targets: Vec<ActionRef> = vec![first.into(), second.into(), jar.clone().into()];
    for target in &targets {
        target.process(&ctx).unwrap();
    }

    assert_eq!(compiler.invocations(), 1);
    assert_eq!(writer.writes(), 3);
    assert!(jar.is_processed());
    assert_eq!(
        archive_entries(&dir.path().join("out/first.zip")).unwrap(),
        vec!["classes/a/A.class", "lib/x.jar"]
    );
    assert_eq!(
        archive_entries(&dir.path().join("out/second.zip")).unwrap(),
        vec!["x.jar"]
    );
}

#[test]
fn test_cached_group_is_copied_not_recompiled() {
    let dir = project();
    let cache_dir = TempDir::new().unwrap();
    fs::create_dir_all(cache_dir.path().join("a")).unwrap();
    fs::write(cache_dir.path().join("a/A.class"), "cached").unwrap();

    let mut builder = CompiledUnitCache::builder(cache_dir.path()).unwrap();
    let _ = builder
        .add(
            Path::new("src"),
            [dir.path().join("src/a/A.java")],
            [cache_dir.path().join("a/A.class")],
        )
        .unwrap();
    let cache = builder.commit().unwrap();

    let compiler = Arc::new(CopyCompiler::new());
    let ctx = BuildContext::new(dir.path(), Toolchain::new(compiler.clone()));
    ctx.install_cache(cache).unwrap();

    let jar = Jar::new().with_sources().unwrap().to("out/x.jar").unwrap();
    jar.process(&ctx).unwrap();

    assert_eq!(compiler.invocations(), 0);
    assert_eq!(
        archive_entries(&dir.path().join("out/x.jar")).unwrap(),
        vec!["a/A.class", "a/A.java"]
    );
}

#[test]
fn test_second_cache_install_fails() {
    let dir = project();
    let ctx = BuildContext::new(dir.path(), Toolchain::new(Arc::new(CopyCompiler::new())));
    let first = CompiledUnitCache::builder(dir.path()).unwrap().commit().unwrap();
    let second = CompiledUnitCache::builder(dir.path()).unwrap().commit().unwrap();

    ctx.install_cache(first).unwrap();
    assert!(matches!(
        ctx.install_cache(second),
        Err(ActionError::CacheAlreadyInstalled)
    ));
}

#[test]
fn test_failed_dependency_fails_parent_and_allows_retry() {
    let dir = project();
    fs::write(dir.path().join("src/a/B.java"), "COMPILE_ERROR").unwrap();
    let ctx = BuildContext::new(dir.path(), Toolchain::new(Arc::new(CopyCompiler::new())));

    let compilation = Compilation::new();
    let jar = Jar::new().from_compilation(compilation.clone()).unwrap();

    let err = jar.process(&ctx).unwrap_err();
    assert!(matches!(err, ActionError::CompilationFailed { .. }));
    assert!(!jar.is_processed());
    assert!(!compilation.is_processed());

    fs::remove_file(dir.path().join("src/a/B.java")).unwrap();
    let classes = compilation.path(&ctx).unwrap();
    assert!(classes.join("a/A.class").is_file());
}

/// Runner script standing in for the test runner program
///
/// Invoked as `runner --cp <classpath> <entry> <results> <tests...>`.
#[cfg(unix)]
const RUNNER_SCRIPT: &str = r#"#!/bin/sh
shift 3
results="$1"
shift
case " $* " in
  *" a.Failing "*)
    printf 'success=false\nfailed=1\nignored=0\ntotal=%s\nruntime=5\nfailedtests=boom(a.Failing)\nboom(a.Failing)=expected\\: 1\n' "$#" > "$results"
    exit 1 ;;
esac
printf 'success=true\nfailed=0\nignored=0\ntotal=%s\nruntime=5\nfailedtests=\n' "$#" > "$results"
"#;

#[cfg(unix)]
fn runner_context(dir: &Path) -> (PathBuf, BuildContext) {
    use convenient_launch::{Runtime, SystemArchives};
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("runner.sh");
    fs::write(&script, RUNNER_SCRIPT).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let toolchain = Toolchain::new(Arc::new(CopyCompiler::new()))
        .with_runtime(Runtime::new(script.clone(), "--cp"))
        .with_system_archives(SystemArchives::Disabled)
        .with_test_runner(TestRunner {
            entry_point: "fake.Runner".to_string(),
            required_symbols: Vec::new(),
        });
    (script, BuildContext::new(dir, toolchain))
}

// Both runs share one test so only a single test in this binary spawns
// the freshly written script.
#[cfg(unix)]
#[test]
fn test_run_reports_success_and_failure() {
    let dir = project();
    fs::create_dir_all(dir.path().join("test/fake")).unwrap();
    fs::write(dir.path().join("test/fake/Runner.java"), "package fake;").unwrap();
    fs::write(dir.path().join("test/ATest.java"), "class ATest {}").unwrap();
    let (_script, ctx) = runner_context(dir.path());

    let passing = TestRun::new().run(["ATest", "BTest"]).unwrap();
    passing.process(&ctx).unwrap();
    let report = passing.report().unwrap();
    assert!(report.success);
    assert_eq!(report.total, 2);

    let failing = TestRun::new().run(["ATest", "a.Failing"]).unwrap();
    let err = failing.process(&ctx).unwrap_err();
    assert!(matches!(err, ActionError::ProcessFailed { action: "TestRun", code: 1 }));
    let report = failing.report().unwrap();
    assert!(!report.success);
    assert_eq!(report.failures[0].header, "boom(a.Failing)");
    assert_eq!(report.failures[0].trace, "expected: 1");
}
