//! End-to-end bootstrap tests with the copying test compiler

use bob::{
    BobConfig, BootstrapError, BootstrapOrchestrator, Descriptor, ErrorKind, Invocation, Outcome,
    Registry,
};
use convenient_actions::testing::{COMPILE_ERROR_MARKER, CopyCompiler, archive_entries};
use convenient_actions::{Jar, Toolchain};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project(descriptor_body: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/A.java", "class A {}");
    write(
        dir.path(),
        "bob/Default.java",
        &format!("public class Default {{\n{descriptor_body}\n}}\n"),
    );
    dir
}

fn registry() -> Registry {
    Registry::new().register(
        Descriptor::<()>::new("Default")
            .default_target("build", |_: &()| Jar::new().with_sources()?.to("out/x.jar"))
            .target("war", |_: &()| convenient_actions::War::new()),
    )
}

fn orchestrator(root: &Path, compiler: Arc<CopyCompiler>) -> BootstrapOrchestrator {
    BootstrapOrchestrator::new(root, BobConfig::default(), registry())
        .unwrap()
        .with_toolchain(Toolchain::new(compiler))
}

#[test]
fn test_cold_then_warm_builds_default_target() {
    let dir = project("");
    let compiler = Arc::new(CopyCompiler::new());
    let orchestrator = orchestrator(dir.path(), compiler.clone());

    let prepared = orchestrator
        .prepare(&dir.path().join("bob/Default.java"))
        .unwrap();
    let warm = Invocation {
        handoff: Some(prepared.path().to_path_buf()),
        ..Invocation::default()
    };
    assert_eq!(orchestrator.run(&warm).unwrap(), Outcome::Built);

    let archive = dir.path().join("out/x.jar");
    assert!(archive.is_file());
    let entries = archive_entries(&archive).unwrap();
    assert!(entries.contains(&"A.class".to_string()));
    assert!(entries.contains(&"A.java".to_string()));

    // the source group came from the cache; only the descriptor was compiled again
    let requests = compiler.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].sources,
        vec![dir.path().join("bob/Default.java")]
    );
}

#[test]
fn test_listing_names_every_target() {
    let dir = project("");
    let compiler = Arc::new(CopyCompiler::new());
    let invocation = Invocation {
        list_targets: true,
        ..Invocation::default()
    };

    let outcome = orchestrator(dir.path(), compiler.clone())
        .run(&invocation)
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Listed(
            "Build file bob/Default.java contains the following build targets:\n\
             build (default)\n\
             war\n"
                .to_string()
        )
    );
    assert_eq!(compiler.invocations(), 0);
}

#[test]
fn test_missing_required_source_group() {
    let dir = project(
        "public static void describeProject() {\n    Project.sourcePath(\"lib\");\n}",
    );
    let err = orchestrator(dir.path(), Arc::new(CopyCompiler::new()))
        .prepare(&dir.path().join("bob/Default.java"))
        .unwrap_err();

    assert!(matches!(&err, BootstrapError::MissingSourceGroup(path) if path.ends_with("lib")));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_compilation_error_halts_bootstrap() {
    let dir = project("");
    write(dir.path(), "src/B.java", COMPILE_ERROR_MARKER);

    let err = orchestrator(dir.path(), Arc::new(CopyCompiler::new()))
        .prepare(&dir.path().join("bob/Default.java"))
        .unwrap_err();

    match &err {
        BootstrapError::Compilation { subject, diagnostics } => {
            assert_eq!(subject, &PathBuf::from("src"));
            assert_eq!(diagnostics.len(), 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::Compilation);
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_unknown_explicit_target() {
    let dir = project("");
    let orchestrator = orchestrator(dir.path(), Arc::new(CopyCompiler::new()));
    let prepared = orchestrator
        .prepare(&dir.path().join("bob/Default.java"))
        .unwrap();

    let err = orchestrator
        .run(&Invocation {
            target: Some("deploy".into()),
            handoff: Some(prepared.path().to_path_buf()),
            ..Invocation::default()
        })
        .unwrap_err();
    assert!(matches!(err, BootstrapError::Target(_)));
    assert!(!dir.path().join("out").exists());
}

#[cfg(unix)]
#[test]
fn test_cold_phase_relaunches_with_handoff() {
    use convenient_launch::Runtime;
    use std::os::unix::fs::PermissionsExt;

    let dir = project("");
    let script = dir.path().join("relaunch.sh");
    fs::write(
        &script,
        "#!/bin/sh\n\
         [ \"$1\" = \"--classpath\" ] || exit 2\n\
         [ -f \"$BOB_HANDOFF\" ] || exit 3\n\
         [ \"$3\" = \"war\" ] || exit 4\n\
         exit 7\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let orchestrator = orchestrator(dir.path(), Arc::new(CopyCompiler::new()))
        .with_relaunch(Runtime::new(&script, "--classpath"));
    let outcome = orchestrator
        .run(&Invocation {
            target: Some("war".into()),
            raw_args: vec!["war".into()],
            ..Invocation::default()
        })
        .unwrap();

    assert_eq!(outcome, Outcome::Relaunched(7));
}
