//! Process supervision tests using `sh` as the runtime

#![cfg(unix)]

use convenient_launch::{
    CancelToken, LaunchError, OutputSink, ProcessLauncher, Runtime, SharedBuffer, StdinMode,
    SystemArchives,
};
use std::time::{Duration, Instant};

fn shell(script: &str) -> ProcessLauncher {
    ProcessLauncher::new(Runtime::new("sh", "-classpath"), "-c")
        .app_arg(script)
        .system_archives(SystemArchives::Disabled)
        .stdin(StdinMode::Null)
}

#[test]
fn test_exit_code_is_returned() {
    let code = shell("exit 3").run(&CancelToken::new()).unwrap();
    assert_eq!(code, 3);
}

#[test]
fn test_output_streams_are_drained() {
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let code = shell("echo to-out; echo to-err 1>&2")
        .stdout(OutputSink::Buffer(out.clone()))
        .stderr(OutputSink::Buffer(err.clone()))
        .run(&CancelToken::new())
        .unwrap();

    assert_eq!(code, 0);
    assert_eq!(out.to_string_lossy(), "to-out\n");
    assert_eq!(err.to_string_lossy(), "to-err\n");
}

#[test]
fn test_large_output_does_not_deadlock() {
    // Far more than a pipe buffer
    let out = SharedBuffer::new();
    let code = shell("i=0; while [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done")
        .stdout(OutputSink::Buffer(out.clone()))
        .run(&CancelToken::new())
        .unwrap();

    assert_eq!(code, 0);
    assert_eq!(out.to_string_lossy().lines().count(), 20000);
}

#[test]
fn test_environment_is_passed() {
    let out = SharedBuffer::new();
    let _ = shell("printf %s \"$LAUNCH_TEST_VALUE\"")
        .env("LAUNCH_TEST_VALUE", "handed-over")
        .stdout(OutputSink::Buffer(out.clone()))
        .run(&CancelToken::new())
        .unwrap();
    assert_eq!(out.to_string_lossy(), "handed-over");
}

#[test]
fn test_cancellation_terminates_child() {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let _ = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        trigger.cancel();
    });

    let started = Instant::now();
    let err = shell("exec sleep 30")
        .stdout(OutputSink::Discard)
        .run(&cancel)
        .unwrap_err();

    assert!(matches!(err, LaunchError::Interrupted { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_unresolved_symbol_prevents_spawn() {
    let dir = tempfile::TempDir::new().unwrap();
    let marker = dir.path().join("ran");
    let err = shell(&format!("touch {}", marker.display()))
        .require("org.example.Missing")
        .run(&CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, LaunchError::Unresolved { .. }));
    assert!(!marker.exists());
}

#[test]
fn test_missing_executable_is_a_spawn_error() {
    let err = ProcessLauncher::new(Runtime::new("definitely-not-a-real-runtime", "-cp"), "Main")
        .system_archives(SystemArchives::Disabled)
        .stdin(StdinMode::Null)
        .run(&CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, LaunchError::Spawn { .. }));
}

#[cfg(target_os = "linux")]
fn live_threads_named(name: &str) -> usize {
    std::fs::read_dir("/proc/self/task")
        .unwrap()
        .filter_map(Result::ok)
        .filter(|task| {
            std::fs::read_to_string(task.path().join("comm"))
                .is_ok_and(|comm| comm.trim_end() == name)
        })
        .count()
}

#[cfg(target_os = "linux")]
#[test]
fn test_forwarded_stdin_pump_ends_with_the_child() {
    for _ in 0..3 {
        let code = ProcessLauncher::new(Runtime::new("sh", "-classpath"), "-c")
            .app_arg("exit 0")
            .system_archives(SystemArchives::Disabled)
            .stdin(StdinMode::Forward)
            .run(&CancelToken::new())
            .unwrap();
        assert_eq!(code, 0);
    }
    assert_eq!(live_threads_named("pump-stdin"), 0);
}
