//! Plugin thread / ready handshake scenarios

mod common;

use common::{blocker, config, count, failing_recorder, journal, manager, recorder};
use hive_core::plugin::{CAPABILITY_MAIN, CAPABILITY_THREAD};
use hive_core::{Dependency, LoadType};
use hive_foundation::{Error, Latch};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_blocking_plugin_releases_ready() {
    let gate = Arc::new(Latch::new());
    let m = manager(vec![blocker("server", &gate, true)], config());

    let started = Instant::now();
    assert!(m.load_plugin("server", LoadType::Full).unwrap());
    assert!(started.elapsed() < Duration::from_secs(4));

    let server = m.plugin("server").unwrap();
    assert!(server.is_loaded());
    assert!(!gate.is_open());
    assert_eq!(m.plugin_thread_count(), 1);

    // Unload는 같은 플러그인 스레드에서 처리되며 차단된 on_load를 풀어줌
    assert!(m.unload_plugin("server", LoadType::Full).unwrap());
    assert!(gate.is_open());
    assert!(!server.is_loaded());
    assert!(m.join_plugin_threads());
}

#[test]
fn test_silent_blocking_plugin_times_out() {
    let gate = Arc::new(Latch::new());
    let m = manager(
        vec![blocker("stuck", &gate, false)],
        config().ready_timeout_secs(1),
    );

    let started = Instant::now();
    assert!(!m.load_plugin("stuck", LoadType::Full).unwrap());
    assert!(started.elapsed() < Duration::from_secs(4));

    let stuck = m.plugin("stuck").unwrap();
    assert!(stuck.is_error_state());
    assert!(!stuck.is_loaded());
    assert!(matches!(stuck.exception().as_deref(), Some(Error::Timeout(_))));

    gate.open();
    assert!(m.join_plugin_threads());
}

#[test]
fn test_failed_load_releases_blocking_hook() {
    let j = journal();
    let gate = Arc::new(Latch::new());
    let m = manager(
        vec![
            blocker("server", &gate, true).with_dependency(Dependency::plugin("dep")),
            failing_recorder("dep", &j, "load"),
        ],
        config().stop_on_cycle_error(false),
    );

    assert!(!m.load_plugin("server", LoadType::Full).unwrap());

    // Load 이후 실패하면 Unload 단계가 실행되어 차단된 on_load가 풀림
    let server = m.plugin("server").unwrap();
    assert!(gate.is_open());
    assert!(!server.is_loaded());
    assert!(server.is_error_state());
    assert!(matches!(
        server.exception().as_deref(),
        Some(Error::Lifecycle { .. })
    ));
    assert!(m.join_plugin_threads());
}

#[test]
fn test_threaded_plugin_hooks_run_off_caller_thread() {
    let j = journal();
    let m = manager(
        vec![recorder("worker", &j).with_capability(CAPABILITY_THREAD)],
        config(),
    );

    assert!(m.load_plugin("worker", LoadType::Full).unwrap());
    assert_eq!(m.plugin_thread_count(), 1);
    assert_eq!(count(&j, "worker:load"), 1);
    assert_eq!(count(&j, "worker:end_load"), 1);

    assert!(m.unload_plugin("worker", LoadType::Full).unwrap());
    assert_eq!(count(&j, "worker:end_unload"), 1);
    assert!(m.join_plugin_threads());
}

#[test]
fn test_threaded_failure_policy() {
    let j = journal();

    let capture = manager(
        vec![failing_recorder("bad", &j, "load").with_capability(CAPABILITY_MAIN)],
        config().stop_on_cycle_error(false),
    );
    assert!(!capture.load_plugin("bad", LoadType::Full).unwrap());
    assert!(capture.plugin("bad").unwrap().is_error_state());
    assert!(capture.join_plugin_threads());

    let stop = manager(
        vec![failing_recorder("bad", &j, "load").with_capability(CAPABILITY_MAIN)],
        config(),
    );
    assert!(matches!(
        stop.load_plugin("bad", LoadType::Full),
        Err(Error::Lifecycle { .. })
    ));
    assert!(stop.join_plugin_threads());
}

#[test]
fn test_unthreaded_plugin_has_no_thread() {
    let j = journal();
    let m = manager(vec![recorder("plain", &j)], config());

    assert!(m.load_plugin("plain", LoadType::Full).unwrap());
    assert_eq!(m.plugin_thread_count(), 0);
}
