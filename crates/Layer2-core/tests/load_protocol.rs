//! Load / unload protocol scenarios

mod common;

use common::{config, contains, count, failing_recorder, journal, manager, position, recorder};
use hive_core::plugin::{ExtensionHook, FnExtension};
use hive_core::{Dependency, LoadType, PluginManager, PluginRef};
use hive_foundation::{Error, Platform};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_end_to_end_dependency_and_allowed() {
    let j = journal();
    let m = manager(
        vec![
            recorder("p1", &j).with_capability("foo"),
            recorder("p2", &j)
                .with_capability("bar")
                .with_capability_allowed("foo")
                .with_dependency(Dependency::plugin("p1")),
        ],
        config(),
    );

    assert!(m.load_plugin("p2", LoadType::Full).unwrap());

    let p1 = m.plugin("p1").unwrap();
    let p2 = m.plugin("p2").unwrap();
    assert!(p1.is_loaded());
    assert!(p2.is_loaded());

    let dependencies = p2.dependencies_loaded();
    assert_eq!(dependencies.len(), 1);
    assert!(Arc::ptr_eq(&dependencies[0], &p1));

    let allowed = p2.allowed_plugins("foo");
    assert!(allowed.iter().any(|p| Arc::ptr_eq(p, &p1)));
    assert!(m
        .allowed_plugins("p1")
        .iter()
        .any(|(requester, capability)| Arc::ptr_eq(requester, &p2) && capability == "foo"));
    assert!(m
        .dependent_plugins("p1")
        .iter()
        .any(|p| Arc::ptr_eq(p, &p2)));

    // 의존성 → 자기 EndLoad 순서
    assert!(position(&j, "p1:end_load") < position(&j, "p2:dependency:p1"));
    assert!(position(&j, "p2:dependency:p1") < position(&j, "p2:end_load"));
}

#[test]
fn test_load_is_idempotent() {
    let j = journal();
    let m = manager(
        vec![
            recorder("a", &j)
                .with_dependency(Dependency::plugin("b"))
                .with_capability_allowed("cap"),
            recorder("b", &j),
            recorder("p", &j).with_capability("cap"),
        ],
        config(),
    );

    assert!(m.load_plugin("a", LoadType::Full).unwrap());
    assert!(m.load_plugin("a", LoadType::Full).unwrap());

    assert_eq!(count(&j, "a:load"), 1);
    assert_eq!(count(&j, "a:dependency:b"), 1);
    assert_eq!(count(&j, "a:allowed:cap=p"), 1);
    assert_eq!(count(&j, "b:load"), 1);
}

#[test]
fn test_lazy_then_full_promotion() {
    let j = journal();
    let m = manager(
        vec![
            recorder("a", &j)
                .with_capability("svc")
                .with_dependency(Dependency::plugin("b"))
                .lazy(),
            recorder("b", &j),
        ],
        config(),
    );

    assert!(m.lazy_load_plugin("a").unwrap());
    let a = m.plugin("a").unwrap();
    assert!(a.is_lazy_loaded());
    assert!(!a.is_loaded());
    assert!(a.is_loaded_or_lazy_loaded());
    assert!(!contains(&j, "a:dependency:b"));
    assert!(!m.plugin("b").unwrap().is_loaded());
    assert!(m.loaded_plugins_by_capability("svc").is_empty());

    // 이미 지연 로드됨
    assert!(m.lazy_load_plugin("a").unwrap());
    assert_eq!(count(&j, "a:lazy_load"), 1);

    assert!(m.load_plugin("a", LoadType::Full).unwrap());
    assert!(a.is_loaded());
    assert!(!a.is_lazy_loaded());
    assert_eq!(count(&j, "a:load"), 1);
    assert_eq!(count(&j, "a:dependency:b"), 1);
    assert!(m.plugin("b").unwrap().is_loaded());
    assert_eq!(m.loaded_plugins_by_capability("svc").len(), 1);
}

#[test]
fn test_cascade_unload() {
    let j = journal();
    let m = manager(
        vec![
            recorder("a", &j),
            recorder("b", &j).with_dependency(Dependency::plugin("a")),
        ],
        config(),
    );

    assert!(m.load_plugin("b", LoadType::Full).unwrap());
    assert!(m.unload_plugin("a", LoadType::Full).unwrap());

    let a = m.plugin("a").unwrap();
    let b = m.plugin("b").unwrap();
    assert!(!a.is_loaded());
    assert!(!b.is_loaded());
    assert!(position(&j, "b:unload") < position(&j, "a:unload"));
    assert!(position(&j, "a:unload") < position(&j, "a:end_unload"));
    assert!(m.dependent_plugins("a").is_empty());

    // B는 자동으로 다시 로드되지 않음
    assert!(m.load_plugin("a", LoadType::Full).unwrap());
    assert!(a.is_loaded());
    assert!(!b.is_loaded());
    assert_eq!(count(&j, "b:load"), 1);
}

#[test]
fn test_unload_notifies_requesters() {
    let j = journal();
    let m = manager(
        vec![
            recorder("r", &j).with_capability_allowed("cap"),
            recorder("p", &j).with_capability("cap.sub"),
        ],
        config(),
    );

    assert!(m.load_plugin("r", LoadType::Full).unwrap());
    assert!(contains(&j, "r:allowed:cap=p"));

    assert!(m.unload_plugin("p", LoadType::Full).unwrap());
    assert!(contains(&j, "r:unallowed:cap=p"));
    assert!(m.plugin("r").unwrap().allowed_plugins("cap").is_empty());
    assert!(m.plugin("r").unwrap().is_loaded());
}

#[test]
fn test_provider_loaded_later_is_injected() {
    let j = journal();
    let m = manager(
        vec![
            recorder("r", &j).with_capability_allowed("cap"),
            recorder("p", &j).with_capability("cap"),
        ],
        config(),
    );

    // 다시 로드된 제공자는 이미 로드된 요청자에 재주입됨
    assert!(m.load_plugin("r", LoadType::Full).unwrap());
    assert!(m.unload_plugin("p", LoadType::Full).unwrap());
    assert!(m.load_plugin("p", LoadType::Full).unwrap());

    assert_eq!(count(&j, "r:allowed:cap=p"), 2);
    assert_eq!(m.plugin("r").unwrap().allowed_plugins("cap").len(), 1);
}

#[test]
fn test_unload_of_unknown_plugin() {
    let m = manager(Vec::new(), config());
    assert!(matches!(
        m.unload_plugin("ghost", LoadType::Full),
        Err(Error::PluginNotFound(_))
    ));
    assert!(matches!(
        m.load_plugin("ghost", LoadType::Full),
        Err(Error::PluginClassNotAvailable { .. })
    ));
}

#[test]
fn test_unload_not_loaded_is_noop() {
    let j = journal();
    let m = manager(vec![recorder("a", &j)], config());

    assert!(m.unload_plugin("a", LoadType::Full).unwrap());
    assert!(!contains(&j, "a:unload"));
}

// ============================================================================
// 거부 / 에러
// ============================================================================

#[test]
fn test_missing_mandatory_dependency_vetoes() {
    let j = journal();
    let m = manager(
        vec![
            recorder("a", &j).with_dependency(Dependency::plugin("ghost")),
            recorder("b", &j).with_dependency(Dependency::plugin("ghost").optional()),
        ],
        config(),
    );

    assert!(!m.load_plugin("a", LoadType::Full).unwrap());
    let a = m.plugin("a").unwrap();
    assert!(!a.is_loaded());
    assert!(!a.is_error_state());
    assert!(!contains(&j, "a:load"));

    assert!(m.load_plugin("b", LoadType::Full).unwrap());
}

#[test]
fn test_platform_veto() {
    let j = journal();
    let m = manager(
        vec![
            recorder("win", &j).with_platform(Platform::Windows),
            recorder("any", &j),
        ],
        config().platform("linux"),
    );

    assert_eq!(m.platform(), Platform::Linux);
    assert!(!m.load_plugin("win", LoadType::Full).unwrap());
    assert!(!contains(&j, "win:load"));
    assert!(m.load_plugin("any", LoadType::Full).unwrap());
}

#[test]
fn test_extension_veto_and_loaded_hook() {
    let j = journal();
    let m = manager(vec![recorder("a", &j), recorder("b", &j)], config());

    m.register_extension(Arc::new(FnExtension::new(
        "deny-b",
        ExtensionHook::TestPluginLoad,
        |_: &PluginManager, plugin: Option<&PluginRef>| plugin.map_or(true, |p| p.id() != "b"),
    )));

    let loaded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loaded);
    m.register_extension(Arc::new(FnExtension::new(
        "count-loaded",
        ExtensionHook::PluginLoaded,
        move |_: &PluginManager, _: Option<&PluginRef>| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        },
    )));

    assert!(m.load_plugin("a", LoadType::Full).unwrap());
    assert!(!m.load_plugin("b", LoadType::Full).unwrap());
    assert!(!contains(&j, "b:load"));
    assert_eq!(loaded.load(Ordering::SeqCst), 1);
}

#[test]
fn test_error_isolation() {
    let j = journal();
    let m = manager(
        vec![failing_recorder("bad", &j, "load"), recorder("good", &j)],
        config().stop_on_cycle_error(false),
    );

    assert!(!m.load_plugin("bad", LoadType::Full).unwrap());
    let bad = m.plugin("bad").unwrap();
    assert!(bad.is_error_state());
    assert!(!bad.is_loaded());
    assert!(matches!(
        bad.exception().as_deref(),
        Some(Error::Lifecycle { .. })
    ));

    assert!(m.load_plugin("good", LoadType::Full).unwrap());
    assert!(m.plugin("good").unwrap().is_loaded());
}

#[test]
fn test_stop_on_cycle_error_propagates() {
    let j = journal();
    let m = manager(vec![failing_recorder("bad", &j, "end_load")], config());

    assert!(m.load_plugin("bad", LoadType::Full).is_err());
    let bad = m.plugin("bad").unwrap();
    assert!(bad.is_error_state());
    assert!(!bad.is_loaded());
}

#[test]
fn test_failed_dependency_fails_dependent() {
    let j = journal();
    let m = manager(
        vec![
            recorder("a", &j).with_dependency(Dependency::plugin("b")),
            failing_recorder("b", &j, "load"),
        ],
        config().stop_on_cycle_error(false),
    );

    assert!(!m.load_plugin("a", LoadType::Full).unwrap());
    assert!(m.plugin("a").unwrap().is_error_state());
    assert!(m.plugin("b").unwrap().is_error_state());
    assert!(!contains(&j, "a:end_load"));
}

#[test]
fn test_failure_after_load_runs_unload_hooks() {
    let j = journal();
    let m = manager(
        vec![
            recorder("a", &j).with_dependency(Dependency::plugin("b")),
            failing_recorder("b", &j, "load"),
            failing_recorder("c", &j, "end_load"),
        ],
        config().stop_on_cycle_error(false),
    );

    assert!(!m.load_plugin("a", LoadType::Full).unwrap());
    assert!(position(&j, "a:load") < position(&j, "a:unload"));
    assert!(position(&j, "a:unload") < position(&j, "a:end_unload"));
    // Load 훅이 실패한 플러그인은 언로드 훅을 받지 않음
    assert!(!contains(&j, "b:unload"));

    assert!(!m.load_plugin("c", LoadType::Full).unwrap());
    assert_eq!(count(&j, "c:unload"), 1);
    assert_eq!(count(&j, "c:end_unload"), 1);
    let c = m.plugin("c").unwrap();
    assert!(c.is_error_state());
    assert!(m.loaded_plugins().is_empty());
}

#[test]
fn test_failed_load_can_be_retried() {
    let j = journal();
    let m = manager(
        vec![failing_recorder("bad", &j, "end_load")],
        config().stop_on_cycle_error(false),
    );

    assert!(!m.load_plugin("bad", LoadType::Full).unwrap());
    assert!(!m.load_plugin("bad", LoadType::Full).unwrap());
    assert_eq!(count(&j, "bad:load"), 2);
}

// ============================================================================
// Reload
// ============================================================================

#[test]
fn test_reload_creates_fresh_instance() {
    let j = journal();
    let m = manager(
        vec![
            recorder("a", &j),
            recorder("b", &j).with_dependency(Dependency::plugin("a")),
        ],
        config(),
    );

    assert!(m.load_plugin("b", LoadType::Full).unwrap());
    let before = m.plugin("a").unwrap();

    assert!(m.reload_plugin("a").unwrap());
    let after = m.plugin("a").unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert!(after.is_loaded());
    assert_eq!(count(&j, "a:load"), 2);
    assert_eq!(count(&j, "a:unload"), 1);
    // 종속 플러그인은 연쇄 언로드만 됨
    assert!(!m.plugin("b").unwrap().is_loaded());
}
