//! Plugin Instance - 플러그인 런타임 상태 머신
//!
//! ```text
//! Unloaded ──load_plugin──────► Loaded
//!    │                            │
//!    └──lazy_load_plugin──► LazyLoaded
//!                                 │
//! Loaded | LazyLoaded ──unload_plugin──► Unloaded
//!
//! error_state: 어느 상태에서나 설정 가능, 다음 로드 시도에서만 해제
//! ```
//!
//! 상태 락은 사용자 훅 호출 동안 절대 잡혀 있지 않습니다.

use super::descriptor::PluginDescriptor;
use super::events::PluginEvent;
use super::manager::PluginManager;
use super::traits::Plugin;
use hive_foundation::{
    events_or_super_events_in_list, is_event_or_sub_event, is_sub_event, panic_message, Error,
    ReadySemaphore, Result,
};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 플러그인 인스턴스 참조
pub type PluginRef = Arc<PluginInstance>;

// ============================================================================
// LifecyclePhase
// ============================================================================

/// 라이프사이클 단계 (플러그인 스레드 명령과 1:1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Load,
    LazyLoad,
    EndLoad,
    Unload,
    EndUnload,
}

impl LifecyclePhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::LazyLoad => "lazy_load",
            Self::EndLoad => "end_load",
            Self::Unload => "unload",
            Self::EndUnload => "end_unload",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// PluginState
// ============================================================================

#[derive(Default)]
struct PluginState {
    loaded: bool,
    lazy_loaded: bool,
    error_state: bool,
    exception: Option<Arc<Error>>,

    configuration_map: Map<String, Value>,

    dependencies_loaded: Vec<PluginRef>,
    allowed_loaded: Vec<(PluginRef, String)>,

    /// 이 플러그인의 이벤트 구독자 (이벤트 → 구독 플러그인)
    event_plugins_handled_loaded_map: BTreeMap<String, Vec<Weak<PluginInstance>>>,

    /// 이 플러그인이 구독한 다른 플러그인 이벤트
    event_plugins_registered_list: Vec<(Weak<PluginInstance>, String)>,

    /// 이 플러그인이 구독한 매니저 이벤트
    event_plugin_manager_registered_loaded_list: Vec<String>,
}

// ============================================================================
// PluginInstance
// ============================================================================

pub struct PluginInstance {
    /// 인스턴스 ID (레플리카는 `id[n]`)
    id: String,

    /// 원본 플러그인 ID
    original_id: String,

    /// None이면 전역(싱글톤) 인스턴스
    diffusion_scope_id: Option<u64>,

    /// 매니저 내 생성 순번
    serial: u64,

    descriptor: Arc<PluginDescriptor>,
    plugin: Box<dyn Plugin>,
    manager: Weak<PluginManager>,

    state: RwLock<PluginState>,
    ready: ReadySemaphore,
}

impl PluginInstance {
    pub(crate) fn new(
        id: String,
        diffusion_scope_id: Option<u64>,
        serial: u64,
        descriptor: Arc<PluginDescriptor>,
        manager: Weak<PluginManager>,
    ) -> Self {
        Self {
            id,
            original_id: descriptor.id.clone(),
            diffusion_scope_id,
            serial,
            plugin: descriptor.create(),
            descriptor,
            manager,
            state: RwLock::new(PluginState::default()),
            ready: ReadySemaphore::new(),
        }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original_id(&self) -> &str {
        &self.original_id
    }

    pub fn diffusion_scope_id(&self) -> Option<u64> {
        self.diffusion_scope_id
    }

    pub fn is_replica(&self) -> bool {
        self.diffusion_scope_id.is_some()
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn descriptor(&self) -> &Arc<PluginDescriptor> {
        &self.descriptor
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    /// 구체 플러그인 타입으로 다운캐스팅
    pub fn plugin_as<T: 'static>(&self) -> Option<&T> {
        self.plugin.as_any().downcast_ref::<T>()
    }

    /// 소유 매니저 (이미 해제되었으면 None)
    pub fn manager(&self) -> Option<Arc<PluginManager>> {
        self.manager.upgrade()
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    pub fn is_lazy_loaded(&self) -> bool {
        self.state.read().lazy_loaded
    }

    pub fn is_loaded_or_lazy_loaded(&self) -> bool {
        let state = self.state.read();
        state.loaded || state.lazy_loaded
    }

    pub fn is_error_state(&self) -> bool {
        self.state.read().error_state
    }

    /// 마지막으로 기록된 에러
    pub fn exception(&self) -> Option<Arc<Error>> {
        self.state.read().exception.clone()
    }

    /// 로드된 의존 플러그인
    pub fn dependencies_loaded(&self) -> Vec<PluginRef> {
        self.state.read().dependencies_loaded.clone()
    }

    /// 주입된 allowed 플러그인과 capability
    pub fn allowed_loaded(&self) -> Vec<(PluginRef, String)> {
        self.state.read().allowed_loaded.clone()
    }

    /// 특정 capability로 주입된 플러그인
    pub fn allowed_plugins(&self, capability: &str) -> Vec<PluginRef> {
        self.state
            .read()
            .allowed_loaded
            .iter()
            .filter(|(_, c)| c == capability)
            .map(|(p, _)| Arc::clone(p))
            .collect()
    }

    /// 이 플러그인의 `event` 구독자
    pub fn event_subscribers(&self, event: &str) -> Vec<PluginRef> {
        self.state
            .read()
            .event_plugins_handled_loaded_map
            .get(event)
            .map(|subscribers| subscribers.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// 구독 중인 매니저 이벤트
    pub fn registered_manager_events(&self) -> Vec<String> {
        self.state
            .read()
            .event_plugin_manager_registered_loaded_list
            .clone()
    }

    pub(crate) fn record_error(&self, error: Error) {
        let mut state = self.state.write();
        state.error_state = true;
        state.exception = Some(Arc::new(error));
        state.loaded = false;
        state.lazy_loaded = false;
    }

    /// 에러 상태를 해제하고 기록된 에러를 꺼냄
    pub(crate) fn take_exception(&self) -> Option<Arc<Error>> {
        let mut state = self.state.write();
        state.error_state = false;
        state.exception.take()
    }

    /// `take_exception`으로 꺼낸 에러를 다시 기록
    pub(crate) fn restore_exception(&self, error: Arc<Error>) {
        let mut state = self.state.write();
        state.error_state = true;
        state.exception = Some(error);
        state.loaded = false;
        state.lazy_loaded = false;
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn configuration(&self, key: &str) -> Option<Value> {
        self.state.read().configuration_map.get(key).cloned()
    }

    pub fn configuration_map(&self) -> Map<String, Value> {
        self.state.read().configuration_map.clone()
    }

    /// 설정 값 저장 후 `on_configuration_changed` 호출
    ///
    /// 훅 실패는 에러로 반환되지만 플러그인을 에러 상태로 만들지는 않습니다.
    pub fn set_configuration(self: &Arc<Self>, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        self.state
            .write()
            .configuration_map
            .insert(key.clone(), value.clone());

        self.call_hook(|plugin| plugin.on_configuration_changed(self, &key, &value))
            .map_err(|message| Error::lifecycle(&self.id, "configuration", message))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// 단계별 라이프사이클 메서드 실행
    pub fn execute_phase(self: &Arc<Self>, phase: LifecyclePhase) -> Result<()> {
        match phase {
            LifecyclePhase::Load => self.load_plugin(),
            LifecyclePhase::LazyLoad => self.lazy_load_plugin(),
            LifecyclePhase::EndLoad => self.end_load_plugin(),
            LifecyclePhase::Unload => self.unload_plugin(),
            LifecyclePhase::EndUnload => self.end_unload_plugin(),
        }
    }

    /// 로드 플래그 설정, 에러 상태 해제 후 `on_load`
    ///
    /// 플래그는 훅 호출 전에 설정됩니다 (반환하지 않는 훅도 로드된 것으로 보임).
    pub fn load_plugin(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.write();
            state.loaded = true;
            state.lazy_loaded = false;
            state.error_state = false;
            state.exception = None;
        }

        info!(plugin = %self.id, "Loading plugin");
        self.run_hook(LifecyclePhase::Load, |plugin| plugin.on_load(self))
    }

    pub fn lazy_load_plugin(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.write();
            state.loaded = false;
            state.lazy_loaded = true;
            state.error_state = false;
            state.exception = None;
        }

        info!(plugin = %self.id, "Lazy loading plugin");
        self.run_hook(LifecyclePhase::LazyLoad, |plugin| plugin.on_lazy_load(self))
    }

    pub fn end_load_plugin(self: &Arc<Self>) -> Result<()> {
        debug!(plugin = %self.id, "End load");
        self.run_hook(LifecyclePhase::EndLoad, |plugin| plugin.on_end_load(self))
    }

    /// `on_unload` 후 모든 이벤트 구독 해제, 주입 목록 정리
    pub fn unload_plugin(self: &Arc<Self>) -> Result<()> {
        info!(plugin = %self.id, "Unloading plugin");
        let result = self.run_hook(LifecyclePhase::Unload, |plugin| plugin.on_unload(self));

        self.unregister_all_events();

        let mut state = self.state.write();
        state.loaded = false;
        state.lazy_loaded = false;
        state.allowed_loaded.clear();
        state.dependencies_loaded.clear();
        state.event_plugins_handled_loaded_map.clear();
        drop(state);

        result
    }

    pub fn end_unload_plugin(self: &Arc<Self>) -> Result<()> {
        debug!(plugin = %self.id, "End unload");
        self.run_hook(LifecyclePhase::EndUnload, |plugin| plugin.on_end_unload(self))
    }

    // ========================================================================
    // Injection
    // ========================================================================

    /// allowed 플러그인 추가 + 그 플러그인의 이벤트 교차 구독
    pub fn load_allowed(self: &Arc<Self>, plugin: &PluginRef, capability: &str) -> Result<()> {
        {
            let mut state = self.state.write();
            let exists = state
                .allowed_loaded
                .iter()
                .any(|(p, c)| Arc::ptr_eq(p, plugin) && c == capability);
            if !exists {
                state
                    .allowed_loaded
                    .push((Arc::clone(plugin), capability.to_string()));
            }
        }

        for event in self.cross_registrable_events(plugin) {
            self.register_for_plugin_event(plugin, &event);
        }

        debug!(plugin = %self.id, allowed = %plugin.id, capability, "Allowed plugin injected");
        self.call_hook(|p| p.on_load_allowed(self, plugin, capability))
            .map_err(|message| self.fail("load_allowed", message))
    }

    /// allowed 플러그인 제거 + 교차 구독 해제
    pub fn unload_allowed(self: &Arc<Self>, plugin: &PluginRef, capability: &str) -> Result<()> {
        let subscribed: Vec<String> = {
            let mut state = self.state.write();
            state
                .allowed_loaded
                .retain(|(p, c)| !(Arc::ptr_eq(p, plugin) && c == capability));

            state
                .event_plugins_registered_list
                .iter()
                .filter(|(target, _)| target.as_ptr() == Arc::as_ptr(plugin))
                .map(|(_, event)| event.clone())
                .collect()
        };

        for event in subscribed {
            self.unregister_for_plugin_event(plugin, &event);
        }

        debug!(plugin = %self.id, allowed = %plugin.id, capability, "Allowed plugin removed");
        self.call_hook(|p| p.on_unload_allowed(self, plugin, capability))
            .map_err(|message| self.fail("unload_allowed", message))
    }

    /// 로드된 의존 플러그인 기록
    pub fn dependency_injected(self: &Arc<Self>, plugin: &PluginRef) -> Result<()> {
        {
            let mut state = self.state.write();
            if !state
                .dependencies_loaded
                .iter()
                .any(|p| Arc::ptr_eq(p, plugin))
            {
                state.dependencies_loaded.push(Arc::clone(plugin));
            }
        }

        debug!(plugin = %self.id, dependency = %plugin.id, "Dependency injected");
        self.call_hook(|p| p.on_dependency_injected(self, plugin))
            .map_err(|message| self.fail("dependency_injected", message))
    }

    /// `plugin`이 발생시키는 이벤트 중 이 플러그인이 구독할 수 있는 것
    fn cross_registrable_events(&self, plugin: &PluginRef) -> Vec<String> {
        let mut events = Vec::new();

        for registrable in &self.descriptor.events_registrable {
            for handled in &plugin.descriptor.events_handled {
                let event = if is_event_or_sub_event(registrable, handled) {
                    handled
                } else if is_sub_event(handled, registrable) {
                    registrable
                } else {
                    continue;
                };
                if !events.contains(event) {
                    events.push(event.clone());
                }
            }
        }

        events
    }

    // ========================================================================
    // Event subscription
    // ========================================================================

    /// `plugin`의 `event` 구독 (대상이 로드되지 않았으면 무시하고 false)
    pub fn register_for_plugin_event(self: &Arc<Self>, plugin: &PluginRef, event: &str) -> bool {
        if !plugin.is_loaded_or_lazy_loaded() {
            debug!(
                plugin = %self.id,
                target = %plugin.id,
                event,
                "Target plugin not loaded, subscription ignored"
            );
            return false;
        }

        plugin.add_subscriber(event, self);

        let mut state = self.state.write();
        let exists = state
            .event_plugins_registered_list
            .iter()
            .any(|(target, e)| target.as_ptr() == Arc::as_ptr(plugin) && e == event);
        if !exists {
            state
                .event_plugins_registered_list
                .push((Arc::downgrade(plugin), event.to_string()));
        }

        true
    }

    pub fn unregister_for_plugin_event(self: &Arc<Self>, plugin: &PluginRef, event: &str) {
        plugin.remove_subscriber(event, self);

        self.state
            .write()
            .event_plugins_registered_list
            .retain(|(target, e)| !(target.as_ptr() == Arc::as_ptr(plugin) && e == event));
    }

    /// 매니저 이벤트 구독
    pub fn register_for_plugin_manager_event(self: &Arc<Self>, event: &str) -> bool {
        let Some(manager) = self.manager() else {
            warn!(plugin = %self.id, event, "Manager gone, subscription ignored");
            return false;
        };

        manager.add_manager_event_subscriber(self, event);

        let mut state = self.state.write();
        if !state
            .event_plugin_manager_registered_loaded_list
            .iter()
            .any(|e| e == event)
        {
            state
                .event_plugin_manager_registered_loaded_list
                .push(event.to_string());
        }

        true
    }

    pub fn unregister_for_plugin_manager_event(self: &Arc<Self>, event: &str) {
        if let Some(manager) = self.manager() {
            manager.remove_manager_event_subscriber(self, event);
        }

        self.state
            .write()
            .event_plugin_manager_registered_loaded_list
            .retain(|e| e != event);
    }

    fn add_subscriber(&self, event: &str, subscriber: &PluginRef) {
        let mut state = self.state.write();
        let subscribers = state
            .event_plugins_handled_loaded_map
            .entry(event.to_string())
            .or_default();

        if !subscribers
            .iter()
            .any(|s| s.as_ptr() == Arc::as_ptr(subscriber))
        {
            subscribers.push(Arc::downgrade(subscriber));
        }
    }

    fn remove_subscriber(&self, event: &str, subscriber: &PluginRef) {
        let mut state = self.state.write();
        if let Some(subscribers) = state.event_plugins_handled_loaded_map.get_mut(event) {
            subscribers.retain(|s| s.as_ptr() != Arc::as_ptr(subscriber));
            if subscribers.is_empty() {
                state.event_plugins_handled_loaded_map.remove(event);
            }
        }
    }

    fn unregister_all_events(self: &Arc<Self>) {
        let (registered, manager_events) = {
            let mut state = self.state.write();
            (
                std::mem::take(&mut state.event_plugins_registered_list),
                std::mem::take(&mut state.event_plugin_manager_registered_loaded_list),
            )
        };

        for (target, event) in registered {
            if let Some(target) = target.upgrade() {
                target.remove_subscriber(&event, self);
            }
        }

        if let Some(manager) = self.manager() {
            for event in manager_events {
                manager.remove_manager_event_subscriber(self, &event);
            }
        }
    }

    // ========================================================================
    // Event generation
    // ========================================================================

    /// 이벤트 발생
    ///
    /// `name`이 선언한 `events_handled` 네임스페이스 안에 있을 때만 발생하며,
    /// `name` 또는 그 상위 이벤트를 구독한 플러그인에 전달됩니다.
    pub fn generate_event(self: &Arc<Self>, name: &str, args: Value) -> bool {
        if events_or_super_events_in_list(name, &self.descriptor.events_handled).is_empty() {
            debug!(plugin = %self.id, event = name, "Event not handled by plugin, ignored");
            return false;
        }

        let subscribers: Vec<PluginRef> = {
            let state = self.state.read();
            let mut subscribers: Vec<PluginRef> = Vec::new();

            for (registered, plugins) in &state.event_plugins_handled_loaded_map {
                if !is_event_or_sub_event(registered, name) {
                    continue;
                }
                for plugin in plugins.iter().filter_map(Weak::upgrade) {
                    if !subscribers.iter().any(|s| Arc::ptr_eq(s, &plugin)) {
                        subscribers.push(plugin);
                    }
                }
            }

            subscribers
        };

        let event = PluginEvent::plugin(name, args, &self.id);
        debug!(plugin = %self.id, event = name, subscribers = subscribers.len(), "Generating event");

        for subscriber in subscribers {
            if subscriber.is_loaded_or_lazy_loaded() && !subscriber.is_error_state() {
                subscriber.notify_event(&event);
            }
        }

        true
    }

    /// 이벤트 전달 (훅 실패 시 treat_exception)
    pub fn notify_event(self: &Arc<Self>, event: &PluginEvent) {
        if let Err(message) = self.call_hook(|plugin| plugin.on_event(self, event)) {
            self.treat_exception(Error::lifecycle(&self.id, "event", message));
        }
    }

    /// 플러그인 경계에서 잡힌 에러 처리: 전체 언로드 후 에러 기록
    pub fn treat_exception(self: &Arc<Self>, error: Error) {
        error!(plugin = %self.id, "Plugin exception: {}", error);

        if let Some(manager) = self.manager() {
            if let Err(e) = manager.unload_plugin_instance(self, super::LoadType::Full) {
                error!(plugin = %self.id, "Unload after exception failed: {}", e);
            }
        }

        self.record_error(error);
    }

    // ========================================================================
    // Ready semaphore
    // ========================================================================

    /// 최대 `timeout` 동안 단계 완료 신호 대기
    pub fn acquire_ready_semaphore(&self, timeout: Duration) -> bool {
        self.ready.acquire_timeout(timeout)
    }

    /// 단계 완료 신호 (반환하지 않는 훅에서 직접 호출)
    pub fn release_ready_semaphore(&self) {
        self.ready.release();
    }

    /// 지금까지의 release 횟수
    pub fn ready_semaphore_status(&self) -> u64 {
        self.ready.status()
    }

    pub(crate) fn drain_ready_semaphore(&self) {
        let stale = self.ready.drain();
        if stale > 0 {
            debug!(plugin = %self.id, stale, "Discarded stale ready permits");
        }
    }

    // ========================================================================
    // Hook helpers
    // ========================================================================

    /// 훅 호출 (에러/패닉 → 메시지)
    fn call_hook<F>(&self, hook: F) -> std::result::Result<(), String>
    where
        F: FnOnce(&dyn Plugin) -> Result<()>,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| hook(self.plugin.as_ref()))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
        }
    }

    /// 라이프사이클 훅 호출, 실패 시 에러 상태 기록
    fn run_hook<F>(&self, phase: LifecyclePhase, hook: F) -> Result<()>
    where
        F: FnOnce(&dyn Plugin) -> Result<()>,
    {
        self.call_hook(hook)
            .map_err(|message| self.fail(phase.name(), message))
    }

    fn fail(&self, phase: &str, message: String) -> Error {
        error!(plugin = %self.id, phase, "Lifecycle hook failed: {}", message);
        self.record_error(Error::lifecycle(&self.id, phase, message.clone()));
        Error::lifecycle(&self.id, phase, message)
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("PluginInstance")
            .field("id", &self.id)
            .field("diffusion_scope_id", &self.diffusion_scope_id)
            .field("loaded", &state.loaded)
            .field("lazy_loaded", &state.lazy_loaded)
            .field("error_state", &state.error_state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginDescriptor;
    use parking_lot::Mutex;
    use std::any::Any;

    #[derive(Default)]
    struct Recorder {
        journal: Mutex<Vec<String>>,
        fail_load: bool,
    }

    impl Plugin for Recorder {
        fn on_load(&self, _ctx: &PluginRef) -> Result<()> {
            if self.fail_load {
                return Err(Error::Internal("load refused".into()));
            }
            self.journal.lock().push("load".into());
            Ok(())
        }

        fn on_event(&self, _ctx: &PluginRef, event: &PluginEvent) -> Result<()> {
            self.journal.lock().push(format!("event:{}", event.name));
            Ok(())
        }

        fn on_unload(&self, _ctx: &PluginRef) -> Result<()> {
            panic!("unload exploded");
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn instance(descriptor: PluginDescriptor) -> PluginRef {
        Arc::new(PluginInstance::new(
            descriptor.id.clone(),
            None,
            1,
            Arc::new(descriptor),
            Weak::new(),
        ))
    }

    fn journal(plugin: &PluginRef) -> Vec<String> {
        plugin.plugin_as::<Recorder>().unwrap().journal.lock().clone()
    }

    #[test]
    fn test_load_sets_flags() {
        let plugin = instance(PluginDescriptor::new("t.a", "A", || {
            Box::new(Recorder::default())
        }));

        plugin.lazy_load_plugin().unwrap();
        assert!(plugin.is_lazy_loaded() && !plugin.is_loaded());

        plugin.load_plugin().unwrap();
        assert!(plugin.is_loaded() && !plugin.is_lazy_loaded());
        assert_eq!(journal(&plugin), vec!["load"]);
    }

    #[test]
    fn test_hook_error_sets_error_state() {
        let plugin = instance(PluginDescriptor::new("t.fail", "Fail", || {
            Box::new(Recorder {
                fail_load: true,
                ..Default::default()
            })
        }));

        let err = plugin.load_plugin().unwrap_err();
        assert!(matches!(err, Error::Lifecycle { .. }));
        assert!(plugin.is_error_state());
        assert!(!plugin.is_loaded());
        assert!(plugin.exception().is_some());
    }

    #[test]
    fn test_hook_panic_is_caught() {
        let plugin = instance(PluginDescriptor::new("t.panic", "Panic", || {
            Box::new(Recorder::default())
        }));
        plugin.load_plugin().unwrap();

        assert!(plugin.unload_plugin().is_err());
        assert!(plugin.is_error_state());
        assert!(!plugin.is_loaded_or_lazy_loaded());
    }

    #[test]
    fn test_generate_event_namespace_and_routing() {
        let source = instance(
            PluginDescriptor::new("t.source", "Source", || Box::new(Recorder::default()))
                .with_event_handled("source.status"),
        );
        let listener = instance(PluginDescriptor::new("t.listener", "Listener", || {
            Box::new(Recorder::default())
        }));

        // 대상이 로드되지 않았으면 구독 무시
        assert!(!listener.register_for_plugin_event(&source, "source"));

        source.load_plugin().unwrap();
        listener.load_plugin().unwrap();
        assert!(listener.register_for_plugin_event(&source, "source"));

        // 선언된 네임스페이스 밖은 발생하지 않음
        assert!(!source.generate_event("other.event", Value::Null));
        assert!(!source.generate_event("source", Value::Null));

        // 하위 이벤트는 상위 구독자에게 전달
        assert!(source.generate_event("source.status.ready", Value::Null));
        assert_eq!(journal(&listener), vec!["load", "event:source.status.ready"]);

        listener.unregister_for_plugin_event(&source, "source");
        assert!(source.generate_event("source.status", Value::Null));
        assert_eq!(journal(&listener).len(), 2);
    }

    #[test]
    fn test_load_allowed_cross_subscribes() {
        let provider = instance(
            PluginDescriptor::new("t.provider", "Provider", || Box::new(Recorder::default()))
                .with_capability("storage")
                .with_event_handled("storage.changed"),
        );
        let requester = instance(
            PluginDescriptor::new("t.requester", "Requester", || {
                Box::new(Recorder::default())
            })
            .with_event_registrable("storage"),
        );

        provider.load_plugin().unwrap();
        requester.load_plugin().unwrap();
        requester.load_allowed(&provider, "storage").unwrap();

        assert_eq!(requester.allowed_plugins("storage").len(), 1);
        assert_eq!(provider.event_subscribers("storage.changed").len(), 1);

        requester.unload_allowed(&provider, "storage").unwrap();
        assert!(requester.allowed_loaded().is_empty());
        assert!(provider.event_subscribers("storage.changed").is_empty());
    }

    #[test]
    fn test_ready_semaphore_status() {
        let plugin = instance(PluginDescriptor::new("t.ready", "Ready", || {
            Box::new(Recorder::default())
        }));

        assert_eq!(plugin.ready_semaphore_status(), 0);
        plugin.release_ready_semaphore();
        assert_eq!(plugin.ready_semaphore_status(), 1);
        assert!(plugin.acquire_ready_semaphore(Duration::from_secs(1)));
        assert!(!plugin.acquire_ready_semaphore(Duration::from_millis(10)));
    }
}
