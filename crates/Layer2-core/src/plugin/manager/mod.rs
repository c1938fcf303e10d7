//! Plugin Manager - 플러그인 라이프사이클 오케스트레이터
//!
//! ## 구성
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        PluginManager                         │
//! │  PluginRegistry (클래스)    ManagerState (인스턴스/인덱스)   │
//! │      │                         │                             │
//! │      ▼                         ▼                             │
//! │  instantiate ──► load protocol ──► capability / allowed 그래프 │
//! │                      │                                       │
//! │                      ▼                                       │
//! │            PluginThread (main/thread) 또는 inline 호출       │
//! │                                                              │
//! │  command queue ──► main_loop (Execute / Exit)                │
//! │  Scheduler, TemplateResolver, PluginConfigStore, Discovery   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`load`]: 로드 프로토콜 (거부 검사 → 훅 → capability → 의존성 → allowed)
//! - [`unload`]: 언로드 프로토콜 (연쇄 언로드 → 인덱스 정리 → 훅)
//! - [`diffusion`]: allowed 주입 시 diffusion 정책과 레플리카
//! - [`main_loop`]: 스레드 간 명령 큐
//! - [`system`]: `load_system` / `unload_system`
//!
//! 매니저 상태 락은 사용자 훅이나 재귀 로드 호출 동안 잡혀 있지 않습니다.
//! 같은 플러그인에 대한 로드/언로드 프로토콜은 플러그인별 재진입 락으로
//! 직렬화됩니다.

mod diffusion;
mod load;
mod main_loop;
mod system;
mod unload;

pub use load::VetoReason;
pub use main_loop::ManagerCommand;

use super::descriptor::{CapabilityAllowed, LoadType, LoadingType};
use super::discovery::{FsModuleDiscovery, ModuleDiscovery};
use super::events::PluginEvent;
use super::extension::{ExtensionHook, ManagerExtension};
use super::instance::{LifecyclePhase, PluginInstance, PluginRef};
use super::registry::PluginRegistry;
use super::thread::{PluginCommand, PluginThread};
use hive_foundation::{
    capability_and_super_capabilities, is_event_or_sub_event, Error, Platform, PluginConfigStore,
    Result, RuntimeConfig, Scheduler, TemplateResolver,
};
use parking_lot::{Condvar, Mutex, ReentrantMutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

// ============================================================================
// ManagerState
// ============================================================================

#[derive(Default)]
struct ManagerState {
    plugin_instances: HashMap<String, PluginRef>,
    /// 인스턴스 생성 순서
    instance_order: Vec<String>,

    /// capability → 자신과 하위 capability (선언된 것만)
    capabilities_sub_capabilities: HashMap<String, Vec<String>>,

    /// capability(상위 포함) → 로드된 제공자
    capabilities_plugin_instances: HashMap<String, Vec<PluginRef>>,

    /// allowed capability → 요청 플러그인
    capabilities_allowed_plugins: BTreeMap<String, Vec<(PluginRef, CapabilityAllowed)>>,

    /// 의존 대상 ID → 의존하는 플러그인
    plugin_dependent_plugins: HashMap<String, Vec<PluginRef>>,

    /// 주입된 플러그인 ID → (요청 플러그인, capability)
    plugin_allowed_plugins: HashMap<String, Vec<(PluginRef, String)>>,

    /// scope → 원본 ID → 레플리카
    diffusion_scope_loaded_plugins: HashMap<u64, BTreeMap<String, PluginRef>>,

    /// scope → 소유 플러그인 ID
    scope_owners: HashMap<u64, String>,

    plugin_threads: HashMap<String, Arc<PluginThread>>,

    /// 매니저 이벤트 → 구독 플러그인
    manager_event_subscribers: BTreeMap<String, Vec<Weak<PluginInstance>>>,

    /// 로드 완료 순서 (언로드는 역순)
    load_order: Vec<String>,

    /// end_load 전 단계의 플러그인
    pending_end_load: HashSet<String>,

    replica_id: u64,
    diffusion_scope_id: u64,
    current_id: u64,

    system_loaded: bool,
    discovered_modules: Vec<String>,
}

// ============================================================================
// PluginManager
// ============================================================================

pub struct PluginManager {
    config: RuntimeConfig,
    registry: PluginRegistry,
    platform: Platform,

    scheduler: Arc<Scheduler>,
    template_resolver: TemplateResolver,
    config_store: Option<PluginConfigStore>,
    discovery: Box<dyn ModuleDiscovery>,
    extensions: RwLock<Vec<Arc<dyn ManagerExtension>>>,

    state: Mutex<ManagerState>,

    commands: Mutex<VecDeque<ManagerCommand>>,
    commands_condvar: Condvar,

    protocol_locks: Mutex<HashMap<String, Arc<ReentrantMutex<()>>>>,

    self_ref: Weak<PluginManager>,
}

/// [`PluginManager`] 빌더
pub struct PluginManagerBuilder {
    registry: PluginRegistry,
    config: RuntimeConfig,
    discovery: Option<Box<dyn ModuleDiscovery>>,
    config_store: Option<PluginConfigStore>,
    template_resolver: Option<TemplateResolver>,
    extensions: Vec<Arc<dyn ManagerExtension>>,
}

impl PluginManagerBuilder {
    pub fn discovery(mut self, discovery: impl ModuleDiscovery + 'static) -> Self {
        self.discovery = Some(Box::new(discovery));
        self
    }

    pub fn config_store(mut self, store: PluginConfigStore) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn template_resolver(mut self, resolver: TemplateResolver) -> Self {
        self.template_resolver = Some(resolver);
        self
    }

    pub fn extension(mut self, extension: Arc<dyn ManagerExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn build(self) -> Arc<PluginManager> {
        let platform = match self.config.platform.as_deref() {
            Some(name) => name.parse().unwrap_or_else(|e| {
                warn!("Ignoring platform override: {}", e);
                Platform::detect()
            }),
            None => Platform::detect(),
        };

        Arc::new_cyclic(|self_ref| PluginManager {
            platform,
            registry: self.registry,
            scheduler: Arc::new(Scheduler::new()),
            template_resolver: self.template_resolver.unwrap_or_default(),
            config_store: self.config_store,
            discovery: self
                .discovery
                .unwrap_or_else(|| Box::new(FsModuleDiscovery::new())),
            extensions: RwLock::new(self.extensions),
            state: Mutex::new(ManagerState::default()),
            commands: Mutex::new(VecDeque::new()),
            commands_condvar: Condvar::new(),
            protocol_locks: Mutex::new(HashMap::new()),
            self_ref: self_ref.clone(),
            config: self.config,
        })
    }
}

impl PluginManager {
    /// 기본 협력자로 생성
    pub fn new(registry: PluginRegistry, config: RuntimeConfig) -> Arc<Self> {
        Self::builder(registry, config).build()
    }

    pub fn builder(registry: PluginRegistry, config: RuntimeConfig) -> PluginManagerBuilder {
        PluginManagerBuilder {
            registry,
            config,
            discovery: None,
            config_store: None,
            template_resolver: None,
            extensions: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn template_resolver(&self) -> &TemplateResolver {
        &self.template_resolver
    }

    pub fn config_store(&self) -> Option<&PluginConfigStore> {
        self.config_store.as_ref()
    }

    /// 현재 플랫폼 (설정 override 또는 감지)
    pub fn platform(&self) -> Platform {
        self.platform
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// 싱글톤 인스턴스 생성 (이미 있으면 기존 인스턴스)
    ///
    /// 등록되지 않은 클래스는 구조적 에러입니다.
    pub fn instantiate_plugin(&self, id: &str) -> Result<PluginRef> {
        if let Some(existing) = self.plugin(id) {
            return Ok(existing);
        }

        let descriptor = self.registry.get(id, None)?;

        let plugin = {
            let mut state = self.state.lock();
            if let Some(existing) = state.plugin_instances.get(id) {
                return Ok(Arc::clone(existing));
            }

            state.current_id += 1;
            let plugin = Arc::new(PluginInstance::new(
                id.to_string(),
                None,
                state.current_id,
                Arc::clone(&descriptor),
                self.self_ref.clone(),
            ));

            for capability in &descriptor.capabilities {
                for ancestor in capability_and_super_capabilities(capability) {
                    let subs = state
                        .capabilities_sub_capabilities
                        .entry(ancestor)
                        .or_default();
                    if !subs.contains(capability) {
                        subs.push(capability.clone());
                    }
                }
            }

            state
                .plugin_instances
                .insert(id.to_string(), Arc::clone(&plugin));
            state.instance_order.push(id.to_string());
            plugin
        };

        debug!(plugin = %id, "Instantiated plugin");
        self.apply_configuration(&plugin);
        Ok(plugin)
    }

    /// 설정 저장소의 값을 인스턴스에 적용
    fn apply_configuration(&self, plugin: &PluginRef) {
        let Some(store) = &self.config_store else {
            return;
        };

        match store.load_plugin_configuration(plugin.original_id()) {
            Ok(configuration) => {
                for (key, value) in configuration {
                    if let Err(e) = plugin.set_configuration(key, value) {
                        warn!(plugin = %plugin.id(), "Configuration rejected: {}", e);
                    }
                }
            }
            Err(e) => warn!(plugin = %plugin.id(), "Failed to load configuration: {}", e),
        }
    }

    /// 인스턴스와 전용 스레드 제거 (언로드 후)
    fn remove_instance(&self, plugin: &PluginRef) {
        let thread = {
            let mut state = self.state.lock();
            state.plugin_instances.remove(plugin.id());
            state.instance_order.retain(|id| id != plugin.id());
            state.plugin_dependent_plugins.remove(plugin.id());
            state.plugin_threads.remove(plugin.id())
        };
        self.protocol_locks.lock().remove(plugin.id());

        if let Some(thread) = thread {
            thread.join(self.config.join_timeout());
        }
        debug!(plugin = %plugin.id(), "Removed plugin instance");
    }

    pub fn plugin(&self, id: &str) -> Option<PluginRef> {
        self.state.lock().plugin_instances.get(id).cloned()
    }

    /// 모든 인스턴스 (생성 순서, 레플리카 포함)
    pub fn plugins(&self) -> Vec<PluginRef> {
        let state = self.state.lock();
        state
            .instance_order
            .iter()
            .filter_map(|id| state.plugin_instances.get(id).cloned())
            .collect()
    }

    pub fn loaded_plugins(&self) -> Vec<PluginRef> {
        self.plugins()
            .into_iter()
            .filter(|p| p.is_loaded_or_lazy_loaded())
            .collect()
    }

    /// `capability`와 그 하위 capability를 제공하는 싱글톤 인스턴스
    ///
    /// capability 자체를 선언한 인스턴스가 먼저 옵니다.
    pub fn plugins_by_capability(&self, capability: &str) -> Vec<PluginRef> {
        let state = self.state.lock();

        let mut capabilities = vec![capability.to_string()];
        if let Some(subs) = state.capabilities_sub_capabilities.get(capability) {
            capabilities.extend(subs.iter().filter(|c| *c != capability).cloned());
        }

        let mut providers: Vec<PluginRef> = Vec::new();
        for capability in &capabilities {
            for id in &state.instance_order {
                let Some(plugin) = state.plugin_instances.get(id) else {
                    continue;
                };
                if plugin.is_replica() || !plugin.descriptor().has_capability(capability) {
                    continue;
                }
                if !providers.iter().any(|p| Arc::ptr_eq(p, plugin)) {
                    providers.push(Arc::clone(plugin));
                }
            }
        }
        providers
    }

    /// capability 인덱스에 등록된 (로드된) 제공자
    pub fn loaded_plugins_by_capability(&self, capability: &str) -> Vec<PluginRef> {
        self.state
            .lock()
            .capabilities_plugin_instances
            .get(capability)
            .cloned()
            .unwrap_or_default()
    }

    /// `id`에 의존하는 플러그인
    pub fn dependent_plugins(&self, id: &str) -> Vec<PluginRef> {
        self.state
            .lock()
            .plugin_dependent_plugins
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// `id`가 주입된 (요청 플러그인, capability)
    pub fn allowed_plugins(&self, id: &str) -> Vec<(PluginRef, String)> {
        self.state
            .lock()
            .plugin_allowed_plugins
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// scope의 레플리카 (원본 ID 순)
    pub fn diffusion_scope(&self, scope: u64) -> Vec<PluginRef> {
        self.state
            .lock()
            .diffusion_scope_loaded_plugins
            .get(&scope)
            .map(|replicas| replicas.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn plugin_thread_count(&self) -> usize {
        self.state.lock().plugin_threads.len()
    }

    pub fn is_system_loaded(&self) -> bool {
        self.state.lock().system_loaded
    }

    pub fn discovered_modules(&self) -> Vec<String> {
        self.state.lock().discovered_modules.clone()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn protocol_lock(&self, id: &str) -> Arc<ReentrantMutex<()>> {
        Arc::clone(
            self.protocol_locks
                .lock()
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(ReentrantMutex::new(()))),
        )
    }

    /// 전용 스레드 조회/생성 (종료된 스레드는 교체)
    fn plugin_thread(&self, plugin: &PluginRef) -> Result<Arc<PluginThread>> {
        let mut state = self.state.lock();

        if let Some(thread) = state.plugin_threads.get(plugin.id()) {
            if !thread.is_finished() {
                return Ok(Arc::clone(thread));
            }
        }

        let thread = Arc::new(PluginThread::start(plugin, self.config.join_timeout())?);
        state
            .plugin_threads
            .insert(plugin.id().to_string(), Arc::clone(&thread));
        Ok(thread)
    }

    /// 라이프사이클 단계 실행
    ///
    /// `main`/`thread` 플러그인은 전용 스레드에 명령을 넣고 ready 세마포어를
    /// 기다리며, 나머지는 호출 스레드에서 바로 실행합니다.
    /// `Ok(false)`는 플러그인이 에러 상태로 끝났음을 뜻합니다.
    fn dispatch_phase(&self, plugin: &PluginRef, phase: LifecyclePhase) -> Result<bool> {
        if !plugin.descriptor().requires_thread() {
            let result = plugin.execute_phase(phase);
            return self.check_hook(result).map(|ok| ok && !plugin.is_error_state());
        }

        let thread = self.plugin_thread(plugin)?;
        plugin.drain_ready_semaphore();
        thread.add_event(PluginCommand::Phase(phase));

        let timeout = self.config.ready_timeout();
        if !plugin.acquire_ready_semaphore(timeout) {
            warn!(plugin = %plugin.id(), %phase, "Ready handshake timed out after {:?}", timeout);
            plugin.record_error(Error::Timeout(format!(
                "{} of {} did not complete within {:?}",
                phase,
                plugin.id(),
                timeout
            )));
            return Ok(false);
        }

        if plugin.is_error_state() {
            if self.config.stop_on_cycle_error {
                let message = plugin
                    .exception()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown failure".to_string());
                return Err(Error::lifecycle(plugin.id(), phase.name(), message));
            }
            return Ok(false);
        }

        Ok(true)
    }

    /// 훅 결과에 `stop_on_cycle_error` 정책 적용
    fn check_hook(&self, result: Result<()>) -> Result<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e) if self.config.stop_on_cycle_error => Err(e),
            Err(e) => {
                debug!("Hook failure captured: {}", e);
                Ok(false)
            }
        }
    }

    // ========================================================================
    // Manager events
    // ========================================================================

    pub(crate) fn add_manager_event_subscriber(&self, plugin: &PluginRef, event: &str) {
        let mut state = self.state.lock();
        let subscribers = state
            .manager_event_subscribers
            .entry(event.to_string())
            .or_default();

        if !subscribers.iter().any(|s| s.as_ptr() == Arc::as_ptr(plugin)) {
            subscribers.push(Arc::downgrade(plugin));
        }
        debug!(plugin = %plugin.id(), event, "Registered for manager event");
    }

    pub(crate) fn remove_manager_event_subscriber(&self, plugin: &PluginRef, event: &str) {
        let mut state = self.state.lock();
        if let Some(subscribers) = state.manager_event_subscribers.get_mut(event) {
            subscribers.retain(|s| s.as_ptr() != Arc::as_ptr(plugin));
            if subscribers.is_empty() {
                state.manager_event_subscribers.remove(event);
            }
        }
    }

    /// 매니저 이벤트 발생
    ///
    /// `name` 또는 그 상위 이벤트를 구독한 플러그인에 전달하고 전달 수를 반환합니다.
    pub fn notify_event(&self, name: &str, args: Value) -> usize {
        let subscribers: Vec<PluginRef> = {
            let state = self.state.lock();
            let mut subscribers: Vec<PluginRef> = Vec::new();

            for (registered, plugins) in &state.manager_event_subscribers {
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

        let event = PluginEvent::manager(name, args);
        let mut delivered = 0;

        for subscriber in subscribers {
            if subscriber.is_loaded_or_lazy_loaded() && !subscriber.is_error_state() {
                subscriber.notify_event(&event);
                delivered += 1;
            }
        }

        debug!(event = name, delivered, "Manager event");
        delivered
    }

    // ========================================================================
    // Extensions
    // ========================================================================

    pub fn register_extension(&self, extension: Arc<dyn ManagerExtension>) {
        info!(
            extension = extension.name(),
            hook = extension.hook().name(),
            "Registered manager extension"
        );
        self.extensions.write().push(extension);
    }

    fn extensions(&self, hook: ExtensionHook) -> Vec<Arc<dyn ManagerExtension>> {
        self.extensions
            .read()
            .iter()
            .filter(|e| e.hook() == hook)
            .cloned()
            .collect()
    }

    /// `test`를 통과한 확장만 실행, 모두 성공하면 true
    pub fn execute_extensions(&self, hook: ExtensionHook, plugin: Option<&PluginRef>) -> bool {
        let mut all = true;
        for extension in self.extensions(hook) {
            if !extension.test(self, plugin) {
                continue;
            }
            if !extension.execute(self, plugin) {
                warn!(extension = extension.name(), hook = hook.name(), "Extension failed");
                all = false;
            }
        }
        all
    }

    /// 조건 검사 없이 모든 확장 실행
    pub fn execute_extensions_unconditional(
        &self,
        hook: ExtensionHook,
        plugin: Option<&PluginRef>,
    ) -> bool {
        let mut all = true;
        for extension in self.extensions(hook) {
            if !extension.execute(self, plugin) {
                warn!(extension = extension.name(), hook = hook.name(), "Extension failed");
                all = false;
            }
        }
        all
    }

    // ========================================================================
    // Public protocol entry points
    // ========================================================================

    /// 플러그인 전체 로드 (인스턴스가 없으면 생성)
    pub fn load_plugin(&self, id: &str, load_type: LoadType) -> Result<bool> {
        let plugin = self.instantiate_plugin(id)?;
        self.load_plugin_instance(&plugin, load_type, LoadingType::Eager)
    }

    /// 지연 로드 (capability/의존성 연결은 전체 로드 시점으로 미룸)
    pub fn lazy_load_plugin(&self, id: &str) -> Result<bool> {
        let plugin = self.instantiate_plugin(id)?;
        self.load_plugin_instance(&plugin, LoadType::Full, LoadingType::Lazy)
    }

    pub fn unload_plugin(&self, id: &str, load_type: LoadType) -> Result<bool> {
        let plugin = self
            .plugin(id)
            .ok_or_else(|| Error::PluginNotFound(id.to_string()))?;
        self.unload_plugin_instance(&plugin, load_type)
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PluginManager")
            .field("platform", &self.platform)
            .field("instances", &state.instance_order)
            .field("load_order", &state.load_order)
            .field("system_loaded", &state.system_loaded)
            .finish_non_exhaustive()
    }
}
