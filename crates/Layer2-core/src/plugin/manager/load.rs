//! Load protocol
//!
//! ```text
//! 1. 이미 요청 상태면 true
//! 2. TestPluginLoad 확장 → 플랫폼 → 의존성 test (거부 시 false)
//! 3. Load / LazyLoad 단계 (지연 로드는 여기서 끝)
//! 4. capability 인덱스 등록
//! 5. 의존성 주입 (재귀 로드)
//! 6. EndLoad 단계
//! 7. allowed 주입 (diffusion 정책)
//! 8. 이미 로드된 요청 플러그인들에 자신을 주입
//! ```

use super::PluginManager;
use crate::plugin::descriptor::{LoadType, LoadingType};
use crate::plugin::events::{EVENT_PLUGIN_LAZY_LOAD, EVENT_PLUGIN_LOAD};
use crate::plugin::extension::ExtensionHook;
use crate::plugin::instance::{LifecyclePhase, PluginRef};
use hive_foundation::{
    capability_and_super_capabilities, is_capability_or_sub_capability, Error, Platform, Result,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// 로드 거부 사유 (에러가 아님)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VetoReason {
    #[error("vetoed by extension {0}")]
    Extension(String),

    #[error("platform {platform} not supported")]
    Platform { platform: Platform },

    #[error("dependency not satisfied: {0}")]
    Dependency(String),
}

impl PluginManager {
    /// 로드 프로토콜
    ///
    /// `Ok(false)`는 거부되었거나 단계가 실패했음을, `Err`는 구조적 에러 또는
    /// `stop_on_cycle_error` 정책으로 전파된 훅 에러를 뜻합니다.
    pub fn load_plugin_instance(
        &self,
        plugin: &PluginRef,
        load_type: LoadType,
        loading_type: LoadingType,
    ) -> Result<bool> {
        let lock = self.protocol_lock(plugin.id());
        let _guard = lock.lock();

        let lazy = loading_type == LoadingType::Lazy;
        if plugin.is_loaded() || (lazy && plugin.is_lazy_loaded()) {
            trace!(plugin = %plugin.id(), "Already loaded");
            return Ok(true);
        }

        if let Err(reason) = self.test_plugin_load(plugin) {
            info!(plugin = %plugin.id(), load_type = load_type.name(), "Load vetoed: {}", reason);
            return Ok(false);
        }

        debug!(plugin = %plugin.id(), load_type = load_type.name(), lazy, "Load protocol started");
        self.state
            .lock()
            .pending_end_load
            .insert(plugin.id().to_string());

        let mut started = false;
        let outcome = self.run_load_protocol(plugin, load_type, lazy, &mut started);
        self.state.lock().pending_end_load.remove(plugin.id());

        if !matches!(outcome, Ok(true)) {
            let exception = plugin.take_exception();
            if started {
                self.roll_back_load(plugin, load_type);
            } else {
                self.clear_capability_indexes(plugin);
            }

            match exception {
                Some(exception) => plugin.restore_exception(exception),
                None if started => plugin.record_error(Error::lifecycle(
                    plugin.id(),
                    load_type.name(),
                    "load protocol aborted",
                )),
                None => {}
            }
            warn!(plugin = %plugin.id(), load_type = load_type.name(), "Plugin failed to load");
        }

        outcome
    }

    /// Load 단계 이후 실패한 플러그인 정리
    ///
    /// Unload / EndUnload 단계를 실행해 차단 중인 훅과 구독을 해제합니다.
    /// 로드 이벤트가 발생하지 않았으므로 언로드 이벤트도 발생하지 않습니다.
    fn roll_back_load(&self, plugin: &PluginRef, load_type: LoadType) {
        debug!(plugin = %plugin.id(), load_type = load_type.name(), "Rolling back partial load");
        if let Err(e) = self.tear_down_plugin(plugin, load_type, false) {
            warn!(plugin = %plugin.id(), "Rollback failed: {}", e);
        }
    }

    /// 거부 검사: 확장 → 플랫폼 → 의존성
    fn test_plugin_load(&self, plugin: &PluginRef) -> std::result::Result<(), VetoReason> {
        for extension in self.extensions(ExtensionHook::TestPluginLoad) {
            if !extension.test(self, Some(plugin)) {
                return Err(VetoReason::Extension(extension.name().to_string()));
            }
        }

        let descriptor = plugin.descriptor();
        if !descriptor.supports_platform(self.platform) {
            return Err(VetoReason::Platform {
                platform: self.platform,
            });
        }

        for dependency in &descriptor.dependencies {
            if dependency.test(self) {
                continue;
            }
            if dependency.mandatory {
                return Err(VetoReason::Dependency(dependency.to_string()));
            }
            info!(plugin = %plugin.id(), %dependency, "Optional dependency not satisfied");
        }

        Ok(())
    }

    /// `started`는 Load / LazyLoad 훅이 성공했거나 아직 실행 중일 때 true
    fn run_load_protocol(
        &self,
        plugin: &PluginRef,
        load_type: LoadType,
        lazy: bool,
        started: &mut bool,
    ) -> Result<bool> {
        let phase = if lazy {
            LifecyclePhase::LazyLoad
        } else {
            LifecyclePhase::Load
        };
        let phase_ok = self.dispatch_phase(plugin, phase)?;
        *started = phase_ok
            || matches!(plugin.exception().as_deref(), Some(Error::Timeout(_)));
        if !phase_ok {
            return Ok(false);
        }

        if lazy {
            self.record_loaded(plugin);
            self.notify_event(EVENT_PLUGIN_LAZY_LOAD, json!({ "id": plugin.id() }));
            return Ok(true);
        }

        self.resolve_capabilities(plugin);

        if !self.inject_dependencies(plugin)? {
            return Ok(false);
        }

        if !self.dispatch_phase(plugin, LifecyclePhase::EndLoad)? {
            return Ok(false);
        }
        self.state.lock().pending_end_load.remove(plugin.id());

        if !self.inject_allowed(plugin)? {
            return Ok(false);
        }
        if !plugin.is_replica() {
            self.inject_all_allowed(plugin)?;
        }

        if plugin.is_error_state() {
            return Ok(false);
        }

        self.execute_extensions(ExtensionHook::PluginLoaded, Some(plugin));
        self.record_loaded(plugin);
        info!(plugin = %plugin.id(), load_type = load_type.name(), "Plugin loaded");
        self.notify_event(
            EVENT_PLUGIN_LOAD,
            json!({ "id": plugin.id(), "loadType": load_type.name() }),
        );

        Ok(true)
    }

    fn record_loaded(&self, plugin: &PluginRef) {
        let mut state = self.state.lock();
        if !state.load_order.iter().any(|id| id == plugin.id()) {
            state.load_order.push(plugin.id().to_string());
        }
    }

    // ========================================================================
    // Capability 인덱스
    // ========================================================================

    /// 제공 capability(상위 포함)와 allowed capability 인덱스에 등록
    fn resolve_capabilities(&self, plugin: &PluginRef) {
        let descriptor = Arc::clone(plugin.descriptor());
        let mut state = self.state.lock();

        for capability in &descriptor.capabilities {
            for key in capability_and_super_capabilities(capability) {
                let providers = state.capabilities_plugin_instances.entry(key).or_default();
                if !providers.iter().any(|p| Arc::ptr_eq(p, plugin)) {
                    providers.push(Arc::clone(plugin));
                }
            }
        }

        for allowed in &descriptor.capabilities_allowed {
            let requesters = state
                .capabilities_allowed_plugins
                .entry(allowed.name.clone())
                .or_default();
            if !requesters.iter().any(|(p, _)| Arc::ptr_eq(p, plugin)) {
                requesters.push((Arc::clone(plugin), allowed.clone()));
            }
        }

        trace!(plugin = %plugin.id(), "Capabilities resolved");
    }

    pub(super) fn clear_capability_indexes(&self, plugin: &PluginRef) {
        let mut state = self.state.lock();

        state.capabilities_plugin_instances.retain(|_, providers| {
            providers.retain(|p| !Arc::ptr_eq(p, plugin));
            !providers.is_empty()
        });
        state.capabilities_allowed_plugins.retain(|_, requesters| {
            requesters.retain(|(p, _)| !Arc::ptr_eq(p, plugin));
            !requesters.is_empty()
        });
    }

    // ========================================================================
    // 의존성 주입
    // ========================================================================

    fn inject_dependencies(&self, plugin: &PluginRef) -> Result<bool> {
        let descriptor = Arc::clone(plugin.descriptor());

        for dependency in &descriptor.dependencies {
            let Some(dependency_id) = dependency.plugin_id() else {
                continue;
            };
            if !dependency.applies(self) {
                continue;
            }

            let target = match self.instantiate_plugin(dependency_id) {
                Ok(target) => target,
                Err(e) if !dependency.mandatory => {
                    debug!(plugin = %plugin.id(), dependency = dependency_id, "Optional dependency skipped: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !self.load_plugin_instance(&target, LoadType::Dependency, LoadingType::Eager)? {
                if !dependency.mandatory {
                    info!(plugin = %plugin.id(), dependency = dependency_id, "Optional dependency failed to load");
                    continue;
                }
                plugin.record_error(Error::lifecycle(
                    plugin.id(),
                    "dependency",
                    format!("mandatory dependency {} failed to load", dependency_id),
                ));
                return Ok(false);
            }

            if !self.check_hook(plugin.dependency_injected(&target))? {
                return Ok(false);
            }

            let mut state = self.state.lock();
            let dependents = state
                .plugin_dependent_plugins
                .entry(target.id().to_string())
                .or_default();
            if !dependents.iter().any(|p| Arc::ptr_eq(p, plugin)) {
                dependents.push(Arc::clone(plugin));
            }
        }

        Ok(true)
    }

    // ========================================================================
    // Allowed 주입
    // ========================================================================

    /// 선언한 allowed capability마다 제공자를 로드하고 주입
    fn inject_allowed(&self, plugin: &PluginRef) -> Result<bool> {
        let descriptor = Arc::clone(plugin.descriptor());

        for allowed in &descriptor.capabilities_allowed {
            for provider in self.plugins_by_capability(&allowed.name) {
                if Arc::ptr_eq(&provider, plugin) {
                    continue;
                }

                if !self.load_plugin_instance(&provider, LoadType::Allowed, LoadingType::Eager)? {
                    info!(
                        plugin = %plugin.id(),
                        provider = %provider.id(),
                        capability = %allowed.name,
                        "Allowed provider not loaded, skipped"
                    );
                    continue;
                }

                if !self.inject_allowed_plugin(plugin, &provider, allowed)? {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// 이미 로드된 요청 플러그인들 중 이 플러그인의 capability를 허용하는 곳에 주입
    fn inject_all_allowed(&self, plugin: &PluginRef) -> Result<()> {
        let requesters = {
            let state = self.state.lock();
            let capabilities = &plugin.descriptor().capabilities;

            state
                .capabilities_allowed_plugins
                .iter()
                .filter(|(allowed, _)| {
                    capabilities
                        .iter()
                        .any(|c| is_capability_or_sub_capability(allowed, c))
                })
                .flat_map(|(_, requesters)| requesters.iter().cloned())
                .filter(|(requester, _)| !state.pending_end_load.contains(requester.id()))
                .collect::<Vec<_>>()
        };

        for (requester, allowed) in requesters {
            if Arc::ptr_eq(&requester, plugin)
                || !requester.is_loaded()
                || requester.is_error_state()
            {
                continue;
            }

            if !self.inject_allowed_plugin(&requester, plugin, &allowed)? {
                warn!(
                    plugin = %plugin.id(),
                    requester = %requester.id(),
                    capability = %allowed.name,
                    "Injection into requester failed"
                );
            }
        }

        Ok(())
    }
}
