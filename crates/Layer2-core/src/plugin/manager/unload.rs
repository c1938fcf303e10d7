//! Unload protocol
//!
//! ```text
//! 1. 로드되지 않았으면 true
//! 2. 의존 플러그인 연쇄 언로드 (Dependency)
//! 3. 소유한 diffusion scope의 레플리카 언로드/제거
//! 4. 이 플러그인을 주입받은 요청 플러그인에 unload_allowed
//! 5. 인덱스 정리 (롤백하지 않음)
//! 6. Unload / EndUnload 단계
//! ```

use super::PluginManager;
use crate::plugin::descriptor::{LoadType, LoadingType};
use crate::plugin::events::EVENT_PLUGIN_UNLOAD;
use crate::plugin::extension::ExtensionHook;
use crate::plugin::instance::{LifecyclePhase, PluginRef};
use hive_foundation::{Error, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl PluginManager {
    /// 언로드 프로토콜
    ///
    /// 트랜잭션이 아닙니다: 단계가 실패해도 이미 정리한 인덱스는 복구하지
    /// 않고 `Ok(false)`를 반환합니다.
    pub fn unload_plugin_instance(&self, plugin: &PluginRef, load_type: LoadType) -> Result<bool> {
        let lock = self.protocol_lock(plugin.id());
        let _guard = lock.lock();

        if !plugin.is_loaded_or_lazy_loaded() {
            return Ok(true);
        }

        info!(plugin = %plugin.id(), load_type = load_type.name(), "Unloading plugin");
        self.tear_down_plugin(plugin, load_type, true)
    }

    /// 언로드 단계 2~6
    ///
    /// `announce`가 false면 `PluginUnloaded` 확장과 언로드 이벤트를 생략합니다.
    pub(super) fn tear_down_plugin(
        &self,
        plugin: &PluginRef,
        load_type: LoadType,
        announce: bool,
    ) -> Result<bool> {
        let mut first_error: Option<Error> = None;

        let dependents = self
            .state
            .lock()
            .plugin_dependent_plugins
            .remove(plugin.id())
            .unwrap_or_default();
        for dependent in dependents {
            debug!(plugin = %plugin.id(), dependent = %dependent.id(), "Cascading unload");
            Self::collect(
                self.unload_plugin_instance(&dependent, LoadType::Dependency),
                &dependent,
                &mut first_error,
            );
        }

        self.destroy_owned_scopes(plugin, &mut first_error);

        let requesters = self
            .state
            .lock()
            .plugin_allowed_plugins
            .remove(plugin.id())
            .unwrap_or_default();
        for (requester, capability) in requesters {
            if !requester.is_loaded_or_lazy_loaded() {
                continue;
            }
            let result = self.check_hook(requester.unload_allowed(plugin, &capability));
            Self::collect(result, &requester, &mut first_error);
        }

        self.clear_capability_indexes(plugin);
        self.scrub_plugin_as_requester(plugin);

        let mut unloaded = match self.dispatch_phase(plugin, LifecyclePhase::Unload) {
            Ok(ok) => ok,
            Err(e) => {
                first_error.get_or_insert(e);
                false
            }
        };
        if unloaded {
            unloaded = match self.dispatch_phase(plugin, LifecyclePhase::EndUnload) {
                Ok(ok) => ok,
                Err(e) => {
                    first_error.get_or_insert(e);
                    false
                }
            };
        }

        self.state.lock().load_order.retain(|id| id != plugin.id());
        if announce {
            self.execute_extensions(ExtensionHook::PluginUnloaded, Some(plugin));
            self.notify_event(
                EVENT_PLUGIN_UNLOAD,
                json!({ "id": plugin.id(), "loadType": load_type.name() }),
            );
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        if unloaded {
            info!(plugin = %plugin.id(), "Plugin unloaded");
        } else {
            warn!(plugin = %plugin.id(), "Plugin unloaded with errors");
        }
        Ok(unloaded && !plugin.is_error_state())
    }

    fn collect(result: Result<bool>, plugin: &PluginRef, first_error: &mut Option<Error>) {
        match result {
            Ok(true) => {}
            Ok(false) => warn!(plugin = %plugin.id(), "Unload step failed"),
            Err(e) => {
                error!(plugin = %plugin.id(), "Unload step error: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    /// 플러그인이 소유한 scope의 레플리카 언로드 및 제거
    fn destroy_owned_scopes(&self, plugin: &PluginRef, first_error: &mut Option<Error>) {
        let scopes: Vec<u64> = {
            let state = self.state.lock();
            let mut scopes: Vec<u64> = state
                .scope_owners
                .iter()
                .filter(|(_, owner)| *owner == plugin.id())
                .map(|(scope, _)| *scope)
                .collect();
            scopes.sort_unstable();
            scopes
        };

        for scope in scopes {
            let replicas: Vec<PluginRef> = {
                let mut state = self.state.lock();
                state.scope_owners.remove(&scope);
                state
                    .diffusion_scope_loaded_plugins
                    .remove(&scope)
                    .map(|replicas| replicas.into_values().collect())
                    .unwrap_or_default()
            };

            debug!(plugin = %plugin.id(), scope, replicas = replicas.len(), "Destroying diffusion scope");
            for replica in replicas {
                Self::collect(
                    self.unload_plugin_instance(&replica, LoadType::Allowed),
                    &replica,
                    first_error,
                );
                self.remove_instance(&replica);
            }
        }
    }

    /// 다른 플러그인의 allowed/의존 목록에서 이 플러그인(요청자) 제거
    ///
    /// `plugin_allowed_plugins[id]` 엔트리 제거와는 별개로, 이 플러그인이
    /// 요청자로 기록된 모든 엔트리도 함께 지웁니다.
    fn scrub_plugin_as_requester(&self, plugin: &PluginRef) {
        let mut state = self.state.lock();

        state.plugin_allowed_plugins.retain(|_, requesters| {
            requesters.retain(|(p, _)| !Arc::ptr_eq(p, plugin));
            !requesters.is_empty()
        });
        state.plugin_dependent_plugins.retain(|_, dependents| {
            dependents.retain(|p| !Arc::ptr_eq(p, plugin));
            !dependents.is_empty()
        });
    }

    /// 언로드 → 인스턴스 제거 → 레지스트리의 현재 클래스로 재생성 → 로드
    ///
    /// 연쇄 언로드된 의존 플러그인은 다시 로드되지 않습니다.
    pub fn reload_plugin(&self, id: &str) -> Result<bool> {
        let plugin = self
            .plugin(id)
            .ok_or_else(|| Error::PluginNotFound(id.to_string()))?;
        if plugin.is_replica() {
            return Err(Error::Config(format!("Cannot reload replica {}", id)));
        }

        let loading_type = if plugin.is_lazy_loaded() {
            LoadingType::Lazy
        } else {
            LoadingType::Eager
        };

        info!(plugin = %id, "Reloading plugin");
        self.unload_plugin_instance(&plugin, LoadType::Full)?;
        self.remove_instance(&plugin);

        let fresh = self.instantiate_plugin(id)?;
        self.load_plugin_instance(&fresh, LoadType::Full, loading_type)
    }
}
