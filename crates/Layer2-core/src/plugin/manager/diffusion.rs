//! Diffusion policies - allowed 주입 대상 인스턴스 선택
//!
//! | 정책 | 요청 플러그인 scope 없음 | scope `s` |
//! |------|--------------------------|-----------|
//! | `Singleton` | 전역 인스턴스 | 전역 인스턴스 |
//! | `Same` | 전역 인스턴스 | `s`의 레플리카 (없으면 생성) |
//! | `New` | 새 scope의 새 레플리카 | 새 scope의 새 레플리카 |
//!
//! 새 scope는 요청 플러그인이 소유하며, 소유자가 언로드될 때 scope 안의
//! 레플리카도 함께 언로드/제거됩니다.

use super::PluginManager;
use crate::plugin::descriptor::{CapabilityAllowed, DiffusionPolicy, LoadType, LoadingType};
use crate::plugin::instance::{PluginInstance, PluginRef};
use hive_foundation::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl PluginManager {
    /// 정책에 따라 대상 인스턴스를 골라 `requester`에 주입
    pub(super) fn inject_allowed_plugin(
        &self,
        requester: &PluginRef,
        provider: &PluginRef,
        allowed: &CapabilityAllowed,
    ) -> Result<bool> {
        let already_injected = requester
            .allowed_loaded()
            .iter()
            .any(|(p, c)| p.original_id() == provider.original_id() && *c == allowed.name);
        if already_injected {
            return Ok(true);
        }

        let target = match allowed.policy {
            DiffusionPolicy::Singleton => Some(Arc::clone(provider)),
            DiffusionPolicy::Same => match requester.diffusion_scope_id() {
                None => Some(Arc::clone(provider)),
                Some(scope) => match self.scope_replica(scope, provider) {
                    Some(replica) => Some(replica),
                    None => self.create_replica(scope, provider)?,
                },
            },
            DiffusionPolicy::New => {
                let scope = self.new_diffusion_scope(requester);
                self.create_replica(scope, provider)?
            }
        };

        let Some(target) = target else {
            return Ok(false);
        };

        if !self.check_hook(requester.load_allowed(&target, &allowed.name))? {
            return Ok(false);
        }

        let mut state = self.state.lock();
        let requesters = state
            .plugin_allowed_plugins
            .entry(target.id().to_string())
            .or_default();
        if !requesters
            .iter()
            .any(|(p, c)| Arc::ptr_eq(p, requester) && *c == allowed.name)
        {
            requesters.push((Arc::clone(requester), allowed.name.clone()));
        }

        debug!(
            requester = %requester.id(),
            target = %target.id(),
            capability = %allowed.name,
            policy = ?allowed.policy,
            "Allowed plugin injected"
        );
        Ok(true)
    }

    fn scope_replica(&self, scope: u64, provider: &PluginRef) -> Option<PluginRef> {
        self.state
            .lock()
            .diffusion_scope_loaded_plugins
            .get(&scope)
            .and_then(|replicas| replicas.get(provider.original_id()))
            .cloned()
    }

    fn new_diffusion_scope(&self, owner: &PluginRef) -> u64 {
        let mut state = self.state.lock();
        state.diffusion_scope_id += 1;
        let scope = state.diffusion_scope_id;
        state.scope_owners.insert(scope, owner.id().to_string());
        debug!(owner = %owner.id(), scope, "Created diffusion scope");
        scope
    }

    /// scope에 레플리카를 만들고 `Allowed`로 로드 (실패 시 제거 후 None)
    fn create_replica(&self, scope: u64, provider: &PluginRef) -> Result<Option<PluginRef>> {
        let replica = {
            let mut state = self.state.lock();
            state.replica_id += 1;
            state.current_id += 1;

            let id = format!("{}[{}]", provider.original_id(), state.replica_id);
            let replica = Arc::new(PluginInstance::new(
                id.clone(),
                Some(scope),
                state.current_id,
                Arc::clone(provider.descriptor()),
                self.self_ref.clone(),
            ));

            state
                .plugin_instances
                .insert(id.clone(), Arc::clone(&replica));
            state.instance_order.push(id);
            state
                .diffusion_scope_loaded_plugins
                .entry(scope)
                .or_default()
                .insert(provider.original_id().to_string(), Arc::clone(&replica));
            replica
        };

        info!(replica = %replica.id(), scope, "Created plugin replica");
        self.apply_configuration(&replica);

        match self.load_plugin_instance(&replica, LoadType::Allowed, LoadingType::Eager) {
            Ok(true) => Ok(Some(replica)),
            Ok(false) => {
                warn!(replica = %replica.id(), "Replica failed to load, discarded");
                self.discard_replica(&replica);
                Ok(None)
            }
            Err(e) => {
                self.discard_replica(&replica);
                Err(e)
            }
        }
    }

    /// scope 맵과 인스턴스 테이블에서 레플리카 제거
    pub(super) fn discard_replica(&self, replica: &PluginRef) {
        if let Some(scope) = replica.diffusion_scope_id() {
            let mut state = self.state.lock();
            if let Some(replicas) = state.diffusion_scope_loaded_plugins.get_mut(&scope) {
                let owned_here = replicas
                    .get(replica.original_id())
                    .is_some_and(|r| Arc::ptr_eq(r, replica));
                if owned_here {
                    replicas.remove(replica.original_id());
                }
            }
        }
        self.remove_instance(replica);
    }
}
