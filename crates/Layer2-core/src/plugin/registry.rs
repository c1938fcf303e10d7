//! Plugin Registry - 플러그인 클래스 저장소
//!
//! 인스턴스가 아니라 디스크립터(클래스)를 보관합니다. 컴파일타임 플러그인은
//! [`hive_plugin!`](crate::hive_plugin) 매크로로 링크 시점에 등록되고
//! [`PluginRegistry::with_registered`]가 이를 수집합니다.

use super::descriptor::{PluginDescriptor, PluginVersion};
use hive_foundation::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// 링크 타임 등록
// ============================================================================

/// `inventory`로 제출되는 등록 항목
pub struct PluginRegistration {
    factory: fn() -> PluginDescriptor,
}

impl PluginRegistration {
    pub const fn new(factory: fn() -> PluginDescriptor) -> Self {
        Self { factory }
    }

    pub fn descriptor(&self) -> PluginDescriptor {
        (self.factory)()
    }
}

inventory::collect!(PluginRegistration);

/// 플러그인 디스크립터 함수를 링크 시점에 등록
///
/// ```ignore
/// fn heartbeat() -> PluginDescriptor { ... }
/// hive_core::hive_plugin!(heartbeat);
/// ```
#[macro_export]
macro_rules! hive_plugin {
    ($factory:path) => {
        $crate::inventory::submit! {
            $crate::plugin::PluginRegistration::new($factory)
        }
    };
}

// ============================================================================
// PluginRegistry
// ============================================================================

struct RegisteredClass {
    descriptor: Arc<PluginDescriptor>,
    load_order: usize,
}

/// 플러그인 클래스 레지스트리
#[derive(Default)]
pub struct PluginRegistry {
    classes: RwLock<HashMap<String, RegisteredClass>>,
    load_counter: RwLock<usize>,
}

impl PluginRegistry {
    /// 빈 레지스트리
    pub fn new() -> Self {
        Self::default()
    }

    /// `hive_plugin!`으로 등록된 모든 클래스를 포함한 레지스트리
    pub fn with_registered() -> Self {
        let registry = Self::new();

        let mut descriptors: Vec<PluginDescriptor> = inventory::iter::<PluginRegistration>
            .into_iter()
            .map(PluginRegistration::descriptor)
            .collect();
        // 링크 순서는 보장되지 않음
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));

        for descriptor in descriptors {
            registry.register(descriptor);
        }

        registry
    }

    /// 클래스 등록 (같은 ID가 있으면 false)
    pub fn register(&self, descriptor: PluginDescriptor) -> bool {
        let id = descriptor.id.clone();
        let mut classes = self.classes.write();

        if classes.contains_key(&id) {
            warn!("Plugin class {} is already registered", id);
            return false;
        }

        let mut counter = self.load_counter.write();
        *counter += 1;

        info!("Registered plugin class: {} (v{})", id, descriptor.version);
        classes.insert(
            id,
            RegisteredClass {
                descriptor: Arc::new(descriptor),
                load_order: *counter,
            },
        );
        true
    }

    /// 클래스 교체 (기존 등록 순서 유지)
    pub fn replace(&self, descriptor: PluginDescriptor) {
        let id = descriptor.id.clone();
        let mut classes = self.classes.write();

        let load_order = match classes.get(&id) {
            Some(existing) => existing.load_order,
            None => {
                let mut counter = self.load_counter.write();
                *counter += 1;
                *counter
            }
        };

        debug!("Replaced plugin class: {}", id);
        classes.insert(
            id,
            RegisteredClass {
                descriptor: Arc::new(descriptor),
                load_order,
            },
        );
    }

    /// 클래스 등록 해제
    pub fn unregister(&self, id: &str) -> Option<Arc<PluginDescriptor>> {
        let removed = self.classes.write().remove(id).map(|c| c.descriptor);
        if removed.is_some() {
            info!("Unregistered plugin class: {}", id);
        }
        removed
    }

    /// 클래스 조회 (없거나 버전이 맞지 않으면 구조적 에러)
    pub fn get(&self, id: &str, version: Option<&str>) -> Result<Arc<PluginDescriptor>> {
        let descriptor = self
            .find(id)
            .ok_or_else(|| Error::class_not_available(id, version))?;

        if let Some(required) = version {
            let required = PluginVersion::parse(required)
                .ok_or_else(|| Error::Config(format!("Invalid plugin version: {}", required)))?;
            if !descriptor.version.satisfies(&required) {
                return Err(Error::class_not_available(id, Some(&required.to_string())));
            }
        }

        Ok(descriptor)
    }

    pub fn find(&self, id: &str) -> Option<Arc<PluginDescriptor>> {
        self.classes
            .read()
            .get(id)
            .map(|c| Arc::clone(&c.descriptor))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.classes.read().contains_key(id)
    }

    /// 모든 클래스 (등록 순서대로)
    pub fn list(&self) -> Vec<Arc<PluginDescriptor>> {
        let classes = self.classes.read();
        let mut ordered: Vec<_> = classes.values().collect();
        ordered.sort_by_key(|c| c.load_order);
        ordered
            .into_iter()
            .map(|c| Arc::clone(&c.descriptor))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    /// capability(또는 그 하위 capability)를 제공하는 클래스
    pub fn find_providers(&self, capability: &str) -> Vec<Arc<PluginDescriptor>> {
        self.list()
            .into_iter()
            .filter(|d| {
                d.capabilities
                    .iter()
                    .any(|c| hive_foundation::is_capability_or_sub_capability(capability, c))
            })
            .collect()
    }

    /// 등록되지 않은 필수 플러그인 의존성
    pub fn check_dependencies(&self, id: &str) -> Vec<String> {
        let Some(descriptor) = self.find(id) else {
            return vec![];
        };

        descriptor
            .dependencies
            .iter()
            .filter(|dep| dep.mandatory)
            .filter_map(|dep| dep.plugin_id())
            .filter(|dep_id| !self.contains(dep_id))
            .map(String::from)
            .collect()
    }

    /// 등록 순서대로 정렬된 클래스 ID
    pub fn load_order(&self) -> Vec<String> {
        self.list().into_iter().map(|d| d.id.clone()).collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("classes", &self.load_order())
            .finish()
    }
}
