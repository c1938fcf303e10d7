//! Shared fixtures: journal plugins that record every hook call

#![allow(dead_code)]

use hive_core::{Plugin, PluginDescriptor, PluginEvent, PluginManager, PluginRef, PluginRegistry};
use hive_foundation::{Error, Latch, Result, RuntimeConfig};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// 테스트용 설정: 짧은 타임아웃, 빠른 main loop
pub fn config() -> RuntimeConfig {
    RuntimeConfig::new()
        .ready_timeout_secs(5)
        .join_timeout_secs(5)
        .unload_timeout_secs(60)
        .loop_wake_interval_ms(20)
}

/// 모든 클래스를 인스턴스화한 매니저 (load_system 직전 상태)
pub fn manager(descriptors: Vec<PluginDescriptor>, config: RuntimeConfig) -> Arc<PluginManager> {
    let registry = PluginRegistry::new();
    for descriptor in descriptors {
        assert!(registry.register(descriptor));
    }

    let manager = PluginManager::new(registry, config);
    for descriptor in manager.registry().list() {
        manager.instantiate_plugin(&descriptor.id).unwrap();
    }
    manager
}

pub fn count(journal: &Journal, entry: &str) -> usize {
    journal.lock().iter().filter(|e| *e == entry).count()
}

pub fn position(journal: &Journal, entry: &str) -> usize {
    journal
        .lock()
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("{} not in journal {:?}", entry, journal.lock()))
}

pub fn contains(journal: &Journal, entry: &str) -> bool {
    count(journal, entry) > 0
}

// ============================================================================
// Recorder: 모든 훅을 `<id>:<hook>[:<detail>]`로 기록
// ============================================================================

pub struct Recorder {
    journal: Journal,
    fail_on: Option<&'static str>,
    listen: Option<&'static str>,
}

impl Recorder {
    fn record(&self, ctx: &PluginRef, hook: &'static str, detail: Option<String>) -> Result<()> {
        let entry = match detail {
            Some(detail) => format!("{}:{}:{}", ctx.id(), hook, detail),
            None => format!("{}:{}", ctx.id(), hook),
        };
        self.journal.lock().push(entry);

        if self.fail_on == Some(hook) {
            return Err(Error::lifecycle(ctx.id(), hook, "recorder failure"));
        }
        Ok(())
    }
}

impl Plugin for Recorder {
    fn on_load(&self, ctx: &PluginRef) -> Result<()> {
        if let Some(event) = self.listen {
            ctx.register_for_plugin_manager_event(event);
        }
        self.record(ctx, "load", None)
    }

    fn on_lazy_load(&self, ctx: &PluginRef) -> Result<()> {
        self.record(ctx, "lazy_load", None)
    }

    fn on_end_load(&self, ctx: &PluginRef) -> Result<()> {
        self.record(ctx, "end_load", None)
    }

    fn on_unload(&self, ctx: &PluginRef) -> Result<()> {
        self.record(ctx, "unload", None)
    }

    fn on_end_unload(&self, ctx: &PluginRef) -> Result<()> {
        self.record(ctx, "end_unload", None)
    }

    fn on_load_allowed(&self, ctx: &PluginRef, plugin: &PluginRef, capability: &str) -> Result<()> {
        self.record(ctx, "allowed", Some(format!("{}={}", capability, plugin.id())))
    }

    fn on_unload_allowed(
        &self,
        ctx: &PluginRef,
        plugin: &PluginRef,
        capability: &str,
    ) -> Result<()> {
        self.record(ctx, "unallowed", Some(format!("{}={}", capability, plugin.id())))
    }

    fn on_dependency_injected(&self, ctx: &PluginRef, plugin: &PluginRef) -> Result<()> {
        self.record(ctx, "dependency", Some(plugin.id().to_string()))
    }

    fn on_event(&self, ctx: &PluginRef, event: &PluginEvent) -> Result<()> {
        self.record(ctx, "event", Some(event.name.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn recorder_with(
    id: &str,
    journal: &Journal,
    fail_on: Option<&'static str>,
    listen: Option<&'static str>,
) -> PluginDescriptor {
    let journal = Arc::clone(journal);
    PluginDescriptor::new(id, id, move || {
        Box::new(Recorder {
            journal: Arc::clone(&journal),
            fail_on,
            listen,
        })
    })
}

pub fn recorder(id: &str, journal: &Journal) -> PluginDescriptor {
    recorder_with(id, journal, None, None)
}

/// `hook`에서 에러를 반환하는 recorder
pub fn failing_recorder(id: &str, journal: &Journal, hook: &'static str) -> PluginDescriptor {
    recorder_with(id, journal, Some(hook), None)
}

/// 로드 시 매니저 이벤트 `event`를 구독하는 recorder
pub fn listening_recorder(id: &str, journal: &Journal, event: &'static str) -> PluginDescriptor {
    recorder_with(id, journal, None, Some(event))
}

// ============================================================================
// Blocker: 반환하지 않는 on_load (서버 루프 흉내)
// ============================================================================

pub struct Blocker {
    gate: Arc<Latch>,
    release_first: bool,
}

impl Plugin for Blocker {
    fn on_load(&self, ctx: &PluginRef) -> Result<()> {
        if self.release_first {
            ctx.release_ready_semaphore();
        }
        self.gate.wait();
        Ok(())
    }

    fn on_unload(&self, _ctx: &PluginRef) -> Result<()> {
        self.gate.open();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `main` capability 차단 플러그인; `gate`를 열면 on_load가 반환
pub fn blocker(id: &str, gate: &Arc<Latch>, release_first: bool) -> PluginDescriptor {
    let gate = Arc::clone(gate);
    PluginDescriptor::new(id, id, move || {
        Box::new(Blocker {
            gate: Arc::clone(&gate),
            release_first,
        })
    })
    .with_capability(hive_core::plugin::CAPABILITY_MAIN)
}
