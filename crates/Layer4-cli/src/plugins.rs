//! Built-in plugins
//!
//! - `hive.heartbeat`: `main` capability. 로드 훅이 반환하지 않고 스케줄러로
//!   주기적인 `hive.heartbeat.beat` 이벤트를 발생시킵니다.
//! - `hive.status`: `main` 제공자를 allowed로 받아 시스템 로드 완료 시 상태를 기록합니다.

use hive_core::plugin::{CAPABILITY_MAIN, EVENT_END_LOAD_SYSTEM};
use hive_core::{Plugin, PluginDescriptor, PluginEvent, PluginRef, PluginVersion};
use hive_foundation::{Latch, Result, Scheduler};
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const HEARTBEAT_ID: &str = "hive.heartbeat";
pub const STATUS_ID: &str = "hive.status";

/// heartbeat 이벤트 네임스페이스
pub const HEARTBEAT_EVENT: &str = "hive.heartbeat";
pub const HEARTBEAT_BEAT_EVENT: &str = "hive.heartbeat.beat";

const DEFAULT_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Heartbeat
// ============================================================================

#[derive(Default)]
pub struct Heartbeat {
    stop: Mutex<Option<Arc<Latch>>>,
    beats: Arc<AtomicU64>,
}

impl Heartbeat {
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }
}

impl Plugin for Heartbeat {
    fn on_load(&self, ctx: &PluginRef) -> Result<()> {
        let stop = Arc::new(Latch::new());
        *self.stop.lock() = Some(Arc::clone(&stop));

        let interval = ctx
            .configuration("intervalMs")
            .and_then(|v| v.as_u64())
            .map(Duration::from_millis)
            .or_else(|| {
                ctx.configuration("intervalSecs")
                    .and_then(|v| v.as_u64())
                    .map(Duration::from_secs)
            })
            .unwrap_or(Duration::from_secs(DEFAULT_INTERVAL_SECS));

        if let Some(manager) = ctx.manager() {
            schedule_beat(
                Arc::clone(manager.scheduler()),
                Arc::clone(ctx),
                Arc::clone(&stop),
                Arc::clone(&self.beats),
                interval,
            );
        }

        info!(plugin = %ctx.id(), ?interval, "Heartbeat started");
        ctx.release_ready_semaphore();

        stop.wait();
        info!(plugin = %ctx.id(), beats = self.beats(), "Heartbeat stopped");
        Ok(())
    }

    fn on_unload(&self, _ctx: &PluginRef) -> Result<()> {
        if let Some(stop) = self.stop.lock().take() {
            stop.open();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn schedule_beat(
    scheduler: Arc<Scheduler>,
    plugin: PluginRef,
    stop: Arc<Latch>,
    beats: Arc<AtomicU64>,
    interval: Duration,
) {
    let next = Arc::clone(&scheduler);
    let result = scheduler.add_callable_in(
        move || {
            if stop.is_open() {
                return Ok(());
            }
            let count = beats.fetch_add(1, Ordering::SeqCst) + 1;
            plugin.generate_event(HEARTBEAT_BEAT_EVENT, json!({ "count": count }));
            schedule_beat(next, plugin, stop, beats, interval);
            Ok(())
        },
        interval,
    );

    if let Err(e) = result {
        debug!("Heartbeat not scheduled: {}", e);
    }
}

pub fn heartbeat() -> PluginDescriptor {
    PluginDescriptor::new(HEARTBEAT_ID, "Heartbeat", || Box::new(Heartbeat::default()))
        .with_short_name("heartbeat")
        .with_description("Keeps the runtime alive and emits periodic beat events")
        .with_version(PluginVersion::new(0, 1, 0))
        .with_capability(CAPABILITY_MAIN)
        .with_event_handled(HEARTBEAT_EVENT)
}

hive_core::hive_plugin!(heartbeat);

// ============================================================================
// Status
// ============================================================================

#[derive(Default)]
pub struct Status {
    reports: AtomicUsize,
    beats_seen: AtomicU64,
}

impl Status {
    pub fn reports(&self) -> usize {
        self.reports.load(Ordering::SeqCst)
    }

    pub fn beats_seen(&self) -> u64 {
        self.beats_seen.load(Ordering::SeqCst)
    }
}

impl Plugin for Status {
    fn on_load(&self, ctx: &PluginRef) -> Result<()> {
        ctx.register_for_plugin_manager_event(EVENT_END_LOAD_SYSTEM);
        Ok(())
    }

    fn on_load_allowed(&self, ctx: &PluginRef, plugin: &PluginRef, capability: &str) -> Result<()> {
        info!(plugin = %ctx.id(), provider = %plugin.id(), capability, "Provider attached");
        Ok(())
    }

    fn on_unload_allowed(
        &self,
        ctx: &PluginRef,
        plugin: &PluginRef,
        capability: &str,
    ) -> Result<()> {
        info!(plugin = %ctx.id(), provider = %plugin.id(), capability, "Provider detached");
        Ok(())
    }

    fn on_event(&self, ctx: &PluginRef, event: &PluginEvent) -> Result<()> {
        if event.name == EVENT_END_LOAD_SYSTEM {
            if let Some(manager) = ctx.manager() {
                for plugin in manager.loaded_plugins() {
                    info!(
                        plugin = %plugin.id(),
                        lazy = plugin.is_lazy_loaded(),
                        "Loaded"
                    );
                }
            }
            let mains: Vec<String> = ctx
                .allowed_plugins(CAPABILITY_MAIN)
                .iter()
                .map(|p| p.id().to_string())
                .collect();
            info!(main = ?mains, "System loaded");
            self.reports.fetch_add(1, Ordering::SeqCst);
        } else if event.name.starts_with(HEARTBEAT_EVENT) {
            self.beats_seen.fetch_add(1, Ordering::SeqCst);
            debug!(event = %event.name, args = %event.args, "Beat");
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn status() -> PluginDescriptor {
    PluginDescriptor::new(STATUS_ID, "Status", || Box::new(Status::default()))
        .with_short_name("status")
        .with_description("Logs the loaded plugin set once the system is up")
        .with_version(PluginVersion::new(0, 1, 0))
        .with_capability_allowed(CAPABILITY_MAIN)
        .with_event_registrable(HEARTBEAT_EVENT)
}

hive_core::hive_plugin!(status);

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::{PluginManager, PluginRegistry};
    use hive_foundation::RuntimeConfig;

    fn manager() -> Arc<PluginManager> {
        let registry = PluginRegistry::new();
        registry.register(heartbeat());
        registry.register(status());

        let config = RuntimeConfig::new()
            .ready_timeout_secs(5)
            .join_timeout_secs(5)
            .unload_timeout_secs(30)
            .loop_wake_interval_ms(20);
        PluginManager::new(registry, config)
    }

    #[test]
    fn test_builtins_registered() {
        let registry = PluginRegistry::with_registered();
        assert!(registry.contains(HEARTBEAT_ID));
        assert!(registry.contains(STATUS_ID));
    }

    #[test]
    fn test_system_lifecycle() {
        let manager = manager();
        manager.load_system().unwrap();

        let heartbeat = manager.plugin(HEARTBEAT_ID).unwrap();
        let status = manager.plugin(STATUS_ID).unwrap();
        assert!(heartbeat.is_loaded());
        assert!(status.is_loaded());
        assert_eq!(manager.plugin_thread_count(), 1);

        let mains = status.allowed_plugins(CAPABILITY_MAIN);
        assert_eq!(mains.len(), 1);
        assert_eq!(mains[0].id(), HEARTBEAT_ID);
        assert_eq!(status.plugin_as::<Status>().unwrap().reports(), 1);

        // status가 heartbeat 이벤트를 교차 구독
        assert!(heartbeat.generate_event(HEARTBEAT_BEAT_EVENT, json!({ "count": 0 })));
        assert_eq!(status.plugin_as::<Status>().unwrap().beats_seen(), 1);

        manager.unload_system(false).unwrap();
        assert!(!heartbeat.is_loaded());
        assert!(!status.is_loaded());
        assert!(!manager.is_system_loaded());
    }

    #[test]
    fn test_heartbeat_beats() {
        let manager = manager();
        manager
            .instantiate_plugin(HEARTBEAT_ID)
            .unwrap()
            .set_configuration("intervalMs", json!(10))
            .unwrap();
        manager.load_system().unwrap();

        let heartbeat = manager.plugin(HEARTBEAT_ID).unwrap();
        let plugin = heartbeat.plugin_as::<Heartbeat>().unwrap();
        for _ in 0..100 {
            if plugin.beats() >= 3 {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(plugin.beats() >= 3);

        manager.unload_system(false).unwrap();
    }
}
