//! System load / unload

use super::{ManagerCommand, PluginManager};
use crate::plugin::descriptor::LoadType;
use crate::plugin::events::{EVENT_END_LOAD_SYSTEM, EVENT_UNLOAD_SYSTEM};
use crate::plugin::extension::ExtensionHook;
use hive_foundation::{Error, Result, Watchdog};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{error, info, warn};

impl PluginManager {
    /// 모듈 발견 → 모든 클래스 인스턴스화 → 스케줄러 시작 → 로드
    ///
    /// 개별 플러그인의 로드 실패(`Ok(false)`)는 로그만 남기고, `Err`는 전파됩니다.
    pub fn load_system(&self) -> Result<()> {
        info!("Loading plugin system");

        let mut paths: Vec<PathBuf> = Vec::new();
        for template in &self.config.plugin_paths {
            paths.extend(self.template_resolver.resolve_existing_dirs(template)?);
        }
        let modules = self.discovery.discover(&paths)?;
        info!(count = modules.len(), "Discovered plugin modules");
        self.state.lock().discovered_modules = modules;

        let descriptors = self.registry.list();
        for descriptor in &descriptors {
            self.instantiate_plugin(&descriptor.id)?;
        }

        self.scheduler.start_scheduler()?;

        for descriptor in &descriptors {
            let Some(plugin) = self.plugin(&descriptor.id) else {
                continue;
            };

            if !self.load_plugin_instance(&plugin, LoadType::Full, descriptor.loading_type)? {
                warn!(plugin = %descriptor.id, "Plugin not loaded");
            }
        }

        self.state.lock().system_loaded = true;
        self.execute_extensions_unconditional(ExtensionHook::EndLoadSystem, None);

        let loaded: Vec<String> = self
            .loaded_plugins()
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        info!(loaded = loaded.len(), "Plugin system loaded");
        self.notify_event(EVENT_END_LOAD_SYSTEM, json!({ "loaded": loaded }));

        Ok(())
    }

    /// 로드 역순 언로드 → 스케줄러 정지 → 플러그인 스레드 종료
    ///
    /// 전체 과정은 `unload_timeout` 워치독으로 보호됩니다. `thread_safe`이면
    /// 스레드 join을 main loop의 Exit 명령으로 넘깁니다.
    pub fn unload_system(&self, thread_safe: bool) -> Result<()> {
        info!(thread_safe, "Unloading plugin system");
        let watchdog = Watchdog::exit_process(self.config.unload_timeout());

        self.notify_event(EVENT_UNLOAD_SYSTEM, Value::Null);

        let order: Vec<String> = self.state.lock().load_order.iter().rev().cloned().collect();
        let mut first_error: Option<Error> = None;

        for id in order {
            let Some(plugin) = self.plugin(&id) else {
                continue;
            };
            match self.unload_plugin_instance(&plugin, LoadType::Full) {
                Ok(true) => {}
                Ok(false) => warn!(plugin = %id, "Plugin unloaded with errors"),
                Err(e) => {
                    error!(plugin = %id, "Unload failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        self.scheduler.stop_scheduler();
        if !self.scheduler.join_scheduler(self.config.join_timeout()) {
            warn!("Scheduler did not stop in time");
        }

        if thread_safe {
            self.add_event(ManagerCommand::Exit);
        } else {
            self.join_plugin_threads();
        }

        self.state.lock().system_loaded = false;
        watchdog.cancel();
        info!("Plugin system unloaded");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
