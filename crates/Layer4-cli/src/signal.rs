//! Signal watcher - SIGTERM / Ctrl-C → `unload_system(true)`
//!
//! 런타임은 OS 스레드 기반이므로 시그널 대기 전용 스레드에서만
//! current-thread tokio 런타임을 사용합니다.

use hive_core::PluginManager;
use hive_foundation::WATCHDOG_EXIT_CODE;
use std::future::Future;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

pub fn spawn_watcher(manager: Arc<PluginManager>) -> std::io::Result<JoinHandle<()>> {
    spawn_watcher_with(manager, wait_for_shutdown)
}

/// `wait`가 true를 반환하면 시스템을 언로드
///
/// false는 시그널 핸들러를 설치하지 못했다는 뜻이며 런타임은 계속 실행됩니다.
fn spawn_watcher_with<F, Fut>(
    manager: Arc<PluginManager>,
    wait: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = bool>,
{
    thread::Builder::new()
        .name("hive-signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to start signal runtime: {}", e);
                    return;
                }
            };

            if !runtime.block_on(wait()) {
                warn!("Signal watcher stopped; shutdown signals will not be handled");
                return;
            }
            info!("Shutdown signal received");

            if let Err(e) = manager.unload_system(true) {
                error!("Shutdown failed: {}", e);
                std::process::exit(WATCHDOG_EXIT_CODE);
            }
        })
}

#[cfg(unix)]
async fn wait_for_shutdown() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!("SIGTERM handler unavailable: {}", e);
            return wait_for_ctrl_c().await;
        }
    };

    let ctrl_c = tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        received = terminate.recv() => return received.is_some(),
    };

    match ctrl_c {
        Ok(()) => true,
        Err(e) => {
            warn!("Ctrl-C handler unavailable: {}", e);
            terminate.recv().await.is_some()
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> bool {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::PluginRegistry;
    use hive_foundation::RuntimeConfig;

    fn loaded_manager() -> Arc<PluginManager> {
        let config = RuntimeConfig::new()
            .join_timeout_secs(5)
            .unload_timeout_secs(30);
        let manager = PluginManager::new(PluginRegistry::new(), config);
        manager.load_system().unwrap();
        manager
    }

    #[test]
    fn test_watcher_without_handler_keeps_running() {
        let manager = loaded_manager();

        spawn_watcher_with(Arc::clone(&manager), || async { false })
            .unwrap()
            .join()
            .unwrap();

        assert!(manager.is_system_loaded());
        manager.unload_system(false).unwrap();
    }

    #[test]
    fn test_watcher_unloads_on_signal() {
        let manager = loaded_manager();

        spawn_watcher_with(Arc::clone(&manager), || async { true })
            .unwrap()
            .join()
            .unwrap();

        assert!(!manager.is_system_loaded());
    }
}
