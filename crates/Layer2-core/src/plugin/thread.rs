//! Plugin Thread - `main`/`thread` capability 플러그인 전용 명령 스레드
//!
//! 매니저가 [`PluginCommand`]를 FIFO로 넣으면 워커 스레드가 꺼내서
//! 명령마다 내부 실행 스레드를 띄웁니다. 워커는 내부 스레드를 기다리지
//! 않으므로 반환하지 않는 훅(`on_load` 서버 루프 등)이 있어도 다음 명령
//! (예: Unload)을 계속 처리합니다.
//!
//! 내부 스레드는 훅 호출 전후로 ready 세마포어 release 카운터를 비교해
//! 훅이 스스로 release 하지 않았을 때만 대신 release 합니다.

use super::instance::{LifecyclePhase, PluginRef};
use hive_foundation::{Error, TrackedThread};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// 플러그인 스레드 명령
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginCommand {
    Phase(LifecyclePhase),
    Exit,
}

#[derive(Default)]
struct CommandQueue {
    commands: Mutex<VecDeque<PluginCommand>>,
    condvar: Condvar,
}

impl CommandQueue {
    fn push(&self, command: PluginCommand) {
        self.commands.lock().push_back(command);
        self.condvar.notify_one();
    }

    fn pop(&self) -> PluginCommand {
        let mut commands = self.commands.lock();
        loop {
            if let Some(command) = commands.pop_front() {
                return command;
            }
            self.condvar.wait(&mut commands);
        }
    }
}

// ============================================================================
// PluginThread
// ============================================================================

pub struct PluginThread {
    plugin_id: String,
    queue: Arc<CommandQueue>,
    worker: Mutex<Option<TrackedThread>>,
}

impl PluginThread {
    /// 워커 스레드 시작
    ///
    /// `inner_join_timeout`: Exit 시 내부 실행 스레드 join 제한 시간
    pub fn start(plugin: &PluginRef, inner_join_timeout: Duration) -> std::io::Result<Self> {
        let queue = Arc::new(CommandQueue::default());
        let worker_queue = Arc::clone(&queue);
        let worker_plugin = Arc::clone(plugin);

        let worker = TrackedThread::spawn(format!("plugin-{}", plugin.id()), move || {
            run_worker(worker_plugin, worker_queue, inner_join_timeout)
        })?;

        debug!(plugin = %plugin.id(), "Plugin thread started");

        Ok(Self {
            plugin_id: plugin.id().to_string(),
            queue,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// 명령 추가 (FIFO)
    pub fn add_event(&self, command: PluginCommand) {
        self.queue.push(command);
    }

    pub fn is_finished(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map_or(true, TrackedThread::is_finished)
    }

    /// Exit 후 최대 `timeout` 동안 워커 종료 대기
    pub fn join(&self, timeout: Duration) -> bool {
        let Some(worker) = self.worker.lock().take() else {
            return true;
        };

        self.add_event(PluginCommand::Exit);
        worker.join_timeout(timeout)
    }
}

impl std::fmt::Debug for PluginThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginThread")
            .field("plugin_id", &self.plugin_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn run_worker(plugin: PluginRef, queue: Arc<CommandQueue>, inner_join_timeout: Duration) {
    let mut inner: Vec<TrackedThread> = Vec::new();

    loop {
        let command = queue.pop();
        reap_finished(&mut inner);

        match command {
            PluginCommand::Phase(phase) => {
                if let Some(thread) = spawn_phase(&plugin, phase) {
                    inner.push(thread);
                }
            }
            PluginCommand::Exit => break,
        }
    }

    debug!(plugin = %plugin.id(), running = inner.len(), "Plugin thread exiting");
    for thread in inner {
        if !thread.join_timeout(inner_join_timeout) {
            warn!(plugin = %plugin.id(), "Execution thread still running at exit");
        }
    }
}

fn spawn_phase(plugin: &PluginRef, phase: LifecyclePhase) -> Option<TrackedThread> {
    let target = Arc::clone(plugin);
    let name = format!("plugin-{}-{}", plugin.id(), phase.name());

    let spawned = TrackedThread::spawn(name, move || {
        let before = target.ready_semaphore_status();

        if let Err(e) = target.execute_phase(phase) {
            debug!(plugin = %target.id(), %phase, "Phase failed: {}", e);
        }

        if target.ready_semaphore_status() == before {
            target.release_ready_semaphore();
        }
    });

    match spawned {
        Ok(thread) => Some(thread),
        Err(e) => {
            error!(plugin = %plugin.id(), %phase, "Failed to spawn execution thread: {}", e);
            plugin.record_error(Error::Io(e));
            plugin.release_ready_semaphore();
            None
        }
    }
}

fn reap_finished(inner: &mut Vec<TrackedThread>) {
    let (finished, running): (Vec<_>, Vec<_>) =
        std::mem::take(inner).into_iter().partition(TrackedThread::is_finished);

    for thread in finished {
        thread.join_timeout(Duration::ZERO);
    }
    *inner = running;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Plugin, PluginDescriptor, PluginInstance};
    use hive_foundation::{Latch, Result};
    use std::any::Any;
    use std::sync::Weak;

    #[derive(Default)]
    struct Blocking {
        stop: Latch,
    }

    impl Plugin for Blocking {
        fn on_load(&self, ctx: &PluginRef) -> Result<()> {
            ctx.release_ready_semaphore();
            self.stop.wait();
            Ok(())
        }

        fn on_unload(&self, _ctx: &PluginRef) -> Result<()> {
            self.stop.open();
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn plugin() -> PluginRef {
        let descriptor = PluginDescriptor::new("t.blocking", "Blocking", || {
            Box::new(Blocking::default())
        })
        .with_capability("main");
        Arc::new(PluginInstance::new(
            descriptor.id.clone(),
            None,
            1,
            Arc::new(descriptor),
            Weak::new(),
        ))
    }

    #[test]
    fn test_blocking_hook_does_not_block_queue() {
        let plugin = plugin();
        let thread = PluginThread::start(&plugin, Duration::from_secs(5)).unwrap();

        thread.add_event(PluginCommand::Phase(LifecyclePhase::Load));
        assert!(plugin.acquire_ready_semaphore(Duration::from_secs(5)));
        assert!(plugin.is_loaded());

        // Load 훅이 아직 블로킹 중이어도 Unload는 처리됨
        thread.add_event(PluginCommand::Phase(LifecyclePhase::Unload));
        assert!(plugin.acquire_ready_semaphore(Duration::from_secs(5)));
        assert!(!plugin.is_loaded());

        assert!(thread.join(Duration::from_secs(5)));
        assert!(thread.is_finished());
    }

    #[test]
    fn test_release_once_per_phase() {
        let plugin = plugin();
        let thread = PluginThread::start(&plugin, Duration::from_secs(5)).unwrap();

        thread.add_event(PluginCommand::Phase(LifecyclePhase::EndLoad));
        assert!(plugin.acquire_ready_semaphore(Duration::from_secs(5)));
        assert!(!plugin.acquire_ready_semaphore(Duration::from_millis(50)));

        assert!(thread.join(Duration::from_secs(5)));
    }
}
