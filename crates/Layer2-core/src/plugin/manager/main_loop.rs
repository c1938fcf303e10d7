//! Main loop - 스레드 간 명령 큐
//!
//! 다른 스레드(시그널 핸들러, 플러그인 스레드)는 [`PluginManager::add_event`]로
//! 명령을 넣고, `main_loop`를 돌리는 스레드가 순서대로 실행합니다.

use super::PluginManager;
use hive_foundation::panic_message;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, trace, warn};

/// 매니저 루프 명령
pub enum ManagerCommand {
    /// 루프 스레드에서 실행할 작업
    Execute(Box<dyn FnOnce(&PluginManager) + Send>),

    /// 플러그인 스레드를 join하고 루프 종료
    Exit,
}

impl ManagerCommand {
    pub fn execute<F>(f: F) -> Self
    where
        F: FnOnce(&PluginManager) + Send + 'static,
    {
        Self::Execute(Box::new(f))
    }
}

impl std::fmt::Debug for ManagerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Execute(_) => f.write_str("Execute(..)"),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

impl PluginManager {
    /// 명령 추가 (유일한 생산자 API)
    pub fn add_event(&self, command: ManagerCommand) {
        debug!(?command, "Manager command queued");
        self.commands.lock().push_back(command);
        self.commands_condvar.notify_one();
    }

    /// Exit 명령까지 명령 처리
    ///
    /// 대기는 `loop_wake_interval`마다 깨어납니다.
    pub fn main_loop(&self) {
        info!("Manager main loop started");
        let interval = self.config.loop_wake_interval();

        loop {
            let command = {
                let mut commands = self.commands.lock();
                if commands.is_empty() {
                    self.commands_condvar.wait_for(&mut commands, interval);
                }
                commands.pop_front()
            };

            match command {
                None => trace!("Main loop wake"),
                Some(ManagerCommand::Execute(task)) => {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(self))) {
                        error!("Manager command panicked: {}", panic_message(payload.as_ref()));
                    }
                }
                Some(ManagerCommand::Exit) => {
                    self.join_plugin_threads();
                    break;
                }
            }
        }

        info!("Manager main loop finished");
    }

    /// 모든 플러그인 스레드 종료 (제한 시간 join), 모두 종료되면 true
    pub fn join_plugin_threads(&self) -> bool {
        let threads: Vec<_> = self
            .state
            .lock()
            .plugin_threads
            .drain()
            .map(|(_, thread)| thread)
            .collect();

        let timeout = self.config.join_timeout();
        let mut all = true;
        for thread in threads {
            if !thread.join(timeout) {
                warn!(plugin = %thread.plugin_id(), "Plugin thread did not exit within {:?}", timeout);
                all = false;
            }
        }
        all
    }
}
