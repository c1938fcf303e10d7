//! Watchdog - 종료 지연에 대한 최후 방어선
//!
//! 제한 시간 안에 `cancel()`이 호출되지 않으면 등록된 동작을 실행합니다.
//! 기본 동작은 프로세스를 코드 2로 강제 종료하는 것입니다.

use super::Latch;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// 강제 종료 시 사용하는 프로세스 종료 코드
pub const WATCHDOG_EXIT_CODE: i32 = 2;

#[derive(Debug, Clone)]
pub struct Watchdog {
    cancelled: Arc<Latch>,
}

impl Watchdog {
    /// `timeout` 후 `action`을 실행하는 워치독 시작
    pub fn start<F>(timeout: Duration, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(Latch::new());
        let waiter = Arc::clone(&cancelled);

        let spawned = thread::Builder::new()
            .name("hive-watchdog".to_string())
            .spawn(move || {
                if waiter.wait_timeout(timeout) {
                    debug!("Watchdog cancelled");
                } else {
                    action();
                }
            });

        if let Err(e) = spawned {
            error!("Failed to spawn watchdog thread: {}", e);
        }

        Self { cancelled }
    }

    /// 제한 시간 초과 시 프로세스를 강제 종료하는 워치독
    pub fn exit_process(timeout: Duration) -> Self {
        Self::start(timeout, move || {
            error!(
                "Shutdown did not complete within {:?}, forcing exit",
                timeout
            );
            std::process::exit(WATCHDOG_EXIT_CODE);
        })
    }

    pub fn cancel(&self) {
        self.cancelled.open();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_open()
    }
}
