//! Latch - 일회성 완료 신호

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// 한 번 열리면 계속 열린 상태로 남는 래치
#[derive(Debug, Default)]
pub struct Latch {
    open: Mutex<bool>,
    condvar: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// 래치를 열고 모든 대기자를 깨움
    pub fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.condvar.notify_all();
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// 열릴 때까지 대기
    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.condvar.wait(&mut open);
        }
    }

    /// 최대 `timeout` 동안 대기, 열렸으면 true
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut open = self.open.lock();

        while !*open {
            if self.condvar.wait_until(&mut open, deadline).timed_out() {
                return *open;
            }
        }

        true
    }
}
