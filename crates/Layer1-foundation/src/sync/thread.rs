//! Tracked Thread - 제한 시간 join이 가능한 OS 스레드
//!
//! 표준 `JoinHandle`은 시간 제한 join을 지원하지 않으므로, 스레드 종료 시
//! 래치를 열어 대기 측이 `wait_timeout`으로 종료를 확인합니다.
//! 제한 시간 안에 끝나지 않은 스레드는 분리(detach)됩니다.

use super::Latch;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// 스레드 종료 시 (패닉 포함) 래치를 여는 가드
struct OpenOnDrop(Arc<Latch>);

impl Drop for OpenOnDrop {
    fn drop(&mut self) {
        self.0.open();
    }
}

#[derive(Debug)]
pub struct TrackedThread {
    name: String,
    handle: Option<JoinHandle<()>>,
    finished: Arc<Latch>,
}

impl TrackedThread {
    /// 이름 있는 스레드 생성
    pub fn spawn<F>(name: impl Into<String>, f: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let finished = Arc::new(Latch::new());
        let guard = OpenOnDrop(Arc::clone(&finished));

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let _guard = guard;
            f();
        })?;

        Ok(Self {
            name,
            handle: Some(handle),
            finished,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_open()
    }

    /// 최대 `timeout` 동안 종료를 기다린 뒤 join
    ///
    /// 제한 시간 내 종료되지 않으면 false를 반환하고 스레드는 분리됩니다.
    pub fn join_timeout(mut self, timeout: Duration) -> bool {
        if !self.finished.wait_timeout(timeout) {
            warn!(thread = %self.name, "Thread did not finish within {:?}, detaching", timeout);
            return false;
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(thread = %self.name, "Thread terminated with a panic");
            }
        }

        true
    }
}
