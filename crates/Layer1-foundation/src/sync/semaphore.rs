//! Ready Semaphore - 플러그인과 플러그인 스레드 사이의 핸드셰이크
//!
//! 카운팅 세마포어와 release 카운터로 구성됩니다. release 카운터는
//! 별도의 락으로 보호되며, 플러그인 스레드가 라이프사이클 호출 전후의
//! 값을 비교해 "훅이 스스로 release 했는지" 판단하는 데 사용합니다.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ReadySemaphore {
    permits: Mutex<usize>,
    condvar: Condvar,
    release_count: Mutex<u64>,
}

impl ReadySemaphore {
    pub fn new() -> Self {
        Self::default()
    }

    /// permit 하나를 얻을 때까지 대기
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.condvar.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// 최대 `timeout` 동안 permit 대기, 얻었으면 true
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.acquire();
            return true;
        };
        let mut permits = self.permits.lock();

        while *permits == 0 {
            if self.condvar.wait_until(&mut permits, deadline).timed_out() && *permits == 0 {
                return false;
            }
        }

        *permits -= 1;
        true
    }

    /// permit 하나를 반환하고 release 카운터 증가
    pub fn release(&self) {
        {
            let mut count = self.release_count.lock();
            *count = count.wrapping_add(1);
        }

        let mut permits = self.permits.lock();
        *permits += 1;
        self.condvar.notify_one();
    }

    /// 지금까지의 release 횟수
    pub fn status(&self) -> u64 {
        *self.release_count.lock()
    }

    /// 현재 사용 가능한 permit 수
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }

    /// 남아 있는 permit 제거 (이전 단계의 늦은 release 무효화)
    pub fn drain(&self) -> usize {
        std::mem::take(&mut *self.permits.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_release_then_acquire() {
        let semaphore = ReadySemaphore::new();
        assert_eq!(semaphore.status(), 0);

        semaphore.release();
        assert_eq!(semaphore.status(), 1);
        assert_eq!(semaphore.available(), 1);

        semaphore.acquire();
        assert_eq!(semaphore.available(), 0);
        // release 카운터는 acquire로 줄지 않음
        assert_eq!(semaphore.status(), 1);
    }

    #[test]
    fn test_drain_discards_stale_permits() {
        let semaphore = ReadySemaphore::new();
        semaphore.release();
        semaphore.release();

        assert_eq!(semaphore.drain(), 2);
        assert_eq!(semaphore.available(), 0);
        assert_eq!(semaphore.status(), 2);
    }

    #[test]
    fn test_acquire_timeout() {
        let semaphore = ReadySemaphore::new();
        assert!(!semaphore.acquire_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_cross_thread_handshake() {
        let semaphore = Arc::new(ReadySemaphore::new());
        let worker = Arc::clone(&semaphore);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            worker.release();
        });

        assert!(semaphore.acquire_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
