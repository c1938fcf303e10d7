//! Scheduler - 시각 기반 지연 실행기
//!
//! 전용 스레드가 실행 예정 시각 목록(오름차순)과 시각별 `(callable, task_id)`
//! 목록을 관리합니다.
//!
//! - `add_callable`: 시각 순서대로 삽입하고 단조 증가 task id 반환
//! - 메인 루프: 다음 예정 시각까지 condvar 대기 (최대 [`MAX_WAIT`])
//! - 예외(에러/패닉)는 callable 단위로 잡아 핸들러로 전달, 형제 callable은 계속 실행
//! - `wait_callable`: 특정 task 실행 완료(또는 스케줄러 정지)까지 대기.
//!   실행 대기 중인 id만 보관하므로 대기되지 않는 task가 쌓이지 않음
//! - `stop_scheduler`: 비동기 정지 요청

use crate::sync::TrackedThread;
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// 스케줄러 task 식별자
pub type TaskId = u64;

/// 한 번의 대기 최대 시간 (네이티브 wait overflow 방지)
pub const MAX_WAIT: Duration = Duration::from_secs(3600);

/// `add_callable_in`의 최대 지연 (더 긴 지연은 이 값으로 포화)
pub const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

type Callable = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// callable 실패 시 호출되는 핸들러
pub type ExceptionHandler = Arc<dyn Fn(TaskId, &anyhow::Error) + Send + Sync>;

#[derive(Default)]
struct SchedulerState {
    /// 실행 예정 시각 (오름차순)
    timestamps: Vec<Instant>,

    /// 시각별 callable 목록
    callables: HashMap<Instant, Vec<(Callable, TaskId)>>,

    running: bool,
    continue_flag: bool,
    next_task_id: TaskId,

    /// 등록되었고 아직 실행되지 않은 task
    pending: HashSet<TaskId>,
}

struct Shared {
    state: Mutex<SchedulerState>,
    /// 스케줄러 루프 깨우기
    condvar: Condvar,
    /// task 완료 통지
    task_condvar: Condvar,
    exception_handler: Mutex<Option<ExceptionHandler>>,
}

pub struct Scheduler {
    shared: Arc<Shared>,
    thread: Mutex<Option<TrackedThread>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState::default()),
                condvar: Condvar::new(),
                task_condvar: Condvar::new(),
                exception_handler: Mutex::new(None),
            }),
            thread: Mutex::new(None),
        }
    }

    /// 예외 핸들러와 함께 생성
    pub fn with_exception_handler(handler: ExceptionHandler) -> Self {
        let scheduler = Self::new();
        scheduler.set_exception_handler(handler);
        scheduler
    }

    pub fn set_exception_handler(&self, handler: ExceptionHandler) {
        *self.shared.exception_handler.lock() = Some(handler);
    }

    // ========================================================================
    // 시작 / 정지
    // ========================================================================

    /// 스케줄러 스레드 시작 (이미 실행 중이면 무시)
    pub fn start_scheduler(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if state.running {
                return Ok(());
            }
            state.running = true;
            state.continue_flag = true;
        }

        let shared = Arc::clone(&self.shared);
        match TrackedThread::spawn("hive-scheduler", move || run_loop(shared)) {
            Ok(thread) => {
                *self.thread.lock() = Some(thread);
                info!("Scheduler started");
                Ok(())
            }
            Err(e) => {
                self.shared.state.lock().running = false;
                Err(Error::Io(e))
            }
        }
    }

    /// 정지 요청 (비동기) - 스레드는 다음 wake에서 종료
    pub fn stop_scheduler(&self) {
        let mut state = self.shared.state.lock();
        state.continue_flag = false;
        self.shared.condvar.notify_all();
        debug!("Scheduler stop requested");
    }

    /// 스케줄러 스레드 종료 대기 (제한 시간)
    pub fn join_scheduler(&self, timeout: Duration) -> bool {
        match self.thread.lock().take() {
            Some(thread) => thread.join_timeout(timeout),
            None => true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    // ========================================================================
    // Callable 등록
    // ========================================================================

    /// `timestamp`(없으면 지금)에 실행할 callable 등록
    pub fn add_callable<F>(&self, callable: F, timestamp: Option<Instant>) -> Result<TaskId>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.add_callable_with(callable, timestamp, true)
    }

    /// `delay` 후에 실행할 callable 등록
    ///
    /// `delay`는 [`MAX_DELAY`]로 포화됩니다.
    pub fn add_callable_in<F>(&self, callable: F, delay: Duration) -> Result<TaskId>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let timestamp = Instant::now()
            .checked_add(delay.min(MAX_DELAY))
            .ok_or_else(|| Error::Config(format!("delay {:?} is out of range", delay)))?;
        self.add_callable(callable, Some(timestamp))
    }

    /// `verify`가 false이면 실행 여부 검사를 생략 (시작 전 미리 등록할 때)
    pub fn add_callable_with<F>(
        &self,
        callable: F,
        timestamp: Option<Instant>,
        verify: bool,
    ) -> Result<TaskId>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let timestamp = timestamp.unwrap_or_else(Instant::now);
        let mut state = self.shared.state.lock();

        if verify && !state.running {
            return Err(Error::SchedulerNotRunning);
        }

        state.next_task_id += 1;
        let task_id = state.next_task_id;
        state.pending.insert(task_id);

        if let Some(list) = state.callables.get_mut(&timestamp) {
            list.push((Box::new(callable), task_id));
        } else {
            let position = state
                .timestamps
                .iter()
                .position(|existing| *existing > timestamp)
                .unwrap_or(state.timestamps.len());
            state.timestamps.insert(position, timestamp);
            state
                .callables
                .insert(timestamp, vec![(Box::new(callable), task_id)]);
        }

        self.shared.condvar.notify_all();
        debug!(task_id, "Callable scheduled");

        Ok(task_id)
    }

    // ========================================================================
    // 대기
    // ========================================================================

    /// task 실행 완료 또는 스케줄러 정지까지 대기
    ///
    /// 실행이 완료되었으면 true, 스케줄러 정지로 깨어났거나 발급되지 않은
    /// id이면 false.
    pub fn wait_callable(&self, task_id: TaskId) -> bool {
        let mut state = self.shared.state.lock();
        if task_id == 0 || task_id > state.next_task_id {
            return false;
        }

        loop {
            if !state.pending.contains(&task_id) {
                return true;
            }
            if !state.running {
                return false;
            }
            self.shared.task_condvar.wait(&mut state);
        }
    }

    /// 아직 실행되지 않은 callable 수
    pub fn pending_count(&self) -> usize {
        let state = self.shared.state.lock();
        state.callables.values().map(Vec::len).sum()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 스케줄러 루프
// ============================================================================

fn run_loop(shared: Arc<Shared>) {
    loop {
        let batch = {
            let mut state = shared.state.lock();

            loop {
                if !state.continue_flag {
                    state.running = false;
                    shared.task_condvar.notify_all();
                    info!("Scheduler stopped");
                    return;
                }

                let Some(&next) = state.timestamps.first() else {
                    shared.condvar.wait_for(&mut state, MAX_WAIT);
                    continue;
                };

                let now = Instant::now();
                if next > now {
                    // 아직 예정 시각 전: 대기 시간만 갱신
                    let timeout = (next - now).min(MAX_WAIT);
                    shared.condvar.wait_for(&mut state, timeout);
                    continue;
                }

                state.timestamps.remove(0);
                break state.callables.remove(&next).unwrap_or_default();
            }
        };

        let handler = shared.exception_handler.lock().clone();
        let mut executed = Vec::with_capacity(batch.len());

        for (callable, task_id) in batch {
            let outcome = panic::catch_unwind(AssertUnwindSafe(callable));

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(payload) => Some(anyhow::anyhow!(
                    "callable panicked: {}",
                    panic_message(payload.as_ref())
                )),
            };

            if let Some(e) = failure {
                match &handler {
                    Some(handler) => handler(task_id, &e),
                    None => error!(task_id, "Scheduled callable failed: {:#}", e),
                }
            }

            executed.push(task_id);
        }

        let mut state = shared.state.lock();
        for task_id in executed {
            state.pending.remove(&task_id);
        }
        shared.task_condvar.notify_all();
    }
}

/// 패닉 payload에서 메시지 추출
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn started() -> Scheduler {
        let scheduler = Scheduler::new();
        scheduler.start_scheduler().unwrap();
        scheduler
    }

    #[test]
    fn test_add_requires_running() {
        let scheduler = Scheduler::new();
        let result = scheduler.add_callable(|| Ok(()), None);
        assert!(matches!(result, Err(Error::SchedulerNotRunning)));

        // 검사 생략 시 등록 가능
        assert!(scheduler.add_callable_with(|| Ok(()), None, false).is_ok());
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_executes_in_timestamp_order() {
        let scheduler = started();
        let order = Arc::new(Mutex::new(Vec::new()));
        let base = Instant::now() + Duration::from_millis(30);

        let late = Arc::clone(&order);
        let late_id = scheduler
            .add_callable(
                move || {
                    late.lock().push("late");
                    Ok(())
                },
                Some(base + Duration::from_millis(30)),
            )
            .unwrap();

        let early = Arc::clone(&order);
        let early_id = scheduler
            .add_callable(
                move || {
                    early.lock().push("early");
                    Ok(())
                },
                Some(base),
            )
            .unwrap();

        assert!(late_id < early_id);
        assert!(scheduler.wait_callable(late_id));
        assert!(scheduler.wait_callable(early_id));
        assert_eq!(*order.lock(), vec!["early", "late"]);

        scheduler.stop_scheduler();
        assert!(scheduler.join_scheduler(Duration::from_secs(5)));
    }

    #[test]
    fn test_failure_does_not_stop_siblings() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let scheduler = Scheduler::with_exception_handler(Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        scheduler.start_scheduler().unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let at = Some(Instant::now() + Duration::from_millis(20));

        let first = scheduler
            .add_callable(|| Err(anyhow::anyhow!("first fails")), at)
            .unwrap();
        let second = scheduler
            .add_callable(|| panic!("second panics"), at)
            .unwrap();
        let sibling = Arc::clone(&ran);
        let third = scheduler
            .add_callable(
                move || {
                    sibling.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                at,
            )
            .unwrap();

        assert!(scheduler.wait_callable(first));
        assert!(scheduler.wait_callable(second));
        assert!(scheduler.wait_callable(third));
        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        scheduler.stop_scheduler();
        assert!(scheduler.join_scheduler(Duration::from_secs(5)));
    }

    #[test]
    fn test_unwaited_tasks_are_not_retained() {
        let scheduler = started();
        let mut last = 0;
        for _ in 0..200 {
            last = scheduler.add_callable(|| Ok(()), None).unwrap();
        }

        assert!(scheduler.wait_callable(last));
        assert!(scheduler.shared.state.lock().pending.is_empty());
        // 이미 실행된 task는 나중에 대기해도 완료로 보고됨
        assert!(scheduler.wait_callable(1));
        assert!(!scheduler.wait_callable(last + 1));

        scheduler.stop_scheduler();
        assert!(scheduler.join_scheduler(Duration::from_secs(5)));
    }

    #[test]
    fn test_huge_delay_saturates() {
        let scheduler = started();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);

        scheduler
            .add_callable_in(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                Duration::MAX,
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_count(), 1);

        scheduler.stop_scheduler();
        assert!(scheduler.join_scheduler(Duration::from_secs(5)));
    }

    #[test]
    fn test_wait_returns_on_stop() {
        let scheduler = Arc::new(started());
        let id = scheduler
            .add_callable_in(|| Ok(()), Duration::from_secs(600))
            .unwrap();

        let stopper = Arc::clone(&scheduler);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            stopper.stop_scheduler();
        });

        assert!(!scheduler.wait_callable(id));
        handle.join().unwrap();
        assert!(!scheduler.is_running());
    }
}
