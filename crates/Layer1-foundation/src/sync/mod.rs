//! Sync - 스레드 동기화 프리미티브
//!
//! - `latch`: 한 번 열리면 닫히지 않는 대기 래치
//! - `semaphore`: 플러그인 ready 핸드셰이크용 카운팅 세마포어
//! - `thread`: 완료 래치가 붙은 OS 스레드 (제한 시간 join)
//! - `watchdog`: 취소되지 않으면 동작을 실행하는 타이머

mod latch;
mod semaphore;
mod thread;
mod watchdog;

pub use latch::Latch;
pub use semaphore::ReadySemaphore;
pub use thread::TrackedThread;
pub use watchdog::{Watchdog, WATCHDOG_EXIT_CODE};
