//! # hive-foundation
//!
//! Foundation layer for Hive:
//! - Error: 공통 에러 타입
//! - Capability: 계층형 capability / 이벤트 매칭
//! - Config: 런타임 설정 (RuntimeConfig)
//! - Scheduler: 시각 기반 지연 실행기
//! - Sync: ready 세마포어, 래치, 워치독, 추적 스레드
//! - Template: 경로 템플릿 해석기
//! - Storage: JsonStore (범용), PluginConfigStore (플러그인 설정)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  hive-core (PluginManager)                   │
//! │     │            │              │            │
//! │     ▼            ▼              ▼            │
//! │  Capability   Scheduler    Sync primitives   │
//! │  Matcher      (thread)     (semaphore/latch) │
//! │                                              │
//! │  RuntimeConfig ─► TemplateResolver           │
//! │                      │                       │
//! │                      ▼                       │
//! │               PluginConfigStore (JSON)       │
//! └──────────────────────────────────────────────┘
//! ```

pub mod capability;
pub mod config;
pub mod error;
pub mod platform;
pub mod scheduler;
pub mod storage;
pub mod sync;
pub mod template;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Capability (매칭)
// ============================================================================
pub use capability::{
    capabilities_or_super_capabilities_in_list, capability_and_super_capabilities,
    events_or_super_events_in_list, is_capability_or_sub_capability, is_event_or_sub_event,
    is_sub_capability, is_sub_event,
};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{ConfigurationPaths, RuntimeConfig, CONFIG_DIR_NAME, RUNTIME_CONFIG_FILE};

// ============================================================================
// Platform
// ============================================================================
pub use platform::Platform;

// ============================================================================
// Scheduler
// ============================================================================
pub use scheduler::{panic_message, ExceptionHandler, Scheduler, TaskId};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{JsonStore, PluginConfigStore};

// ============================================================================
// Sync (동기화)
// ============================================================================
pub use sync::{Latch, ReadySemaphore, TrackedThread, Watchdog, WATCHDOG_EXIT_CODE};

// ============================================================================
// Template (경로 템플릿)
// ============================================================================
pub use template::{TemplateCommand, TemplateResolver};
