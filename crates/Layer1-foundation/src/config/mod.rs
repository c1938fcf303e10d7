//! Config - 런타임 설정 관리
//!
//! - `runtime.rs` - RuntimeConfig (플러그인 경로, 타임아웃, 로그 레벨)

mod runtime;

pub use runtime::{ConfigurationPaths, RuntimeConfig, CONFIG_DIR_NAME, RUNTIME_CONFIG_FILE};
