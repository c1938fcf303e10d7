//! Storage module for Hive
//!
//! - `json`: JSON - 범용 파일 저장/로드
//! - `plugin_config`: 플러그인별 설정 저장소 (글로벌 + 프로젝트)

mod json;
mod plugin_config;

// JSON Storage (범용)
pub use json::JsonStore;

// Plugin Configuration
pub use plugin_config::PluginConfigStore;
