//! Plugin Events - 이벤트 타입
//!
//! 이벤트 이름은 dotted-path이며, 구독자는 등록한 이벤트 자신 또는 그 하위
//! 이벤트를 모두 수신합니다 (`"a.b"` 구독자는 `"a.b.c"`도 받음).

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// 매니저 이벤트 이름
// ============================================================================

/// 매니저 이벤트 네임스페이스
pub const EVENT_PLUGIN_MANAGER: &str = "plugin_manager";
pub const EVENT_PLUGIN_LOAD: &str = "plugin_manager.plugin.load";
pub const EVENT_PLUGIN_LAZY_LOAD: &str = "plugin_manager.plugin.lazy_load";
pub const EVENT_PLUGIN_UNLOAD: &str = "plugin_manager.plugin.unload";
pub const EVENT_END_LOAD_SYSTEM: &str = "plugin_manager.end_load_system";
pub const EVENT_UNLOAD_SYSTEM: &str = "plugin_manager.unload_system";

// ============================================================================
// PluginEvent
// ============================================================================

/// 이벤트 발생원
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum EventSource {
    /// 플러그인 인스턴스 ID
    Plugin(String),
    Manager,
}

/// 플러그인 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEvent {
    /// 이벤트 이름
    pub name: String,

    /// 이벤트 데이터
    pub args: Value,

    /// 타임스탬프
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// 소스 (이벤트 발생 위치)
    pub source: EventSource,
}

impl PluginEvent {
    /// 새 이벤트 생성
    pub fn new(name: impl Into<String>, args: Value, source: EventSource) -> Self {
        Self {
            name: name.into(),
            args,
            timestamp: chrono::Utc::now(),
            source,
        }
    }

    /// 매니저 이벤트
    pub fn manager(name: impl Into<String>, args: Value) -> Self {
        Self::new(name, args, EventSource::Manager)
    }

    /// 플러그인 이벤트
    pub fn plugin(name: impl Into<String>, args: Value, plugin_id: impl Into<String>) -> Self {
        Self::new(name, args, EventSource::Plugin(plugin_id.into()))
    }

    /// 소스 플러그인 ID
    pub fn source_plugin(&self) -> Option<&str> {
        match &self.source {
            EventSource::Plugin(id) => Some(id),
            EventSource::Manager => None,
        }
    }
}
