//! Error types for Hive
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Hive 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    // ========================================================================
    // 플러그인 관련
    // ========================================================================
    /// 요청한 플러그인 클래스(id/version)가 레지스트리에 없음
    #[error("Plugin class not available: {id}{}", version_suffix(.version))]
    PluginClassNotAvailable {
        id: String,
        version: Option<String>,
    },

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// 플러그인 라이프사이클 훅 실패
    #[error("Plugin {plugin} failed during {phase}: {message}")]
    Lifecycle {
        plugin: String,
        phase: String,
        message: String,
    },

    // ========================================================================
    // 스케줄러 관련
    // ========================================================================
    #[error("Scheduler is not running")]
    SchedulerNotRunning,

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 구조적 에러인지 확인 (항상 호출자에게 전달되어야 함)
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::PluginClassNotAvailable { .. } | Error::PluginNotFound(_)
        )
    }

    /// 라이프사이클 에러 생성 헬퍼
    pub fn lifecycle(
        plugin: impl Into<String>,
        phase: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Lifecycle {
            plugin: plugin.into(),
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// 클래스 미존재 에러 생성 헬퍼
    pub fn class_not_available(id: impl Into<String>, version: Option<&str>) -> Self {
        Error::PluginClassNotAvailable {
            id: id.into(),
            version: version.map(str::to_string),
        }
    }
}

fn version_suffix(version: &Option<String>) -> String {
    version
        .as_deref()
        .map(|v| format!(" (v{})", v))
        .unwrap_or_default()
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Internal(format!("{:#}", e))
    }
}
