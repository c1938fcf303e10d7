//! Runtime Config - 플러그인 런타임 설정
//!
//! 글로벌(`<config_dir>/hive/runtime.toml`) → 프로젝트(`./.hive/runtime.toml`)
//! 순서로 병합합니다. 나중 값이 우선하며, 파일이 없으면 건너뜁니다.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// 설정 파일명
pub const RUNTIME_CONFIG_FILE: &str = "runtime.toml";

/// 설정 디렉토리 이름 (글로벌: `<config_dir>/hive`, 프로젝트: `.hive`)
pub const CONFIG_DIR_NAME: &str = "hive";

// ============================================================================
// RuntimeConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// 모듈 탐색 디렉토리 (경로 템플릿 허용)
    pub plugin_paths: Vec<String>,

    /// 라이프사이클 훅 실패를 호출자에게 전파할지 여부
    pub stop_on_cycle_error: bool,

    /// unload_system 워치독 시간 (초)
    pub unload_timeout_secs: u64,

    /// 플러그인 스레드 / 내부 실행 스레드 join 제한 시간 (초)
    pub join_timeout_secs: u64,

    /// ready 핸드셰이크 대기 제한 시간 (초)
    pub ready_timeout_secs: u64,

    /// 매니저 메인 루프 주기적 wake 간격 (밀리초)
    pub loop_wake_interval_ms: u64,

    pub log_level: String,

    /// 플러그인 설정 저장소 루트
    pub configuration_paths: ConfigurationPaths,

    /// 감지된 플랫폼 대신 사용할 값
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// 플러그인 설정 저장소 루트 (경로 템플릿 허용)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationPaths {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            plugin_paths: Vec::new(),
            stop_on_cycle_error: true,
            unload_timeout_secs: 600,
            join_timeout_secs: 600,
            ready_timeout_secs: 600,
            loop_wake_interval_ms: 1000,
            log_level: "info".to_string(),
            configuration_paths: ConfigurationPaths::default(),
            platform: None,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let global = dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME));
        let project = std::env::current_dir()
            .ok()
            .map(|dir| dir.join(format!(".{}", CONFIG_DIR_NAME)));

        Self::load_from_dirs(global.as_deref(), project.as_deref())
    }

    /// 주어진 디렉토리들의 `runtime.toml`을 순서대로 병합
    pub fn load_from_dirs(global: Option<&Path>, project: Option<&Path>) -> Result<Self> {
        let mut merged = toml::Table::new();

        for dir in [global, project].into_iter().flatten() {
            let path = dir.join(RUNTIME_CONFIG_FILE);
            if !path.exists() {
                continue;
            }
            debug!(path = %path.display(), "Loading runtime config");
            let content = std::fs::read_to_string(&path)?;
            let table: toml::Table = toml::from_str(&content)?;
            merge_tables(&mut merged, table);
        }

        Ok(toml::Value::Table(merged).try_into()?)
    }

    /// 단일 파일 로드 (`.toml` 또는 `.json`)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("toml") | None => Ok(toml::from_str(&content)?),
            Some(other) => Err(Error::Config(format!(
                "Unsupported config format '{}': {}",
                other,
                path.display()
            ))),
        }
    }

    /// 파일 설정을 덮어씀 (other가 우선, 기본값이 아닌 항목만)
    pub fn merge(&mut self, other: RuntimeConfig) {
        let defaults = RuntimeConfig::default();

        if !other.plugin_paths.is_empty() {
            self.plugin_paths = other.plugin_paths;
        }
        if other.stop_on_cycle_error != defaults.stop_on_cycle_error {
            self.stop_on_cycle_error = other.stop_on_cycle_error;
        }
        if other.unload_timeout_secs != defaults.unload_timeout_secs {
            self.unload_timeout_secs = other.unload_timeout_secs;
        }
        if other.join_timeout_secs != defaults.join_timeout_secs {
            self.join_timeout_secs = other.join_timeout_secs;
        }
        if other.ready_timeout_secs != defaults.ready_timeout_secs {
            self.ready_timeout_secs = other.ready_timeout_secs;
        }
        if other.loop_wake_interval_ms != defaults.loop_wake_interval_ms {
            self.loop_wake_interval_ms = other.loop_wake_interval_ms;
        }
        if other.log_level != defaults.log_level {
            self.log_level = other.log_level;
        }
        if other.configuration_paths.global.is_some() {
            self.configuration_paths.global = other.configuration_paths.global;
        }
        if other.configuration_paths.project.is_some() {
            self.configuration_paths.project = other.configuration_paths.project;
        }
        if other.platform.is_some() {
            self.platform = other.platform;
        }
    }

    // ========================================================================
    // Duration accessors
    // ========================================================================

    pub fn unload_timeout(&self) -> Duration {
        Duration::from_secs(self.unload_timeout_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn loop_wake_interval(&self) -> Duration {
        Duration::from_millis(self.loop_wake_interval_ms.max(1))
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn plugin_path(mut self, path: impl Into<String>) -> Self {
        self.plugin_paths.push(path.into());
        self
    }

    pub fn stop_on_cycle_error(mut self, stop: bool) -> Self {
        self.stop_on_cycle_error = stop;
        self
    }

    pub fn ready_timeout_secs(mut self, secs: u64) -> Self {
        self.ready_timeout_secs = secs;
        self
    }

    pub fn join_timeout_secs(mut self, secs: u64) -> Self {
        self.join_timeout_secs = secs;
        self
    }

    pub fn unload_timeout_secs(mut self, secs: u64) -> Self {
        self.unload_timeout_secs = secs;
        self
    }

    pub fn loop_wake_interval_ms(mut self, ms: u64) -> Self {
        self.loop_wake_interval_ms = ms;
        self
    }

    pub fn configuration_paths(
        mut self,
        global: Option<impl Into<String>>,
        project: Option<impl Into<String>>,
    ) -> Self {
        self.configuration_paths = ConfigurationPaths {
            global: global.map(Into::into),
            project: project.map(Into::into),
        };
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }
}

/// 테이블 재귀 병합 (overlay 우선)
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::new();
        assert!(config.stop_on_cycle_error);
        assert_eq!(config.unload_timeout(), Duration::from_secs(600));
        assert_eq!(config.join_timeout(), Duration::from_secs(600));
        assert_eq!(config.loop_wake_interval(), Duration::from_secs(1));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_project_overrides_global() {
        let global = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        std::fs::write(
            global.path().join(RUNTIME_CONFIG_FILE),
            r#"
pluginPaths = ["/global/plugins"]
readyTimeoutSecs = 30
logLevel = "debug"

[configurationPaths]
global = "/etc/hive"
"#,
        )
        .unwrap();
        std::fs::write(
            project.path().join(RUNTIME_CONFIG_FILE),
            r#"
readyTimeoutSecs = 5
stopOnCycleError = false

[configurationPaths]
project = "./conf"
"#,
        )
        .unwrap();

        let config =
            RuntimeConfig::load_from_dirs(Some(global.path()), Some(project.path())).unwrap();

        assert_eq!(config.plugin_paths, vec!["/global/plugins"]);
        assert_eq!(config.ready_timeout_secs, 5);
        assert_eq!(config.log_level, "debug");
        assert!(!config.stop_on_cycle_error);
        assert_eq!(config.configuration_paths.global.as_deref(), Some("/etc/hive"));
        assert_eq!(config.configuration_paths.project.as_deref(), Some("./conf"));
    }

    #[test]
    fn test_missing_files_are_defaults() {
        let empty = TempDir::new().unwrap();
        let config = RuntimeConfig::load_from_dirs(Some(empty.path()), None).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_from_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runtime.json");
        std::fs::write(&path, r#"{"joinTimeoutSecs": 3, "platform": "linux"}"#).unwrap();

        let config = RuntimeConfig::from_file(&path).unwrap();
        assert_eq!(config.join_timeout_secs, 3);
        assert_eq!(config.platform.as_deref(), Some("linux"));
        assert_eq!(config.unload_timeout_secs, 600);
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut base = RuntimeConfig::new().plugin_path("/a").ready_timeout_secs(10);
        base.merge(RuntimeConfig::new().stop_on_cycle_error(false));

        assert_eq!(base.plugin_paths, vec!["/a"]);
        assert_eq!(base.ready_timeout_secs, 10);
        assert!(!base.stop_on_cycle_error);
    }
}
