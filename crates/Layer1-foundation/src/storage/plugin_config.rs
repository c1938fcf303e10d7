//! Plugin Config Store - 플러그인별 설정 파일 저장소
//!
//! 각 플러그인의 설정은 `<root>/<plugin_id>.json` 형태로 저장됩니다.
//! 글로벌 루트를 먼저 읽고 프로젝트 루트 값으로 덮어씁니다.

use super::JsonStore;
use crate::config::RuntimeConfig;
use crate::template::TemplateResolver;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 루트 아래 플러그인 설정 디렉토리 이름
const PLUGINS_DIR: &str = "plugins";

#[derive(Debug, Clone)]
pub struct PluginConfigStore {
    global: JsonStore,
    project: JsonStore,
}

impl PluginConfigStore {
    pub fn new(global_root: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            global: JsonStore::new(global_root),
            project: JsonStore::new(project_root),
        }
    }

    /// 런타임 설정의 `configurationPaths`로 생성
    ///
    /// 지정되지 않은 루트는 `<config_dir>/hive/plugins`, `./.hive/plugins`를 사용합니다.
    pub fn from_config(config: &RuntimeConfig, resolver: &TemplateResolver) -> Result<Self> {
        let global = match &config.configuration_paths.global {
            Some(template) => first_candidate(resolver, template)?,
            None => JsonStore::global()?.file_path(PLUGINS_DIR),
        };
        let project = match &config.configuration_paths.project {
            Some(template) => first_candidate(resolver, template)?,
            None => JsonStore::current_project()?.file_path(PLUGINS_DIR),
        };

        debug!(
            global = %global.display(),
            project = %project.display(),
            "Plugin configuration roots"
        );
        Ok(Self::new(global, project))
    }

    pub fn global_root(&self) -> &Path {
        self.global.base_dir()
    }

    pub fn project_root(&self) -> &Path {
        self.project.base_dir()
    }

    /// 플러그인 설정 파일 경로 (글로벌, 프로젝트)
    pub fn plugin_configuration_paths(&self, plugin_id: &str) -> (PathBuf, PathBuf) {
        let filename = configuration_filename(plugin_id);
        (
            self.global.file_path(&filename),
            self.project.file_path(&filename),
        )
    }

    /// 상대 경로 파일 찾기 (프로젝트 우선)
    pub fn find_file(&self, relative: &str) -> Option<PathBuf> {
        [&self.project, &self.global]
            .into_iter()
            .find(|store| store.exists(relative))
            .map(|store| store.file_path(relative))
    }

    /// 상대 경로 파일 내용 (해석하지 않은 바이트)
    pub fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self
            .find_file(relative)
            .ok_or_else(|| Error::Config(format!("Configuration file not found: {}", relative)))?;
        Ok(std::fs::read(path)?)
    }

    /// 플러그인 설정 맵 (글로벌 → 프로젝트 병합)
    pub fn load_plugin_configuration(&self, plugin_id: &str) -> Result<Map<String, Value>> {
        let filename = configuration_filename(plugin_id);
        let mut configuration = Map::new();

        for store in [&self.global, &self.project] {
            let Some(value) = store.load_optional::<Value>(&filename)? else {
                continue;
            };
            match value {
                Value::Object(entries) => configuration.extend(entries),
                _ => {
                    return Err(Error::Config(format!(
                        "Plugin configuration must be an object: {}",
                        store.file_path(&filename).display()
                    )))
                }
            }
        }

        Ok(configuration)
    }

    /// 프로젝트 루트에 플러그인 설정 저장
    pub fn save_project_configuration(
        &self,
        plugin_id: &str,
        configuration: &Map<String, Value>,
    ) -> Result<()> {
        self.project
            .save(&configuration_filename(plugin_id), configuration)
    }
}

fn configuration_filename(plugin_id: &str) -> String {
    format!("{}.json", plugin_id)
}

fn first_candidate(resolver: &TemplateResolver, template: &str) -> Result<PathBuf> {
    resolver
        .resolve_string_value(template)?
        .into_iter()
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| Error::Config(format!("Template has no candidates: {}", template)))
}
