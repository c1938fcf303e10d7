//! Plugin Discovery - 플러그인 모듈 발견
//!
//! 매니저는 `plugin_paths`를 템플릿 해석한 뒤 [`ModuleDiscovery`]에 넘겨
//! 발견된 모듈 이름을 기록합니다. 실제 클래스 등록은 링크 타임
//! (`hive_plugin!`) 또는 호출자의 `PluginRegistry::register`로 이루어집니다.
//!
//! 기본 구현 [`FsModuleDiscovery`]가 인식하는 파일:
//! - 공유 라이브러리: `libfoo.so`, `libfoo.dylib`, `foo.dll` → `foo`
//! - 매니페스트: `foo.plugin.toml` → `[plugin] id` 또는 `foo`

use hive_foundation::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST_SUFFIX: &str = ".plugin.toml";
const LIBRARY_EXTENSIONS: &[&str] = &["so", "dylib", "dll"];

/// 모듈 발견 인터페이스
pub trait ModuleDiscovery: Send + Sync {
    /// 디렉토리들에서 모듈 이름 발견
    fn discover(&self, paths: &[PathBuf]) -> Result<Vec<String>>;
}

// ============================================================================
// FsModuleDiscovery
// ============================================================================

#[derive(Debug, Deserialize)]
struct ModuleManifest {
    #[serde(default)]
    plugin: ModuleSection,
}

#[derive(Debug, Default, Deserialize)]
struct ModuleSection {
    id: Option<String>,
}

/// 파일 시스템 기반 발견 (하위 디렉토리는 탐색하지 않음)
#[derive(Debug, Default, Clone)]
pub struct FsModuleDiscovery;

impl FsModuleDiscovery {
    pub fn new() -> Self {
        Self
    }

    fn scan_directory(&self, dir: &Path, modules: &mut Vec<String>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            if let Some(module) = self.module_name(&path)? {
                debug!(path = %path.display(), module, "Discovered plugin module");
                modules.push(module);
            }
        }
        Ok(())
    }

    fn module_name(&self, path: &Path) -> Result<Option<String>> {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };

        if let Some(stem) = file_name.strip_suffix(MANIFEST_SUFFIX) {
            let content = std::fs::read_to_string(path)?;
            let manifest: ModuleManifest = toml::from_str(&content)?;
            return Ok(Some(manifest.plugin.id.unwrap_or_else(|| stem.to_string())));
        }

        let extension = path.extension().and_then(|e| e.to_str());
        if !extension.is_some_and(|e| LIBRARY_EXTENSIONS.contains(&e)) {
            return Ok(None);
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return Ok(None);
        };
        let name = match extension {
            Some("dll") => stem,
            _ => stem.strip_prefix("lib").unwrap_or(stem),
        };

        Ok(Some(name.to_string()))
    }
}

impl ModuleDiscovery for FsModuleDiscovery {
    fn discover(&self, paths: &[PathBuf]) -> Result<Vec<String>> {
        let mut modules = Vec::new();

        for path in paths {
            if !path.is_dir() {
                warn!(path = %path.display(), "Plugin path is not a directory, skipped");
                continue;
            }
            self.scan_directory(path, &mut modules)?;
        }

        modules.sort();
        modules.dedup();
        Ok(modules)
    }
}
