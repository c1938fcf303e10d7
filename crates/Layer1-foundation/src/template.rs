//! Template - 경로 템플릿 해석기
//!
//! `%command%` / `%command:args%` 자리표시자를 명령 결과로 치환합니다.
//! 명령 하나가 여러 값을 돌려주면 결과는 모든 조합(cartesian product)이 됩니다.
//!
//! ```text
//! "%home%/plugins"                  → ["/home/user/plugins"]
//! "%paths:PLUGIN_PATH%/%name%.toml" → ["/a/x.toml", "/b/x.toml"]
//! "100%%"                           → ["100%"]
//! ```

use crate::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// 자리표시자 명령: 인자(없을 수 있음)를 받아 하나 이상의 값을 반환
pub type TemplateCommand = Arc<dyn Fn(Option<&str>) -> Result<Vec<String>> + Send + Sync>;

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"%%|%([A-Za-z_][A-Za-z0-9_]*)(?::([^%]*))?%")
            .unwrap_or_else(|e| panic!("invalid placeholder regex: {}", e))
    })
}

// ============================================================================
// TemplateResolver
// ============================================================================

#[derive(Clone)]
pub struct TemplateResolver {
    commands: HashMap<String, TemplateCommand>,
}

impl TemplateResolver {
    /// 기본 명령이 등록된 해석기
    ///
    /// - `environment:NAME` - 환경 변수 값
    /// - `paths:NAME` - 경로 목록 환경 변수를 분리한 값들
    /// - `home`, `config_dir`, `data_dir`, `current_dir`, `temp_dir`
    pub fn new() -> Self {
        let mut resolver = Self::empty();

        resolver.register("environment", |args| {
            let name = required_args("environment", args)?;
            std::env::var(name)
                .map(|value| vec![value])
                .map_err(|_| Error::Template(format!("Environment variable not set: {}", name)))
        });

        resolver.register("paths", |args| {
            let name = required_args("paths", args)?;
            let value = std::env::var_os(name)
                .ok_or_else(|| Error::Template(format!("Environment variable not set: {}", name)))?;
            Ok(std::env::split_paths(&value)
                .filter(|path| !path.as_os_str().is_empty())
                .map(|path| path.to_string_lossy().into_owned())
                .collect())
        });

        resolver.register("home", |_| dir_value("home", dirs::home_dir()));
        resolver.register("config_dir", |_| dir_value("config_dir", dirs::config_dir()));
        resolver.register("data_dir", |_| dir_value("data_dir", dirs::data_dir()));
        resolver.register("temp_dir", |_| dir_value("temp_dir", Some(std::env::temp_dir())));
        resolver.register("current_dir", |_| {
            dir_value("current_dir", std::env::current_dir().ok())
        });

        resolver
    }

    /// 명령이 하나도 없는 해석기
    pub fn empty() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// 명령 등록 (같은 이름이면 교체)
    pub fn register<F>(&mut self, name: impl Into<String>, command: F)
    where
        F: Fn(Option<&str>) -> Result<Vec<String>> + Send + Sync + 'static,
    {
        self.commands.insert(name.into(), Arc::new(command));
    }

    /// 고정 값 명령 등록
    pub fn register_values(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.register(name, move |_| Ok(values.clone()));
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    // ========================================================================
    // 해석
    // ========================================================================

    /// 템플릿의 모든 후보 문자열
    pub fn resolve_string_value(&self, template: &str) -> Result<Vec<String>> {
        let mut parts: Vec<Vec<String>> = Vec::new();
        let mut last_end = 0;

        for captures in placeholder_regex().captures_iter(template) {
            let Some(whole) = captures.get(0) else {
                continue;
            };

            push_literal(&mut parts, &template[last_end..whole.start()])?;
            last_end = whole.end();

            let Some(name) = captures.get(1) else {
                // %%
                parts.push(vec!["%".to_string()]);
                continue;
            };

            let command = self.commands.get(name.as_str()).ok_or_else(|| {
                Error::Template(format!("Unknown template command: {}", name.as_str()))
            })?;
            let values = command(captures.get(2).map(|m| m.as_str()))?;
            parts.push(values);
        }

        push_literal(&mut parts, &template[last_end..])?;

        let candidates = cartesian(parts);
        debug!(template, count = candidates.len(), "Template resolved");
        Ok(candidates)
    }

    /// 디스크에 존재하는 첫 번째 후보 경로
    ///
    /// 존재하는 후보가 없을 때 `create_dir`이면 첫 후보의 디렉토리를 만들고
    /// 그 후보를 반환합니다.
    pub fn resolve_file_path(&self, template: &str, create_dir: bool) -> Result<Option<PathBuf>> {
        let candidates: Vec<PathBuf> = self
            .resolve_string_value(template)?
            .into_iter()
            .map(PathBuf::from)
            .collect();

        if let Some(existing) = candidates.iter().find(|path| path.exists()) {
            return Ok(Some(existing.clone()));
        }

        match candidates.into_iter().next() {
            Some(first) if create_dir => {
                if let Some(parent) = first.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Ok(Some(first))
            }
            _ => Ok(None),
        }
    }

    /// 존재하는 모든 후보 디렉토리 (중복 제거, 순서 유지)
    pub fn resolve_existing_dirs(&self, template: &str) -> Result<Vec<PathBuf>> {
        let mut result: Vec<PathBuf> = Vec::new();
        for candidate in self.resolve_string_value(template)? {
            let path = PathBuf::from(candidate);
            if path.is_dir() && !result.contains(&path) {
                result.push(path);
            }
        }
        Ok(result)
    }
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.commands.keys().collect();
        names.sort();
        f.debug_struct("TemplateResolver")
            .field("commands", &names)
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn push_literal(parts: &mut Vec<Vec<String>>, literal: &str) -> Result<()> {
    if literal.contains('%') {
        return Err(Error::Template(format!(
            "Unterminated or malformed placeholder near: {}",
            literal
        )));
    }
    if !literal.is_empty() {
        parts.push(vec![literal.to_string()]);
    }
    Ok(())
}

fn required_args<'a>(command: &str, args: Option<&'a str>) -> Result<&'a str> {
    args.filter(|a| !a.is_empty())
        .ok_or_else(|| Error::Template(format!("Command '{}' requires an argument", command)))
}

fn dir_value(command: &str, dir: Option<PathBuf>) -> Result<Vec<String>> {
    dir.map(|d| vec![d.to_string_lossy().into_owned()])
        .ok_or_else(|| Error::Template(format!("Cannot resolve '{}'", command)))
}

fn cartesian(parts: Vec<Vec<String>>) -> Vec<String> {
    parts.into_iter().fold(vec![String::new()], |acc, values| {
        acc.iter()
            .flat_map(|prefix| values.iter().map(move |value| format!("{}{}", prefix, value)))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver() -> TemplateResolver {
        let mut resolver = TemplateResolver::empty();
        resolver.register_values("root", vec!["/a".into(), "/b".into()]);
        resolver.register_values("name", vec!["x".into(), "y".into()]);
        resolver.register("echo", |args| Ok(vec![args.unwrap_or_default().to_string()]));
        resolver
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(
            resolver().resolve_string_value("plain/path").unwrap(),
            vec!["plain/path"]
        );
    }

    #[test]
    fn test_cartesian_expansion() {
        let values = resolver()
            .resolve_string_value("%root%/%name%.toml")
            .unwrap();
        assert_eq!(values, vec!["/a/x.toml", "/a/y.toml", "/b/x.toml", "/b/y.toml"]);
    }

    #[test]
    fn test_args_and_escape() {
        let values = resolver().resolve_string_value("%echo:hi%-100%%").unwrap();
        assert_eq!(values, vec!["hi-100%"]);
    }

    #[test]
    fn test_errors() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve_string_value("%missing%"),
            Err(Error::Template(_))
        ));
        assert!(matches!(
            resolver.resolve_string_value("%root"),
            Err(Error::Template(_))
        ));
    }

    #[test]
    fn test_environment_command() {
        let resolver = TemplateResolver::new();
        std::env::set_var("HIVE_TEMPLATE_TEST", "value");
        assert_eq!(
            resolver
                .resolve_string_value("%environment:HIVE_TEMPLATE_TEST%")
                .unwrap(),
            vec!["value"]
        );
        assert!(resolver
            .resolve_string_value("%environment:HIVE_TEMPLATE_UNSET_VAR%")
            .is_err());
    }

    #[test]
    fn test_resolve_file_path() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        std::fs::write(second.path().join("file.txt"), "x").unwrap();

        let mut resolver = TemplateResolver::empty();
        resolver.register_values(
            "roots",
            vec![
                first.path().to_string_lossy().into_owned(),
                second.path().to_string_lossy().into_owned(),
            ],
        );

        // 존재하는 후보 우선
        let found = resolver.resolve_file_path("%roots%/file.txt", false).unwrap();
        assert_eq!(found, Some(second.path().join("file.txt")));

        // 없으면 None, create_dir이면 첫 후보의 디렉토리 생성
        assert_eq!(
            resolver.resolve_file_path("%roots%/new/file.txt", false).unwrap(),
            None
        );
        let created = resolver
            .resolve_file_path("%roots%/new/file.txt", true)
            .unwrap()
            .unwrap();
        assert_eq!(created, first.path().join("new/file.txt"));
        assert!(first.path().join("new").is_dir());
    }
}
