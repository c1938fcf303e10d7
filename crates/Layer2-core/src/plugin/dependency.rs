//! Plugin Dependency - 선언적 의존성 / 조건
//!
//! 모든 의존성과 조건은 `test(manager)` 술어를 제공합니다.
//!
//! - `Plugin`: 다른 플러그인 클래스 (버전 요구 포함)
//! - `Package`: 실행 파일 패키지 (`PATH`에서 탐색)
//! - `OperatingSystem`: 운영체제 조건
//!
//! `conditions`가 하나라도 만족되지 않으면 해당 의존성은 적용되지 않습니다
//! (test는 true). `mandatory`가 false인 의존성의 실패는 로드를 막지 않습니다.

use super::descriptor::PluginVersion;
use super::manager::PluginManager;
use hive_foundation::Platform;
use tracing::debug;

// ============================================================================
// Condition
// ============================================================================

/// 의존성 적용 조건
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// 현재 플랫폼이 일치
    OperatingSystem(Platform),

    /// 환경 변수가 설정됨
    Environment(String),

    /// 내부 조건의 부정
    Not(Box<Condition>),
}

impl Condition {
    pub fn operating_system(platform: Platform) -> Self {
        Self::OperatingSystem(platform)
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn test(&self, manager: &PluginManager) -> bool {
        match self {
            Self::OperatingSystem(platform) => manager.platform() == *platform,
            Self::Environment(name) => std::env::var_os(name).is_some(),
            Self::Not(inner) => !inner.test(manager),
        }
    }
}

// ============================================================================
// Dependency
// ============================================================================

/// 의존성 종류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyKind {
    /// 다른 플러그인 (버전이 있으면 같은 메이저 + 이상)
    Plugin {
        id: String,
        version: Option<PluginVersion>,
    },

    /// `PATH`에서 찾을 수 있어야 하는 실행 파일
    Package { name: String },

    /// 운영체제 조건 자체가 의존성
    OperatingSystem(Condition),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub mandatory: bool,
    pub conditions: Vec<Condition>,
}

impl Dependency {
    /// 플러그인 의존성
    pub fn plugin(id: impl Into<String>) -> Self {
        Self::from_kind(DependencyKind::Plugin {
            id: id.into(),
            version: None,
        })
    }

    /// 버전 요구가 있는 플러그인 의존성
    pub fn plugin_version(id: impl Into<String>, version: PluginVersion) -> Self {
        Self::from_kind(DependencyKind::Plugin {
            id: id.into(),
            version: Some(version),
        })
    }

    /// 실행 파일 패키지 의존성
    pub fn package(name: impl Into<String>) -> Self {
        Self::from_kind(DependencyKind::Package { name: name.into() })
    }

    /// 운영체제 의존성
    pub fn operating_system(platform: Platform) -> Self {
        Self::from_kind(DependencyKind::OperatingSystem(Condition::OperatingSystem(
            platform,
        )))
    }

    fn from_kind(kind: DependencyKind) -> Self {
        Self {
            kind,
            mandatory: true,
            conditions: Vec::new(),
        }
    }

    /// 선택적 의존성으로 표시
    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// 의존하는 플러그인 ID (플러그인 의존성일 때)
    pub fn plugin_id(&self) -> Option<&str> {
        match &self.kind {
            DependencyKind::Plugin { id, .. } => Some(id),
            _ => None,
        }
    }

    /// 모든 조건이 만족되어 의존성이 적용되는지
    pub fn applies(&self, manager: &PluginManager) -> bool {
        self.conditions.iter().all(|c| c.test(manager))
    }

    /// 의존성 만족 여부
    pub fn test(&self, manager: &PluginManager) -> bool {
        if !self.applies(manager) {
            return true;
        }

        let satisfied = match &self.kind {
            DependencyKind::Plugin { id, version } => match manager.registry().find(id) {
                Some(descriptor) => version
                    .as_ref()
                    .map_or(true, |required| descriptor.version.satisfies(required)),
                None => false,
            },
            DependencyKind::Package { name } => which::which(name).is_ok(),
            DependencyKind::OperatingSystem(condition) => condition.test(manager),
        };

        if !satisfied {
            debug!(dependency = %self, "Dependency not satisfied");
        }

        satisfied
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            DependencyKind::Plugin {
                id,
                version: Some(version),
            } => write!(f, "plugin {} (>= {})", id, version),
            DependencyKind::Plugin { id, version: None } => write!(f, "plugin {}", id),
            DependencyKind::Package { name } => write!(f, "package {}", name),
            DependencyKind::OperatingSystem(condition) => write!(f, "os {:?}", condition),
        }
    }
}
