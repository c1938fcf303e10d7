//! Plugin Descriptor - 플러그인 클래스 메타데이터 정의
//!
//! descriptor는 등록 시점에 한 번 만들어지고 이후 변경되지 않습니다.
//! `capabilities_allowed` 항목은 여기서 `{name, policy}` 형태로 정규화됩니다.

use super::dependency::Dependency;
use super::traits::Plugin;
use hive_foundation::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 스레드가 필요한 capability
pub const CAPABILITY_MAIN: &str = "main";
pub const CAPABILITY_THREAD: &str = "thread";

/// 플러그인 인스턴스 생성 함수
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

// ============================================================================
// PluginVersion
// ============================================================================

/// 플러그인 버전
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PluginVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// 버전 문자열 파싱 (예: "1.2.3", "1.2")
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');

        let major = parts.next()?.parse::<u32>().ok()?;
        let minor = parts.next().map(str::parse::<u32>).transpose().ok()?.unwrap_or(0);
        let patch = parts.next().map(str::parse::<u32>).transpose().ok()?.unwrap_or(0);

        if parts.next().is_some() {
            return None;
        }

        Some(Self { major, minor, patch })
    }

    /// 호환성 검사 (같은 메이저 버전)
    pub fn is_compatible_with(&self, other: &PluginVersion) -> bool {
        self.major == other.major
    }

    /// `required`를 만족하는지 (같은 메이저 + 이상)
    pub fn satisfies(&self, required: &PluginVersion) -> bool {
        self.is_compatible_with(required) && self >= required
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for PluginVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

// ============================================================================
// DiffusionPolicy / CapabilityAllowed
// ============================================================================

/// allowed capability 주입 시 인스턴스 공유 범위
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffusionPolicy {
    /// 전역 공유 인스턴스
    #[default]
    Singleton,

    /// 요청자의 diffusion scope 안에서 공유 (없으면 생성)
    Same,

    /// 항상 새 scope의 새 인스턴스
    New,
}

/// 주입받고 싶은 capability와 정책
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityAllowed {
    pub name: String,
    #[serde(default)]
    pub policy: DiffusionPolicy,
}

impl CapabilityAllowed {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_policy(name, DiffusionPolicy::Singleton)
    }

    pub fn with_policy(name: impl Into<String>, policy: DiffusionPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }
}

impl From<&str> for CapabilityAllowed {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<(&str, DiffusionPolicy)> for CapabilityAllowed {
    fn from((name, policy): (&str, DiffusionPolicy)) -> Self {
        Self::with_policy(name, policy)
    }
}

// ============================================================================
// LoadingType / LoadType
// ============================================================================

/// 시스템 로드 시 적재 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingType {
    #[default]
    Eager,
    Lazy,
}

/// 로드/언로드 요청 원인
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    /// 직접 요청
    Full,
    /// 다른 플러그인의 의존성으로 인한 요청
    Dependency,
    /// allowed capability 주입으로 인한 요청
    Allowed,
}

impl LoadType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Dependency => "dependency",
            Self::Allowed => "allowed",
        }
    }
}

// ============================================================================
// PluginDescriptor
// ============================================================================

/// 플러그인 클래스 descriptor
#[derive(Clone)]
pub struct PluginDescriptor {
    /// 고유 플러그인 ID (예: "hive.heartbeat")
    pub id: String,

    /// 표시 이름
    pub name: String,

    pub short_name: String,

    pub description: String,

    pub version: PluginVersion,

    pub author: Option<String>,

    /// 지원 플랫폼 (비어 있으면 모두)
    pub platforms: Vec<Platform>,

    /// 제공하는 capability (순서 유지, 중복 없음)
    pub capabilities: Vec<String>,

    /// 주입받고 싶은 capability
    pub capabilities_allowed: Vec<CapabilityAllowed>,

    pub dependencies: Vec<Dependency>,

    /// 발생시킬 수 있는 이벤트 네임스페이스
    pub events_handled: Vec<String>,

    /// 다른 플러그인에서 구독할 수 있는 이벤트
    pub events_registrable: Vec<String>,

    pub loading_type: LoadingType,

    factory: PluginFactory,
}

impl PluginDescriptor {
    /// 새 descriptor 생성
    pub fn new<F>(id: impl Into<String>, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let id = id.into();
        let short_name = id.rsplit('.').next().unwrap_or(&id).to_string();

        Self {
            short_name,
            id,
            name: name.into(),
            description: String::new(),
            version: PluginVersion::default(),
            author: None,
            platforms: Vec::new(),
            capabilities: Vec::new(),
            capabilities_allowed: Vec::new(),
            dependencies: Vec::new(),
            events_handled: Vec::new(),
            events_registrable: Vec::new(),
            loading_type: LoadingType::Eager,
            factory: Arc::new(factory),
        }
    }

    /// 플러그인 인스턴스 생성
    pub fn create(&self) -> Box<dyn Plugin> {
        (self.factory)()
    }

    /// 전용 스레드가 필요한지 (`main` 또는 `thread` capability)
    pub fn requires_thread(&self) -> bool {
        self.capabilities
            .iter()
            .any(|c| c == CAPABILITY_MAIN || c == CAPABILITY_THREAD)
    }

    /// 플랫폼 지원 여부
    pub fn supports_platform(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// 허용 capability 항목 조회
    pub fn capability_allowed(&self, name: &str) -> Option<&CapabilityAllowed> {
        self.capabilities_allowed.iter().find(|a| a.name == name)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = short_name.into();
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_version(mut self, version: PluginVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        if !self.platforms.contains(&platform) {
            self.platforms.push(platform);
        }
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        push_unique(&mut self.capabilities, capability.into());
        self
    }

    /// 허용 capability 추가 (같은 이름이면 정책 교체)
    pub fn with_capability_allowed(mut self, allowed: impl Into<CapabilityAllowed>) -> Self {
        let allowed = allowed.into();
        match self
            .capabilities_allowed
            .iter_mut()
            .find(|a| a.name == allowed.name)
        {
            Some(existing) => existing.policy = allowed.policy,
            None => self.capabilities_allowed.push(allowed),
        }
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_event_handled(mut self, event: impl Into<String>) -> Self {
        push_unique(&mut self.events_handled, event.into());
        self
    }

    pub fn with_event_registrable(mut self, event: impl Into<String>) -> Self {
        push_unique(&mut self.events_registrable, event.into());
        self
    }

    pub fn with_loading_type(mut self, loading_type: LoadingType) -> Self {
        self.loading_type = loading_type;
        self
    }

    pub fn lazy(self) -> Self {
        self.with_loading_type(LoadingType::Lazy)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("capabilities", &self.capabilities)
            .field("capabilities_allowed", &self.capabilities_allowed)
            .field("dependencies", &self.dependencies)
            .field("loading_type", &self.loading_type)
            .finish_non_exhaustive()
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
