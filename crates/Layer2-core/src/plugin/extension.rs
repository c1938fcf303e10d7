//! Manager Extensions - 매니저 훅 지점 확장
//!
//! 확장은 등록 순서대로 실행됩니다. `TestPluginLoad` 확장은 `test`만
//! 호출되며 false를 반환하면 로드가 거부됩니다.

use super::instance::PluginRef;
use super::manager::PluginManager;

/// 확장 실행 지점
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionHook {
    /// 로드 전 (거부 가능)
    TestPluginLoad,
    PluginLoaded,
    PluginUnloaded,
    /// `load_system` 완료 (조건 검사 없이 실행)
    EndLoadSystem,
}

impl ExtensionHook {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TestPluginLoad => "test_plugin_load",
            Self::PluginLoaded => "plugin_loaded",
            Self::PluginUnloaded => "plugin_unloaded",
            Self::EndLoadSystem => "end_load_system",
        }
    }
}

/// 매니저 확장
pub trait ManagerExtension: Send + Sync {
    fn name(&self) -> &str;

    fn hook(&self) -> ExtensionHook;

    /// 이 확장을 실행할지 (`TestPluginLoad`에서는 로드 허용 여부,
    /// `EndLoadSystem`에서는 호출되지 않음)
    fn test(&self, manager: &PluginManager, plugin: Option<&PluginRef>) -> bool {
        let _ = (manager, plugin);
        true
    }

    /// 확장 실행, false는 실패
    fn execute(&self, manager: &PluginManager, plugin: Option<&PluginRef>) -> bool;
}

/// 클로저 기반 확장
///
/// `TestPluginLoad`에서는 클로저가 `test`로, 그 외에는 `execute`로 쓰입니다.
pub struct FnExtension<F> {
    name: String,
    hook: ExtensionHook,
    execute: F,
}

impl<F> FnExtension<F>
where
    F: Fn(&PluginManager, Option<&PluginRef>) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, hook: ExtensionHook, execute: F) -> Self {
        Self {
            name: name.into(),
            hook,
            execute,
        }
    }
}

impl<F> ManagerExtension for FnExtension<F>
where
    F: Fn(&PluginManager, Option<&PluginRef>) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn hook(&self) -> ExtensionHook {
        self.hook
    }

    fn test(&self, manager: &PluginManager, plugin: Option<&PluginRef>) -> bool {
        self.hook != ExtensionHook::TestPluginLoad || (self.execute)(manager, plugin)
    }

    fn execute(&self, manager: &PluginManager, plugin: Option<&PluginRef>) -> bool {
        (self.execute)(manager, plugin)
    }
}
