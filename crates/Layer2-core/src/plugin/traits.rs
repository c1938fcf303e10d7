//! Plugin traits - 핵심 플러그인 인터페이스
//!
//! 사용자 플러그인은 [`Plugin`]을 구현합니다. 모든 훅은 기본 no-op이며
//! 런타임 상태(로드 플래그, 구독, ready 세마포어)는 `PluginInstance`가
//! 관리합니다 (`ctx`). 훅은 `&self`로 호출되므로 변경 가능한 상태는 내부 가변성으로
//! 보관해야 합니다.
//!
//! `main`/`thread` capability 플러그인의 훅은 플러그인 스레드의 내부 실행
//! 스레드에서 호출됩니다. 반환하지 않는 `on_load`(서버 루프 등)는 준비가
//! 끝난 시점에 `ctx.release_ready_semaphore()`를 직접 호출해야 합니다.

use super::events::PluginEvent;
use super::instance::PluginRef;
use hive_foundation::Result;
use serde_json::Value;
use std::any::Any;

/// 플러그인 훅 인터페이스
#[allow(unused_variables)]
pub trait Plugin: Send + Sync {
    // ========================================================================
    // 라이프사이클
    // ========================================================================

    /// 전체 로드
    fn on_load(&self, ctx: &PluginRef) -> Result<()> {
        Ok(())
    }

    /// 지연 로드 (의존성/capability 연결 없음)
    fn on_lazy_load(&self, ctx: &PluginRef) -> Result<()> {
        Ok(())
    }

    /// 의존성 주입 후, allowed 주입 전
    fn on_end_load(&self, ctx: &PluginRef) -> Result<()> {
        Ok(())
    }

    fn on_unload(&self, ctx: &PluginRef) -> Result<()> {
        Ok(())
    }

    fn on_end_unload(&self, ctx: &PluginRef) -> Result<()> {
        Ok(())
    }

    // ========================================================================
    // 주입
    // ========================================================================

    /// allowed capability 제공자가 주입됨
    fn on_load_allowed(&self, ctx: &PluginRef, plugin: &PluginRef, capability: &str) -> Result<()> {
        Ok(())
    }

    /// allowed capability 제공자가 제거됨
    fn on_unload_allowed(
        &self,
        ctx: &PluginRef,
        plugin: &PluginRef,
        capability: &str,
    ) -> Result<()> {
        Ok(())
    }

    /// 의존 플러그인이 로드되어 주입됨
    fn on_dependency_injected(&self, ctx: &PluginRef, plugin: &PluginRef) -> Result<()> {
        Ok(())
    }

    // ========================================================================
    // 이벤트 / 설정
    // ========================================================================

    /// 구독한 이벤트 수신
    fn on_event(&self, ctx: &PluginRef, event: &PluginEvent) -> Result<()> {
        Ok(())
    }

    /// 설정 값 변경
    fn on_configuration_changed(&self, ctx: &PluginRef, key: &str, value: &Value) -> Result<()> {
        Ok(())
    }

    /// 다운캐스팅용
    fn as_any(&self) -> &dyn Any;
}
