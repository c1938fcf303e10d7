//! # Plugin System
//!
//! Hive 플러그인 런타임
//!
//! ## 개요
//!
//! - 플러그인 클래스는 [`PluginDescriptor`]로 기술되고 [`PluginRegistry`]에
//!   등록됩니다 (`hive_plugin!` 링크 타임 등록 또는 `register`).
//! - [`PluginManager`]가 인스턴스를 만들고 의존성/capability 그래프를 따라
//!   로드/언로드합니다.
//! - `main`/`thread` capability 플러그인은 전용 [`PluginThread`]에서
//!   라이프사이클 훅이 실행되며, 매니저는 ready 세마포어로 완료를 기다립니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PluginManager                           │
//! │  ┌───────────────────────────────────────────────────────┐ │
//! │  │                   PluginRegistry                       │ │
//! │  │  ┌────────────┬────────────┬────────────────────┐    │ │
//! │  │  │ Descriptor │ Descriptor │ Descriptor         │    │ │
//! │  │  └────────────┴────────────┴────────────────────┘    │ │
//! │  └───────────────────────────────────────────────────────┘ │
//! │                          │ instantiate                      │
//! │  ┌───────────────────────┼───────────────────────────────┐ │
//! │  │  PluginInstance (singleton / replica)                 │ │
//! │  │  - 상태 머신 (loaded / lazy_loaded / error_state)     │ │
//! │  │  - 이벤트 구독, allowed / dependency 목록             │ │
//! │  │  - ready 세마포어 ◄──── PluginThread                  │ │
//! │  └───────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! struct Echo;
//!
//! impl Plugin for Echo {
//!     fn on_load(&self, ctx: &PluginRef) -> Result<()> {
//!         ctx.register_for_plugin_manager_event(EVENT_PLUGIN_MANAGER);
//!         Ok(())
//!     }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! fn echo() -> PluginDescriptor {
//!     PluginDescriptor::new("acme.echo", "Echo", || Box::new(Echo))
//!         .with_capability("acme.echo")
//! }
//! hive_core::hive_plugin!(echo);
//!
//! let manager = PluginManager::new(PluginRegistry::with_registered(), RuntimeConfig::load()?);
//! manager.load_system()?;
//! ```

mod dependency;
mod descriptor;
mod discovery;
mod events;
mod extension;
mod instance;
mod manager;
mod registry;
mod thread;
mod traits;

pub use dependency::{Condition, Dependency, DependencyKind};
pub use descriptor::{
    CapabilityAllowed, DiffusionPolicy, LoadType, LoadingType, PluginDescriptor, PluginFactory,
    PluginVersion, CAPABILITY_MAIN, CAPABILITY_THREAD,
};
pub use discovery::{FsModuleDiscovery, ModuleDiscovery};
pub use events::{
    EventSource, PluginEvent, EVENT_END_LOAD_SYSTEM, EVENT_PLUGIN_LAZY_LOAD, EVENT_PLUGIN_LOAD,
    EVENT_PLUGIN_MANAGER, EVENT_PLUGIN_UNLOAD, EVENT_UNLOAD_SYSTEM,
};
pub use extension::{ExtensionHook, FnExtension, ManagerExtension};
pub use instance::{LifecyclePhase, PluginInstance, PluginRef};
pub use manager::{ManagerCommand, PluginManager, PluginManagerBuilder, VetoReason};
pub use registry::{PluginRegistration, PluginRegistry};
pub use thread::{PluginCommand, PluginThread};
pub use traits::Plugin;
