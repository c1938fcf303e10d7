//! hive-core: Plugin Runtime for Hive
//!
//! Layer2 - 플러그인 런타임 레이어
//!
//! # 주요 모듈
//!
//! - `plugin`: 디스크립터/레지스트리, 인스턴스 상태 머신, 플러그인 스레드,
//!   매니저 (로드/언로드 프로토콜, diffusion 정책, main loop, 확장)
//!
//! # 사용 예시
//!
//! ```ignore
//! use hive_core::{PluginManager, PluginRegistry, LoadType};
//! use hive_foundation::RuntimeConfig;
//!
//! let manager = PluginManager::new(PluginRegistry::with_registered(), RuntimeConfig::load()?);
//! manager.load_system()?;
//!
//! // 다른 스레드에서 종료 요청
//! let handle = Arc::clone(&manager);
//! std::thread::spawn(move || handle.unload_system(true));
//!
//! manager.main_loop();
//! ```

pub mod plugin;

// `hive_plugin!` 매크로에서 사용
pub use inventory;

// Re-exports: Plugin
pub use plugin::{
    CapabilityAllowed, Condition, Dependency, DiffusionPolicy, ExtensionHook, LoadType,
    LoadingType, ManagerCommand, ManagerExtension, Plugin, PluginDescriptor, PluginEvent,
    PluginInstance, PluginManager, PluginRef, PluginRegistry, PluginVersion,
};
