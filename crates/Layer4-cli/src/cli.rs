//! CLI commands

use crate::signal;
use hive_core::plugin::{FsModuleDiscovery, ModuleDiscovery};
use hive_core::{LoadingType, PluginManager, PluginRegistry};
use hive_foundation::{PluginConfigStore, RuntimeConfig, TemplateResolver, WATCHDOG_EXIT_CODE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// 설정 로드: global → project → `--config` 파일 → 플래그
pub fn load_config(file: Option<&Path>, plugin_paths: &[String]) -> anyhow::Result<RuntimeConfig> {
    let mut config = RuntimeConfig::load()?;

    if let Some(file) = file {
        config.merge(RuntimeConfig::from_file(file)?);
    }
    config.plugin_paths.extend(plugin_paths.iter().cloned());

    Ok(config)
}

fn build_manager(config: RuntimeConfig) -> anyhow::Result<Arc<PluginManager>> {
    let resolver = TemplateResolver::new();
    let store = PluginConfigStore::from_config(&config, &resolver)?;

    Ok(PluginManager::builder(PluginRegistry::with_registered(), config)
        .template_resolver(resolver)
        .config_store(store)
        .build())
}

/// `hive run` - 종료 코드 반환
pub fn run(config: RuntimeConfig) -> anyhow::Result<i32> {
    let manager = build_manager(config)?;

    if let Err(e) = manager.load_system() {
        error!("Failed to load plugin system: {}", e);
        return Ok(match manager.unload_system(false) {
            Ok(()) => 1,
            Err(e) => {
                error!("Failed to unload after startup failure: {}", e);
                WATCHDOG_EXIT_CODE
            }
        });
    }

    signal::spawn_watcher(Arc::clone(&manager))?;
    info!("Hive running, press Ctrl-C to stop");
    manager.main_loop();

    Ok(0)
}

/// `hive list`
pub fn list(config: RuntimeConfig) -> anyhow::Result<()> {
    let registry = PluginRegistry::with_registered();

    println!("\n{:<24} {:<10} {:<8} {}", "ID", "Version", "Loading", "Capabilities");
    println!("{}", "-".repeat(72));

    for descriptor in registry.list() {
        let loading = match descriptor.loading_type {
            LoadingType::Eager => "eager",
            LoadingType::Lazy => "lazy",
        };
        println!(
            "{:<24} {:<10} {:<8} {}",
            descriptor.id,
            descriptor.version.to_string(),
            loading,
            descriptor.capabilities.join(", ")
        );
    }

    let resolver = TemplateResolver::new();
    let mut paths: Vec<PathBuf> = Vec::new();
    for template in &config.plugin_paths {
        paths.extend(resolver.resolve_existing_dirs(template)?);
    }

    let modules = FsModuleDiscovery::new().discover(&paths)?;
    if !modules.is_empty() {
        println!("\nDiscovered modules:");
        for module in modules {
            println!("  {}", module);
        }
    }
    println!();

    Ok(())
}

/// `hive resolve`
pub fn resolve(template: &str) -> anyhow::Result<()> {
    for value in TemplateResolver::new().resolve_string_value(template)? {
        println!("{}", value);
    }
    Ok(())
}
