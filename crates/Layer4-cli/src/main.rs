//! Hive CLI - Main entry point

mod cli;
mod plugins;
mod signal;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hive - plugin runtime
#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every registered plugin and run until SIGTERM / Ctrl-C
    Run {
        /// Runtime configuration file (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Additional plugin directory (path templates allowed)
        #[arg(long = "plugin-path")]
        plugin_paths: Vec<String>,

        /// Log level (overrides configuration)
        #[arg(long)]
        log_level: Option<String>,

        /// Capture lifecycle errors instead of aborting
        #[arg(long)]
        no_stop_on_error: bool,
    },
    /// List registered plugins and discovered modules
    List {
        /// Additional plugin directory (path templates allowed)
        #[arg(long = "plugin-path")]
        plugin_paths: Vec<String>,
    },
    /// Print every expansion of a path template
    Resolve {
        /// Template, e.g. "%home%/plugins"
        template: String,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run {
            config,
            plugin_paths,
            log_level,
            no_stop_on_error,
        } => {
            let mut runtime_config = cli::load_config(config.as_deref(), &plugin_paths)?;
            if no_stop_on_error {
                runtime_config.stop_on_cycle_error = false;
            }

            let level = if args.debug {
                "debug".to_string()
            } else {
                log_level.unwrap_or_else(|| runtime_config.log_level.clone())
            };
            init_logging(&level);

            let code = cli::run(runtime_config)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Command::List { plugin_paths } => {
            init_logging(if args.debug { "debug" } else { "warn" });
            let runtime_config = cli::load_config(None, &plugin_paths)?;
            cli::list(runtime_config)?;
        }
        Command::Resolve { template } => {
            init_logging(if args.debug { "debug" } else { "warn" });
            cli::resolve(&template)?;
        }
    }

    Ok(())
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
