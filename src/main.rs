//! Relaygate - CLI entry point

use clap::Parser;
use relaygate::{Config, Gateway, VERSION};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "relaygate")]
#[command(version = VERSION)]
#[command(about = "Forward HTTP proxy with pluggable name resolution")]
struct Args {
    /// Path to configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Listen port (overrides config)
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short = 'D', long = "debug")]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get().max(2))
        .enable_all()
        .thread_name("relaygate-worker")
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let args = Args::parse();

    let debug = std::env::var_os("DEBUG").is_some() || args.debug;
    let default_level = if debug { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("relaygate={}", default_level).parse()?),
        )
        .init();

    info!("Relaygate v{}", VERSION);

    let mut config = match &args.config {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            match Config::load(path) {
                Ok(config) => config,
                Err(e) => {
                    error!("failed to load configuration: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => Config::default(),
    };

    if let Some(port) = args.port {
        config.set_port(port)?;
    }

    info!("start serving requests on {}", config.listen);

    let gateway = match Gateway::new(config) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("failed to initialize gateway: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = gateway.run().await {
        error!("gateway error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
