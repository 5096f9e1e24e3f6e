use std::sync::Arc;

use tracing::{error, info};

use rssgrid::{Clock, Config, Database, FeedUpdater, SystemClock};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = rssgrid::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        rssgrid::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> rssgrid::Result<()> {
    config.validate()?;

    info!("RSSGrid feed refresher");

    let db = Arc::new(Database::open(&config.database.path).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let updater = Arc::new(FeedUpdater::from_config(
        Arc::clone(&db),
        &config.feeds,
        clock,
    )?);

    let handle = updater.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    handle.shutdown().await;
    db.close().await;

    info!("Shutdown complete");
    Ok(())
}
