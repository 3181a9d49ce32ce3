use anyhow::Result;
use log::{error, info, warn};
use std::sync::Arc;

mod api;
mod config;
mod csv_reader;
mod feed_store;
mod query;

use config::Config;
use feed_store::FeedStore;
use query::QueryService;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    // 1. Load the feed once; it is never touched again after this point
    let store = FeedStore::load(&config.data_dir).unwrap_or_else(|e| {
        error!("Error loading GTFS data: {:#}", e);
        FeedStore::unloaded()
    });
    let service = QueryService::new(Arc::new(store));

    let stats = service.stats();
    if service.is_loaded() {
        info!("GTFS data loaded successfully");
    } else {
        warn!("No routes loaded, /api/routes will report GTFS data as not loaded");
    }
    for table in &stats.unreadable_tables {
        warn!("{} could not be read and was loaded as empty", table);
    }

    // 2. HTTP Server
    let routes = api::routes(service);

    info!("Backend server running on port {}", config.port);
    info!("API available at http://localhost:{}/api", config.port);
    info!("Test endpoint: http://localhost:{}/api/test", config.port);
    warp::serve(routes).run((config.bind_addr, config.port)).await;

    Ok(())
}
