mod attribution;
mod capi;
mod config;
mod consent;
mod diagnostics;
mod dispatch_controller;
mod error;
mod events;
mod pricing;
mod services;
mod storage;
mod visitor;

use crate::capi::dispatcher::CapiDispatcher;
use crate::capi::transport::ReqwestTransport;
use crate::config::Config;
use crate::dispatch_controller::state::{
    drain_dispatch_worker, start_dispatch_worker, DispatchQueue,
};
use crate::services::AppState;
use crate::storage::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::{info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const IN_MEMORY_DATABASE: &str = ":memory:";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::load().map_err(io::Error::other)?;
    let kv: Arc<dyn KeyValueStore> = if config.database_path == IN_MEMORY_DATABASE {
        warn!("using in-memory storage, visitor state is lost on restart");
        Arc::new(MemoryKeyValueStore::new())
    } else {
        Arc::new(SqliteKeyValueStore::open(&config.database_path).map_err(io::Error::other)?)
    };

    for destination in config.destinations.iter().filter(|d| !d.is_configured()) {
        warn!(
            "destination {} is missing credentials and will be skipped",
            destination.id
        );
    }

    // Dispatch worker
    let (tx, rx) = mpsc::channel(config.dispatch_queue_capacity.max(1));
    let dispatcher = Arc::new(CapiDispatcher::new(Arc::new(ReqwestTransport::new())));
    let policy = config.retry.clone();
    let worker = tokio::spawn(start_dispatch_worker(dispatcher, policy, rx));

    let state = web::Data::new(
        AppState::new(&config, kv, DispatchQueue::new(tx)).map_err(io::Error::other)?,
    );

    info!(
        "Server running at http://{}:{} ({} markets, {} destinations)",
        config.host,
        config.port,
        config.markets.len(),
        config.destinations.len()
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(256 * 1024))
            .app_data(state.clone())
            .service(services::consent::configure_routes())
            .service(services::attribution::configure_routes())
            .service(services::events::configure_routes())
            .service(services::pricing::configure_routes())
            .service(services::diagnostics::configure_routes())
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    // Every App clone of the state, and with it the last queue sender, is gone.
    info!("server stopped, finishing in-flight dispatches");
    drain_dispatch_worker(worker, SHUTDOWN_GRACE).await;
    Ok(())
}
