use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;

mod cli;
mod config;
mod handler;
mod http;
mod logger;
mod server;
#[cfg(test)]
mod test_utils;
mod upload;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::Cli::parse();
    let cfg = config::Config::load(&args)?;
    logger::init(&cfg)?;

    // Create Tokio runtime, worker thread count from config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    tokio::fs::create_dir_all(&cfg.storage.root)
        .await
        .map_err(|e| format!("Failed to create storage root '{}': {e}", cfg.storage.root))?;

    let listener = match server::create_listener(addr) {
        Ok(l) => l,
        Err(e) => {
            logger::log_error(&format!("Failed to bind {addr}: {e}"));
            return Err(e.into());
        }
    };

    let state = Arc::new(config::AppState::new(&cfg));
    logger::log_server_start(&addr, &cfg);

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown));
    server::start_server_loop(listener, state, shutdown).await;

    tracing::info!("Server stopped");
    Ok(())
}
