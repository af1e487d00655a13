mod app;
mod commands;
mod config;
mod ingest;
mod logging;
mod plot;
mod render;
mod source;
mod store;

use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("Fatal: {e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
