//! Live plotting of serial CSV data.
//!
//! Wires the shared store, the ingest worker and the terminal render loop
//! together, and tears them down in order when the display closes.

use crate::config::ValidatedConfig;
use crate::ingest::{IngestExit, IngestHandle};
use crate::render::{RenderExit, RenderLoop, RenderSettings, TerminalDisplay};
use crate::source::SerialSource;
use crate::store::SampleStore;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Plots samples from the configured serial port until the user quits.
///
/// A port that cannot be opened is reported and the plot keeps running with an
/// empty buffer.
///
/// # Errors
/// - If signal handlers cannot be registered
/// - If the terminal display cannot be initialized
/// - If drawing a frame fails
pub async fn handle_plot(config: ValidatedConfig) -> Result<(), anyhow::Error> {
    tracing::info!("=== serplot started ===");
    tracing::info!(
        "Configuration: port={}, baud={}, buffer={}, graph={}x{} (margin {}), read_timeout={:?}, frame_interval={:?}",
        config.port,
        config.baud_rate,
        config.buffer,
        config.geometry.width,
        config.geometry.height,
        config.geometry.margin,
        config.read_timeout,
        config.frame_interval
    );

    let store = Arc::new(SampleStore::new(config.buffer));

    let interrupt = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&interrupt))
            .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;
    }

    let mut display = TerminalDisplay::new().map_err(|e| {
        tracing::error!("Failed to initialize display: {}", e);
        anyhow::anyhow!("Failed to initialize display: {e}")
    })?;

    let ingest = match SerialSource::open(&config.port, config.baud_rate) {
        Ok(source) => {
            tracing::info!("Serial reader started on {}", source.name());
            Some(IngestHandle::spawn(
                source,
                Arc::clone(&store),
                config.read_timeout,
            ))
        }
        Err(e) => {
            tracing::warn!("Serial port unavailable, plotting without input: {}", e);
            None
        }
    };

    tracing::info!("Graph opened. Send CSV data in format: x,y\\n");

    let settings = RenderSettings::new(config.geometry, config.frame_interval);
    let mut render =
        RenderLoop::new(&mut display, Arc::clone(&store), settings).with_interrupt(interrupt);
    let render_result = render.run().await;
    let frames = render.frames();

    if let Some(ingest) = ingest {
        let finished_early = ingest.is_finished();
        match ingest.shutdown().await {
            IngestExit::Stopped => tracing::debug!("Serial reader stopped"),
            exit if finished_early => {
                tracing::debug!("Serial reader had already ended: {:?}", exit)
            }
            exit => tracing::debug!("Serial reader ended: {:?}", exit),
        }
    }

    let exit = settle(render_result, display.cleanup())?;

    if store.is_empty() {
        tracing::info!("No samples were received from {}", config.port);
    }

    tracing::info!(
        "=== serplot exited cleanly ({:?}, {} frames, {} points buffered, {} evicted) ===",
        exit,
        frames,
        store.len(),
        store.eviction_count()
    );
    Ok(())
}

/// Combines the render outcome with terminal cleanup. A render failure wins
/// over a cleanup failure, which is only logged in that case.
fn settle(
    render: anyhow::Result<RenderExit>,
    cleanup: anyhow::Result<()>,
) -> anyhow::Result<RenderExit> {
    match (render, cleanup) {
        (Ok(exit), Ok(())) => Ok(exit),
        (Ok(_), Err(e)) => Err(anyhow::anyhow!("Cleanup failed: {e}")),
        (Err(e), cleanup) => {
            if let Err(cleanup_err) = cleanup {
                tracing::warn!("Cleanup failed after render error: {}", cleanup_err);
            }
            tracing::error!("Render loop failed: {}", e);
            Err(e)
        }
    }
}
