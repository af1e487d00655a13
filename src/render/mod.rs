//! Frame-paced render loop.
//!
//! Each iteration services host events, snapshots the store, composes a frame
//! and submits it to the display, then sleeps until the next tick. The store
//! lock is only held while the snapshot is copied.

pub mod frame;
pub mod terminal;

use crate::plot::{draw_graph, CanvasGeometry};
use crate::store::SampleStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use frame::Frame;
pub use terminal::TerminalDisplay;

/// Result of servicing the host's event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// Keep rendering.
    Continue,
    /// The window was closed or the user asked to quit.
    Close,
}

/// Where finished frames go.
pub trait Display {
    /// Processes pending host events, waiting at most `timeout` for one.
    ///
    /// # Errors
    /// - If the host event queue cannot be read
    fn service_events(&mut self, timeout: Duration) -> anyhow::Result<HostEvent>;

    /// Returns an empty frame of the given size to draw into.
    fn begin_frame(&mut self, width: u32, height: u32) -> Frame {
        Frame::new(width, height)
    }

    /// Publishes a finished frame. Ownership moves to the display.
    ///
    /// # Errors
    /// - If the frame cannot be presented
    fn submit_frame(&mut self, frame: Frame) -> anyhow::Result<()>;
}

/// Render loop settings.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub geometry: CanvasGeometry,
    /// Sleep between frames.
    pub frame_interval: Duration,
    /// Longest wait for a host event per frame.
    pub event_timeout: Duration,
}

impl RenderSettings {
    pub fn new(geometry: CanvasGeometry, frame_interval: Duration) -> Self {
        Self {
            geometry,
            frame_interval,
            event_timeout: Duration::from_millis(1),
        }
    }
}

/// Why the render loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderExit {
    /// The host asked to close.
    Closed,
    /// A termination signal was received.
    Interrupted,
}

/// Consumer side of the store: draws at a fixed cadence until the host closes.
pub struct RenderLoop<'a, D> {
    display: &'a mut D,
    store: Arc<SampleStore>,
    settings: RenderSettings,
    interrupt: Option<Arc<AtomicBool>>,
    frames: u64,
}

impl<'a, D: Display> RenderLoop<'a, D> {
    pub fn new(display: &'a mut D, store: Arc<SampleStore>, settings: RenderSettings) -> Self {
        Self {
            display,
            store,
            settings,
            interrupt: None,
            frames: 0,
        }
    }

    /// Also stop when `flag` becomes set (e.g. by a signal handler).
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Number of frames submitted so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Runs until the host closes or an interrupt is raised.
    ///
    /// # Errors
    /// - If servicing host events or submitting a frame fails
    pub async fn run(&mut self) -> anyhow::Result<RenderExit> {
        loop {
            if self.interrupted() {
                tracing::info!("Termination signal received, closing");
                return Ok(RenderExit::Interrupted);
            }

            if self.display.service_events(self.settings.event_timeout)? == HostEvent::Close {
                tracing::debug!("Display closed after {} frames", self.frames);
                return Ok(RenderExit::Closed);
            }

            self.render_frame()?;

            if self.frames.is_multiple_of(200) {
                tracing::debug!(
                    "Rendered {} frames, {} points buffered",
                    self.frames,
                    self.store.len()
                );
            }

            tokio::time::sleep(self.settings.frame_interval).await;
        }
    }

    /// Draws and submits a single frame from a fresh snapshot.
    ///
    /// # Errors
    /// - If the display rejects the frame
    pub fn render_frame(&mut self) -> anyhow::Result<()> {
        let samples = self.store.snapshot();
        let geometry = self.settings.geometry;

        let mut frame = self.display.begin_frame(geometry.width, geometry.height);
        draw_graph(&mut frame, &samples, geometry, self.store.capacity());
        self.display.submit_frame(frame)?;
        self.frames += 1;
        Ok(())
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
