//! Composes one plot frame from a snapshot.
//!
//! Draws the polyline, the buffer status line and the four axis labels, or the
//! "waiting for data" placeholder when no sample has arrived yet.

use super::mapper::{CanvasGeometry, RangeMapper};
use crate::render::frame::{Frame, Rgb};
use crate::store::Sample;

const TRACE_COLOR: Rgb = Rgb::RED;
const TRACE_WIDTH: f64 = 2.0;
const TEXT_COLOR: Rgb = Rgb::BLACK;
const BACKGROUND: Rgb = Rgb::WHITE;

/// Buffer occupancy shown next to the plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    pub len: usize,
    pub capacity: Option<usize>,
}

impl BufferStatus {
    /// Whether a rolling buffer is full and evicting on every append.
    pub fn is_rolling(&self) -> bool {
        matches!(self.capacity, Some(capacity) if self.len >= capacity)
    }

    /// Status line drawn in the top-left corner.
    pub fn label(&self) -> String {
        match self.capacity {
            Some(capacity) => {
                let rolling = if self.is_rolling() { " (ROLLING)" } else { "" };
                format!("Points: {} / {}{}", self.len, capacity, rolling)
            }
            None => format!("Points: {}", self.len),
        }
    }
}

/// Formats an axis bound the way the labels show it.
pub fn axis_label(value: f64) -> String {
    format!("{value:.2}")
}

/// Draws a complete frame for `samples` and returns the mapper that was used,
/// or `None` if the placeholder was drawn.
pub fn draw_graph(
    frame: &mut Frame,
    samples: &[Sample],
    geometry: CanvasGeometry,
    capacity: Option<usize>,
) -> Option<RangeMapper> {
    frame.clear(BACKGROUND);

    let Some(mapper) = RangeMapper::fit(samples, geometry) else {
        draw_placeholder(frame, geometry, capacity);
        return None;
    };

    frame.set_line_width(TRACE_WIDTH);
    frame.set_color(TRACE_COLOR);
    let mut points = samples.iter().map(|&s| mapper.to_pixel(s));
    if let Some((x, y)) = points.next() {
        frame.move_to(x, y);
    }
    for (x, y) in points {
        frame.line_to(x, y);
    }
    frame.stroke();

    let status = BufferStatus {
        len: samples.len(),
        capacity,
    };
    frame.set_color(TEXT_COLOR);
    frame.set_font_size(14.0);
    frame.move_to(10.0, 20.0);
    frame.show_text(status.label());

    let width = geometry.width as f64;
    let height = geometry.height as f64;
    let margin = geometry.margin as f64;
    let extent = mapper.extent;

    frame.set_font_size(12.0);
    frame.move_to(margin, height - margin + 20.0);
    frame.show_text(axis_label(extent.min_x));
    frame.move_to(width - margin - 40.0, height - margin + 20.0);
    frame.show_text(axis_label(extent.max_x));
    frame.move_to(5.0, height - margin);
    frame.show_text(axis_label(extent.min_y));
    frame.move_to(5.0, margin);
    frame.show_text(axis_label(extent.max_y));

    Some(mapper)
}

fn draw_placeholder(frame: &mut Frame, geometry: CanvasGeometry, capacity: Option<usize>) {
    let center_x = (geometry.width / 2) as f64;
    let center_y = (geometry.height / 2) as f64;

    frame.set_color(TEXT_COLOR);
    frame.set_font_size(20.0);
    frame.move_to(center_x - 80.0, center_y);
    frame.show_text("Waiting for data...");

    let info = match capacity {
        Some(capacity) => format!("Buffer size: {capacity} points"),
        None => "Buffer size: unbounded".to_string(),
    };
    frame.set_font_size(14.0);
    frame.move_to(center_x - 100.0, center_y + 30.0);
    frame.show_text(info);
}
