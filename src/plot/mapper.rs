//! Data-space to canvas-space mapping.
//!
//! Computes the per-frame affine transform that fits the live extent of a
//! snapshot into the plot area of a fixed-size canvas. Canvas y grows downward,
//! so the transform flips the y axis.

use crate::store::Sample;

/// Pixel dimensions of the drawing canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasGeometry {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

impl CanvasGeometry {
    pub fn new(width: u32, height: u32, margin: u32) -> Self {
        Self {
            width,
            height,
            margin,
        }
    }
}

/// Min/max bounds of both axes over one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisExtent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl AxisExtent {
    /// Scans the samples for their bounds. Returns `None` for an empty slice.
    pub fn of(samples: &[Sample]) -> Option<Self> {
        let first = samples.first()?;
        let init = AxisExtent {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };

        Some(samples[1..].iter().fold(init, |mut extent, s| {
            if s.x < extent.min_x {
                extent.min_x = s.x;
            }
            if s.x > extent.max_x {
                extent.max_x = s.x;
            }
            if s.y < extent.min_y {
                extent.min_y = s.y;
            }
            if s.y > extent.max_y {
                extent.max_y = s.y;
            }
            extent
        }))
    }

    /// Widens a flat axis to a span of exactly 1.0 by moving its maximum.
    ///
    /// Only the maximum moves, so a single point or a flat series sits at the
    /// left/bottom edge of the plot area.
    pub fn widened(self) -> Self {
        let mut extent = self;
        if extent.max_x == extent.min_x {
            extent.max_x = extent.min_x + 1.0;
        }
        if extent.max_y == extent.min_y {
            extent.max_y = extent.min_y + 1.0;
        }
        extent
    }
}

/// Affine transform from data space into canvas pixels for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMapper {
    /// Extent after degenerate axes were widened.
    pub extent: AxisExtent,
    pub scale_x: f64,
    pub offset_x: f64,
    pub scale_y: f64,
    pub offset_y: f64,
}

impl RangeMapper {
    /// Builds the transform for a snapshot, or `None` if it holds no samples.
    pub fn fit(samples: &[Sample], geometry: CanvasGeometry) -> Option<Self> {
        AxisExtent::of(samples).map(|extent| Self::from_extent(extent, geometry))
    }

    pub fn from_extent(extent: AxisExtent, geometry: CanvasGeometry) -> Self {
        let extent = extent.widened();
        let width = geometry.width as f64;
        let height = geometry.height as f64;
        let margin = geometry.margin as f64;

        let scale_x = (width - 2.0 * margin) / (extent.max_x - extent.min_x);
        let offset_x = margin - extent.min_x * scale_x;
        let scale_y = (height - 2.0 * margin) / (extent.max_y - extent.min_y);
        let offset_y = height - margin + extent.min_y * scale_y;

        Self {
            extent,
            scale_x,
            offset_x,
            scale_y,
            offset_y,
        }
    }

    /// Maps a data point to canvas pixels.
    pub fn to_pixel(&self, sample: Sample) -> (f64, f64) {
        (
            sample.x * self.scale_x + self.offset_x,
            self.offset_y - sample.y * self.scale_y,
        )
    }
}
