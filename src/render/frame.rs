//! Pixel-space drawing surface for one frame.
//!
//! A `Frame` records drawing commands in canvas coordinates (origin top-left,
//! y grows downward). The render loop owns the frame while drawing and moves it
//! into the display on submit; the display decides how to rasterize it.

/// RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const RED: Rgb = Rgb::new(1.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Converts to 8-bit channels, clamping out-of-range components.
    pub fn to_u8(self) -> (u8, u8, u8) {
        let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        (channel(self.r), channel(self.g), channel(self.b))
    }
}

/// A single recorded drawing command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Fill the whole canvas.
    Clear(Rgb),
    /// Stroke an open polyline through the given canvas points.
    Polyline {
        points: Vec<(f64, f64)>,
        color: Rgb,
        width: f64,
    },
    /// Draw text with its baseline starting at `(x, y)`.
    Text {
        x: f64,
        y: f64,
        size: f64,
        color: Rgb,
        text: String,
    },
}

/// Drawing state plus the recorded command list for one frame.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    color: Rgb,
    line_width: f64,
    font_size: f64,
    cursor: (f64, f64),
    path: Vec<(f64, f64)>,
    ops: Vec<DrawOp>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color: Rgb::BLACK,
            line_width: 1.0,
            font_size: 12.0,
            cursor: (0.0, 0.0),
            path: Vec::new(),
            ops: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[cfg(test)]
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<DrawOp> {
        self.ops
    }

    /// Paints the whole canvas with `color`, discarding earlier commands.
    pub fn clear(&mut self, color: Rgb) {
        self.ops.clear();
        self.path.clear();
        self.ops.push(DrawOp::Clear(color));
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.font_size = size;
    }

    /// Starts a new sub-path at `(x, y)`; also positions the text cursor.
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.flush_path();
        self.cursor = (x, y);
        self.path.push((x, y));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        if self.path.is_empty() {
            self.path.push(self.cursor);
        }
        self.cursor = (x, y);
        self.path.push((x, y));
    }

    /// Strokes the current path with the current colour and line width.
    pub fn stroke(&mut self) {
        self.flush_path();
    }

    /// Draws `text` at the current point, the way `show_text` does after a
    /// `move_to`.
    pub fn show_text(&mut self, text: impl Into<String>) {
        // A bare move_to before text is a position, not a path.
        if self.path.len() == 1 {
            self.path.clear();
        }
        let (x, y) = self.cursor;
        self.ops.push(DrawOp::Text {
            x,
            y,
            size: self.font_size,
            color: self.color,
            text: text.into(),
        });
    }

    fn flush_path(&mut self) {
        if self.path.len() >= 2 {
            let points = std::mem::take(&mut self.path);
            self.ops.push(DrawOp::Polyline {
                points,
                color: self.color,
                width: self.line_width,
            });
        } else {
            self.path.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_recorded_on_stroke() {
        let mut frame = Frame::new(100, 100);
        frame.clear(Rgb::WHITE);
        frame.set_color(Rgb::RED);
        frame.set_line_width(2.0);
        frame.move_to(0.0, 0.0);
        frame.line_to(10.0, 10.0);
        frame.line_to(20.0, 5.0);
        frame.stroke();

        assert_eq!(
            frame.ops(),
            &[
                DrawOp::Clear(Rgb::WHITE),
                DrawOp::Polyline {
                    points: vec![(0.0, 0.0), (10.0, 10.0), (20.0, 5.0)],
                    color: Rgb::RED,
                    width: 2.0,
                },
            ]
        );
    }

    #[test]
    fn test_text_after_move_to_does_not_leave_a_path() {
        let mut frame = Frame::new(100, 100);
        frame.set_font_size(14.0);
        frame.move_to(10.0, 20.0);
        frame.show_text("Points: 3");
        frame.stroke();

        assert_eq!(
            frame.ops(),
            &[DrawOp::Text {
                x: 10.0,
                y: 20.0,
                size: 14.0,
                color: Rgb::BLACK,
                text: "Points: 3".to_string(),
            }]
        );
    }

    #[test]
    fn test_single_point_path_draws_nothing() {
        let mut frame = Frame::new(100, 100);
        frame.move_to(5.0, 5.0);
        frame.stroke();
        assert!(frame.ops().is_empty());
    }

    #[test]
    fn test_rgb_to_u8_clamps() {
        assert_eq!(Rgb::new(1.5, -0.2, 0.5).to_u8(), (255, 0, 128));
    }
}
