//! Terminal display backed by ratatui.
//!
//! Frames are drawn in pixel space and shown on a braille `Canvas` whose bounds
//! equal the frame size, so the whole canvas is scaled to fit the terminal.

use super::frame::{DrawOp, Frame, Rgb};
use super::{Display, HostEvent};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::canvas::{Canvas, Line as CanvasLine},
};
use std::io::{self, Stdout};
use std::time::Duration;

/// Full-screen terminal output for plot frames.
pub struct TerminalDisplay {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl TerminalDisplay {
    /// Enters raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If raw mode cannot be enabled
    /// - If the alternate screen cannot be entered
    /// - If the terminal backend cannot be created
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }

        let backend = CrosstermBackend::new(stdout);
        let terminal = match Terminal::new(backend) {
            Ok(terminal) => terminal,
            Err(e) => {
                let _ = disable_raw_mode();
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                return Err(e.into());
            }
        };

        Ok(TerminalDisplay {
            terminal,
            active: true,
        })
    }

    /// Restores the terminal. Safe to call more than once.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Display for TerminalDisplay {
    fn service_events(&mut self, timeout: Duration) -> anyhow::Result<HostEvent> {
        let mut wait = timeout;
        while event::poll(wait)? {
            // Drain everything already queued without waiting again.
            wait = Duration::ZERO;
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        tracing::debug!("Escape or 'q' pressed: closing");
                        return Ok(HostEvent::Close);
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        tracing::debug!("Ctrl+C pressed: closing");
                        return Ok(HostEvent::Close);
                    }
                    _ => {}
                }
            }
        }
        Ok(HostEvent::Continue)
    }

    fn submit_frame(&mut self, frame: Frame) -> anyhow::Result<()> {
        let width = frame.width() as f64;
        let height = frame.height() as f64;
        let ops = frame.into_ops();

        let background = ops
            .iter()
            .rev()
            .find_map(|op| match op {
                DrawOp::Clear(color) => Some(*color),
                _ => None,
            })
            .unwrap_or(Rgb::WHITE);

        self.terminal.draw(|f| {
            let canvas = Canvas::default()
                .background_color(color(background))
                .marker(Marker::Braille)
                .x_bounds([0.0, width])
                .y_bounds([0.0, height])
                .paint(|ctx| {
                    for op in &ops {
                        match op {
                            DrawOp::Clear(_) => {}
                            DrawOp::Polyline { points, color: c, .. } => {
                                for pair in points.windows(2) {
                                    let (x1, y1) = pair[0];
                                    let (x2, y2) = pair[1];
                                    // Canvas y grows upward; frame y grows downward.
                                    ctx.draw(&CanvasLine::new(
                                        x1,
                                        height - y1,
                                        x2,
                                        height - y2,
                                        color(*c),
                                    ));
                                }
                            }
                            DrawOp::Text {
                                x, y, color: c, text, ..
                            } => {
                                ctx.print(
                                    *x,
                                    height - *y,
                                    Span::styled(text.clone(), Style::default().fg(color(*c))),
                                );
                            }
                        }
                    }
                });
            f.render_widget(canvas, f.area());
        })?;

        Ok(())
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn color(rgb: Rgb) -> Color {
    let (r, g, b) = rgb.to_u8();
    Color::Rgb(r, g, b)
}
