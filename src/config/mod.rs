//! Configuration management for serplot.
//!
//! Settings come from three layers: built-in defaults, the optional TOML file,
//! and command-line overrides. The merged values are checked by
//! [`PlotConfig::validate`] before any device or terminal is opened.

pub mod file;

use crate::plot::CanvasGeometry;
use crate::store::{BufferPolicy, MAX_CAPACITY, MIN_CAPACITY};
use anyhow::{anyhow, bail, Result};
use std::time::Duration;

pub use file::{BufferSize, SerplotConfig};

/// Supported serial line speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
}

impl BaudRate {
    pub const ALL: [BaudRate; 5] = [
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
    ];

    pub fn bits_per_second(self) -> u32 {
        match self {
            Self::B9600 => 9600,
            Self::B19200 => 19200,
            Self::B38400 => 38400,
            Self::B57600 => 57600,
            Self::B115200 => 115200,
        }
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = anyhow::Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|baud| baud.bits_per_second() == value)
            .ok_or_else(|| {
                anyhow!("Unsupported baud rate {value} (expected 9600, 19200, 38400, 57600 or 115200)")
            })
    }
}

impl std::fmt::Display for BaudRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bits_per_second())
    }
}

const WIDTH_RANGE: (u32, u32) = (200, 4096);
const HEIGHT_RANGE: (u32, u32) = (200, 4096);
const MARGIN_RANGE: (u32, u32) = (10, 200);
const TIMING_RANGE_MS: (u64, u64) = (10, 10_000);

/// Unvalidated settings after merging file values and CLI overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotConfig {
    pub port: String,
    pub baud_rate: u32,
    pub buffer_size: BufferSize,
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub read_timeout_ms: u64,
    pub frame_interval_ms: u64,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub buffer_size: Option<BufferSize>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub margin: Option<u32>,
    pub read_timeout_ms: Option<u64>,
    pub frame_interval_ms: Option<u64>,
}

impl PlotConfig {
    /// Applies `overrides` on top of the file values.
    pub fn merge(file: SerplotConfig, overrides: Overrides) -> Self {
        Self {
            port: overrides.port.unwrap_or(file.serial.port),
            baud_rate: overrides.baud_rate.unwrap_or(file.serial.baud_rate),
            buffer_size: overrides.buffer_size.unwrap_or(file.buffer.size),
            width: overrides.width.unwrap_or(file.graph.width),
            height: overrides.height.unwrap_or(file.graph.height),
            margin: overrides.margin.unwrap_or(file.graph.margin),
            read_timeout_ms: overrides
                .read_timeout_ms
                .unwrap_or(file.timing.read_timeout_ms),
            frame_interval_ms: overrides
                .frame_interval_ms
                .unwrap_or(file.timing.frame_interval_ms),
        }
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    /// - If any value is out of range; the message names the setting
    pub fn validate(&self) -> Result<ValidatedConfig> {
        if self.port.trim().is_empty() {
            bail!("Serial port must not be empty");
        }
        let baud_rate = BaudRate::try_from(self.baud_rate)?;

        let buffer = match self.buffer_size {
            BufferSize::Keyword(_) => BufferPolicy::Unbounded,
            BufferSize::Points(points) if points < MIN_CAPACITY => {
                bail!("Buffer size too small: {points} (minimum is {MIN_CAPACITY})")
            }
            BufferSize::Points(points) if points > MAX_CAPACITY => {
                bail!("Buffer size too large: {points} (maximum is {MAX_CAPACITY})")
            }
            BufferSize::Points(points) => BufferPolicy::Rolling(points),
        };

        check_range("Width", self.width, WIDTH_RANGE)?;
        check_range("Height", self.height, HEIGHT_RANGE)?;
        check_range("Margin", self.margin, MARGIN_RANGE)?;
        check_range("Read timeout (ms)", self.read_timeout_ms, TIMING_RANGE_MS)?;
        check_range("Frame interval (ms)", self.frame_interval_ms, TIMING_RANGE_MS)?;

        Ok(ValidatedConfig {
            port: self.port.clone(),
            baud_rate,
            buffer,
            geometry: CanvasGeometry::new(self.width, self.height, self.margin),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            frame_interval: Duration::from_millis(self.frame_interval_ms),
        })
    }
}

fn check_range<T>(name: &str, value: T, (min, max): (T, T)) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        bail!("{name} must be between {min} and {max}, got {value}");
    }
    Ok(())
}

/// Settings that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub port: String,
    pub baud_rate: BaudRate,
    pub buffer: BufferPolicy,
    pub geometry: CanvasGeometry,
    pub read_timeout: Duration,
    pub frame_interval: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> PlotConfig {
        PlotConfig::merge(SerplotConfig::default(), Overrides::default())
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = defaults().validate().unwrap();
        assert_eq!(config.port, "/dev/ttyS0");
        assert_eq!(config.baud_rate, BaudRate::B9600);
        assert_eq!(config.buffer, BufferPolicy::Rolling(1000));
        assert_eq!(config.geometry, CanvasGeometry::new(800, 600, 50));
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert_eq!(config.frame_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = SerplotConfig::default();
        file.serial.port = "/dev/ttyACM0".to_string();
        file.graph.width = 1024;

        let config = PlotConfig::merge(
            file,
            Overrides {
                port: Some("/dev/ttyUSB1".to_string()),
                buffer_size: Some(BufferSize::UNBOUNDED),
                ..Overrides::default()
            },
        );

        assert_eq!(config.port, "/dev/ttyUSB1");
        assert_eq!(config.width, 1024);
        assert_eq!(
            config.validate().unwrap().buffer,
            BufferPolicy::Unbounded
        );
    }

    #[test]
    fn test_baud_rate_must_be_supported() {
        assert_eq!(BaudRate::try_from(115200).unwrap(), BaudRate::B115200);
        let err = BaudRate::try_from(14400).unwrap_err();
        assert!(err.to_string().contains("Unsupported baud rate 14400"));
    }

    #[test]
    fn test_buffer_size_bounds() {
        let mut config = defaults();

        config.buffer_size = BufferSize::Points(9);
        assert!(config.validate().unwrap_err().to_string().contains("too small"));

        config.buffer_size = BufferSize::Points(100_001);
        assert!(config.validate().unwrap_err().to_string().contains("too large"));

        config.buffer_size = BufferSize::Points(10);
        assert_eq!(config.validate().unwrap().buffer, BufferPolicy::Rolling(10));

        config.buffer_size = BufferSize::Points(100_000);
        assert_eq!(
            config.validate().unwrap().buffer,
            BufferPolicy::Rolling(100_000)
        );
    }

    #[test]
    fn test_geometry_bounds() {
        let mut config = defaults();
        config.width = 199;
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "Width must be between 200 and 4096, got 199"
        );

        let mut config = defaults();
        config.height = 4097;
        assert!(config.validate().unwrap_err().to_string().starts_with("Height"));

        let mut config = defaults();
        config.margin = 201;
        assert!(config.validate().unwrap_err().to_string().starts_with("Margin"));
    }

    #[test]
    fn test_degenerate_layout_is_allowed() {
        let mut config = defaults();
        config.width = 200;
        config.height = 200;
        config.margin = 150;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_port_is_rejected() {
        let mut config = defaults();
        config.port = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
