//! Configuration file handling for serplot.
//!
//! The file is optional. Every field has a default, so a missing file, a missing
//! section, or a missing key all fall back to the built-in values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: &str = "/dev/ttyS0";
pub const DEFAULT_BAUD: u32 = 9600;
pub const DEFAULT_BUFFER_SIZE: usize = 1000;
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;
pub const DEFAULT_MARGIN: u32 = 50;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 50;

/// Buffer size as written in the file or on the command line: a number of
/// points, or the word `unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BufferSize {
    Points(usize),
    Keyword(BufferKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKeyword {
    Unbounded,
}

impl BufferSize {
    pub const UNBOUNDED: BufferSize = BufferSize::Keyword(BufferKeyword::Unbounded);
}

impl std::str::FromStr for BufferSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::UNBOUNDED);
        }
        s.parse::<usize>()
            .map(Self::Points)
            .map_err(|_| format!("expected a number of points or 'unbounded', got '{s}'"))
    }
}

/// Serial input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    /// Device path, or "-" for standard input
    pub port: String,
    /// One of 9600, 19200, 38400, 57600, 115200
    pub baud_rate: u32,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD,
        }
    }
}

/// Sample buffer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSection {
    /// Rolling capacity (10-100000) or "unbounded"
    pub size: BufferSize,
}

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            size: BufferSize::Points(DEFAULT_BUFFER_SIZE),
        }
    }
}

/// Canvas settings, in pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSection {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            margin: DEFAULT_MARGIN,
        }
    }
}

/// Loop timing, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    /// Longest single wait for serial input before re-checking for shutdown
    pub read_timeout_ms: u64,
    /// Pause between rendered frames
    pub frame_interval_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

/// Complete configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SerplotConfig {
    pub serial: SerialSection,
    pub buffer: BufferSection,
    pub graph: GraphSection,
    pub timing: TimingSection,
}

impl SerplotConfig {
    /// Loads the file at `path`, or the default location when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an
    /// error.
    ///
    /// # Errors
    /// - If an explicitly given file does not exist
    /// - If the file cannot be read
    /// - If the TOML is malformed
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_config_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {e}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// `~/.config/serplot/serplot.toml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("serplot").join("serplot.toml"))
}
