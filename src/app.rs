//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing, configuration merging and validation,
//! and delegates to the appropriate command handler.

use crate::commands;
use crate::config::{BufferSize, Overrides, PlotConfig, SerplotConfig, ValidatedConfig};
use crate::logging;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// Exit code for invalid configuration, matching clap's usage errors.
const EXIT_CONFIG_ERROR: i32 = 2;

/// Real-time plotter for x,y CSV data arriving on a serial port
#[derive(Parser)]
#[command(name = "serplot")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "Reads CSV data (x,y pairs, one per line) from a serial port and displays a \
real-time graph in the terminal.\n\nWhen the buffer size is reached, the oldest points are \
removed (rolling buffer). Press q or Esc to quit.\n\nEXAMPLES:\n    $ serplot -p /dev/ttyUSB0 -b 115200 -s 500\n    \
$ serplot --port /dev/ttyACM0 --buffer-size 2000 --width 1024 --height 768\n    \
$ serplot --buffer-size unbounded\n    $ some-sensor | serplot -p -")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/serplot/serplot.toml (optional)\n    Logs:               ~/.local/state/serplot/serplot.log.*"
)]
struct Cli {
    #[command(flatten)]
    plot: PlotArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options for the plot command; each overrides the config file.
#[derive(Args, Debug, Clone, Default)]
struct PlotArgs {
    /// Serial port device, or "-" for stdin (default: /dev/ttyS0)
    #[arg(short, long, value_name = "PORT")]
    port: Option<String>,

    /// Baud rate: 9600, 19200, 38400, 57600, 115200 (default: 9600)
    #[arg(short, long, value_name = "BAUD")]
    baud: Option<u32>,

    /// Maximum number of points kept (10-100000), or "unbounded" (default: 1000)
    #[arg(short = 's', long, value_name = "SIZE")]
    buffer_size: Option<BufferSize>,

    /// Graph width in pixels, 200-4096 (default: 800)
    #[arg(short = 'W', long, value_name = "WIDTH")]
    width: Option<u32>,

    /// Graph height in pixels, 200-4096 (default: 600)
    #[arg(short = 'H', long, value_name = "HEIGHT")]
    height: Option<u32>,

    /// Graph margin in pixels, 10-200 (default: 50)
    #[arg(short, long, value_name = "MARGIN")]
    margin: Option<u32>,

    /// Longest wait for serial input per read, in milliseconds (default: 1000)
    #[arg(long, value_name = "MS")]
    read_timeout_ms: Option<u64>,

    /// Delay between frames in milliseconds (default: 50, ~20 FPS)
    #[arg(long, value_name = "MS")]
    frame_interval_ms: Option<u64>,

    /// Config file to use instead of ~/.config/serplot/serplot.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl PlotArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port.clone(),
            baud_rate: self.baud,
            buffer_size: self.buffer_size,
            width: self.width,
            height: self.height,
            margin: self.margin,
            read_timeout_ms: self.read_timeout_ms,
            frame_interval_ms: self.frame_interval_ms,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Plot serial CSV data in real time (default)
    #[command(visible_alias = "p")]
    Plot(PlotArgs),

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   serplot completions bash > serplot.bash
    ///   serplot completions zsh > _serplot
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Merges the config file with CLI overrides and validates the result.
///
/// # Errors
/// - If the config file cannot be loaded
/// - If any merged value is out of range
fn resolve_config(args: &PlotArgs) -> Result<ValidatedConfig, anyhow::Error> {
    let file = SerplotConfig::load(args.config.as_deref())?;
    PlotConfig::merge(file, args.overrides()).validate()
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: Display or runtime error
/// - 2: Usage or configuration error
///
/// # Errors
/// - If logging initialization fails
/// - If the plot command fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let args = match cli.command {
        Some(Commands::Completions { shell }) => {
            generate(shell, &mut Cli::command(), "serplot", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Plot(args)) => args,
        None => cli.plot,
    };

    // Validate before any log file, device or terminal is opened
    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(EXIT_CONFIG_ERROR);
        }
    };

    logging::init_logging()?;

    commands::handle_plot(config).await
}
