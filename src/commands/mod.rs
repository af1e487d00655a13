//! Application command handlers for serplot.
//!
//! # Commands
//! - `plot`: Live plot of serial CSV data (default)
//! - `logs`: Display recent log entries

pub mod logs;
pub mod plot;

pub use logs::handle_logs;
pub use plot::handle_plot;
