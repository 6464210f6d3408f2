//! CLI subcommands — discovery, status, LED control, watching.

mod config_cmd;
mod discover;
mod link;
mod set;
mod status;
mod watch;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use plussy_lib::PlussyError;
pub(super) use plussy_lib::config::Config;
pub(super) use plussy_lib::controller::{ConnectionState, DisplayController, Phase};
pub(super) use plussy_lib::error::Result;
pub(super) use plussy_lib::led::{Color, LedIndex, MatrixSnapshot};
pub(super) use plussy_lib::reconnect::Reconnector;

/// Granularity of blocking waits, so Ctrl+C is noticed promptly.
pub(super) const POLL: Duration = Duration::from_millis(100);

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{key:<width$}{value}", width = w);
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

/// Indent keys used by [`print_leds`], for `kv_width`.
pub(super) const LED_KEYS: &[&str] = &["LED 19:"];

/// Print all 20 LED colors, one per line.
pub(super) fn print_leds(snapshot: &MatrixSnapshot, w: usize) {
    println!("LEDs:");
    for (led, color) in snapshot.iter() {
        kv_indent(&format!("LED {led}:"), color, w);
    }
}

/// Pretty-print a JSON document to stdout.
pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| PlussyError::Config(format!("JSON serialization failed: {e}")))?;
    println!("{json_str}");
    Ok(())
}

/// Load the config from `custom_path` or the default location, logging parse
/// warnings and validation errors.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    let (config, warnings) = match custom_path {
        Some(path) => Config::load_from(path),
        None => Config::load_with_warnings(),
    };
    for w in &warnings {
        log::warn!("[config] {w}");
    }
    if let Err(errors) = config.validate() {
        for e in &errors {
            log::warn!("[config] {e}");
        }
    }
    config
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct DiscoverOutput {
    pub address: String,
    pub port: u16,
}

#[derive(Serialize)]
pub(super) struct StatusOutput {
    pub version: String,
    pub device: Option<String>,
    pub connection: ConnectionState,
    pub error: Option<String>,
    pub leds: Option<MatrixSnapshot>,
}

#[derive(Serialize)]
pub(super) struct SetOutput {
    pub device: String,
    pub led: Option<LedIndex>,
    pub color: Color,
    pub leds: MatrixSnapshot,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(super) enum WatchEventJson {
    Connection {
        state: ConnectionState,
        device: Option<String>,
    },
    Matrix {
        leds: MatrixSnapshot,
    },
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub errors: Vec<String>,
}

/// Global options shared by every subcommand.
pub struct Options {
    pub json: bool,
    pub config_path: Option<PathBuf>,
    pub timeout: Duration,
}

#[derive(Subcommand)]
pub enum Command {
    /// Wait for a device announcement and print its address
    Discover,

    /// Connect and show the connection state and LED colors
    Status,

    /// Set one LED and show the resulting matrix
    Set {
        /// LED index (0-19)
        led: u8,
        /// Color: #RRGGBB, RRGGBB or a name (red, green, blue, white, orange, yellow, purple, cyan, off)
        color: Color,
    },

    /// Set every LED to one color
    Fill {
        /// Color: #RRGGBB, RRGGBB or a name
        color: Color,
    },

    /// Stay connected and print connection changes and LED snapshots
    Watch,

    /// Show current configuration and file path
    Config,
}

pub fn run(cmd: Command, opts: &Options) -> Result<()> {
    let config_path = opts.config_path.as_deref();
    match cmd {
        Command::Discover => discover::cmd_discover(&load_config(config_path), opts),
        Command::Status => status::cmd_status(&load_config(config_path), opts),
        Command::Set { led, color } => {
            // Reject a bad index before touching the network
            let led = LedIndex::new(led)?;
            set::cmd_set(&load_config(config_path), led, color, opts)
        }
        Command::Fill { color } => set::cmd_fill(&load_config(config_path), color, opts),
        Command::Watch => watch::cmd_watch(&load_config(config_path), opts.json),
        Command::Config => config_cmd::cmd_config(opts.json, config_path),
    }
}
