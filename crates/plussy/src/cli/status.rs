//! `status` subcommand — connect and show the matrix state.

use super::link::Link;
use super::{
    Config, ConnectionState, LED_KEYS, MatrixSnapshot, Options, Result, StatusOutput, kv, kv_width,
    print_leds,
};

/// Print or serialize the status output.
fn print_status(output: &StatusOutput, json: bool) -> Result<()> {
    if json {
        return super::print_json(output);
    }

    let w = kv_width(&["Version:", "Device:", "Connection:", "Error:"], LED_KEYS);
    kv("Version:", &output.version, w);
    match &output.device {
        Some(device) => kv("Device:", device, w),
        None => kv("Device:", "NOT FOUND", w),
    }
    kv("Connection:", output.connection, w);
    if let Some(ref error) = output.error {
        kv("Error:", error, w);
    }
    if let Some(ref leds) = output.leds {
        println!();
        print_leds(leds, w);
    }
    Ok(())
}

fn collect_status(connected: Result<(String, MatrixSnapshot)>) -> StatusOutput {
    let version = env!("CARGO_PKG_VERSION").to_string();
    match connected {
        Ok((device, leds)) => StatusOutput {
            version,
            device: Some(device),
            connection: ConnectionState::Established,
            error: None,
            leds: Some(leds),
        },
        Err(e) => StatusOutput {
            version,
            device: None,
            connection: ConnectionState::Failed,
            error: Some(e.to_string()),
            leds: None,
        },
    }
}

pub(super) fn cmd_status(config: &Config, opts: &Options) -> Result<()> {
    let connected =
        Link::open(config, opts.timeout).map(|(link, snapshot)| (link.device(), snapshot));
    print_status(&collect_status(connected), opts.json)
}
