//! `watch` subcommand — stay connected and report what the device sends.
//!
//! The controller gives up after a failure; this loop restarts it with
//! exponential backoff until Ctrl+C. Restarts are driven by the `Failed`
//! events themselves, never by polling the phase.

use std::sync::atomic::Ordering;
use std::sync::mpsc::RecvTimeoutError;

use super::link::{Event, subscribe};
use super::{
    Config, ConnectionState, DisplayController, MatrixSnapshot, POLL, RUNNING, Reconnector,
    Result, WatchEventJson,
};

/// One-line rendering of a snapshot: the 20 colors in LED order.
fn format_snapshot(snapshot: &MatrixSnapshot) -> String {
    snapshot
        .iter()
        .map(|(_, color)| color.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_json_line(event: &WatchEventJson) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => log::warn!("JSON serialization failed: {e}"),
    }
}

/// Report one event and feed connection outcomes into the backoff state.
fn handle_event(
    event: Event,
    controller: &DisplayController,
    backoff: &mut Reconnector,
    json: bool,
) {
    match event {
        Event::Connection(state) => {
            let device = controller.server_address().map(|a| a.to_string());
            let delay = backoff.observe(state).unwrap_or_default();
            if json {
                print_json_line(&WatchEventJson::Connection { state, device });
                return;
            }
            match state {
                ConnectionState::Established => println!(
                    "[device] connected to {}",
                    device.as_deref().unwrap_or("unknown")
                ),
                ConnectionState::Failed => println!(
                    "[device] connection failed, retrying in {:.1}s",
                    delay.as_secs_f32()
                ),
                ConnectionState::NotConnected => println!("[device] not connected"),
            }
        }
        Event::Matrix(leds) => {
            if json {
                print_json_line(&WatchEventJson::Matrix { leds });
            } else {
                println!("  {}", format_snapshot(&leds));
            }
        }
    }
}

pub(super) fn cmd_watch(config: &Config, json: bool) -> Result<()> {
    let controller = DisplayController::new(config.network());
    let events = subscribe(&controller);
    let mut backoff = Reconnector::new(config.reconnect());

    controller.start()?;
    if !json {
        println!(
            "Waiting for device on port {}... (Ctrl+C to stop)",
            config.port
        );
    }

    while RUNNING.load(Ordering::SeqCst) {
        match events.recv_timeout(POLL) {
            Ok(event) => handle_event(event, &controller, &mut backoff, json),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        backoff.poll(&controller);
    }

    controller.stop();
    if !json {
        println!();
        println!("Stopped.");
    }
    Ok(())
}
