//! Frame codec — text lines to and from typed messages. No I/O.
//!
//! Encoded commands carry their trailing newline so they can be written to
//! the stream as-is. Decoding expects a line with the terminator already
//! stripped.

use crate::error::Result;
use crate::led::{Color, LedIndex, MatrixSnapshot};
use crate::protocol::*;

/// Outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetLed { led: LedIndex, color: Color },
    RequestState,
}

impl Command {
    /// Encode as one newline-terminated line.
    pub fn encode(&self) -> String {
        match *self {
            Command::SetLed { led, color } => {
                format!("{CMD_SET_LED}{:02x}{:06x}\n", led.get(), color.rgb24())
            }
            Command::RequestState => format!("{CMD_REQUEST_STATE}\n"),
        }
    }
}

/// Decoded inbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Zero-length line.
    Empty,
    /// The device rejected the previous command.
    Rejected,
    /// Full (`M`) or partial (`R`) matrix broadcast; both carry all 20 LEDs.
    MatrixUpdate(MatrixSnapshot),
    /// Anything else, kept for diagnostics.
    Unrecognized(String),
}

/// Encode a set-LED command, validating the index.
pub fn encode_set_led(led: u8, color: Color) -> Result<String> {
    let led = LedIndex::new(led)?;
    Ok(Command::SetLed { led, color }.encode())
}

/// Encode the request-state command.
pub fn encode_request_state() -> String {
    Command::RequestState.encode()
}

/// Classify one reply line.
pub fn decode_reply(line: &str) -> Result<Frame> {
    if line.is_empty() {
        return Ok(Frame::Empty);
    }
    if line == REPLY_REJECTED {
        return Ok(Frame::Rejected);
    }
    if line.contains([REPLY_FULL_UPDATE, REPLY_PARTIAL_UPDATE]) {
        return parse_matrix_update(line).map(Frame::MatrixUpdate);
    }
    Ok(Frame::Unrecognized(line.to_string()))
}

/// Strip the leading marker and parse 20 consecutive `rrggbb` triples.
fn parse_matrix_update(line: &str) -> Result<MatrixSnapshot> {
    let mut chars = line.chars();
    chars.next();
    let payload = chars.as_str();

    if payload.len() != MATRIX_PAYLOAD_LEN {
        return Err(crate::PlussyError::MalformedFrame(format!(
            "matrix payload is {} characters, expected {MATRIX_PAYLOAD_LEN}",
            payload.len()
        )));
    }
    if let Some(bad) = payload.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(crate::PlussyError::MalformedFrame(format!(
            "non-hex character {bad:?} in matrix payload"
        )));
    }

    let mut colors = [Color::BLACK; LED_COUNT];
    for (i, slot) in colors.iter_mut().enumerate() {
        let chunk = &payload[i * HEX_PER_LED..(i + 1) * HEX_PER_LED];
        let rgb = u32::from_str_radix(chunk, 16).map_err(|e| {
            crate::PlussyError::MalformedFrame(format!("LED {i}: {chunk}: {e}"))
        })?;
        *slot = Color::from_rgb24(rgb);
    }
    Ok(MatrixSnapshot::new(colors))
}
