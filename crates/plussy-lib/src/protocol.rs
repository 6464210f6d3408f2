//! Protocol constants for the Plussy LED matrix.
//!
//! The device announces itself with UDP broadcasts and accepts a TCP control
//! connection on the same port. Control traffic is newline-terminated ASCII:
//!
//! | Direction | Line                | Meaning                     |
//! |-----------|---------------------|-----------------------------|
//! | out       | `m<ll><rrggbb>`     | set LED `ll` (hex) to color |
//! | out       | `r`                 | request full matrix state   |
//! | in        | `?`                 | previous command rejected   |
//! | in        | `M<120 hex>`        | full matrix snapshot        |
//! | in        | `R<120 hex>`        | partial matrix snapshot     |

use std::net::Ipv4Addr;
use std::time::Duration;

// ── Network ──

/// Port used for both the discovery broadcast and the control connection.
pub const PORT: u16 = 60000;

/// Announcements are sent to the limited broadcast address.
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Substring that identifies a device announcement datagram.
pub const DISCOVERY_MARKER: &str = "plussyDisplay";

/// Receive buffer for one announcement datagram.
pub const DISCOVERY_BUFFER_SIZE: usize = 512;

/// Bounded wait for a single discovery attempt.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded wait for the TCP handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Read timeout on the control stream. Kept short so the receive loop
/// notices a stop request quickly.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

// ── Matrix ──

/// Number of LEDs on the matrix.
pub const LED_COUNT: usize = 20;

/// Hex digits per LED in a matrix reply (`rrggbb`).
pub const HEX_PER_LED: usize = 6;

/// Payload length of a matrix reply after the marker character.
pub const MATRIX_PAYLOAD_LEN: usize = LED_COUNT * HEX_PER_LED;

// ── Line markers ──

/// Prefix of the set-LED command.
pub const CMD_SET_LED: char = 'm';

/// The request-state command.
pub const CMD_REQUEST_STATE: char = 'r';

/// Reply sent when the device could not parse the previous command.
pub const REPLY_REJECTED: &str = "?";

/// Marker of a full matrix snapshot.
pub const REPLY_FULL_UPDATE: char = 'M';

/// Marker of a partial matrix snapshot.
pub const REPLY_PARTIAL_UPDATE: char = 'R';
