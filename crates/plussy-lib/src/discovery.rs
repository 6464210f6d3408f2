//! Device discovery — wait for the matrix's UDP announcement.
//!
//! The device periodically broadcasts a datagram containing
//! [`DISCOVERY_MARKER`](crate::protocol::DISCOVERY_MARKER) on the control
//! port. Whoever sent it is the device; its control port is the same
//! well-known port.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::Result;
use crate::protocol::DISCOVERY_BUFFER_SIZE;

/// Pause after a hard socket error so a persistent failure can't spin.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Bound UDP endpoint listening for announcements.
pub struct Discovery {
    socket: UdpSocket,
    marker: String,
    buffer: [u8; DISCOVERY_BUFFER_SIZE],
}

impl Discovery {
    /// Bind a broadcast-capable socket on `port` (all interfaces).
    ///
    /// `SO_REUSEADDR` lets a restarted controller rebind the port at once.
    pub fn bind(port: u16, attempt_timeout: Duration, marker: &str) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_broadcast(true)?;
        socket.set_reuse_address(true)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&SockAddr::from(bind_addr))?;
        socket.set_read_timeout(Some(attempt_timeout))?;

        Ok(Discovery {
            socket: socket.into(),
            marker: marker.to_string(),
            buffer: [0u8; DISCOVERY_BUFFER_SIZE],
        })
    }

    /// Local address the socket ended up bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// One bounded receive.
    ///
    /// - `Ok(Some(ip))` — an announcement from `ip`.
    /// - `Ok(None)` — a datagram arrived but it was not an announcement.
    /// - `Err(DiscoveryTimeout)` — nothing arrived within the attempt timeout.
    /// - `Err(Io)` — any other socket error.
    pub fn poll_once(&mut self) -> Result<Option<IpAddr>> {
        let (len, src) = match self.socket.recv_from(&mut self.buffer) {
            Ok(r) => r,
            Err(e) if crate::error::is_timeout_kind(e.kind()) => {
                return Err(crate::PlussyError::DiscoveryTimeout);
            }
            Err(e) => return Err(e.into()),
        };
        let payload = String::from_utf8_lossy(&self.buffer[..len]);
        if payload.trim().contains(self.marker.as_str()) {
            Ok(Some(src.ip()))
        } else {
            log::trace!("ignoring datagram from {src}: {:?}", payload.trim());
            Ok(None)
        }
    }

    /// Receive until an announcement arrives or `cancel` is set.
    ///
    /// `cancel` is checked between attempts, so the worst-case latency of a
    /// cancel is one attempt timeout. Timeouts and socket errors never end
    /// the loop; errors are logged.
    pub fn discover(&mut self, cancel: &AtomicBool) -> Result<IpAddr> {
        while !cancel.load(Ordering::SeqCst) {
            match self.poll_once() {
                Ok(Some(ip)) => {
                    log::debug!("device announcement from {ip}");
                    return Ok(ip);
                }
                Ok(None) => {}
                Err(crate::PlussyError::DiscoveryTimeout) => {
                    log::trace!("no announcement yet, retrying");
                }
                Err(e) => {
                    log::warn!("could not receive announcement: {e}");
                    std::thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        Err(crate::PlussyError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    const MARKER: &str = "plussyDisplay";

    fn bind_ephemeral(timeout: Duration) -> (Discovery, u16) {
        let d = Discovery::bind(0, timeout, MARKER).unwrap();
        let port = d.local_addr().unwrap().port();
        (d, port)
    }

    fn send(port: u16, payload: &[u8]) {
        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
        tx.send_to(payload, ("127.0.0.1", port)).unwrap();
    }

    #[test]
    fn poll_once_times_out() {
        let (mut d, _) = bind_ephemeral(Duration::from_millis(20));
        assert!(matches!(
            d.poll_once(),
            Err(crate::PlussyError::DiscoveryTimeout)
        ));
    }

    #[test]
    fn poll_once_finds_announcement() {
        let (mut d, port) = bind_ephemeral(Duration::from_secs(2));
        send(port, b"hello plussyDisplay v1\0\0\0");
        let ip = d.poll_once().unwrap();
        assert_eq!(ip, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn poll_once_ignores_other_datagrams() {
        let (mut d, port) = bind_ephemeral(Duration::from_secs(2));
        send(port, b"someOtherDevice");
        assert_eq!(d.poll_once().unwrap(), None);
    }

    #[test]
    fn discover_skips_noise_then_returns() {
        let (mut d, port) = bind_ephemeral(Duration::from_secs(2));
        send(port, b"noise");
        send(port, b"plussyDisplay");
        let cancel = AtomicBool::new(false);
        let ip = d.discover(&cancel).unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn discover_returns_cancelled_when_flag_preset() {
        let (mut d, _) = bind_ephemeral(Duration::from_millis(20));
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            d.discover(&cancel),
            Err(crate::PlussyError::Cancelled)
        ));
    }

    #[test]
    fn discover_observes_cancel_within_one_attempt() {
        let (mut d, _) = bind_ephemeral(Duration::from_millis(50));
        let cancel = Arc::new(AtomicBool::new(false));
        let c2 = Arc::clone(&cancel);
        let start = Instant::now();
        let handle = std::thread::spawn(move || d.discover(&c2));
        std::thread::sleep(Duration::from_millis(120));
        cancel.store(true, Ordering::SeqCst);
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(crate::PlussyError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn custom_marker() {
        let mut d = Discovery::bind(0, Duration::from_secs(2), "myMatrix").unwrap();
        let port = d.local_addr().unwrap().port();
        send(port, b"plussyDisplay");
        assert_eq!(d.poll_once().unwrap(), None);
        send(port, b"myMatrix");
        assert!(d.poll_once().unwrap().is_some());
    }
}
