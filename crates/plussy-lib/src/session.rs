//! Control session — the persistent TCP connection to the device.
//!
//! [`Session::connect`] opens the stream; [`Session::run`] is the blocking
//! receive loop and belongs to the network thread. [`SessionHandle`] is a
//! cheap clone of the stream used from other threads to send commands and to
//! close the connection.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::codec::{self, Frame};
use crate::error::Result;
use crate::protocol::MATRIX_PAYLOAD_LEN;

/// Longest reply line accepted, terminator excluded.
pub const MAX_LINE_LEN: usize = 4 * MATRIX_PAYLOAD_LEN;

/// Destination for encoded command lines.
///
/// Implemented by [`SessionHandle`]; tests substitute a recording sink.
pub trait CommandSink {
    /// Write one newline-terminated line and flush it.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Release the underlying connection. Must be idempotent.
    fn close(&mut self) {}
}

/// Why the receive loop returned.
#[derive(Debug)]
pub enum SessionEnd {
    /// The stop flag was set or the handle was closed.
    Stopped,
    /// The peer closed or reset the stream.
    Disconnected(crate::PlussyError),
}

/// Shareable send/close side of a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    stream: Arc<TcpStream>,
    closed: Arc<AtomicBool>,
    peer: SocketAddr,
}

impl SessionHandle {
    /// Write one line and flush.
    pub fn send(&self, line: &str) -> Result<()> {
        if self.is_closed() {
            return Err(crate::PlussyError::Disconnected);
        }
        let mut stream = &*self.stream;
        stream.write_all(line.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    /// Shut the stream down. Safe to call repeatedly; a reader blocked in
    /// [`Session::run`] wakes up with EOF.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            log::debug!("shutdown of {}: {e}", self.peer);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl CommandSink for SessionHandle {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.send(line)
    }

    fn close(&mut self) {
        SessionHandle::close(self);
    }
}

/// Receive side of a session.
#[derive(Debug)]
pub struct Session {
    reader: BufReader<TcpStream>,
    handle: SessionHandle,
    /// Bytes of a line whose terminator has not arrived yet.
    partial: Vec<u8>,
    /// Dropping the rest of an over-long line.
    discarding: bool,
}

impl Session {
    /// Open the control connection.
    ///
    /// Any failure (refused, unreachable, timeout) becomes `ConnectFailed`;
    /// the half-built stream is dropped before returning.
    pub fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, connect_timeout)
            .map_err(|e| crate::PlussyError::ConnectFailed(format!("{addr}: {e}")))?;
        Self::from_stream(stream, read_timeout)
            .map_err(|e| crate::PlussyError::ConnectFailed(format!("{addr}: {e}")))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> Result<Self> {
        stream.set_read_timeout(Some(read_timeout))?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let reader_stream = stream.try_clone()?;
        Ok(Session {
            reader: BufReader::new(reader_stream),
            handle: SessionHandle {
                stream: Arc::new(stream),
                closed: Arc::new(AtomicBool::new(false)),
                peer,
            },
            partial: Vec::new(),
            discarding: false,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Read one complete line, without its terminator.
    ///
    /// - `Ok(Some(line))` — a full line.
    /// - `Ok(None)` — the read timed out; any partial line is kept for the
    ///   next call.
    /// - `Err(MalformedFrame)` — the line grew past [`MAX_LINE_LEN`]. Its
    ///   bytes are dropped up to the next newline; the session stays usable.
    /// - `Err(Disconnected)` — EOF.
    /// - `Err(Io)` — any other read failure.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        // Never more than MAX_LINE_LEN + 1 buffered bytes per line.
        let room = (MAX_LINE_LEN + 1 - self.partial.len()) as u64;
        match (&mut self.reader).take(room).read_until(b'\n', &mut self.partial) {
            Ok(0) => Err(crate::PlussyError::Disconnected),
            Ok(_) if self.partial.last() == Some(&b'\n') => {
                let raw = std::mem::take(&mut self.partial);
                if std::mem::take(&mut self.discarding) {
                    return Ok(None);
                }
                let line = String::from_utf8_lossy(&raw);
                Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
            }
            Ok(_) if self.partial.len() > MAX_LINE_LEN => {
                self.partial.clear();
                if std::mem::replace(&mut self.discarding, true) {
                    return Ok(None);
                }
                Err(crate::PlussyError::MalformedFrame(format!(
                    "reply line longer than {MAX_LINE_LEN} bytes"
                )))
            }
            // EOF in the middle of a line; the next call reports it.
            Ok(_) => Ok(None),
            Err(e) if crate::error::is_timeout_kind(e.kind()) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Receive loop: decode every line and hand it to `on_frame` until
    /// `stop` is set, the handle is closed, or the stream fails.
    ///
    /// Read timeouts are the loop's heartbeat, not errors.
    pub fn run(
        &mut self,
        stop: &AtomicBool,
        mut on_frame: impl FnMut(Result<Frame>),
    ) -> SessionEnd {
        loop {
            if stop.load(Ordering::SeqCst) || self.handle.is_closed() {
                return SessionEnd::Stopped;
            }
            match self.read_line() {
                Ok(Some(line)) => on_frame(codec::decode_reply(&line)),
                Ok(None) => {}
                Err(e @ crate::PlussyError::MalformedFrame(_)) => on_frame(Err(e)),
                Err(e) => {
                    if stop.load(Ordering::SeqCst) || self.handle.is_closed() {
                        return SessionEnd::Stopped;
                    }
                    return SessionEnd::Disconnected(e);
                }
            }
        }
    }

    /// Close the session. Idempotent.
    pub fn close(&self) {
        self.handle.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.handle.close();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::Color;
    use std::io::Read;
    use std::net::TcpListener;
    use std::time::Instant;

    const READ: Duration = Duration::from_millis(20);

    /// Connected (session, device-side stream) pair on localhost.
    fn pair() -> (Session, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let session = Session::connect(addr, Duration::from_secs(1), READ).unwrap();
        let (device, _) = listener.accept().unwrap();
        (session, device)
    }

    fn read_line_blocking(session: &mut Session) -> Result<String> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(line) = session.read_line()? {
                return Ok(line);
            }
            assert!(Instant::now() < deadline, "timed out waiting for line");
        }
    }

    #[test]
    fn connect_refused_is_connect_failed() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let err = Session::connect(addr, Duration::from_millis(500), READ).unwrap_err();
        assert!(err.to_string().contains(&addr.to_string()));
        assert!(matches!(err, crate::PlussyError::ConnectFailed(_)));
    }

    #[test]
    fn send_writes_line() {
        let (session, mut device) = pair();
        session.handle().send("m00ff0000\n").unwrap();
        let mut buf = [0u8; 10];
        device.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"m00ff0000\n");
    }

    #[test]
    fn read_line_strips_terminators() {
        let (mut session, mut device) = pair();
        device.write_all(b"?\r\n").unwrap();
        assert_eq!(read_line_blocking(&mut session).unwrap(), "?");
    }

    #[test]
    fn read_timeout_yields_none() {
        let (mut session, _device) = pair();
        assert_eq!(session.read_line().unwrap(), None);
    }

    #[test]
    fn partial_line_survives_timeout() {
        let (mut session, mut device) = pair();
        device.write_all(b"hel").unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(session.read_line().unwrap(), None);
        device.write_all(b"lo\n").unwrap();
        assert_eq!(read_line_blocking(&mut session).unwrap(), "hello");
    }

    #[test]
    fn eof_is_disconnected() {
        let (mut session, device) = pair();
        drop(device);
        let err = read_line_blocking(&mut session).unwrap_err();
        assert!(matches!(err, crate::PlussyError::Disconnected));
    }

    #[test]
    fn run_decodes_frames_until_disconnect() {
        let (mut session, mut device) = pair();
        let line = format!("M{}\n?\nhello\n", "00ff00".repeat(20));
        device.write_all(line.as_bytes()).unwrap();
        drop(device);

        let stop = AtomicBool::new(false);
        let mut frames = Vec::new();
        let end = session.run(&stop, |f| frames.push(f));

        assert!(matches!(end, SessionEnd::Disconnected(_)));
        assert_eq!(frames.len(), 3);
        match &frames[0] {
            Ok(Frame::MatrixUpdate(snap)) => {
                assert!(snap.colors().iter().all(|&c| c == Color::GREEN))
            }
            other => panic!("expected MatrixUpdate, got {other:?}"),
        }
        assert!(matches!(frames[1], Ok(Frame::Rejected)));
        assert!(matches!(frames[2], Ok(Frame::Unrecognized(_))));
    }

    #[test]
    fn run_reports_malformed_frame_and_continues() {
        let (mut session, mut device) = pair();
        device.write_all(b"Mff\n?\n").unwrap();
        drop(device);

        let stop = AtomicBool::new(false);
        let mut frames = Vec::new();
        session.run(&stop, |f| frames.push(f));
        assert!(matches!(
            frames[0],
            Err(crate::PlussyError::MalformedFrame(_))
        ));
        assert!(matches!(frames[1], Ok(Frame::Rejected)));
    }

    #[test]
    fn overlong_line_is_malformed_and_skipped() {
        let (mut session, mut device) = pair();
        let junk = "x".repeat(3 * MAX_LINE_LEN);
        device.write_all(junk.as_bytes()).unwrap();
        device.write_all(b"\n?\n").unwrap();
        drop(device);

        let stop = AtomicBool::new(false);
        let mut frames = Vec::new();
        let end = session.run(&stop, |f| frames.push(f));

        assert!(matches!(end, SessionEnd::Disconnected(_)));
        assert_eq!(frames.len(), 2, "got {frames:?}");
        assert!(matches!(
            frames[0],
            Err(crate::PlussyError::MalformedFrame(_))
        ));
        assert!(matches!(frames[1], Ok(Frame::Rejected)));
    }

    #[test]
    fn partial_line_stays_bounded() {
        let (mut session, mut device) = pair();
        device
            .write_all("y".repeat(MAX_LINE_LEN + 50).as_bytes())
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let err = loop {
            match session.read_line() {
                Ok(None) => assert!(Instant::now() < deadline, "no overflow reported"),
                Ok(Some(line)) => panic!("unexpected line {line:?}"),
                Err(e) => break e,
            }
            assert!(session.partial.len() <= MAX_LINE_LEN + 1);
        };
        assert!(matches!(err, crate::PlussyError::MalformedFrame(_)));
        assert!(session.partial.len() <= MAX_LINE_LEN + 1);
    }

    #[test]
    fn run_returns_stopped_when_flag_set() {
        let (mut session, _device) = pair();
        let stop = AtomicBool::new(true);
        assert!(matches!(session.run(&stop, |_| {}), SessionEnd::Stopped));
    }

    #[test]
    fn close_unblocks_run_from_other_thread() {
        let (mut session, _device) = pair();
        let handle = session.handle();
        let start = Instant::now();
        let worker = std::thread::spawn(move || {
            let stop = AtomicBool::new(false);
            session.run(&stop, |_| {})
        });
        std::thread::sleep(Duration::from_millis(50));
        handle.close();
        let end = worker.join().unwrap();
        assert!(matches!(end, SessionEnd::Stopped));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn close_is_idempotent() {
        let (session, _device) = pair();
        session.close();
        session.close();
        assert!(session.handle().is_closed());
        assert!(matches!(
            session.handle().send("r\n"),
            Err(crate::PlussyError::Disconnected)
        ));
    }

    #[test]
    fn recording_sink_records_until_closed() {
        let mut sink = mock::RecordingSink::default();
        let observer = sink.clone();
        sink.send_line("r\n").unwrap();
        CommandSink::close(&mut sink);
        assert!(sink.send_line("r\n").is_err());
        assert_eq!(observer.lines(), vec!["r\n".to_string()]);
    }
}
