//! Blocking wrapper around [`DisplayController`] for one-shot commands.
//!
//! Controller callbacks run on the network thread; they only forward into an
//! mpsc channel, and the CLI thread waits on it with a deadline.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use super::{
    Config, ConnectionState, DisplayController, MatrixSnapshot, POLL, Phase, PlussyError, RUNNING,
    Result,
};

/// Something the network thread reported.
#[derive(Debug)]
pub(super) enum Event {
    Connection(ConnectionState),
    Matrix(MatrixSnapshot),
}

/// Forward both controller callbacks into a channel.
pub(super) fn subscribe(controller: &DisplayController) -> Receiver<Event> {
    let (tx, rx) = mpsc::channel();
    let matrix_tx = tx.clone();
    controller.set_on_connection_changed(move |state| {
        let _ = tx.send(Event::Connection(state));
    });
    controller.set_on_matrix_state(move |snapshot| {
        let _ = matrix_tx.send(Event::Matrix(snapshot.clone()));
    });
    rx
}

/// An established connection plus its event stream.
pub(super) struct Link {
    controller: DisplayController,
    events: Receiver<Event>,
    timeout: Duration,
}

impl Link {
    /// Discover the device, connect, and wait for the reply to the initial
    /// state request.
    pub fn open(config: &Config, timeout: Duration) -> Result<(Self, MatrixSnapshot)> {
        let controller = DisplayController::new(config.network());
        let events = subscribe(&controller);
        controller.start()?;

        let link = Link {
            controller,
            events,
            timeout,
        };
        link.wait(|event| match event {
            Event::Connection(ConnectionState::Established) => Some(Ok(())),
            Event::Connection(ConnectionState::Failed) => Some(Err(PlussyError::ConnectFailed(
                "connection attempt failed (run with -v for details)".into(),
            ))),
            _ => None,
        })?;
        log::debug!("connected, waiting for initial matrix state");
        let snapshot = link.next_snapshot()?;
        Ok((link, snapshot))
    }

    pub fn controller(&self) -> &DisplayController {
        &self.controller
    }

    /// Device address, `ip:port`.
    pub fn device(&self) -> String {
        self.controller
            .server_address()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".into())
    }

    /// Wait for the next matrix reply.
    pub fn next_snapshot(&self) -> Result<MatrixSnapshot> {
        self.wait(|event| match event {
            Event::Matrix(snapshot) => Some(Ok(snapshot)),
            Event::Connection(ConnectionState::Failed) => Some(Err(PlussyError::Disconnected)),
            Event::Connection(_) => None,
        })
    }

    /// Feed events to `on_event` until it returns a result, the deadline
    /// passes, or Ctrl+C is pressed.
    fn wait<T>(&self, mut on_event: impl FnMut(Event) -> Option<Result<T>>) -> Result<T> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if !RUNNING.load(Ordering::SeqCst) {
                return Err(PlussyError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(self.timeout_error());
            }
            match self.events.recv_timeout(POLL.min(deadline - now)) {
                Ok(event) => {
                    if let Some(result) = on_event(event) {
                        return result;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(PlussyError::Disconnected),
            }
        }
    }

    fn timeout_error(&self) -> PlussyError {
        let secs = self.timeout.as_secs_f32();
        match self.controller.phase() {
            Phase::Discovering | Phase::Idle => PlussyError::DiscoveryTimeout,
            Phase::Connecting => PlussyError::ConnectFailed(format!("no connection within {secs}s")),
            Phase::Established | Phase::Failed => PlussyError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no reply from device within {secs}s"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plussy_lib::config::NetworkSettings;
    use plussy_lib::led::Color;

    fn link_with(timeout: Duration) -> (Link, mpsc::Sender<Event>) {
        let (tx, rx) = mpsc::channel();
        let link = Link {
            controller: DisplayController::new(NetworkSettings::default()),
            events: rx,
            timeout,
        };
        (link, tx)
    }

    #[test]
    fn next_snapshot_skips_connection_noise() {
        let (link, tx) = link_with(Duration::from_secs(2));
        tx.send(Event::Connection(ConnectionState::Established))
            .unwrap();
        tx.send(Event::Matrix(MatrixSnapshot::new([Color::RED; 20])))
            .unwrap();
        let snap = link.next_snapshot().unwrap();
        assert!(snap.iter().all(|(_, c)| c == Color::RED));
    }

    #[test]
    fn next_snapshot_fails_on_disconnect() {
        let (link, tx) = link_with(Duration::from_secs(2));
        tx.send(Event::Connection(ConnectionState::Failed)).unwrap();
        assert!(matches!(
            link.next_snapshot(),
            Err(PlussyError::Disconnected)
        ));
    }

    #[test]
    fn wait_times_out() {
        let (link, _tx) = link_with(Duration::from_millis(50));
        let start = Instant::now();
        let err = link.next_snapshot().unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(1));
        // Controller never started, so the deadline is blamed on discovery
        assert!(matches!(err, PlussyError::DiscoveryTimeout));
    }

    #[test]
    fn closed_channel_is_a_disconnect() {
        let (link, tx) = link_with(Duration::from_secs(2));
        drop(tx);
        assert!(matches!(
            link.next_snapshot(),
            Err(PlussyError::Disconnected)
        ));
    }

    #[test]
    fn device_unknown_before_discovery() {
        let (link, _tx) = link_with(Duration::from_secs(1));
        assert_eq!(link.device(), "unknown");
    }
}
