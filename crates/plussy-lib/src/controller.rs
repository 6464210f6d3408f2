//! Display controller — the API front ends drive.
//!
//! [`DisplayController::start`] spawns one network thread that runs
//! discovery, connects, and then sits in the session's receive loop.
//! Everything the network thread and callers share (phase, stream writer,
//! flow-control gate) lives behind a single mutex. Callbacks fire only from
//! the network thread, never while that mutex is held, so a callback may call
//! back into the controller.
//!
//! The controller never reconnects on its own; after `Failed` the caller
//! decides whether to `start()` again (see [`crate::reconnect`]).

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use serde::Serialize;

use crate::codec::{Command, Frame};
use crate::config::NetworkSettings;
use crate::discovery::Discovery;
use crate::error::Result;
use crate::flow::{CommandGate, GateAction, PendingCommand};
use crate::led::{Color, LedIndex, MatrixSnapshot};
use crate::session::{CommandSink, Session, SessionEnd};

/// Connection state as seen by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    NotConnected,
    Established,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::NotConnected => write!(f, "not connected"),
            ConnectionState::Established => write!(f, "established"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Controller lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Discovering,
    Connecting,
    Established,
    Failed,
}

impl Phase {
    pub fn connection_state(self) -> ConnectionState {
        match self {
            Phase::Established => ConnectionState::Established,
            Phase::Failed => ConnectionState::Failed,
            Phase::Idle | Phase::Discovering | Phase::Connecting => ConnectionState::NotConnected,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Discovering => write!(f, "discovering"),
            Phase::Connecting => write!(f, "connecting"),
            Phase::Established => write!(f, "established"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

pub type ConnectionCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;
pub type MatrixCallback = Arc<dyn Fn(&MatrixSnapshot) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    on_connection: Option<ConnectionCallback>,
    on_matrix: Option<MatrixCallback>,
}

struct Inner {
    phase: Phase,
    sink: Option<Box<dyn CommandSink + Send>>,
    gate: CommandGate,
    server: Option<SocketAddr>,
    last_snapshot: Option<MatrixSnapshot>,
}

impl Inner {
    fn new() -> Self {
        Inner {
            phase: Phase::Idle,
            sink: None,
            gate: CommandGate::new(),
            server: None,
            last_snapshot: None,
        }
    }

    fn send(&mut self, cmd: Command) {
        let Some(sink) = self.sink.as_mut() else {
            log::debug!("no connection, dropping {cmd:?}");
            return;
        };
        if let Err(e) = sink.send_line(&cmd.encode()) {
            log::warn!("could not send {cmd:?}: {e}");
        }
    }

    /// Close and forget the connection and its flow-control state.
    fn disconnect(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.close();
        }
        self.gate.reset();
    }
}

/// State shared between the controller and its network thread.
struct Shared {
    inner: Mutex<Inner>,
    listeners: Mutex<Listeners>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_connection(&self, state: ConnectionState) {
        let cb = self.listeners().on_connection.clone();
        if let Some(cb) = cb {
            cb(state);
        }
    }

    fn notify_matrix(&self, snapshot: &MatrixSnapshot) {
        let cb = self.listeners().on_matrix.clone();
        if let Some(cb) = cb {
            cb(snapshot);
        }
    }

    fn enter_connecting(&self, addr: SocketAddr, cancel: &AtomicBool) -> bool {
        let mut inner = self.lock();
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        inner.phase = Phase::Connecting;
        inner.server = Some(addr);
        true
    }

    /// Install the connection, request the matrix state, then report
    /// `Established`. Returns `false` if a stop request won the race.
    fn establish(&self, sink: Box<dyn CommandSink + Send>, cancel: &AtomicBool) -> bool {
        {
            let mut inner = self.lock();
            if cancel.load(Ordering::SeqCst) {
                return false;
            }
            inner.phase = Phase::Established;
            inner.gate.reset();
            inner.sink = Some(sink);
            inner.send(Command::RequestState);
        }
        self.notify_connection(ConnectionState::Established);
        true
    }

    /// Enter `Failed` and report it, unless the thread is being stopped.
    fn fail(&self, reason: &crate::PlussyError, cancel: &AtomicBool) {
        {
            let mut inner = self.lock();
            if cancel.load(Ordering::SeqCst) {
                return;
            }
            log::warn!("connection failed: {reason}");
            inner.phase = Phase::Failed;
            inner.disconnect();
        }
        self.notify_connection(ConnectionState::Failed);
    }

    fn set_led(&self, led: LedIndex, color: Color) {
        let mut inner = self.lock();
        if inner.phase != Phase::Established {
            log::debug!("not connected, dropping LED {led} -> {color}");
            return;
        }
        match inner.gate.request(led, color) {
            GateAction::SendNow(cmd) => inner.send(Command::SetLed {
                led: cmd.led,
                color: cmd.color,
            }),
            GateAction::Deferred => log::debug!("LED {led} -> {color} deferred"),
        }
    }

    fn request_matrix_state(&self) {
        let mut inner = self.lock();
        if inner.phase != Phase::Established {
            log::debug!("not connected, dropping matrix state request");
            return;
        }
        inner.send(Command::RequestState);
    }

    fn handle_frame(&self, frame: Result<Frame>, cancel: &AtomicBool) {
        match frame {
            Ok(Frame::MatrixUpdate(snapshot)) => self.on_matrix_update(snapshot, cancel),
            Ok(Frame::Empty) => log::error!("empty message from device"),
            Ok(Frame::Rejected) => log::warn!("device rejected the last command"),
            Ok(Frame::Unrecognized(raw)) => log::warn!("can't handle reply from device: {raw:?}"),
            Err(e) => log::warn!("discarding reply: {e}"),
        }
    }

    /// Record the snapshot and release the flow-control gate in one critical
    /// section: the pending command (if any) goes out and becomes the one in
    /// flight. The callback runs afterwards, so a `set_led` it issues sees the
    /// gate already updated.
    fn on_matrix_update(&self, snapshot: MatrixSnapshot, cancel: &AtomicBool) {
        {
            let mut inner = self.lock();
            if cancel.load(Ordering::SeqCst) {
                return;
            }
            inner.last_snapshot = Some(snapshot.clone());
            if inner.phase == Phase::Established
                && let Some(PendingCommand { led, color }) = inner.gate.on_matrix_update()
            {
                inner.send(Command::SetLed { led, color });
            }
        }
        self.notify_matrix(&snapshot);
    }
}

struct Worker {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Discovery → connect → receive loop, on the network thread.
fn run_network(shared: &Shared, settings: &NetworkSettings, cancel: &AtomicBool) {
    let ip = match discover(settings, cancel) {
        Ok(ip) => ip,
        Err(crate::PlussyError::Cancelled) => return,
        Err(e) => return shared.fail(&e, cancel),
    };

    let addr = SocketAddr::new(ip, settings.port);
    if !shared.enter_connecting(addr, cancel) {
        return;
    }
    log::debug!("connecting to {addr}");
    let mut session = match Session::connect(addr, settings.connect_timeout, settings.read_timeout)
    {
        Ok(session) => session,
        Err(e) => return shared.fail(&e, cancel),
    };

    if !shared.establish(Box::new(session.handle()), cancel) {
        return;
    }
    log::info!("connected to {addr}");

    match session.run(cancel, |frame| shared.handle_frame(frame, cancel)) {
        SessionEnd::Stopped => log::debug!("session to {addr} stopped"),
        SessionEnd::Disconnected(e) => shared.fail(&e, cancel),
    }
}

fn discover(settings: &NetworkSettings, cancel: &AtomicBool) -> Result<IpAddr> {
    let mut discovery = Discovery::bind(
        settings.port,
        settings.discovery_timeout,
        &settings.discovery_marker,
    )?;
    log::debug!("waiting for device announcement on port {}", settings.port);
    discovery.discover(cancel)
}

/// Front-end API for one Plussy device.
pub struct DisplayController {
    settings: NetworkSettings,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl DisplayController {
    pub fn new(settings: NetworkSettings) -> Self {
        DisplayController {
            settings,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::new()),
                listeners: Mutex::new(Listeners::default()),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Register the connection-state callback, replacing any previous one.
    pub fn set_on_connection_changed(&self, cb: impl Fn(ConnectionState) + Send + Sync + 'static) {
        self.shared.listeners().on_connection = Some(Arc::new(cb));
    }

    /// Register the matrix-state callback, replacing any previous one.
    pub fn set_on_matrix_state(&self, cb: impl Fn(&MatrixSnapshot) + Send + Sync + 'static) {
        self.shared.listeners().on_matrix = Some(Arc::new(cb));
    }

    /// Remove both callbacks.
    pub fn clear_callbacks(&self) {
        *self.shared.listeners() = Listeners::default();
    }

    /// Stop any running session, then begin a fresh discovery on a new
    /// network thread.
    pub fn start(&self) -> Result<()> {
        self.stop();

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            log::debug!("network thread already started by a concurrent start()");
            return Ok(());
        }
        {
            let mut inner = self.shared.lock();
            inner.disconnect();
            inner.phase = Phase::Discovering;
            inner.server = None;
            inner.last_snapshot = None;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let shared = Arc::clone(&self.shared);
        let settings = self.settings.clone();
        let thread_cancel = Arc::clone(&cancel);
        let spawned = std::thread::Builder::new()
            .name("plussy-network".into())
            .spawn(move || run_network(&shared, &settings, &thread_cancel));

        match spawned {
            Ok(thread) => {
                *worker = Some(Worker { cancel, thread });
                Ok(())
            }
            Err(e) => {
                self.shared.lock().phase = Phase::Idle;
                Err(e.into())
            }
        }
    }

    /// Cancel discovery, close the session and wait for the network thread
    /// to exit. No-op when nothing is running.
    ///
    /// Called from a callback (i.e. on the network thread itself) the thread
    /// is signalled but not joined; it exits right after the callback returns.
    pub fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = worker {
            worker.cancel.store(true, Ordering::SeqCst);
            self.shared.lock().disconnect();
            if worker.thread.thread().id() == std::thread::current().id() {
                log::debug!("stop() called from the network thread, not joining");
            } else if worker.thread.join().is_err() {
                log::warn!("network thread panicked");
            }
        }

        let mut inner = self.shared.lock();
        inner.disconnect();
        inner.phase = Phase::Idle;
        inner.server = None;
    }

    /// Set one LED, subject to the one-command-in-flight rule.
    ///
    /// - Not connected: dropped.
    /// - Nothing in flight: sent immediately.
    /// - A command in flight: held as the pending command, replacing any
    ///   earlier pending one; it goes out when the next matrix reply arrives.
    pub fn set_led(&self, led: u8, color: Color) -> Result<()> {
        let led = LedIndex::new(led).inspect_err(|e| log::warn!("{e}"))?;
        self.shared.set_led(led, color.opaque());
        Ok(())
    }

    /// Ask the device for its full matrix state. Not subject to flow
    /// control; dropped when not connected.
    pub fn request_matrix_state(&self) {
        self.shared.request_matrix_state();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.phase().connection_state()
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Address of the device for the current connection cycle.
    pub fn server_address(&self) -> Option<SocketAddr> {
        self.shared.lock().server
    }

    /// Most recent snapshot received since the last `start()`.
    pub fn last_snapshot(&self) -> Option<MatrixSnapshot> {
        self.shared.lock().last_snapshot.clone()
    }

    pub fn pending_command(&self) -> Option<PendingCommand> {
        self.shared.lock().gate.pending()
    }

    pub fn is_command_outstanding(&self) -> bool {
        self.shared.lock().gate.is_outstanding()
    }
}

impl Drop for DisplayController {
    fn drop(&mut self) {
        self.stop();
    }
}
