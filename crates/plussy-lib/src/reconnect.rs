//! Restart pacing for front ends that keep a display connected.
//!
//! The controller never retries on its own: a failed discovery, refused
//! connection or dropped stream leaves it in `Failed`. A [`Reconnector`] is
//! fed the connection-state callbacks and restarts the controller once the
//! backoff for the latest failure has elapsed, so an absent device isn't
//! hammered.

use std::time::{Duration, Instant};

use crate::controller::{ConnectionState, DisplayController, Phase};

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before restarting after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for the delay.
    pub max_delay: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Schedules controller restarts from observed connection states.
///
/// A restart is only ever scheduled by an observed `Failed` callback, and
/// each one is issued at most once.
#[derive(Debug)]
pub struct Reconnector {
    config: ReconnectConfig,
    /// Delay the next failure will wait.
    next_delay: Duration,
    retry_at: Option<Instant>,
    failures: u32,
}

impl Reconnector {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            next_delay: config.initial_delay,
            config,
            retry_at: None,
            failures: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ReconnectConfig::default())
    }

    /// Feed one connection-state callback.
    ///
    /// `Failed` schedules a restart and returns its delay. `Established`
    /// resets the backoff and drops any scheduled restart.
    pub fn observe(&mut self, state: ConnectionState) -> Option<Duration> {
        match state {
            ConnectionState::Failed => Some(self.schedule()),
            ConnectionState::Established => {
                self.failures = 0;
                self.next_delay = self.config.initial_delay;
                self.retry_at = None;
                None
            }
            ConnectionState::NotConnected => None,
        }
    }

    fn schedule(&mut self) -> Duration {
        let delay = self.next_delay;
        self.failures += 1;
        self.retry_at = Some(Instant::now() + delay);
        let next = delay.as_secs_f64() * self.config.multiplier;
        self.next_delay = Duration::from_secs_f64(next).min(self.config.max_delay);
        delay
    }

    /// Restart `controller` if a scheduled restart is due.
    ///
    /// Returns `true` when `start()` was issued. Nothing happens unless the
    /// controller is still `Failed`; a controller that was stopped or
    /// restarted elsewhere cancels the pending restart.
    pub fn poll(&mut self, controller: &DisplayController) -> bool {
        let Some(at) = self.retry_at else {
            return false;
        };
        if Instant::now() < at {
            return false;
        }
        self.retry_at = None;
        if controller.phase() != Phase::Failed {
            log::debug!("restart dropped, controller is {:?}", controller.phase());
            return false;
        }
        log::info!("reconnecting (attempt {})", self.failures + 1);
        match controller.start() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("could not restart network thread: {e}");
                self.schedule();
                false
            }
        }
    }

    /// Whether a restart is waiting for its delay.
    pub fn is_scheduled(&self) -> bool {
        self.retry_at.is_some()
    }

    /// Failures since the last established connection.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Delay the next failure will be given.
    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }
}
