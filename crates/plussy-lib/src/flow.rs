//! Single-outstanding-command flow control, decoupled from I/O.
//!
//! The device acknowledges a set-LED command only indirectly, by sending its
//! next matrix reply. [`CommandGate`] allows one command in flight; anything
//! requested meanwhile lands in a single pending slot that newer requests
//! overwrite. When the reply arrives the pending command (if any) goes out
//! and becomes the new in-flight command.

use crate::led::{Color, LedIndex};

/// A set-LED request held back while another one is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    pub led: LedIndex,
    pub color: Color,
}

/// What the caller should do with a set-LED request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// Nothing in flight: transmit this command now.
    SendNow(PendingCommand),
    /// Stored in the pending slot, replacing whatever was there.
    Deferred,
}

#[derive(Debug, Default)]
pub struct CommandGate {
    outstanding: bool,
    pending: Option<PendingCommand>,
}

impl CommandGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a set-LED request to the gate.
    pub fn request(&mut self, led: LedIndex, color: Color) -> GateAction {
        let cmd = PendingCommand { led, color };
        if self.outstanding {
            self.pending = Some(cmd);
            GateAction::Deferred
        } else {
            self.outstanding = true;
            GateAction::SendNow(cmd)
        }
    }

    /// A matrix reply arrived. Returns the pending command to transmit, if
    /// any; it stays in flight until the next reply.
    pub fn on_matrix_update(&mut self) -> Option<PendingCommand> {
        match self.pending.take() {
            Some(cmd) => Some(cmd),
            None => {
                self.outstanding = false;
                None
            }
        }
    }

    /// Drop all flow-control state (new connection, stop).
    pub fn reset(&mut self) {
        self.outstanding = false;
        self.pending = None;
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    pub fn pending(&self) -> Option<PendingCommand> {
        self.pending
    }
}
