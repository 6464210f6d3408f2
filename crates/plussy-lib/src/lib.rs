//! Plussy — network control for the Plussy LED matrix.
//!
//! The device announces itself with a UDP broadcast, then accepts a
//! line-oriented text protocol over TCP on the same port. [`controller`]
//! ties [`discovery`] and [`session`] together behind a small API that
//! UI front ends drive.

pub mod codec;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod flow;
pub mod led;
pub mod protocol;
pub mod reconnect;
pub mod session;

pub use error::PlussyError;
