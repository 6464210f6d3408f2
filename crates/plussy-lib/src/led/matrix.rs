//! LED addressing and full-matrix snapshots.

use std::fmt;
use std::ops::Index;

use serde::Serialize;

use super::Color;
use crate::error::Result;
use crate::protocol::LED_COUNT;

/// Validated LED position, `0..LED_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LedIndex(u8);

impl LedIndex {
    pub fn new(led: u8) -> Result<Self> {
        if usize::from(led) < LED_COUNT {
            Ok(LedIndex(led))
        } else {
            Err(crate::PlussyError::InvalidLedIndex(led))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every valid index in ascending order.
    pub fn all() -> impl Iterator<Item = LedIndex> {
        (0..LED_COUNT as u8).map(LedIndex)
    }
}

impl TryFrom<u8> for LedIndex {
    type Error = crate::PlussyError;

    fn try_from(led: u8) -> Result<Self> {
        LedIndex::new(led)
    }
}

impl fmt::Display for LedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The full color state of the matrix as reported by one device reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MatrixSnapshot([Color; LED_COUNT]);

impl MatrixSnapshot {
    pub fn new(colors: [Color; LED_COUNT]) -> Self {
        MatrixSnapshot(colors)
    }

    pub fn colors(&self) -> &[Color; LED_COUNT] {
        &self.0
    }

    pub fn get(&self, led: LedIndex) -> Color {
        self.0[usize::from(led.get())]
    }

    pub fn iter(&self) -> impl Iterator<Item = (LedIndex, Color)> + '_ {
        LedIndex::all().zip(self.0.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Index<LedIndex> for MatrixSnapshot {
    type Output = Color;

    fn index(&self, led: LedIndex) -> &Color {
        &self.0[usize::from(led.get())]
    }
}
