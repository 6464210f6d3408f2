//! LED model — colors, indices, and matrix snapshots.

mod color;
mod matrix;

pub use color::{Color, format_color, parse_color};
pub use matrix::{LedIndex, MatrixSnapshot};
