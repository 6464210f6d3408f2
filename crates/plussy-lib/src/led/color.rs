//! Color parsing and formatting.
//!
//! Colors are stored as `0xAARRGGBB`. The device only understands RGB, so
//! anything sent or received on the wire is fully opaque.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// 32-bit ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(u32);

impl Color {
    pub const OPAQUE: u32 = 0xFF00_0000;

    pub const BLACK: Color = Color(Self::OPAQUE);
    pub const RED: Color = Color(0xFFFF_0000);
    pub const GREEN: Color = Color(0xFF00_FF00);
    pub const BLUE: Color = Color(0xFF00_00FF);
    pub const WHITE: Color = Color(0xFFFF_FFFF);

    /// Wrap a raw ARGB value as-is.
    pub const fn from_argb(argb: u32) -> Self {
        Color(argb)
    }

    /// Build an opaque color from the low 24 bits of `rgb`.
    pub const fn from_rgb24(rgb: u32) -> Self {
        Color(Self::OPAQUE | (rgb & 0x00FF_FFFF))
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_rgb24(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub const fn argb(self) -> u32 {
        self.0
    }

    /// RGB without alpha, as sent on the wire.
    pub const fn rgb24(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// The same RGB with alpha forced to fully opaque.
    pub const fn opaque(self) -> Self {
        Self::from_rgb24(self.0)
    }
}

/// Parse a color string into an opaque [`Color`].
///
/// Accepts:
/// - Hex: `"#FF0000"`, `"FF0000"`, `"#ff0000"`
/// - Named: `"red"`, `"green"`, `"blue"`, `"white"`, `"orange"`, `"yellow"`, `"purple"`, `"cyan"`
pub fn parse_color(s: &str) -> crate::error::Result<Color> {
    let s = s.trim();

    match s.to_lowercase().as_str() {
        "red" => return Ok(Color::from_rgb24(0xFF0000)),
        "green" => return Ok(Color::from_rgb24(0x00FF00)),
        "blue" => return Ok(Color::from_rgb24(0x0000FF)),
        "white" => return Ok(Color::from_rgb24(0xFFFFFF)),
        "orange" => return Ok(Color::from_rgb24(0xFF8000)),
        "yellow" => return Ok(Color::from_rgb24(0xFFFF00)),
        "purple" => return Ok(Color::from_rgb24(0x8000FF)),
        "cyan" => return Ok(Color::from_rgb24(0x00FFFF)),
        "off" | "black" => return Ok(Color::from_rgb24(0x000000)),
        _ => {}
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(crate::PlussyError::Color(format!(
            "Invalid color: {s} (use #RRGGBB or a color name)"
        )));
    }
    let val = u32::from_str_radix(hex, 16)
        .map_err(|_| crate::PlussyError::Color(format!("Invalid hex color: {s}")))?;
    Ok(Color::from_rgb24(val))
}

/// Format a color as `#RRGGBB`, ignoring alpha.
pub fn format_color(color: Color) -> String {
    color.to_string()
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.rgb24())
    }
}

impl FromStr for Color {
    type Err = crate::PlussyError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        parse_color(s)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
