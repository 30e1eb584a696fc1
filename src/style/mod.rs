//! # Drawing Styles
//!
//! Small value types shared by layout, the canvases and the configuration:
//! colors, edge insets, text direction and alignment, and font selection.

use serde::{Deserialize, Serialize};

/// An RGBA color with channels in `0.0..=1.0`.
///
/// Serializes as a hex string (`#RRGGBB` or `#RGB`) so configuration files
/// stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Color {
    pub r: f64, // 0.0 - 1.0
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const TRANSPARENT: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn gray(level: f64) -> Self {
        Self::rgb(level, level, level)
    }

    /// Parse `#RRGGBB` or `#RGB`. Anything else yields black.
    pub fn hex(hex: &str) -> Self {
        let hex = hex.trim().trim_start_matches('#');
        let (r, g, b) = match hex.len() {
            3 if hex.is_ascii() => {
                let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).unwrap_or(0);
                let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).unwrap_or(0);
                let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).unwrap_or(0);
                (r, g, b)
            }
            6 if hex.is_ascii() => {
                let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
                let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
                let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
                (r, g, b)
            }
            _ => (0, 0, 0),
        };
        Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
            a: 1.0,
        }
    }

    pub fn to_hex(&self) -> String {
        let c = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02X}{:02X}{:02X}", c(self.r), c(self.g), c(self.b))
    }

    /// Channels as 8-bit RGBA.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let c = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [c(self.r), c(self.g), c(self.b), c(self.a)]
    }

    pub fn is_visible(&self) -> bool {
        self.a > 0.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl From<String> for Color {
    fn from(s: String) -> Self {
        Color::hex(&s)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

/// Edge values (top, right, bottom, left) used for margins and padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
            left: self.left * factor,
        }
    }
}

/// Base direction of a paragraph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    pub fn is_rtl(self) -> bool {
        matches!(self, Direction::Rtl)
    }
}

/// Horizontal alignment, resolved against the paragraph direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Start,
    Center,
    End,
}

impl TextAlign {
    /// Offset of a line of `line_width` inside a box of `box_width`.
    pub fn offset(self, direction: Direction, box_width: f64, line_width: f64) -> f64 {
        let slack = (box_width - line_width).max(0.0);
        match (self, direction) {
            (TextAlign::Center, _) => slack / 2.0,
            (TextAlign::Start, Direction::Ltr) | (TextAlign::End, Direction::Rtl) => 0.0,
            (TextAlign::Start, Direction::Rtl) | (TextAlign::End, Direction::Ltr) => slack,
        }
    }
}

/// Which face to measure and draw with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    pub family: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    400
}

impl FontSpec {
    pub fn new(family: &str, weight: u32) -> Self {
        Self {
            family: family.to_string(),
            weight,
        }
    }

    pub fn regular() -> Self {
        Self::new("Helvetica", 400)
    }

    pub fn bold() -> Self {
        Self::new("Helvetica", 700)
    }

    pub fn is_bold(&self) -> bool {
        self.weight >= 600
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::regular()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_colors() {
        let c = Color::hex("#FF8000");
        assert!((c.r - 1.0).abs() < 1e-9);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-9);
        assert_eq!(c.b, 0.0);
        assert_eq!(Color::hex("#fff"), Color::WHITE);
        assert_eq!(Color::hex("nonsense"), Color::BLACK);
        assert_eq!(Color::hex("#1A2B3C").to_hex(), "#1A2B3C");
    }

    #[test]
    fn test_color_serde_as_hex() {
        let json = serde_json::to_string(&Color::rgb(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(json, "\"#FF0000\"");
        let back: Color = serde_json::from_str("\"#00ff00\"").unwrap();
        assert_eq!(back.to_rgba8(), [0, 255, 0, 255]);
    }

    #[test]
    fn test_alignment_resolves_against_direction() {
        assert_eq!(TextAlign::Start.offset(Direction::Ltr, 100.0, 40.0), 0.0);
        assert_eq!(TextAlign::Start.offset(Direction::Rtl, 100.0, 40.0), 60.0);
        assert_eq!(TextAlign::End.offset(Direction::Ltr, 100.0, 40.0), 60.0);
        assert_eq!(TextAlign::End.offset(Direction::Rtl, 100.0, 40.0), 0.0);
        assert_eq!(TextAlign::Center.offset(Direction::Rtl, 100.0, 40.0), 30.0);
        // Overlong lines never get a negative offset
        assert_eq!(TextAlign::Center.offset(Direction::Ltr, 10.0, 40.0), 0.0);
    }
}
