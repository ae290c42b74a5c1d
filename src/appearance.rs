//! Subtitle appearance settings
//!
//! Color, size and shadow are small closed sets with one custom value each.
//! Everything is parsed and range-checked at the boundary (CLI, config file)
//! so the rest of the crate never sees free-form strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing appearance options
#[derive(Debug, Error, PartialEq)]
pub enum StyleError {
    #[error("Unknown subtitle color '{0}' (use a name or #rrggbb)")]
    UnknownColor(String),
    #[error("Font size {0} out of range (8-72)")]
    FontSizeOutOfRange(f64),
    #[error("Shadow radius {0} out of range (0-20)")]
    ShadowOutOfRange(f64),
    #[error("Invalid value '{0}'")]
    Invalid(String),
}

// =============================================================================
// Colors
// =============================================================================

/// 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#rrggbb` or `rrggbb`
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
        Some(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Subtitle text color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SubtitleColor {
    #[default]
    White,
    Yellow,
    Green,
    Blue,
    Red,
    Purple,
    Custom(Rgb),
}

impl SubtitleColor {
    /// Named colors in menu order
    pub const NAMED: [SubtitleColor; 6] = [
        SubtitleColor::White,
        SubtitleColor::Yellow,
        SubtitleColor::Green,
        SubtitleColor::Blue,
        SubtitleColor::Red,
        SubtitleColor::Purple,
    ];

    pub fn rgb(&self) -> Rgb {
        match self {
            SubtitleColor::White => Rgb(0xff, 0xff, 0xff),
            SubtitleColor::Yellow => Rgb(0xff, 0xff, 0x00),
            SubtitleColor::Green => Rgb(0x00, 0xff, 0x00),
            SubtitleColor::Blue => Rgb(0x00, 0x00, 0xff),
            SubtitleColor::Red => Rgb(0xff, 0x00, 0x00),
            SubtitleColor::Purple => Rgb(0x80, 0x00, 0x80),
            SubtitleColor::Custom(rgb) => *rgb,
        }
    }
}

impl FromStr for SubtitleColor {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        if let Some(named) = Self::NAMED.into_iter().find(|c| c.to_string() == name) {
            return Ok(named);
        }
        Rgb::parse_hex(&name)
            .map(SubtitleColor::Custom)
            .ok_or_else(|| StyleError::UnknownColor(s.to_string()))
    }
}

impl fmt::Display for SubtitleColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtitleColor::White => write!(f, "white"),
            SubtitleColor::Yellow => write!(f, "yellow"),
            SubtitleColor::Green => write!(f, "green"),
            SubtitleColor::Blue => write!(f, "blue"),
            SubtitleColor::Red => write!(f, "red"),
            SubtitleColor::Purple => write!(f, "purple"),
            SubtitleColor::Custom(rgb) => write!(f, "{}", rgb),
        }
    }
}

impl TryFrom<String> for SubtitleColor {
    type Error = StyleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SubtitleColor> for String {
    fn from(value: SubtitleColor) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Font Size
// =============================================================================

/// Subtitle font size in points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FontSize {
    Small,
    Medium,
    #[default]
    Regular,
    Large,
    ExtraLarge,
    Custom(f64),
}

impl FontSize {
    pub const MIN: f64 = 8.0;
    pub const MAX: f64 = 72.0;

    const PRESETS: [FontSize; 5] = [
        FontSize::Small,
        FontSize::Medium,
        FontSize::Regular,
        FontSize::Large,
        FontSize::ExtraLarge,
    ];

    pub fn points(&self) -> f64 {
        match self {
            FontSize::Small => 16.0,
            FontSize::Medium => 18.0,
            FontSize::Regular => 20.0,
            FontSize::Large => 22.0,
            FontSize::ExtraLarge => 24.0,
            FontSize::Custom(points) => *points,
        }
    }

    /// Validated custom size; preset values map back to their preset
    pub fn custom(points: f64) -> Result<Self, StyleError> {
        if !(Self::MIN..=Self::MAX).contains(&points) {
            return Err(StyleError::FontSizeOutOfRange(points));
        }
        Ok(Self::PRESETS
            .into_iter()
            .find(|preset| preset.points() == points)
            .unwrap_or(FontSize::Custom(points)))
    }
}

impl FromStr for FontSize {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "small" => Ok(FontSize::Small),
            "medium" => Ok(FontSize::Medium),
            "regular" => Ok(FontSize::Regular),
            "large" => Ok(FontSize::Large),
            "xl" | "extra-large" => Ok(FontSize::ExtraLarge),
            other => other
                .parse::<f64>()
                .map_err(|_| StyleError::Invalid(s.to_string()))
                .and_then(FontSize::custom),
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.points())
    }
}

impl TryFrom<String> for FontSize {
    type Error = StyleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FontSize> for String {
    fn from(value: FontSize) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Shadow
// =============================================================================

/// Text shadow radius
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShadowRadius {
    None,
    #[default]
    Low,
    Medium,
    High,
    Custom(f64),
}

impl ShadowRadius {
    pub const MAX: f64 = 20.0;

    pub fn radius(&self) -> f64 {
        match self {
            ShadowRadius::None => 0.0,
            ShadowRadius::Low => 1.0,
            ShadowRadius::Medium => 3.0,
            ShadowRadius::High => 6.0,
            ShadowRadius::Custom(radius) => *radius,
        }
    }
}

impl FromStr for ShadowRadius {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(ShadowRadius::None),
            "low" => Ok(ShadowRadius::Low),
            "medium" => Ok(ShadowRadius::Medium),
            "high" => Ok(ShadowRadius::High),
            other => {
                let radius: f64 = other
                    .parse()
                    .map_err(|_| StyleError::Invalid(s.to_string()))?;
                if !(0.0..=Self::MAX).contains(&radius) {
                    return Err(StyleError::ShadowOutOfRange(radius));
                }
                Ok(ShadowRadius::Custom(radius))
            }
        }
    }
}

impl fmt::Display for ShadowRadius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShadowRadius::None => write!(f, "none"),
            ShadowRadius::Low => write!(f, "low"),
            ShadowRadius::Medium => write!(f, "medium"),
            ShadowRadius::High => write!(f, "high"),
            ShadowRadius::Custom(radius) => write!(f, "{}", radius),
        }
    }
}

impl TryFrom<String> for ShadowRadius {
    type Error = StyleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShadowRadius> for String {
    fn from(value: ShadowRadius) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Style
// =============================================================================

/// Opacity of the caption background box when enabled
pub const BACKGROUND_OPACITY: f64 = 0.6;

/// Full subtitle appearance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    pub color: SubtitleColor,
    pub font_size: FontSize,
    pub shadow: ShadowRadius,
    pub background: bool,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            color: SubtitleColor::default(),
            font_size: FontSize::default(),
            shadow: ShadowRadius::default(),
            background: true,
        }
    }
}

impl SubtitleStyle {
    /// Background box opacity (0 when disabled)
    pub fn background_opacity(&self) -> f64 {
        if self.background {
            BACKGROUND_OPACITY
        } else {
            0.0
        }
    }
}

impl fmt::Display for SubtitleStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}pt shadow={} background={}",
            self.color,
            self.font_size,
            self.shadow,
            if self.background { "on" } else { "off" }
        )
    }
}
