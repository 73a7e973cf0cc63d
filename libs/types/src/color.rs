//! RGB Color Triplets
//!
//! The in-memory pixel representation used by sites and effects. Layout is
//! three bytes, red first, with no padding, so a `[Crgb]` slice can be viewed
//! directly as the RGB byte stream the strips expect.

use std::ops::Add;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// A single RGB pixel
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, AsBytes, FromBytes, FromZeroes)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Crgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Crgb {
    pub const BLACK: Crgb = Crgb::new(0, 0, 0);
    pub const WHITE: Crgb = Crgb::new(255, 255, 255);
    pub const RED: Crgb = Crgb::new(255, 0, 0);
    pub const GREEN: Crgb = Crgb::new(0, 255, 0);
    pub const BLUE: Crgb = Crgb::new(0, 0, 255);
    /// Warm white used for plain area lighting
    pub const WARM_WHITE: Crgb = Crgb::new(246, 200, 160);

    /// Create a color from its components
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from hue (degrees), saturation and value (0.0..=1.0)
    ///
    /// Hue wraps, so 360.0 and 0.0 produce the same color.
    pub fn from_hsv(hue: f64, saturation: f64, value: f64) -> Self {
        let hue = hue.rem_euclid(360.0);
        let saturation = saturation.clamp(0.0, 1.0);
        let value = value.clamp(0.0, 1.0);

        let chroma = value * saturation;
        let sector = hue / 60.0;
        let x = chroma * (1.0 - ((sector % 2.0) - 1.0).abs());
        let m = value - chroma;

        let (r, g, b) = match sector as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };

        Self::new(
            unit_to_byte(r + m),
            unit_to_byte(g + m),
            unit_to_byte(b + m),
        )
    }

    /// Dim the color toward black by `amount` (0.0 leaves it unchanged, 1.0 is black)
    pub fn fade_to_black_by(self, amount: f64) -> Self {
        let keep = 1.0 - amount.clamp(0.0, 1.0);
        Self::new(
            (self.r as f64 * keep) as u8,
            (self.g as f64 * keep) as u8,
            (self.b as f64 * keep) as u8,
        )
    }

    /// Scale each channel by `scale`/256
    pub fn scale8(self, scale: u8) -> Self {
        let s = scale as u16;
        Self::new(
            ((self.r as u16 * s) >> 8) as u8,
            ((self.g as u16 * s) >> 8) as u8,
            ((self.b as u16 * s) >> 8) as u8,
        )
    }

    /// Same color with the red and green channels exchanged
    pub fn with_red_green_swapped(self) -> Self {
        Self::new(self.g, self.r, self.b)
    }

    /// Average brightness of the three channels
    pub fn average_light(self) -> u8 {
        ((self.r as u16 + self.g as u16 + self.b as u16) / 3) as u8
    }
}

fn unit_to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Saturating per-channel addition, used when blending light
impl Add for Crgb {
    type Output = Crgb;

    fn add(self, rhs: Crgb) -> Crgb {
        Crgb::new(
            self.r.saturating_add(rhs.r),
            self.g.saturating_add(rhs.g),
            self.b.saturating_add(rhs.b),
        )
    }
}

impl From<[u8; 3]> for Crgb {
    fn from(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }
}

impl From<Crgb> for [u8; 3] {
    fn from(c: Crgb) -> Self {
        [c.r, c.g, c.b]
    }
}
