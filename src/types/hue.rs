//! Hue angle in bridge units and degrees.

use serde::{Deserialize, Serialize};

/// Raw bridge hue from 0 to 65535, wrapping around the color wheel.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Hue {
    pub(crate) value: u16,
}

impl Hue {
    /// Number of distinct raw hue values; increments wrap modulo this.
    pub const RANGE: i64 = 65536;

    pub fn new(value: u16) -> Self {
        Hue { value }
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    /// Clamps degrees into 0-360 and scales onto the raw range.
    pub fn from_degrees(degrees: f64) -> Self {
        Hue {
            value: degrees_to_hue(degrees),
        }
    }

    pub fn degrees(&self) -> f64 {
        hue_to_degrees(self.value)
    }
}

/// Raw hue to degrees, rounded to two decimals.
///
/// # Examples
///
/// ```
/// use hue_mirror::hue_to_degrees;
///
/// assert_eq!(hue_to_degrees(0), 0.0);
/// assert_eq!(hue_to_degrees(65535), 360.0);
/// assert_eq!(hue_to_degrees(464), 2.55);
/// ```
pub fn hue_to_degrees(hue: u16) -> f64 {
    (f64::from(hue) * 360.0 / 65535.0 * 100.0).round() / 100.0
}

pub fn degrees_to_hue(degrees: f64) -> u16 {
    if !degrees.is_finite() {
        return 0;
    }
    (degrees.clamp(0.0, 360.0) / 360.0 * 65535.0).round() as u16
}
