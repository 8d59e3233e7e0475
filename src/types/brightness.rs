//! Brightness and percentage level.

use serde::{Deserialize, Serialize};

/// Raw bridge brightness from 0 to 254.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Brightness {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 254;

    /// Full brightness (254).
    pub fn new() -> Self {
        Brightness { value: Self::MAX }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Returns None if value is outside the valid range (0-254).
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::Brightness;
    ///
    /// assert!(Brightness::create(0).is_some());
    /// assert!(Brightness::create(254).is_some());
    /// assert!(Brightness::create(255).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        if value <= Self::MAX {
            Some(Brightness { value })
        } else {
            None
        }
    }

    /// Rounds and clamps any number into the valid range.
    pub fn clamped(value: f64) -> Self {
        let value = if value.is_finite() { value } else { 0.0 };
        Brightness {
            value: value.round().clamp(0.0, f64::from(Self::MAX)) as u8,
        }
    }

    /// Converts a 0-100 level into brightness.
    pub fn from_level(level: f64) -> Self {
        Brightness {
            value: level_to_brightness(level),
        }
    }

    /// The 0-100 level this brightness is mirrored as.
    pub fn level(&self) -> u8 {
        brightness_to_level(f64::from(self.value))
    }

    pub fn is_off(&self) -> bool {
        self.value == 0
    }
}

/// Scales a 0-100 level linearly onto 0-254, rounded and clamped.
///
/// # Examples
///
/// ```
/// use hue_mirror::level_to_brightness;
///
/// assert_eq!(level_to_brightness(0.0), 0);
/// assert_eq!(level_to_brightness(50.0), 127);
/// assert_eq!(level_to_brightness(100.0), 254);
/// assert_eq!(level_to_brightness(250.0), 254);
/// ```
pub fn level_to_brightness(level: f64) -> u8 {
    if !level.is_finite() {
        return 0;
    }
    (level.clamp(0.0, 100.0) * 2.54)
        .round()
        .clamp(0.0, f64::from(Brightness::MAX)) as u8
}

/// `round(clamp(brightness / 2.54, 0, 100))`
pub fn brightness_to_level(brightness: f64) -> u8 {
    if !brightness.is_finite() {
        return 0;
    }
    (brightness / 2.54).clamp(0.0, 100.0).round() as u8
}
