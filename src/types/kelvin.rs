//! Color temperature in Kelvin and Mired.

use serde::{Deserialize, Serialize};

/// `round(1_000_000 / mired)`.
///
/// The result is not finite for a mired of zero; callers omit the property
/// instead of propagating it.
///
/// # Examples
///
/// ```
/// use hue_mirror::mired_to_kelvin;
///
/// assert_eq!(mired_to_kelvin(250.0), 4000.0);
/// assert!(!mired_to_kelvin(0.0).is_finite());
/// ```
pub fn mired_to_kelvin(mired: f64) -> f64 {
    (1_000_000.0 / mired).round()
}

/// `round(1_000_000 / kelvin)`, the inverse of [`mired_to_kelvin`].
pub fn kelvin_to_mired(kelvin: f64) -> f64 {
    (1_000_000.0 / kelvin).round()
}

/// Valid color temperature range of a light, in Kelvin.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct KelvinRange {
    pub min: u16,
    pub max: u16,
}

impl Default for KelvinRange {
    fn default() -> Self {
        Self::from_mired(None, None)
    }
}

impl KelvinRange {
    /// Coolest mired used when the bridge reports 0.
    pub const DEFAULT_MIN_MIRED: u16 = 153;
    /// Warmest mired used when the bridge reports nothing or its 65535 sentinel.
    pub const DEFAULT_MAX_MIRED: u16 = 500;

    /// Derive the Kelvin bounds from a light's native mired capability range.
    ///
    /// The warm end of the mired range is the cold end in Kelvin, so the
    /// bounds swap.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::KelvinRange;
    ///
    /// let range = KelvinRange::from_mired(Some(153), Some(454));
    /// assert_eq!(range.min, 2203);
    /// assert_eq!(range.max, 6536);
    ///
    /// let broken = KelvinRange::from_mired(Some(0), Some(65535));
    /// assert_eq!(broken, KelvinRange::from_mired(Some(153), Some(500)));
    /// ```
    pub fn from_mired(min_mired: Option<u16>, max_mired: Option<u16>) -> Self {
        let min_mired = match min_mired {
            Some(0) | None => Self::DEFAULT_MIN_MIRED,
            Some(m) => m,
        };
        let max_mired = match max_mired {
            Some(u16::MAX) | Some(0) | None => Self::DEFAULT_MAX_MIRED,
            Some(m) => m,
        };
        let (min_mired, max_mired) = if min_mired > max_mired {
            (max_mired, min_mired)
        } else {
            (min_mired, max_mired)
        };

        KelvinRange {
            min: mired_to_kelvin(f64::from(max_mired)) as u16,
            max: mired_to_kelvin(f64::from(min_mired)) as u16,
        }
    }

    pub fn clamp(&self, kelvin: f64) -> f64 {
        kelvin.clamp(f64::from(self.min), f64::from(self.max))
    }

    /// Mired bounds as `(min, max)`.
    pub fn mired_bounds(&self) -> (u16, u16) {
        (
            kelvin_to_mired(f64::from(self.max)) as u16,
            kelvin_to_mired(f64::from(self.min)) as u16,
        )
    }

    /// Clamp a Kelvin value into range and convert it to mired.
    pub fn to_mired(&self, kelvin: f64) -> u16 {
        let (lo, hi) = self.mired_bounds();
        (kelvin_to_mired(self.clamp(kelvin)) as u16).clamp(lo, hi)
    }
}
