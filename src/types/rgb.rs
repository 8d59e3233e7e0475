//! RGB, HSB and xy+brightness color representations.

use serde::{Deserialize, Serialize};

use super::{Gamut, Xy};

/// An RGB color with channels normalized to 0.0-1.0.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Hue (degrees), saturation and brightness, each derived from an [`Rgb`].
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Hsb {
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
}

/// A chromaticity point with a 0-255 brightness.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct XyBrightness {
    pub xy: Xy,
    pub brightness: u8,
}

impl Rgb {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Create from 0-255 channel values.
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
        )
    }

    /// Channels scaled to 0-255 and rounded.
    pub fn to_u8(&self) -> [u8; 3] {
        let scale = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [scale(self.r), scale(self.g), scale(self.b)]
    }

    /// Standard HSB decomposition.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::Rgb;
    ///
    /// let hsb = Rgb::new(0.0, 1.0, 0.0).to_hsb();
    /// assert_eq!(hsb.hue, 120.0);
    /// assert_eq!(hsb.saturation, 1.0);
    /// assert_eq!(hsb.brightness, 1.0);
    /// ```
    pub fn to_hsb(&self) -> Hsb {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        if max == min {
            return Hsb {
                hue: 0.0,
                saturation: 0.0,
                brightness: max,
            };
        }

        let delta = max - min;
        let sector = if max == self.r {
            (self.g - self.b) / delta + if self.g < self.b { 6.0 } else { 0.0 }
        } else if max == self.g {
            (self.b - self.r) / delta + 2.0
        } else {
            (self.r - self.g) / delta + 4.0
        };

        Hsb {
            hue: sector * 60.0,
            saturation: delta / max,
            brightness: max,
        }
    }

    /// Convert to a gamut-corrected chromaticity point and a 0-255 brightness.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::{Gamut, Rgb};
    ///
    /// let white = Rgb::new(1.0, 1.0, 1.0).to_xy_brightness(Gamut::C);
    /// assert_eq!(white.brightness, 255);
    /// assert!((white.xy.x - 0.3227).abs() < 0.001);
    ///
    /// let black = Rgb::new(0.0, 0.0, 0.0).to_xy_brightness(Gamut::Default);
    /// assert_eq!((black.xy.x, black.xy.y, black.brightness), (0.0, 0.0, 0));
    /// ```
    pub fn to_xy_brightness(&self, gamut: Gamut) -> XyBrightness {
        let r = gamma_expand(self.r);
        let g = gamma_expand(self.g);
        let b = gamma_expand(self.b);

        let x = r * 0.664511 + g * 0.154324 + b * 0.162028;
        let y = r * 0.283881 + g * 0.668433 + b * 0.047685;
        let z = r * 0.000088 + g * 0.072310 + b * 0.986039;

        let sum = x + y + z;
        let xy = if sum == 0.0 {
            Xy::new(0.0, 0.0)
        } else {
            Xy::new(x / sum, y / sum)
        };

        let brightness = (self.to_hsb().brightness * 255.0).round().clamp(0.0, 255.0) as u8;

        XyBrightness {
            xy: gamut.correct(xy),
            brightness,
        }
    }
}

impl Xy {
    /// Convert to RGB at a 0.0-1.0 brightness.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::{Rgb, Xy};
    ///
    /// assert_eq!(Xy::new(0.3, 0.3).to_rgb(0.0), Rgb::new(0.0, 0.0, 0.0));
    /// ```
    pub fn to_rgb(&self, brightness: f64) -> Rgb {
        if brightness <= 0.0 || self.y <= 0.0 || !self.is_finite() {
            return Rgb::default();
        }

        let big_y = brightness;
        let big_x = big_y / self.y * self.x;
        let big_z = big_y / self.y * (1.0 - self.x - self.y);

        let linear = Rgb::new(
            big_x * 1.656492 - big_y * 0.354851 - big_z * 0.255038,
            -big_x * 0.707196 + big_y * 1.655397 + big_z * 0.036152,
            big_x * 0.051713 - big_y * 0.121364 + big_z * 1.011530,
        );

        let normalized = renormalize(linear);
        let compressed = Rgb::new(
            gamma_compress(normalized.r),
            gamma_compress(normalized.g),
            gamma_compress(normalized.b),
        );
        let rgb = renormalize(compressed);

        Rgb::new(
            rgb.r.clamp(0.0, 1.0),
            rgb.g.clamp(0.0, 1.0),
            rgb.b.clamp(0.0, 1.0),
        )
    }
}

fn gamma_expand(c: f64) -> f64 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn gamma_compress(c: f64) -> f64 {
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Scale all channels down by the largest one when it exceeds 1.0.
fn renormalize(rgb: Rgb) -> Rgb {
    let Rgb { r, g, b } = rgb;
    if r > b && r > g && r > 1.0 {
        Rgb::new(1.0, g / r, b / r)
    } else if g > b && g > r && g > 1.0 {
        Rgb::new(r / g, 1.0, b / g)
    } else if b > r && b > g && b > 1.0 {
        Rgb::new(r / b, g / b, 1.0)
    } else {
        rgb
    }
}
