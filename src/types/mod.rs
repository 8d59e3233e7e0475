//! Value types and pure conversions between the bridge's and consumer units.

mod brightness;
mod effect;
mod gamut;
mod hue;
mod kelvin;
mod rgb;
mod xy;

pub use brightness::{Brightness, brightness_to_level, level_to_brightness};
pub use effect::{Alert, Effect};
pub use gamut::{Gamut, Triangle};
pub use hue::{Hue, degrees_to_hue, hue_to_degrees};
pub use kelvin::{KelvinRange, kelvin_to_mired, mired_to_kelvin};
pub use rgb::{Hsb, Rgb, XyBrightness};
pub use xy::Xy;
