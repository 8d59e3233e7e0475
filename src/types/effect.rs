//! Alert and effect modes.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Temporary alert effect a light can perform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Alert {
    None,
    /// A single breathe cycle
    Select,
    /// Breathe cycles for 15 seconds
    #[serde(rename = "lselect")]
    #[strum(serialize = "lselect")]
    LSelect,
}

/// Dynamic effect of a light.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Effect {
    None,
    /// Cycles through all hues at the current brightness and saturation
    #[serde(rename = "colorloop")]
    #[strum(serialize = "colorloop")]
    ColorLoop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse() {
        assert_eq!(Alert::from_str("lselect").unwrap(), Alert::LSelect);
        assert_eq!(Effect::from_str("colorloop").unwrap(), Effect::ColorLoop);
        assert!(Effect::from_str("strobe").is_err());
        assert_eq!(Alert::Select.as_ref(), "select");
    }
}
