//! CIE chromaticity point.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A chromaticity point. The bridge sends it as an `[x, y]` array; the
/// mirror stores it as an `"x,y"` string.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

impl Xy {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Parse from either a `"x,y"` string or a two-element numeric array.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::Xy;
    /// use serde_json::json;
    ///
    /// assert_eq!(Xy::from_value(&json!("0.3,0.4")), Some(Xy::new(0.3, 0.4)));
    /// assert_eq!(Xy::from_value(&json!([0.3, 0.4])), Some(Xy::new(0.3, 0.4)));
    /// assert_eq!(Xy::from_value(&json!(true)), None);
    /// ```
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => s.parse().ok(),
            Value::Array(arr) => {
                let [x, y] = arr.as_slice() else {
                    return None;
                };
                Some(Xy::new(x.as_f64()?, y.as_f64()?))
            }
            _ => None,
        }
    }

    /// The `[x, y]` array the bridge expects, rounded to four decimals.
    pub fn to_array(&self) -> [f64; 2] {
        let round = |v: f64| (v * 10_000.0).round() / 10_000.0;
        [round(self.x), round(self.y)]
    }
}

impl fmt::Display for Xy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y] = self.to_array();
        write!(f, "{},{}", x, y)
    }
}

impl FromStr for Xy {
    type Err = String;

    /// Parse from comma-separated string (e.g., "0.3,0.3").
    fn from_str(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.trim_matches(|c| c == '[' || c == ']').split(',').collect();
        let [x, y] = parts.as_slice() else {
            return Err("Expected format: x,y".into());
        };
        let x: f64 = x.trim().parse().map_err(|_| format!("invalid x: {}", x))?;
        let y: f64 = y.trim().parse().map_err(|_| format!("invalid y: {}", y))?;
        Ok(Xy::new(x, y))
    }
}
