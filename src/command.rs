//! State command sent to a light or group.

use serde::{Deserialize, Serialize};

use crate::types::{Alert, Brightness, Effect, Hue, Xy};

/// A partial state change for one light or group.
///
/// Every attribute is optional and only the set ones are sent to the bridge.
///
/// ```
/// use hue_mirror::{Brightness, LightCommand};
///
/// let mut command = LightCommand::new();
/// command.brightness(&Brightness::create(200).unwrap());
/// assert_eq!(serde_json::to_string(&command).unwrap(), r#"{"bri":200}"#);
/// ```
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LightCommand {
    pub on: Option<bool>,
    pub bri: Option<u8>,
    pub hue: Option<u16>,
    pub sat: Option<u8>,
    pub xy: Option<[f64; 2]>,
    /// Color temperature in mired
    pub ct: Option<u16>,
    pub alert: Option<Alert>,
    pub effect: Option<Effect>,
    /// Transition duration in multiples of 100 ms
    pub transitiontime: Option<u16>,
    pub scene: Option<String>,
}

impl LightCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the command changes anything on the bridge.
    ///
    /// A transition time alone is not valid; it only applies to other changes.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::LightCommand;
    ///
    /// let mut command = LightCommand::new();
    /// command.transitiontime = Some(10);
    /// assert!(!command.is_valid());
    ///
    /// command.power(true);
    /// assert!(command.is_valid());
    /// ```
    pub fn is_valid(&self) -> bool {
        self.on.is_some()
            || self.bri.is_some()
            || self.hue.is_some()
            || self.sat.is_some()
            || self.xy.is_some()
            || self.ct.is_some()
            || self.alert.is_some()
            || self.effect.is_some()
            || self.scene.is_some()
    }

    pub fn power(&mut self, on: bool) {
        self.on = Some(on);
    }

    pub fn brightness(&mut self, brightness: &Brightness) {
        self.bri = Some(brightness.value);
    }

    pub fn hue(&mut self, hue: &Hue) {
        self.hue = Some(hue.value);
    }

    pub fn xy(&mut self, xy: &Xy) {
        self.xy = Some(xy.to_array());
    }

    /// Recall a scene.
    pub fn scene(&mut self, scene_id: &str) {
        self.scene = Some(scene_id.to_string());
    }

    /// The color mode this command selects, if any.
    ///
    /// `xy` wins over `ct`, which wins over hue and saturation.
    pub fn colormode(&self) -> Option<&'static str> {
        if self.xy.is_some() {
            Some("xy")
        } else if self.ct.is_some() {
            Some("ct")
        } else if self.hue.is_some() || self.sat.is_some() {
            Some("hs")
        } else {
            None
        }
    }

    /// Drop the color attributes the winning color mode overrides.
    pub(crate) fn keep_single_colormode(&mut self) {
        match self.colormode() {
            Some("xy") => {
                self.ct = None;
                self.hue = None;
                self.sat = None;
            }
            Some("ct") => {
                self.hue = None;
                self.sat = None;
            }
            _ => {}
        }
    }

    /// Collapse to the on/off state for lights that only switch.
    pub fn switch_only(&self) -> LightCommand {
        let on = self.on.or_else(|| self.bri.map(|bri| bri > 0));
        LightCommand {
            on,
            ..LightCommand::default()
        }
    }
}

impl From<&Brightness> for LightCommand {
    fn from(brightness: &Brightness) -> Self {
        let mut command = LightCommand::new();
        command.brightness(brightness);
        command
    }
}
