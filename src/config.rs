//! Adapter configuration and light capability detection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::snapshot::LightRecord;
use crate::types::{Gamut, KelvinRange};

type Result<T> = std::result::Result<T, Error>;

/// Administrative configuration of one mirrored bridge.
///
/// # Example
///
/// ```
/// use hue_mirror::AdapterConfig;
///
/// let config = AdapterConfig::from_json(r#"{"bridge": "192.168.1.2", "pollingInterval": 1}"#).unwrap();
/// assert_eq!(config.bridge, "192.168.1.2");
/// assert_eq!(config.polling_interval().as_secs(), 2);
/// assert!(config.polling);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdapterConfig {
    pub bridge: String,
    pub port: u16,
    pub user: String,
    pub use_https: bool,
    pub polling: bool,
    /// Seconds between two polls
    pub polling_interval: u64,
    pub ignore_groups: bool,
    pub ignore_scenes: bool,
    /// Do not zero the brightness of unreachable OSRAM lights, they report
    /// `reachable: false` while working.
    pub ignore_osram: bool,
    /// Nest every channel below a device named after the bridge.
    pub use_legacy_structure: bool,
    /// Keep the bridge's brightness for lights that are off instead of
    /// mirroring 0.
    pub native_turn_off_behaviour: bool,
    /// Let color changes on an off light turn it on.
    pub turn_on_with_others: bool,
    /// Mirror CLIP sensors created by apps.
    pub sync_software_sensors: bool,
    pub push: bool,
    /// Seconds to wait before reopening a closed event stream
    pub push_reconnect_delay: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            bridge: String::new(),
            port: 443,
            user: String::new(),
            use_https: true,
            polling: true,
            polling_interval: 5,
            ignore_groups: false,
            ignore_scenes: false,
            ignore_osram: false,
            use_legacy_structure: false,
            native_turn_off_behaviour: false,
            turn_on_with_others: true,
            sync_software_sensors: false,
            push: true,
            push_reconnect_delay: 0,
        }
    }
}

impl AdapterConfig {
    /// Lowest polling interval the bridge tolerates.
    pub const MIN_POLLING_INTERVAL: u64 = 2;

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::JsonLoad)
    }

    /// Raise a polling interval below the floor to the floor.
    pub fn validated(mut self) -> Self {
        if self.polling_interval < Self::MIN_POLLING_INTERVAL {
            log::warn!(
                "polling interval {}s is below the minimum, using {}s",
                self.polling_interval,
                Self::MIN_POLLING_INTERVAL
            );
            self.polling_interval = Self::MIN_POLLING_INTERVAL;
        }
        self
    }

    /// Polling interval with the minimum enforced.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval.max(Self::MIN_POLLING_INTERVAL))
    }

    pub fn push_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.push_reconnect_delay)
    }
}

/// Classification of Hue light types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightClass {
    ExtendedColor,
    Color,
    ColorTemperature,
    Dimmable,
    OnOff,
}

impl LightClass {
    /// Parse the bridge's `type` string (e.g., "Extended color light").
    pub fn from_type(kind: &str) -> Self {
        let kind = kind.to_ascii_lowercase();
        if kind.contains("extended color") {
            LightClass::ExtendedColor
        } else if kind.contains("color temperature") {
            LightClass::ColorTemperature
        } else if kind.contains("color") {
            LightClass::Color
        } else if kind.contains("dimmable") {
            LightClass::Dimmable
        } else {
            LightClass::OnOff
        }
    }

    /// Role recorded on the mirrored channel.
    pub fn role(&self) -> &'static str {
        match self {
            LightClass::ExtendedColor | LightClass::Color => "light.color",
            LightClass::ColorTemperature => "light.ct",
            LightClass::Dimmable => "light.dimmer",
            LightClass::OnOff => "switch",
        }
    }
}

/// Role of a channel that only accepts on/off.
pub const SWITCH_ROLE: &str = "switch";

/// Everything the command merger needs to know about a light's hardware.
#[derive(Debug, Clone)]
pub struct LightProfile {
    pub class: LightClass,
    pub gamut: Gamut,
    pub kelvin_range: KelvinRange,
}

impl LightProfile {
    pub fn from_light(light: &LightRecord) -> Self {
        let control = light.capabilities.as_ref().and_then(|c| c.control.as_ref());
        let gamut = Gamut::detect(
            control.and_then(|c| c.colorgamuttype.as_deref()),
            light.modelid.as_deref(),
        );
        let ct = control.and_then(|c| c.ct.as_ref());
        let kelvin_range = KelvinRange::from_mired(ct.map(|ct| ct.min), ct.map(|ct| ct.max));

        LightProfile {
            class: LightClass::from_type(&light.kind),
            gamut,
            kelvin_range,
        }
    }

    /// Profile of a group: full gamut, default color temperature range.
    pub fn group() -> Self {
        LightProfile {
            class: LightClass::ExtendedColor,
            gamut: Gamut::Default,
            kelvin_range: KelvinRange::default(),
        }
    }
}
