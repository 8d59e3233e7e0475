//! Point-in-time reads of the bridge's device hierarchy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One full read of the bridge's configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub lights: BTreeMap<String, LightRecord>,
    #[serde(default)]
    pub sensors: BTreeMap<String, SensorRecord>,
    /// `None` when the bridge left the section out entirely.
    #[serde(default)]
    pub groups: Option<BTreeMap<String, GroupRecord>>,
    #[serde(default)]
    pub scenes: BTreeMap<String, SceneRecord>,
    #[serde(default)]
    pub config: BridgeInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bridgeid: Option<String>,
    #[serde(default)]
    pub modelid: Option<String>,
    #[serde(default)]
    pub apiversion: Option<String>,
    #[serde(default)]
    pub swversion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub modelid: Option<String>,
    #[serde(default)]
    pub manufacturername: Option<String>,
    #[serde(default)]
    pub uniqueid: Option<String>,
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub control: Option<Control>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Control {
    #[serde(default)]
    pub colorgamuttype: Option<String>,
    #[serde(default)]
    pub ct: Option<MiredRange>,
}

/// Native color temperature capability, in mired.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MiredRange {
    pub min: u16,
    pub max: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub modelid: Option<String>,
    #[serde(default)]
    pub manufacturername: Option<String>,
    #[serde(default)]
    pub uniqueid: Option<String>,
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub config: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub lights: Vec<String>,
    #[serde(default)]
    pub action: Map<String, Value>,
    /// Aggregate `any_on` / `all_on` flags
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub stream: Option<StreamInfo>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Group a `GroupScene` belongs to
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub lights: Vec<String>,
    #[serde(default)]
    pub recycle: bool,
}

/// Sensor types mirrored from the bridge. CLIP types are created by apps and
/// only mirrored on request.
const HARDWARE_SENSORS: &[&str] = &[
    "ZLLSwitch",
    "ZGPSwitch",
    "ZLLPresence",
    "ZLLTemperature",
    "ZLLLightLevel",
    "ZLLRelativeRotary",
    "ZHASwitch",
    "ZHAPresence",
    "ZHATemperature",
    "ZHALightLevel",
    "ZHAHumidity",
    "ZHAPressure",
    "ZHAOpenClose",
    "ZHAWater",
    "ZHAFire",
    "ZHAVibration",
    "Daylight",
];

const SOFTWARE_SENSORS: &[&str] = &[
    "CLIPGenericStatus",
    "CLIPGenericFlag",
    "CLIPPresence",
    "CLIPTemperature",
    "CLIPHumidity",
    "CLIPLightLevel",
    "CLIPOpenClose",
    "CLIPSwitch",
];

impl SensorRecord {
    pub fn is_supported(&self, software_sensors: bool) -> bool {
        HARDWARE_SENSORS.contains(&self.kind.as_str())
            || (software_sensors && SOFTWARE_SENSORS.contains(&self.kind.as_str()))
    }

    /// Role recorded on the mirrored channel.
    pub fn role(&self) -> &'static str {
        let kind = self.kind.trim_start_matches("ZLL").trim_start_matches("ZHA");
        let kind = kind.trim_start_matches("ZGP").trim_start_matches("CLIP");
        match kind {
            "Presence" => "sensor.motion",
            "Temperature" => "sensor.temperature",
            "LightLevel" => "sensor.lightlevel",
            "Humidity" => "sensor.humidity",
            "Pressure" => "sensor.pressure",
            "Switch" => "sensor.switch",
            "RelativeRotary" => "sensor.rotary",
            "OpenClose" => "sensor.door",
            "Water" => "sensor.alarm.flood",
            "Fire" => "sensor.alarm.fire",
            "Vibration" => "sensor.vibration",
            "Daylight" => "sensor.daylight",
            "GenericStatus" => "sensor.status",
            "GenericFlag" => "sensor.flag",
            _ => "sensor",
        }
    }
}

impl LightRecord {
    pub fn is_osram(&self) -> bool {
        self.manufacturername
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("osram"))
    }
}

impl Snapshot {
    /// True when the bridge reported nothing at all.
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
            && self.sensors.is_empty()
            && self.groups.as_ref().is_none_or(|g| g.is_empty())
            && self.config.name.is_empty()
    }

    /// Number of devices this snapshot holds that the engine would register.
    pub fn device_count(&self, software_sensors: bool, ignore_groups: bool) -> usize {
        let sensors = self
            .sensors
            .values()
            .filter(|s| s.is_supported(software_sensors))
            .count();
        let groups = if ignore_groups {
            0
        } else {
            self.groups.as_ref().map_or(0, |g| g.len())
        };
        self.lights.len() + sensors + groups
    }
}

/// Ids in numeric order where they are numeric, lexical otherwise.
pub fn sorted_ids<'a, V>(map: &'a BTreeMap<String, V>) -> Vec<&'a String> {
    let mut ids: Vec<&String> = map.keys().collect();
    ids.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    });
    ids
}
