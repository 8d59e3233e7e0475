//! Metadata of every property the mirror surfaces.
//!
//! This table decides which bridge properties are mirrored at all and how
//! their state entities are typed. Properties missing here are skipped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tree::{EntityKind, EntityMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Number,
    String,
}

/// How one mirrored property is typed and presented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub value_type: ValueType,
    pub writable: bool,
    pub role: &'static str,
    pub unit: Option<&'static str>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

const fn spec(name: &'static str, value_type: ValueType, writable: bool, role: &'static str) -> PropertySpec {
    PropertySpec {
        name,
        value_type,
        writable,
        role,
        unit: None,
        min: None,
        max: None,
    }
}

const fn ranged(
    name: &'static str,
    writable: bool,
    role: &'static str,
    unit: Option<&'static str>,
    min: f64,
    max: f64,
) -> PropertySpec {
    PropertySpec {
        name,
        value_type: ValueType::Number,
        writable,
        role,
        unit,
        min: Some(min),
        max: Some(max),
    }
}

const fn unit(name: &'static str, role: &'static str, unit: &'static str) -> PropertySpec {
    PropertySpec {
        name,
        value_type: ValueType::Number,
        writable: false,
        role,
        unit: Some(unit),
        min: None,
        max: None,
    }
}

use ValueType::{Boolean, Number, String as Text};

/// Role of the saturation state; channels holding one join the color index.
pub const SATURATION_ROLE: &str = "level.color.saturation";

static PROPERTIES: &[PropertySpec] = &[
    // lights and groups
    spec("on", Boolean, true, "switch.light"),
    ranged("bri", true, "level.dimmer", None, 0.0, 254.0),
    ranged("level", true, "level.dimmer", Some("%"), 0.0, 100.0),
    ranged("hue", true, "level.color.hue", Some("°"), 0.0, 360.0),
    ranged("sat", true, SATURATION_ROLE, None, 0.0, 254.0),
    spec("xy", Text, true, "level.color.xy"),
    PropertySpec {
        unit: Some("K"),
        ..spec("ct", Number, true, "level.color.temperature")
    },
    ranged("r", true, "level.color.red", None, 0.0, 255.0),
    ranged("g", true, "level.color.green", None, 0.0, 255.0),
    ranged("b", true, "level.color.blue", None, 0.0, 255.0),
    spec("alert", Text, true, "switch"),
    spec("effect", Text, true, "switch"),
    spec("colormode", Text, false, "text"),
    spec("mode", Text, false, "text"),
    spec("reachable", Boolean, false, "indicator.reachable"),
    ranged("transitiontime", true, "level", Some("100ms"), 0.0, 65535.0),
    spec("command", Text, true, "json"),
    ranged("bri_inc", true, "level", None, -254.0, 254.0),
    ranged("hue_inc", true, "level", None, -65534.0, 65534.0),
    ranged("sat_inc", true, "level", None, -254.0, 254.0),
    ranged("ct_inc", true, "level", None, -65534.0, 65534.0),
    spec("anyOn", Boolean, true, "switch.light"),
    spec("allOn", Boolean, false, "indicator"),
    spec("activeStream", Boolean, true, "switch"),
    spec("class", Text, false, "text"),
    // sensor state
    unit("temperature", "value.temperature", "°C"),
    unit("humidity", "value.humidity", "%"),
    unit("pressure", "value.pressure", "hPa"),
    spec("presence", Boolean, false, "sensor.motion"),
    spec("lightlevel", Number, false, "value.brightness"),
    unit("lux", "value.brightness", "lux"),
    spec("dark", Boolean, false, "indicator"),
    spec("daylight", Boolean, false, "indicator"),
    spec("buttonevent", Number, false, "value"),
    spec("rotaryevent", Number, false, "value"),
    spec("expectedrotation", Number, false, "value"),
    unit("expectedeventduration", "value", "ms"),
    spec("lastupdated", Text, false, "date"),
    spec("status", Number, false, "value"),
    spec("flag", Boolean, false, "indicator"),
    spec("open", Boolean, false, "sensor.window"),
    spec("water", Boolean, false, "sensor.alarm.flood"),
    spec("fire", Boolean, false, "sensor.alarm.fire"),
    spec("vibration", Boolean, false, "sensor.vibration"),
    spec("tampered", Boolean, false, "indicator.tamper"),
    // sensor config
    ranged("battery", false, "value.battery", Some("%"), 0.0, 100.0),
    spec("sensitivity", Number, false, "value"),
    spec("sensitivitymax", Number, false, "value"),
    spec("ledindication", Boolean, false, "indicator"),
    spec("usertest", Boolean, false, "indicator"),
    spec("configured", Boolean, false, "indicator"),
    spec("tholddark", Number, false, "value"),
    spec("tholdoffset", Number, false, "value"),
    spec("sunriseoffset", Number, false, "value"),
    spec("sunsetoffset", Number, false, "value"),
    // scenes
    spec("scene", Boolean, true, "button"),
];

/// Look up the metadata of a mirrored property name.
///
/// Scene states (`scene_*`) share one entry.
///
/// # Examples
///
/// ```
/// use hue_mirror::properties::{self, ValueType};
///
/// let bri = properties::lookup("bri").unwrap();
/// assert_eq!(bri.value_type, ValueType::Number);
/// assert_eq!(bri.max, Some(254.0));
/// assert!(properties::lookup("scene_relax").unwrap().writable);
/// assert!(properties::lookup("swupdate").is_none());
/// ```
pub fn lookup(name: &str) -> Option<&'static PropertySpec> {
    let name = if name.starts_with("scene_") { "scene" } else { name };
    PROPERTIES.iter().find(|spec| spec.name == name)
}

impl PropertySpec {
    /// Metadata of the state entity for this property.
    pub fn metadata(&self, display_name: &str, default: Value) -> EntityMetadata {
        EntityMetadata {
            kind: EntityKind::State,
            name: display_name.to_string(),
            role: self.role.to_string(),
            value_type: Some(self.value_type),
            writable: self.writable,
            unit: self.unit.map(String::from),
            min: self.min,
            max: self.max,
            default: Some(default),
            native: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_unique() {
        let mut seen = HashSet::new();
        for spec in PROPERTIES {
            assert!(seen.insert(spec.name), "duplicate property {}", spec.name);
        }
    }

    #[test]
    fn test_examples() {
        let on = lookup("on").unwrap();
        assert_eq!((on.value_type, on.writable), (ValueType::Boolean, true));

        let hue = lookup("hue").unwrap();
        assert_eq!((hue.min, hue.max), (Some(0.0), Some(360.0)));

        let ct = lookup("ct").unwrap();
        assert_eq!(ct.unit, Some("K"));
        assert_eq!(ct.min, None);

        assert!(!lookup("reachable").unwrap().writable);
        assert_eq!(lookup("battery").unwrap().max, Some(100.0));
        assert_eq!(lookup("xy").unwrap().value_type, ValueType::String);
    }

    #[test]
    fn test_metadata() {
        let meta = lookup("level").unwrap().metadata("Lamp level", Value::from(0));
        assert_eq!(meta.kind, EntityKind::State);
        assert_eq!(meta.unit.as_deref(), Some("%"));
        assert!(meta.writable);
    }
}
