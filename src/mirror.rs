//! Bridge property bags converted into mirrored state values.
//!
//! The same conversions run when entities are created, on every poll and for
//! write confirmations, so a freshly created state never flips on the first
//! poll.

use log::debug;
use serde_json::{Map, Value};

use crate::config::{AdapterConfig, LightClass};
use crate::properties;
use crate::snapshot::{GroupRecord, LightRecord, SensorRecord};
use crate::types::{Brightness, Xy, brightness_to_level, hue_to_degrees, mired_to_kelvin};

/// How bridge states are interpreted for one light or group.
#[derive(Debug, Clone, Copy, Default)]
pub struct MirrorOptions {
    pub native_turn_off: bool,
    /// Keep the brightness of a light that reports itself unreachable
    pub trust_unreachable: bool,
}

impl MirrorOptions {
    pub fn new(config: &AdapterConfig) -> Self {
        MirrorOptions {
            native_turn_off: config.native_turn_off_behaviour,
            trust_unreachable: false,
        }
    }

    pub fn for_light(config: &AdapterConfig, light: &LightRecord) -> Self {
        MirrorOptions {
            trust_unreachable: config.ignore_osram && light.is_osram(),
            ..Self::new(config)
        }
    }
}

type Transform = fn(&Value) -> Option<Value>;

const TRANSFORMS: &[(&str, Transform)] = &[
    ("hue", hue_degrees),
    ("ct", mired_as_kelvin),
    ("xy", xy_string),
    ("temperature", hundredths),
    ("humidity", hundredths),
];

fn hue_degrees(value: &Value) -> Option<Value> {
    let raw = value.as_u64()?;
    Some(Value::from(hue_to_degrees(raw.min(u64::from(u16::MAX)) as u16)))
}

fn mired_as_kelvin(value: &Value) -> Option<Value> {
    let kelvin = mired_to_kelvin(value.as_f64()?);
    if kelvin.is_finite() {
        Some(Value::from(kelvin as i64))
    } else {
        debug!("omitting color temperature for mired {}", value);
        None
    }
}

fn xy_string(value: &Value) -> Option<Value> {
    Xy::from_value(value).map(|xy| Value::from(xy.to_string()))
}

fn hundredths(value: &Value) -> Option<Value> {
    value.as_f64().map(|v| Value::from(v / 100.0))
}

/// `round(10^((lightlevel - 1) / 10000))`
///
/// ```
/// use hue_mirror::mirror::lux;
///
/// assert_eq!(lux(1.0), 1.0);
/// assert_eq!(lux(20001.0), 100.0);
/// ```
pub fn lux(lightlevel: f64) -> f64 {
    10f64.powf((lightlevel - 1.0) / 10_000.0).round()
}

/// Convert one property, or `None` when it is not mirrored.
fn convert(name: &str, value: &Value) -> Option<Value> {
    if properties::lookup(name).is_none() {
        debug!("skipping unsupported property {}", name);
        return None;
    }
    match TRANSFORMS.iter().find(|(key, _)| *key == name) {
        Some((_, transform)) => transform(value),
        None => Some(value.clone()),
    }
}

fn convert_all<'a>(values: impl Iterator<Item = (&'a String, &'a Value)>, out: &mut Map<String, Value>) {
    for (name, value) in values {
        if let Some(converted) = convert(name, value) {
            out.insert(name.clone(), converted);
        }
    }
}

/// Mirrored states of a light's `state` bag, or of a group's `action` bag.
///
/// # Examples
///
/// ```
/// use hue_mirror::mirror::{MirrorOptions, light_states};
/// use serde_json::json;
///
/// let state = json!({"on": true, "bri": 200, "xy": "0.3,0.3"});
/// let mirrored = light_states(state.as_object().unwrap(), &MirrorOptions::default());
/// assert_eq!(mirrored["level"], json!(79));
/// assert_eq!(mirrored["xy"], json!("0.3,0.3"));
/// assert!(mirrored.contains_key("r"));
/// ```
pub fn light_states(state: &Map<String, Value>, options: &MirrorOptions) -> Map<String, Value> {
    let mut out = Map::new();
    convert_all(state.iter(), &mut out);

    let reachable = state.get("reachable").and_then(Value::as_bool).unwrap_or(true);
    if !reachable && !options.trust_unreachable {
        out.insert("on".into(), Value::from(false));
        if out.contains_key("bri") {
            out.insert("bri".into(), Value::from(0));
        }
    }

    let on = out.get("on").and_then(Value::as_bool).unwrap_or(true);
    if !on && !options.native_turn_off && out.contains_key("bri") {
        out.insert("bri".into(), Value::from(0));
    }

    let bri = out.get("bri").and_then(Value::as_f64);
    if let Some(bri) = bri {
        out.insert("level".into(), Value::from(brightness_to_level(bri)));
    }

    if let Some(xy) = out.get("xy").and_then(Xy::from_value) {
        let bri = bri.unwrap_or(f64::from(Brightness::MAX));
        let [r, g, b] = xy.to_rgb(bri / f64::from(Brightness::MAX)).to_u8();
        out.insert("r".into(), Value::from(r));
        out.insert("g".into(), Value::from(g));
        out.insert("b".into(), Value::from(b));
    }

    out
}

/// Mirrored states of a light record.
pub fn light_record_states(light: &LightRecord, config: &AdapterConfig) -> Map<String, Value> {
    light_states(&light.state, &MirrorOptions::for_light(config, light))
}

/// Mirrored states of a group: its action plus the aggregate flags.
pub fn group_states(group: &GroupRecord, options: &MirrorOptions) -> Map<String, Value> {
    let mut out = light_states(&group.action, options);

    let flag = |key: &str| group.state.get(key).and_then(Value::as_bool).unwrap_or(false);
    out.insert("anyOn".into(), Value::from(flag("any_on")));
    out.insert("allOn".into(), Value::from(flag("all_on")));

    if let Some(stream) = group.stream {
        out.insert("activeStream".into(), Value::from(stream.active));
    }
    if let Some(class) = &group.class {
        out.insert("class".into(), Value::from(class.as_str()));
    }
    out
}

/// Mirrored states of a sensor: its state and config bags.
///
/// The config's `on` flag only tells whether the sensor is enabled and is not
/// mirrored.
pub fn sensor_states(sensor: &SensorRecord) -> Map<String, Value> {
    let mut out = Map::new();
    convert_all(sensor.state.iter(), &mut out);
    convert_all(sensor.config.iter().filter(|(key, _)| key.as_str() != "on"), &mut out);

    if let Some(level) = sensor.state.get("lightlevel").and_then(Value::as_f64) {
        out.insert("lux".into(), Value::from(lux(level)));
    }
    out
}

/// Local-only states a channel gets once, when it is first created.
///
/// `class` is `None` for groups.
pub fn synthetic_states(class: Option<LightClass>) -> Vec<(&'static str, Value)> {
    let mut states = vec![("command", Value::from("{}"))];
    if class == Some(LightClass::OnOff) {
        return states;
    }
    states.push(("transitiontime", Value::from(4)));
    states.push(("bri_inc", Value::from(0)));

    let color = matches!(class, None | Some(LightClass::ExtendedColor) | Some(LightClass::Color));
    let ct = color || class == Some(LightClass::ColorTemperature);
    if color {
        states.push(("hue_inc", Value::from(0)));
        states.push(("sat_inc", Value::from(0)));
    }
    if ct {
        states.push(("ct_inc", Value::from(0)));
    }
    states
}
