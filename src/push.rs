//! Translation of push stream events into mirrored state updates.

use std::collections::HashMap;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::errors::Error;
use crate::mirror::{MirrorOptions, lux};
use crate::naming::{DeviceKind, NameTables};
use crate::tree::ObjectTree;
use crate::types::{Brightness, Xy, level_to_brightness, mired_to_kelvin};

type Result<T> = std::result::Result<T, Error>;

/// Resource types the translator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    Light,
    GroupedLight,
    Motion,
    Temperature,
    LightLevel,
    DevicePower,
    Button,
    RelativeRotary,
    Contact,
    Tamper,
    ZigbeeConnectivity,
    Scene,
    EntertainmentConfiguration,
}

/// Last event reported by a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ButtonEvent {
    InitialPress,
    Repeat,
    ShortRelease,
    LongRelease,
    DoubleShortRelease,
    LongPress,
}

impl ButtonEvent {
    /// Code combined with the control id into `buttonevent`.
    ///
    /// ```
    /// use hue_mirror::push::ButtonEvent;
    ///
    /// assert_eq!(ButtonEvent::ShortRelease.code(), 2);
    /// assert_eq!(ButtonEvent::InitialPress.code(), 0);
    /// ```
    pub fn code(&self) -> u32 {
        match self {
            ButtonEvent::Repeat => 1,
            ButtonEvent::ShortRelease => 2,
            ButtonEvent::LongRelease => 3,
            _ => 0,
        }
    }

    /// Code of a raw event name; unknown names yield 0.
    pub fn code_of(name: &str) -> u32 {
        ButtonEvent::from_str(name).map_or(0, |event| event.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub rid: Uuid,
    pub rtype: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnState {
    pub on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimming {
    /// Percent, 0-100
    pub brightness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorState {
    pub xy: Xy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorTemperature {
    pub mirek: Option<u16>,
    #[serde(default)]
    pub mirek_valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub motion: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureState {
    /// Degrees Celsius
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightLevelState {
    pub light_level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerState {
    pub battery_level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonState {
    pub last_event: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeRotaryState {
    pub last_event: Option<RotaryEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotaryEvent {
    pub action: String,
    pub rotation: Rotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub direction: String,
    pub steps: i64,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactReport {
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TamperReport {
    pub state: String,
}

/// One changed resource from the push stream.
///
/// Only the sub-objects that changed are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub id: Option<Uuid>,
    /// Path of the resource in the legacy API, e.g. "/lights/3"
    pub id_v1: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub owner: Option<ResourceRef>,
    pub on: Option<OnState>,
    pub dimming: Option<Dimming>,
    pub color: Option<ColorState>,
    pub color_temperature: Option<ColorTemperature>,
    pub motion: Option<MotionState>,
    pub temperature: Option<TemperatureState>,
    pub light: Option<LightLevelState>,
    pub power_state: Option<PowerState>,
    pub button: Option<ButtonState>,
    pub relative_rotary: Option<RelativeRotaryState>,
    pub contact_report: Option<ContactReport>,
    pub tamper_reports: Option<Vec<TamperReport>>,
    /// A string for connectivity and entertainment, an object for scenes
    pub status: Option<Value>,
}

impl PushEvent {
    pub fn event_type(&self) -> Option<EventType> {
        EventType::from_str(&self.kind).ok()
    }
}

/// Control id of a button resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonMetadata {
    pub id: Uuid,
    pub control_id: u32,
}

/// Button control ids, filled when the push stream opens.
#[derive(Debug, Clone, Default)]
pub struct DeviceCache {
    control_ids: HashMap<Uuid, u32>,
}

impl DeviceCache {
    pub fn new(buttons: &[ButtonMetadata]) -> Self {
        DeviceCache {
            control_ids: buttons.iter().map(|b| (b.id, b.control_id)).collect(),
        }
    }

    /// Control id of a button, 0 when unknown.
    pub fn control_id(&self, button: Option<Uuid>) -> u32 {
        button
            .and_then(|id| self.control_ids.get(&id).copied())
            .unwrap_or(0)
    }
}

/// Split a legacy id such as "/lights/3" into section and id.
fn legacy_id(id_v1: &str) -> Option<(&str, &str)> {
    id_v1.trim_start_matches('/').split_once('/')
}

/// Mirrored path the event's legacy id refers to.
fn legacy_path(event: &PushEvent, tables: &NameTables) -> Option<String> {
    let (section, id) = legacy_id(event.id_v1.as_deref()?)?;
    let path = match section {
        "lights" => tables.path_of(DeviceKind::Light, id),
        "groups" => tables.path_of(DeviceKind::Group, id),
        "sensors" => tables.path_of(DeviceKind::Sensor, id),
        "scenes" => tables.scene_path(id),
        _ => None,
    };
    path.map(String::from)
}

fn state(channel: &str, property: &str, value: impl Into<Value>) -> (String, Value) {
    (format!("{}.{}", channel, property), value.into())
}

/// Translate one event into `(state path, value)` updates.
///
/// Events of unknown types, and events whose device is not mirrored, are
/// logged and yield no updates.
pub async fn translate<T: ObjectTree>(
    event: &PushEvent,
    tables: &NameTables,
    devices: &DeviceCache,
    tree: &T,
    options: &MirrorOptions,
) -> Result<Vec<(String, Value)>> {
    let Some(kind) = event.event_type() else {
        debug!("ignoring push event of type {}", event.kind);
        return Ok(Vec::new());
    };

    let owner_keyed = matches!(kind, EventType::Contact | EventType::Tamper | EventType::DevicePower);
    let path = if owner_keyed {
        event.owner.as_ref().map(|owner| owner.rid.to_string())
    } else {
        legacy_path(event, tables)
    };
    let Some(path) = path else {
        warn!(
            "dropping {} event for {}: no mirrored device ({:?})",
            kind,
            event.id.map(|id| id.to_string()).unwrap_or_default(),
            event.id_v1
        );
        return Ok(Vec::new());
    };

    let mut updates = Vec::new();
    match kind {
        EventType::Light | EventType::GroupedLight => {
            // Derived off semantics mirror a switched off light as dark,
            // the same way polls do.
            let dark = event.on.is_some_and(|on| !on.on) && !options.native_turn_off;
            if let Some(on) = event.on {
                updates.push(state(&path, "on", on.on));
                if kind == EventType::GroupedLight {
                    updates.push(state(&path, "anyOn", on.on));
                }
            }
            let mut bri = None;
            if dark {
                bri = Some(0.0);
                updates.push(state(&path, "bri", 0));
                updates.push(state(&path, "level", 0));
            } else if let Some(dimming) = event.dimming {
                let value = level_to_brightness(dimming.brightness);
                bri = Some(f64::from(value));
                updates.push(state(&path, "bri", value));
                updates.push(state(&path, "level", dimming.brightness.round().clamp(0.0, 100.0) as u8));
            }
            let xy = match event.color {
                Some(color) => {
                    updates.push(state(&path, "xy", color.xy.to_string()));
                    Some(color.xy)
                }
                None if bri.is_some() || event.on.is_some() => last_xy(tree, &path).await?,
                None => None,
            };
            if let Some(xy) = xy {
                let bri = match bri {
                    Some(bri) => bri,
                    None => last_brightness(tree, &path).await?,
                };
                let [r, g, b] = xy.to_rgb(bri / f64::from(Brightness::MAX)).to_u8();
                updates.push(state(&path, "r", r));
                updates.push(state(&path, "g", g));
                updates.push(state(&path, "b", b));
            }
            if let Some(ct) = event.color_temperature
                && ct.mirek_valid
                && let Some(mirek) = ct.mirek
            {
                let kelvin = mired_to_kelvin(f64::from(mirek));
                if kelvin.is_finite() {
                    updates.push(state(&path, "ct", kelvin as i64));
                }
            }
        }
        EventType::Motion => {
            if let Some(motion) = event.motion {
                updates.push(state(&path, "presence", motion.motion));
            }
        }
        EventType::Temperature => {
            if let Some(temperature) = event.temperature {
                updates.push(state(&path, "temperature", temperature.temperature));
            }
        }
        EventType::LightLevel => {
            if let Some(light) = event.light {
                updates.push(state(&path, "lightlevel", light.light_level));
                updates.push(state(&path, "lux", lux(f64::from(light.light_level))));
            }
        }
        EventType::DevicePower => {
            if let Some(level) = event.power_state.and_then(|p| p.battery_level) {
                updates.push(state(&path, "battery", level));
            }
        }
        EventType::Button => {
            if let Some(last) = event.button.as_ref().and_then(|b| b.last_event.as_deref()) {
                let code = devices.control_id(event.id) * 1000 + ButtonEvent::code_of(last);
                updates.push(state(&path, "buttonevent", code));
            }
        }
        EventType::RelativeRotary => {
            if let Some(last) = event.relative_rotary.as_ref().and_then(|r| r.last_event.as_ref()) {
                let code = devices.control_id(event.id) * 1000 + ButtonEvent::code_of(&last.action);
                let sign = if last.rotation.direction == "counter_clock_wise" { -1 } else { 1 };
                updates.push(state(&path, "rotaryevent", code));
                updates.push(state(&path, "expectedrotation", sign * last.rotation.steps));
                updates.push(state(&path, "expectedeventduration", last.rotation.duration));
            }
        }
        EventType::Contact => {
            if let Some(report) = &event.contact_report {
                updates.push(state(&path, "open", report.state != "contact"));
            }
        }
        EventType::Tamper => {
            if let Some(reports) = &event.tamper_reports {
                let tampered = reports.iter().any(|r| r.state == "tampered");
                updates.push(state(&path, "tampered", tampered));
            }
        }
        EventType::ZigbeeConnectivity => {
            if let Some(status) = event.status.as_ref().and_then(Value::as_str) {
                updates.push(state(&path, "reachable", status == "connected"));
            }
        }
        EventType::Scene => {
            let active = event
                .status
                .as_ref()
                .and_then(|s| s.get("active"))
                .and_then(Value::as_str);
            if let Some(active) = active {
                updates.push((path, Value::from(active != "inactive")));
            }
        }
        EventType::EntertainmentConfiguration => {
            if let Some(status) = event.status.as_ref().and_then(Value::as_str) {
                updates.push(state(&path, "activeStream", status == "active"));
            }
        }
    }
    Ok(updates)
}

async fn last_brightness<T: ObjectTree>(tree: &T, channel: &str) -> Result<f64> {
    let stored = tree.get(&format!("{}.bri", channel)).await?;
    Ok(stored
        .and_then(|s| s.value.as_f64())
        .unwrap_or(f64::from(Brightness::MAX)))
}

async fn last_xy<T: ObjectTree>(tree: &T, channel: &str) -> Result<Option<Xy>> {
    let stored = tree.get(&format!("{}.xy", channel)).await?;
    Ok(stored.and_then(|s| Xy::from_value(&s.value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::SceneTarget;
    use crate::tree::MemoryTree;
    use serde_json::json;

    const BUTTON: &str = "3f0a1b5c-7d2e-4f60-9a81-0b2c3d4e5f60";
    const OWNER: &str = "9c1d2e3f-4a5b-4c6d-8e7f-a0b1c2d3e4f5";

    fn tables() -> NameTables {
        let mut tables = NameTables::new();
        tables.register(DeviceKind::Light, "1", "Lamp");
        tables.register(DeviceKind::Group, "2", "Living");
        tables.register(DeviceKind::Sensor, "5", "Switch");
        tables.register(DeviceKind::Sensor, "6", "Hallway");
        tables.register_scene(
            "Living.scene_Relax",
            SceneTarget {
                scene_id: "abc".into(),
                group_id: "2".into(),
            },
        );
        tables
    }

    fn event(value: Value) -> PushEvent {
        serde_json::from_value(value).unwrap()
    }

    async fn run(value: Value) -> Vec<(String, Value)> {
        let tree = MemoryTree::new();
        tree.set_if_changed("Lamp.bri", json!(127), true).await.unwrap();
        run_with(value, &tree, &MirrorOptions::default()).await
    }

    async fn run_with(value: Value, tree: &MemoryTree, options: &MirrorOptions) -> Vec<(String, Value)> {
        let devices = DeviceCache::new(&[ButtonMetadata {
            id: BUTTON.parse().unwrap(),
            control_id: 4,
        }]);
        translate(&event(value), &tables(), &devices, tree, options).await.unwrap()
    }

    async fn colored_lamp() -> MemoryTree {
        let tree = MemoryTree::new();
        tree.set_if_changed("Lamp.bri", json!(200), true).await.unwrap();
        tree.set_if_changed("Lamp.xy", json!("0.3,0.3"), true).await.unwrap();
        tree
    }

    #[tokio::test]
    async fn test_light_off_matches_polled_states() {
        let tree = colored_lamp().await;
        let off = json!({"type": "light", "id_v1": "/lights/1", "on": {"on": false}});
        let updates = run_with(off, &tree, &MirrorOptions::default()).await;

        let polled = crate::mirror::light_states(
            json!({"on": false, "bri": 200, "xy": "0.3,0.3"}).as_object().unwrap(),
            &MirrorOptions::default(),
        );
        assert_eq!(updates.len(), 6);
        for (path, value) in &updates {
            let property = path.strip_prefix("Lamp.").unwrap();
            assert_eq!(Some(value), polled.get(property), "{}", path);
        }
        assert!(updates.contains(&("Lamp.level".to_string(), json!(0))));
        assert!(updates.contains(&("Lamp.r".to_string(), json!(0))));
    }

    #[tokio::test]
    async fn test_light_off_with_native_semantics() {
        let tree = colored_lamp().await;
        let native = MirrorOptions {
            native_turn_off: true,
            ..Default::default()
        };
        let off = json!({"type": "light", "id_v1": "/lights/1", "on": {"on": false}});
        let updates = run_with(off, &tree, &native).await;
        let [r, g, b] = Xy::new(0.3, 0.3).to_rgb(200.0 / 254.0).to_u8();
        assert_eq!(
            updates,
            vec![
                ("Lamp.on".to_string(), json!(false)),
                ("Lamp.r".to_string(), json!(r)),
                ("Lamp.g".to_string(), json!(g)),
                ("Lamp.b".to_string(), json!(b)),
            ]
        );
    }

    #[tokio::test]
    async fn test_light_on_derives_color_from_stored_brightness() {
        let tree = colored_lamp().await;
        let on = json!({"type": "light", "id_v1": "/lights/1", "on": {"on": true}});
        let updates = run_with(on, &tree, &MirrorOptions::default()).await;
        let [r, g, b] = Xy::new(0.3, 0.3).to_rgb(200.0 / 254.0).to_u8();
        assert_eq!(
            updates,
            vec![
                ("Lamp.on".to_string(), json!(true)),
                ("Lamp.r".to_string(), json!(r)),
                ("Lamp.g".to_string(), json!(g)),
                ("Lamp.b".to_string(), json!(b)),
            ]
        );
    }

    #[tokio::test]
    async fn test_light_color_uses_stored_brightness() {
        let updates = run(json!({
            "type": "light",
            "id_v1": "/lights/1",
            "color": {"xy": {"x": 0.3, "y": 0.3}}
        }))
        .await;
        let [r, g, b] = Xy::new(0.3, 0.3).to_rgb(127.0 / 254.0).to_u8();
        assert_eq!(
            updates,
            vec![
                ("Lamp.xy".to_string(), json!("0.3,0.3")),
                ("Lamp.r".to_string(), json!(r)),
                ("Lamp.g".to_string(), json!(g)),
                ("Lamp.b".to_string(), json!(b)),
            ]
        );
    }

    #[tokio::test]
    async fn test_light_dimming_and_invalid_ct() {
        let updates = run(json!({
            "type": "light",
            "id_v1": "/lights/1",
            "on": {"on": true},
            "dimming": {"brightness": 50.0},
            "color_temperature": {"mirek": null, "mirek_valid": false}
        }))
        .await;
        assert_eq!(
            updates,
            vec![
                ("Lamp.on".to_string(), json!(true)),
                ("Lamp.bri".to_string(), json!(127)),
                ("Lamp.level".to_string(), json!(50)),
            ]
        );
    }

    #[tokio::test]
    async fn test_button_code() {
        let updates = run(json!({
            "type": "button",
            "id": BUTTON,
            "id_v1": "/sensors/5",
            "button": {"last_event": "short_release"}
        }))
        .await;
        assert_eq!(updates, vec![("Switch.buttonevent".to_string(), json!(4002))]);
    }

    #[tokio::test]
    async fn test_button_without_metadata() {
        let updates = run(json!({
            "type": "button",
            "id": OWNER,
            "id_v1": "/sensors/5",
            "button": {"last_event": "long_release"}
        }))
        .await;
        assert_eq!(updates, vec![("Switch.buttonevent".to_string(), json!(3))]);
    }

    #[tokio::test]
    async fn test_owner_keyed_events() {
        let updates = run(json!({
            "type": "contact",
            "owner": {"rid": OWNER, "rtype": "device"},
            "contact_report": {"state": "no_contact"}
        }))
        .await;
        assert_eq!(updates, vec![(format!("{}.open", OWNER), json!(true))]);
    }

    #[tokio::test]
    async fn test_scene_and_stream() {
        let updates = run(json!({
            "type": "scene",
            "id_v1": "/scenes/abc",
            "status": {"active": "static"}
        }))
        .await;
        assert_eq!(updates, vec![("Living.scene_Relax".to_string(), json!(true))]);

        let updates = run(json!({
            "type": "entertainment_configuration",
            "id_v1": "/groups/2",
            "status": "inactive"
        }))
        .await;
        assert_eq!(updates, vec![("Living.activeStream".to_string(), json!(false))]);
    }

    #[tokio::test]
    async fn test_dropped_events() {
        assert!(run(json!({"type": "motion", "motion": {"motion": true}})).await.is_empty());
        assert!(
            run(json!({"type": "motion", "id_v1": "/sensors/99", "motion": {"motion": true}}))
                .await
                .is_empty()
        );
        assert!(run(json!({"type": "bridge_home", "id_v1": "/groups/0"})).await.is_empty());
    }

    #[tokio::test]
    async fn test_motion() {
        let updates = run(json!({
            "type": "motion",
            "id_v1": "/sensors/6",
            "motion": {"motion": true, "motion_valid": true}
        }))
        .await;
        assert_eq!(updates, vec![("Hallway.presence".to_string(), json!(true))]);
    }
}
