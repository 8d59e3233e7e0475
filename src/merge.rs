//! Merging one state write into a fully resolved bridge command.
//!
//! A write to a single mirrored state (say `level`) is combined with the
//! confirmed states of its channel into one [`LightCommand`], together with
//! the values the mirror should show once the bridge accepted it.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::command::LightCommand;
use crate::config::{AdapterConfig, LightClass, LightProfile};
use crate::errors::Error;
use crate::types::{
    Alert, Brightness, Effect, Gamut, Hue, KelvinRange, Rgb, Xy, brightness_to_level,
    degrees_to_hue, kelvin_to_mired, mired_to_kelvin,
};

type Result<T> = std::result::Result<T, Error>;

/// Hardware facts about the light or group a command is for.
#[derive(Debug, Clone)]
pub struct MergeTarget {
    pub gamut: Gamut,
    pub kelvin_range: KelvinRange,
    /// Only on/off can be sent
    pub switch_only: bool,
}

impl From<&LightProfile> for MergeTarget {
    fn from(profile: &LightProfile) -> Self {
        MergeTarget {
            gamut: profile.gamut,
            kelvin_range: profile.kelvin_range,
            switch_only: profile.class == LightClass::OnOff,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MergeSettings {
    pub turn_on_with_others: bool,
    pub native_turn_off: bool,
}

impl From<&AdapterConfig> for MergeSettings {
    fn from(config: &AdapterConfig) -> Self {
        MergeSettings {
            turn_on_with_others: config.turn_on_with_others,
            native_turn_off: config.native_turn_off_behaviour,
        }
    }
}

/// A resolved command and the mirrored values it results in.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub command: LightCommand,
    pub mirror: Map<String, Value>,
}

/// Resolve a write of `value` to `property` against the channel's confirmed
/// states.
///
/// `confirmed` holds only states the bridge confirmed, keyed by property name
/// and in mirrored units. A `command` write carries a JSON object whose keys
/// are resolved like individual writes.
///
/// # Examples
///
/// ```
/// use hue_mirror::merge::{MergeSettings, MergeTarget, merge};
/// use hue_mirror::{Gamut, KelvinRange};
/// use serde_json::{Map, json};
///
/// let target = MergeTarget { gamut: Gamut::C, kelvin_range: KelvinRange::default(), switch_only: false };
/// let settings = MergeSettings { turn_on_with_others: true, native_turn_off: false };
/// let confirmed = json!({"on": false, "bri": 0}).as_object().unwrap().clone();
///
/// let outcome = merge(&confirmed, "level", &json!(50), &target, &settings).unwrap();
/// assert_eq!(outcome.command.on, Some(true));
/// assert_eq!(outcome.command.bri, Some(127));
/// assert_eq!(outcome.mirror["level"], json!(50));
/// ```
pub fn merge(
    confirmed: &Map<String, Value>,
    property: &str,
    value: &Value,
    target: &MergeTarget,
    settings: &MergeSettings,
) -> Result<MergeOutcome> {
    let pending = if property == "command" {
        parse_command(value)?
    } else {
        let mut pending = Map::new();
        pending.insert(property.to_string(), value.clone());
        pending
    };

    let mut merger = Merger {
        confirmed,
        target,
        settings,
        command: LightCommand::new(),
        mirror: Map::new(),
    };
    merger.resolve(&pending)?;

    let mut outcome = merger.finish();
    if !target.switch_only || property == "on" {
        outcome
            .mirror
            .entry(property.to_string())
            .or_insert_with(|| value.clone());
    }
    Ok(outcome)
}

fn parse_command(value: &Value) -> Result<Map<String, Value>> {
    match value {
        Value::String(json) => serde_json::from_str(json).map_err(Error::InvalidCommand),
        Value::Object(map) => Ok(map.clone()),
        other => Err(Error::invalid_value(
            "command",
            &format!("expected a JSON object, got {}", other),
        )),
    }
}

fn number(property: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(Error::invalid_value(
            property,
            &format!("expected a number, got {}", value),
        )),
    }
}

fn boolean(property: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        _ => Err(Error::invalid_value(
            property,
            &format!("expected a boolean, got {}", value),
        )),
    }
}

fn text<'v>(property: &str, value: &'v Value) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| Error::invalid_value(property, &format!("expected a string, got {}", value)))
}

/// `value` wrapped into `0..modulus`.
///
/// ```
/// use hue_mirror::merge::wrap;
///
/// assert_eq!(wrap(65000 + 1000, 65536), 464);
/// assert_eq!(wrap(10 - 20, 255), 245);
/// ```
pub fn wrap(value: i64, modulus: i64) -> i64 {
    value.rem_euclid(modulus)
}

struct Merger<'a> {
    confirmed: &'a Map<String, Value>,
    target: &'a MergeTarget,
    settings: &'a MergeSettings,
    command: LightCommand,
    mirror: Map<String, Value>,
}

impl Merger<'_> {
    fn confirmed_on(&self) -> bool {
        self.confirmed
            .get("on")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn confirmed_number(&self, property: &str) -> Option<f64> {
        self.confirmed
            .get(property)
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite())
    }

    fn resolve(&mut self, pending: &Map<String, Value>) -> Result<()> {
        if let Some(value) = pending.get("on") {
            self.set_on(boolean("on", value)?);
        }
        if let Some(value) = pending.get("level") {
            self.set_brightness(Brightness::from_level(number("level", value)?));
        }
        if let Some(value) = pending.get("bri") {
            self.set_brightness(Brightness::clamped(number("bri", value)?));
        }

        if ["r", "g", "b"].iter().any(|c| pending.contains_key(*c)) {
            self.set_rgb(pending)?;
        } else if let Some(value) = pending.get("xy") {
            self.set_xy(value)?;
        }

        if let Some(value) = pending.get("ct") {
            self.set_ct(number("ct", value)?);
        }
        if let Some(value) = pending.get("hue") {
            self.set_hue(Hue::from_degrees(number("hue", value)?));
        }
        if let Some(value) = pending.get("sat") {
            self.set_sat(number("sat", value)?);
        }

        if let Some(value) = pending.get("alert") {
            let alert = Alert::from_str(text("alert", value)?)
                .map_err(|_| Error::invalid_value("alert", &format!("unknown alert {}", value)))?;
            self.command.alert = Some(alert);
            self.mirror.insert("alert".into(), Value::from(alert.as_ref()));
        }
        if let Some(value) = pending.get("effect") {
            let effect = Effect::from_str(text("effect", value)?)
                .map_err(|_| Error::invalid_value("effect", &format!("unknown effect {}", value)))?;
            self.command.effect = Some(effect);
            self.mirror.insert("effect".into(), Value::from(effect.as_ref()));
            self.imply_on();
        }

        match pending.get("transitiontime") {
            Some(value) => {
                let time = number("transitiontime", value)?.round().clamp(0.0, 65535.0) as u16;
                self.command.transitiontime = Some(time);
                self.mirror.insert("transitiontime".into(), Value::from(time));
            }
            None => {
                self.command.transitiontime = self
                    .confirmed_number("transitiontime")
                    .map(|t| t.round().clamp(0.0, 65535.0) as u16);
            }
        }

        self.apply_increments(pending)
    }

    fn apply_increments(&mut self, pending: &Map<String, Value>) -> Result<()> {
        // Steps are bounded by their native range before any arithmetic.
        let increment = |name: &str, limit: f64| -> Result<Option<i64>> {
            match pending.get(name) {
                Some(value) => {
                    let inc = number(name, value)?.round().clamp(-limit, limit) as i64;
                    Ok(Some(inc).filter(|i| *i != 0))
                }
                None => Ok(None),
            }
        };

        if let Some(inc) = increment("bri_inc", 254.0)?
            && !self.mirror.contains_key("bri")
        {
            let base = self.confirmed_number("bri").unwrap_or(0.0) as i64;
            self.set_brightness(Brightness::clamped(wrap(base + inc, 255) as f64));
        }

        if let Some(inc) = increment("hue_inc", 65534.0)?
            && !self.mirror.contains_key("hue")
        {
            let base = i64::from(degrees_to_hue(self.confirmed_number("hue").unwrap_or(0.0)));
            self.set_hue(Hue::new(wrap(base + inc, Hue::RANGE) as u16));
        }

        if let Some(inc) = increment("sat_inc", 254.0)?
            && !self.mirror.contains_key("sat")
        {
            let base = self.confirmed_number("sat").unwrap_or(0.0) as i64;
            self.set_sat(wrap(base + inc, 255) as f64);
        }

        if let Some(inc) = increment("ct_inc", 65534.0)?
            && !self.mirror.contains_key("ct")
        {
            let (lo, hi) = self.target.kelvin_range.mired_bounds();
            let (lo, hi) = (i64::from(lo), i64::from(hi));
            let base = self
                .confirmed_number("ct")
                .map(|kelvin| kelvin_to_mired(kelvin) as i64)
                .unwrap_or(lo)
                .clamp(lo, hi);
            let mired = lo + wrap(base - lo + inc, hi - lo + 1);
            self.set_mired(mired as u16);
        }

        Ok(())
    }

    fn set_on(&mut self, on: bool) {
        self.command.power(on);
        self.mirror.insert("on".into(), Value::from(on));
        if !on {
            self.mirror_off();
            return;
        }
        let dark = self.confirmed_number("bri").is_none_or(|bri| bri <= 0.0);
        if dark && self.command.bri.is_none() {
            self.set_brightness(Brightness::new());
        }
    }

    /// A brightness of 0 turns the light off instead.
    fn set_brightness(&mut self, brightness: Brightness) {
        if brightness.is_off() {
            self.command.power(false);
            self.command.bri = None;
            self.mirror.insert("on".into(), Value::from(false));
            self.mirror_off();
        } else {
            self.command.brightness(&brightness);
            self.command.power(true);
            self.mirror.insert("on".into(), Value::from(true));
            self.mirror.insert("bri".into(), Value::from(brightness.value()));
        }
    }

    fn mirror_off(&mut self) {
        if !self.settings.native_turn_off {
            self.mirror.insert("bri".into(), Value::from(0));
        }
    }

    /// Turn an off light on at full brightness unless brightness or power
    /// are already part of the command.
    fn force_on(&mut self) {
        if self.command.on.is_none() && self.command.bri.is_none() && !self.confirmed_on() {
            self.set_brightness(Brightness::new());
        }
    }

    fn imply_on(&mut self) {
        if self.settings.turn_on_with_others {
            self.force_on();
        }
    }

    fn set_rgb(&mut self, pending: &Map<String, Value>) -> Result<()> {
        let mut channels = [0.0; 3];
        for (slot, name) in channels.iter_mut().zip(["r", "g", "b"]) {
            *slot = match pending.get(name).or_else(|| self.confirmed.get(name)) {
                Some(value) => number(name, value)?.clamp(0.0, 255.0),
                None => 0.0,
            };
        }
        let [r, g, b] = channels;

        let converted = Rgb::new(r / 255.0, g / 255.0, b / 255.0).to_xy_brightness(self.target.gamut);
        if !converted.xy.is_finite() {
            return Err(Error::OutOfGamut {
                x: converted.xy.x,
                y: converted.xy.y,
            });
        }

        self.command.xy(&converted.xy);
        self.mirror.insert("xy".into(), Value::from(converted.xy.to_string()));
        for (name, value) in ["r", "g", "b"].into_iter().zip(channels) {
            self.mirror.insert(name.into(), Value::from(value.round() as u8));
        }
        self.set_brightness(Brightness::clamped(f64::from(converted.brightness)));
        Ok(())
    }

    fn set_xy(&mut self, value: &Value) -> Result<()> {
        let xy = Xy::from_value(value)
            .ok_or_else(|| Error::invalid_value("xy", &format!("expected \"x,y\", got {}", value)))?;
        if !xy.is_finite() {
            return Err(Error::OutOfGamut { x: xy.x, y: xy.y });
        }
        let corrected = self.target.gamut.correct(xy);
        if !corrected.is_finite() {
            return Err(Error::OutOfGamut { x: xy.x, y: xy.y });
        }

        self.force_on();
        self.command.xy(&corrected);
        self.mirror.insert("xy".into(), Value::from(corrected.to_string()));

        let bri = self
            .command
            .bri
            .map(f64::from)
            .or_else(|| self.confirmed_number("bri").filter(|bri| *bri > 0.0))
            .unwrap_or(f64::from(Brightness::MAX));
        let [r, g, b] = corrected.to_rgb(bri / f64::from(Brightness::MAX)).to_u8();
        self.mirror.insert("r".into(), Value::from(r));
        self.mirror.insert("g".into(), Value::from(g));
        self.mirror.insert("b".into(), Value::from(b));
        Ok(())
    }

    fn set_ct(&mut self, kelvin: f64) {
        self.set_mired(self.target.kelvin_range.to_mired(kelvin));
    }

    fn set_mired(&mut self, mired: u16) {
        self.command.ct = Some(mired);
        let kelvin = mired_to_kelvin(f64::from(mired));
        if kelvin.is_finite() {
            self.mirror.insert("ct".into(), Value::from(kelvin as i64));
        }
        self.imply_on();
    }

    fn set_hue(&mut self, hue: Hue) {
        self.command.hue(&hue);
        self.mirror.insert("hue".into(), Value::from(hue.degrees()));
        self.imply_on();
    }

    fn set_sat(&mut self, sat: f64) {
        let sat = sat.round().clamp(0.0, 254.0) as u8;
        self.command.sat = Some(sat);
        self.mirror.insert("sat".into(), Value::from(sat));
        self.imply_on();
    }

    fn finish(self) -> MergeOutcome {
        let Merger {
            target,
            mut command,
            mut mirror,
            ..
        } = self;

        command.keep_single_colormode();
        if let Some(mode) = command.colormode() {
            mirror.insert("colormode".into(), Value::from(mode));
        }
        if command.on == Some(false) {
            command.bri = None;
        }
        if let Some(bri) = mirror.get("bri").and_then(Value::as_f64) {
            mirror.insert("level".into(), Value::from(brightness_to_level(bri)));
        }

        if target.switch_only {
            command = command.switch_only();
            mirror.retain(|key, _| key == "on");
            if let Some(on) = command.on {
                mirror.insert("on".into(), Value::from(on));
            }
        }

        MergeOutcome { command, mirror }
    }
}
