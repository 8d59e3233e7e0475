//! Mirrored path derivation and the path/id translation tables.

use std::collections::{HashMap, HashSet};

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

const FORBIDDEN: &[char] = &['.', ']', '[', '*', ',', ';', '\'', '"', '`', '<', '>', '\\', '?'];

/// Replace whitespace and characters that are not allowed in a path segment.
///
/// # Examples
///
/// ```
/// use hue_mirror::naming::sanitize;
///
/// assert_eq!(sanitize("Living room"), "Living_room");
/// assert_eq!(sanitize("Desk [left]"), "Desk__left_");
/// assert_eq!(sanitize("v1.2"), "v1_2");
/// ```
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_whitespace() || FORBIDDEN.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Mirrored path of a channel, below `prefix` in legacy mode.
pub fn channel_path(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}.{}", prefix, sanitize(name)),
        None => sanitize(name),
    }
}

/// Kinds of bridge devices tracked by the poll lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Light,
    Sensor,
    Group,
}

/// A registered device and the channel path it is mirrored at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEntry {
    pub id: String,
    pub name: String,
}

/// Where a scene state recalls its scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneTarget {
    pub scene_id: String,
    /// Group the scene is recalled through; "0" for light scenes
    pub group_id: String,
}

/// Outcome of [`NameTables::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    Preferred(String),
    Disambiguated(String),
}

impl Claim {
    pub fn into_path(self) -> String {
        match self {
            Claim::Preferred(path) | Claim::Disambiguated(path) => path,
        }
    }
}

/// A path offered to [`NameTables::claim`].
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub path: &'a str,
    /// An existing mirrored entity of a different type already lives here
    pub foreign: bool,
}

/// Path/id translation tables, rebuilt on every sync.
#[derive(Debug, Default)]
pub struct NameTables {
    light_ids: HashMap<String, String>,
    group_ids: HashMap<String, String>,
    scenes: HashMap<String, SceneTarget>,
    lights: Vec<PollEntry>,
    sensors: Vec<PollEntry>,
    groups: Vec<PollEntry>,
    claimed: HashSet<String>,
}

impl NameTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Claim the preferred path, or the disambiguated one when the preferred
    /// path is taken this pass or by a foreign entity.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::naming::{Candidate, Claim, NameTables};
    ///
    /// let mut tables = NameTables::new();
    /// let plain = Candidate { path: "Hallway", foreign: false };
    /// let typed = Candidate { path: "Hallway_ZLLTemperature", foreign: false };
    ///
    /// assert_eq!(tables.claim(plain, typed).unwrap(), Claim::Preferred("Hallway".into()));
    /// assert_eq!(
    ///     tables.claim(plain, typed).unwrap(),
    ///     Claim::Disambiguated("Hallway_ZLLTemperature".into())
    /// );
    /// assert!(tables.claim(plain, typed).is_err());
    /// ```
    pub fn claim(&mut self, preferred: Candidate<'_>, fallback: Candidate<'_>) -> Result<Claim> {
        if self.is_free(preferred) {
            self.claimed.insert(preferred.path.to_string());
            return Ok(Claim::Preferred(preferred.path.to_string()));
        }
        if self.is_free(fallback) {
            self.claimed.insert(fallback.path.to_string());
            return Ok(Claim::Disambiguated(fallback.path.to_string()));
        }
        Err(Error::NameConflict {
            path: fallback.path.to_string(),
        })
    }

    fn is_free(&self, candidate: Candidate<'_>) -> bool {
        !candidate.foreign && !self.claimed.contains(candidate.path)
    }

    /// Record a device mirrored at `path`.
    pub fn register(&mut self, kind: DeviceKind, id: &str, path: &str) {
        let entry = PollEntry {
            id: id.to_string(),
            name: path.to_string(),
        };
        match kind {
            DeviceKind::Light => {
                self.light_ids.insert(path.to_string(), id.to_string());
                self.lights.push(entry);
            }
            DeviceKind::Group => {
                self.group_ids.insert(path.to_string(), id.to_string());
                self.groups.push(entry);
            }
            DeviceKind::Sensor => self.sensors.push(entry),
        }
    }

    /// Map a group path to its id without adding it to the poll list.
    pub fn register_unpolled_group(&mut self, id: &str, path: &str) {
        self.group_ids.insert(path.to_string(), id.to_string());
    }

    pub fn register_scene(&mut self, path: &str, target: SceneTarget) {
        self.scenes.insert(path.to_string(), target);
    }

    pub fn entries(&self, kind: DeviceKind) -> &[PollEntry] {
        match kind {
            DeviceKind::Light => &self.lights,
            DeviceKind::Sensor => &self.sensors,
            DeviceKind::Group => &self.groups,
        }
    }

    /// Channel path of a registered device.
    pub fn path_of(&self, kind: DeviceKind, id: &str) -> Option<&str> {
        if kind == DeviceKind::Group && id == "0" {
            return self
                .group_ids
                .iter()
                .find(|(_, gid)| gid.as_str() == "0")
                .map(|(path, _)| path.as_str());
        }
        self.entries(kind)
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.name.as_str())
    }

    pub fn light_id(&self, path: &str) -> Option<&str> {
        self.light_ids.get(path).map(String::as_str)
    }

    pub fn group_id(&self, path: &str) -> Option<&str> {
        self.group_ids.get(path).map(String::as_str)
    }

    pub fn scene(&self, path: &str) -> Option<&SceneTarget> {
        self.scenes.get(path)
    }

    /// State path of a scene by its bridge id.
    pub fn scene_path(&self, scene_id: &str) -> Option<&str> {
        self.scenes
            .iter()
            .find(|(_, target)| target.scene_id == scene_id)
            .map(|(path, _)| path.as_str())
    }

    /// Drop a device that disappeared from the bridge.
    pub fn remove(&mut self, kind: DeviceKind, id: &str) -> Option<PollEntry> {
        let list = match kind {
            DeviceKind::Light => &mut self.lights,
            DeviceKind::Sensor => &mut self.sensors,
            DeviceKind::Group => &mut self.groups,
        };
        let index = list.iter().position(|entry| entry.id == id)?;
        let entry = list.remove(index);
        match kind {
            DeviceKind::Light => {
                self.light_ids.remove(&entry.name);
            }
            DeviceKind::Group => {
                self.group_ids.remove(&entry.name);
                let child_prefix = format!("{}.", entry.name);
                self.scenes.retain(|path, _| !path.starts_with(&child_prefix));
            }
            DeviceKind::Sensor => {}
        }
        self.claimed.remove(&entry.name);
        Some(entry)
    }
}
