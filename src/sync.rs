//! Creating the mirrored entities from a full snapshot.

use log::{debug, error, info, warn};
use serde_json::{Map, Value};

use crate::bridge::Bridge;
use crate::client::DeviceClient;
use crate::config::{LightClass, LightProfile};
use crate::errors::Error;
use crate::mirror::{self, MirrorOptions};
use crate::naming::{Candidate, Claim, DeviceKind, SceneTarget, channel_path, sanitize};
use crate::properties::{self, SATURATION_ROLE};
use crate::snapshot::{GroupRecord, Snapshot, sorted_ids};
use crate::tree::{EntityKind, EntityMetadata, ObjectTree};

type Result<T> = std::result::Result<T, Error>;

/// Index of channels that accept colors.
pub const COLOR_INDEX: &str = "color";

/// Id of the bridge's implicit group holding every light.
pub const ALL_LIGHTS_ID: &str = "0";

const ALL_LIGHTS_NAME: &str = "All";
const LIGHT_SCENES: &str = "lightScenes";
const GROUP_ROLE: &str = "light.group";
const SCENES_ROLE: &str = "scenes";

fn native(id: &str, fields: &[(&str, Option<&str>)]) -> Map<String, Value> {
    let mut native = Map::new();
    native.insert("id".into(), Value::from(id));
    for (key, value) in fields {
        if let Some(value) = value {
            native.insert((*key).into(), Value::from(*value));
        }
    }
    native
}

impl<C: DeviceClient, T: ObjectTree> Bridge<C, T> {
    /// Rebuild the translation tables and create or extend every mirrored
    /// entity the snapshot describes.
    pub async fn sync(&mut self, snapshot: &Snapshot) -> Result<()> {
        if !self.config.ignore_groups && snapshot.groups.is_none() {
            return Err(Error::MissingGroups);
        }
        self.tables.clear();
        self.profiles.clear();
        self.leases.clear();

        let bridge_name = match snapshot.config.name.as_str() {
            "" => "Hue bridge",
            name => name,
        };
        let bridge_path = sanitize(bridge_name);
        let prefix = self.config.use_legacy_structure.then_some(bridge_path.as_str());

        for id in sorted_ids(&snapshot.sensors) {
            let sensor = &snapshot.sensors[id];
            if !sensor.is_supported(self.config.sync_software_sensors) {
                debug!("sensor {} ({}) has unsupported type {}", sensor.name, id, sensor.kind);
                continue;
            }
            let role = sensor.role();
            let Some(path) = self.claim_channel(prefix, &sensor.name, &sensor.kind, role).await? else {
                continue;
            };
            self.tables.register(DeviceKind::Sensor, id, &path);
            let native = native(
                id,
                &[
                    ("type", Some(sensor.kind.as_str())),
                    ("modelid", sensor.modelid.as_deref()),
                    ("manufacturername", sensor.manufacturername.as_deref()),
                    ("uniqueid", sensor.uniqueid.as_deref()),
                ],
            );
            self.upsert_entity(&path, EntityMetadata::channel(&sensor.name, role, native))
                .await?;
            self.create_states(&path, &mirror::sensor_states(sensor), None).await?;
        }

        for id in sorted_ids(&snapshot.lights) {
            let light = &snapshot.lights[id];
            let profile = LightProfile::from_light(light);
            let role = profile.class.role();
            let Some(path) = self.claim_channel(prefix, &light.name, &light.kind, role).await? else {
                continue;
            };
            self.tables.register(DeviceKind::Light, id, &path);
            let gamut = profile.gamut.to_string();
            let native = native(
                id,
                &[
                    ("type", Some(light.kind.as_str())),
                    ("modelid", light.modelid.as_deref()),
                    ("manufacturername", light.manufacturername.as_deref()),
                    ("uniqueid", light.uniqueid.as_deref()),
                    ("gamut", Some(gamut.as_str())),
                ],
            );
            self.upsert_entity(&path, EntityMetadata::channel(&light.name, role, native))
                .await?;
            let states = mirror::light_record_states(light, &self.config);
            self.create_states(&path, &states, Some(&profile)).await?;
            self.create_synthetic(&path, Some(profile.class)).await?;
            self.profiles.insert(path, profile);
        }

        if let Some(groups) = snapshot.groups.as_ref().filter(|_| !self.config.ignore_groups) {
            let all = self.client.group(ALL_LIGHTS_ID).await?;
            self.create_group(prefix, ALL_LIGHTS_ID, ALL_LIGHTS_NAME, &all, false)
                .await?;
            for id in sorted_ids(groups) {
                let group = &groups[id];
                self.create_group(prefix, id, &group.name, group, true).await?;
            }
        }

        if !self.config.ignore_scenes {
            self.create_scenes(prefix, snapshot).await?;
        }

        let native = native(
            snapshot.config.bridgeid.as_deref().unwrap_or_default(),
            &[
                ("modelid", snapshot.config.modelid.as_deref()),
                ("apiversion", snapshot.config.apiversion.as_deref()),
                ("swversion", snapshot.config.swversion.as_deref()),
            ],
        );
        self.upsert_entity(&bridge_path, EntityMetadata::device(bridge_name, native))
            .await?;

        self.expected_devices = snapshot.device_count(
            self.config.sync_software_sensors,
            self.config.ignore_groups,
        );
        info!(
            "mirrored {} lights, {} sensors and {} groups of {}",
            self.tables.entries(DeviceKind::Light).len(),
            self.tables.entries(DeviceKind::Sensor).len(),
            self.tables.entries(DeviceKind::Group).len(),
            bridge_name
        );
        Ok(())
    }

    async fn create_group(
        &mut self,
        prefix: Option<&str>,
        id: &str,
        name: &str,
        group: &GroupRecord,
        polled: bool,
    ) -> Result<()> {
        let Some(path) = self.claim_channel(prefix, name, &group.kind, GROUP_ROLE).await? else {
            return Ok(());
        };
        if polled {
            self.tables.register(DeviceKind::Group, id, &path);
        } else {
            self.tables.register_unpolled_group(id, &path);
        }

        let mut native = native(id, &[("type", Some(group.kind.as_str())), ("class", group.class.as_deref())]);
        native.insert("lights".into(), Value::from(group.lights.clone()));
        self.upsert_entity(&path, EntityMetadata::channel(name, GROUP_ROLE, native))
            .await?;

        let profile = LightProfile::group();
        let states = mirror::group_states(group, &MirrorOptions::new(&self.config));
        self.create_states(&path, &states, Some(&profile)).await?;
        self.create_synthetic(&path, None).await?;
        self.profiles.insert(path, profile);
        Ok(())
    }

    async fn create_scenes(&mut self, prefix: Option<&str>, snapshot: &Snapshot) -> Result<()> {
        let light_scenes = channel_path(prefix, LIGHT_SCENES);
        let mut light_scenes_created = false;

        for id in sorted_ids(&snapshot.scenes) {
            let scene = &snapshot.scenes[id];
            if scene.recycle {
                debug!("skipping recyclable scene {} ({})", scene.name, id);
                continue;
            }
            let (channel, group_id) = match (scene.kind.as_deref(), scene.group.as_deref()) {
                (Some("GroupScene"), Some(group_id)) => {
                    match self.tables.path_of(DeviceKind::Group, group_id) {
                        Some(path) => (path.to_string(), group_id.to_string()),
                        None => {
                            debug!("scene {} belongs to unmirrored group {}", scene.name, group_id);
                            continue;
                        }
                    }
                }
                _ => {
                    if !light_scenes_created {
                        let metadata = EntityMetadata::channel(LIGHT_SCENES, SCENES_ROLE, Map::new());
                        self.upsert_entity(&light_scenes, metadata).await?;
                        light_scenes_created = true;
                    }
                    (light_scenes.clone(), ALL_LIGHTS_ID.to_string())
                }
            };

            let preferred = format!("{}.scene_{}", channel, sanitize(&scene.name));
            let fallback = format!("{}.scene_{}", channel, sanitize(&format!("{} {}", scene.name, id)));
            let path = match self.tables.claim(
                Candidate { path: &preferred, foreign: false },
                Candidate { path: &fallback, foreign: false },
            ) {
                Ok(claim) => claim.into_path(),
                Err(e) => {
                    error!("skipping scene {} ({}): {}", scene.name, id, e);
                    continue;
                }
            };

            let Some(spec) = properties::lookup("scene") else {
                continue;
            };
            let mut metadata = spec.metadata(&scene.name, Value::from(false));
            metadata.native = native(id, &[("group", Some(group_id.as_str()))]);
            self.upsert_entity(&path, metadata).await?;
            if self.tree.get(&path).await?.is_none() {
                self.tree.set_if_changed(&path, Value::from(false), true).await?;
            }
            self.tables.register_scene(
                &path,
                SceneTarget {
                    scene_id: id.clone(),
                    group_id,
                },
            );
        }
        Ok(())
    }

    /// Claim a channel path for a device, logging and returning `None` when
    /// it has to be skipped.
    async fn claim_channel(
        &mut self,
        prefix: Option<&str>,
        name: &str,
        raw_type: &str,
        role: &str,
    ) -> Result<Option<String>> {
        let preferred = channel_path(prefix, name);
        let fallback = channel_path(prefix, &format!("{} {}", name, raw_type));
        let candidates = (
            Candidate {
                path: &preferred,
                foreign: self.is_foreign(&preferred, role).await?,
            },
            Candidate {
                path: &fallback,
                foreign: self.is_foreign(&fallback, role).await?,
            },
        );
        match self.tables.claim(candidates.0, candidates.1) {
            Ok(Claim::Preferred(path)) => Ok(Some(path)),
            Ok(Claim::Disambiguated(path)) => {
                warn!("{} is taken, mirroring {} {} at {}", preferred, raw_type, name, path);
                Ok(Some(path))
            }
            Err(e) => {
                error!("skipping {} {}: {}", raw_type, name, e);
                Ok(None)
            }
        }
    }

    /// Whether a mirrored channel of another kind already lives at `path`.
    async fn is_foreign(&self, path: &str, role: &str) -> Result<bool> {
        Ok(self
            .tree
            .get_object(path)
            .await?
            .is_some_and(|existing| existing.kind == EntityKind::Channel && existing.role != role))
    }

    /// Create the entity or extend the existing one.
    async fn upsert_entity(&self, path: &str, metadata: EntityMetadata) -> Result<()> {
        let metadata = match self.tree.get_object(path).await? {
            Some(existing) => metadata.merged_into(existing),
            None => metadata,
        };
        self.tree.upsert(path, metadata).await
    }

    async fn create_states(
        &self,
        channel: &str,
        states: &Map<String, Value>,
        profile: Option<&LightProfile>,
    ) -> Result<()> {
        for (name, value) in states {
            let Some(spec) = properties::lookup(name) else {
                debug!("{}: no metadata for {}", channel, name);
                continue;
            };
            let mut metadata = spec.metadata(name, value.clone());
            if name == "ct"
                && let Some(profile) = profile
            {
                metadata.min = Some(f64::from(profile.kelvin_range.min));
                metadata.max = Some(f64::from(profile.kelvin_range.max));
            }
            let path = format!("{}.{}", channel, name);
            self.upsert_entity(&path, metadata).await?;
            self.tree.set_if_changed(&path, value.clone(), true).await?;
            if spec.role == SATURATION_ROLE {
                self.tree.add_to_index(COLOR_INDEX, channel).await?;
            }
        }
        Ok(())
    }

    /// Local-only states, written once so user settings survive a resync.
    async fn create_synthetic(&self, channel: &str, class: Option<LightClass>) -> Result<()> {
        for (name, default) in mirror::synthetic_states(class) {
            let Some(spec) = properties::lookup(name) else {
                continue;
            };
            let path = format!("{}.{}", channel, name);
            self.upsert_entity(&path, spec.metadata(name, default.clone()))
                .await?;
            if self.tree.get(&path).await?.is_none() {
                self.tree.set_if_changed(&path, default, true).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdapterConfig;
    use crate::testing::{FakeClient, snapshot};
    use crate::tree::MemoryTree;
    use serde_json::json;

    fn bridge(value: Value) -> Bridge<FakeClient, MemoryTree> {
        Bridge::new(
            FakeClient::new(snapshot(value)),
            MemoryTree::new(),
            AdapterConfig::default(),
        )
    }

    fn hallway() -> Value {
        json!({
            "config": {"name": "Philips hue"},
            "sensors": {
                "1": {"name": "Hallway", "type": "ZLLPresence", "state": {"presence": false}},
                "2": {"name": "Hallway", "type": "ZLLTemperature", "state": {"temperature": 2150}},
                "3": {"name": "Hallway", "type": "ZLLTemperature", "state": {"temperature": 2200}}
            },
            "groups": {}
        })
    }

    #[tokio::test]
    async fn test_sync_disambiguates_then_skips_collisions() {
        let mut bridge = bridge(hallway());
        let snap = snapshot(hallway());
        bridge.sync(&snap).await.unwrap();

        let tree = bridge.tree();
        assert_eq!(tree.object("Hallway").unwrap().role, "sensor.motion");
        assert_eq!(tree.value("Hallway.presence"), Some(json!(false)));
        assert_eq!(tree.value("Hallway_ZLLTemperature.temperature"), Some(json!(21.5)));
        assert_eq!(bridge.tables().entries(DeviceKind::Sensor).len(), 2);
        // the third sensor created nothing below the claimed paths
        assert_eq!(tree.value("Hallway.temperature"), None);
    }

    #[tokio::test]
    async fn test_sync_mirrors_light() {
        let value = json!({
            "config": {"name": "Philips hue", "bridgeid": "001788FFFE4A3B2C"},
            "lights": {
                "1": {
                    "name": "Lamp",
                    "type": "Extended color light",
                    "modelid": "LCT015",
                    "state": {"on": true, "bri": 254, "hue": 0, "sat": 254, "xy": [0.3, 0.3], "ct": 0, "reachable": true},
                    "capabilities": {"control": {"colorgamuttype": "C", "ct": {"min": 153, "max": 500}}}
                }
            },
            "groups": {}
        });
        let mut bridge = bridge(value.clone());
        bridge.sync(&snapshot(value)).await.unwrap();

        let tree = bridge.tree();
        assert_eq!(tree.value("Lamp.on"), Some(json!(true)));
        assert_eq!(tree.value("Lamp.level"), Some(json!(100)));
        assert_eq!(tree.value("Lamp.xy"), Some(json!("0.3,0.3")));
        assert_eq!(tree.value("Lamp.hue"), Some(json!(0.0)));
        // ct of 0 mired has no Kelvin value
        assert_eq!(tree.value("Lamp.ct"), None);
        assert_eq!(tree.value("Lamp.transitiontime"), Some(json!(4)));
        assert_eq!(tree.value("Lamp.command"), Some(json!("{}")));
        assert!(tree.value("Lamp.r").is_some());
        assert_eq!(tree.index(COLOR_INDEX), vec!["Lamp".to_string()]);

        let channel = tree.object("Lamp").unwrap();
        assert_eq!(channel.role, "light.color");
        assert_eq!(channel.native["id"], json!("1"));
        assert_eq!(tree.object("Philips_hue").unwrap().kind, EntityKind::Device);

        let bri = tree.object("Lamp.bri").unwrap();
        assert_eq!(bri.max, Some(254.0));
        assert!(bri.writable);
    }

    #[tokio::test]
    async fn test_sync_keeps_user_names_and_synthetic_values() {
        let value = json!({
            "config": {"name": "Philips hue"},
            "lights": {"1": {"name": "Lamp", "type": "Dimmable light", "state": {"on": false, "bri": 100}}},
            "groups": {}
        });
        let mut bridge = bridge(value.clone());
        let snap = snapshot(value);
        bridge.sync(&snap).await.unwrap();

        let mut renamed = bridge.tree().object("Lamp").unwrap();
        renamed.name = "Desk lamp".into();
        bridge.tree().upsert("Lamp", renamed).await.unwrap();
        bridge
            .tree()
            .set_if_changed("Lamp.transitiontime", json!(10), false)
            .await
            .unwrap();

        bridge.sync(&snap).await.unwrap();
        assert_eq!(bridge.tree().object("Lamp").unwrap().name, "Desk lamp");
        assert_eq!(bridge.tree().value("Lamp.transitiontime"), Some(json!(10)));
        // off lights mirror zero brightness
        assert_eq!(bridge.tree().value("Lamp.bri"), Some(json!(0)));
    }

    #[tokio::test]
    async fn test_sync_skips_foreign_channel() {
        let value = json!({
            "config": {"name": "Philips hue"},
            "lights": {"1": {"name": "Kitchen", "type": "Dimmable light", "state": {"on": true, "bri": 100}}},
            "groups": {}
        });
        let mut bridge = bridge(value.clone());
        bridge
            .tree()
            .upsert("Kitchen", EntityMetadata::channel("Kitchen", "light.group", Map::new()))
            .await
            .unwrap();

        bridge.sync(&snapshot(value)).await.unwrap();
        assert_eq!(bridge.tables().light_id("Kitchen_Dimmable_light"), Some("1"));
        assert_eq!(bridge.tables().light_id("Kitchen"), None);
    }

    #[tokio::test]
    async fn test_sync_groups_and_scenes() {
        let value = json!({
            "config": {"name": "Philips hue"},
            "lights": {"1": {"name": "Lamp", "type": "Dimmable light", "state": {"on": true, "bri": 100}}},
            "groups": {
                "1": {
                    "name": "Living room",
                    "type": "Room",
                    "class": "Living room",
                    "lights": ["1"],
                    "action": {"on": true, "bri": 100},
                    "state": {"any_on": true, "all_on": true},
                    "stream": {"active": false}
                }
            },
            "scenes": {
                "abc": {"name": "Relax", "type": "GroupScene", "group": "1"},
                "def": {"name": "Sunset", "type": "LightScene", "lights": ["1"]},
                "ghi": {"name": "Old", "type": "LightScene", "recycle": true}
            }
        });
        let mut bridge = bridge(value.clone());
        bridge.sync(&snapshot(value)).await.unwrap();

        let tree = bridge.tree();
        assert_eq!(tree.value("Living_room.anyOn"), Some(json!(true)));
        assert_eq!(tree.value("Living_room.allOn"), Some(json!(true)));
        assert_eq!(tree.value("Living_room.activeStream"), Some(json!(false)));
        assert_eq!(tree.value("Living_room.class"), Some(json!("Living room")));
        assert_eq!(tree.value("All.anyOn"), Some(json!(false)));
        assert_eq!(tree.value("Living_room.scene_Relax"), Some(json!(false)));
        assert_eq!(tree.value("lightScenes.scene_Sunset"), Some(json!(false)));
        assert_eq!(tree.value("lightScenes.scene_Old"), None);

        let tables = bridge.tables();
        assert_eq!(tables.group_id("Living_room"), Some("1"));
        assert_eq!(tables.group_id("All"), Some("0"));
        // group 0 is refreshed separately, not polled for presence
        assert_eq!(tables.entries(DeviceKind::Group).len(), 1);
        assert_eq!(tables.scene("Living_room.scene_Relax").unwrap().group_id, "1");
        assert_eq!(tables.scene("lightScenes.scene_Sunset").unwrap().group_id, "0");
        assert_eq!(bridge.expected_devices(), 2);
    }

    #[tokio::test]
    async fn test_sync_legacy_structure() {
        let value = json!({
            "config": {"name": "Philips hue"},
            "lights": {"1": {"name": "Lamp", "type": "Dimmable light", "state": {"on": true, "bri": 100}}},
            "groups": {}
        });
        let mut bridge = Bridge::new(
            FakeClient::new(snapshot(value.clone())),
            MemoryTree::new(),
            AdapterConfig {
                use_legacy_structure: true,
                ..AdapterConfig::default()
            },
        );
        bridge.sync(&snapshot(value)).await.unwrap();
        assert_eq!(bridge.tree().value("Philips_hue.Lamp.bri"), Some(json!(100)));
        assert_eq!(bridge.tables().light_id("Philips_hue.Lamp"), Some("1"));
    }

    #[tokio::test]
    async fn test_sync_requires_groups() {
        let value = json!({
            "config": {"name": "Philips hue"},
            "lights": {"1": {"name": "Lamp", "type": "Dimmable light", "state": {"on": true, "bri": 100}}}
        });
        let mut bridge = bridge(value.clone());
        let err = bridge.sync(&snapshot(value)).await.unwrap_err();
        assert_eq!(err, Error::MissingGroups);
        assert!(err.requires_restart());
    }
}
