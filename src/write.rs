//! Externally initiated writes: merge, send, confirm.

use std::time::Duration;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::bridge::Bridge;
use crate::client::DeviceClient;
use crate::command::LightCommand;
use crate::config::LightProfile;
use crate::errors::Error;
use crate::merge::{MergeSettings, MergeTarget, merge};
use crate::mirror::{self, MirrorOptions};
use crate::naming::SceneTarget;
use crate::properties;
use crate::runtime;
use crate::tree::{ObjectTree, StateChange};

type Result<T> = std::result::Result<T, Error>;

/// How long the bridge gets to apply a command before it is read back.
pub const CONFIRM_DELAY: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Light(String),
    Group(String),
}

impl<C: DeviceClient, T: ObjectTree> Bridge<C, T> {
    /// Send an externally initiated write to the bridge.
    ///
    /// The write is merged with the channel's confirmed states into one
    /// command. The channel's lease is held from the send until the bridge's
    /// state has been read back, so polls and push events cannot revert the
    /// mirror in between.
    pub async fn handle_state_change(&mut self, change: StateChange) -> Result<()> {
        let StateChange { path, value } = change;

        if let Some(target) = self.tables.scene(&path).cloned() {
            return self.recall_scene(&path, &target, &value).await;
        }

        let (channel, property) = path
            .rsplit_once('.')
            .ok_or_else(|| Error::UnknownEntity(path.clone()))?;
        let target = match (self.tables.light_id(channel), self.tables.group_id(channel)) {
            (Some(id), _) => Target::Light(id.to_string()),
            (None, Some(id)) => Target::Group(id.to_string()),
            (None, None) => return Err(Error::UnknownEntity(path.clone())),
        };
        if !properties::lookup(property).is_some_and(|spec| spec.writable) {
            return Err(Error::invalid_value(property, "not writable"));
        }

        if property == "activeStream" {
            let Target::Group(id) = &target else {
                return Err(Error::invalid_value(property, "only groups stream"));
            };
            return self.toggle_streaming(channel, id, &value).await;
        }
        let property = match (&target, property) {
            (Target::Group(_), "anyOn") => "on",
            (_, property) => property,
        };

        let confirmed = self.confirmed_states(channel).await?;
        let profile = self
            .profiles
            .get(channel)
            .cloned()
            .unwrap_or_else(LightProfile::group);
        let outcome = merge(
            &confirmed,
            property,
            &value,
            &MergeTarget::from(&profile),
            &MergeSettings::from(&self.config),
        )?;

        if !outcome.command.is_valid() {
            debug!("{}: nothing to send for {}", channel, property);
            return self.commit(channel, &outcome.mirror, false).await;
        }

        self.leases.acquire(channel);
        let result = self.send(channel, &target, &outcome.command, &outcome.mirror).await;
        self.leases.release(channel);
        result
    }

    /// Send a command and read the bridge's state back. Runs under the
    /// channel's lease.
    async fn send(
        &self,
        channel: &str,
        target: &Target,
        command: &LightCommand,
        mirror: &Map<String, Value>,
    ) -> Result<()> {
        debug!("{}: sending {:?}", channel, command);
        match target {
            Target::Light(id) => self.client.set_light_state(id, command).await?,
            Target::Group(id) => self.client.set_group_state(id, command).await?,
        }
        self.commit(channel, mirror, false).await?;

        runtime::sleep(CONFIRM_DELAY).await;
        if let Err(e) = self.confirm(channel, target).await {
            warn!("reading back {} failed: {}", channel, e);
        }
        Ok(())
    }

    async fn confirm(&self, channel: &str, target: &Target) -> Result<()> {
        let states = match target {
            Target::Light(id) => {
                let light = self.client.light(id).await?;
                mirror::light_record_states(&light, &self.config)
            }
            Target::Group(id) => {
                let group = self.client.group(id).await?;
                mirror::group_states(&group, &MirrorOptions::new(&self.config))
            }
        };
        self.commit(channel, &states, false).await
    }

    /// Confirmed states directly below `channel`, keyed by property.
    async fn confirmed_states(&self, channel: &str) -> Result<Map<String, Value>> {
        let prefix = format!("{}.", channel);
        let mut confirmed = Map::new();
        for (path, state) in self.tree.states_under(&prefix).await? {
            let Some(name) = path.strip_prefix(&prefix) else {
                continue;
            };
            if state.confirmed && !name.contains('.') {
                confirmed.insert(name.to_string(), state.value);
            }
        }
        Ok(confirmed)
    }

    async fn recall_scene(&self, path: &str, target: &SceneTarget, value: &Value) -> Result<()> {
        if !value.as_bool().unwrap_or(false) {
            return Ok(());
        }
        let mut command = LightCommand::new();
        command.scene(&target.scene_id);
        self.client.set_group_state(&target.group_id, &command).await?;
        info!("recalled scene {} in group {}", target.scene_id, target.group_id);
        self.tree.set_if_changed(path, Value::from(true), true).await?;
        Ok(())
    }

    async fn toggle_streaming(&self, channel: &str, id: &str, value: &Value) -> Result<()> {
        let enable = value
            .as_bool()
            .ok_or_else(|| Error::invalid_value("activeStream", &format!("expected a boolean, got {}", value)))?;
        if enable {
            self.client.enable_streaming(id).await?;
        } else {
            self.client.disable_streaming(id).await?;
        }
        let path = format!("{}.activeStream", channel);
        self.tree.set_if_changed(&path, Value::from(enable), true).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdapterConfig;
    use crate::testing::{FakeClient, Sent, snapshot};
    use crate::tree::MemoryTree;
    use serde_json::json;

    fn home() -> Value {
        json!({
            "config": {"name": "Philips hue"},
            "lights": {
                "1": {
                    "name": "Lamp",
                    "type": "Extended color light",
                    "state": {"on": true, "bri": 200, "hue": 10000, "sat": 200, "xy": [0.3, 0.3], "reachable": true},
                    "capabilities": {"control": {"colorgamuttype": "C", "ct": {"min": 153, "max": 500}}}
                },
                "2": {"name": "Plug", "type": "On/Off plug-in unit", "state": {"on": false, "reachable": true}}
            },
            "groups": {
                "1": {
                    "name": "Living room",
                    "type": "Room",
                    "lights": ["1"],
                    "action": {"on": false, "bri": 100},
                    "state": {"any_on": false, "all_on": false},
                    "stream": {"active": false}
                }
            },
            "scenes": {
                "abc": {"name": "Relax", "type": "GroupScene", "group": "1"}
            }
        })
    }

    async fn connected() -> Bridge<FakeClient, MemoryTree> {
        let mut bridge = Bridge::new(
            FakeClient::new(snapshot(home())),
            MemoryTree::new(),
            AdapterConfig::default(),
        );
        bridge.connect().await.unwrap();
        bridge
    }

    fn sent_command(sent: &Sent) -> &LightCommand {
        match sent {
            Sent::Light(_, command) | Sent::Group(_, command) => command,
            Sent::Streaming(..) => panic!("unexpected streaming request"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_write_keeps_brightness() {
        let mut bridge = connected().await;
        bridge
            .handle_state_change(StateChange::new("Lamp.on", json!(true)))
            .await
            .unwrap();

        let sent = bridge.client().sent();
        assert_eq!(sent.len(), 1);
        let command = sent_command(&sent[0]);
        assert_eq!(command.on, Some(true));
        assert_eq!(command.bri, None);
        assert_eq!(command.transitiontime, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_level_write_is_confirmed() {
        let mut bridge = connected().await;
        bridge
            .handle_state_change(StateChange::new("Lamp.level", json!(50)))
            .await
            .unwrap();

        assert_eq!(bridge.client().light_state("1")["bri"], json!(127));
        let level = bridge.tree().get("Lamp.level").await.unwrap().unwrap();
        assert_eq!(level.value, json!(50));
        assert!(level.confirmed);
        let bri = bridge.tree().get("Lamp.bri").await.unwrap().unwrap();
        assert_eq!(bri.value, json!(127));
        assert!(bri.confirmed);
        assert!(!bridge.leases.is_held("Lamp"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hue_increment_wraps() {
        let mut bridge = connected().await;
        bridge
            .handle_state_change(StateChange::new("Lamp.hue_inc", json!(60000)))
            .await
            .unwrap();

        let sent = bridge.client().sent();
        // 54.93 degrees read back as 10000, plus 60000, wrapped
        assert_eq!(sent_command(&sent[0]).hue, Some(4464));
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_write() {
        let mut bridge = connected().await;
        bridge
            .handle_state_change(StateChange::new(
                "Lamp.command",
                json!(r#"{"bri": 0, "transitiontime": 20}"#),
            ))
            .await
            .unwrap();

        let sent = bridge.client().sent();
        let command = sent_command(&sent[0]);
        assert_eq!(command.on, Some(false));
        assert_eq!(command.transitiontime, Some(20));
        assert_eq!(bridge.tree().value("Lamp.on"), Some(json!(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_write_sends_nothing() {
        let mut bridge = connected().await;
        let err = bridge
            .handle_state_change(StateChange::new("Lamp.command", json!("{not json")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidCommand(_)));
        assert!(bridge.client().sent().is_empty());
        assert!(!bridge.leases.is_held("Lamp"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_only_light() {
        let mut bridge = connected().await;
        bridge
            .handle_state_change(StateChange::new("Plug.on", json!(true)))
            .await
            .unwrap();

        let sent = bridge.client().sent();
        assert_eq!(sent[0], Sent::Light("2".into(), LightCommand { on: Some(true), ..LightCommand::new() }));
        assert_eq!(bridge.tree().value("Plug.on"), Some(json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_any_on_is_on() {
        let mut bridge = connected().await;
        bridge
            .handle_state_change(StateChange::new("Living_room.anyOn", json!(true)))
            .await
            .unwrap();

        let sent = bridge.client().sent();
        let Sent::Group(id, command) = &sent[0] else {
            panic!("expected a group request, got {:?}", sent[0]);
        };
        assert_eq!(id, "1");
        assert_eq!(command.on, Some(true));
        assert_eq!(bridge.tree().value("Living_room.anyOn"), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_scene_recall() {
        let mut bridge = connected().await;
        bridge
            .handle_state_change(StateChange::new("Living_room.scene_Relax", json!(true)))
            .await
            .unwrap();

        let mut recall = LightCommand::new();
        recall.scene("abc");
        assert_eq!(bridge.client().sent(), vec![Sent::Group("1".into(), recall)]);
    }

    #[tokio::test]
    async fn test_streaming_toggle() {
        let mut bridge = connected().await;
        bridge
            .handle_state_change(StateChange::new("Living_room.activeStream", json!(true)))
            .await
            .unwrap();

        assert_eq!(bridge.client().sent(), vec![Sent::Streaming("1".into(), true)]);
        assert_eq!(bridge.tree().value("Living_room.activeStream"), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_unknown_and_read_only_paths() {
        let mut bridge = connected().await;
        let err = bridge
            .handle_state_change(StateChange::new("Garage.on", json!(true)))
            .await
            .unwrap_err();
        assert_eq!(err, Error::UnknownEntity("Garage.on".into()));

        let err = bridge
            .handle_state_change(StateChange::new("Lamp.reachable", json!(false)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert!(bridge.client().sent().is_empty());
    }
}
