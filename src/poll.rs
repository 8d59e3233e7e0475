//! Incremental updates: periodic polls and push events.

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::bridge::Bridge;
use crate::client::DeviceClient;
use crate::errors::Error;
use crate::mirror::{self, MirrorOptions};
use crate::naming::{DeviceKind, PollEntry};
use crate::push::{self, PushEvent};
use crate::sync::ALL_LIGHTS_ID;
use crate::tree::ObjectTree;

type Result<T> = std::result::Result<T, Error>;

impl<C: DeviceClient, T: ObjectTree> Bridge<C, T> {
    /// Read a full snapshot and bring every registered device up to date.
    ///
    /// Devices gone from the bridge are unregistered and their subtree is
    /// deleted. More devices than registered is [`Error::UnexpectedGrowth`].
    pub async fn poll(&mut self) -> Result<()> {
        let snapshot = self.client.full_snapshot().await?;
        if snapshot.is_empty() {
            return Err(Error::EmptySnapshot);
        }
        let groups = match &snapshot.groups {
            _ if self.config.ignore_groups => None,
            Some(groups) => Some(groups),
            None => return Err(Error::MissingGroups),
        };

        for entry in self.tables.entries(DeviceKind::Sensor).to_vec() {
            match snapshot.sensors.get(&entry.id) {
                Some(sensor) => self.commit(&entry.name, &mirror::sensor_states(sensor), true).await?,
                None => self.remove_device(DeviceKind::Sensor, &entry).await,
            }
        }

        for entry in self.tables.entries(DeviceKind::Light).to_vec() {
            match snapshot.lights.get(&entry.id) {
                Some(light) => {
                    let states = mirror::light_record_states(light, &self.config);
                    self.commit(&entry.name, &states, true).await?;
                }
                None => self.remove_device(DeviceKind::Light, &entry).await,
            }
        }

        if let Some(groups) = groups {
            let options = MirrorOptions::new(&self.config);
            for entry in self.tables.entries(DeviceKind::Group).to_vec() {
                match groups.get(&entry.id) {
                    Some(group) => {
                        let states = mirror::group_states(group, &options);
                        self.commit(&entry.name, &states, true).await?;
                    }
                    None => self.remove_device(DeviceKind::Group, &entry).await,
                }
            }
            self.refresh_all_lights().await?;
        }

        let present = snapshot.device_count(
            self.config.sync_software_sensors,
            self.config.ignore_groups,
        );
        if present > self.expected_devices {
            return Err(Error::UnexpectedGrowth {
                expected: self.expected_devices,
                present,
            });
        }
        Ok(())
    }

    /// Group 0 always exists and is refreshed on its own.
    async fn refresh_all_lights(&mut self) -> Result<()> {
        let Some(path) = self
            .tables
            .path_of(DeviceKind::Group, ALL_LIGHTS_ID)
            .map(String::from)
        else {
            return Ok(());
        };
        let group = self.client.group(ALL_LIGHTS_ID).await?;
        let states = mirror::group_states(&group, &MirrorOptions::new(&self.config));
        self.commit(&path, &states, true).await
    }

    async fn remove_device(&mut self, kind: DeviceKind, entry: &PollEntry) {
        self.expected_devices = self.expected_devices.saturating_sub(1);
        self.tables.remove(kind, &entry.id);
        self.profiles.remove(&entry.name);
        info!("{:?} {} ({}) was removed from the bridge", kind, entry.name, entry.id);

        if !self.tree.supports_recursive_delete() {
            info!(
                "not deleting {}: the object tree cannot delete recursively",
                entry.name
            );
            return;
        }
        if let Err(e) = self.tree.delete_recursive(&entry.name).await {
            warn!("deleting {} failed: {}", entry.name, e);
        }
    }

    /// Write confirmed states below `channel`.
    ///
    /// With `respect_lease`, nothing is written while a local write to the
    /// channel is in flight.
    pub(crate) async fn commit(
        &self,
        channel: &str,
        states: &Map<String, Value>,
        respect_lease: bool,
    ) -> Result<()> {
        if respect_lease && self.leases.is_held(channel) {
            debug!("{} has a write in flight, skipping update", channel);
            return Ok(());
        }
        for (name, value) in states {
            let path = format!("{}.{}", channel, name);
            self.tree.set_if_changed(&path, value.clone(), true).await?;
        }
        Ok(())
    }

    /// Apply one push event to the mirror.
    pub async fn apply_push(&mut self, event: &PushEvent) -> Result<()> {
        let options = MirrorOptions::new(&self.config);
        let updates =
            push::translate(event, &self.tables, &self.devices, &self.tree, &options).await?;
        for (path, value) in updates {
            let channel = path.rsplit_once('.').map_or(path.as_str(), |(channel, _)| channel);
            if self.leases.is_held(channel) {
                debug!("{} has a write in flight, dropping pushed {}", channel, path);
                continue;
            }
            self.tree.set_if_changed(&path, value, true).await?;
        }
        Ok(())
    }
}
