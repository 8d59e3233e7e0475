//! Scripted bridge client used by the unit tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use serde_json::{Map, Value, json};

use crate::client::{DeviceClient, EventStream};
use crate::command::LightCommand;
use crate::errors::Error;
use crate::push::{ButtonMetadata, PushEvent};
use crate::snapshot::{GroupRecord, LightRecord, Snapshot};

type Result<T> = std::result::Result<T, Error>;

/// A request the fake client received.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sent {
    Light(String, LightCommand),
    Group(String, LightCommand),
    Streaming(String, bool),
}

struct FakeState {
    current: Snapshot,
    queued: VecDeque<Option<Snapshot>>,
    all_lights: GroupRecord,
    sent: Vec<Sent>,
    snapshot_calls: usize,
    stream_opens: usize,
    create_user_error: Option<Option<u16>>,
    events: Option<UnboundedReceiver<Result<Vec<PushEvent>>>>,
    buttons: Vec<ButtonMetadata>,
}

pub(crate) struct FakeClient {
    state: Mutex<FakeState>,
}

/// Parse a snapshot from its JSON form.
pub(crate) fn snapshot(value: Value) -> Snapshot {
    serde_json::from_value(value).unwrap()
}

/// Apply a command to a light state or group action the way the bridge would.
fn apply(target: &mut Map<String, Value>, command: &LightCommand) {
    if let Ok(Value::Object(fields)) = serde_json::to_value(command) {
        for (key, value) in fields {
            if key != "transitiontime" && key != "scene" {
                target.insert(key, value);
            }
        }
    }
}

impl FakeClient {
    pub(crate) fn new(snapshot: Snapshot) -> Self {
        let all_lights = serde_json::from_value(json!({
            "name": "Group 0",
            "type": "LightGroup",
            "action": {"on": false, "bri": 0},
            "state": {"any_on": false, "all_on": false}
        }))
        .unwrap();
        FakeClient {
            state: Mutex::new(FakeState {
                current: snapshot,
                queued: VecDeque::new(),
                all_lights,
                sent: Vec::new(),
                snapshot_calls: 0,
                stream_opens: 0,
                create_user_error: None,
                events: None,
                buttons: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `snapshot` from the next full read on.
    pub(crate) fn queue(&self, snapshot: Snapshot) {
        self.lock().queued.push_back(Some(snapshot));
    }

    /// Fail the next full read.
    pub(crate) fn queue_failure(&self) {
        self.lock().queued.push_back(None);
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.lock().sent.clone()
    }

    pub(crate) fn snapshot_calls(&self) -> usize {
        self.lock().snapshot_calls
    }

    pub(crate) fn stream_opens(&self) -> usize {
        self.lock().stream_opens
    }

    pub(crate) fn fail_create_user(&self, code: Option<u16>) {
        self.lock().create_user_error = Some(code);
    }

    pub(crate) fn set_buttons(&self, buttons: Vec<ButtonMetadata>) {
        self.lock().buttons = buttons;
    }

    /// Sender feeding the next opened event stream.
    pub(crate) fn event_sender(&self) -> UnboundedSender<Result<Vec<PushEvent>>> {
        let (tx, rx) = unbounded();
        self.lock().events = Some(rx);
        tx
    }

    pub(crate) fn light_state(&self, id: &str) -> Map<String, Value> {
        self.lock()
            .current
            .lights
            .get(id)
            .map(|light| light.state.clone())
            .unwrap_or_default()
    }
}

fn not_found(id: &str) -> Error {
    Error::hub(Some(3), &format!("resource, {}, not available", id))
}

impl DeviceClient for FakeClient {
    type Events = FakeEvents;

    async fn full_snapshot(&self) -> Result<Snapshot> {
        let mut state = self.lock();
        state.snapshot_calls += 1;
        match state.queued.pop_front() {
            Some(Some(snapshot)) => state.current = snapshot,
            Some(None) => return Err(Error::hub(None, "bridge unreachable")),
            None => {}
        }
        Ok(state.current.clone())
    }

    async fn light(&self, id: &str) -> Result<LightRecord> {
        self.lock().current.lights.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn group(&self, id: &str) -> Result<GroupRecord> {
        let state = self.lock();
        if id == "0" {
            return Ok(state.all_lights.clone());
        }
        state
            .current
            .groups
            .as_ref()
            .and_then(|groups| groups.get(id))
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn set_light_state(&self, id: &str, command: &LightCommand) -> Result<()> {
        let mut state = self.lock();
        let light = state.current.lights.get_mut(id).ok_or_else(|| not_found(id))?;
        apply(&mut light.state, command);
        state.sent.push(Sent::Light(id.to_string(), command.clone()));
        Ok(())
    }

    async fn set_group_state(&self, id: &str, command: &LightCommand) -> Result<()> {
        let mut state = self.lock();
        if id == "0" {
            apply(&mut state.all_lights.action, command);
        } else if let Some(group) = state.current.groups.as_mut().and_then(|g| g.get_mut(id)) {
            apply(&mut group.action, command);
            if let Some(on) = command.on {
                group.state.insert("any_on".into(), Value::from(on));
            }
        } else {
            return Err(not_found(id));
        }
        state.sent.push(Sent::Group(id.to_string(), command.clone()));
        Ok(())
    }

    async fn enable_streaming(&self, id: &str) -> Result<()> {
        self.lock().sent.push(Sent::Streaming(id.to_string(), true));
        Ok(())
    }

    async fn disable_streaming(&self, id: &str) -> Result<()> {
        self.lock().sent.push(Sent::Streaming(id.to_string(), false));
        Ok(())
    }

    async fn create_user(&self, _address: &str, _port: u16) -> Result<String> {
        match self.lock().create_user_error {
            Some(code) => Err(Error::hub(code, "unauthorized user")),
            None => Ok("fake-user".to_string()),
        }
    }

    async fn open_event_stream(&self) -> Result<FakeEvents> {
        let mut state = self.lock();
        state.stream_opens += 1;
        match state.events.take() {
            Some(rx) => Ok(FakeEvents { rx }),
            None => Err(Error::hub(None, "event stream unavailable")),
        }
    }

    async fn resource_metadata(&self) -> Result<Vec<ButtonMetadata>> {
        Ok(self.lock().buttons.clone())
    }
}

pub(crate) struct FakeEvents {
    rx: UnboundedReceiver<Result<Vec<PushEvent>>>,
}

impl EventStream for FakeEvents {
    async fn next_batch(&mut self) -> Option<Result<Vec<PushEvent>>> {
        self.rx.next().await
    }
}
