//! The reconciliation engine driving one mirrored bridge.
//!
//! A [`Bridge`] owns the translation tables, the write leases and the light
//! profiles. Everything runs on the task calling [`Bridge::run`]: connecting,
//! polling, push events and externally initiated writes are handled one at a
//! time.

use std::collections::HashMap;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use log::{debug, error, info, warn};

use crate::client::{DeviceClient, EventStream};
use crate::config::{AdapterConfig, LightProfile};
use crate::errors::Error;
use crate::lease::WriteLeases;
use crate::naming::NameTables;
use crate::push::{DeviceCache, PushEvent};
use crate::runtime::{self, BoxFuture};
use crate::tree::{ObjectTree, StateChange};

type Result<T> = std::result::Result<T, Error>;

/// Delay between two connection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Phase of the engine's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Synced,
    Polling,
}

/// Why [`Bridge::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The shutdown future completed.
    Shutdown,
    /// The bridge changed in a way only a full resync can pick up; the host
    /// should restart the adapter.
    RestartRequired,
}

/// A mirrored Hue bridge.
///
/// # Example
///
/// ```ignore
/// use futures::channel::mpsc;
/// use hue_mirror::{AdapterConfig, Bridge, Exit, MemoryTree};
///
/// let (writes_tx, writes) = mpsc::unbounded();
/// let mut bridge = Bridge::new(client, MemoryTree::new(), AdapterConfig::default());
/// match bridge.run(writes, tokio::signal::ctrl_c().map(|_| ())).await {
///     Exit::Shutdown => {}
///     Exit::RestartRequired => restart(),
/// }
/// ```
pub struct Bridge<C: DeviceClient, T: ObjectTree> {
    pub(crate) client: C,
    pub(crate) tree: T,
    pub(crate) config: AdapterConfig,
    pub(crate) tables: NameTables,
    pub(crate) leases: WriteLeases,
    /// Hardware profiles keyed by channel path
    pub(crate) profiles: HashMap<String, LightProfile>,
    pub(crate) devices: DeviceCache,
    pub(crate) expected_devices: usize,
    pub(crate) phase: Phase,
    pub(crate) connected: bool,
}

enum Wake {
    Shutdown,
    Write(StateChange),
    WritesClosed,
    Poll,
    Push(Option<Result<Vec<PushEvent>>>),
    PushRetry,
}

impl<C: DeviceClient, T: ObjectTree> Bridge<C, T> {
    pub fn new(client: C, tree: T, config: AdapterConfig) -> Self {
        Bridge {
            client,
            tree,
            config: config.validated(),
            tables: NameTables::new(),
            leases: WriteLeases::new(),
            profiles: HashMap::new(),
            devices: DeviceCache::default(),
            expected_devices: 0,
            phase: Phase::Disconnected,
            connected: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the last snapshot read succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn tables(&self) -> &NameTables {
        &self.tables
    }

    /// Number of devices the last sync registered, minus removals since.
    pub fn expected_devices(&self) -> usize {
        self.expected_devices
    }

    /// Read one snapshot and mirror it.
    pub async fn connect(&mut self) -> Result<()> {
        self.phase = Phase::Connecting;
        let result = match self.client.full_snapshot().await {
            Ok(snapshot) if snapshot.is_empty() => Err(Error::EmptySnapshot),
            Ok(snapshot) => self.sync(&snapshot).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                self.phase = Phase::Synced;
                self.connected = true;
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Disconnected;
                self.connected = false;
                Err(e)
            }
        }
    }

    /// Mirror the bridge until `shutdown` completes or a restart is needed.
    ///
    /// `writes` carries the externally initiated writes to mirrored states.
    pub async fn run<W, S>(&mut self, mut writes: W, shutdown: S) -> Exit
    where
        W: Stream<Item = StateChange> + Unpin,
        S: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);

        loop {
            match self.connect().await {
                Ok(()) => break,
                Err(e) if e.requires_restart() => {
                    error!("bridge {}: {}, restart required", self.config.bridge, e);
                    return Exit::RestartRequired;
                }
                Err(e) => warn!(
                    "connecting to bridge {} failed: {}, retrying in {:?}",
                    self.config.bridge, e, RECONNECT_DELAY
                ),
            }
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down before the bridge was reached");
                    return Exit::Shutdown;
                }
                _ = runtime::sleep(RECONNECT_DELAY) => {}
            }
        }

        let mut poll_timer = self
            .config
            .polling
            .then(|| runtime::timer(self.config.polling_interval()));
        let mut push_retry = self.config.push.then(|| runtime::timer(Duration::ZERO));
        let mut events: Option<C::Events> = None;
        let mut writes_open = true;

        loop {
            let wake = tokio::select! {
                _ = &mut shutdown => Wake::Shutdown,
                change = writes.next(), if writes_open => match change {
                    Some(change) => Wake::Write(change),
                    None => Wake::WritesClosed,
                },
                _ = fire(&mut poll_timer) => Wake::Poll,
                batch = next_batch(&mut events) => Wake::Push(batch),
                _ = fire(&mut push_retry) => Wake::PushRetry,
            };

            match wake {
                Wake::Shutdown => {
                    // timers go before the event stream
                    drop(poll_timer);
                    drop(push_retry);
                    drop(events);
                    self.phase = Phase::Disconnected;
                    self.connected = false;
                    info!("bridge {} shut down", self.config.bridge);
                    return Exit::Shutdown;
                }
                Wake::Write(change) => {
                    let path = change.path.clone();
                    if let Err(e) = self.handle_state_change(change).await {
                        error!("write to {} failed: {}", path, e);
                    }
                }
                Wake::WritesClosed => {
                    debug!("write stream closed");
                    writes_open = false;
                }
                Wake::Poll => {
                    self.phase = Phase::Polling;
                    match self.poll().await {
                        Ok(()) => self.connected = true,
                        Err(e) if e.requires_restart() => {
                            error!("bridge {}: {}, restart required", self.config.bridge, e);
                            return Exit::RestartRequired;
                        }
                        Err(e) if e.is_transient() => {
                            warn!("polling bridge {} failed: {}", self.config.bridge, e);
                            self.connected = false;
                        }
                        Err(e) => {
                            error!("polling bridge {} failed: {}", self.config.bridge, e);
                            self.connected = false;
                        }
                    }
                    poll_timer = Some(runtime::timer(self.config.polling_interval()));
                }
                Wake::Push(Some(Ok(batch))) => {
                    for event in &batch {
                        if let Err(e) = self.apply_push(event).await {
                            warn!("push event {:?} not applied: {}", event.id, e);
                        }
                    }
                }
                Wake::Push(Some(Err(e))) => {
                    warn!("push stream failed: {}, reconnecting", e);
                    events = None;
                    push_retry = Some(runtime::timer(self.config.push_reconnect_delay()));
                }
                Wake::Push(None) => {
                    info!("push stream closed, reconnecting");
                    events = None;
                    push_retry = Some(runtime::timer(self.config.push_reconnect_delay()));
                }
                Wake::PushRetry => match self.open_push().await {
                    Ok(stream) => {
                        push_retry = None;
                        events = Some(stream);
                    }
                    Err(e) => {
                        warn!("opening push stream failed: {}, retrying in {:?}", e, RECONNECT_DELAY);
                        push_retry = Some(runtime::timer(RECONNECT_DELAY));
                    }
                },
            }
        }
    }

    async fn open_push(&mut self) -> Result<C::Events> {
        let buttons = self.client.resource_metadata().await?;
        self.devices = DeviceCache::new(&buttons);
        let stream = self.client.open_event_stream().await?;
        info!("push stream to {} open", self.config.bridge);
        Ok(stream)
    }
}

async fn fire(timer: &mut Option<BoxFuture<'static, ()>>) {
    match timer {
        Some(timer) => timer.await,
        None => std::future::pending().await,
    }
}

async fn next_batch<E: EventStream>(events: &mut Option<E>) -> Option<Result<Vec<PushEvent>>> {
    match events {
        Some(stream) => stream.next_batch().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClient, Sent, snapshot};
    use crate::tree::MemoryTree;
    use futures::channel::mpsc;
    use serde_json::json;

    fn lamp() -> serde_json::Value {
        json!({
            "config": {"name": "Philips hue"},
            "lights": {
                "1": {"name": "Lamp", "type": "Extended color light", "state": {"on": false, "bri": 0, "reachable": true}}
            },
            "groups": {}
        })
    }

    fn config() -> AdapterConfig {
        AdapterConfig {
            bridge: "192.168.1.2".into(),
            push: false,
            ..AdapterConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_handles_write_then_shuts_down() {
        let client = FakeClient::new(snapshot(lamp()));
        let mut bridge = Bridge::new(client, MemoryTree::new(), config());
        let (tx, writes) = mpsc::unbounded();
        tx.unbounded_send(StateChange::new("Lamp.level", json!(50))).unwrap();

        let exit = bridge.run(writes, runtime::sleep(Duration::from_secs(1))).await;

        assert_eq!(exit, Exit::Shutdown);
        assert_eq!(bridge.phase(), Phase::Disconnected);
        let sent = bridge.client().sent();
        assert_eq!(sent.len(), 1);
        let Sent::Light(id, command) = &sent[0] else {
            panic!("unexpected request {:?}", sent[0]);
        };
        assert_eq!(id, "1");
        assert_eq!(command.on, Some(true));
        assert_eq!(command.bri, Some(127));
        assert_eq!(bridge.tree().value("Lamp.level"), Some(json!(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_on_fixed_delay() {
        let client = FakeClient::new(snapshot(lamp()));
        client.queue_failure();
        client.queue_failure();
        let mut bridge = Bridge::new(client, MemoryTree::new(), config());
        let (_tx, writes) = mpsc::unbounded::<StateChange>();

        let exit = bridge.run(writes, runtime::sleep(Duration::from_secs(11))).await;

        assert_eq!(exit, Exit::Shutdown);
        // two failures 5 s apart, then success at 10 s; no poll before 15 s
        assert_eq!(bridge.client().snapshot_calls(), 3);
        assert!(bridge.tree().value("Lamp.on").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_unreachable() {
        let client = FakeClient::new(snapshot(lamp()));
        for _ in 0..10 {
            client.queue_failure();
        }
        let mut bridge = Bridge::new(client, MemoryTree::new(), config());
        let (_tx, writes) = mpsc::unbounded::<StateChange>();

        let exit = bridge.run(writes, runtime::sleep(Duration::from_secs(7))).await;

        assert_eq!(exit, Exit::Shutdown);
        assert_eq!(bridge.client().snapshot_calls(), 2);
        assert!(!bridge.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_growth_requires_restart() {
        let client = FakeClient::new(snapshot(lamp()));
        let mut grown = lamp();
        grown["lights"]["2"] = json!({"name": "Spot", "type": "Dimmable light", "state": {"on": true, "bri": 10}});
        client.queue(snapshot(lamp()));
        client.queue(snapshot(grown));
        let mut bridge = Bridge::new(client, MemoryTree::new(), config());
        let (_tx, writes) = mpsc::unbounded::<StateChange>();

        let exit = bridge.run(writes, runtime::sleep(Duration::from_secs(60))).await;

        assert_eq!(exit, Exit::RestartRequired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_pick_up_changes() {
        let client = FakeClient::new(snapshot(lamp()));
        let mut brighter = lamp();
        brighter["lights"]["1"]["state"] = json!({"on": true, "bri": 254, "reachable": true});
        client.queue(snapshot(lamp()));
        client.queue(snapshot(brighter));
        let mut bridge = Bridge::new(client, MemoryTree::new(), config());
        let (_tx, writes) = mpsc::unbounded::<StateChange>();

        let exit = bridge.run(writes, runtime::sleep(Duration::from_secs(6))).await;

        assert_eq!(exit, Exit::Shutdown);
        assert_eq!(bridge.tree().value("Lamp.bri"), Some(json!(254)));
        assert_eq!(bridge.tree().value("Lamp.level"), Some(json!(100)));
        assert!(bridge.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_events_reach_the_tree() {
        let client = FakeClient::new(snapshot(lamp()));
        let events = client.event_sender();
        let event = serde_json::from_value(json!({
            "id": "3a6710fa-4474-4eba-b533-5e6e72968feb",
            "id_v1": "/lights/1",
            "type": "light",
            "on": {"on": true}
        }))
        .unwrap();
        events.unbounded_send(Ok(vec![event])).unwrap();

        let config = AdapterConfig {
            push: true,
            polling: false,
            ..config()
        };
        let mut bridge = Bridge::new(client, MemoryTree::new(), config);
        let (_tx, writes) = mpsc::unbounded::<StateChange>();

        let exit = bridge.run(writes, runtime::sleep(Duration::from_secs(1))).await;

        assert_eq!(exit, Exit::Shutdown);
        assert_eq!(bridge.tree().value("Lamp.on"), Some(json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_events_use_control_ids() {
        let mut home = lamp();
        home["sensors"] = json!({
            "7": {"name": "Dimmer", "type": "ZLLSwitch", "state": {"buttonevent": 1002}}
        });
        let client = FakeClient::new(snapshot(home));
        let button = uuid::Uuid::parse_str("3f0a1b5c-7d2e-4f60-9a81-0b2c3d4e5f60").unwrap();
        client.set_buttons(vec![crate::push::ButtonMetadata {
            id: button,
            control_id: 4,
        }]);
        let events = client.event_sender();
        let event = serde_json::from_value(json!({
            "id": button.to_string(),
            "id_v1": "/sensors/7",
            "type": "button",
            "button": {"last_event": "long_release"}
        }))
        .unwrap();
        events.unbounded_send(Ok(vec![event])).unwrap();

        let config = AdapterConfig {
            push: true,
            polling: false,
            ..config()
        };
        let mut bridge = Bridge::new(client, MemoryTree::new(), config);
        let (_tx, writes) = mpsc::unbounded::<StateChange>();

        bridge.run(writes, runtime::sleep(Duration::from_secs(1))).await;

        assert_eq!(bridge.tree().value("Dimmer.buttonevent"), Some(json!(4003)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_push_stream_is_reopened() {
        let client = FakeClient::new(snapshot(lamp()));
        // dropping the sender closes the stream after opening
        drop(client.event_sender());
        let config = AdapterConfig {
            push: true,
            polling: false,
            ..config()
        };
        let mut bridge = Bridge::new(client, MemoryTree::new(), config);
        let (_tx, writes) = mpsc::unbounded::<StateChange>();

        let exit = bridge.run(writes, runtime::sleep(Duration::from_secs(12))).await;

        // reopening keeps failing on the fixed retry delay without ending the loop
        assert_eq!(exit, Exit::Shutdown);
        assert!(bridge.is_connected());
        // the first open closes at once, so the stream was opened again
        assert!(bridge.client().stream_opens() >= 2);
    }
}
