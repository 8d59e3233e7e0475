//! The bridge's request/response and event-stream clients.

use std::future::Future;

use log::{info, warn};

use crate::command::LightCommand;
use crate::errors::Error;
use crate::push::{ButtonMetadata, PushEvent};
use crate::snapshot::{GroupRecord, LightRecord, Snapshot};

type Result<T> = std::result::Result<T, Error>;

/// Bridge error code for a pairing attempt without the link button pressed.
pub const LINK_BUTTON_NOT_PRESSED: u16 = 101;

/// Trait for a client talking to one bridge.
///
/// Implementations report bridge-side failures as [`Error::Hub`] carrying the
/// bridge's error code.
pub trait DeviceClient: Send + Sync {
    /// Event stream returned by [`DeviceClient::open_event_stream`].
    type Events: EventStream;

    /// Read the bridge's complete configuration.
    fn full_snapshot(&self) -> impl Future<Output = Result<Snapshot>> + Send;

    fn light(&self, id: &str) -> impl Future<Output = Result<LightRecord>> + Send;

    /// Read a single group; group "0" holds every light.
    fn group(&self, id: &str) -> impl Future<Output = Result<GroupRecord>> + Send;

    fn set_light_state(
        &self,
        id: &str,
        command: &LightCommand,
    ) -> impl Future<Output = Result<()>> + Send;

    fn set_group_state(
        &self,
        id: &str,
        command: &LightCommand,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Start entertainment streaming on a group.
    fn enable_streaming(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    fn disable_streaming(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Register a new user and return its name.
    fn create_user(&self, address: &str, port: u16) -> impl Future<Output = Result<String>> + Send;

    fn open_event_stream(&self) -> impl Future<Output = Result<Self::Events>> + Send;

    /// Button control ids, read once per event stream connection.
    fn resource_metadata(&self) -> impl Future<Output = Result<Vec<ButtonMetadata>>> + Send;
}

/// Trait for the bridge's push event stream.
pub trait EventStream: Send {
    /// Wait for the next batch of events.
    ///
    /// Returns `None` once the stream closed.
    fn next_batch(&mut self) -> impl Future<Output = Option<Result<Vec<PushEvent>>>> + Send;
}

/// Pair with a bridge and return the new user name.
///
/// The bridge answers with code 101 until its link button was pressed; that
/// case is reported as [`Error::LinkButtonNotPressed`].
pub async fn pair<C: DeviceClient>(client: &C, address: &str, port: u16) -> Result<String> {
    match client.create_user(address, port).await {
        Ok(user) => {
            info!("paired with bridge at {}:{}", address, port);
            Ok(user)
        }
        Err(Error::Hub {
            code: Some(LINK_BUTTON_NOT_PRESSED),
            ..
        }) => {
            warn!("link button of bridge at {} not pressed", address);
            Err(Error::LinkButtonNotPressed)
        }
        Err(e) => {
            warn!("pairing with bridge at {} failed: {}", address, e);
            Err(e)
        }
    }
}
