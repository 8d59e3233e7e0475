//! # hue_mirror
//!
//! An async Rust library that mirrors a Philips Hue bridge into a
//! tree-structured state store, and turns writes to that store back into
//! bridge commands.
//!
//! The bridge is reached through a [`DeviceClient`] and the store through an
//! [`ObjectTree`]; both are traits so the library does not assume a transport
//! or a storage backend. [`MemoryTree`] is an in-memory tree.
//!
//! ## Quick Start
//!
//! ```ignore
//! use futures::channel::mpsc;
//! use hue_mirror::{AdapterConfig, Bridge, Exit, MemoryTree};
//!
//! async fn mirror(client: impl hue_mirror::DeviceClient) {
//!     let config = AdapterConfig::from_json(r#"{"bridge": "192.168.1.2", "user": "..."}"#).unwrap();
//!     let mut bridge = Bridge::new(client, MemoryTree::new(), config);
//!
//!     // Feed externally initiated writes through `writes_tx`
//!     let (writes_tx, writes) = mpsc::unbounded();
//!     if bridge.run(writes, shutdown_signal()).await == Exit::RestartRequired {
//!         // the bridge gained devices, restart and resync
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Conversions**: RGB, HSB, CIE xy with gamut correction, mired and
//!   Kelvin, level and brightness, see [`Rgb`], [`Xy`], [`Gamut`]
//! - **Command merging**: one write becomes one bridge command, see
//!   [`merge::merge`]
//! - **Reconciliation**: full sync on connect, periodic polls, device
//!   removal and growth detection, see [`Bridge`]
//! - **Push updates**: event-stream records translated into state writes,
//!   see [`push::translate`]
//! - **Scenes and streaming**: scene recall and entertainment streaming
//!   through mirrored states
//! - **Discovery**: find bridges with [`discover_bridges`]
//! - **Pairing**: create a bridge user with [`pair`]
//!
//! ## Mirrored layout
//!
//! Every light, supported sensor and group becomes a channel named after it,
//! with one state per property: `Living_room.on`, `Lamp.level`,
//! `Hallway.presence`. With `useLegacyStructure` the channels are nested
//! below a device named after the bridge.

mod bridge;
mod client;
mod command;
mod config;
mod discovery;
mod errors;
mod lease;
pub mod merge;
pub mod mirror;
pub mod naming;
mod poll;
pub mod properties;
pub mod push;
pub mod runtime;
mod snapshot;
mod sync;
mod tree;
mod types;
mod write;

#[cfg(test)]
pub(crate) mod testing;

// Re-export public API
pub use bridge::{Bridge, Exit, Phase, RECONNECT_DELAY};
pub use client::{DeviceClient, EventStream, LINK_BUTTON_NOT_PRESSED, pair};
pub use command::LightCommand;
pub use config::{AdapterConfig, LightClass, LightProfile, SWITCH_ROLE};
pub use discovery::{DEFAULT_DISCOVERY_TIMEOUT, DiscoveredBridge, discover_bridges};
pub use errors::Error;
pub use lease::WriteLeases;
pub use snapshot::{
    BridgeInfo, Capabilities, Control, GroupRecord, LightRecord, MiredRange, SceneRecord,
    SensorRecord, Snapshot, StreamInfo,
};
pub use sync::{ALL_LIGHTS_ID, COLOR_INDEX};
pub use tree::{EntityKind, EntityMetadata, MemoryTree, ObjectTree, StateChange, StateValue};
pub use types::{
    Alert, Brightness, Effect, Gamut, Hsb, Hue, KelvinRange, Rgb, Triangle, Xy, XyBrightness,
    brightness_to_level, degrees_to_hue, hue_to_degrees, kelvin_to_mired, level_to_brightness,
    mired_to_kelvin,
};
pub use write::CONFIRM_DELAY;
