//! The object/state tree the bridge is mirrored into.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::Error;
use crate::properties::ValueType;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Device,
    Channel,
    State,
}

/// Metadata of one node in the tree.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub kind: EntityKind,
    /// Display name; never overwritten once the entity exists
    pub name: String,
    pub role: String,
    pub value_type: Option<ValueType>,
    #[serde(default)]
    pub writable: bool,
    pub unit: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<Value>,
    /// Bridge-side data, e.g. the light id and model
    #[serde(default)]
    pub native: Map<String, Value>,
}

impl EntityMetadata {
    pub fn device(name: &str, native: Map<String, Value>) -> Self {
        Self::container(EntityKind::Device, name, "", native)
    }

    pub fn channel(name: &str, role: &str, native: Map<String, Value>) -> Self {
        Self::container(EntityKind::Channel, name, role, native)
    }

    fn container(kind: EntityKind, name: &str, role: &str, native: Map<String, Value>) -> Self {
        EntityMetadata {
            kind,
            name: name.to_string(),
            role: role.to_string(),
            value_type: None,
            writable: false,
            unit: None,
            min: None,
            max: None,
            default: None,
            native,
        }
    }

    /// Extend an existing entity's metadata with this one, keeping the
    /// existing display name and native keys this one does not set.
    pub fn merged_into(self, existing: EntityMetadata) -> EntityMetadata {
        let mut native = existing.native;
        native.extend(self.native);
        EntityMetadata {
            name: existing.name,
            native,
            ..self
        }
    }
}

/// A state's value and whether the bridge confirmed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValue {
    pub value: Value,
    /// False while the value is a local write the bridge has not confirmed
    pub confirmed: bool,
}

/// A write to a mirrored state that did not come from the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub path: String,
    pub value: Value,
}

impl StateChange {
    pub fn new(path: &str, value: Value) -> Self {
        Self {
            path: path.to_string(),
            value,
        }
    }
}

/// Trait for the persistent object tree.
///
/// Paths are dot separated. Externally initiated writes reach the bridge as a
/// stream of [`StateChange`] handed to [`crate::Bridge::run`].
pub trait ObjectTree: Send + Sync {
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<StateValue>>> + Send;

    fn get_object(&self, path: &str) -> impl Future<Output = Result<Option<EntityMetadata>>> + Send;

    /// Write a value unless it already holds the same value and confirmation.
    ///
    /// Returns whether anything was written.
    fn set_if_changed(
        &self,
        path: &str,
        value: Value,
        confirmed: bool,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn upsert(&self, path: &str, metadata: EntityMetadata) -> impl Future<Output = Result<()>> + Send;

    /// Whether [`ObjectTree::delete_recursive`] is available.
    fn supports_recursive_delete(&self) -> bool;

    fn delete_recursive(&self, path: &str) -> impl Future<Output = Result<()>> + Send;

    /// Entities whose path starts with `prefix`.
    fn query_by_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<(String, EntityMetadata)>>> + Send;

    /// State values whose path starts with `prefix`.
    fn states_under(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<(String, StateValue)>>> + Send;

    fn exists(&self, path: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Add a path to a named index (e.g. all color-capable channels).
    fn add_to_index(&self, index: &str, path: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, EntityMetadata>,
    states: BTreeMap<String, StateValue>,
    indexes: HashMap<String, BTreeSet<String>>,
    writes: usize,
    deletes: Vec<String>,
}

/// An in-memory [`ObjectTree`].
///
/// # Example
///
/// ```
/// use hue_mirror::{MemoryTree, ObjectTree};
/// use serde_json::json;
///
/// # tokio_test();
/// # fn tokio_test() {
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let tree = MemoryTree::new();
/// assert!(tree.set_if_changed("Lamp.on", json!(true), true).await.unwrap());
/// assert!(!tree.set_if_changed("Lamp.on", json!(true), true).await.unwrap());
/// # });
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryTree {
    state: Mutex<MemoryState>,
    recursive_delete: bool,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            recursive_delete: true,
        }
    }

    /// A tree that cannot delete subtrees.
    pub fn without_recursive_delete() -> Self {
        Self {
            recursive_delete: false,
            ..Self::new()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of a state, if any.
    pub fn value(&self, path: &str) -> Option<Value> {
        self.lock().states.get(path).map(|s| s.value.clone())
    }

    pub fn object(&self, path: &str) -> Option<EntityMetadata> {
        self.lock().objects.get(path).cloned()
    }

    /// Number of state writes that changed something.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Paths passed to [`ObjectTree::delete_recursive`], in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.lock().deletes.clone()
    }

    pub fn index(&self, index: &str) -> Vec<String> {
        self.lock()
            .indexes
            .get(index)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl ObjectTree for MemoryTree {
    async fn get(&self, path: &str) -> Result<Option<StateValue>> {
        Ok(self.lock().states.get(path).cloned())
    }

    async fn get_object(&self, path: &str) -> Result<Option<EntityMetadata>> {
        Ok(self.lock().objects.get(path).cloned())
    }

    async fn set_if_changed(&self, path: &str, value: Value, confirmed: bool) -> Result<bool> {
        let mut state = self.lock();
        let next = StateValue { value, confirmed };
        if state.states.get(path) == Some(&next) {
            return Ok(false);
        }
        state.states.insert(path.to_string(), next);
        state.writes += 1;
        Ok(true)
    }

    async fn upsert(&self, path: &str, metadata: EntityMetadata) -> Result<()> {
        self.lock().objects.insert(path.to_string(), metadata);
        Ok(())
    }

    fn supports_recursive_delete(&self) -> bool {
        self.recursive_delete
    }

    async fn delete_recursive(&self, path: &str) -> Result<()> {
        if !self.recursive_delete {
            return Err(Error::tree("delete", path, "recursive delete not supported"));
        }
        let mut state = self.lock();
        let child_prefix = format!("{}.", path);
        let in_subtree = |key: &String| key == path || key.starts_with(&child_prefix);
        state.objects.retain(|key, _| !in_subtree(key));
        state.states.retain(|key, _| !in_subtree(key));
        state.deletes.push(path.to_string());
        Ok(())
    }

    async fn query_by_prefix(&self, prefix: &str) -> Result<Vec<(String, EntityMetadata)>> {
        Ok(self
            .lock()
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, meta)| (key.clone(), meta.clone()))
            .collect())
    }

    async fn states_under(&self, prefix: &str) -> Result<Vec<(String, StateValue)>> {
        Ok(self
            .lock()
            .states
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let state = self.lock();
        Ok(state.objects.contains_key(path) || state.states.contains_key(path))
    }

    async fn add_to_index(&self, index: &str, path: &str) -> Result<()> {
        self.lock()
            .indexes
            .entry(index.to_string())
            .or_default()
            .insert(path.to_string());
        Ok(())
    }
}
