use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::storage::{Storage, StorageScope, Storages};

/// A value bound to a storage slot.
///
/// Construction reads the slot and falls back to the default when it is
/// empty or unreadable. The current value is written back on construction
/// and after every `set`/`update`. Read and write failures are logged and
/// never returned: the in-memory value is always authoritative.
pub struct PersistedState<T> {
    key: String,
    scope: StorageScope,
    storage: Arc<dyn Storage>,
    value: T,
}

impl<T> PersistedState<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(key: impl Into<String>, default: T, scope: StorageScope, storages: &Storages) -> Self {
        let key = key.into();
        let storage = storages.get(scope).clone();
        let value = read_slot(storage.as_ref(), &key, scope).unwrap_or(default);

        let state = Self {
            key,
            scope,
            storage,
            value,
        };
        state.persist();
        state
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        self.persist();
    }

    /// Mutate the value in place, then persist it.
    pub fn update<F>(&mut self, f: F)
    where
        F: FnOnce(&mut T),
    {
        f(&mut self.value);
        self.persist();
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn scope(&self) -> StorageScope {
        self.scope
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %self.key, scope = %self.scope, error = %e, "Failed to serialize persisted state");
                return;
            }
        };
        if let Err(e) = self.storage.set_item(&self.key, &json) {
            warn!(key = %self.key, scope = %self.scope, error = %e, "Failed to save persisted state");
        }
    }
}

fn read_slot<T: DeserializeOwned>(storage: &dyn Storage, key: &str, scope: StorageScope) -> Option<T> {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return None,
        Err(e) => {
            warn!(key, scope = %scope, error = %e, "Failed to read persisted state");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, scope = %scope, error = %e, "Discarding undecodable persisted state");
            None
        }
    }
}
