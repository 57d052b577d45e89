//! Client-local state persistence.
//!
//! `PersistedState<T>` binds a value to a storage slot so it survives a
//! reload: durable (`StorageScope::Local`, a JSON file on disk) or
//! process-lifetime (`StorageScope::Session`, in memory). Values are stored
//! as JSON text, in whatever shape the caller's default value has; there is
//! no versioning or migration. No cross-process synchronisation, debouncing
//! or size limit is applied beyond a backend's own quota.

pub mod state;
pub mod storage;

pub use state::PersistedState;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageScope, Storages};
