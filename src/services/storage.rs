//! Key/value persistence used to restore sessions across restarts.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::StorageError;

pub trait PersistentStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed access on top of the string store.
pub trait JsonStorageExt {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>;
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError>;
}

impl<S: PersistentStorage + ?Sized> JsonStorageExt for S {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_item(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.set_item(key, &serde_json::to_string(value)?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    fn items(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.items.lock().map_err(|_| StorageError::Poisoned)
    }

    pub fn keys(&self) -> Vec<String> {
        self.items().map(|items| items.keys().cloned().collect()).unwrap_or_default()
    }
}

impl PersistentStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> { Ok(self.items()?.get(key).cloned()) }
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> { self.items()?.insert(key.into(), value.into()); Ok(()) }
    fn remove_item(&self, key: &str) -> Result<(), StorageError> { self.items()?.remove(key); Ok(()) }
}

/// JSON file under `$WALLET_SELECTOR_ROOT/{app}/storage.json`, falling back
/// to the platform data dir. Every write rewrites the whole file.
#[cfg(feature = "native")]
#[derive(Debug)]
pub struct FileStorage {
    path: std::path::PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

#[cfg(feature = "native")]
impl FileStorage {
    pub fn open(app: &str) -> Result<Self, StorageError> {
        Self::open_at(storage_root().join(app).join("storage.json"))
    }

    pub fn open_at(path: impl Into<std::path::PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let items = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), entries = items.len(), "storage opened");
        Ok(Self { path, items: Mutex::new(items) })
    }

    pub fn path(&self) -> &std::path::Path { &self.path }

    fn flush(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(items)?)?;
        Ok(())
    }
}

#[cfg(feature = "native")]
impl PersistentStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.into(), value.into());
        self.flush(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        if items.remove(key).is_some() {
            self.flush(&items)?;
        }
        Ok(())
    }
}

#[cfg(feature = "native")]
fn storage_root() -> std::path::PathBuf {
    std::env::var(crate::core::keys::env::ROOT)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from(".")))
}
