use gloo_storage::errors::StorageError;
use gloo_storage::{LocalStorage, Storage};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("persisted state is malformed: {0}")]
    Malformed(String),
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("failed to persist state: {0}")]
    WriteFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    pub week: u32,
    pub partner: String,
    /// False while the partner initiated the match and the owner has not
    /// spun to reveal it yet.
    #[serde(alias = "hasSpun", default = "confirmed_by_default")]
    pub confirmed: bool,
}

fn confirmed_by_default() -> bool {
    true
}

fn first_week() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingRecord {
    pub name: String,
    #[serde(default)]
    pub partnerships: Vec<Partnership>,
    #[serde(default = "first_week")]
    pub current_week: u32,
}

impl PairingRecord {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            partnerships: Vec::new(),
            current_week: first_week(),
        }
    }

    pub fn has_partnered(&self, name: &str) -> bool {
        self.partnerships.iter().any(|p| p.partner == name)
    }

    pub fn in_week(&self, week: u32) -> impl Iterator<Item = &Partnership> {
        self.partnerships.iter().filter(move |p| p.week == week)
    }
}

/// Every participant's record, keyed by canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingBook {
    records: HashMap<String, PairingRecord>,
}

impl PairingBook {
    pub fn get(&self, name: &str) -> Option<&PairingRecord> {
        self.records.get(name)
    }

    pub fn get_or_create(&mut self, name: &str) -> &mut PairingRecord {
        self.records
            .entry(name.to_owned())
            .or_insert_with(|| PairingRecord::new(name))
    }

    pub fn upsert(&mut self, record: PairingRecord) {
        self.records.insert(record.name.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &PairingRecord> {
        self.records.values()
    }
}

/// Where the serialized book lives.
pub trait KeyValueStore {
    fn read_book(&self, key: &str) -> Result<Option<PairingBook>, StoreError>;
    fn write_book(&mut self, key: &str, book: &PairingBook) -> Result<(), StoreError>;
}

/// Browser `localStorage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorageStore;

impl KeyValueStore for LocalStorageStore {
    fn read_book(&self, key: &str) -> Result<Option<PairingBook>, StoreError> {
        match LocalStorage::get::<PairingBook>(key) {
            Ok(book) => Ok(Some(book)),
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(StorageError::SerdeError(err)) => Err(StoreError::Malformed(err.to_string())),
            Err(err) => Err(StoreError::Unavailable(err.to_string())),
        }
    }

    fn write_book(&mut self, key: &str, book: &PairingBook) -> Result<(), StoreError> {
        LocalStorage::set(key, book).map_err(|err| StoreError::WriteFailed(err.to_string()))
    }
}

/// In-process store for hosts without `localStorage`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    reject_writes: bool,
}

impl MemoryStore {
    pub fn with_raw(key: &str, payload: &str) -> Self {
        let mut store = Self::default();
        store.entries.insert(key.to_owned(), payload.to_owned());
        store
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Makes subsequent writes fail, e.g. to mimic a full quota.
    pub fn set_reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }
}

impl KeyValueStore for MemoryStore {
    fn read_book(&self, key: &str) -> Result<Option<PairingBook>, StoreError> {
        match self.entries.get(key) {
            Some(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|err| StoreError::Malformed(err.to_string())),
            None => Ok(None),
        }
    }

    fn write_book(&mut self, key: &str, book: &PairingBook) -> Result<(), StoreError> {
        if self.reject_writes {
            return Err(StoreError::WriteFailed("storage quota exceeded".to_owned()));
        }
        let text =
            serde_json::to_string(book).map_err(|err| StoreError::WriteFailed(err.to_string()))?;
        self.entries.insert(key.to_owned(), text);
        Ok(())
    }
}

/// Loads and saves the whole book under one well-known key.
#[derive(Debug, Clone)]
pub struct PairingStore<S> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> PairingStore<S> {
    pub fn new(backend: S, key: &str) -> Self {
        Self {
            backend,
            key: key.to_owned(),
        }
    }

    /// Never fails: absent or unreadable state starts an empty book.
    pub fn load(&self) -> PairingBook {
        match self.backend.read_book(&self.key) {
            Ok(Some(book)) => book,
            Ok(None) => PairingBook::default(),
            Err(err) => {
                warn!("Falling back to empty pairing book: {}", err);
                PairingBook::default()
            }
        }
    }

    pub fn save(&mut self, book: &PairingBook) -> Result<(), StoreError> {
        let result = self.backend.write_book(&self.key, book);
        if let Err(err) = &result {
            warn!("Failed to persist pairing book: {}", err);
        }
        result
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }
}
