//! Persistence contracts and the built-in store implementations.
//!
//! Grid state is persisted one document per key, with the canonical
//! coordinate string (`"x,z"`) as the key. [`MemoryStore`] backs tests and
//! embedded use; [`JsonFileStore`] keeps one pretty-printed JSON file per
//! record under a directory.

use crate::coordinate::GridCoordinate;
use crate::location::{GridLocation, SlotStatus};
use crate::types::{OwnerId, PayloadId};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Errors raised by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Keyed document store for one record type.
#[async_trait]
pub trait RecordStore<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Loads every stored record with its key. Unreadable records are
    /// skipped with a warning rather than failing the whole load.
    async fn load_all(&self) -> Result<Vec<(String, T)>, StoreError>;

    async fn save(&self, key: &str, record: &T) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store.
pub struct MemoryStore<T> {
    records: DashMap<String, T>,
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.records.get(key).map(|r| r.clone())
    }
}

impl<T: Clone> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> RecordStore<T> for MemoryStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn load_all(&self) -> Result<Vec<(String, T)>, StoreError> {
        Ok(self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn save(&self, key: &str, record: &T) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }
}

/// One JSON file per record under a directory; the file stem is the key.
pub struct JsonFileStore<T> {
    dir: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _marker: PhantomData,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are canonical coordinate strings; '-' and ',' are filename-safe
        // everywhere we run, but guard against separators anyway.
        let safe: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl<T> RecordStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load_all(&self) -> Result<Vec<(String, T)>, StoreError> {
        let mut out = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<T>(&bytes) {
                Ok(record) => out.push((key, record)),
                Err(e) => {
                    warn!("⚠️ Skipping unreadable record {}: {}", path.display(), e);
                }
            }
        }
        Ok(out)
    }

    async fn save(&self, key: &str, record: &T) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.path_for(key), bytes).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The persisted form of a [`GridLocation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridLocationRecord {
    pub coordinate: String,
    pub status: SlotStatus,
    #[serde(default)]
    pub owner: Option<OwnerId>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub payload: Option<PayloadId>,
    #[serde(default)]
    pub dimension_payloads: HashMap<String, PayloadId>,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub purchase_price: f64,
}

impl From<&GridLocation> for GridLocationRecord {
    fn from(loc: &GridLocation) -> Self {
        Self {
            coordinate: loc.coordinate().to_string(),
            status: loc.status(),
            owner: loc.owner(),
            owner_name: loc.owner_name().map(String::from),
            payload: loc.payload(),
            dimension_payloads: loc.dimension_payloads().clone(),
            reserved: loc.is_reserved(),
            blocked: loc.is_blocked(),
            purchase_price: loc.purchase_price(),
        }
    }
}

impl TryFrom<GridLocationRecord> for GridLocation {
    type Error = crate::error::CoordinateParseError;

    fn try_from(record: GridLocationRecord) -> Result<Self, Self::Error> {
        let coordinate = GridCoordinate::parse(&record.coordinate)?;
        Ok(GridLocation::restore(
            coordinate,
            record.status,
            record.owner,
            record.owner_name,
            record.payload,
            record.dimension_payloads,
            record.reserved,
            record.blocked,
            record.purchase_price,
        ))
    }
}
