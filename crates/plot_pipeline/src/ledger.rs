//! Per-owner bookkeeping: which cell an owner holds and when they last
//! relocated. Backs the relocation cooldown.

use plot_grid::{GridCoordinate, OwnerId, RecordStore, StoreError};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

/// The persisted per-owner record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub owner: OwnerId,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub coordinate: Option<String>,
    /// Milliseconds since the Unix epoch of the last completed relocation.
    #[serde(default)]
    pub last_relocation_ms: Option<u64>,
}

pub struct OwnerLedger {
    store: Arc<dyn RecordStore<OwnerRecord>>,
    records: DashMap<OwnerId, OwnerRecord>,
}

impl OwnerLedger {
    pub fn new(store: Arc<dyn RecordStore<OwnerRecord>>) -> Self {
        Self {
            store,
            records: DashMap::new(),
        }
    }

    /// Loads all persisted records. Returns how many were loaded.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let records = self.store.load_all().await?;
        let mut loaded = 0usize;
        for (key, record) in records {
            if record.owner.to_string() != key {
                warn!("⚠️ Owner record key '{}' does not match its owner, skipping", key);
                continue;
            }
            self.records.insert(record.owner, record);
            loaded += 1;
        }
        info!("📦 Owner ledger loaded: {} records", loaded);
        Ok(loaded)
    }

    pub fn record(&self, owner: OwnerId) -> Option<OwnerRecord> {
        self.records.get(&owner).map(|r| r.clone())
    }

    /// Updates the cell an owner holds.
    pub fn set_coordinate(&self, owner: OwnerId, name: Option<&str>, coord: GridCoordinate) {
        let mut entry = self.records.entry(owner).or_insert_with(|| OwnerRecord {
            owner,
            owner_name: None,
            coordinate: None,
            last_relocation_ms: None,
        });
        if let Some(name) = name {
            entry.owner_name = Some(name.to_string());
        }
        entry.coordinate = Some(coord.to_string());
        let record = entry.clone();
        drop(entry);
        self.persist(record);
    }

    /// Stamps a completed relocation at the current time.
    pub fn record_relocation(&self, owner: OwnerId) {
        let mut entry = self.records.entry(owner).or_insert_with(|| OwnerRecord {
            owner,
            owner_name: None,
            coordinate: None,
            last_relocation_ms: None,
        });
        entry.last_relocation_ms = Some(now_ms());
        let record = entry.clone();
        drop(entry);
        self.persist(record);
    }

    /// Time left on the cooldown, or `None` when the owner may relocate.
    pub fn remaining_cooldown(&self, owner: OwnerId, cooldown: Duration) -> Option<Duration> {
        if cooldown.is_zero() {
            return None;
        }
        let last = self.records.get(&owner)?.last_relocation_ms?;
        let elapsed = now_ms().saturating_sub(last);
        let cooldown_ms = cooldown.as_millis() as u64;
        if elapsed >= cooldown_ms {
            None
        } else {
            Some(Duration::from_millis(cooldown_ms - elapsed))
        }
    }

    /// Clears an owner's cooldown stamp.
    pub fn reset_cooldown(&self, owner: OwnerId) {
        if let Some(mut entry) = self.records.get_mut(&owner) {
            entry.last_relocation_ms = None;
            let record = entry.clone();
            drop(entry);
            self.persist(record);
        }
    }

    fn persist(&self, record: OwnerRecord) {
        let store = Arc::clone(&self.store);
        let key = record.owner.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.save(&key, &record).await {
                error!("❌ Failed to save owner record {}: {}", key, e);
            }
        });
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Renders a cooldown duration as `"1d 2h 30m"`, with minutes rounded up so
/// a few seconds left never displays as nothing.
pub fn format_cooldown(remaining: Duration) -> String {
    let total_minutes = (remaining.as_secs() + 59) / 60;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;
    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(format!("{minutes}m"));
    }
    parts.join(" ")
}
