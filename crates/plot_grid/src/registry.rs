//! Contract onto the surrounding payload registry.
//!
//! The grid core does not own payloads (the island/claim objects); it indexes
//! them. This trait is the seam through which the core reads payload
//! positions, maintains anchors (homes and spawn points) and keeps the
//! registry's location-keyed cache coherent while a payload moves.

use crate::types::{Address, OwnerId, PayloadId, WorldRef};
use async_trait::async_trait;
use std::collections::HashMap;

/// Summary of one payload as the registry sees it.
#[derive(Debug, Clone)]
pub struct PayloadSummary {
    pub payload: PayloadId,
    pub owner: OwnerId,
    pub address: Address,
    pub protection_range: i32,
}

/// The built-in world set. Handles may be absent when a sub-world is not
/// loaded. Names follow the `<base>`, `<base>_nether`, `<base>_the_end`
/// convention.
#[derive(Debug, Clone, Default)]
pub struct NativeWorlds {
    pub primary: Option<WorldRef>,
    pub secondary: Option<WorldRef>,
    pub tertiary: Option<WorldRef>,
}

impl NativeWorlds {
    /// Whether the given world is one of the native set, by identity or by
    /// the naming convention derived from the primary world.
    pub fn contains(&self, world: &WorldRef) -> bool {
        for native in [&self.primary, &self.secondary, &self.tertiary]
            .into_iter()
            .flatten()
        {
            if native == world {
                return true;
            }
        }
        if let Some(primary) = &self.primary {
            let base = &primary.name;
            return world.name == *base
                || world.name == format!("{base}_nether")
                || world.name == format!("{base}_the_end");
        }
        false
    }
}

/// Async contract onto the payload registry.
#[async_trait]
pub trait PlotRegistry: Send + Sync {
    /// All payloads anchored in the given world.
    async fn payloads_in(&self, world: &WorldRef) -> Vec<PayloadSummary>;

    /// The payload the owner holds in the given world, if any.
    async fn payload_of(&self, world: &WorldRef, owner: OwnerId) -> Option<PayloadSummary>;

    /// Everyone on the payload's team, owner included.
    async fn members_of(&self, payload: PayloadId) -> Vec<OwnerId>;

    /// Moves a payload's anchor address. Returns false when the registry
    /// refused the move.
    async fn set_payload_address(&self, payload: PayloadId, address: Address) -> bool;

    /// Named home anchors of a payload.
    async fn homes_of(&self, payload: PayloadId) -> HashMap<String, Address>;

    async fn set_home(&self, payload: PayloadId, name: &str, address: Address);

    async fn remove_home(&self, payload: PayloadId, name: &str);

    /// Per-kind spawn anchors of a payload.
    async fn spawn_points_of(&self, payload: PayloadId) -> HashMap<String, Address>;

    async fn set_spawn_point(&self, payload: PayloadId, kind: &str, address: Address);

    /// Drops the payload from the registry's location-keyed cache. Must be
    /// called before its address changes.
    async fn evict_cached(&self, payload: PayloadId);

    /// Re-inserts the payload into the location-keyed cache under its
    /// current address.
    async fn insert_cached(&self, payload: PayloadId);

    /// Flushes the payload's registry record to storage.
    async fn persist_payload(&self, payload: PayloadId);

    /// Pre-loads the region around an address so follow-up work does not
    /// stall on chunk loading.
    async fn load_region(&self, address: &Address);

    /// The built-in world set.
    fn native_worlds(&self) -> NativeWorlds;
}
