//! The shared grid index.
//!
//! `GridManager` owns the forward map (coordinate to cell record) plus the
//! reverse indexes used for hot lookups: owner to coordinate, legacy payload
//! to coordinate, and per-dimension payload to coordinate. Every mutation
//! writes through to the record store asynchronously; persistence failures
//! are logged and never rolled back.

use crate::coordinate::GridCoordinate;
use crate::error::GridError;
use crate::location::{GridLocation, SlotStatus};
use crate::persist::{GridLocationRecord, RecordStore};
use crate::registry::PlotRegistry;
use crate::settings::GridSettings;
use crate::types::{Address, OwnerId, PayloadId, WorldRef, PRIMARY_DIMENSION};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a cell is occupied with: one legacy payload, or one payload per
/// dimension.
#[derive(Debug, Clone)]
pub enum PayloadAssignment {
    Single(PayloadId),
    PerDimension(HashMap<String, PayloadId>),
}

impl PayloadAssignment {
    fn into_map(self) -> HashMap<String, PayloadId> {
        match self {
            PayloadAssignment::Single(id) => {
                HashMap::from([(PRIMARY_DIMENSION.to_string(), id)])
            }
            PayloadAssignment::PerDimension(map) => map,
        }
    }
}

pub struct GridManager {
    settings: Arc<GridSettings>,
    locations: DashMap<GridCoordinate, GridLocation>,
    owner_index: DashMap<OwnerId, GridCoordinate>,
    payload_index: DashMap<PayloadId, GridCoordinate>,
    dimension_index: DashMap<(String, PayloadId), GridCoordinate>,
    store: Arc<dyn RecordStore<GridLocationRecord>>,
    registry: Arc<dyn PlotRegistry>,
}

impl GridManager {
    pub fn new(
        settings: Arc<GridSettings>,
        store: Arc<dyn RecordStore<GridLocationRecord>>,
        registry: Arc<dyn PlotRegistry>,
    ) -> Self {
        Self {
            settings,
            locations: DashMap::new(),
            owner_index: DashMap::new(),
            payload_index: DashMap::new(),
            dimension_index: DashMap::new(),
            store,
            registry,
        }
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    /// Bootstraps the index from the record store. Unparseable records are
    /// skipped with a warning. Returns the number of cells loaded.
    pub async fn load(&self) -> Result<usize, GridError> {
        let records = self.store.load_all().await?;
        let mut loaded = 0usize;
        for (key, record) in records {
            match GridLocation::try_from(record) {
                Ok(loc) => {
                    self.index(&loc);
                    self.locations.insert(loc.coordinate(), loc);
                    loaded += 1;
                }
                Err(e) => {
                    warn!("⚠️ Skipping grid record '{}': {}", key, e);
                }
            }
        }
        info!("📦 Grid loaded: {} cells tracked", loaded);
        Ok(loaded)
    }

    /// Flushes every tracked cell to the store, awaiting each write. Returns
    /// the number of cells saved; individual failures are logged and skipped.
    pub async fn save_all(&self) -> usize {
        let snapshot: Vec<(String, GridLocationRecord)> = self
            .locations
            .iter()
            .map(|entry| (entry.key().to_string(), GridLocationRecord::from(entry.value())))
            .collect();
        let mut saved = 0usize;
        for (key, record) in snapshot {
            match self.store.save(&key, &record).await {
                Ok(()) => saved += 1,
                Err(e) => error!("❌ Failed to save grid cell {}: {}", key, e),
            }
        }
        saved
    }

    pub fn in_bounds(&self, coord: GridCoordinate) -> bool {
        self.settings.in_bounds(coord.x, coord.z)
    }

    /// Effective status of a cell. Out-of-bounds coordinates report `Locked`;
    /// untracked in-bounds cells report `Available`.
    pub fn status(&self, coord: GridCoordinate) -> SlotStatus {
        if !self.in_bounds(coord) {
            return SlotStatus::Locked;
        }
        self.locations
            .get(&coord)
            .map(|loc| loc.status())
            .unwrap_or(SlotStatus::Available)
    }

    pub fn is_available(&self, coord: GridCoordinate) -> bool {
        if !self.in_bounds(coord) {
            return false;
        }
        self.locations
            .get(&coord)
            .map(|loc| loc.is_available())
            .unwrap_or(true)
    }

    pub fn is_reserved(&self, coord: GridCoordinate) -> bool {
        self.locations
            .get(&coord)
            .map(|loc| loc.is_reserved())
            .unwrap_or(false)
    }

    /// A cloned snapshot of one cell.
    pub fn location(&self, coord: GridCoordinate) -> Option<GridLocation> {
        self.locations.get(&coord).map(|loc| loc.clone())
    }

    /// Reserves a cell, blocked (not purchasable) or not, in one persisted
    /// mutation.
    pub fn reserve(&self, coord: GridCoordinate, blocked: bool) -> Result<(), GridError> {
        self.mutate(coord, |loc| loc.reserve(blocked))
    }

    /// Releases a cell's reservation, clearing the blocked flag and purchase
    /// price with it. Untracked cells are left untracked.
    pub fn unreserve(&self, coord: GridCoordinate) -> Result<(), GridError> {
        if !self.in_bounds(coord) {
            return Err(GridError::OutOfBounds(coord));
        }
        let Some(mut entry) = self.locations.get_mut(&coord) else {
            return Ok(());
        };
        entry.value_mut().unreserve();
        let record = GridLocationRecord::from(entry.value());
        drop(entry);
        self.persist(coord, record);
        Ok(())
    }

    pub fn set_purchase_price(&self, coord: GridCoordinate, price: f64) -> Result<(), GridError> {
        self.mutate(coord, |loc| loc.set_purchase_price(price))
    }

    fn mutate(
        &self,
        coord: GridCoordinate,
        f: impl FnOnce(&mut GridLocation),
    ) -> Result<(), GridError> {
        if !self.in_bounds(coord) {
            return Err(GridError::OutOfBounds(coord));
        }
        let mut entry = self
            .locations
            .entry(coord)
            .or_insert_with(|| GridLocation::new(coord));
        f(entry.value_mut());
        let record = GridLocationRecord::from(entry.value());
        drop(entry);
        self.persist(coord, record);
        Ok(())
    }

    /// Claims a cell for an owner.
    ///
    /// An already-occupied cell is overwritten with a warning: concurrent
    /// claimants can both pass the availability check, and last write wins.
    pub fn occupy(
        &self,
        coord: GridCoordinate,
        owner: OwnerId,
        owner_name: Option<String>,
        assignment: PayloadAssignment,
    ) -> Result<(), GridError> {
        if !self.in_bounds(coord) {
            return Err(GridError::OutOfBounds(coord));
        }
        let payloads = assignment.into_map();
        let mut entry = self
            .locations
            .entry(coord)
            .or_insert_with(|| GridLocation::new(coord));
        {
            let loc = entry.value_mut();
            if loc.status() == SlotStatus::Occupied && loc.owner() != Some(owner) {
                warn!(
                    "⚠️ Cell {} already occupied by {:?}, overwriting with {}",
                    coord,
                    loc.owner(),
                    owner
                );
            }
            self.unindex(loc);
            loc.occupy(owner, owner_name, payloads);
            self.index(loc);
        }
        let record = GridLocationRecord::from(entry.value());
        drop(entry);
        self.persist(coord, record);
        info!("🏝️ Cell {} occupied by {}", coord, owner);
        Ok(())
    }

    /// Resets a cell to available, purging it from every reverse index.
    /// Returns the pre-clear snapshot when the cell was tracked.
    pub fn clear(&self, coord: GridCoordinate) -> Option<GridLocation> {
        let mut entry = self.locations.get_mut(&coord)?;
        let before = entry.value().clone();
        self.unindex(&before);
        entry.value_mut().clear();
        let record = GridLocationRecord::from(entry.value());
        drop(entry);
        self.persist(coord, record);
        info!("🧹 Cell {} cleared", coord);
        Some(before)
    }

    /// Records the payload for one dimension of a cell.
    pub fn set_dimension_payload(
        &self,
        coord: GridCoordinate,
        dimension: &str,
        payload: PayloadId,
    ) -> Result<(), GridError> {
        if !self.in_bounds(coord) {
            return Err(GridError::OutOfBounds(coord));
        }
        let mut entry = self
            .locations
            .entry(coord)
            .or_insert_with(|| GridLocation::new(coord));
        entry.value_mut().set_dimension_payload(dimension, payload);
        self.dimension_index
            .insert((dimension.to_string(), payload), coord);
        if dimension == PRIMARY_DIMENSION {
            self.payload_index.insert(payload, coord);
        }
        let record = GridLocationRecord::from(entry.value());
        drop(entry);
        self.persist(coord, record);
        Ok(())
    }

    pub fn clear_dimension_payload(
        &self,
        coord: GridCoordinate,
        dimension: &str,
    ) -> Result<(), GridError> {
        let Some(mut entry) = self.locations.get_mut(&coord) else {
            return Ok(());
        };
        if let Some(removed) = entry.value_mut().clear_dimension_payload(dimension) {
            self.dimension_index
                .remove(&(dimension.to_string(), removed));
            if dimension == PRIMARY_DIMENSION {
                self.payload_index.remove(&removed);
            }
        }
        let record = GridLocationRecord::from(entry.value());
        drop(entry);
        self.persist(coord, record);
        Ok(())
    }

    /// The cell an owner occupies. Checks the reverse index, then scans the
    /// forward map, then falls back to the registry; hits from the slower
    /// paths are cached back into the index.
    pub async fn coordinate_of_owner(&self, owner: OwnerId) -> Option<GridCoordinate> {
        if let Some(coord) = self.owner_index.get(&owner) {
            return Some(*coord);
        }
        if let Some(coord) = self
            .locations
            .iter()
            .find(|entry| entry.value().owner() == Some(owner))
            .map(|entry| *entry.key())
        {
            self.owner_index.insert(owner, coord);
            return Some(coord);
        }
        // Registry fallback: the owner may hold a payload the grid never saw.
        let primary = self.registry.native_worlds().primary?;
        let summary = self.registry.payload_of(&primary, owner).await?;
        let coord = self.coordinate_at(summary.address.x as i32, summary.address.z as i32);
        debug!(
            "🔎 Owner {} resolved to {} via registry fallback",
            owner, coord
        );
        self.owner_index.insert(owner, coord);
        self.payload_index.insert(summary.payload, coord);
        Some(coord)
    }

    /// The cell hosting the given legacy payload.
    pub fn coordinate_of_payload(&self, payload: PayloadId) -> Option<GridCoordinate> {
        if let Some(coord) = self.payload_index.get(&payload) {
            return Some(*coord);
        }
        let coord = self
            .locations
            .iter()
            .find(|entry| entry.value().payload() == Some(payload))
            .map(|entry| *entry.key())?;
        self.payload_index.insert(payload, coord);
        Some(coord)
    }

    /// The cell hosting the given payload in the given dimension.
    pub fn coordinate_of_dimension_payload(
        &self,
        dimension: &str,
        payload: PayloadId,
    ) -> Option<GridCoordinate> {
        if let Some(coord) = self.dimension_index.get(&(dimension.to_string(), payload)) {
            return Some(*coord);
        }
        let coord = self
            .locations
            .iter()
            .find(|entry| entry.value().dimension_payload(dimension) == Some(payload))
            .map(|entry| *entry.key())?;
        self.dimension_index
            .insert((dimension.to_string(), payload), coord);
        Some(coord)
    }

    /// Reconciles the grid with the registry's view of the primary world:
    /// every registered payload gets its cell occupied, skipping payloads
    /// outside the grid bounds and cells that are already occupied.
    /// Returns the number of cells newly occupied.
    pub async fn sync(&self) -> usize {
        let Some(primary) = self.registry.native_worlds().primary else {
            warn!("⚠️ Grid sync skipped: no primary world registered");
            return 0;
        };
        let mut occupied = 0usize;
        for summary in self.registry.payloads_in(&primary).await {
            let coord = self.coordinate_at(summary.address.x as i32, summary.address.z as i32);
            if !self.in_bounds(coord) {
                debug!(
                    "Skipping payload {} at {}: outside grid bounds",
                    summary.payload, coord
                );
                continue;
            }
            if self.status(coord) == SlotStatus::Occupied {
                continue;
            }
            if self
                .occupy(
                    coord,
                    summary.owner,
                    None,
                    PayloadAssignment::Single(summary.payload),
                )
                .is_ok()
            {
                occupied += 1;
            }
        }
        info!("🔄 Grid sync: {} cells newly occupied", occupied);
        occupied
    }

    /// Reconciles one dimension: records the dimension payload for every
    /// registered payload in that dimension's world. Returns the number of
    /// entries recorded.
    pub async fn sync_dimension(&self, dimension: &str, world: &WorldRef) -> usize {
        let mut recorded = 0usize;
        for summary in self.registry.payloads_in(world).await {
            let coord = self.coordinate_at(summary.address.x as i32, summary.address.z as i32);
            if !self.in_bounds(coord) {
                debug!(
                    "Skipping {} payload {} at {}: outside grid bounds",
                    dimension, summary.payload, coord
                );
                continue;
            }
            if self
                .set_dimension_payload(coord, dimension, summary.payload)
                .is_ok()
            {
                recorded += 1;
            }
        }
        debug!("🔄 Dimension '{}' sync: {} entries", dimension, recorded);
        recorded
    }

    pub fn tracked_count(&self) -> usize {
        self.locations.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.locations
            .iter()
            .filter(|e| e.value().status() == SlotStatus::Occupied)
            .count()
    }

    pub fn reserved_count(&self) -> usize {
        self.locations
            .iter()
            .filter(|e| e.value().is_reserved())
            .count()
    }

    pub fn all_locations(&self) -> Vec<GridLocation> {
        self.locations.iter().map(|e| e.value().clone()).collect()
    }

    /// World block coordinates of a cell's center.
    pub fn world_center(&self, coord: GridCoordinate) -> (i32, i32) {
        coord.to_world(self.settings.cell_pitch())
    }

    /// The cell containing the given world block coordinates.
    pub fn coordinate_at(&self, world_x: i32, world_z: i32) -> GridCoordinate {
        GridCoordinate::from_world(world_x, world_z, self.settings.cell_pitch())
    }

    /// An address at a cell's center in the given world.
    pub fn center_address(&self, coord: GridCoordinate, world: WorldRef, y: f64) -> Address {
        let (x, z) = self.world_center(coord);
        Address::new(world, x as f64, y, z as f64)
    }

    fn index(&self, loc: &GridLocation) {
        let coord = loc.coordinate();
        if let Some(owner) = loc.owner() {
            self.owner_index.insert(owner, coord);
        }
        if let Some(payload) = loc.payload() {
            self.payload_index.insert(payload, coord);
        }
        for (dimension, payload) in loc.dimension_payloads() {
            self.dimension_index
                .insert((dimension.clone(), *payload), coord);
        }
    }

    fn unindex(&self, loc: &GridLocation) {
        if let Some(owner) = loc.owner() {
            self.owner_index.remove(&owner);
        }
        if let Some(payload) = loc.payload() {
            self.payload_index.remove(&payload);
        }
        for (dimension, payload) in loc.dimension_payloads() {
            self.dimension_index.remove(&(dimension.clone(), *payload));
        }
    }

    /// Write-behind persistence: the save runs on a background task, and a
    /// failure is logged rather than rolled back.
    fn persist(&self, coord: GridCoordinate, record: GridLocationRecord) {
        let store = Arc::clone(&self.store);
        let key = coord.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.save(&key, &record).await {
                error!("❌ Write-behind save failed for cell {}: {}", key, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;
    use crate::registry::{NativeWorlds, PayloadSummary};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubRegistry {
        primary: WorldRef,
        payloads: Mutex<Vec<PayloadSummary>>,
    }

    impl StubRegistry {
        fn new() -> Self {
            Self {
                primary: WorldRef::new("plots"),
                payloads: Mutex::new(Vec::new()),
            }
        }

        fn add_payload(&self, summary: PayloadSummary) {
            self.payloads.lock().unwrap().push(summary);
        }
    }

    #[async_trait]
    impl PlotRegistry for StubRegistry {
        async fn payloads_in(&self, world: &WorldRef) -> Vec<PayloadSummary> {
            self.payloads
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.address.world == *world)
                .cloned()
                .collect()
        }

        async fn payload_of(&self, world: &WorldRef, owner: OwnerId) -> Option<PayloadSummary> {
            self.payloads
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.address.world == *world && s.owner == owner)
                .cloned()
        }

        async fn members_of(&self, _payload: PayloadId) -> Vec<OwnerId> {
            Vec::new()
        }

        async fn set_payload_address(&self, _payload: PayloadId, _address: Address) -> bool {
            true
        }

        async fn homes_of(&self, _payload: PayloadId) -> std::collections::HashMap<String, Address> {
            std::collections::HashMap::new()
        }

        async fn set_home(&self, _payload: PayloadId, _name: &str, _address: Address) {}

        async fn remove_home(&self, _payload: PayloadId, _name: &str) {}

        async fn spawn_points_of(
            &self,
            _payload: PayloadId,
        ) -> std::collections::HashMap<String, Address> {
            std::collections::HashMap::new()
        }

        async fn set_spawn_point(&self, _payload: PayloadId, _kind: &str, _address: Address) {}

        async fn evict_cached(&self, _payload: PayloadId) {}

        async fn insert_cached(&self, _payload: PayloadId) {}

        async fn persist_payload(&self, _payload: PayloadId) {}

        async fn load_region(&self, _address: &Address) {}

        fn native_worlds(&self) -> NativeWorlds {
            NativeWorlds {
                primary: Some(self.primary.clone()),
                secondary: None,
                tertiary: None,
            }
        }
    }

    fn manager_with(registry: Arc<StubRegistry>) -> GridManager {
        GridManager::new(
            Arc::new(GridSettings::default()),
            Arc::new(MemoryStore::new()),
            registry,
        )
    }

    fn manager() -> GridManager {
        manager_with(Arc::new(StubRegistry::new()))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn untracked_cell_is_available_and_out_of_bounds_is_locked() {
        let grid = manager();
        assert_eq!(grid.status(GridCoordinate::new(3, -3)), SlotStatus::Available);
        assert!(grid.is_available(GridCoordinate::new(3, -3)));
        assert_eq!(grid.status(GridCoordinate::new(999, 0)), SlotStatus::Locked);
        assert!(!grid.is_available(GridCoordinate::new(999, 0)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn occupy_then_clear_restores_availability_and_purges_indexes() {
        let grid = manager();
        let coord = GridCoordinate::new(2, -1);
        let owner = OwnerId::new();
        let payload = PayloadId::new();

        grid.occupy(
            coord,
            owner,
            Some("alex".into()),
            PayloadAssignment::Single(payload),
        )
        .unwrap();
        assert_eq!(grid.status(coord), SlotStatus::Occupied);
        assert_eq!(grid.coordinate_of_owner(owner).await, Some(coord));
        assert_eq!(grid.coordinate_of_payload(payload), Some(coord));
        assert_eq!(
            grid.coordinate_of_dimension_payload(PRIMARY_DIMENSION, payload),
            Some(coord)
        );

        let before = grid.clear(coord).unwrap();
        assert_eq!(before.owner(), Some(owner));
        assert!(grid.is_available(coord));
        assert!(grid.coordinate_of_payload(payload).is_none());
        assert!(grid
            .coordinate_of_dimension_payload(PRIMARY_DIMENSION, payload)
            .is_none());
        assert!(grid.coordinate_of_owner(owner).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_occupy_overwrites_with_last_writer_winning() {
        let grid = manager();
        let coord = GridCoordinate::new(0, 0);
        let first = OwnerId::new();
        let second = OwnerId::new();
        let first_payload = PayloadId::new();

        grid.occupy(coord, first, None, PayloadAssignment::Single(first_payload))
            .unwrap();
        grid.occupy(coord, second, None, PayloadAssignment::Single(PayloadId::new()))
            .unwrap();

        let loc = grid.location(coord).unwrap();
        assert_eq!(loc.owner(), Some(second));
        assert!(grid.coordinate_of_payload(first_payload).is_none());
        assert!(grid.coordinate_of_owner(first).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reserve_and_price_interactions() {
        let grid = manager();
        let coord = GridCoordinate::new(-4, 4);

        grid.reserve(coord, true).unwrap();
        assert_eq!(grid.status(coord), SlotStatus::Reserved);
        assert!(grid.is_reserved(coord));
        assert!(!grid.is_available(coord));
        assert!(grid.location(coord).unwrap().is_blocked());

        grid.set_purchase_price(coord, 5000.0).unwrap();
        let loc = grid.location(coord).unwrap();
        assert!(!loc.is_blocked());
        assert!(loc.is_purchasable());

        grid.unreserve(coord).unwrap();
        assert!(grid.is_available(coord));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreserve_releases_a_blocked_reservation_completely() {
        let grid = manager();
        let coord = GridCoordinate::new(3, 3);

        grid.reserve(coord, true).unwrap();
        grid.unreserve(coord).unwrap();

        let loc = grid.location(coord).unwrap();
        assert!(!loc.is_blocked());
        assert!(!loc.is_reserved());
        assert_eq!(loc.purchase_price(), 0.0);
        assert_eq!(grid.status(coord), SlotStatus::Available);
        assert!(grid.is_available(coord));

        // Unreserving an untracked cell neither fails nor creates a record.
        grid.unreserve(GridCoordinate::new(9, 9)).unwrap();
        assert!(grid.location(GridCoordinate::new(9, 9)).is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pricing_an_untracked_cell_reserves_it() {
        let grid = manager();
        let coord = GridCoordinate::new(-7, 2);

        grid.set_purchase_price(coord, 100.0).unwrap();
        assert_eq!(grid.status(coord), SlotStatus::Reserved);
        assert!(grid.is_reserved(coord));
        assert!(!grid.is_available(coord));
        assert!(grid.location(coord).unwrap().is_purchasable());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn occupy_out_of_bounds_is_rejected() {
        let grid = manager();
        let err = grid
            .occupy(
                GridCoordinate::new(1000, 1000),
                OwnerId::new(),
                None,
                PayloadAssignment::Single(PayloadId::new()),
            )
            .unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_occupies_registered_payloads_and_skips_occupied_and_out_of_bounds() {
        let registry = Arc::new(StubRegistry::new());
        let world = registry.primary.clone();
        let grid = manager_with(Arc::clone(&registry));
        let pitch = grid.settings().cell_pitch() as f64;

        let in_grid = OwnerId::new();
        registry.add_payload(PayloadSummary {
            payload: PayloadId::new(),
            owner: in_grid,
            address: Address::new(world.clone(), 2.0 * pitch, 64.0, -1.0 * pitch),
            protection_range: 100,
        });
        // Outside the configured bounds.
        registry.add_payload(PayloadSummary {
            payload: PayloadId::new(),
            owner: OwnerId::new(),
            address: Address::new(world.clone(), 500.0 * pitch, 64.0, 0.0),
            protection_range: 100,
        });
        // Cell already occupied by someone else: sync must not steal it.
        let holder = OwnerId::new();
        grid.occupy(
            GridCoordinate::new(5, 5),
            holder,
            None,
            PayloadAssignment::Single(PayloadId::new()),
        )
        .unwrap();
        registry.add_payload(PayloadSummary {
            payload: PayloadId::new(),
            owner: OwnerId::new(),
            address: Address::new(world.clone(), 5.0 * pitch, 64.0, 5.0 * pitch),
            protection_range: 100,
        });

        assert_eq!(grid.sync().await, 1);
        assert_eq!(
            grid.coordinate_of_owner(in_grid).await,
            Some(GridCoordinate::new(2, -1))
        );
        assert_eq!(
            grid.location(GridCoordinate::new(5, 5)).unwrap().owner(),
            Some(holder)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dimension_sync_records_payloads_for_that_dimension() {
        let registry = Arc::new(StubRegistry::new());
        let grid = manager_with(Arc::clone(&registry));
        let pitch = grid.settings().cell_pitch() as f64;
        let mining = WorldRef::new("plots_mining");

        let payload = PayloadId::new();
        registry.add_payload(PayloadSummary {
            payload,
            owner: OwnerId::new(),
            address: Address::new(mining.clone(), 4.0 * pitch, 64.0, 4.0 * pitch),
            protection_range: 100,
        });

        assert_eq!(grid.sync_dimension("mining", &mining).await, 1);
        assert_eq!(
            grid.coordinate_of_dimension_payload("mining", payload),
            Some(GridCoordinate::new(4, 4))
        );
        // The legacy payload slot stays untouched for non-primary dimensions.
        assert!(grid
            .location(GridCoordinate::new(4, 4))
            .unwrap()
            .payload()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn owner_lookup_falls_back_to_registry_and_caches() {
        let registry = Arc::new(StubRegistry::new());
        let world = registry.primary.clone();
        let grid = manager_with(Arc::clone(&registry));
        let pitch = grid.settings().cell_pitch() as f64;

        let owner = OwnerId::new();
        let payload = PayloadId::new();
        registry.add_payload(PayloadSummary {
            payload,
            owner,
            address: Address::new(world, -3.0 * pitch, 64.0, 7.0 * pitch),
            protection_range: 100,
        });

        let coord = grid.coordinate_of_owner(owner).await;
        assert_eq!(coord, Some(GridCoordinate::new(-3, 7)));
        // Second lookup is served from the index even with the registry drained.
        registry.payloads.lock().unwrap().clear();
        assert_eq!(grid.coordinate_of_owner(owner).await, coord);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_all_flushes_every_tracked_cell() {
        let registry = Arc::new(StubRegistry::new());
        let store = Arc::new(MemoryStore::new());
        let grid = GridManager::new(
            Arc::new(GridSettings::default()),
            Arc::clone(&store) as Arc<dyn RecordStore<GridLocationRecord>>,
            registry,
        );

        grid.occupy(
            GridCoordinate::new(1, 1),
            OwnerId::new(),
            None,
            PayloadAssignment::Single(PayloadId::new()),
        )
        .unwrap();
        grid.reserve(GridCoordinate::new(2, 2), false).unwrap();

        assert_eq!(grid.save_all().await, 2);
        assert!(store.get("1,1").is_some());
        assert!(store.get("2,2").is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_restores_cells_and_indexes() {
        let registry = Arc::new(StubRegistry::new());
        let store = Arc::new(MemoryStore::new());
        let owner = OwnerId::new();
        let payload = PayloadId::new();
        {
            let grid = GridManager::new(
                Arc::new(GridSettings::default()),
                Arc::clone(&store) as Arc<dyn RecordStore<GridLocationRecord>>,
                Arc::clone(&registry) as Arc<dyn PlotRegistry>,
            );
            grid.occupy(
                GridCoordinate::new(-2, 3),
                owner,
                Some("alex".into()),
                PayloadAssignment::Single(payload),
            )
            .unwrap();
            grid.save_all().await;
        }

        let grid = GridManager::new(
            Arc::new(GridSettings::default()),
            Arc::clone(&store) as Arc<dyn RecordStore<GridLocationRecord>>,
            registry,
        );
        assert_eq!(grid.load().await.unwrap(), 1);
        assert_eq!(grid.occupied_count(), 1);
        assert_eq!(
            grid.coordinate_of_owner(owner).await,
            Some(GridCoordinate::new(-2, 3))
        );
        assert_eq!(
            grid.coordinate_of_payload(payload),
            Some(GridCoordinate::new(-2, 3))
        );
    }
}
