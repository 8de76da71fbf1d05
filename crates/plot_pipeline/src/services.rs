//! Contracts onto the world-mutation services.
//!
//! Block and entity mechanics live outside this crate; the pipelines only
//! need capture/clear/paste over opaque handles. Snapshots and captured
//! entities are trait objects the producing service can downcast back.

use async_trait::async_trait;
use plot_grid::{Address, OwnerId, WorldRef};
use std::any::Any;

/// Opaque captured region. Only the service that produced it can interpret
/// it.
pub trait Snapshot: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Opaque captured entity.
pub trait CapturedEntity: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Captures, clears and pastes cuboid regions around cell centers.
#[async_trait]
pub trait RegionSnapshotService: Send + Sync {
    /// Captures the region around `center`. `None` means the capture failed.
    async fn capture(
        &self,
        world: &WorldRef,
        center: &Address,
        radius: i32,
        include_biomes: bool,
    ) -> Option<Box<dyn Snapshot>>;

    /// Clears the region around `center`. Returns whether the clear ran to
    /// completion.
    async fn clear(&self, world: &WorldRef, center: &Address, radius: i32) -> bool;

    /// Pastes a previously captured snapshot at `center`, consuming it.
    async fn paste(&self, snapshot: Box<dyn Snapshot>, world: &WorldRef, center: &Address) -> bool;
}

/// Captures, removes and restores entities around cell centers. These run on
/// the sync context, so the methods are synchronous.
pub trait EntityCaptureService: Send + Sync {
    fn capture(&self, world: &WorldRef, center: &Address, radius: i32)
        -> Vec<Box<dyn CapturedEntity>>;

    /// Removes entities around `center`, returning how many were removed.
    fn remove(&self, world: &WorldRef, center: &Address, radius: i32) -> usize;

    /// Restores captured entities, translated from `from` to `to`. Returns
    /// how many were restored.
    fn restore(
        &self,
        entities: Vec<Box<dyn CapturedEntity>>,
        world: &WorldRef,
        from: &Address,
        to: &Address,
    ) -> usize;
}

/// Presence and movement of owners and bystanders.
#[async_trait]
pub trait PresenceService: Send + Sync {
    fn is_online(&self, owner: OwnerId) -> bool;

    /// The world the owner currently stands in, when online.
    fn world_of(&self, owner: OwnerId) -> Option<WorldRef>;

    /// Safe-teleports someone. Returns whether the teleport happened.
    async fn teleport(&self, owner: OwnerId, to: Address) -> bool;

    /// Sends a user-facing message, dropped silently for offline targets.
    fn notify(&self, owner: OwnerId, message: &str);

    /// Everyone within `radius` blocks of `center`.
    fn occupants_near(&self, center: &Address, radius: i32) -> Vec<OwnerId>;

    /// The spawn address of a world, used to displace bystanders.
    fn world_spawn(&self, world: &WorldRef) -> Address;
}
