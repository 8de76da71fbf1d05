//! The staged plot relocation pipeline.
//!
//! A relocation moves an occupied plot from its current cell to a free one:
//! capture the origin region, clear it, paste it at the target, then repair
//! everything that referenced the old address (registry address, cached
//! lookups, homes, spawn points, grid indexes, per-owner records).
//!
//! The pipeline is an explicit state machine: every stage is a method that
//! returns the next [`Stage`] or fails with a [`RelocationError`], and a
//! small driver loop walks the stages in order. Stage data moves with the
//! stage, so a later stage cannot run without what the earlier ones
//! produced.
//!
//! Two known races are accepted and documented rather than guarded:
//! relocations are single-flight per owner, but two owners targeting the
//! same free cell can both pass the precheck (the grid's occupy overwrites,
//! last writer wins), and a paste failure after the origin was cleared has
//! no compensating transaction (the origin is gone; recovery is an operator
//! action).

use crate::context::SyncContext;
use crate::dimensions::DimensionManager;
use crate::economy::{Economy, PermissionChecker};
use crate::error::RelocationError;
use crate::ledger::{format_cooldown, OwnerLedger};
use crate::services::{
    CapturedEntity, EntityCaptureService, PresenceService, RegionSnapshotService, Snapshot,
};
use async_trait::async_trait;
use dashmap::DashMap;
use plot_grid::{
    Address, GridCoordinate, GridManager, OwnerId, PayloadAssignment, PayloadId, PayloadSummary,
    PlotRegistry, SlotStatus, WorldRef, PRIMARY_DIMENSION,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Permission node that waives the relocation cost.
pub const BYPASS_COST_NODE: &str = "plotgrid.bypass.cost";
/// Permission node that waives the relocation cooldown.
pub const BYPASS_COOLDOWN_NODE: &str = "plotgrid.bypass.cooldown";

/// How long the admin pipeline waits for the entity clear before giving up.
const ADMIN_CLEAR_TIMEOUT: Duration = Duration::from_secs(30);

/// One relocation order.
#[derive(Debug, Clone)]
pub struct RelocationRequest {
    pub owner: OwnerId,
    pub owner_name: String,
    /// Who asked for it: the owner themselves, or an admin.
    pub initiator: OwnerId,
    pub admin: bool,
    pub to: GridCoordinate,
}

/// Observer/veto hook around relocations.
#[async_trait]
pub trait RelocationHook: Send + Sync {
    /// Runs before any world mutation. Returning `false` cancels the
    /// relocation.
    async fn before(&self, request: &RelocationRequest) -> bool {
        let _ = request;
        true
    }

    /// Runs after a completed relocation.
    async fn after(&self, request: &RelocationRequest) {
        let _ = request;
    }
}

/// External collaborators the pipelines depend on.
pub struct PipelineServices {
    pub registry: Arc<dyn PlotRegistry>,
    pub snapshots: Arc<dyn RegionSnapshotService>,
    pub entities: Arc<dyn EntityCaptureService>,
    pub presence: Arc<dyn PresenceService>,
    pub economy: Arc<Economy>,
    pub permissions: Arc<dyn PermissionChecker>,
}

/// Everything the precheck established.
struct Prepared {
    request: RelocationRequest,
    payload: PayloadSummary,
    from_coord: GridCoordinate,
    from_address: Address,
    to_address: Address,
    primary: WorldRef,
    /// The world the owner stood in when the relocation started.
    origin_world: Option<WorldRef>,
    radius: i32,
    /// The origin cell's dimension payloads, re-applied at the target.
    origin_payloads: HashMap<String, PayloadId>,
}

/// Prepared plus everything captured from the origin.
struct Captured {
    base: Prepared,
    snapshot: Box<dyn Snapshot>,
    entities: Vec<Box<dyn CapturedEntity>>,
    homes: HashMap<String, Address>,
    spawn_points: HashMap<String, Address>,
}

/// Captured after the paste consumed the snapshot.
struct Transferred {
    base: Prepared,
    entities: Vec<Box<dyn CapturedEntity>>,
    homes: HashMap<String, Address>,
    spawn_points: HashMap<String, Address>,
}

enum Stage {
    SafetyTeleport(Prepared),
    Capture(Prepared),
    Clear(Captured),
    Transfer(Captured),
    Restore(Transferred),
    Finalize(Transferred),
    Teleport(Transferred),
    Done,
}

pub struct RelocationManager {
    grid: Arc<GridManager>,
    dimensions: Arc<DimensionManager>,
    ledger: Arc<OwnerLedger>,
    services: PipelineServices,
    sync: SyncContext,
    hooks: RwLock<Vec<Arc<dyn RelocationHook>>>,
    in_flight: DashMap<OwnerId, ()>,
}

impl RelocationManager {
    pub fn new(
        grid: Arc<GridManager>,
        dimensions: Arc<DimensionManager>,
        ledger: Arc<OwnerLedger>,
        services: PipelineServices,
        sync: SyncContext,
    ) -> Self {
        Self {
            grid,
            dimensions,
            ledger,
            services,
            sync,
            hooks: RwLock::new(Vec::new()),
            in_flight: DashMap::new(),
        }
    }

    pub fn add_hook(&self, hook: Arc<dyn RelocationHook>) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push(hook);
        }
    }

    pub fn is_relocating(&self, owner: OwnerId) -> bool {
        self.in_flight.contains_key(&owner)
    }

    /// Relocates the initiator's own plot to `to`.
    pub async fn relocate(
        &self,
        owner: OwnerId,
        owner_name: &str,
        to: GridCoordinate,
    ) -> Result<(), RelocationError> {
        self.execute(RelocationRequest {
            owner,
            owner_name: owner_name.to_string(),
            initiator: owner,
            admin: false,
            to,
        })
        .await
    }

    /// Admin-initiated relocation of someone else's plot. The owner may be
    /// offline; cost and cooldown do not apply; feedback goes to the admin.
    pub async fn relocate_admin(
        &self,
        admin: OwnerId,
        owner: OwnerId,
        owner_name: &str,
        to: GridCoordinate,
    ) -> Result<(), RelocationError> {
        self.execute(RelocationRequest {
            owner,
            owner_name: owner_name.to_string(),
            initiator: admin,
            admin: true,
            to,
        })
        .await
    }

    async fn execute(&self, request: RelocationRequest) -> Result<(), RelocationError> {
        if self.in_flight.insert(request.owner, ()).is_some() {
            return Err(RelocationError::InProgress(request.owner));
        }
        let owner = request.owner;
        let initiator = request.initiator;
        let result = self.run_pipeline(request).await;
        self.in_flight.remove(&owner);
        if let Err(e) = &result {
            warn!("🚚 Relocation for {} failed: {}", owner, e);
            self.services
                .presence
                .notify(initiator, &format!("Relocation failed: {e}"));
        }
        result
    }

    async fn run_pipeline(&self, request: RelocationRequest) -> Result<(), RelocationError> {
        let prepared = self.precheck(request).await?;
        let mut stage = Stage::SafetyTeleport(prepared);
        loop {
            stage = match stage {
                Stage::SafetyTeleport(s) => self.safety_teleport(s).await?,
                Stage::Capture(s) => self.capture(s).await?,
                Stage::Clear(s) => self.clear(s).await?,
                Stage::Transfer(s) => self.transfer(s).await?,
                Stage::Restore(s) => self.restore(s).await?,
                Stage::Finalize(s) => self.finalize(s).await?,
                Stage::Teleport(s) => self.teleport_and_notify(s).await?,
                Stage::Done => return Ok(()),
            };
        }
    }

    /// Validates the order and gathers everything later stages need. No
    /// world mutation happens here.
    ///
    /// Note the accepted race: the target availability check here and the
    /// occupy in finalize are not one transaction, so two owners can pass
    /// for the same free cell and the later finalize overwrites.
    async fn precheck(&self, request: RelocationRequest) -> Result<Prepared, RelocationError> {
        let settings = self.grid.settings();
        if !self.grid.in_bounds(request.to) {
            return Err(RelocationError::OutOfBounds(request.to));
        }
        // Reserved cells stay valid targets: an admin or a paying claimant
        // may relocate onto one. Only locked and occupied cells are refused.
        if matches!(
            self.grid.status(request.to),
            SlotStatus::Locked | SlotStatus::Occupied
        ) {
            return Err(RelocationError::TargetUnavailable(request.to));
        }
        let from_coord = self
            .grid
            .coordinate_of_owner(request.owner)
            .await
            .ok_or(RelocationError::UnknownOwner(request.owner))?;
        let primary = self
            .services
            .registry
            .native_worlds()
            .primary
            .ok_or(RelocationError::NoPrimaryWorld)?;
        let payload = self
            .services
            .registry
            .payload_of(&primary, request.owner)
            .await
            .ok_or(RelocationError::UnknownOwner(request.owner))?;

        if !request.admin
            && !self
                .services
                .permissions
                .has(request.owner, BYPASS_COOLDOWN_NODE)
        {
            let cooldown = Duration::from_secs(settings.relocation_cooldown_hours * 3600);
            if let Some(remaining) = self.ledger.remaining_cooldown(request.owner, cooldown) {
                return Err(RelocationError::CooldownActive(format_cooldown(remaining)));
            }
        }

        let charge_cost = !request.admin
            && settings.relocation_cost > 0.0
            && !self.services.permissions.has(request.owner, BYPASS_COST_NODE);
        if charge_cost
            && !self
                .services
                .economy
                .can_afford(request.owner, settings.relocation_cost)
                .await
        {
            return Err(RelocationError::InsufficientFunds(settings.relocation_cost));
        }

        let hooks: Vec<_> = self
            .hooks
            .read()
            .map(|h| h.clone())
            .unwrap_or_default();
        for hook in &hooks {
            if !hook.before(&request).await {
                return Err(RelocationError::Cancelled);
            }
        }

        if charge_cost {
            self.services
                .economy
                .charge(request.owner, settings.relocation_cost)
                .await;
        }

        let radius = if payload.protection_range > 0 {
            payload.protection_range
        } else {
            settings.relocation_radius
        };
        // Recorded before the safety teleport moves the owner anywhere.
        let origin_world = self.services.presence.world_of(request.owner);
        let from_address = payload.address.clone();
        let to_address = self
            .grid
            .center_address(request.to, primary.clone(), payload.address.y);

        let origin_payloads = self
            .grid
            .location(from_coord)
            .map(|loc| loc.dimension_payloads().clone())
            .filter(|map| !map.is_empty())
            .unwrap_or_else(|| HashMap::from([(PRIMARY_DIMENSION.to_string(), payload.payload)]));

        self.services.registry.load_region(&to_address).await;
        self.services.presence.notify(
            request.initiator,
            &format!("Relocating plot from {from_coord} to {}...", request.to),
        );
        info!(
            "🚚 Relocation start: owner={} {} -> {} (radius {})",
            request.owner, from_coord, request.to, radius
        );

        Ok(Prepared {
            request,
            payload,
            from_coord,
            from_address,
            to_address,
            primary,
            origin_world,
            radius,
            origin_payloads,
        })
    }

    /// Moves the owner out of harm's way before blocks start disappearing,
    /// to the spawn of whichever world they currently stand in. Offline
    /// owners (admin pipeline) are left alone.
    async fn safety_teleport(&self, state: Prepared) -> Result<Stage, RelocationError> {
        let presence = &self.services.presence;
        if presence.is_online(state.request.owner) {
            let world = state
                .origin_world
                .clone()
                .unwrap_or_else(|| state.from_address.world.clone());
            let refuge = presence.world_spawn(&world);
            if !presence.teleport(state.request.owner, refuge).await {
                warn!(
                    "⚠️ Could not safety-teleport {} before relocation",
                    state.request.owner
                );
            }
        }
        Ok(Stage::Capture(state))
    }

    /// Captures everything movable from the origin: anchors, entities, and
    /// the block region itself. Anchors in worlds the grid does not span are
    /// dropped.
    async fn capture(&self, state: Prepared) -> Result<Stage, RelocationError> {
        let registry = &self.services.registry;
        let mut homes = registry.homes_of(state.payload.payload).await;
        homes.retain(|name, address| {
            let spanned = self.spans_world(&address.world);
            if !spanned {
                debug!(
                    "Dropping home '{}' in unspanned world {}",
                    name, address.world.name
                );
            }
            spanned
        });
        let mut spawn_points = registry.spawn_points_of(state.payload.payload).await;
        spawn_points.retain(|_, address| self.spans_world(&address.world));

        let entities = {
            let service = Arc::clone(&self.services.entities);
            let world = state.from_address.world.clone();
            let center = state.from_address.clone();
            let radius = state.radius;
            self.sync
                .run(move || service.capture(&world, &center, radius))
                .await?
        };

        let snapshot = self
            .services
            .snapshots
            .capture(&state.primary, &state.from_address, state.radius, true)
            .await
            .ok_or(RelocationError::CaptureFailed(state.from_coord))?;

        info!(
            "📸 Captured plot at {}: {} entities, {} homes, {} spawn points",
            state.from_coord,
            entities.len(),
            homes.len(),
            spawn_points.len()
        );
        Ok(Stage::Clear(Captured {
            base: state,
            snapshot,
            entities,
            homes,
            spawn_points,
        }))
    }

    /// Empties the origin: entities on the sync context, then blocks. The
    /// admin pipeline bounds its wait on the entity clear. A failed block
    /// clear after a successful capture is fatal; the snapshot stays unpasted
    /// and recovery is an operator action.
    async fn clear(&self, state: Captured) -> Result<Stage, RelocationError> {
        let removed = {
            let service = Arc::clone(&self.services.entities);
            let world = state.base.from_address.world.clone();
            let center = state.base.from_address.clone();
            let radius = state.base.radius;
            let job = move || service.remove(&world, &center, radius);
            if state.base.request.admin {
                self.sync.run_timeout(ADMIN_CLEAR_TIMEOUT, job).await?
            } else {
                self.sync.run(job).await?
            }
        };
        debug!("🗑️ Removed {} entities from origin", removed);

        if !self
            .services
            .snapshots
            .clear(&state.base.primary, &state.base.from_address, state.base.radius)
            .await
        {
            error!(
                "❌ Block clear at {} failed, aborting relocation for {}",
                state.base.from_coord, state.base.request.owner
            );
            return Err(RelocationError::ClearFailed(state.base.from_coord));
        }
        Ok(Stage::Transfer(state))
    }

    /// Pastes the captured region at the target. There is no undo from here:
    /// the origin is already cleared, so a paste failure leaves only the
    /// error trail.
    async fn transfer(&self, state: Captured) -> Result<Stage, RelocationError> {
        let Captured {
            base,
            snapshot,
            entities,
            homes,
            spawn_points,
        } = state;
        if !self
            .services
            .snapshots
            .paste(snapshot, &base.primary, &base.to_address)
            .await
        {
            error!(
                "❌ Paste failed for {}: origin {} was already cleared, target {} is incomplete",
                base.request.owner, base.from_coord, base.request.to
            );
            return Err(RelocationError::Transfer {
                from: base.from_coord,
                to: base.request.to,
            });
        }
        self.services.presence.notify(
            base.request.initiator,
            &format!("Plot pasted at {}", base.request.to),
        );
        Ok(Stage::Restore(Transferred {
            base,
            entities,
            homes,
            spawn_points,
        }))
    }

    /// Restores entities at the target, then walks the sub-dimension worlds
    /// (native nether/end, then custom dimensions) and moves each of their
    /// regions the same way. Sub-dimension failures are logged, never fatal.
    async fn restore(&self, mut state: Transferred) -> Result<Stage, RelocationError> {
        let entities = std::mem::take(&mut state.entities);
        if !entities.is_empty() {
            let service = Arc::clone(&self.services.entities);
            let world = state.base.to_address.world.clone();
            let from = state.base.from_address.clone();
            let to = state.base.to_address.clone();
            let restored = self
                .sync
                .run(move || service.restore(entities, &world, &from, &to))
                .await?;
            debug!("🐾 Restored {} entities at target", restored);
        }

        let mut chain_worlds: Vec<WorldRef> = Vec::new();
        let native = self.services.registry.native_worlds();
        chain_worlds.extend(native.secondary.iter().cloned());
        chain_worlds.extend(native.tertiary.iter().cloned());
        if self.grid.settings().multi_dimension {
            for key in self.dimensions.enabled() {
                if let Some(world) = self.dimensions.world_of(key) {
                    chain_worlds.push(world.clone());
                }
            }
        }
        for world in chain_worlds {
            self.relocate_sub_world(&state.base, &world).await;
        }
        Ok(Stage::Finalize(state))
    }

    /// Moves one sub-world's region between the same coordinates, entities
    /// included. Best effort: failures are logged and the chain moves on.
    async fn relocate_sub_world(&self, base: &Prepared, world: &WorldRef) {
        let from = base.from_address.in_world(world.clone());
        let to = base.to_address.in_world(world.clone());
        let Some(snapshot) = self
            .services
            .snapshots
            .capture(world, &from, base.radius, true)
            .await
        else {
            warn!(
                "⚠️ Sub-world '{}' capture failed at {}, skipping",
                world.name, base.from_coord
            );
            return;
        };

        let entities = {
            let service = Arc::clone(&self.services.entities);
            let in_world = world.clone();
            let center = from.clone();
            let radius = base.radius;
            match self
                .sync
                .run(move || service.capture(&in_world, &center, radius))
                .await
            {
                Ok(captured) => captured,
                Err(e) => {
                    warn!(
                        "⚠️ Sub-world '{}' entity capture failed: {}",
                        world.name, e
                    );
                    Vec::new()
                }
            }
        };
        {
            let service = Arc::clone(&self.services.entities);
            let in_world = world.clone();
            let center = from.clone();
            let radius = base.radius;
            if let Err(e) = self
                .sync
                .run(move || service.remove(&in_world, &center, radius))
                .await
            {
                warn!("⚠️ Sub-world '{}' entity clear failed: {}", world.name, e);
            }
        }

        if !self.services.snapshots.clear(world, &from, base.radius).await {
            warn!("⚠️ Sub-world '{}' clear did not finish cleanly", world.name);
        }
        if !self.services.snapshots.paste(snapshot, world, &to).await {
            error!(
                "❌ Sub-world '{}' paste failed between {} and {}",
                world.name, base.from_coord, base.request.to
            );
            return;
        }
        if !entities.is_empty() {
            let service = Arc::clone(&self.services.entities);
            let in_world = world.clone();
            let from = from.clone();
            let to = to.clone();
            match self
                .sync
                .run(move || service.restore(entities, &in_world, &from, &to))
                .await
            {
                Ok(restored) => debug!(
                    "🌍 Sub-world '{}' region moved, {} entities restored",
                    world.name, restored
                ),
                Err(e) => warn!(
                    "⚠️ Sub-world '{}' entity restore failed: {}",
                    world.name, e
                ),
            }
        } else {
            debug!("🌍 Sub-world '{}' region moved", world.name);
        }
    }

    /// Repairs every reference to the old address. The cache ordering is
    /// load-bearing: the payload must be evicted before its address changes
    /// and re-inserted before anchors are written back, or the registry
    /// cache resolves anchors against the wrong cell.
    async fn finalize(&self, state: Transferred) -> Result<Stage, RelocationError> {
        let base = &state.base;
        let registry = &self.services.registry;
        let payload = base.payload.payload;

        registry.evict_cached(payload).await;
        if !registry
            .set_payload_address(payload, base.to_address.clone())
            .await
        {
            warn!("⚠️ Registry refused the address update for {}", payload);
        }
        registry.insert_cached(payload).await;

        let dx = base.to_address.x - base.from_address.x;
        let dz = base.to_address.z - base.from_address.z;
        for (name, address) in &state.homes {
            registry
                .set_home(payload, name, address.translated(dx, dz))
                .await;
        }
        for (kind, address) in &state.spawn_points {
            registry
                .set_spawn_point(payload, kind, address.translated(dx, dz))
                .await;
        }
        registry.persist_payload(payload).await;

        self.grid.clear(base.from_coord);
        self.grid.occupy(
            base.request.to,
            base.request.owner,
            Some(base.request.owner_name.clone()),
            PayloadAssignment::PerDimension(base.origin_payloads.clone()),
        )?;

        self.ledger.set_coordinate(
            base.request.owner,
            Some(&base.request.owner_name),
            base.request.to,
        );
        if !base.request.admin {
            self.ledger.record_relocation(base.request.owner);
        }
        info!(
            "📍 Relocation finalized: {} now at {}",
            base.request.owner, base.request.to
        );
        Ok(Stage::Teleport(state))
    }

    /// Displaces stragglers from the (now empty) origin, brings the owner and
    /// their team to the moved plot, and runs the post hooks.
    async fn teleport_and_notify(&self, state: Transferred) -> Result<Stage, RelocationError> {
        let base = &state.base;
        let presence = &self.services.presence;
        let members = self
            .services
            .registry
            .members_of(base.payload.payload)
            .await;

        let refuge = presence.world_spawn(&base.primary);
        let bystanders: Vec<OwnerId> = presence
            .occupants_near(&base.from_address, base.radius)
            .into_iter()
            .filter(|b| *b != base.request.owner && !members.contains(b))
            .collect();
        for bystander in &bystanders {
            presence.notify(*bystander, "The plot you were visiting has moved.");
        }
        futures::future::join_all(
            bystanders
                .into_iter()
                .map(|b| presence.teleport(b, refuge.clone())),
        )
        .await;

        let destination = self.owner_destination(&state);
        if presence.is_online(base.request.owner) {
            presence
                .teleport(base.request.owner, destination.clone())
                .await;
        }
        for member in members {
            if member != base.request.owner && presence.is_online(member) {
                presence.teleport(member, destination.clone()).await;
            }
        }

        let hooks: Vec<_> = self
            .hooks
            .read()
            .map(|h| h.clone())
            .unwrap_or_default();
        for hook in &hooks {
            hook.after(&base.request).await;
        }

        let done = format!("✅ Plot relocated to {}", base.request.to);
        presence.notify(base.request.initiator, &done);
        if base.request.admin && presence.is_online(base.request.owner) {
            presence
                .notify(base.request.owner, "An admin relocated your plot.");
        }
        Ok(Stage::Done)
    }

    /// Where the owner lands after the move. An owner who started in a
    /// registered custom dimension is returned to an anchor in that world
    /// when multi-dimension mode is on; otherwise the relocated default home
    /// in the primary world, falling back to the target cell center.
    fn owner_destination(&self, state: &Transferred) -> Address {
        let base = &state.base;
        let dx = base.to_address.x - base.from_address.x;
        let dz = base.to_address.z - base.from_address.z;

        if self.grid.settings().multi_dimension {
            if let Some(origin) = &base.origin_world {
                if !self.dimensions.is_native_world(origin)
                    && self.dimensions.dimension_key_of(origin).is_some()
                {
                    if let Some(home) = state
                        .homes
                        .iter()
                        .find(|(_, home)| home.world == *origin)
                        .map(|(_, home)| home)
                    {
                        return home.translated(dx, dz);
                    }
                    return base.to_address.in_world(origin.clone());
                }
            }
        }

        state
            .homes
            .get("default")
            .filter(|home| home.world == base.primary)
            .map(|home| home.translated(dx, dz))
            .unwrap_or_else(|| base.to_address.clone())
    }

    fn spans_world(&self, world: &WorldRef) -> bool {
        self.dimensions.is_native_world(world)
            || self.dimensions.dimension_key_of(world).is_some()
    }
}
