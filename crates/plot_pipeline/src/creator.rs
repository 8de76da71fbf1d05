//! Multi-dimension plot creation.
//!
//! When a claim spans custom dimensions, the per-dimension payloads are
//! created one at a time by an external driver; this module tracks the
//! in-flight context per owner and commits the grid cell once, with the full
//! dimension map, when the last payload lands. The dimension currently being
//! created is tracked explicitly, never inferred from whichever signal
//! arrives.

use crate::dimensions::DimensionManager;
use crate::error::CreationError;
use crate::ledger::OwnerLedger;
use crate::services::PresenceService;
use dashmap::DashMap;
use plot_grid::{
    GridCoordinate, GridManager, OwnerId, PayloadAssignment, PayloadId, PRIMARY_DIMENSION,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Invoked once with the full dimension map when a creation finishes.
pub type CreationCallback = Box<dyn FnOnce(HashMap<String, PayloadId>) + Send>;

struct CreationContext {
    owner_name: String,
    coordinate: GridCoordinate,
    /// Custom dimension keys still waiting for their payload, in order.
    queue: VecDeque<String>,
    /// The dimension whose payload creation is currently in flight.
    current: Option<String>,
    collected: HashMap<String, PayloadId>,
    callback: Option<CreationCallback>,
}

pub struct MultiDimensionIslandCreator {
    grid: Arc<GridManager>,
    dimensions: Arc<DimensionManager>,
    presence: Arc<dyn PresenceService>,
    ledger: Arc<OwnerLedger>,
    pending: DashMap<OwnerId, CreationContext>,
}

impl MultiDimensionIslandCreator {
    pub fn new(
        grid: Arc<GridManager>,
        dimensions: Arc<DimensionManager>,
        presence: Arc<dyn PresenceService>,
        ledger: Arc<OwnerLedger>,
    ) -> Self {
        Self {
            grid,
            dimensions,
            presence,
            ledger,
            pending: DashMap::new(),
        }
    }

    /// Whether any enabled custom dimension takes part in creation.
    pub fn has_custom_dimensions(&self) -> bool {
        !self.dimensions.dimensions_for_creation().is_empty()
    }

    pub fn has_pending(&self, owner: OwnerId) -> bool {
        self.pending.contains_key(&owner)
    }

    /// The dimension the external driver should create next, if a creation
    /// is in flight for this owner.
    pub fn current_dimension(&self, owner: OwnerId) -> Option<String> {
        self.pending.get(&owner)?.current.clone()
    }

    /// Begins a multi-dimension creation: the primary payload already
    /// exists, and every `create_on_claim` custom dimension is queued.
    /// Native-bundled dimensions never enter the queue. With nothing to
    /// queue, the claim commits immediately.
    pub fn start(
        &self,
        owner: OwnerId,
        owner_name: &str,
        coordinate: GridCoordinate,
        primary_payload: PayloadId,
        callback: CreationCallback,
    ) -> Result<(), CreationError> {
        if self.pending.contains_key(&owner) {
            return Err(CreationError::AlreadyPending(owner));
        }

        let mut queue: VecDeque<String> = VecDeque::new();
        for key in self.dimensions.dimensions_for_creation() {
            match self.dimensions.world_of(&key) {
                Some(world) if self.dimensions.is_native_world(world) => {
                    debug!("Dimension '{}' is native-bundled, not queued", key);
                }
                Some(_) => queue.push_back(key),
                None => {
                    warn!("⚠️ Dimension '{}' has no world, not queued", key);
                }
            }
        }

        let mut context = CreationContext {
            owner_name: owner_name.to_string(),
            coordinate,
            queue,
            current: None,
            collected: HashMap::from([(PRIMARY_DIMENSION.to_string(), primary_payload)]),
            callback: Some(callback),
        };

        if !self.advance(owner, &mut context) {
            // Nothing custom to create; commit the claim right away.
            self.finish(owner, context)?;
            return Ok(());
        }
        info!(
            "🏗️ Multi-dimension creation started for {} at {}: {} dimensions queued",
            owner,
            coordinate,
            context.queue.len() + 1
        );
        self.pending.insert(owner, context);
        Ok(())
    }

    /// Records a payload the external driver finished creating. It is
    /// attributed to the tracked current dimension; when the queue empties,
    /// the claim commits.
    pub fn on_created(&self, owner: OwnerId, payload: PayloadId) -> Result<(), CreationError> {
        let Some(mut entry) = self.pending.get_mut(&owner) else {
            return Err(CreationError::NothingPending(owner));
        };
        let context = entry.value_mut();
        match context.current.take() {
            Some(dimension) => {
                debug!("Dimension '{}' payload created: {}", dimension, payload);
                context.collected.insert(dimension, payload);
            }
            None => {
                warn!(
                    "⚠️ Creation signal for {} with no dimension in flight, ignoring payload {}",
                    owner, payload
                );
            }
        }

        if !self.presence.is_online(owner) {
            // Owner left mid-flow: commit what exists instead of leaking the
            // context.
            warn!(
                "⚠️ Owner {} went offline during creation; finalizing with {} dimensions",
                owner,
                context.collected.len()
            );
            drop(entry);
            return self.take_and_finish(owner);
        }

        if self.advance(owner, context) {
            return Ok(());
        }
        drop(entry);
        self.take_and_finish(owner)
    }

    /// Drops an in-flight creation without committing anything.
    pub fn cancel(&self, owner: OwnerId) -> bool {
        let removed = self.pending.remove(&owner).is_some();
        if removed {
            info!("🛑 Multi-dimension creation cancelled for {}", owner);
        }
        removed
    }

    /// Pops queue entries until one with a loaded world becomes current.
    /// Returns whether a dimension is now in flight.
    fn advance(&self, owner: OwnerId, context: &mut CreationContext) -> bool {
        while let Some(key) = context.queue.pop_front() {
            if self.dimensions.world_of(&key).is_none() {
                warn!(
                    "⚠️ Dimension '{}' lost its world mid-creation for {}, skipping",
                    key, owner
                );
                continue;
            }
            context.current = Some(key);
            return true;
        }
        context.current = None;
        false
    }

    fn take_and_finish(&self, owner: OwnerId) -> Result<(), CreationError> {
        let Some((_, context)) = self.pending.remove(&owner) else {
            return Err(CreationError::NothingPending(owner));
        };
        self.finish(owner, context)
    }

    /// Commits the claim: one occupy with the full dimension map, the owner
    /// record, and the completion callback.
    fn finish(&self, owner: OwnerId, mut context: CreationContext) -> Result<(), CreationError> {
        self.grid.occupy(
            context.coordinate,
            owner,
            Some(context.owner_name.clone()),
            PayloadAssignment::PerDimension(context.collected.clone()),
        )?;
        self.ledger
            .set_coordinate(owner, Some(&context.owner_name), context.coordinate);
        info!(
            "🏝️ Creation finished for {} at {}: {} dimension payloads",
            owner,
            context.coordinate,
            context.collected.len()
        );
        self.presence
            .notify(owner, &format!("Plot created at {}", context.coordinate));
        if let Some(callback) = context.callback.take() {
            callback(context.collected);
        }
        Ok(())
    }
}
