//! # Plot Pipeline
//!
//! Orchestration on top of the `plot_grid` core: the staged relocation
//! pipeline that moves an occupied plot between cells, and the
//! multi-dimension creation flow that collects per-dimension payloads before
//! committing one grid cell.
//!
//! External collaborators (block snapshots, entity capture, presence,
//! economy) are consumed through narrow trait contracts so the pipelines stay
//! testable without a running game server.

pub mod context;
pub mod creator;
pub mod dimensions;
pub mod economy;
pub mod error;
pub mod ledger;
pub mod relocation;
pub mod services;


pub use context::SyncContext;
pub use creator::{CreationCallback, MultiDimensionIslandCreator};
pub use dimensions::{DimensionManager, WorldCatalog};
pub use economy::{Economy, EconomyService, NoPermissions, PermissionChecker};
pub use error::{ContextError, CreationError, EconomyError, RelocationError};
pub use ledger::{format_cooldown, OwnerLedger, OwnerRecord};
pub use relocation::{
    PipelineServices, RelocationHook, RelocationManager, RelocationRequest, BYPASS_COOLDOWN_NODE,
    BYPASS_COST_NODE,
};
pub use services::{
    CapturedEntity, EntityCaptureService, PresenceService, RegionSnapshotService, Snapshot,
};
