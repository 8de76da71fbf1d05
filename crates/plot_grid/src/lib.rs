//! # Plot Grid Core
//!
//! The allocation core for a world-scale plot grid. Cells are addressed by a
//! signed [`GridCoordinate`], carry their occupancy state in a
//! [`GridLocation`] record, and are indexed and mutated through the
//! [`GridManager`], which keeps reverse lookups (owner, payload, per-dimension
//! payload) coherent and writes every mutation through to a pluggable
//! [`RecordStore`].
//!
//! ## Key Types
//!
//! - [`GridCoordinate`] - signed `x,z` cell address with world conversion
//! - [`GridLocation`] - per-cell state: status, owner, payloads, reservation
//! - [`GridManager`] - the shared index with write-behind persistence
//! - [`RecordStore`] - async persistence contract (memory and JSON file impls)
//! - [`PlotRegistry`] - contract onto the surrounding payload registry

pub mod coordinate;
pub mod error;
pub mod location;
pub mod manager;
pub mod persist;
pub mod registry;
pub mod settings;
pub mod types;

pub use coordinate::GridCoordinate;
pub use error::{CoordinateParseError, GridError};
pub use location::{GridLocation, SlotStatus};
pub use manager::{GridManager, PayloadAssignment};
pub use persist::{GridLocationRecord, JsonFileStore, MemoryStore, RecordStore, StoreError};
pub use registry::{NativeWorlds, PayloadSummary, PlotRegistry};
pub use settings::{DimensionSettings, GridSettings, SettingsError};
pub use types::{Address, OwnerId, PayloadId, WorldId, WorldRef, PRIMARY_DIMENSION};
