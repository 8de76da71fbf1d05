//! Core identifier and address types shared across the workspace.
//!
//! Wrapper types keep the different UUID-keyed identities from being mixed up
//! (an owner is not a payload is not a world), and [`Address`] pins a point to
//! a concrete world handle.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dimension key of the primary (legacy) dimension. Cells that predate
/// multi-dimension support store their payload under this key.
pub const PRIMARY_DIMENSION: &str = "overworld";

/// Unique identifier for a plot owner.
///
/// Wrapper around UUID so owner IDs cannot be confused with payload or world
/// IDs elsewhere in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    /// Creates a new random owner ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an owner ID from its string representation.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for OwnerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a payload (the island/claim object a cell hosts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadId(pub Uuid);

impl PayloadId {
    /// Creates a new random payload ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a payload ID from its string representation.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for PayloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a loaded world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(pub Uuid);

impl WorldId {
    /// Creates a new random world ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a loaded world: stable identity plus its registered name.
///
/// Equality is by identity only; two handles with the same name but different
/// IDs are different worlds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldRef {
    pub id: WorldId,
    pub name: String,
}

impl WorldRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorldId::new(),
            name: name.into(),
        }
    }
}

impl PartialEq for WorldRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorldRef {}

impl std::fmt::Display for WorldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A point in a concrete world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub world: WorldRef,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Address {
    pub fn new(world: WorldRef, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// Returns this address translated by the given block offsets, staying in
    /// the same world.
    pub fn translated(&self, dx: f64, dz: f64) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x + dx,
            y: self.y,
            z: self.z + dz,
        }
    }

    /// Same point re-anchored in a different world.
    pub fn in_world(&self, world: WorldRef) -> Self {
        Self {
            world,
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{:.1},{:.1},{:.1}",
            self.world.name, self.x, self.y, self.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_equality_is_by_identity_not_name() {
        let a = WorldRef::new("plots");
        let b = WorldRef::new("plots");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn address_translation_keeps_world_and_height() {
        let world = WorldRef::new("plots");
        let addr = Address::new(world.clone(), 100.0, 64.0, -200.0);
        let moved = addr.translated(50.0, -50.0);
        assert_eq!(moved.world, world);
        assert_eq!(moved.x, 150.0);
        assert_eq!(moved.y, 64.0);
        assert_eq!(moved.z, -250.0);
    }
}
