//! Signed grid coordinates and their mapping onto world block coordinates.

use crate::error::CoordinateParseError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A cell address on the plot grid.
///
/// Both components are signed; the grid extends in all four directions from
/// the origin cell `0,0`. The canonical text form is `"x,z"` (e.g. `"-5,3"`),
/// which is also the persistence key for the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoordinate {
    pub x: i32,
    pub z: i32,
}

impl GridCoordinate {
    pub const ORIGIN: GridCoordinate = GridCoordinate { x: 0, z: 0 };

    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Parses the canonical `"x,z"` form. Whitespace around either component
    /// is tolerated; anything else is rejected.
    pub fn parse(s: &str) -> Result<Self, CoordinateParseError> {
        let trimmed = s.trim();
        let (xs, zs) = trimmed
            .split_once(',')
            .ok_or_else(|| CoordinateParseError::new(s))?;
        let x = xs
            .trim()
            .parse::<i32>()
            .map_err(|_| CoordinateParseError::new(s))?;
        let z = zs
            .trim()
            .parse::<i32>()
            .map_err(|_| CoordinateParseError::new(s))?;
        Ok(Self { x, z })
    }

    /// Returns the cell offset from this one by the given deltas.
    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// The world block coordinates of this cell's center, given the cell
    /// pitch (block distance between adjacent cell centers).
    pub fn to_world(&self, pitch: i32) -> (i32, i32) {
        if pitch <= 0 {
            warn!(
                "⚠️ Non-positive cell pitch {} for {}, falling back to world origin",
                pitch, self
            );
            return (0, 0);
        }
        (self.x * pitch, self.z * pitch)
    }

    /// The cell containing the given world block coordinates.
    ///
    /// Uses floor division so that negative world coordinates land in the
    /// negative cells rather than all collapsing toward the origin.
    pub fn from_world(world_x: i32, world_z: i32, pitch: i32) -> Self {
        if pitch <= 0 {
            warn!(
                "⚠️ Non-positive cell pitch {} for world ({}, {}), falling back to grid origin",
                pitch, world_x, world_z
            );
            return Self::ORIGIN;
        }
        Self {
            x: world_x.div_euclid(pitch),
            z: world_z.div_euclid(pitch),
        }
    }
}

impl std::fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

impl std::str::FromStr for GridCoordinate {
    type Err = CoordinateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
