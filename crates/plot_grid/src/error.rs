//! Error types for the grid core.

use crate::coordinate::GridCoordinate;
use thiserror::Error;

/// A coordinate string that does not match the canonical `"x,z"` form.
#[derive(Debug, Clone, Error)]
#[error("invalid grid coordinate '{input}': expected \"x,z\"")]
pub struct CoordinateParseError {
    pub input: String,
}

impl CoordinateParseError {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Errors raised by the grid core.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("coordinate parse failed: {0}")]
    Parse(#[from] CoordinateParseError),

    #[error("coordinate {0} is outside the configured grid bounds")]
    OutOfBounds(GridCoordinate),

    #[error("persistence failure: {0}")]
    Store(#[from] crate::persist::StoreError),

    #[error("invalid grid configuration: {0}")]
    Config(String),
}
