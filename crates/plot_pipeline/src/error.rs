//! Error types for the pipeline crate.

use plot_grid::GridCoordinate;
use thiserror::Error;

/// Errors from the sync execution context.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("sync context is no longer running")]
    Closed,

    #[error("sync context job did not finish within {0:?}")]
    TimedOut(std::time::Duration),
}

/// Errors from the economy backend.
#[derive(Debug, Clone, Error)]
pub enum EconomyError {
    #[error("economy backend failure: {0}")]
    Backend(String),
}

/// Failures of the relocation pipeline, one variant per stage outcome.
#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("a relocation is already in progress for owner {0}")]
    InProgress(plot_grid::OwnerId),

    #[error("owner {0} has no plot on the grid")]
    UnknownOwner(plot_grid::OwnerId),

    #[error("target cell {0} is outside the grid bounds")]
    OutOfBounds(GridCoordinate),

    #[error("target cell {0} is not available")]
    TargetUnavailable(GridCoordinate),

    #[error("relocation is on cooldown for another {0}")]
    CooldownActive(String),

    #[error("owner cannot afford the relocation cost of {0}")]
    InsufficientFunds(f64),

    #[error("relocation was cancelled by a pre-relocation hook")]
    Cancelled,

    #[error("no primary world is registered")]
    NoPrimaryWorld,

    #[error("could not capture the plot region at {0}")]
    CaptureFailed(GridCoordinate),

    #[error("clearing the origin region at {0} failed; the captured snapshot was not pasted")]
    ClearFailed(GridCoordinate),

    #[error("paste failed moving plot from {from} to {to}; origin region was already cleared")]
    Transfer {
        from: GridCoordinate,
        to: GridCoordinate,
    },

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Grid(#[from] plot_grid::GridError),
}

/// Failures of the multi-dimension creation flow.
#[derive(Debug, Error)]
pub enum CreationError {
    #[error("a creation is already pending for owner {0}")]
    AlreadyPending(plot_grid::OwnerId),

    #[error("no creation is pending for owner {0}")]
    NothingPending(plot_grid::OwnerId),

    #[error(transparent)]
    Grid(#[from] plot_grid::GridError),
}
