//! The economy capability.
//!
//! The pipelines charge for player-initiated relocations when an economy
//! backend is present. The backend is probed once at construction; if it is
//! absent, or any call later fails, the integration disables itself for the
//! rest of the process and every check passes as free.

use crate::error::EconomyError;
use async_trait::async_trait;
use plot_grid::OwnerId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Narrow contract onto an economy backend.
#[async_trait]
pub trait EconomyService: Send + Sync {
    /// Whether the owner's balance covers `amount`.
    async fn balance_covers(&self, owner: OwnerId, amount: f64) -> Result<bool, EconomyError>;

    /// Withdraws `amount` from the owner's balance.
    async fn withdraw(&self, owner: OwnerId, amount: f64) -> Result<(), EconomyError>;
}

/// Permission lookups for cost/cooldown bypasses.
pub trait PermissionChecker: Send + Sync {
    fn has(&self, owner: OwnerId, node: &str) -> bool;
}

/// Permission checker that grants nothing.
pub struct NoPermissions;

impl PermissionChecker for NoPermissions {
    fn has(&self, _owner: OwnerId, _node: &str) -> bool {
        false
    }
}

/// Probe-once wrapper around an optional [`EconomyService`].
pub struct Economy {
    backend: Option<Arc<dyn EconomyService>>,
    disabled: AtomicBool,
}

impl Economy {
    pub fn new(backend: Option<Arc<dyn EconomyService>>) -> Self {
        match &backend {
            Some(_) => info!("💰 Economy backend attached"),
            None => warn!("💰 No economy backend; relocation costs are disabled"),
        }
        Self {
            backend,
            disabled: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.backend.is_some() && !self.disabled.load(Ordering::Relaxed)
    }

    /// Whether the owner can cover `amount`. Free when the integration is
    /// inactive or the amount is non-positive. A backend failure disables
    /// the integration and the check passes.
    pub async fn can_afford(&self, owner: OwnerId, amount: f64) -> bool {
        if amount <= 0.0 || !self.is_active() {
            return true;
        }
        let Some(backend) = &self.backend else {
            return true;
        };
        match backend.balance_covers(owner, amount).await {
            Ok(covers) => covers,
            Err(e) => {
                self.disable(&e);
                true
            }
        }
    }

    /// Charges the owner. Returns whether a real withdrawal happened.
    pub async fn charge(&self, owner: OwnerId, amount: f64) -> bool {
        if amount <= 0.0 || !self.is_active() {
            return false;
        }
        let Some(backend) = &self.backend else {
            return false;
        };
        match backend.withdraw(owner, amount).await {
            Ok(()) => {
                info!("💸 Charged {} from {}", amount, owner);
                true
            }
            Err(e) => {
                self.disable(&e);
                false
            }
        }
    }

    fn disable(&self, cause: &EconomyError) {
        if !self.disabled.swap(true, Ordering::Relaxed) {
            warn!(
                "💰 Economy backend failed ({}); disabling the integration for this process",
                cause
            );
        }
    }
}
