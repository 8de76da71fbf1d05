//! Per-cell state: occupancy status, ownership, payloads, reservations.

use crate::coordinate::GridCoordinate;
use crate::types::{OwnerId, PayloadId, PRIMARY_DIMENSION};
use std::collections::HashMap;

/// Occupancy status of a grid cell.
///
/// `Locked` is derived presentation state for out-of-bounds queries; it is
/// never stored on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SlotStatus {
    Available,
    Occupied,
    Reserved,
    Locked,
}

/// The state record of a single grid cell.
///
/// A fresh cell is `Available` with no owner, no payloads, no reservation and
/// a purchase price of zero. Cells track one payload per dimension; the
/// `payload` field is the legacy single-payload slot and is kept in sync with
/// the primary dimension entry so older records keep working.
#[derive(Debug, Clone)]
pub struct GridLocation {
    coordinate: GridCoordinate,
    status: SlotStatus,
    owner: Option<OwnerId>,
    owner_name: Option<String>,
    payload: Option<PayloadId>,
    dimension_payloads: HashMap<String, PayloadId>,
    reserved: bool,
    blocked: bool,
    purchase_price: f64,
}

impl GridLocation {
    pub fn new(coordinate: GridCoordinate) -> Self {
        Self {
            coordinate,
            status: SlotStatus::Available,
            owner: None,
            owner_name: None,
            payload: None,
            dimension_payloads: HashMap::new(),
            reserved: false,
            blocked: false,
            purchase_price: 0.0,
        }
    }

    pub fn coordinate(&self) -> GridCoordinate {
        self.coordinate
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.owner_name.as_deref()
    }

    /// The legacy primary payload, if any.
    pub fn payload(&self) -> Option<PayloadId> {
        self.payload
    }

    /// Payload hosted in the given dimension. Falls back to the legacy field
    /// for the primary dimension so pre-multi-dimension records resolve.
    pub fn dimension_payload(&self, dimension: &str) -> Option<PayloadId> {
        if let Some(id) = self.dimension_payloads.get(dimension) {
            return Some(*id);
        }
        if dimension == PRIMARY_DIMENSION {
            return self.payload;
        }
        None
    }

    pub fn dimension_payloads(&self) -> &HashMap<String, PayloadId> {
        &self.dimension_payloads
    }

    pub fn has_any_payload(&self) -> bool {
        self.payload.is_some() || !self.dimension_payloads.is_empty()
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn purchase_price(&self) -> f64 {
        self.purchase_price
    }

    /// A cell can be claimed when it is available and not reserved.
    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available && !self.reserved
    }

    /// Reserved cells with a positive price are purchasable.
    pub fn is_purchasable(&self) -> bool {
        self.reserved && self.purchase_price > 0.0
    }

    /// Reserves the cell. A blocked reservation is not purchasable, so the
    /// price is wiped; the reservation never displaces an occupant.
    pub fn reserve(&mut self, blocked: bool) {
        self.reserved = true;
        self.blocked = blocked;
        if blocked {
            self.purchase_price = 0.0;
        }
        if self.status != SlotStatus::Occupied {
            self.status = SlotStatus::Reserved;
        }
    }

    /// Releases the reservation entirely: reserved, blocked and price all
    /// reset, and an unowned cell reverts to available.
    pub fn unreserve(&mut self) {
        self.reserved = false;
        self.blocked = false;
        self.purchase_price = 0.0;
        if self.status != SlotStatus::Occupied {
            self.status = SlotStatus::Available;
        }
    }

    /// Sets the purchase price. A positive price puts the cell up for sale:
    /// it becomes a purchasable (unblocked) reservation. A non-positive price
    /// only clears the price and leaves the reservation for the caller.
    pub fn set_purchase_price(&mut self, price: f64) {
        self.purchase_price = price.max(0.0);
        if self.purchase_price > 0.0 {
            self.blocked = false;
            self.reserved = true;
            if self.status != SlotStatus::Occupied {
                self.status = SlotStatus::Reserved;
            }
        }
    }

    /// Sets the legacy primary payload, mirroring it into the dimension map
    /// when the primary slot there is empty.
    pub fn set_payload(&mut self, payload: Option<PayloadId>) {
        self.payload = payload;
        if let Some(id) = payload {
            self.dimension_payloads
                .entry(PRIMARY_DIMENSION.to_string())
                .or_insert(id);
        }
    }

    /// Records the payload for one dimension. The primary dimension also
    /// updates the legacy field.
    pub fn set_dimension_payload(&mut self, dimension: &str, payload: PayloadId) {
        self.dimension_payloads
            .insert(dimension.to_string(), payload);
        if dimension == PRIMARY_DIMENSION {
            self.payload = Some(payload);
        }
    }

    /// Drops the payload for one dimension, clearing the legacy field too
    /// when the primary dimension is removed.
    pub fn clear_dimension_payload(&mut self, dimension: &str) -> Option<PayloadId> {
        let removed = self.dimension_payloads.remove(dimension);
        if dimension == PRIMARY_DIMENSION {
            self.payload = None;
        }
        removed
    }

    /// Claims the cell for an owner, replacing all payloads with the given
    /// dimension map and wiping reservation state.
    pub fn occupy(
        &mut self,
        owner: OwnerId,
        owner_name: Option<String>,
        payloads: HashMap<String, PayloadId>,
    ) {
        self.status = SlotStatus::Occupied;
        self.owner = Some(owner);
        self.owner_name = owner_name;
        self.payload = payloads.get(PRIMARY_DIMENSION).copied();
        self.dimension_payloads = payloads;
        self.reserved = false;
        self.blocked = false;
        self.purchase_price = 0.0;
    }

    /// Resets the cell to a fresh available state in place.
    pub fn clear(&mut self) {
        self.status = SlotStatus::Available;
        self.owner = None;
        self.owner_name = None;
        self.payload = None;
        self.dimension_payloads.clear();
        self.reserved = false;
        self.blocked = false;
        self.purchase_price = 0.0;
    }

    pub(crate) fn restore(
        coordinate: GridCoordinate,
        status: SlotStatus,
        owner: Option<OwnerId>,
        owner_name: Option<String>,
        payload: Option<PayloadId>,
        dimension_payloads: HashMap<String, PayloadId>,
        reserved: bool,
        blocked: bool,
        purchase_price: f64,
    ) -> Self {
        // Locked is derived; a persisted Locked collapses to a blocked
        // reservation, and a blocked record is always a reservation.
        let blocked = blocked || status == SlotStatus::Locked;
        let reserved = reserved || blocked;
        let status = match status {
            SlotStatus::Occupied => SlotStatus::Occupied,
            _ if reserved => SlotStatus::Reserved,
            // A stray Reserved/Locked without the flags is a stale record.
            SlotStatus::Reserved | SlotStatus::Locked => SlotStatus::Available,
            other => other,
        };
        let mut loc = Self {
            coordinate,
            status,
            owner,
            owner_name,
            payload,
            dimension_payloads,
            reserved,
            blocked,
            purchase_price,
        };
        // Legacy records carry only the single payload field.
        if let Some(id) = loc.payload {
            loc.dimension_payloads
                .entry(PRIMARY_DIMENSION.to_string())
                .or_insert(id);
        }
        loc
    }
}
