use uuid::Uuid;
use std::collections::HashMap;

/// In-memory seat pools keyed by tour date. The Postgres store does the same
/// bookkeeping with a conditional `UPDATE`.
#[derive(Debug, Default)]
pub struct SeatInventory {
    seats: HashMap<Uuid, i32>,
}

impl SeatInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, tour_date_id: Uuid, available: i32) {
        self.seats.insert(tour_date_id, available);
    }

    pub fn available(&self, tour_date_id: &Uuid) -> Option<i32> {
        self.seats.get(tour_date_id).copied()
    }

    /// Takes `quantity` seats or none at all.
    pub fn reserve(&mut self, tour_date_id: &Uuid, quantity: i32) -> Result<i32, InventoryError> {
        let available = self.seats.get_mut(tour_date_id)
            .ok_or_else(|| InventoryError::NotFound(tour_date_id.to_string()))?;

        if *available < quantity {
            return Err(InventoryError::InsufficientSeats {
                requested: quantity,
                available: *available,
            });
        }

        *available -= quantity;
        Ok(*available)
    }

    pub fn release(&mut self, tour_date_id: &Uuid, quantity: i32) -> Result<i32, InventoryError> {
        let available = self.seats.get_mut(tour_date_id)
            .ok_or_else(|| InventoryError::NotFound(tour_date_id.to_string()))?;

        *available += quantity;
        Ok(*available)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InventoryError {
    #[error("Tour date not found: {0}")]
    NotFound(String),

    #[error("Only {available} seats left, {requested} requested")]
    InsufficientSeats {
        requested: i32,
        available: i32,
    },
}
