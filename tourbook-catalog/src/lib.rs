pub mod tour;
pub mod pricing;
pub mod inventory;

pub use tour::{Category, Destination, Tour, TourDate};
pub use pricing::{PriceBreakdown, PricingConfig, PricingEngine, PricingError};
pub use inventory::{InventoryError, SeatInventory};
