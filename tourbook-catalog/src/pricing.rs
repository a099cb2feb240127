use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tour::{Tour, TourDate};

/// GST, in basis points of the base price.
pub const GST_RATE_BPS: i64 = 500;
/// SGST, in basis points of the base price.
pub const SGST_RATE_BPS: i64 = 500;

/// Priced booking, all amounts in minor currency units.
///
/// `total_cents` is always `base_cents + gst_cents + sgst_cents`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub tour_id: Uuid,
    pub tour_date_id: Option<Uuid>,
    pub participants: i32,
    pub unit_price_cents: i64,
    pub base_cents: i64,
    pub gst_cents: i64,
    pub sgst_cents: i64,
    pub total_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub currency: String,
    /// Hard cap on participants per booking, independent of the tour.
    pub max_participants: i32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            max_participants: 10,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PricingError {
    #[error("Participants must be between 1 and {max}, got {requested}")]
    InvalidParticipants { requested: i32, max: i32 },

    #[error("Maximum group size is {0} people")]
    GroupSizeExceeded(i32),

    #[error("Tour date {0} does not belong to this tour")]
    DateMismatch(Uuid),

    #[error("Tour is not available for booking")]
    TourUnavailable,

    #[error("Tour date {0} has no valid price")]
    InvalidPriceModifier(Uuid),
}

pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    /// Price per participant; a tour date scales the list price by its modifier.
    /// Modifiers must be positive and finite.
    pub fn unit_price(&self, tour: &Tour, date: Option<&TourDate>) -> Result<i64, PricingError> {
        match date {
            Some(d) if !(d.price_modifier.is_finite() && d.price_modifier > 0.0) => {
                Err(PricingError::InvalidPriceModifier(d.id))
            }
            Some(d) if (d.price_modifier - 1.0).abs() > f64::EPSILON => {
                Ok((tour.price_cents as f64 * d.price_modifier).round() as i64)
            }
            _ => Ok(tour.price_cents),
        }
    }

    pub fn quote(
        &self,
        tour: &Tour,
        date: Option<&TourDate>,
        participants: i32,
    ) -> Result<PriceBreakdown, PricingError> {
        if !tour.is_available() {
            return Err(PricingError::TourUnavailable);
        }

        let max = self.config.max_participants;
        if participants < 1 || participants > max {
            return Err(PricingError::InvalidParticipants { requested: participants, max });
        }

        if participants > tour.group_size_max {
            return Err(PricingError::GroupSizeExceeded(tour.group_size_max));
        }

        if let Some(d) = date {
            if d.tour_id != tour.id {
                return Err(PricingError::DateMismatch(d.id));
            }
        }

        let unit_price_cents = self.unit_price(tour, date)?;
        let base_cents = unit_price_cents * participants as i64;
        let gst_cents = percent_of(base_cents, GST_RATE_BPS);
        let sgst_cents = percent_of(base_cents, SGST_RATE_BPS);

        Ok(PriceBreakdown {
            tour_id: tour.id,
            tour_date_id: date.map(|d| d.id),
            participants,
            unit_price_cents,
            base_cents,
            gst_cents,
            sgst_cents,
            total_cents: base_cents + gst_cents + sgst_cents,
            currency: self.config.currency.clone(),
        })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

/// `amount * bps / 10000`, rounded half up. Amounts are never negative.
fn percent_of(amount: i64, bps: i64) -> i64 {
    (amount * bps + 5_000) / 10_000
}
