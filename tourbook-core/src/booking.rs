use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::payment::PaymentProvider;
use crate::CoreError;

/// Booking lifecycle: `pending -> confirmed -> cancelled | completed`,
/// plus `pending -> cancelled` for bookings abandoned before payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(CoreError::StorageError(format!("unknown booking status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CreditCard,
    DebitCard,
    Paypal,
    Upi,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Upi => "upi",
        }
    }

    /// Cards go through the checkout provider, wallet and bank transfers
    /// through the wallet provider.
    pub fn provider(&self) -> PaymentProvider {
        match self {
            PaymentMethod::CreditCard | PaymentMethod::DebitCard => PaymentProvider::Stripe,
            PaymentMethod::Paypal | PaymentMethod::Upi => PaymentProvider::Paypal,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "debit_card" => Ok(PaymentMethod::DebitCard),
            "paypal" => Ok(PaymentMethod::Paypal),
            "upi" => Ok(PaymentMethod::Upi),
            other => Err(CoreError::ValidationError(format!("unsupported payment method '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub tour_id: Uuid,
    pub tour_date_id: Option<Uuid>,
    pub vendor_id: Uuid,
    pub booking_reference: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub participants: i32,
    pub special_requests: Option<String>,
    pub base_cents: i64,
    pub gst_cents: i64,
    pub sgst_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn amounts_balance(&self) -> bool {
        self.total_cents == self.base_cents + self.gst_cents + self.sgst_cents
    }
}

/// Status of a single payment attempt against a booking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRecordStatus::Pending => "pending",
            PaymentRecordStatus::Completed => "completed",
            PaymentRecordStatus::Failed => "failed",
            PaymentRecordStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentRecordStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentRecordStatus::Pending),
            "completed" => Ok(PaymentRecordStatus::Completed),
            "failed" => Ok(PaymentRecordStatus::Failed),
            "refunded" => Ok(PaymentRecordStatus::Refunded),
            other => Err(CoreError::StorageError(format!("unknown payment status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub provider: PaymentProvider,
    pub transaction_id: String,
    pub status: PaymentRecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        booking: &Booking,
        method: PaymentMethod,
        provider: PaymentProvider,
        transaction_id: String,
        status: PaymentRecordStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            amount_cents: booking.total_cents,
            currency: booking.currency.clone(),
            payment_method: method,
            provider,
            transaction_id,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}
