use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tourbook_core::booking::{Booking, BookingStatus, Payment, PaymentMethod, PaymentRecordStatus};
use tourbook_core::repository::BookingRepository;
use tourbook_core::{CoreError, CoreResult};

use crate::database::{is_unique_violation, storage_error};

pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: String,
    tour_id: Uuid,
    tour_date_id: Option<Uuid>,
    vendor_id: Uuid,
    booking_reference: String,
    full_name: String,
    email: String,
    phone: String,
    participants: i32,
    special_requests: Option<String>,
    base_cents: i64,
    gst_cents: i64,
    sgst_cents: i64,
    total_cents: i64,
    currency: String,
    status: String,
    payment_method: String,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            tour_id: row.tour_id,
            tour_date_id: row.tour_date_id,
            vendor_id: row.vendor_id,
            booking_reference: row.booking_reference,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            participants: row.participants,
            special_requests: row.special_requests,
            base_cents: row.base_cents,
            gst_cents: row.gst_cents,
            sgst_cents: row.sgst_cents,
            total_cents: row.total_cents,
            currency: row.currency,
            status: row.status.parse()?,
            payment_method: row.payment_method.parse()?,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    amount_cents: i64,
    currency: String,
    payment_method: String,
    provider: String,
    transaction_id: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = CoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            booking_id: row.booking_id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            payment_method: row.payment_method.parse()?,
            provider: row.provider.parse().map_err(|e: tourbook_core::payment::PaymentError| {
                CoreError::StorageError(e.to_string())
            })?,
            transaction_id: row.transaction_id,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, tour_id, tour_date_id, vendor_id, booking_reference, full_name, \
    email, phone, participants, special_requests, base_cents, gst_cents, sgst_cents, total_cents, currency, \
    status, payment_method, transaction_id, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, booking_id, amount_cents, currency, payment_method, provider, \
    transaction_id, status, created_at, updated_at";

fn bookings(rows: Vec<BookingRow>) -> CoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn insert_booking(&self, booking: &Booking) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, tour_id, tour_date_id, vendor_id, booking_reference, full_name,
                email, phone, participants, special_requests, base_cents, gst_cents, sgst_cents, total_cents,
                currency, status, payment_method, transaction_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.user_id)
        .bind(booking.tour_id)
        .bind(booking.tour_date_id)
        .bind(booking.vendor_id)
        .bind(&booking.booking_reference)
        .bind(&booking.full_name)
        .bind(&booking.email)
        .bind(&booking.phone)
        .bind(booking.participants)
        .bind(&booking.special_requests)
        .bind(booking.base_cents)
        .bind(booking.gst_cents)
        .bind(booking.sgst_cents)
        .bind(booking.total_cents)
        .bind(&booking.currency)
        .bind(booking.status.as_str())
        .bind(booking.payment_method.as_str())
        .bind(&booking.transaction_id)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(CoreError::DuplicateReference(booking.booking_reference.clone()))
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn get_booking_by_reference(&self, reference: &str) -> CoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE booking_reference = $1", BOOKING_COLUMNS);
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn list_user_bookings(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        bookings(rows)
    }

    async fn list_vendor_bookings(&self, vendor_id: Uuid) -> CoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE vendor_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(vendor_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        bookings(rows)
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_payment_details(
        &self,
        id: Uuid,
        method: PaymentMethod,
        transaction_id: &str,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE bookings SET payment_method = $2, transaction_id = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(method.as_str())
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, amount_cents, currency, payment_method, provider,
                transaction_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(payment.payment_method.as_str())
        .bind(payment.provider.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict(format!("payment {} already recorded", payment.transaction_id))
            } else {
                storage_error(e)
            }
        })?;
        Ok(())
    }

    async fn get_payment_by_transaction(&self, transaction_id: &str) -> CoreResult<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE transaction_id = $1", PAYMENT_COLUMNS);
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(Payment::try_from)
            .transpose()
    }

    async fn list_payments(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE booking_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(Payment::try_from)
            .collect()
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        from: &[PaymentRecordStatus],
        to: PaymentRecordStatus,
    ) -> CoreResult<bool> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            "UPDATE payments SET status = $3, updated_at = NOW() WHERE id = $1 AND status = ANY($2)",
        )
        .bind(id)
        .bind(from)
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected() == 1)
    }
}
