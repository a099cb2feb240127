use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use tourbook_catalog::{Category, Destination, Tour, TourDate};
use tourbook_core::repository::TourRepository;
use tourbook_core::{CoreError, CoreResult};

use crate::database::storage_error;

pub struct PostgresTourRepository {
    pool: PgPool,
}

impl PostgresTourRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TourRow {
    id: Uuid,
    vendor_id: Uuid,
    destination_id: Uuid,
    category_id: Option<Uuid>,
    name: String,
    slug: String,
    price_cents: i64,
    discount_price_cents: Option<i64>,
    duration_days: i32,
    duration_nights: i32,
    group_size_min: i32,
    group_size_max: i32,
    is_active: bool,
}

impl From<TourRow> for Tour {
    fn from(row: TourRow) -> Self {
        Tour {
            id: row.id,
            vendor_id: row.vendor_id,
            destination_id: row.destination_id,
            category_id: row.category_id,
            name: row.name,
            slug: row.slug,
            price_cents: row.price_cents,
            discount_price_cents: row.discount_price_cents,
            duration_days: row.duration_days,
            duration_nights: row.duration_nights,
            group_size_min: row.group_size_min,
            group_size_max: row.group_size_max,
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TourDateRow {
    id: Uuid,
    tour_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    available_seats: i32,
    price_modifier: f64,
    is_guaranteed: bool,
}

impl From<TourDateRow> for TourDate {
    fn from(row: TourDateRow) -> Self {
        TourDate {
            id: row.id,
            tour_id: row.tour_id,
            start_date: row.start_date,
            end_date: row.end_date,
            available_seats: row.available_seats,
            price_modifier: row.price_modifier,
            is_guaranteed: row.is_guaranteed,
        }
    }
}

const TOUR_COLUMNS: &str = "id, vendor_id, destination_id, category_id, name, slug, price_cents, discount_price_cents, \
    duration_days, duration_nights, group_size_min, group_size_max, is_active";

#[derive(sqlx::FromRow)]
struct DestinationRow {
    id: Uuid,
    name: String,
    slug: String,
    country: String,
    city: String,
    is_active: bool,
}

impl From<DestinationRow> for Destination {
    fn from(row: DestinationRow) -> Self {
        Destination {
            id: row.id,
            name: row.name,
            slug: row.slug,
            country: row.country,
            city: row.city,
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    is_active: bool,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            slug: row.slug,
            is_active: row.is_active,
        }
    }
}

const TOUR_DATE_COLUMNS: &str = "id, tour_id, start_date, end_date, available_seats, price_modifier, is_guaranteed";

#[async_trait]
impl TourRepository for PostgresTourRepository {
    async fn get_tour(&self, id: Uuid) -> CoreResult<Option<Tour>> {
        let sql = format!("SELECT {} FROM tours WHERE id = $1", TOUR_COLUMNS);
        let row = sqlx::query_as::<_, TourRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(Tour::from))
    }

    async fn get_tour_by_slug(&self, slug: &str) -> CoreResult<Option<Tour>> {
        let sql = format!("SELECT {} FROM tours WHERE slug = $1", TOUR_COLUMNS);
        let row = sqlx::query_as::<_, TourRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(Tour::from))
    }

    async fn get_tour_date(&self, id: Uuid) -> CoreResult<Option<TourDate>> {
        let sql = format!("SELECT {} FROM tour_dates WHERE id = $1", TOUR_DATE_COLUMNS);
        let row = sqlx::query_as::<_, TourDateRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(TourDate::from))
    }

    async fn get_destination(&self, id: Uuid) -> CoreResult<Option<Destination>> {
        let row = sqlx::query_as::<_, DestinationRow>(
            "SELECT id, name, slug, country, city, is_active FROM destinations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(row.map(Destination::from))
    }

    async fn get_category(&self, id: Uuid) -> CoreResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, is_active FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(row.map(Category::from))
    }

    async fn list_tour_dates(&self, tour_id: Uuid) -> CoreResult<Vec<TourDate>> {
        let sql = format!(
            "SELECT {} FROM tour_dates WHERE tour_id = $1 AND available_seats > 0 ORDER BY start_date",
            TOUR_DATE_COLUMNS
        );
        let rows = sqlx::query_as::<_, TourDateRow>(&sql)
            .bind(tour_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(TourDate::from).collect())
    }

    async fn reserve_seats(&self, tour_date_id: Uuid, seats: i32) -> CoreResult<()> {
        // Conditional UPDATE keeps the pool from going negative.
        let result = sqlx::query(
            "UPDATE tour_dates SET available_seats = available_seats - $2 \
             WHERE id = $1 AND available_seats >= $2",
        )
        .bind(tour_date_id)
        .bind(seats)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return match self.get_tour_date(tour_date_id).await? {
                Some(date) => Err(CoreError::Conflict(format!(
                    "Only {} seats left, {} requested",
                    date.available_seats, seats
                ))),
                None => Err(CoreError::NotFound(format!("tour date {}", tour_date_id))),
            };
        }
        Ok(())
    }

    async fn release_seats(&self, tour_date_id: Uuid, seats: i32) -> CoreResult<()> {
        sqlx::query("UPDATE tour_dates SET available_seats = available_seats + $2 WHERE id = $1")
            .bind(tour_date_id)
            .bind(seats)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}
