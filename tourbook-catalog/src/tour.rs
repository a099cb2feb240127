use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::NaiveDate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub country: String,
    pub city: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
}

/// A bookable tour offered by a vendor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tour {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub destination_id: Uuid,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub price_cents: i64,
    pub discount_price_cents: Option<i64>,
    pub duration_days: i32,
    pub duration_nights: i32,
    pub group_size_min: i32,
    pub group_size_max: i32,
    pub is_active: bool,
}

impl Tour {
    pub fn is_available(&self) -> bool {
        self.is_active && self.group_size_max > 0
    }

    pub fn availability_label(&self) -> &'static str {
        if self.is_available() {
            "Available"
        } else {
            "Not Available"
        }
    }
}

/// A scheduled departure of a tour with its own seat pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TourDate {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub available_seats: i32,
    #[serde(default = "default_modifier")]
    pub price_modifier: f64,
    pub is_guaranteed: bool,
}

fn default_modifier() -> f64 {
    1.0
}

impl TourDate {
    pub fn starts_after(&self, today: NaiveDate) -> bool {
        self.start_date > today
    }

    pub fn has_seats_for(&self, participants: i32) -> bool {
        self.available_seats >= participants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tour(active: bool, max: i32) -> Tour {
        Tour {
            id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            category_id: None,
            name: "Kerala Backwaters".to_string(),
            slug: "kerala-backwaters".to_string(),
            price_cents: 1_500_000,
            discount_price_cents: None,
            duration_days: 4,
            duration_nights: 3,
            group_size_min: 1,
            group_size_max: max,
            is_active: active,
        }
    }

    #[test]
    fn test_availability() {
        assert_eq!(tour(true, 12).availability_label(), "Available");
        assert_eq!(tour(false, 12).availability_label(), "Not Available");
        assert!(!tour(true, 0).is_available());
    }

    #[test]
    fn test_tour_date_defaults_modifier() {
        let json = serde_json::json!({
            "id": Uuid::nil(),
            "tour_id": Uuid::nil(),
            "start_date": "2030-01-10",
            "end_date": "2030-01-14",
            "available_seats": 8,
            "is_guaranteed": false
        });
        let date: TourDate = serde_json::from_value(json).unwrap();
        assert_eq!(date.price_modifier, 1.0);
        assert!(date.has_seats_for(8));
        assert!(!date.has_seats_for(9));
    }
}
