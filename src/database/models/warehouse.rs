use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::double_option;
use crate::types::ReservationStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WarehouseItem {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub quantity_total: i32,
    pub replacement_value: Option<Decimal>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWarehouseItem {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    #[serde(default)]
    pub quantity_total: i32,
    pub replacement_value: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarehouseItemPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    pub unit: Option<String>,
    pub quantity_total: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub replacement_value: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl WarehouseItemPatch {
    pub fn apply(self, item: &mut WarehouseItem) {
        if let Some(sku) = self.sku {
            item.sku = sku;
        }
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(unit) = self.unit {
            item.unit = unit;
        }
        if let Some(quantity_total) = self.quantity_total {
            item.quantity_total = quantity_total;
        }
        if let Some(replacement_value) = self.replacement_value {
            item.replacement_value = replacement_value;
        }
        if let Some(notes) = self.notes {
            item.notes = notes;
        }
        if let Some(is_active) = self.is_active {
            item.is_active = is_active;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WarehouseKit {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kit content line joined with the item it references
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct KitItem {
    pub item_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KitItemInput {
    pub item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewKit {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<KitItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarehouseKitPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub item_id: Uuid,
    pub quantity: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reserve either one item or a whole kit. The window defaults to the
/// event's window when `event_id` is given.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReservation {
    pub event_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub kit_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationPatch {
    pub status: Option<ReservationStatus>,
    pub quantity: Option<i32>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl ReservationPatch {
    /// Whether the patch can reduce availability and needs the stock check
    pub fn needs_availability_check(&self) -> bool {
        self.quantity.is_some()
            || self.start_at.is_some()
            || self.end_at.is_some()
            || self.status.map(|s| s.is_active()).unwrap_or(false)
    }

    pub fn apply(self, reservation: &mut Reservation) {
        if let Some(status) = self.status {
            reservation.status = status;
        }
        if let Some(quantity) = self.quantity {
            reservation.quantity = quantity;
        }
        if let Some(start_at) = self.start_at {
            reservation.start_at = start_at;
        }
        if let Some(end_at) = self.end_at {
            reservation.end_at = end_at;
        }
        if let Some(notes) = self.notes {
            reservation.notes = notes;
        }
    }
}

/// One aggregated pick-list line for an event
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PicklistRow {
    pub item_id: Uuid,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub quantity: i64,
    pub status: String,
    pub notes: Option<String>,
}
