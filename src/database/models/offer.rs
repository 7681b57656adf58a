use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::double_option;
use crate::types::OfferStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Offer {
    pub id: Uuid,
    pub offer_number: String,
    pub year: i32,
    pub sequence: i32,
    pub event_id: Option<Uuid>,
    pub client_name: String,
    pub client_email: Option<String>,
    pub title: String,
    pub status: OfferStatus,
    pub currency: String,
    pub discount_percent: Decimal,
    pub vat_rate: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total_net: Decimal,
    pub vat_amount: Decimal,
    pub total_gross: Decimal,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
    pub client_name: String,
    pub client_email: Option<String>,
    pub title: String,
    pub event_id: Option<Uuid>,
    pub currency: Option<String>,
    pub discount_percent: Option<Decimal>,
    pub vat_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferPatch {
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub client_email: Option<Option<String>>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub event_id: Option<Option<Uuid>>,
    pub status: Option<OfferStatus>,
    pub currency: Option<String>,
    pub discount_percent: Option<Decimal>,
    pub vat_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub valid_until: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl OfferPatch {
    /// Whether applying the patch changes the inputs of the totals
    pub fn touches_totals(&self) -> bool {
        self.discount_percent.is_some() || self.vat_rate.is_some()
    }

    /// Apply header fields. Status is handled separately so transitions can
    /// be validated first.
    pub fn apply(self, offer: &mut Offer) {
        if let Some(client_name) = self.client_name {
            offer.client_name = client_name;
        }
        if let Some(client_email) = self.client_email {
            offer.client_email = client_email;
        }
        if let Some(title) = self.title {
            offer.title = title;
        }
        if let Some(event_id) = self.event_id {
            offer.event_id = event_id;
        }
        if let Some(currency) = self.currency {
            offer.currency = currency;
        }
        if let Some(discount_percent) = self.discount_percent {
            offer.discount_percent = discount_percent;
        }
        if let Some(vat_rate) = self.vat_rate {
            offer.vat_rate = vat_rate;
        }
        if let Some(valid_until) = self.valid_until {
            offer.valid_until = valid_until;
        }
        if let Some(notes) = self.notes {
            offer.notes = notes;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OfferItem {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub position: i32,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub quantity: Decimal,
    pub days: i32,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOfferItem {
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub days: Option<i32>,
    pub unit_price: Decimal,
    pub discount_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferItemPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub unit: Option<String>,
    pub quantity: Option<Decimal>,
    pub days: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub position: Option<i32>,
}

impl OfferItemPatch {
    pub fn apply(self, item: &mut OfferItem) {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(description) = self.description {
            item.description = description;
        }
        if let Some(unit) = self.unit {
            item.unit = unit;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(days) = self.days {
            item.days = days;
        }
        if let Some(unit_price) = self.unit_price {
            item.unit_price = unit_price;
        }
        if let Some(discount_percent) = self.discount_percent {
            item.discount_percent = discount_percent;
        }
        if let Some(position) = self.position {
            item.position = position;
        }
    }
}
