//! Offer numbering, totals and lifecycle.
//!
//! Totals are stored on the offer and recalculated inside the same
//! transaction as every write that affects them.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{Connection, PgConnection};
use uuid::Uuid;

use crate::config::OfferConfig;
use crate::database::models::{NewOffer, NewOfferItem, Offer, OfferItem, OfferItemPatch, OfferPatch};
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::filter::filter_order::FilterOrder;
use crate::filter::{FilterData, FilterError};
use crate::types::OfferStatus;

const PG_UNIQUE_VIOLATION: &str = "23505";

/// Round to cents, half away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn format_offer_number(prefix: &str, year: i32, sequence: i32) -> String {
    format!("{}/{}/{:04}", prefix, year, sequence)
}

pub fn line_total(quantity: Decimal, days: i32, unit_price: Decimal, discount_percent: Decimal) -> Decimal {
    let factor = Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED;
    round2(quantity * Decimal::from(days) * unit_price * factor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total_net: Decimal,
    pub vat_amount: Decimal,
    pub total_gross: Decimal,
}

impl Totals {
    pub fn compute(line_totals: &[Decimal], discount_percent: Decimal, vat_rate: Decimal) -> Self {
        let subtotal: Decimal = line_totals.iter().copied().sum();
        let discount_amount = round2(subtotal * discount_percent / Decimal::ONE_HUNDRED);
        let total_net = subtotal - discount_amount;
        let vat_amount = round2(total_net * vat_rate / Decimal::ONE_HUNDRED);
        Self {
            subtotal,
            discount_amount,
            total_net,
            vat_amount,
            total_gross: total_net + vat_amount,
        }
    }
}

/// Client and title are required both on create and after any patch
fn validate_header(client_name: &str, title: &str) -> Result<(), ApiError> {
    if client_name.trim().is_empty() {
        return Err(ApiError::invalid_field("client_name", "must not be empty"));
    }
    if title.trim().is_empty() {
        return Err(ApiError::invalid_field("title", "must not be empty"));
    }
    Ok(())
}

fn validate_percent(field: &str, value: Decimal) -> Result<(), ApiError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(ApiError::invalid_field(field, "must be between 0 and 100"));
    }
    Ok(())
}

fn validate_item(name: &str, quantity: Decimal, days: i32, unit_price: Decimal, discount: Decimal) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::invalid_field("name", "must not be empty"));
    }
    if quantity <= Decimal::ZERO {
        return Err(ApiError::invalid_field("quantity", "must be greater than 0"));
    }
    if days < 1 {
        return Err(ApiError::invalid_field("days", "must be at least 1"));
    }
    if unit_price < Decimal::ZERO {
        return Err(ApiError::invalid_field("unit_price", "must not be negative"));
    }
    validate_percent("discount_percent", discount)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferListQuery {
    pub status: Option<OfferStatus>,
    pub event_id: Option<Uuid>,
    pub year: Option<i32>,
    pub order: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl OfferListQuery {
    pub const SORTABLE: &'static [&'static str] =
        &["created_at", "updated_at", "offer_number", "year", "sequence", "status", "title", "client_name", "total_gross"];

    pub fn to_filter(&self) -> Result<FilterData, FilterError> {
        let mut conditions = Map::new();
        if let Some(status) = self.status {
            conditions.insert("status".into(), json!(status));
        }
        if let Some(event_id) = self.event_id {
            conditions.insert("event_id".into(), json!(event_id));
        }
        if let Some(year) = self.year {
            conditions.insert("year".into(), json!(year));
        }
        let order = FilterOrder::restrict(self.order.as_deref().unwrap_or("created_at desc"), Self::SORTABLE)?;
        Ok(FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: Some(order),
            limit: self.limit,
            offset: self.offset,
            ..Default::default()
        })
    }
}

#[derive(Debug, Serialize)]
pub struct OfferDetail {
    #[serde(flatten)]
    pub offer: Offer,
    pub items: Vec<OfferItem>,
}

pub async fn list(conn: &mut PgConnection, query: &OfferListQuery) -> Result<Vec<Offer>, DatabaseError> {
    Repository::<Offer>::new("offers").select_any(conn, query.to_filter()?).await
}

pub async fn get(conn: &mut PgConnection, id: Uuid) -> Result<Offer, DatabaseError> {
    Repository::<Offer>::new("offers").select_by_id(conn, id).await
}

async fn get_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Offer, ApiError> {
    sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Offer not found"))
}

pub async fn items(conn: &mut PgConnection, offer_id: Uuid) -> Result<Vec<OfferItem>, DatabaseError> {
    Ok(sqlx::query_as::<_, OfferItem>(
        "SELECT * FROM offer_items WHERE offer_id = $1 ORDER BY position, created_at",
    )
    .bind(offer_id)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn detail(conn: &mut PgConnection, id: Uuid) -> Result<OfferDetail, DatabaseError> {
    let offer = get(conn, id).await?;
    let items = items(conn, id).await?;
    Ok(OfferDetail { offer, items })
}

/// Create a draft offer with the next number of `today`'s year.
///
/// Each attempt runs in a savepoint; a unique violation on the number means
/// another writer took it, so the sequence is re-read and retried.
pub async fn create(
    conn: &mut PgConnection,
    config: &OfferConfig,
    input: &NewOffer,
    created_by: Uuid,
    today: NaiveDate,
) -> Result<Offer, ApiError> {
    validate_header(&input.client_name, &input.title)?;
    let discount_percent = input.discount_percent.unwrap_or(Decimal::ZERO);
    validate_percent("discount_percent", discount_percent)?;
    let vat_rate = input.vat_rate.unwrap_or(config.default_vat_rate);
    validate_percent("vat_rate", vat_rate)?;

    let year = today.year();
    let valid_until = input
        .valid_until
        .unwrap_or(today + Duration::days(config.validity_days));
    let currency = input.currency.clone().unwrap_or_else(|| config.currency.clone());

    for attempt in 1..=config.number_retry_attempts.max(1) {
        let (sequence,): (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(sequence), 0) + 1 FROM offers WHERE year = $1")
                .bind(year)
                .fetch_one(&mut *conn)
                .await?;
        let offer_number = format_offer_number(&config.number_prefix, year, sequence);

        let mut savepoint = conn.begin().await?;
        let inserted = sqlx::query_as::<_, Offer>(
            "INSERT INTO offers (offer_number, year, sequence, event_id, client_name, client_email,
                                 title, status, currency, discount_percent, vat_rate, valid_until,
                                 notes, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft', $8, $9, $10, $11, $12, $13)
             RETURNING *",
        )
        .bind(&offer_number)
        .bind(year)
        .bind(sequence)
        .bind(input.event_id)
        .bind(input.client_name.trim())
        .bind(&input.client_email)
        .bind(input.title.trim())
        .bind(&currency)
        .bind(discount_percent)
        .bind(vat_rate)
        .bind(valid_until)
        .bind(&input.notes)
        .bind(created_by)
        .fetch_one(&mut *savepoint)
        .await;

        match inserted {
            Ok(offer) => {
                savepoint.commit().await?;
                tracing::info!("Created offer {} ({})", offer.offer_number, offer.id);
                return Ok(offer);
            }
            Err(e) if is_unique_violation(&e) => {
                savepoint.rollback().await?;
                tracing::warn!("Offer number {} taken (attempt {}), retrying", offer_number, attempt);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::conflict("Could not allocate an offer number, please retry"))
}

pub async fn update(conn: &mut PgConnection, id: Uuid, patch: OfferPatch) -> Result<Offer, ApiError> {
    let mut offer = get_for_update(conn, id).await?;

    if let Some(next) = patch.status {
        if !offer.status.can_transition_to(next) {
            return Err(ApiError::unprocessable_field(
                "status",
                format!("Cannot change status from {} to {}", offer.status, next),
            ));
        }
    }
    if patch.touches_totals() && !offer.status.items_editable() {
        return Err(ApiError::conflict("Pricing of a non-draft offer is read-only"));
    }

    let next_status = patch.status.unwrap_or(offer.status);
    let recalc = patch.touches_totals();
    patch.apply(&mut offer);
    offer.status = next_status;
    validate_header(&offer.client_name, &offer.title)?;
    validate_percent("discount_percent", offer.discount_percent)?;
    validate_percent("vat_rate", offer.vat_rate)?;

    sqlx::query(
        "UPDATE offers
         SET client_name = $2, client_email = $3, title = $4, event_id = $5, status = $6,
             currency = $7, discount_percent = $8, vat_rate = $9, valid_until = $10,
             notes = $11, updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(offer.client_name.trim())
    .bind(&offer.client_email)
    .bind(offer.title.trim())
    .bind(offer.event_id)
    .bind(offer.status)
    .bind(&offer.currency)
    .bind(offer.discount_percent)
    .bind(offer.vat_rate)
    .bind(offer.valid_until)
    .bind(&offer.notes)
    .execute(&mut *conn)
    .await?;

    if recalc {
        return recalculate(conn, id).await;
    }
    Ok(get(conn, id).await?)
}

/// Only drafts can be deleted
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<(), ApiError> {
    let offer = get_for_update(conn, id).await?;
    if offer.status != OfferStatus::Draft {
        return Err(ApiError::conflict(format!("Offer {} is {} and cannot be deleted", offer.offer_number, offer.status)));
    }
    sqlx::query("DELETE FROM offers WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Lock the offer and make sure its items may change
async fn editable_offer(conn: &mut PgConnection, offer_id: Uuid) -> Result<Offer, ApiError> {
    let offer = get_for_update(conn, offer_id).await?;
    if !offer.status.items_editable() {
        return Err(ApiError::conflict(format!(
            "Items of offer {} are read-only while it is {}",
            offer.offer_number, offer.status
        )));
    }
    Ok(offer)
}

pub async fn add_item(conn: &mut PgConnection, offer_id: Uuid, input: &NewOfferItem) -> Result<OfferItem, ApiError> {
    editable_offer(conn, offer_id).await?;

    let days = input.days.unwrap_or(1);
    let discount = input.discount_percent.unwrap_or(Decimal::ZERO);
    validate_item(&input.name, input.quantity, days, input.unit_price, discount)?;

    let item = sqlx::query_as::<_, OfferItem>(
        "INSERT INTO offer_items (offer_id, position, name, description, unit, quantity, days,
                                  unit_price, discount_percent, line_total)
         VALUES ($1, (SELECT COALESCE(MAX(position), 0) + 1 FROM offer_items WHERE offer_id = $1),
                 $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING *",
    )
    .bind(offer_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.unit.as_deref().unwrap_or("pcs"))
    .bind(input.quantity)
    .bind(days)
    .bind(input.unit_price)
    .bind(discount)
    .bind(line_total(input.quantity, days, input.unit_price, discount))
    .fetch_one(&mut *conn)
    .await?;

    recalculate(conn, offer_id).await?;
    Ok(item)
}

pub async fn update_item(
    conn: &mut PgConnection,
    offer_id: Uuid,
    item_id: Uuid,
    patch: OfferItemPatch,
) -> Result<OfferItem, ApiError> {
    editable_offer(conn, offer_id).await?;

    let mut item = sqlx::query_as::<_, OfferItem>("SELECT * FROM offer_items WHERE id = $1 AND offer_id = $2")
        .bind(item_id)
        .bind(offer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Offer item not found"))?;
    patch.apply(&mut item);
    validate_item(&item.name, item.quantity, item.days, item.unit_price, item.discount_percent)?;

    let item = sqlx::query_as::<_, OfferItem>(
        "UPDATE offer_items
         SET position = $2, name = $3, description = $4, unit = $5, quantity = $6, days = $7,
             unit_price = $8, discount_percent = $9, line_total = $10
         WHERE id = $1
         RETURNING *",
    )
    .bind(item_id)
    .bind(item.position)
    .bind(item.name.trim())
    .bind(&item.description)
    .bind(&item.unit)
    .bind(item.quantity)
    .bind(item.days)
    .bind(item.unit_price)
    .bind(item.discount_percent)
    .bind(line_total(item.quantity, item.days, item.unit_price, item.discount_percent))
    .fetch_one(&mut *conn)
    .await?;

    recalculate(conn, offer_id).await?;
    Ok(item)
}

pub async fn delete_item(conn: &mut PgConnection, offer_id: Uuid, item_id: Uuid) -> Result<Offer, ApiError> {
    editable_offer(conn, offer_id).await?;
    let result = sqlx::query("DELETE FROM offer_items WHERE id = $1 AND offer_id = $2")
        .bind(item_id)
        .bind(offer_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Offer item not found"));
    }
    recalculate(conn, offer_id).await
}

/// Recompute every line total and the offer totals, storing what changed
pub async fn recalculate(conn: &mut PgConnection, offer_id: Uuid) -> Result<Offer, ApiError> {
    let offer = get_for_update(conn, offer_id).await?;
    let items = items(conn, offer_id).await?;

    let mut line_totals = Vec::with_capacity(items.len());
    for item in &items {
        let expected = line_total(item.quantity, item.days, item.unit_price, item.discount_percent);
        if expected != item.line_total {
            sqlx::query("UPDATE offer_items SET line_total = $2 WHERE id = $1")
                .bind(item.id)
                .bind(expected)
                .execute(&mut *conn)
                .await?;
        }
        line_totals.push(expected);
    }

    let totals = Totals::compute(&line_totals, offer.discount_percent, offer.vat_rate);
    let offer = sqlx::query_as::<_, Offer>(
        "UPDATE offers
         SET subtotal = $2, discount_amount = $3, total_net = $4, vat_amount = $5,
             total_gross = $6, updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(offer_id)
    .bind(totals.subtotal)
    .bind(totals.discount_amount)
    .bind(totals.total_net)
    .bind(totals.vat_amount)
    .bind(totals.total_gross)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!("Recalculated offer {}: gross {}", offer.offer_number, offer.total_gross);
    Ok(offer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn formats_numbers_with_padding() {
        assert_eq!(format_offer_number("OF", 2024, 7), "OF/2024/0007");
        assert_eq!(format_offer_number("OF", 2024, 12345), "OF/2024/12345");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(d("1.005")), d("1.01"));
        assert_eq!(round2(d("2.675")), d("2.68"));
        assert_eq!(round2(d("-1.005")), d("-1.01"));
        assert_eq!(round2(d("1.004")), d("1.00"));
    }

    #[test]
    fn line_total_applies_days_and_discount() {
        // 2 x 3 days x 150.00 less 10%
        assert_eq!(line_total(d("2"), 3, d("150.00"), d("10")), d("810.00"));
        assert_eq!(line_total(d("1.5"), 1, d("33.33"), d("0")), d("50.00"));
    }

    #[test]
    fn totals_follow_the_formula() {
        let totals = Totals::compute(&[d("810.00"), d("190.00")], d("5"), d("23"));
        assert_eq!(totals.subtotal, d("1000.00"));
        assert_eq!(totals.discount_amount, d("50.00"));
        assert_eq!(totals.total_net, d("950.00"));
        assert_eq!(totals.vat_amount, d("218.50"));
        assert_eq!(totals.total_gross, d("1168.50"));
    }

    #[test]
    fn empty_offer_totals_are_zero() {
        let totals = Totals::compute(&[], d("10"), d("23"));
        assert_eq!(totals.total_gross, Decimal::ZERO);
    }

    #[test]
    fn validates_items() {
        assert!(validate_item("PA system", d("1"), 1, d("100"), d("0")).is_ok());
        assert!(validate_item("PA system", d("0"), 1, d("100"), d("0")).is_err());
        assert!(validate_item("PA system", d("1"), 0, d("100"), d("0")).is_err());
        assert!(validate_item("PA system", d("1"), 1, d("-1"), d("0")).is_err());
        assert!(validate_item("PA system", d("1"), 1, d("1"), d("101")).is_err());
        assert!(validate_item(" ", d("1"), 1, d("1"), d("0")).is_err());
    }

    #[test]
    fn list_query_defaults_to_newest_first() {
        let filter = OfferListQuery { year: Some(2024), ..Default::default() }.to_filter().unwrap();
        assert_eq!(filter.order.unwrap(), "created_at desc");
        assert_eq!(filter.where_clause.unwrap()["year"], 2024);
    }

    #[test]
    fn list_query_rejects_unknown_order_column() {
        let query = OfferListQuery { order: Some("bogus_column".into()), ..Default::default() };
        assert!(matches!(query.to_filter(), Err(FilterError::InvalidColumn(_))));
        let query = OfferListQuery { order: Some("total_gross desc".into()), ..Default::default() };
        assert!(query.to_filter().is_ok());
    }

    #[test]
    fn header_fields_stay_required() {
        assert!(validate_header("Acme", "Main stage").is_ok());
        let err = validate_header("  ", "Main stage").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(validate_header("Acme", "").is_err());
    }
}
