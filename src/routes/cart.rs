//! Shopping cart, scoped to the authenticated caller.
//!
//! Stock checks here are advisory (stock is a moving target until checkout
//! reserves it) but they are re-run on every mutation, merged quantity
//! included. Lines hold no price snapshot; listing prices live.

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Actor;
use crate::error::{ApiError, ApiResponse};
use crate::extract::{Json, Path};
use crate::inventory;
use crate::AppState;

/// Cart line joined to its product and supplier.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
    pub name: String,
    pub price: Decimal,
    pub unit: String,
    pub image_url: Option<String>,
    pub admin_id: Uuid,
    pub admin_name: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SupplierGroup {
    pub admin_id: Uuid,
    pub admin_name: Option<String>,
    pub company_name: Option<String>,
    pub items: Vec<CartRow>,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<SupplierGroup>,
    pub total_items: usize,
    pub total_amount: Decimal,
}

/// Groups lines by supplier, first-seen order, with per-group subtotals and
/// an overall 2dp total.
pub fn group_by_supplier(rows: Vec<CartRow>) -> CartView {
    let total_items = rows.len();
    let mut groups: Vec<SupplierGroup> = Vec::new();
    let mut total_amount = Decimal::ZERO;

    for row in rows {
        let line_total = row.price * Decimal::from(row.quantity);
        total_amount += line_total;
        match groups.iter_mut().find(|g| g.admin_id == row.admin_id) {
            Some(group) => {
                group.subtotal += line_total;
                group.items.push(row);
            }
            None => groups.push(SupplierGroup {
                admin_id: row.admin_id,
                admin_name: row.admin_name.clone(),
                company_name: row.company_name.clone(),
                subtotal: line_total,
                items: vec![row],
            }),
        }
    }

    CartView {
        items: groups,
        total_items,
        total_amount: total_amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    }
}

pub async fn list(
    State(s): State<AppState>,
    actor: Actor,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let rows = sqlx::query_as::<_, CartRow>(
        "SELECT ci.id, ci.product_id, ci.quantity, ci.added_at, \
                p.name, p.price, p.unit, p.image_url, p.admin_id, \
                u.name AS admin_name, u.company_name \
         FROM cart_items ci \
         JOIN products p ON ci.product_id = p.id \
         JOIN users u ON p.admin_id = u.id \
         WHERE ci.client_id = $1 \
         ORDER BY ci.added_at DESC",
    )
    .bind(actor.id)
    .fetch_all(&s.db)
    .await?;

    Ok(ApiResponse::ok("Cart items retrieved", group_by_supplier(rows)))
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

pub async fn add(
    State(s): State<AppState>,
    actor: Actor,
    Json(r): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), ApiError> {
    if r.quantity < 1 {
        return Err(ApiError::InvalidRequest("Invalid product or quantity".into()));
    }

    // The merged line quantity must fit the current stock, not just the delta.
    let existing: Option<(i32,)> = sqlx::query_as(
        "SELECT quantity FROM cart_items WHERE client_id = $1 AND product_id = $2",
    )
    .bind(actor.id)
    .bind(r.product_id)
    .fetch_optional(&s.db)
    .await?;
    let merged = existing.map_or(r.quantity, |(q,)| q + r.quantity);
    let availability = inventory::check_availability(&s.db, r.product_id, merged).await?;
    if !availability.available {
        return Err(ApiError::InsufficientStock(r.product_id));
    }

    sqlx::query(
        "INSERT INTO cart_items (id, client_id, product_id, quantity, added_at) \
         VALUES ($1, $2, $3, $4, NOW()) \
         ON CONFLICT (client_id, product_id) DO UPDATE SET quantity = cart_items.quantity + $4",
    )
    .bind(Uuid::now_v7())
    .bind(actor.id)
    .bind(r.product_id)
    .bind(r.quantity)
    .execute(&s.db)
    .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok_empty("Item added to cart")))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i32,
}

pub async fn update(
    State(s): State<AppState>,
    actor: Actor,
    Path(cart_item_id): Path<Uuid>,
    Json(r): Json<UpdateCartRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if r.quantity < 0 {
        return Err(ApiError::InvalidRequest("Invalid quantity".into()));
    }

    let line: Option<(Uuid,)> = sqlx::query_as(
        "SELECT product_id FROM cart_items WHERE id = $1 AND client_id = $2",
    )
    .bind(cart_item_id)
    .bind(actor.id)
    .fetch_optional(&s.db)
    .await?;
    let (product_id,) = line.ok_or(ApiError::NotFound("Cart item"))?;

    if r.quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(cart_item_id)
            .execute(&s.db)
            .await?;
        return Ok(ApiResponse::ok_empty("Cart updated successfully"));
    }

    let availability = inventory::check_availability(&s.db, product_id, r.quantity).await?;
    if !availability.available {
        return Err(ApiError::InsufficientStock(product_id));
    }

    sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
        .bind(cart_item_id)
        .bind(r.quantity)
        .execute(&s.db)
        .await?;

    Ok(ApiResponse::ok_empty("Cart updated successfully"))
}

/// Idempotent: removing an absent line is not an error.
pub async fn remove(
    State(s): State<AppState>,
    actor: Actor,
    Path(cart_item_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    sqlx::query("DELETE FROM cart_items WHERE id = $1 AND client_id = $2")
        .bind(cart_item_id)
        .bind(actor.id)
        .execute(&s.db)
        .await?;
    Ok(ApiResponse::ok_empty("Item removed from cart"))
}

pub async fn clear(
    State(s): State<AppState>,
    actor: Actor,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    sqlx::query("DELETE FROM cart_items WHERE client_id = $1")
        .bind(actor.id)
        .execute(&s.db)
        .await?;
    Ok(ApiResponse::ok_empty("Cart cleared"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn row(admin: Uuid, price: &str, quantity: i32) -> CartRow {
        CartRow {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            added_at: Utc::now(),
            name: "Tomat".into(),
            price: dec(price),
            unit: "kg".into(),
            image_url: None,
            admin_id: admin,
            admin_name: Some("Pak Budi".into()),
            company_name: None,
        }
    }

    #[test]
    fn test_groups_by_supplier_in_first_seen_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let view = group_by_supplier(vec![
            row(a, "10.00", 3),
            row(b, "5.00", 2),
            row(a, "2.50", 4),
        ]);
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].admin_id, a);
        assert_eq!(view.items[0].items.len(), 2);
        assert_eq!(view.items[0].subtotal, dec("40.00"));
        assert_eq!(view.items[1].subtotal, dec("10.00"));
        assert_eq!(view.total_items, 3);
        assert_eq!(view.total_amount, dec("50.00"));
    }

    #[test]
    fn test_empty_cart() {
        let view = group_by_supplier(vec![]);
        assert!(view.items.is_empty());
        assert_eq!(view.total_items, 0);
        assert_eq!(view.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_total_rounds_to_two_decimals() {
        let a = Uuid::new_v4();
        let view = group_by_supplier(vec![row(a, "3.335", 1)]);
        assert_eq!(view.total_amount, dec("3.34"));
    }
}
