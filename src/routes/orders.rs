//! Order lifecycle: checkout (cart-to-order transition) and the status state
//! machine endpoints.
//!
//! Checkout persists the order header, every line item, and every stock
//! reservation inside one transaction; a failure at any point rolls back all
//! of it. The reservation itself is the conditional decrement in
//! [`crate::inventory::reserve`], so two buyers racing for the last unit
//! cannot both win.

use axum::{extract::State, http::StatusCode};
use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Actor;
use crate::domain::{authorize_transition, Order, OrderStatus, PaymentStatus};
use crate::error::{validate, ApiError, ApiResponse};
use crate::events::OrderEvent;
use crate::extract::{Json, Path, Query};
use crate::inventory;
use crate::pricing::{calculate_totals, PriceBreakdown};
use crate::AppState;

const ORDER_NUMBER_ATTEMPTS: u32 = 3;

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub admin_id: Uuid,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub discount_percentage: Decimal,
    #[serde(default)]
    pub tax_percentage: Decimal,
    #[serde(default)]
    pub service_fee: Decimal,
    #[validate(length(min = 1, message = "delivery_address is required"))]
    pub delivery_address: String,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

// Serialize is load-bearing: the length rule on `items` records the value in
// its error params.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub order_number: String,
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
}

fn check_rates(r: &CheckoutRequest) -> Result<(), ApiError> {
    let hundred = Decimal::from(100);
    if r.discount_percentage < Decimal::ZERO || r.discount_percentage > hundred {
        return Err(ApiError::InvalidRequest("discount_percentage must be between 0 and 100".into()));
    }
    if r.tax_percentage < Decimal::ZERO {
        return Err(ApiError::InvalidRequest("tax_percentage must not be negative".into()));
    }
    if r.service_fee < Decimal::ZERO {
        return Err(ApiError::InvalidRequest("service_fee must not be negative".into()));
    }
    let mut seen = std::collections::HashSet::new();
    for item in &r.items {
        if item.quantity < 1 {
            return Err(ApiError::InvalidRequest("Item quantity must be at least 1".into()));
        }
        if !seen.insert(item.product_id) {
            return Err(ApiError::InvalidRequest(format!(
                "Duplicate product {} in order items",
                item.product_id
            )));
        }
    }
    Ok(())
}

#[derive(Debug)]
struct PlannedLine {
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

/// Prices every requested line against the resolved products, rejecting the
/// whole request on the first unresolved id or stock shortfall. The stock
/// check here is a precheck for a clean error; the reservation inside the
/// transaction remains authoritative.
fn plan_lines(
    items: &[CheckoutItem],
    resolved: &HashMap<Uuid, (Decimal, i32)>,
) -> Result<(Vec<PlannedLine>, Decimal), ApiError> {
    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    for item in items {
        let (price, stock) = resolved
            .get(&item.product_id)
            .ok_or(ApiError::ProductNotFound(item.product_id))?;
        if item.quantity > *stock {
            return Err(ApiError::InsufficientStock(item.product_id));
        }
        let line_subtotal = *price * Decimal::from(item.quantity);
        subtotal += line_subtotal;
        lines.push(PlannedLine {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: *price,
            subtotal: line_subtotal,
        });
    }
    Ok((lines, subtotal))
}

fn generate_order_number() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("ORD-{millis}-{suffix:03}")
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

pub async fn checkout(
    State(s): State<AppState>,
    actor: Actor,
    Json(r): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderCreated>>), ApiError> {
    actor.require_client()?;
    validate(&r)?;
    check_rates(&r)?;

    // Order-number collisions are retryable; everything else aborts.
    let mut attempt = 0;
    let created = loop {
        attempt += 1;
        match create_order(&s, actor.id, &r).await {
            Err(ApiError::Conflict) if attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::debug!(attempt, "order number collision, retrying");
            }
            Err(ApiError::Conflict) => {
                return Err(anyhow::anyhow!("order number collision persisted across retries").into())
            }
            other => break other?,
        }
    };

    tracing::info!(
        order_id = %created.order_id,
        order_number = %created.order_number,
        client_id = %actor.id,
        grand_total = %created.breakdown.grand_total,
        "order created"
    );
    s.events
        .publish(OrderEvent::Created {
            order_id: created.order_id,
            order_number: created.order_number.clone(),
            client_id: actor.id,
            admin_id: r.admin_id,
            grand_total: created.breakdown.grand_total,
        })
        .await;

    Ok((StatusCode::CREATED, ApiResponse::ok("Order created successfully", created)))
}

/// One transaction: header, items, reservations, optional cart cleanup.
async fn create_order(
    s: &AppState,
    client_id: Uuid,
    r: &CheckoutRequest,
) -> Result<OrderCreated, ApiError> {
    let mut tx = s.db.begin().await?;

    let ids: Vec<Uuid> = r.items.iter().map(|i| i.product_id).collect();
    let resolved: HashMap<Uuid, (Decimal, i32)> = inventory::resolve_products(&mut *tx, &ids)
        .await?
        .into_iter()
        .map(|(id, price, stock)| (id, (price, stock)))
        .collect();
    let (lines, subtotal) = plan_lines(&r.items, &resolved)?;

    let breakdown =
        calculate_totals(subtotal, r.discount_percentage, r.tax_percentage, r.service_fee);
    let order_id = Uuid::now_v7();
    let order_number = generate_order_number();

    sqlx::query(
        "INSERT INTO orders (id, order_number, client_id, admin_id, subtotal, discount_percentage, \
         discount_amount, service_fee, tax_percentage, tax_amount, grand_total, delivery_address, \
         delivery_date, notes, status, payment_status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'pending', 'pending', NOW(), NOW())",
    )
    .bind(order_id)
    .bind(&order_number)
    .bind(client_id)
    .bind(r.admin_id)
    .bind(breakdown.subtotal)
    .bind(breakdown.discount_percentage)
    .bind(breakdown.discount_amount)
    .bind(breakdown.service_fee)
    .bind(breakdown.tax_percentage)
    .bind(breakdown.tax_amount)
    .bind(breakdown.grand_total)
    .bind(&r.delivery_address)
    .bind(r.delivery_date)
    .bind(&r.notes)
    .execute(&mut *tx)
    .await
    .map_err(|e| if is_unique_violation(&e) { ApiError::Conflict } else { e.into() })?;

    for line in &lines {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price, subtotal) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::now_v7())
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.subtotal)
        .execute(&mut *tx)
        .await?;

        inventory::reserve(&mut *tx, line.product_id, line.quantity).await?;
    }

    // Leftover lines for other suppliers are kept either way.
    if s.config.clear_cart_on_checkout {
        sqlx::query(
            "DELETE FROM cart_items USING products \
             WHERE cart_items.product_id = products.id \
               AND cart_items.client_id = $1 AND products.admin_id = $2",
        )
        .bind(client_id)
        .bind(r.admin_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(OrderCreated { order_id, order_number, breakdown })
}

// =============================================================================
// Listings and detail
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderWithSupplier {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub order: Order,
    pub admin_name: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderItemDetail {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
    pub name: String,
    pub image_url: Option<String>,
    pub unit: String,
}

#[derive(Debug, Serialize)]
pub struct OrderPage<T: Serialize> {
    pub orders: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn parse_status_filter(status: &Option<String>) -> Result<Option<&'static str>, ApiError> {
    status
        .as_ref()
        .map(|v| OrderStatus::from_str(v).map(|s| s.as_str()))
        .transpose()
}

/// Buyer's own orders, newest first.
pub async fn list_mine(
    State(s): State<AppState>,
    actor: Actor,
    Query(p): Query<OrderListParams>,
) -> Result<Json<ApiResponse<OrderPage<OrderWithSupplier>>>, ApiError> {
    let status = parse_status_filter(&p.status)?;
    let limit = p.limit.unwrap_or(50).clamp(1, 100);
    let offset = p.offset.unwrap_or(0).max(0);

    let orders = sqlx::query_as::<_, OrderWithSupplier>(
        "SELECT o.*, u.name AS admin_name, u.company_name \
         FROM orders o LEFT JOIN users u ON o.admin_id = u.id \
         WHERE o.client_id = $1 AND ($2::text IS NULL OR o.status = $2) \
         ORDER BY o.created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(actor.id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE client_id = $1 AND ($2::text IS NULL OR status = $2)",
    )
    .bind(actor.id)
    .bind(status)
    .fetch_one(&s.db)
    .await?;

    Ok(ApiResponse::ok("Orders retrieved", OrderPage { orders, total, limit, offset }))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderWithClient {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub order: Order,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub client_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SupplierOrder {
    #[serde(flatten)]
    pub order: OrderWithClient,
    pub items: Vec<OrderItemDetail>,
}

/// Supplier's incoming orders, items included.
pub async fn list_supplier(
    State(s): State<AppState>,
    actor: Actor,
    Query(p): Query<OrderListParams>,
) -> Result<Json<ApiResponse<OrderPage<SupplierOrder>>>, ApiError> {
    actor.require_admin()?;
    let status = parse_status_filter(&p.status)?;
    let limit = p.limit.unwrap_or(50).clamp(1, 100);
    let offset = p.offset.unwrap_or(0).max(0);

    let orders = sqlx::query_as::<_, OrderWithClient>(
        "SELECT o.*, u.name AS client_name, u.phone AS client_phone, u.address AS client_address \
         FROM orders o LEFT JOIN users u ON o.client_id = u.id \
         WHERE o.admin_id = $1 AND ($2::text IS NULL OR o.status = $2) \
         ORDER BY o.created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(actor.id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE admin_id = $1 AND ($2::text IS NULL OR status = $2)",
    )
    .bind(actor.id)
    .bind(status)
    .fetch_one(&s.db)
    .await?;

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.order.id).collect();
    let mut items_by_order: HashMap<Uuid, Vec<OrderItemDetail>> = HashMap::new();
    for item in fetch_items(&s, &order_ids).await? {
        items_by_order.entry(item.order_id).or_default().push(item);
    }

    let orders = orders
        .into_iter()
        .map(|order| {
            let items = items_by_order.remove(&order.order.id).unwrap_or_default();
            SupplierOrder { order, items }
        })
        .collect();

    Ok(ApiResponse::ok("Supplier orders retrieved", OrderPage { orders, total, limit, offset }))
}

async fn fetch_items(s: &AppState, order_ids: &[Uuid]) -> Result<Vec<OrderItemDetail>, ApiError> {
    let items = sqlx::query_as::<_, OrderItemDetail>(
        "SELECT oi.*, p.name, p.image_url, p.unit \
         FROM order_items oi JOIN products p ON oi.product_id = p.id \
         WHERE oi.order_id = ANY($1)",
    )
    .bind(order_ids)
    .fetch_all(&s.db)
    .await?;
    Ok(items)
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderWithSupplier,
    pub items: Vec<OrderItemDetail>,
}

pub async fn get(
    State(s): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let order = sqlx::query_as::<_, OrderWithSupplier>(
        "SELECT o.*, u.name AS admin_name, u.company_name \
         FROM orders o LEFT JOIN users u ON o.admin_id = u.id WHERE o.id = $1",
    )
    .bind(order_id)
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound("Order"))?;
    order.order.authorize_view(&actor)?;

    let items = fetch_items(&s, &[order_id]).await?;
    Ok(ApiResponse::ok("Order details retrieved", OrderDetail { order, items }))
}

// =============================================================================
// Status and payment updates
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// A zero-row guarded status update means another writer moved the order
/// between our read and our write; the caller should retry against the
/// fresh status.
fn confirm_status_write(rows_affected: u64) -> Result<(), ApiError> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(ApiError::Conflict)
    }
}

#[derive(Debug, Serialize)]
pub struct StatusChanged {
    pub id: Uuid,
    pub status: OrderStatus,
}

pub async fn update_status(
    State(s): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(r): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<StatusChanged>>, ApiError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;

    let current = authorize_transition(&order, &actor, r.status)?;

    let mut tx = s.db.begin().await?;
    // The write only lands if the order is still in the status the decision
    // was made against; a concurrent transition makes this a no-op.
    let updated = sqlx::query(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3",
    )
    .bind(order_id)
    .bind(r.status.as_str())
    .bind(current.as_str())
    .execute(&mut *tx)
    .await?;
    confirm_status_write(updated.rows_affected())?;

    // Compensating restock is an explicit policy, not implied by the move.
    // It runs only when the guarded write above landed, so two racing cancels
    // cannot restock the same items twice.
    let rolled_back = matches!(r.status, OrderStatus::Rejected | OrderStatus::Cancelled);
    if rolled_back && s.config.restock_on_cancel {
        let items: Vec<(Uuid, i32)> =
            sqlx::query_as("SELECT product_id, quantity FROM order_items WHERE order_id = $1")
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await?;
        for (product_id, quantity) in items {
            inventory::restock(&mut *tx, product_id, quantity).await?;
        }
    }
    tx.commit().await?;

    tracing::info!(order_id = %order_id, from = %current, to = %r.status, "order status updated");
    s.events
        .publish(OrderEvent::StatusChanged {
            order_id,
            from: current.as_str().to_string(),
            to: r.status.as_str().to_string(),
        })
        .await;

    Ok(ApiResponse::ok(
        "Order status updated successfully",
        StatusChanged { id: order_id, status: r.status },
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

/// Payment status may be updated by either party of the order.
pub async fn update_payment(
    State(s): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(r): Json<UpdatePaymentRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;
    if actor.id != order.client_id && actor.id != order.admin_id {
        return Err(ApiError::Forbidden("Unauthorized to update this order"));
    }

    sqlx::query("UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1")
        .bind(order_id)
        .bind(r.payment_status.as_str())
        .execute(&s.db)
        .await?;

    Ok(ApiResponse::ok_empty("Order updated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn request(items: Vec<CheckoutItem>) -> CheckoutRequest {
        CheckoutRequest {
            admin_id: Uuid::new_v4(),
            items,
            discount_percentage: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
            service_fee: Decimal::ZERO,
            delivery_address: "Jl. Merdeka 1".into(),
            delivery_date: None,
            notes: None,
        }
    }

    #[test]
    fn test_checkout_requires_items() {
        assert!(validate(&request(vec![])).is_err());
        assert!(validate(&request(vec![CheckoutItem {
            product_id: Uuid::new_v4(),
            quantity: 1
        }]))
        .is_ok());
    }

    #[test]
    fn test_stale_status_write_is_conflict() {
        assert!(confirm_status_write(1).is_ok());
        let err = confirm_status_write(0).unwrap_err();
        assert!(matches!(err, ApiError::Conflict));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_order_number_shape() {
        let n = generate_order_number();
        let parts: Vec<&str> = n.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[2].len(), 3);
        assert!(parts[2].parse::<u16>().unwrap() < 1000);
    }

    #[test]
    fn test_check_rates_bounds() {
        let mut r = request(vec![CheckoutItem { product_id: Uuid::new_v4(), quantity: 1 }]);
        assert!(check_rates(&r).is_ok());
        r.discount_percentage = dec("100.01");
        assert!(check_rates(&r).is_err());
        r.discount_percentage = Decimal::ZERO;
        r.service_fee = dec("-1");
        assert!(check_rates(&r).is_err());
    }

    #[test]
    fn test_check_rates_rejects_bad_items() {
        let id = Uuid::new_v4();
        let r = request(vec![
            CheckoutItem { product_id: id, quantity: 1 },
            CheckoutItem { product_id: id, quantity: 2 },
        ]);
        assert!(matches!(check_rates(&r), Err(ApiError::InvalidRequest(_))));
        let r = request(vec![CheckoutItem { product_id: Uuid::new_v4(), quantity: 0 }]);
        assert!(matches!(check_rates(&r), Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn test_plan_lines_prices_live() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let resolved = HashMap::from([(a, (dec("10.00"), 5)), (b, (dec("5.00"), 2))]);
        let items = vec![
            CheckoutItem { product_id: a, quantity: 3 },
            CheckoutItem { product_id: b, quantity: 2 },
        ];
        let (lines, subtotal) = plan_lines(&items, &resolved).unwrap();
        assert_eq!(subtotal, dec("40.00"));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].unit_price, dec("10.00"));
        // Line subtotals add up to the order subtotal.
        let sum: Decimal = lines.iter().map(|l| l.subtotal).sum();
        assert_eq!(sum, subtotal);
    }

    #[test]
    fn test_plan_lines_rejects_wholesale() {
        let a = Uuid::new_v4();
        let resolved = HashMap::from([(a, (dec("10.00"), 5))]);
        let missing = Uuid::new_v4();
        let items = vec![
            CheckoutItem { product_id: a, quantity: 1 },
            CheckoutItem { product_id: missing, quantity: 1 },
        ];
        assert!(matches!(plan_lines(&items, &resolved), Err(ApiError::ProductNotFound(id)) if id == missing));

        let items = vec![CheckoutItem { product_id: a, quantity: 6 }];
        assert!(matches!(plan_lines(&items, &resolved), Err(ApiError::InsufficientStock(id)) if id == a));
    }

    #[test]
    fn test_status_filter_sanitized() {
        assert_eq!(parse_status_filter(&None).unwrap(), None);
        assert_eq!(parse_status_filter(&Some("shipped".into())).unwrap(), Some("shipped"));
        assert!(parse_status_filter(&Some("gibberish".into())).is_err());
    }

    #[test]
    fn test_checkout_example_totals() {
        // Worked example end to end through planning + pricing.
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let resolved = HashMap::from([(a, (dec("10.00"), 10)), (b, (dec("5.00"), 10))]);
        let items = vec![
            CheckoutItem { product_id: a, quantity: 3 },
            CheckoutItem { product_id: b, quantity: 2 },
        ];
        let (_, subtotal) = plan_lines(&items, &resolved).unwrap();
        let breakdown = calculate_totals(subtotal, dec("10"), dec("5"), dec("2"));
        assert_eq!(breakdown.discount_amount, dec("4.00"));
        assert_eq!(breakdown.tax_amount, dec("1.80"));
        assert_eq!(breakdown.grand_total, dec("39.80"));
    }
}
