//! Inventory ledger.
//!
//! Stock is the only contended resource in the system; it is mutated solely
//! through the conditional decrement in [`reserve`], never by a read-then-write
//! pair. Racing reservations of the last unit leave exactly one winner; the
//! loser sees `InsufficientStock` and stock never goes negative (the schema
//! carries a `stock >= 0` CHECK as a backstop).
//!
//! Reads take any executor; [`reserve`] takes a connection so it can issue its
//! follow-up read, which is how it joins the checkout transaction.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub available: bool,
    pub current_stock: i32,
}

/// Advisory read of current stock against a requested quantity. Callers must
/// not treat a positive answer as a reservation.
pub async fn check_availability<'e, E>(
    db: E,
    product_id: Uuid,
    requested: i32,
) -> Result<Availability, ApiError>
where
    E: PgExecutor<'e>,
{
    let stock: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(db)
        .await?;
    let (current_stock,) = stock.ok_or(ApiError::ProductNotFound(product_id))?;
    Ok(Availability { available: requested <= current_stock, current_stock })
}

/// Atomically decrements stock, refusing to overdraw. The predicate and the
/// decrement are one statement; `rows_affected == 0` means the product is
/// missing or short on stock, distinguished with a follow-up read.
pub async fn reserve(
    conn: &mut sqlx::PgConnection,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ApiError> {
    let updated = sqlx::query(
        "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 1 {
        return Ok(());
    }
    let exists: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    match exists {
        Some(_) => Err(ApiError::InsufficientStock(product_id)),
        None => Err(ApiError::ProductNotFound(product_id)),
    }
}

/// Explicit compensating action: returns previously reserved stock. Used by
/// the restock-on-cancel policy; a status change alone never implies it.
pub async fn restock<'e, E>(db: E, product_id: Uuid, quantity: i32) -> Result<(), ApiError>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(db)
        .await?;
    Ok(())
}

/// Resolves a batch of product ids in one query, for checkout. The caller is
/// responsible for rejecting the request wholesale when any id is missing.
pub async fn resolve_products<'e, E>(
    db: E,
    ids: &[Uuid],
) -> Result<Vec<(Uuid, Decimal, i32)>, ApiError>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<(Uuid, Decimal, i32)> =
        sqlx::query_as("SELECT id, price, stock FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(db)
            .await?;
    Ok(rows)
}
