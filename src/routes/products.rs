//! Product catalog. Writes are gated to the admin role and the owning
//! supplier; reads are public.

use axum::{extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::Actor;
use crate::domain::Product;
use crate::error::{validate, ApiError, ApiResponse};
use crate::extract::{Json, Path, Query};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub admin_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProductWithSupplier {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub product: Product,
    pub admin_name: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductWithSupplier>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<ApiResponse<ProductPage>>, ApiError> {
    let limit = p.limit.unwrap_or(50).clamp(1, 100);
    let offset = p.offset.unwrap_or(0).max(0);
    let search = p.search.as_ref().map(|t| format!("%{t}%"));

    let products = sqlx::query_as::<_, ProductWithSupplier>(
        "SELECT p.*, u.name AS admin_name, u.company_name \
         FROM products p LEFT JOIN users u ON p.admin_id = u.id \
         WHERE p.is_available = TRUE \
           AND ($1::text IS NULL OR p.category = $1) \
           AND ($2::text IS NULL OR p.name ILIKE $2) \
           AND ($3::uuid IS NULL OR p.admin_id = $3) \
         ORDER BY p.created_at DESC LIMIT $4 OFFSET $5",
    )
    .bind(&p.category)
    .bind(&search)
    .bind(p.admin_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products \
         WHERE is_available = TRUE \
           AND ($1::text IS NULL OR category = $1) \
           AND ($2::text IS NULL OR name ILIKE $2) \
           AND ($3::uuid IS NULL OR admin_id = $3)",
    )
    .bind(&p.category)
    .bind(&search)
    .bind(p.admin_id)
    .fetch_one(&s.db)
    .await?;

    Ok(ApiResponse::ok(
        "Products retrieved",
        ProductPage { products, total, limit, offset },
    ))
}

pub async fn categories(State(s): State<AppState>) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT category FROM products ORDER BY category")
            .fetch_all(&s.db)
            .await?;
    let categories = rows.into_iter().map(|(c,)| c).collect();
    Ok(ApiResponse::ok("Categories retrieved", categories))
}

pub async fn get(
    State(s): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductWithSupplier>>, ApiError> {
    let product = sqlx::query_as::<_, ProductWithSupplier>(
        "SELECT p.*, u.name AS admin_name, u.company_name \
         FROM products p LEFT JOIN users u ON p.admin_id = u.id WHERE p.id = $1",
    )
    .bind(product_id)
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound("Product"))?;
    Ok(ApiResponse::ok("Product details retrieved", product))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[validate(length(min = 1, message = "unit is required"))]
    pub unit: String,
    pub image_url: Option<String>,
}

fn check_amounts(price: Decimal, stock: i32) -> Result<(), ApiError> {
    if price < Decimal::ZERO {
        return Err(ApiError::InvalidRequest("price must not be negative".into()));
    }
    if stock < 0 {
        return Err(ApiError::InvalidRequest("stock must not be negative".into()));
    }
    Ok(())
}

pub async fn create(
    State(s): State<AppState>,
    actor: Actor,
    Json(r): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), ApiError> {
    actor.require_admin()?;
    validate(&r)?;
    check_amounts(r.price, r.stock)?;

    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, admin_id, category, name, description, price, stock, unit, image_url, is_available, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE, NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(actor.id)
    .bind(&r.category)
    .bind(&r.name)
    .bind(&r.description)
    .bind(r.price)
    .bind(r.stock)
    .bind(&r.unit)
    .bind(&r.image_url)
    .fetch_one(&s.db)
    .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok("Product created successfully", product)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[validate(length(min = 1, message = "unit is required"))]
    pub unit: String,
    pub image_url: Option<String>,
    pub is_available: Option<bool>,
}

async fn owned_by(s: &AppState, product_id: Uuid, actor: &Actor) -> Result<Product, ApiError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;
    if product.admin_id != actor.id {
        return Err(ApiError::Forbidden("Unauthorized to update this product"));
    }
    Ok(product)
}

pub async fn update(
    State(s): State<AppState>,
    actor: Actor,
    Path(product_id): Path<Uuid>,
    Json(r): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    actor.require_admin()?;
    validate(&r)?;
    check_amounts(r.price, r.stock)?;
    let existing = owned_by(&s, product_id, &actor).await?;

    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET category = $2, name = $3, description = $4, price = $5, stock = $6, \
         unit = $7, image_url = $8, is_available = $9, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(product_id)
    .bind(&r.category)
    .bind(&r.name)
    .bind(&r.description)
    .bind(r.price)
    .bind(r.stock)
    .bind(&r.unit)
    .bind(r.image_url.as_ref().or(existing.image_url.as_ref()))
    .bind(r.is_available.unwrap_or(true))
    .fetch_one(&s.db)
    .await?;

    Ok(ApiResponse::ok("Product updated successfully", product))
}

/// Soft delete: the row stays so historical order items keep resolving.
pub async fn remove(
    State(s): State<AppState>,
    actor: Actor,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    actor.require_admin()?;
    owned_by(&s, product_id, &actor).await?;
    sqlx::query("UPDATE products SET is_available = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(product_id)
        .execute(&s.db)
        .await?;
    Ok(ApiResponse::ok_empty("Product deleted successfully"))
}
