//! AgriLink Backend
//!
//! Marketplace backend connecting agricultural suppliers ("admin") and buyers
//! ("client") over PostgreSQL.
//!
//! ## Features
//! - Product catalog
//! - Shopping cart with live stock validation
//! - Checkout: cart-to-order transition in a single transaction
//! - Order status state machine with role-based authorization
//! - Weather-lookup proxy with TTL caching

use std::sync::Arc;

pub mod auth;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod extract;
pub mod inventory;
pub mod pricing;
pub mod routes;
pub mod weather;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<config::Config>,
    pub events: events::EventPublisher,
    pub weather: weather::WeatherService,
}
