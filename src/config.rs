//! Environment-driven configuration.

use anyhow::Context;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub nats_url: Option<String>,
    /// Restock order items when an order is rejected or cancelled.
    pub restock_on_cancel: bool,
    /// Clear the ordered supplier's cart lines as part of checkout.
    pub clear_cart_on_checkout: bool,
    pub weather_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("PORT must be a number")?,
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET is required")?,
            nats_url: std::env::var("NATS_URL").ok(),
            restock_on_cancel: env_flag("RESTOCK_ON_CANCEL"),
            clear_cart_on_checkout: env_flag("CLEAR_CART_ON_CHECKOUT"),
            weather_cache_ttl: Duration::from_secs(
                std::env::var("WEATHER_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            ),
        })
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}
