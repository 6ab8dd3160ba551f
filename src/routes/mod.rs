//! HTTP surface: route table and shared handler helpers.

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::extract::Json;
use crate::AppState;

pub mod cart;
pub mod orders;
pub mod products;
pub mod weather;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/categories/list", get(products::categories))
        .route(
            "/api/products/:product_id",
            get(products::get).put(products::update).delete(products::remove),
        )
        .route("/api/cart", get(cart::list).delete(cart::clear))
        .route("/api/cart/add", post(cart::add))
        .route("/api/cart/:cart_item_id", put(cart::update).delete(cart::remove))
        .route("/api/orders", get(orders::list_mine).post(orders::checkout))
        .route("/api/orders/supplier/list", get(orders::list_supplier))
        .route("/api/orders/:order_id", get(orders::get))
        .route("/api/orders/:order_id/status", patch(orders::update_status))
        .route("/api/orders/:order_id/payment", patch(orders::update_payment))
        .route("/api/weather/province/:province", get(weather::by_province))
        .route("/api/weather/location/:lat/:lon", get(weather::by_location))
        .route("/api/weather/provinces/list", get(weather::provinces_list))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "agrilink-backend"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, Role};
    use crate::config::Config;
    use crate::events::EventPublisher;
    use crate::weather::WeatherService;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    // The pool is lazy, so requests that fail before touching a handler never
    // need a live database.
    fn test_state() -> AppState {
        let config = Config {
            database_url: "postgres://postgres@localhost:1/agrilink_test".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
            nats_url: None,
            restock_on_cancel: false,
            clear_cart_on_checkout: false,
            weather_cache_ttl: Duration::from_secs(60),
        };
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        AppState {
            db,
            config: Arc::new(config),
            events: EventPublisher::disabled(),
            weather: WeatherService::new(Duration::from_secs(60)),
        }
    }

    fn token(role: Role) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            role,
            exp: chrono::Utc::now().timestamp() + 600,
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_body_keeps_envelope() {
        let app = router(test_state());
        let res = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/orders")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Client)))
                    .header(header::CONTENT_TYPE, "application/json")
                    // admin_id and delivery_address missing
                    .body(Body::from(r#"{"items": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let v = body_json(res).await;
        assert_eq!(v["success"], false);
        assert!(v["data"].is_null());
        assert!(v["message"].is_string());
    }

    #[tokio::test]
    async fn test_bad_path_segment_keeps_envelope() {
        let app = router(test_state());
        let res = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/orders/not-a-uuid")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Client)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let v = body_json(res).await;
        assert_eq!(v["success"], false);
    }

    #[tokio::test]
    async fn test_missing_token_keeps_envelope() {
        let app = router(test_state());
        let res = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/cart")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let v = body_json(res).await;
        assert_eq!(v["success"], false);
        assert_eq!(v["message"], "No token provided");
    }
}
