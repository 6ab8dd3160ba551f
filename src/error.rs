//! Error taxonomy and the uniform response envelope.
//!
//! Every handler returns `Result<_, ApiError>`; the envelope is always
//! `{"success": bool, "message": string, "data": T | null}`.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Insufficient stock for product {0}")]
    InsufficientStock(Uuid),

    // Lost race on a guarded write: order-number collision (retried
    // internally) or a status update against a stale read.
    #[error("Conflicting write, please retry")]
    Conflict,

    #[error("Weather service unavailable: {0}")]
    Upstream(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::ProductNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock(_) | Self::Conflict => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            // Persistence details stay in the logs.
            Self::Database(e) => {
                tracing::error!(error = %e, "database error");
                "Internal server error".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> crate::extract::Json<Self> {
        crate::extract::Json(Self { success: true, message: message.into(), data: Some(data) })
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None }
    }
}

impl ApiResponse<()> {
    pub fn ok_empty(message: impl Into<String>) -> crate::extract::Json<Self> {
        crate::extract::Json(Self { success: true, message: message.into(), data: None })
    }
}

/// Maps validator output to a single `InvalidRequest`.
pub fn validate<T: validator::Validate>(value: &T) -> Result<(), ApiError> {
    value
        .validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string().replace('\n', "; ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthenticated("No token provided").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("Access denied").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("Order").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::ProductNotFound(Uuid::nil()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::InsufficientStock(Uuid::nil()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Database(sqlx::Error::RowNotFound).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_messages() {
        assert_eq!(ApiError::NotFound("Order").to_string(), "Order not found");
        let id = Uuid::nil();
        assert_eq!(
            ApiError::InsufficientStock(id).to_string(),
            format!("Insufficient stock for product {id}")
        );
    }
}
