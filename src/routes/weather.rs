//! Weather proxy endpoints. Public, like the catalog reads.

use axum::extract::State;

use crate::error::{ApiError, ApiResponse};
use crate::extract::{Json, Path};
use crate::weather::{provinces, ForecastPayload, Province};
use crate::AppState;

pub async fn by_province(
    State(s): State<AppState>,
    Path(province): Path<String>,
) -> Result<Json<ApiResponse<ForecastPayload>>, ApiError> {
    let payload = s.weather.by_province(&province).await?;
    let message = if payload.cached {
        "Weather data retrieved (cached)"
    } else {
        "Weather data retrieved"
    };
    Ok(ApiResponse::ok(message, payload))
}

pub async fn by_location(
    State(s): State<AppState>,
    Path((lat, lon)): Path<(f64, f64)>,
) -> Result<Json<ApiResponse<ForecastPayload>>, ApiError> {
    let payload = s.weather.by_coordinates(lat, lon).await?;
    let message = if payload.cached {
        "Weather data retrieved (cached)"
    } else {
        "Weather data retrieved"
    };
    Ok(ApiResponse::ok(message, payload))
}

pub async fn provinces_list() -> Json<ApiResponse<Vec<Province>>> {
    ApiResponse::ok("Provinces retrieved", provinces())
}
