//! Forecast proxy for the BMKG public weather API.
//!
//! Responses are memoized in a [`TtlCache`] keyed by the lookup, so repeated
//! dashboard hits do not hammer the upstream. The provider payload is mapped
//! to a small stable shape instead of being passed through verbatim.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::cache::TtlCache;
use crate::error::ApiError;

const BMKG_BASE_URL: &str = "https://api.bmkg.go.id/publik/prakiraan-cuaca";

// Gambir, Jakarta Pusat; province-level lookups resolve to this ADM4 code.
const DEFAULT_ADM4: &str = "31.71.01.1001";

#[derive(Debug, Clone, Serialize)]
pub struct ForecastEntry {
    pub datetime: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub weather_desc: Option<String>,
    pub wind_speed: Option<f64>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastPayload {
    pub location: Value,
    pub current: Option<ForecastEntry>,
    pub forecast: Vec<ForecastEntry>,
    pub source: &'static str,
    pub cached: bool,
}

#[derive(Clone)]
pub struct WeatherService {
    http: reqwest::Client,
    cache: Arc<Mutex<TtlCache<String, ForecastPayload>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Province {
    pub id: &'static str,
    pub name: &'static str,
}

pub fn provinces() -> Vec<Province> {
    vec![Province { id: "31", name: "DKI Jakarta" }]
}

impl WeatherService {
    pub fn new(ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            cache: Arc::new(Mutex::new(TtlCache::new(ttl))),
        }
    }

    pub async fn by_province(&self, province: &str) -> Result<ForecastPayload, ApiError> {
        let key = format!("province_{province}");
        self.cached_fetch(key, &[("adm4", DEFAULT_ADM4)]).await
    }

    pub async fn by_coordinates(&self, lat: f64, lon: f64) -> Result<ForecastPayload, ApiError> {
        let key = format!("loc_{lat}_{lon}");
        let (lat, lon) = (lat.to_string(), lon.to_string());
        self.cached_fetch(key, &[("lat", lat.as_str()), ("lon", lon.as_str())]).await
    }

    async fn cached_fetch(
        &self,
        key: String,
        query: &[(&str, &str)],
    ) -> Result<ForecastPayload, ApiError> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(hit) = cache.get(&key) {
                let mut payload = hit.clone();
                payload.cached = true;
                return Ok(payload);
            }
        }

        let response = self
            .http
            .get(BMKG_BASE_URL)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "BMKG returned status {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        let payload = map_forecast(&body)?;
        let mut cache = self.cache.lock().await;
        cache.insert(key, payload.clone());
        Ok(payload)
    }
}

/// BMKG shape: `{ lokasi: {...}, data: [{ lokasi, cuaca: [[entry, ...], ...] }] }`,
/// one inner array per forecast day; the first entry of each is kept.
fn map_forecast(body: &Value) -> Result<ForecastPayload, ApiError> {
    let area = body
        .get("data")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .ok_or_else(|| ApiError::Upstream("BMKG returned no forecast data".into()))?;
    let location = body
        .get("lokasi")
        .or_else(|| area.get("lokasi"))
        .cloned()
        .unwrap_or(Value::Null);
    let slots = area
        .get("cuaca")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::Upstream("BMKG returned no cuaca array".into()))?;

    let forecast: Vec<ForecastEntry> = slots
        .iter()
        .filter_map(|slot| slot.as_array().and_then(|s| s.first()))
        .map(map_entry)
        .collect();
    let current = forecast.first().cloned();

    Ok(ForecastPayload { location, current, forecast, source: "BMKG", cached: false })
}

fn map_entry(entry: &Value) -> ForecastEntry {
    let text = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| entry.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    };
    let number = |key: &str| entry.get(key).and_then(Value::as_f64);

    ForecastEntry {
        datetime: text(&["local_datetime", "datetime"]),
        temperature: number("t"),
        humidity: number("hu"),
        precipitation: number("tp"),
        weather_desc: text(&["weather_desc"]),
        wind_speed: number("ws"),
        icon: text(&["image"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_forecast() {
        let body = json!({
            "lokasi": {"provinsi": "DKI Jakarta", "kotkab": "Jakarta Pusat"},
            "data": [{
                "cuaca": [
                    [{"local_datetime": "2025-01-01 07:00", "t": 28.0, "hu": 80.0, "weather_desc": "Cerah"}],
                    [{"local_datetime": "2025-01-02 07:00", "t": 30.5, "hu": 75.0, "weather_desc": "Hujan Ringan"}]
                ]
            }]
        });
        let payload = map_forecast(&body).unwrap();
        assert_eq!(payload.forecast.len(), 2);
        let current = payload.current.unwrap();
        assert_eq!(current.temperature, Some(28.0));
        assert_eq!(current.weather_desc.as_deref(), Some("Cerah"));
        assert_eq!(payload.location["provinsi"], "DKI Jakarta");
        assert!(!payload.cached);
    }

    #[test]
    fn test_map_forecast_rejects_empty() {
        assert!(map_forecast(&json!({"data": []})).is_err());
        assert!(map_forecast(&json!({"data": [{"lokasi": {}}]})).is_err());
    }
}
