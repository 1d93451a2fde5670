/*
 *  client.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Weather acquisition over HTTP with schema validation
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::{DateTime, Utc};
use log::{info, warn};
use reqwest::{Client, header};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryPolicy;
use crate::snapshot::{Condition, FetchOutcome, Units, WeatherSnapshot};

/// Failure taxonomy for one acquisition attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("schema validation failed: {0}")]
    Schema(String),
}

impl FetchError {
    /// Transient failures are worth another attempt; a malformed body is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::HttpStatus(code) => *code == 429 || *code >= 500,
            FetchError::Schema(_) => false,
        }
    }

    /// Short machine-readable tag carried into `FetchOutcome::Unavailable`.
    pub fn reason(&self) -> String {
        match self {
            FetchError::Network(_) => "network".to_string(),
            FetchError::HttpStatus(code) => format!("http_status:{code}"),
            FetchError::Schema(_) => "schema".to_string(),
        }
    }
}

/// Identity of the place we report on.
#[derive(Debug, Clone)]
pub struct Place {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

// Open-Meteo current-conditions block. Every field here is required;
// a response missing one fails schema validation rather than crashing.
#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    weather_code: u16,
    surface_pressure: f64,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
    is_day: u8,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentBlock,
}

/// Parse and validate one response body into a snapshot. Out-of-range values
/// are schema failures, not silent clamps.
pub fn parse_current(
    body: &str,
    place: &Place,
    units: Units,
    fetched_at: DateTime<Utc>,
) -> Result<WeatherSnapshot, FetchError> {
    let parsed: ForecastResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Schema(e.to_string()))?;
    let cur = parsed.current;

    if !cur.temperature_2m.is_finite() || !(-100.0..=70.0).contains(&cur.temperature_2m) {
        return Err(FetchError::Schema(format!(
            "temperature out of range: {}",
            cur.temperature_2m
        )));
    }
    if !(0.0..=100.0).contains(&cur.relative_humidity_2m) {
        return Err(FetchError::Schema(format!(
            "humidity out of range: {}",
            cur.relative_humidity_2m
        )));
    }
    if !cur.surface_pressure.is_finite() || !(800.0..=1200.0).contains(&cur.surface_pressure) {
        return Err(FetchError::Schema(format!(
            "pressure out of range: {}",
            cur.surface_pressure
        )));
    }
    if !cur.wind_speed_10m.is_finite() || cur.wind_speed_10m < 0.0 {
        return Err(FetchError::Schema(format!(
            "wind speed out of range: {}",
            cur.wind_speed_10m
        )));
    }
    if !(0.0..=360.0).contains(&cur.wind_direction_10m) {
        return Err(FetchError::Schema(format!(
            "wind direction out of range: {}",
            cur.wind_direction_10m
        )));
    }

    Ok(WeatherSnapshot {
        fetched_at,
        location: place.name.clone(),
        latitude: place.latitude,
        longitude: place.longitude,
        units,
        temperature: cur.temperature_2m,
        apparent_temperature: cur.apparent_temperature,
        condition: Condition::from_wmo(cur.weather_code, cur.is_day == 1),
        humidity: cur.relative_humidity_2m.round() as u8,
        pressure_hpa: cur.surface_pressure,
        wind_speed: cur.wind_speed_10m,
        wind_direction_deg: (cur.wind_direction_10m.round() as u16) % 360,
    })
}

/// Something the scheduler can pull snapshots from. The production
/// implementation is `WeatherClient`; tests substitute a scripted source.
pub trait WeatherSource: Send {
    fn fetch(&mut self) -> impl Future<Output = FetchOutcome> + Send;
}

/// HTTP client against the Open-Meteo forecast endpoint. Expected network
/// failures never raise to the caller; they come back as a typed outcome.
/// The client does not touch the snapshot cache - the scheduler stays the
/// single writer of cached state.
#[derive(Debug)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    place: Place,
    units: Units,
    policy: RetryPolicy,
}

pub const DEFAULT_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,\
weather_code,surface_pressure,wind_speed_10m,wind_direction_10m,is_day";

impl WeatherClient {
    pub fn new(
        base_url: String,
        place: Place,
        units: Units,
        timeout: Duration,
        connect_timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, FetchError> {
        const AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(AGENT));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            place,
            units,
            policy,
        })
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        let (temp_unit, wind_unit) = match self.units {
            Units::Metric => ("celsius", "ms"),
            Units::Imperial => ("fahrenheit", "mph"),
        };
        vec![
            ("latitude", format!("{:.4}", self.place.latitude)),
            ("longitude", format!("{:.4}", self.place.longitude)),
            ("current", CURRENT_FIELDS.to_string()),
            ("temperature_unit", temp_unit.to_string()),
            ("wind_speed_unit", wind_unit.to_string()),
            ("timezone", "UTC".to_string()),
            ("forecast_days", "1".to_string()),
        ]
    }

    async fn attempt(&self) -> Result<WeatherSnapshot, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query_params())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        let body = response.text().await?;
        parse_current(&body, &self.place, self.units, Utc::now())
    }
}

impl WeatherSource for WeatherClient {
    /// One acquisition, retries included. Never panics, never raises for an
    /// expected failure - the scheduler branches on the returned outcome.
    async fn fetch(&mut self) -> FetchOutcome {
        info!("fetching current conditions for {}", self.place.name);
        let result = self
            .policy
            .run(|| self.attempt(), FetchError::is_retryable)
            .await;
        match result {
            Ok(snapshot) => {
                info!(
                    "fetched {} {:.1}{} ({})",
                    snapshot.location,
                    snapshot.temperature,
                    snapshot.units.temperature_suffix(),
                    snapshot.condition
                );
                FetchOutcome::Fresh(snapshot)
            }
            Err(e) => {
                warn!("weather fetch failed: {e}");
                FetchOutcome::Unavailable(e.reason())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_BODY: &str = r#"{
        "latitude": 54.3, "longitude": 13.1,
        "current": {
            "time": "2026-02-11T09:00",
            "temperature_2m": 5.0,
            "relative_humidity_2m": 80,
            "apparent_temperature": 2.4,
            "weather_code": 61,
            "surface_pressure": 1005.0,
            "wind_speed_10m": 4.0,
            "wind_direction_10m": 270.0,
            "is_day": 1
        }
    }"#;

    fn place() -> Place {
        Place {
            name: "Stralsund".to_string(),
            latitude: 54.3091,
            longitude: 13.0818,
        }
    }

    #[test]
    fn parses_valid_body() {
        let snap = parse_current(VALID_BODY, &place(), Units::Metric, Utc::now()).unwrap();
        assert_eq!(snap.condition, Condition::Rain);
        assert_eq!(snap.humidity, 80);
        assert_eq!(snap.wind_direction_deg, 270);
        assert_eq!(snap.wind_compass(), "W");
        assert!((snap.temperature - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_field_is_schema_failure() {
        let body = r#"{"current": {"temperature_2m": 5.0}}"#;
        let err = parse_current(body, &place(), Units::Metric, Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));
        assert_eq!(err.reason(), "schema");
    }

    #[test]
    fn out_of_range_humidity_rejected() {
        let body = VALID_BODY.replace("\"relative_humidity_2m\": 80", "\"relative_humidity_2m\": 150");
        let err = parse_current(&body, &place(), Units::Metric, Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));
    }

    #[test]
    fn out_of_range_wind_direction_rejected() {
        let body = VALID_BODY.replace("\"wind_direction_10m\": 270.0", "\"wind_direction_10m\": 421.0");
        assert!(parse_current(&body, &place(), Units::Metric, Utc::now()).is_err());
    }

    #[test]
    fn unknown_code_normalizes_not_errors() {
        let body = VALID_BODY.replace("\"weather_code\": 61", "\"weather_code\": 1234");
        let snap = parse_current(&body, &place(), Units::Metric, Utc::now()).unwrap();
        assert_eq!(snap.condition, Condition::Unknown);
    }

    #[tokio::test]
    async fn transport_failure_maps_to_network_after_retries() {
        // discard port; nothing listens there, so every attempt dies at
        // connect and the retry budget drains
        let mut client = WeatherClient::new(
            "http://127.0.0.1:9".to_string(),
            place(),
            Units::Metric,
            Duration::from_millis(500),
            Duration::from_millis(250),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
        )
        .unwrap();
        let outcome = client.fetch().await;
        assert_eq!(outcome, FetchOutcome::Unavailable("network".to_string()));
    }

    #[test]
    fn retryability_classification() {
        assert!(FetchError::HttpStatus(503).is_retryable());
        assert!(FetchError::HttpStatus(429).is_retryable());
        assert!(!FetchError::HttpStatus(404).is_retryable());
        assert!(!FetchError::Schema("bad".into()).is_retryable());
        assert_eq!(FetchError::HttpStatus(503).reason(), "http_status:503");
    }
}
