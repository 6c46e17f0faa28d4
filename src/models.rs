//! Request and response models for stations, sensor readings and forecasts.
//!
//! Fields that select query structure (`sort`, `sort_order`, `type`) arrive as
//! plain strings and are checked by [`crate::validate`] before any query is
//! built, so a bad value surfaces as a validation error rather than a decode
//! failure.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---

/// Read an RFC 3339 timestamp, or one without an offset, which is taken as UTC.
fn utc_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

/// A stored weather station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    // ---
    pub code: i32,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub installation_date: NaiveDate,
}

/// Body of a station creation request; the store assigns the code.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStation {
    // ---
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub installation_date: NaiveDate,
}

/// Partial station update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationUpdate {
    // ---
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub installation_date: Option<NaiveDate>,
}

/// Query parameters for `GET /api/stations`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationQuery {
    // ---
    pub city: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// One of `code`, `installation_date` (default `code`).
    pub sort: Option<String>,
    /// `ASC` or `DESC` (default `ASC`).
    pub sort_order: Option<String>,
}

/// Body of a station data retrieval request.
///
/// `forecast` takes precedence over `summary`; with neither set the remaining
/// fields describe a paginated listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationDataRequest {
    // ---
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub sensor_type: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// One of `date`, `type` (default `date`).
    pub sort: Option<String>,
    pub sort_order: Option<String>,
    #[serde(default)]
    pub forecast: bool,
    #[serde(default)]
    pub summary: bool,
}

/// A single sensor reading submitted on its own.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorReadingInput {
    // ---
    pub sensor_id: String,
    pub station_code: i32,
    #[serde(deserialize_with = "utc_timestamp")]
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub measurement: f64,
    pub unit: String,
}

/// One reading inside a batch; the station comes from the batch.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorData {
    // ---
    pub sensor_id: String,
    #[serde(deserialize_with = "utc_timestamp")]
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub measurement: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchData {
    // ---
    pub station_code: i32,
    pub data: Vec<SensorData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    // ---
    pub value: f64,
    /// e.g. `m/s`, `%`, `Celsius`
    pub unit: String,
}

/// Forecast components; each one present becomes a forecast row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastData {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind: Option<Measurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<Measurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Measurement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationForecast {
    // ---
    pub date: NaiveDate,
    pub station_code: i32,
    pub forecast: ForecastData,
}

/// Plain `{"message": ...}` acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
