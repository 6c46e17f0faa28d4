//! Parameterized SQL construction.
//!
//! Every builder returns a [`SqlQuery`]: PostgreSQL text with `$n`
//! placeholders plus the positional values to bind. Request values only ever
//! travel in `params`; the text is assembled from static fragments and the
//! allow-listed tokens produced by [`crate::validate`].

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{NewStation, StationUpdate};
use crate::validate::{ReadingFilter, SensorType, StationListing};

// ---

const STATION_COLUMNS: &str = "code, city, latitude, longitude, installation_date";
const READING_COLUMNS: &str = "sensor_id, station_code, date, type, measurement, unit";
const FORECAST_COLUMNS: &str = "date, station_code, type, measurement, unit";

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i32),
    BigInt(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Int(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::BigInt(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<SensorType> for SqlParam {
    fn from(v: SensorType) -> Self {
        SqlParam::Text(v.as_str().to_string())
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(v: NaiveDate) -> Self {
        SqlParam::Date(v)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(v: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(v)
    }
}

/// Query text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub text: String,
    pub params: Vec<SqlParam>,
}

impl SqlQuery {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Append a static fragment.
    fn push(&mut self, fragment: &str) -> &mut Self {
        self.text.push_str(fragment);
        self
    }

    /// Append the next placeholder and record its value.
    fn push_bind(&mut self, value: impl Into<SqlParam>) -> &mut Self {
        self.params.push(value.into());
        self.text.push('$');
        self.text.push_str(&self.params.len().to_string());
        self
    }
}

// ---

pub fn list_stations(listing: &StationListing) -> SqlQuery {
    // ---
    let mut q = SqlQuery::new(format!("SELECT {STATION_COLUMNS} FROM stations"));

    if let Some(city) = &listing.city {
        q.push(" WHERE city = ").push_bind(city.as_str());
    }

    q.push(" ORDER BY ")
        .push(listing.sort.column())
        .push(" ")
        .push(listing.order.as_sql());
    q.push(" LIMIT ")
        .push_bind(listing.pagination.limit())
        .push(" OFFSET ")
        .push_bind(listing.pagination.offset());

    debug!(
        "Built station listing query (page {}): {}",
        listing.pagination.page(),
        q.text
    );
    q
}

pub fn insert_station(station: &NewStation) -> SqlQuery {
    // ---
    let mut q = SqlQuery::new(
        "INSERT INTO stations (city, latitude, longitude, installation_date) VALUES (",
    );
    q.push_bind(station.city.as_str())
        .push(", ")
        .push_bind(station.latitude)
        .push(", ")
        .push_bind(station.longitude)
        .push(", ")
        .push_bind(station.installation_date)
        .push(") RETURNING ")
        .push(STATION_COLUMNS);
    q
}

/// Build `UPDATE stations SET ...` over exactly the fields present in `update`.
///
/// Columns are emitted in a fixed order. An update with no fields is rejected.
pub fn update_station(code: i32, update: &StationUpdate) -> ServiceResult<SqlQuery> {
    // ---
    let mut fields: Vec<(&'static str, SqlParam)> = Vec::new();

    if let Some(city) = &update.city {
        fields.push(("city", city.as_str().into()));
    }
    if let Some(latitude) = update.latitude {
        fields.push(("latitude", latitude.into()));
    }
    if let Some(longitude) = update.longitude {
        fields.push(("longitude", longitude.into()));
    }
    if let Some(date) = update.installation_date {
        fields.push(("installation_date", date.into()));
    }

    if fields.is_empty() {
        return Err(ServiceError::validation("No fields to update."));
    }

    let mut q = SqlQuery::new("UPDATE stations SET ");
    for (i, (column, value)) in fields.into_iter().enumerate() {
        if i > 0 {
            q.push(", ");
        }
        q.push(column).push(" = ").push_bind(value);
    }
    q.push(" WHERE code = ").push_bind(code);

    debug!("Built station update query: {}", q.text);
    Ok(q)
}

pub fn delete_station(code: i32) -> SqlQuery {
    // ---
    let mut q = SqlQuery::new("DELETE FROM stations WHERE code = ");
    q.push_bind(code);
    q
}

/// Insert one sensor reading. Shared by single and batch ingestion.
pub fn insert_reading(
    station_code: i32,
    sensor_id: &str,
    date: DateTime<Utc>,
    sensor_type: SensorType,
    measurement: f64,
    unit: &str,
) -> SqlQuery {
    // ---
    let mut q = SqlQuery::new(format!(
        "INSERT INTO sensors_data ({READING_COLUMNS}) VALUES ("
    ));
    q.push_bind(sensor_id)
        .push(", ")
        .push_bind(station_code)
        .push(", ")
        .push_bind(date)
        .push(", ")
        .push_bind(sensor_type)
        .push(", ")
        .push_bind(measurement)
        .push(", ")
        .push_bind(unit)
        .push(")");
    q
}

pub fn insert_forecast(
    station_code: i32,
    date: NaiveDate,
    sensor_type: SensorType,
    value: f64,
    unit: &str,
) -> SqlQuery {
    // ---
    let mut q = SqlQuery::new(format!(
        "INSERT INTO forecast ({FORECAST_COLUMNS}) VALUES ("
    ));
    q.push_bind(date)
        .push(", ")
        .push_bind(station_code)
        .push(", ")
        .push_bind(sensor_type)
        .push(", ")
        .push_bind(value)
        .push(", ")
        .push_bind(unit)
        .push(")");
    q
}

/// Forecast rows of `station_code` for `day`.
pub fn forecast_lookahead(station_code: i32, day: NaiveDate) -> SqlQuery {
    // ---
    let types = SensorType::ALL
        .iter()
        .map(|t| format!("'{}'", t.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut q = SqlQuery::new(format!(
        "SELECT {FORECAST_COLUMNS} FROM forecast WHERE station_code = "
    ));
    q.push_bind(station_code)
        .push(&format!(" AND type IN ({types}) AND date = "))
        .push_bind(day)
        .push(" ORDER BY type");
    q
}

/// Mean measurement per sensor type for one station.
pub fn readings_summary(station_code: i32) -> SqlQuery {
    // ---
    let mut q = SqlQuery::new(
        "SELECT type, AVG(measurement) AS average_value FROM sensors_data WHERE station_code = ",
    );
    q.push_bind(station_code).push(" GROUP BY type ORDER BY type");
    q
}

/// Paginated reading listing with inclusive day bounds.
///
/// `date_to` covers the whole day, so it is bound as the start of the next day
/// with a strict `<`.
pub fn readings_page(station_code: i32, filter: &ReadingFilter) -> ServiceResult<SqlQuery> {
    // ---
    let mut q = SqlQuery::new(format!(
        "SELECT {READING_COLUMNS} FROM sensors_data WHERE station_code = "
    ));
    q.push_bind(station_code);

    if let Some(from) = filter.date_from {
        q.push(" AND date >= ").push_bind(start_of_day(from));
    }
    if let Some(to) = filter.date_to {
        let next = to
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ServiceError::validation(format!("Invalid date_to {to}")))?;
        q.push(" AND date < ").push_bind(start_of_day(next));
    }
    if let Some(sensor_type) = filter.sensor_type {
        q.push(" AND type = ").push_bind(sensor_type);
    }

    q.push(" ORDER BY ")
        .push(filter.sort.column())
        .push(" ")
        .push(filter.order.as_sql());
    q.push(" LIMIT ")
        .push_bind(filter.pagination.limit())
        .push(" OFFSET ")
        .push_bind(filter.pagination.offset());

    debug!(
        "Built readings page query (page {}): {}",
        filter.pagination.page(),
        q.text
    );
    Ok(q)
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}
