//! Station lifecycle, station data retrieval and forecast submission.
//!
//! Each operation validates its input, builds its queries, then runs them in a
//! single connection scope that is committed only when everything succeeded.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    Measurement, NewStation, Station, StationDataRequest, StationForecast, StationQuery,
    StationUpdate,
};
use crate::query;
use crate::retrieval::Retrieval;
use crate::store::{ScopeFactory, StoreError};
use crate::validate::{SensorType, StationListing};

// ---

pub async fn list_stations(
    scopes: &dyn ScopeFactory,
    params: &StationQuery,
) -> ServiceResult<Vec<Station>> {
    // ---
    let listing = StationListing::from_query(params)?;
    let select = query::list_stations(&listing);

    let mut scope = scopes.acquire().await?;
    let rows = scope.fetch_json(&select).await?;
    scope.commit().await?;

    let stations = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Station>, _>>()
        .map_err(StoreError::from)?;

    debug!("Listed {} stations", stations.len());
    Ok(stations)
}

/// Insert a station and return it with its assigned code.
pub async fn create_station(
    scopes: &dyn ScopeFactory,
    station: &NewStation,
) -> ServiceResult<Station> {
    // ---
    let insert = query::insert_station(station);

    let mut scope = scopes.acquire().await?;
    let rows = match scope.fetch_json(&insert).await {
        Ok(rows) => rows,
        Err(StoreError::UniqueViolation(cause)) => {
            debug!("Duplicate station: {}", cause);
            return Err(ServiceError::Conflict(format!(
                "Station in '{}' at ({}, {}) already exists",
                station.city, station.latitude, station.longitude
            )));
        }
        Err(err) => return Err(err.into()),
    };

    let created: Station = rows
        .into_iter()
        .next()
        .map(serde_json::from_value)
        .transpose()
        .map_err(StoreError::from)?
        .ok_or_else(|| {
            StoreError::Database(sqlx::Error::Protocol("insert returned no row".into()))
        })?;
    scope.commit().await?;

    info!("Created station {} in {}", created.code, created.city);
    Ok(created)
}

pub async fn update_station(
    scopes: &dyn ScopeFactory,
    code: i32,
    update: &StationUpdate,
) -> ServiceResult<()> {
    // ---
    let statement = query::update_station(code, update)?;

    let mut scope = scopes.acquire().await?;
    let affected = scope.execute(&statement).await?;
    if affected == 0 {
        return Err(ServiceError::NotFound(format!("Station {code} not found")));
    }
    scope.commit().await?;

    info!("Updated station {}", code);
    Ok(())
}

/// Delete a station. Fails with [`ServiceError::Integrity`] while readings or
/// forecasts still reference it.
pub async fn delete_station(scopes: &dyn ScopeFactory, code: i32) -> ServiceResult<()> {
    // ---
    let statement = query::delete_station(code);

    let mut scope = scopes.acquire().await?;
    let affected = match scope.execute(&statement).await {
        Ok(affected) => affected,
        Err(StoreError::ForeignKeyViolation(cause)) => {
            debug!("Delete of station {} blocked: {}", code, cause);
            return Err(ServiceError::Integrity(
                "Cannot delete station: associated records exist in other tables.".to_string(),
            ));
        }
        Err(err) => return Err(err.into()),
    };
    if affected == 0 {
        return Err(ServiceError::NotFound(format!("Station {code} not found")));
    }
    scope.commit().await?;

    info!("Deleted station {}", code);
    Ok(())
}

/// Forecast, summary or paginated readings for a station, per [`Retrieval::select`].
pub async fn station_data(
    scopes: &dyn ScopeFactory,
    station_code: i32,
    request: &StationDataRequest,
    today: NaiveDate,
) -> ServiceResult<Vec<Value>> {
    // ---
    let retrieval = Retrieval::select(request, today)?;
    let select = retrieval.to_query(station_code)?;

    let mut scope = scopes.acquire().await?;
    let rows = scope.fetch_json(&select).await?;
    scope.commit().await?;

    debug!(
        "Station {} {} retrieval returned {} rows",
        station_code,
        retrieval.name(),
        rows.len()
    );
    Ok(rows)
}

/// Store one forecast row per component present in the submission.
///
/// All rows of one submission are written in the same scope, so either every
/// component is stored or none is.
pub async fn create_forecast(
    scopes: &dyn ScopeFactory,
    submission: &StationForecast,
) -> ServiceResult<()> {
    // ---
    let components: Vec<(SensorType, &Measurement)> = [
        (SensorType::Wind, submission.forecast.wind.as_ref()),
        (SensorType::Humidity, submission.forecast.humidity.as_ref()),
        (SensorType::Temperature, submission.forecast.temperature.as_ref()),
    ]
    .into_iter()
    .filter_map(|(t, m)| m.map(|m| (t, m)))
    .collect();

    if components.is_empty() {
        return Err(ServiceError::validation(
            "Forecast must contain at least one of wind, humidity or temperature",
        ));
    }

    let mut scope = scopes.acquire().await?;
    for (sensor_type, measurement) in &components {
        let insert = query::insert_forecast(
            submission.station_code,
            submission.date,
            *sensor_type,
            measurement.value,
            &measurement.unit,
        );

        match scope.execute(&insert).await {
            Ok(_) => {}
            Err(StoreError::UniqueViolation(cause)) => {
                debug!("Duplicate forecast: {}", cause);
                return Err(ServiceError::Conflict(format!(
                    "A {} forecast for station {} on {} already exists",
                    sensor_type.as_str(),
                    submission.station_code,
                    submission.date
                )));
            }
            Err(StoreError::ForeignKeyViolation(cause)) => {
                debug!("Forecast for unknown station: {}", cause);
                return Err(ServiceError::Integrity(format!(
                    "Station {} does not exist",
                    submission.station_code
                )));
            }
            Err(err) => return Err(err.into()),
        }
    }
    scope.commit().await?;

    info!(
        "Stored {} forecast components for station {} on {}",
        components.len(),
        submission.station_code,
        submission.date
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::ForecastData;
    use crate::query::SqlParam;
    use crate::store::testing::MockStore;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
    }

    #[tokio::test]
    async fn test_list_stations_decodes_rows() {
        // ---
        let store = MockStore::new().with_rows(vec![json!({
            "code": 1,
            "city": "Oslo",
            "latitude": 59.9,
            "longitude": 10.7,
            "installation_date": "2024-08-15"
        })]);

        let scopes = store.scopes();
        let stations = assert_ok!(list_stations(scopes.as_ref(), &StationQuery::default()).await);

        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].city, "Oslo");
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn test_list_stations_invalid_sort_never_reaches_store() {
        // ---
        let store = MockStore::new();
        let params = StationQuery {
            sort: Some("code; DROP TABLE stations".into()),
            ..Default::default()
        };

        let err = assert_err!(list_stations(store.scopes().as_ref(), &params).await);

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(store.acquired(), 0);
        assert!(store.attempted().is_empty());
    }

    #[tokio::test]
    async fn test_create_station_returns_assigned_code() {
        // ---
        let store = MockStore::new().with_rows(vec![json!({
            "code": 42,
            "city": "Bergen",
            "latitude": 60.4,
            "longitude": 5.3,
            "installation_date": "2024-01-01"
        })]);
        let station = NewStation {
            city: "Bergen".into(),
            latitude: 60.4,
            longitude: 5.3,
            installation_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };

        let created = assert_ok!(create_station(store.scopes().as_ref(), &station).await);

        assert_eq!(created.code, 42);
        assert_eq!(store.committed().len(), 1);
    }

    #[tokio::test]
    async fn test_create_station_duplicate_is_conflict() {
        // ---
        let store = MockStore::new()
            .fail_when(|_| Some(StoreError::UniqueViolation("stations_pkey".into())));
        let station = NewStation {
            city: "Bergen".into(),
            latitude: 60.4,
            longitude: 5.3,
            installation_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };

        let err = assert_err!(create_station(store.scopes().as_ref(), &station).await);
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_empty_rejected_before_store() {
        // ---
        let store = MockStore::new();

        let scopes = store.scopes();
        let err = assert_err!(update_station(scopes.as_ref(), 1, &StationUpdate::default()).await);

        assert!(matches!(err, ServiceError::Validation(ref m) if m == "No fields to update."));
        assert_eq!(store.acquired(), 0);
    }

    #[tokio::test]
    async fn test_update_single_field() {
        // ---
        let store = MockStore::new();
        let update = StationUpdate {
            city: Some("Trondheim".into()),
            ..Default::default()
        };

        assert_ok!(update_station(store.scopes().as_ref(), 8, &update).await);

        let committed = store.committed();
        assert_eq!(committed[0].text, "UPDATE stations SET city = $1 WHERE code = $2");
    }

    #[tokio::test]
    async fn test_update_missing_station_is_not_found() {
        // ---
        let store = MockStore::new().with_affected(0);
        let update = StationUpdate {
            longitude: Some(1.0),
            ..Default::default()
        };

        let err = assert_err!(update_station(store.scopes().as_ref(), 404, &update).await);

        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(store.committed().is_empty());
        assert_eq!(store.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_delete_with_dependents_is_integrity_error() {
        // ---
        let store = MockStore::new().fail_when(|q| {
            q.text
                .starts_with("DELETE FROM stations")
                .then(|| StoreError::ForeignKeyViolation("sensors_data_station_code_fkey".into()))
        });

        let err = assert_err!(delete_station(store.scopes().as_ref(), 3).await);

        assert!(matches!(err, ServiceError::Integrity(_)));
        // Nothing committed: the station row stays
        assert!(store.committed().is_empty());
        assert_eq!(store.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_delete_station_commits() {
        // ---
        let store = MockStore::new();

        assert_ok!(delete_station(store.scopes().as_ref(), 3).await);

        assert_eq!(store.committed()[0].params, vec![SqlParam::Int(3)]);
    }

    #[tokio::test]
    async fn test_station_data_summary() {
        // ---
        let store = MockStore::new().with_rows(vec![
            json!({ "type": "humidity", "average_value": 55.0 }),
            json!({ "type": "temperature", "average_value": 18.25 }),
        ]);
        let request = StationDataRequest {
            summary: true,
            page: Some(3),
            ..Default::default()
        };

        let rows = assert_ok!(station_data(store.scopes().as_ref(), 7, &request, today()).await);

        assert_eq!(rows.len(), 2);
        let attempted = store.attempted();
        assert!(attempted[0].text.contains("GROUP BY type"));
        assert_eq!(attempted[0].params, vec![SqlParam::Int(7)]);
    }

    #[tokio::test]
    async fn test_station_data_forecast_is_tomorrow() {
        // ---
        let store = MockStore::new();
        let request = StationDataRequest {
            forecast: true,
            date_from: NaiveDate::from_ymd_opt(2023, 5, 5),
            ..Default::default()
        };

        assert_ok!(station_data(store.scopes().as_ref(), 2, &request, today()).await);

        let tomorrow = NaiveDate::from_ymd_opt(2024, 10, 16).unwrap();
        assert_eq!(store.attempted()[0].params[1], SqlParam::Date(tomorrow));
    }

    fn forecast(data: ForecastData) -> StationForecast {
        StationForecast {
            date: NaiveDate::from_ymd_opt(2024, 10, 16).unwrap(),
            station_code: 1,
            forecast: data,
        }
    }

    fn measurement(value: f64, unit: &str) -> Option<Measurement> {
        Some(Measurement {
            value,
            unit: unit.to_string(),
        })
    }

    #[tokio::test]
    async fn test_forecast_one_row_per_component() {
        // ---
        let store = MockStore::new();
        let submission = forecast(ForecastData {
            wind: measurement(11.0, "m/s"),
            humidity: None,
            temperature: measurement(25.0, "Celsius"),
        });

        assert_ok!(create_forecast(store.scopes().as_ref(), &submission).await);

        let committed = store.committed();
        assert_eq!(committed.len(), 2);
        assert_eq!(committed[0].params[2], SqlParam::Text("wind".into()));
        assert_eq!(committed[1].params[2], SqlParam::Text("temperature".into()));
    }

    #[tokio::test]
    async fn test_forecast_without_components_rejected() {
        // ---
        let store = MockStore::new();

        let empty = forecast(ForecastData::default());
        let err = assert_err!(create_forecast(store.scopes().as_ref(), &empty).await);

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(store.acquired(), 0);
    }

    #[tokio::test]
    async fn test_forecast_is_all_or_nothing() {
        // ---
        let store = MockStore::new().fail_when(|q| {
            (q.params.get(2) == Some(&SqlParam::Text("humidity".into())))
                .then(|| StoreError::UniqueViolation("forecast_unique".into()))
        });
        let submission = forecast(ForecastData {
            wind: measurement(3.0, "m/s"),
            humidity: measurement(70.0, "%"),
            temperature: measurement(12.0, "Celsius"),
        });

        let err = assert_err!(create_forecast(store.scopes().as_ref(), &submission).await);

        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(store.committed().is_empty());
    }

    #[tokio::test]
    async fn test_forecast_unknown_station_is_integrity() {
        // ---
        let store = MockStore::new().fail_when(|_| {
            Some(StoreError::ForeignKeyViolation("forecast_station_code_fkey".into()))
        });
        let submission = forecast(ForecastData {
            wind: measurement(5.0, "m/s"),
            ..Default::default()
        });

        let err = assert_err!(create_forecast(store.scopes().as_ref(), &submission).await);

        assert!(matches!(err, ServiceError::Integrity(ref m) if m == "Station 1 does not exist"));
        assert!(store.committed().is_empty());
        assert_eq!(store.rollbacks(), 1);
    }
}
