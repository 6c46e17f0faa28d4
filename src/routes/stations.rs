// src/routes/stations.rs
//! Station endpoints: lifecycle, data retrieval, forecasts and batch ingest.
//!
//! Handlers decode the request, hand it to the core together with the shared
//! [`Scopes`], and map the outcome to a response. Errors turn into responses
//! through the `IntoResponse` impl in `app_error.rs`.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use super::extract::{AppJson, AppPath, AppQuery};
use crate::ingest::{self, BatchReport};
use crate::models::{
    BatchData, Message, NewStation, Station, StationDataRequest, StationForecast, StationQuery,
    StationUpdate,
};
use crate::stations;
use crate::{Scopes, ServiceError};

// ---

pub fn router() -> Router<Scopes> {
    // ---
    Router::new()
        .route("/api/stations", get(list_stations).post(create_station))
        .route("/api/stations/forecast", post(create_forecast))
        .route(
            "/api/stations/{code}",
            put(update_station)
                .delete(delete_station)
                .post(station_data),
        )
        .route("/api/stations/{code}/batch", post(receive_batch))
}

async fn list_stations(
    State(scopes): State<Scopes>,
    AppQuery(params): AppQuery<StationQuery>,
) -> Result<Json<Vec<Station>>, ServiceError> {
    // ---
    info!("GET /api/stations - {:?}", params);
    let stations = stations::list_stations(scopes.as_ref(), &params).await?;
    Ok(Json(stations))
}

async fn create_station(
    State(scopes): State<Scopes>,
    AppJson(station): AppJson<NewStation>,
) -> Result<(StatusCode, Json<Station>), ServiceError> {
    // ---
    info!("POST /api/stations - city {}", station.city);
    let created = stations::create_station(scopes.as_ref(), &station).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_station(
    State(scopes): State<Scopes>,
    AppPath(code): AppPath<i32>,
    AppJson(update): AppJson<StationUpdate>,
) -> Result<Json<Message>, ServiceError> {
    // ---
    info!("PUT /api/stations/{}", code);
    stations::update_station(scopes.as_ref(), code, &update).await?;
    Ok(Json(Message::new("Station updated")))
}

async fn delete_station(
    State(scopes): State<Scopes>,
    AppPath(code): AppPath<i32>,
) -> Result<Json<Message>, ServiceError> {
    // ---
    info!("DELETE /api/stations/{}", code);
    stations::delete_station(scopes.as_ref(), code).await?;
    Ok(Json(Message::new("Station deleted")))
}

/// `POST /api/stations/{code}`: forecast, summary or paginated readings.
async fn station_data(
    State(scopes): State<Scopes>,
    AppPath(code): AppPath<i32>,
    AppJson(request): AppJson<StationDataRequest>,
) -> Result<Json<Vec<Value>>, ServiceError> {
    // ---
    info!("POST /api/stations/{} - {:?}", code, request);
    let today = Utc::now().date_naive();
    let rows = stations::station_data(scopes.as_ref(), code, &request, today).await?;
    Ok(Json(rows))
}

async fn create_forecast(
    State(scopes): State<Scopes>,
    AppJson(submission): AppJson<StationForecast>,
) -> Result<(StatusCode, Json<StationForecast>), ServiceError> {
    // ---
    info!(
        "POST /api/stations/forecast - station {} on {}",
        submission.station_code, submission.date
    );
    stations::create_forecast(scopes.as_ref(), &submission).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn receive_batch(
    State(scopes): State<Scopes>,
    AppPath(code): AppPath<i32>,
    AppJson(batch): AppJson<BatchData>,
) -> Result<Json<BatchReport>, ServiceError> {
    // ---
    info!("POST /api/stations/{}/batch - {} items", code, batch.data.len());

    if batch.station_code != code {
        return Err(ServiceError::validation("Station code mismatch."));
    }

    let report = ingest::ingest_batch(scopes.as_ref(), code, &batch.data).await?;
    if !report.is_complete() {
        warn!(
            "Batch for station {} partially stored: {} of {} failed",
            code, report.failed, report.received
        );
    }
    Ok(Json(report))
}
