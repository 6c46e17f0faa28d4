// src/routes/sensors.rs
//! Single sensor reading submission.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::info;

use super::extract::AppJson;
use crate::ingest;
use crate::models::{Message, SensorReadingInput};
use crate::{Scopes, ServiceError};

// ---

pub fn router() -> Router<Scopes> {
    // ---
    Router::new().route("/api/sensor/reading", post(create_reading))
}

async fn create_reading(
    State(scopes): State<Scopes>,
    AppJson(reading): AppJson<SensorReadingInput>,
) -> Result<(StatusCode, Json<Message>), ServiceError> {
    // ---
    info!(
        "POST /api/sensor/reading - sensor {} station {}",
        reading.sensor_id, reading.station_code
    );
    ingest::create_reading(scopes.as_ref(), &reading).await?;
    Ok((
        StatusCode::CREATED,
        Json(Message::new("Sensor reading created successfully")),
    ))
}
