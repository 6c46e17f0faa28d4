//! Sensor reading ingestion, single and batch.
//!
//! A batch runs in one connection scope, but each row is inserted in its own
//! savepoint ([`ConnectionScope::execute_isolated`]). A failing row is rolled
//! back alone, counted, logged, and iteration moves on; the scope commits at
//! the end so every row that succeeded is kept. Callers see partial success in
//! the returned [`BatchReport`].

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::models::{SensorData, SensorReadingInput};
use crate::query;
use crate::store::{ConnectionScope, ScopeFactory, StoreError};
use crate::validate::SensorType;

// ---

/// Why a batch item was not stored. Raw store messages are logged, not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Duplicate,
    UnknownStation,
    StoreError,
}

impl From<&StoreError> for FailureReason {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_) => FailureReason::Duplicate,
            StoreError::ForeignKeyViolation(_) => FailureReason::UnknownStation,
            _ => FailureReason::StoreError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Inserted { index: usize },
    Failed { index: usize, reason: FailureReason },
}

/// Result of a batch ingest, outcomes in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub message: String,
    pub received: usize,
    pub inserted: usize,
    pub failed: usize,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    fn from_outcomes(outcomes: Vec<ItemOutcome>) -> Self {
        // ---
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Failed { .. }))
            .count();
        let received = outcomes.len();
        let message = if failed > 0 {
            format!("{failed} errors occurred, please check the logs")
        } else {
            "Batch data created successfully".to_string()
        };

        Self {
            message,
            received,
            inserted: received - failed,
            failed,
            outcomes,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Insert one reading. Duplicates and unknown stations map to typed errors.
pub async fn create_reading(
    scopes: &dyn ScopeFactory,
    reading: &SensorReadingInput,
) -> ServiceResult<()> {
    // ---
    let sensor_type: SensorType = reading.sensor_type.parse()?;
    let insert = query::insert_reading(
        reading.station_code,
        &reading.sensor_id,
        reading.date,
        sensor_type,
        reading.measurement,
        &reading.unit,
    );

    let mut scope = scopes.acquire().await?;
    match scope.execute(&insert).await {
        Ok(_) => {}
        Err(StoreError::UniqueViolation(cause)) => {
            debug!("Duplicate sensor reading: {}", cause);
            return Err(ServiceError::Conflict(format!(
                "Reading from sensor '{}' at {} already exists",
                reading.sensor_id, reading.date
            )));
        }
        Err(StoreError::ForeignKeyViolation(cause)) => {
            debug!("Reading for unknown station: {}", cause);
            return Err(ServiceError::Integrity(format!(
                "Station {} does not exist",
                reading.station_code
            )));
        }
        Err(err) => return Err(err.into()),
    }
    scope.commit().await?;

    info!(
        "Stored {} reading from sensor {} for station {}",
        sensor_type.as_str(),
        reading.sensor_id,
        reading.station_code
    );
    Ok(())
}

/// Ingest `items` for `station_code`, isolating failures per item.
///
/// Sensor types are checked for the whole batch before the store is touched;
/// one invalid type rejects the request.
pub async fn ingest_batch(
    scopes: &dyn ScopeFactory,
    station_code: i32,
    items: &[SensorData],
) -> ServiceResult<BatchReport> {
    // ---
    let types = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.sensor_type.parse::<SensorType>().map_err(|e| {
                ServiceError::validation(format!("Item {i}: {e}"))
            })
        })
        .collect::<ServiceResult<Vec<_>>>()?;

    let mut scope = scopes.acquire().await?;
    let outcomes = insert_each(scope.as_mut(), station_code, items, &types).await;
    scope.commit().await?;

    let report = BatchReport::from_outcomes(outcomes);
    info!(
        "Batch for station {}: {} received, {} inserted, {} failed",
        station_code, report.received, report.inserted, report.failed
    );
    Ok(report)
}

async fn insert_each(
    scope: &mut dyn ConnectionScope,
    station_code: i32,
    items: &[SensorData],
    types: &[SensorType],
) -> Vec<ItemOutcome> {
    // ---
    let mut outcomes = Vec::with_capacity(items.len());

    for (index, (item, sensor_type)) in items.iter().zip(types).enumerate() {
        let insert = query::insert_reading(
            station_code,
            &item.sensor_id,
            item.date,
            *sensor_type,
            item.measurement,
            &item.unit,
        );

        match scope.execute_isolated(&insert).await {
            Ok(_) => outcomes.push(ItemOutcome::Inserted { index }),
            Err(err) => {
                warn!(
                    "Error inserting sensor data #{} (sensor {}, {} at {}): {}",
                    index,
                    item.sensor_id,
                    sensor_type.as_str(),
                    item.date,
                    err
                );
                outcomes.push(ItemOutcome::Failed {
                    index,
                    reason: FailureReason::from(&err),
                });
            }
        }
    }

    outcomes
}
