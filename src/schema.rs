//! Database schema bootstrap for `meteo-stations`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the database schema if it is missing (idempotent).
///
/// Creates `stations`, `sensors_data` and `forecast`. Readings and forecasts
/// reference stations without `ON DELETE CASCADE`, so a station with
/// dependent rows cannot be deleted. Safe to call on every startup.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stations (
            code              SERIAL PRIMARY KEY,
            city              TEXT             NOT NULL,
            latitude          DOUBLE PRECISION NOT NULL,
            longitude         DOUBLE PRECISION NOT NULL,
            installation_date DATE             NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // A reading's identity is the full (sensor, station, time, type) tuple
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors_data (
            sensor_id    TEXT             NOT NULL,
            station_code INTEGER          NOT NULL REFERENCES stations (code),
            date         TIMESTAMPTZ      NOT NULL,
            type         TEXT             NOT NULL,
            measurement  DOUBLE PRECISION NOT NULL,
            unit         TEXT             NOT NULL,
            PRIMARY KEY (sensor_id, station_code, date, type)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS forecast (
            date         DATE             NOT NULL,
            station_code INTEGER          NOT NULL REFERENCES stations (code),
            type         TEXT             NOT NULL,
            measurement  DOUBLE PRECISION NOT NULL,
            unit         TEXT             NOT NULL,
            UNIQUE (station_code, date, type)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensors_data_station_date
            ON sensors_data (station_code, date);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_stations_city
            ON stations (city);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
