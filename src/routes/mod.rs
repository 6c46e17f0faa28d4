use axum::Router;

use crate::Scopes;

mod app_error;
mod extract;
mod health;
mod sensors;
mod stations;

// ---

pub fn router(scopes: Scopes) -> Router {
    // ---
    Router::new()
        .merge(stations::router())
        .merge(sensors::router())
        .merge(health::router())
        .with_state(scopes)
}
