// src/routes/extract.rs
//! Extractors whose rejections become [`ServiceError::Validation`], so a body,
//! query or path that fails to decode is answered like any other bad request.

use axum::extract::{FromRequest, FromRequestParts};

use crate::ServiceError;

// ---

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServiceError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServiceError))]
pub struct AppPath<T>(pub T);
