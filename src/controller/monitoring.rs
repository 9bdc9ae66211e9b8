//! Liveness route used by load balancers and the CLI smoke test.

use axum::{response::Response, routing::get};
use serde::Serialize;

use super::{format, routes::Routes};
use crate::Result;

/// Represents the health status of the application.
#[derive(Serialize)]
pub struct Health {
    pub ok: bool,
}

/// Check application health endpoint
///
/// # Errors
/// This function always returns `Ok` with a JSON response indicating the
/// process is up.
pub async fn health() -> Result<Response> {
    format::json(Health { ok: true })
}

pub fn routes() -> Routes {
    Routes::new().add("/_health", get(health))
}
