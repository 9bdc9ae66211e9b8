//! HTTP adapter around the pipeline.
//!
//! Controllers expose `Routes` and return [`crate::Result`]. Errors are turned
//! into JSON bodies carrying the failure kind and the pipeline stage:
//!
//! ```json
//! { "error": "inconsistent_ontology", "stage": "reason", "description": "..." }
//! ```

pub mod format;
pub mod inference;
pub mod monitoring;
mod routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
pub use axum::Json;
use serde::Serialize;

pub use routes::{AppRoutes, Routes};

use crate::{
    errors::Error,
    pipeline::{ErrorKind, Stage},
};

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub description: String,
}

fn status_of(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Connectivity | ErrorKind::Protocol => StatusCode::BAD_GATEWAY,
        ErrorKind::InconsistentOntology => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Resource | ErrorKind::Reasoner | ErrorKind::Query => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::Pipeline(err) => (
                status_of(err.kind()),
                ErrorDetail {
                    error: err.kind().to_string(),
                    stage: Some(err.stage()),
                    description: err.to_string(),
                },
            ),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    error: "bad_request".to_string(),
                    stage: None,
                    description: message.clone(),
                },
            ),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    error: "not_found".to_string(),
                    stage: None,
                    description: "Resource was not found".to_string(),
                },
            ),
            _ => {
                tracing::error!(err.msg = %self, err.detail = ?self, "controller_error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetail {
                        error: "internal_server_error".to_string(),
                        stage: None,
                        description: self.to_string(),
                    },
                )
            }
        };
        (status, Json(detail)).into_response()
    }
}
