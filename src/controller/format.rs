//! Response builders used by controllers.

use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{controller::Json, Result};

/// Returns a JSON response.
///
/// # Errors
///
/// Currently this function doesn't return any error. It returns a `Result` to
/// keep handler signatures uniform.
pub fn json<T: Serialize>(t: T) -> Result<Response> {
    Ok(Json(t).into_response())
}

/// Returns `bytes` as a downloadable attachment named `filename`.
///
/// # Errors
///
/// Returns an error when the media type or file name is not a valid header
/// value.
pub fn attachment(media_type: &str, filename: &str, bytes: Vec<u8>) -> Result<Response> {
    let content_type = HeaderValue::from_str(media_type)
        .map_err(|err| crate::Error::Message(err.to_string()))?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename={filename}"))
        .map_err(|err| crate::Error::Message(err.to_string()))?;

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}
