//! Inbound body extraction.
//!
//! `PUT` bodies are read whole. `POST` bodies yield the first multipart field
//! when the caller sent `multipart/form-data`, the raw body otherwise. Other
//! methods carry no body. Size limits come from the router's
//! `DefaultBodyLimit` layer.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode};
use tracing::debug;

use crate::error::RelayError;

/// Prefix for body failures that have no more specific status.
pub const INTERNAL_ERROR_PREFIX: &str = "SERVER INTERNAL ERROR: ";

pub async fn extract_body(request: Request) -> Result<Option<String>, RelayError> {
    let method = request.method().clone();
    match method {
        Method::PUT => read_text(request).await.map(Some),
        Method::POST if is_multipart(request.headers()) => first_multipart_field(request).await,
        Method::POST => read_text(request).await.map(Some),
        _ => Ok(None),
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.get(..19)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/form-data"))
        })
}

async fn read_text(request: Request) -> Result<String, RelayError> {
    let bytes = Bytes::from_request(request, &())
        .await
        .map_err(|rejection| RelayError::BodyParse {
            status: rejection.status(),
            message: rejection.body_text(),
        })?;
    String::from_utf8(bytes.to_vec()).map_err(|e| internal(&e))
}

async fn first_multipart_field(request: Request) -> Result<Option<String>, RelayError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| RelayError::BodyParse {
            status: rejection.status(),
            message: rejection.body_text(),
        })?;

    let field = multipart.next_field().await.map_err(|e| RelayError::BodyParse {
        status: e.status(),
        message: e.body_text(),
    })?;
    let Some(field) = field else {
        debug!("Multipart body has no fields");
        return Ok(None);
    };

    let name = field.name().map(str::to_string);
    let text = field.text().await.map_err(|e| RelayError::BodyParse {
        status: e.status(),
        message: e.body_text(),
    })?;
    debug!(field = ?name, len = text.len(), "Took first multipart field");
    Ok(Some(text))
}

fn internal(e: &dyn std::error::Error) -> RelayError {
    RelayError::BodyParse {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("{INTERNAL_ERROR_PREFIX}{e}"),
    }
}
