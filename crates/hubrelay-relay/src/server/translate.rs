//! Peer response translation: status folding and header copy rules.

use axum::http::header::{CONTENT_TYPE, DATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};

/// The statuses the relay reports back to local callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    Ok,
    Created,
    BadRequest,
    NotFound,
    PreconditionFailed,
    InternalError,
}

impl RelayStatus {
    /// Fold a peer status into the recognized set. Anything unrecognized is `Ok`.
    pub const fn from_peer(status: u16) -> Self {
        match status {
            201 => Self::Created,
            400 => Self::BadRequest,
            404 => Self::NotFound,
            412 => Self::PreconditionFailed,
            500 => Self::InternalError,
            _ => Self::Ok,
        }
    }

    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Ok => StatusCode::OK,
            Self::Created => StatusCode::CREATED,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Peer headers split into what is copied and what is handled specially.
#[derive(Debug, Default)]
pub struct TranslatedHeaders {
    pub headers: HeaderMap,
    pub chunked: bool,
    pub content_type: Option<HeaderValue>,
}

/// Translate peer response headers.
///
/// `date` is dropped since the local server writes its own. Any header whose
/// value is exactly `chunked` switches the response to streaming instead of
/// being copied. `content-type` is returned separately.
pub fn translate_headers(peer: &HeaderMap) -> TranslatedHeaders {
    let mut out = TranslatedHeaders::default();
    for (name, value) in peer {
        if name == DATE {
            continue;
        }
        if value.as_bytes() == b"chunked" {
            out.chunked = true;
            continue;
        }
        if name == CONTENT_TYPE {
            out.content_type = Some(value.clone());
            continue;
        }
        out.headers.append(name.clone(), value.clone());
    }
    out
}
