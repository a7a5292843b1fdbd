//! # Authentication Module
//!
//! Bearer API key authentication for the Rapport HTTP API.
//!
//! When `[security] api_key` (or `RAPPORT_API_KEY`) is set, every route
//! except `/health` requires:
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```
//!
//! A raw `<your-api-key>` header value is accepted as well.

use super::types::ApiResponse;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// The expected key, shared by every request.
#[derive(Clone)]
pub struct ApiKey(pub Arc<str>);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

/// Compare keys in constant time.
///
/// Both sides are padded to the same length so the comparison always
/// covers the same number of bytes; the length check comes after.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    let len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; len];
    let mut padded_expected = vec![0u8; len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

fn unauthorized(reason: &'static str) -> Response {
    tracing::warn!(event = "auth_failure", reason, "authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error("request", "Unauthorized")),
    )
        .into_response()
}

/// API key authentication middleware.
pub async fn api_key_auth_middleware(
    State(expected): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Load balancer checks stay open.
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let Some(header_value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return unauthorized("missing_authorization_header");
    };

    let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
    if provided.is_empty() || !keys_match(provided, &expected.0) {
        return unauthorized("invalid_api_key");
    }

    next.run(request).await
}

// =============================================================================
// TESTS
// =============================================================================
