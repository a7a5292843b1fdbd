//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Command bodies reuse the engine's input types (`MilestoneInput`,
//! `TrustActivityInput`, ...) directly; only the envelopes live here.

use axum::http::StatusCode;
use rapport_core::{OrganizationId, RapportError};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Standard `{success, data, error}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Error class: `constraint`, `referential`, `integrity`, `storage` or `request`.
    pub error_kind: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    pub fn error(kind: &str, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            error_kind: Some(kind.to_string()),
        }
    }

    /// Envelope for an engine error.
    pub fn from_error(err: &RapportError) -> Self {
        Self::error(err.kind().as_str(), err.to_string())
    }
}

/// HTTP status for an engine error.
///
/// Duplicates and inactive progressions conflict with current state (409);
/// bad field values are unprocessable (422); dangling references are 404;
/// integrity and storage failures are 500.
pub fn status_for(err: &RapportError) -> StatusCode {
    match err {
        RapportError::DuplicateMilestone { .. }
        | RapportError::DuplicateCommunicationPeriod { .. }
        | RapportError::ProgressionInactive(_) => StatusCode::CONFLICT,
        RapportError::OutOfRange { .. }
        | RapportError::InvalidEnum { .. }
        | RapportError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RapportError::ProgressionNotFound(_)
        | RapportError::InteractionNotFound(_)
        | RapportError::ContactNotEngaged(_) => StatusCode::NOT_FOUND,
        RapportError::InvariantViolation(_)
        | RapportError::SerializationError(_)
        | RapportError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// `POST /progressions` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    pub organization_id: OrganizationId,
}

// =============================================================================
// EXPORT / HASH RESPONSES
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8], checksum: u64) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            checksum: Some(checksum),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            error: Some(msg.into()),
        }
    }
}

/// BLAKE3 hash of the canonical export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    pub success: bool,
    pub hash: Option<String>,
    pub algorithm: String,
    pub error: Option<String>,
}

impl HashResponse {
    pub fn success(hash: String) -> Self {
        Self {
            success: true,
            hash: Some(hash),
            algorithm: "blake3".to_string(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            hash: None,
            algorithm: "blake3".to_string(),
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
