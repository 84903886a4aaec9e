// gateway-server/src/error.rs
// ============================================================================
// Module: Gateway Errors
// Description: The server-level error taxonomy (§7) and its mapping onto
// HTTP status codes.
// Purpose: Give every HTTP handler one error type to return via `?`,
// with `IntoResponse` doing the status-code translation in one place.
// Dependencies: axum, gateway-core, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! Validation and policy-conflict errors are reported to callers verbatim
//! with a stable `code` string; internal errors are logged with context
//! and surfaced as an opaque 500. Nothing here ever maps an ambiguous
//! failure to 200 — fail-closed is enforced by construction: there is no
//! `GatewayError` variant that serializes to an "allow" response.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use gateway_core::StoreError;
use serde::Serialize;

use crate::approval::ApprovalError;
use crate::auth::AuthError;
use crate::token::TokenError;

// ============================================================================
// SECTION: Error
// ============================================================================

/// The server-level error taxonomy (§7).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed request, unknown field combination, or bad token.
    #[error("validation error: {0}")]
    Validation(String),
    /// Missing or invalid authentication.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Authenticated but not authorized for this action.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Double-resolve, token reuse, or an otherwise-conflicting state
    /// transition.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The referenced decision, adapter, or policy does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Storage or hashing failure with no safe partial state to report.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Backend(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated(msg) => Self::Unauthenticated(msg),
            AuthError::Unauthorized(msg) => Self::Unauthorized(msg),
        }
    }
}

impl From<TokenError> for GatewayError {
    fn from(err: TokenError) -> Self {
        Self::Unauthenticated(err.to_string())
    }
}

impl From<ApprovalError> for GatewayError {
    fn from(err: ApprovalError) -> Self {
        match err {
            ApprovalError::Store(inner) => inner.into(),
            ApprovalError::Conflict(msg) => Self::Conflict(msg),
            ApprovalError::NotFound(msg) => Self::NotFound(msg),
            ApprovalError::Token(inner) => inner.into(),
        }
    }
}

// ============================================================================
// SECTION: HTTP Mapping
// ============================================================================

/// Wire shape of an error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable, machine-readable error code.
    code: &'static str,
    /// Human-readable message. Internal errors never leak detail here.
    message: String,
}

impl GatewayError {
    /// The stable error code surfaced to callers.
    const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Unauthorized(_) => "unauthorized",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// The HTTP status this error maps to (§7).
    const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if matches!(self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal error");
            ErrorBody { code: self.code(), message: "internal error".to_string() }
        } else {
            tracing::warn!(error = %self, "request rejected");
            ErrorBody { code: self.code(), message: self.to_string() }
        };
        (status, Json(body)).into_response()
    }
}
