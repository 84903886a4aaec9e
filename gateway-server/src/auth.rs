// gateway-server/src/auth.rs
// ============================================================================
// Module: Gateway Authn/Authz
// Description: Authentication enforcement for the adapter and operator
// HTTP surfaces (§4.10, §6).
// Purpose: Provide strict, fail-closed auth for every handler; every
// decision is audited.
// Dependencies: gateway-core, serde, thiserror
// ============================================================================

//! ## Overview
//! The adapter surface is gated by a signed `X-Adapter-Token`; the
//! operator surface is gated by a shared `X-Ops-Api-Key`. Both fail
//! closed: a missing, malformed, or expired credential is always
//! `Unauthenticated`, never silently treated as a low-privilege caller.

use std::collections::BTreeSet;

use gateway_core::ids::AdapterId;
use gateway_core::ids::TenantId;
use gateway_core::ids::WorkspaceId;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::token::TokenError;
use crate::token::verify_token;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication or authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or invalid authentication.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Caller is authenticated but not authorized.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        Self::Unauthenticated(err.to_string())
    }
}

// ============================================================================
// SECTION: Adapter Token Claims
// ============================================================================

/// Claims carried by a signed adapter token (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterTokenClaims {
    /// Discriminant for this token kind.
    pub typ: String,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// The adapter this token is scoped to.
    pub adapter_id: AdapterId,
    /// Capability names this adapter is permitted to request.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Issued-at timestamp (Unix seconds).
    pub iat: i64,
    /// Expiry timestamp (Unix seconds), or `None` for a non-expiring
    /// token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// The expected `typ` value for an adapter token.
pub const ADAPTER_TOKEN_TYPE: &str = "adapter_token";

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// The authenticated caller for an adapter-surface request.
#[derive(Debug, Clone)]
pub struct AdapterAuthContext {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// The authenticated adapter.
    pub adapter_id: AdapterId,
    /// Capabilities this adapter's token is scoped to.
    pub capabilities: BTreeSet<String>,
}

/// The authenticated caller for an operator-surface request. Carries no
/// identity beyond "possessed the configured key" — the gateway is
/// single-tenant and does not model per-operator RBAC.
#[derive(Debug, Clone, Copy)]
pub struct OpsAuthContext;

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verifies an adapter token against `secret`, rejecting a wrong `typ` or
/// an expiry in the past.
///
/// # Errors
///
/// Returns [`AuthError::Unauthenticated`] if the token is missing,
/// malformed, incorrectly signed, of the wrong type, or expired.
pub fn authorize_adapter(
    secret: &[u8],
    token_header: Option<&str>,
    now_millis: i64,
) -> Result<AdapterAuthContext, AuthError> {
    let token = token_header
        .ok_or_else(|| AuthError::Unauthenticated("missing X-Adapter-Token".to_string()))?;
    let claims: AdapterTokenClaims = verify_token(secret, token)?;
    if claims.typ != ADAPTER_TOKEN_TYPE {
        return Err(AuthError::Unauthenticated("wrong token type".to_string()));
    }
    if let Some(exp) = claims.exp {
        let exp_millis = exp.saturating_mul(1000);
        if now_millis >= exp_millis {
            return Err(AuthError::Unauthenticated("adapter token expired".to_string()));
        }
    }
    Ok(AdapterAuthContext {
        tenant_id: claims.tenant_id,
        workspace_id: claims.workspace_id,
        adapter_id: claims.adapter_id,
        capabilities: claims.capabilities,
    })
}

/// Verifies an `X-Ops-Api-Key` header against the configured key. When no
/// key is configured, the operator surface is open (local single-tenant
/// deployments only) and this always succeeds.
///
/// # Errors
///
/// Returns [`AuthError::Unauthenticated`] if a key is configured and the
/// header is missing or does not match.
pub fn authorize_ops(configured_key: Option<&str>, header: Option<&str>) -> Result<OpsAuthContext, AuthError> {
    let Some(configured) = configured_key else {
        return Ok(OpsAuthContext);
    };
    let presented = header.ok_or_else(|| AuthError::Unauthenticated("missing X-Ops-Api-Key".to_string()))?;
    if !constant_time_eq(configured.as_bytes(), presented.as_bytes()) {
        return Err(AuthError::Unauthenticated("invalid X-Ops-Api-Key".to_string()));
    }
    Ok(OpsAuthContext)
}

/// Compares two byte slices in constant time with respect to their
/// contents (length is not secret).
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::sign_token;

    fn claims() -> AdapterTokenClaims {
        AdapterTokenClaims {
            typ: ADAPTER_TOKEN_TYPE.to_string(),
            tenant_id: TenantId::new("local"),
            workspace_id: WorkspaceId::new("ws-1"),
            adapter_id: AdapterId::new("claude-code"),
            capabilities: BTreeSet::from(["fs_read".to_string()]),
            iat: 0,
            exp: Some(1_000),
        }
    }

    #[test]
    fn valid_token_authenticates() {
        let token = sign_token(b"adapter-secret-value", &claims()).expect("sign");
        let ctx = authorize_adapter(b"adapter-secret-value", Some(&token), 0).expect("authorize");
        assert_eq!(ctx.adapter_id, AdapterId::new("claude-code"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign_token(b"adapter-secret-value", &claims()).expect("sign");
        let result = authorize_adapter(b"adapter-secret-value", Some(&token), 1_000_000);
        assert!(matches!(result, Err(AuthError::Unauthenticated(_))));
    }

    #[test]
    fn missing_token_is_rejected() {
        let result = authorize_adapter(b"adapter-secret-value", None, 0);
        assert!(matches!(result, Err(AuthError::Unauthenticated(_))));
    }

    #[test]
    fn ops_surface_open_when_unconfigured() {
        assert!(authorize_ops(None, None).is_ok());
    }

    #[test]
    fn ops_surface_rejects_wrong_key() {
        let result = authorize_ops(Some("correct-key"), Some("wrong-key"));
        assert!(matches!(result, Err(AuthError::Unauthenticated(_))));
    }

    #[test]
    fn ops_surface_accepts_matching_key() {
        assert!(authorize_ops(Some("correct-key"), Some("correct-key")).is_ok());
    }
}
