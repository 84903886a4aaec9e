// gateway-server/src/token.rs
// ============================================================================
// Module: Signed Tokens
// Description: Compact HMAC-SHA256 signed tokens for adapter
// authentication and decision-token issuance (§4.8, §6).
// Purpose: A single generic sign/verify primitive shared by both token
// kinds, so the only difference between them is their claims shape.
// Dependencies: base64, hmac, sha2, serde, serde_json
// ============================================================================

//! ## Overview
//! A token is `base64url(claims_json) + "." + base64url(hmac_sha256(claims_json))`.
//! This mirrors the compact-serialization shape of a JWT without pulling in
//! a JWT library: the spec calls for HMAC-SHA256 over a shared secret, not
//! JOSE header negotiation, so the minimal construction is the right one.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gateway_core::ids::AdapterId;
use gateway_core::ids::DecisionId;
use gateway_core::ids::ExecutionId;
use gateway_core::ids::TenantId;
use gateway_core::ids::WorkspaceId;
use gateway_core::model::GrantedScope;
use hmac::Hmac;
use hmac::Mac;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use thiserror::Error;

/// HMAC-SHA256 keyed on a runtime secret.
type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Decision Token Claims
// ============================================================================

/// Claims carried by a signed decision token (§4.8, §6): binds `{tenant,
/// workspace, adapter, execution_id, decision_id, granted_scope}` with a
/// unique `jti` and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTokenClaims {
    /// Discriminant for this token kind, always `"decision_token"`.
    pub typ: String,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// The adapter this decision was made for.
    pub adapter_id: AdapterId,
    /// The execution this decision governs.
    pub execution_id: ExecutionId,
    /// The decision record this token resolves.
    pub decision_id: DecisionId,
    /// The capability grant this token carries.
    pub granted_scope: GrantedScope,
    /// Issued-at timestamp (Unix seconds).
    pub iat: i64,
    /// Expiry timestamp (Unix seconds).
    pub exp: i64,
    /// Unique token identifier, single-use via
    /// [`gateway_core::GovernanceStore::mark_decision_token_used`].
    pub jti: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while signing or verifying a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The claims could not be serialized.
    #[error("failed to encode token claims: {0}")]
    Encode(String),
    /// The token string was not two dot-separated base64url segments.
    #[error("malformed token")]
    Malformed,
    /// The signature segment did not decode or did not verify.
    #[error("invalid token signature")]
    InvalidSignature,
    /// The claims segment did not decode to the expected shape.
    #[error("failed to decode token claims: {0}")]
    Decode(String),
    /// The HMAC key was rejected (e.g. empty).
    #[error("invalid signing key")]
    InvalidKey,
}

// ============================================================================
// SECTION: Sign / Verify
// ============================================================================

/// Signs `claims` as a compact `claims.signature` token using HMAC-SHA256
/// over `secret`.
///
/// # Errors
///
/// Returns [`TokenError::Encode`] if `claims` cannot be serialized, or
/// [`TokenError::InvalidKey`] if `secret` is rejected by the HMAC
/// constructor.
pub fn sign_token<T: Serialize>(secret: &[u8], claims: &T) -> Result<String, TokenError> {
    let payload = serde_json::to_vec(claims).map_err(|err| TokenError::Encode(err.to_string()))?;
    let encoded_payload = URL_SAFE_NO_PAD.encode(&payload);
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(encoded_payload.as_bytes());
    let signature = mac.finalize().into_bytes();
    let encoded_signature = URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{encoded_payload}.{encoded_signature}"))
}

/// Verifies `token` against `secret` and decodes its claims. Rejects any
/// signature mismatch before attempting to decode the claims, so a forged
/// token never reaches the deserializer.
///
/// # Errors
///
/// Returns [`TokenError::Malformed`] if the token is not two
/// dot-separated segments, [`TokenError::InvalidSignature`] if the
/// signature does not verify, or [`TokenError::Decode`] if the verified
/// claims do not match the expected shape.
pub fn verify_token<T: DeserializeOwned>(secret: &[u8], token: &str) -> Result<T, TokenError> {
    let (encoded_payload, encoded_signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
    if encoded_payload.is_empty() || encoded_signature.is_empty() {
        return Err(TokenError::Malformed);
    }
    let signature = URL_SAFE_NO_PAD.decode(encoded_signature).map_err(|_| TokenError::Malformed)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(encoded_payload.as_bytes());
    mac.verify_slice(&signature).map_err(|_| TokenError::InvalidSignature)?;
    let payload = URL_SAFE_NO_PAD.decode(encoded_payload).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&payload).map_err(|err| TokenError::Decode(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Claims {
        sub: String,
        exp: i64,
    }

    #[test]
    fn round_trips_through_sign_and_verify() {
        let claims = Claims { sub: "adapter-1".to_string(), exp: 1_000 };
        let token = sign_token(b"super-secret-value", &claims).expect("sign");
        let back: Claims = verify_token(b"super-secret-value", &token).expect("verify");
        assert_eq!(back, claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims { sub: "adapter-1".to_string(), exp: 1_000 };
        let token = sign_token(b"super-secret-value", &claims).expect("sign");
        let result: Result<Claims, TokenError> = verify_token(b"a-different-secret", &token);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let claims = Claims { sub: "adapter-1".to_string(), exp: 1_000 };
        let token = sign_token(b"super-secret-value", &claims).expect("sign");
        let (_, signature) = token.split_once('.').expect("two segments");
        let tampered = format!("{}.{signature}", URL_SAFE_NO_PAD.encode(b"{\"sub\":\"adapter-2\",\"exp\":1000}"));
        let result: Result<Claims, TokenError> = verify_token(b"super-secret-value", &tampered);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let result: Result<Claims, TokenError> = verify_token(b"super-secret-value", "not-a-token");
        assert!(matches!(result, Err(TokenError::Malformed)));
    }
}
