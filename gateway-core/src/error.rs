// gateway-core/src/error.rs
// ============================================================================
// Module: Core Errors
// Description: Typed error kinds shared by the persistence trait and the
// governance pipeline.
// Purpose: Give callers (gateway-server, gateway-cli) a stable error
// surface to map onto HTTP status codes.
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Store Error
// ============================================================================

/// Errors raised by a [`crate::store::GovernanceStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A compare-and-set precondition failed (e.g. status already
    /// transitioned, token already consumed).
    #[error("conflict: {0}")]
    Conflict(String),
    /// The underlying storage backend failed.
    #[error("backend failure: {0}")]
    Backend(String),
    /// A stored record failed to (de)serialize.
    #[error("serialization failure: {0}")]
    Serialization(String),
}
