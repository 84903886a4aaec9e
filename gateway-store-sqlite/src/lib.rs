// gateway-store-sqlite/src/lib.rs
// ============================================================================
// Crate: gateway-store-sqlite
// Description: Durable GovernanceStore backed by SQLite WAL.
// Purpose: Production persistence backend for the governance gateway.
// Dependencies: gateway-core, rusqlite, serde, serde_json, thiserror, tracing
// ============================================================================

//! # gateway-store-sqlite
//!
//! Implements [`gateway_core::GovernanceStore`] against a single SQLite
//! file. Every record is stored as a canonical JSON blob alongside the
//! indexed columns the store's own queries need (tenant/workspace/status/
//! precedence/etc); the JSON blob is the durable representation, the
//! columns are a read-path optimization derived from it at write time.

pub mod store;

pub use store::SqliteGovernanceStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
