// gateway-server/src/lib.rs
// ============================================================================
// Crate: gateway-server
// Description: Adapter-facing and operator-facing HTTP surfaces over the
// governance pipeline — registration, decision requests, tool
// authorization, trace/audit ingest, approval polling, and policy/decision
// operator endpoints.
// Purpose: The deployable process that wraps gateway-core with HTTP, auth,
// signed tokens, and configuration.
// Dependencies: gateway-core, gateway-store-sqlite, axum, tokio, hmac,
// sha2, serde, thiserror, tracing, uuid
// ============================================================================

//! # gateway-server
//!
//! Everything here is a thin shell around [`gateway_core`]: HTTP handlers
//! parse requests into the core's typed shapes, call into the pure
//! pipeline or the injected [`gateway_core::GovernanceStore`], and
//! translate the result back to JSON. The server itself holds no
//! governance logic of its own.

pub mod approval;
pub mod audit_chain;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod state;
pub mod token;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use gateway_store_sqlite::SqliteGovernanceStore;
use gateway_store_sqlite::SqliteStoreConfig;

/// Builds the application's [`axum::Router`] and binds a listener, but does
/// not run it — callers (the CLI, or integration tests) decide whether to
/// `serve` it or hand it to a test client.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if the configured SQLite store cannot
/// be opened.
pub fn build_app(config: GatewayConfig) -> Result<(axum::Router, SocketAddr), GatewayError> {
    let store_config = SqliteStoreConfig {
        path: config.db_path.clone(),
        busy_timeout_ms: config.db_busy_timeout_ms,
        journal_mode: gateway_store_sqlite::SqliteStoreMode::default(),
    };
    let store = SqliteGovernanceStore::open(&store_config)
        .map_err(|err| GatewayError::Internal(format!("failed to open store: {err}")))?;
    let bind_addr = config.bind_addr;
    let state = AppState::new(config, Arc::new(store));
    let router = http::router(state);
    Ok((router, bind_addr))
}
