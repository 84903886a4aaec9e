// gateway-server/src/state.rs
// ============================================================================
// Module: Application State
// Description: The single injected state value threaded through every
// HTTP handler via `axum::extract::State`.
// Purpose: Keep "global state is the database handle and a small config
// struct" (§9) literal: no hidden singletons.
// Dependencies: axum, gateway-core
// ============================================================================

use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use gateway_core::GovernanceStore;

use crate::config::GatewayConfig;

/// The state shared by every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    /// Process configuration, loaded once at startup.
    pub config: Arc<GatewayConfig>,
    /// The injected durable store.
    pub store: Arc<dyn GovernanceStore>,
}

impl AppState {
    /// Builds application state from a loaded config and an opened store.
    #[must_use]
    pub fn new(config: GatewayConfig, store: Arc<dyn GovernanceStore>) -> Self {
        Self { config: Arc::new(config), store }
    }

    /// Current wall-clock time, in Unix milliseconds. The sole place this
    /// crate reads the clock directly; every other function takes
    /// `now_millis` as a parameter so it stays reproducible in tests.
    #[must_use]
    pub fn now_millis(&self) -> i64 {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        i64::try_from(millis).unwrap_or(i64::MAX)
    }
}
