// gateway-server/src/http/mod.rs
// ============================================================================
// Module: HTTP Surface
// Description: Routing for the adapter-facing and operator-facing HTTP
// surfaces (§6).
// Purpose: Wire every endpoint in the spec's URL table to its handler,
// sharing one `AppState`.
// Dependencies: axum
// ============================================================================

pub mod adapter;
pub mod operator;

use axum::Router;
use axum::routing::get;
use axum::routing::post;

use crate::state::AppState;

/// Builds the full router: the adapter surface (gated by `X-Adapter-Token`)
/// merged with the operator surface (gated by `X-Ops-Api-Key`). Every
/// handler is instrumented with a `tracing` span carrying its route name.
#[must_use]
pub fn router(state: AppState) -> Router {
    let adapter_routes = Router::new()
        .route("/adapters/register", post(adapter::register))
        .route("/api/execution/request", post(adapter::request_decision))
        .route("/api/governance/tool/authorize", post(adapter::authorize_tool))
        .route("/api/ingest/trace", post(adapter::ingest_trace))
        .route("/api/ingest/audit", post(adapter::ingest_audit))
        .route("/api/decisions/{execution_id}/latest", get(adapter::poll_decision));

    let operator_routes = Router::new()
        .route("/api/policies", post(operator::upsert_policy).get(operator::list_policies))
        .route("/api/policies/{policy_id}", get(operator::get_policy).delete(operator::delete_policy))
        .route("/api/policies/{policy_id}/enabled", post(operator::set_policy_enabled))
        .route("/api/decisions/{decision_id}/resolve", post(operator::resolve_decision))
        .route("/api/decisions/{decision_id}/cancel", post(operator::cancel_decision))
        .route("/api/audit", get(operator::list_audit))
        .route("/api/audit/verify", get(operator::verify_audit))
        .route("/api/traces", get(operator::list_traces));

    Router::new().merge(adapter_routes).merge(operator_routes).with_state(state)
}
