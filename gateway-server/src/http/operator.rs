// gateway-server/src/http/operator.rs
// ============================================================================
// Module: Operator HTTP Surface
// Description: Every endpoint the operator console calls: policy CRUD,
// decision resolution, and audit/trace inspection (§6).
// Purpose: Translate the wire contract onto `gateway_core`/`approval`
// calls; every handler here is gated by `X-Ops-Api-Key`.
// Dependencies: axum, gateway-core, serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! The gateway is single-tenant (§1, Non-goals): there is exactly one
//! tenant, [`LOCAL_TENANT_ID`], and the operator surface never takes a
//! tenant identifier from the caller. [`crate::auth::OpsAuthContext`]
//! correspondingly carries no identity beyond "possessed the configured
//! key" — there is nothing else to scope by.

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use gateway_core::ids::DecisionId;
use gateway_core::ids::ExecutionId;
use gateway_core::ids::PolicyId;
use gateway_core::ids::TenantId;
use gateway_core::ids::WorkspaceId;
use gateway_core::model::AuditEntry;
use gateway_core::model::ExecutionDecisionRecord;
use gateway_core::model::Policy;
use gateway_core::model::Trace;
use gateway_core::store::AuditFilter;
use gateway_core::store::PolicyFilter;
use serde::Deserialize;
use serde::Serialize;

use crate::approval;
use crate::error::GatewayError;
use crate::state::AppState;

/// The gateway's one and only tenant. Single-tenant deployments (§1) have
/// no tenant onboarding flow; this identifier is fixed for the process
/// lifetime rather than configured, matching the `tenant_id:"local"`
/// convention used throughout the governance examples (§8, S1).
const LOCAL_TENANT_ID: &str = "local";

/// Returns the fixed tenant identifier every operator call is scoped to.
fn local_tenant() -> TenantId {
    TenantId::new(LOCAL_TENANT_ID)
}

/// Extracts the `X-Ops-Api-Key` header value.
fn ops_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-ops-api-key").and_then(|value| value.to_str().ok())
}

// ============================================================================
// SECTION: Policy CRUD
// ============================================================================

/// `POST /api/policies` — upserts a policy, last-write-wins on
/// `(tenant_id, policy_id)`. The tenant is always [`LOCAL_TENANT_ID`],
/// overwriting whatever the body supplies.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key, and
/// [`GatewayError::Internal`] on a store failure.
pub async fn upsert_policy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut policy): Json<Policy>,
) -> Result<Json<Policy>, GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    let now = state.now_millis();
    policy.scope.tenant_id = local_tenant();
    state.store.upsert_policy(policy.clone(), now)?;
    Ok(Json(policy))
}

/// Query parameters accepted by [`list_policies`].
#[derive(Debug, Deserialize, Default)]
pub struct ListPoliciesQuery {
    /// Narrow to policies scoped to this workspace or unscoped (global).
    #[serde(default)]
    pub workspace_id: Option<String>,
    /// Narrow to policies scoped to this environment or unscoped (global).
    #[serde(default)]
    pub environment: Option<String>,
    /// When true, only enabled policies are returned. Defaults to false
    /// (operators reviewing policy state need to see disabled ones too).
    #[serde(default)]
    pub enabled_only: bool,
}

/// `GET /api/policies` — lists policies for the tenant, ordered
/// `precedence DESC, updated_at DESC` (§5).
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key, and
/// [`GatewayError::Internal`] on a store failure.
pub async fn list_policies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListPoliciesQuery>,
) -> Result<Json<Vec<Policy>>, GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    let policies = state.store.list_policies(&PolicyFilter {
        tenant_id: Some(local_tenant()),
        workspace_id: query.workspace_id.map(WorkspaceId::new),
        environment: query.environment,
        enabled_only: query.enabled_only,
    })?;
    Ok(Json(policies))
}

/// `GET /api/policies/{policy_id}` — reads a single policy.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key,
/// [`GatewayError::NotFound`] if the policy does not exist, and
/// [`GatewayError::Internal`] on a store failure.
pub async fn get_policy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(policy_id): Path<String>,
) -> Result<Json<Policy>, GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    let policy_id = PolicyId::new(policy_id);
    let policy = state
        .store
        .get_policy(&local_tenant(), &policy_id)?
        .ok_or_else(|| GatewayError::NotFound(format!("policy {policy_id} not found")))?;
    Ok(Json(policy))
}

/// `DELETE /api/policies/{policy_id}` — deletes a policy. Idempotent: a
/// missing policy is not an error.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key, and
/// [`GatewayError::Internal`] on a store failure.
pub async fn delete_policy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(policy_id): Path<String>,
) -> Result<(), GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    state.store.delete_policy(&local_tenant(), &PolicyId::new(policy_id))?;
    Ok(())
}

/// Body accepted by [`set_policy_enabled`].
#[derive(Debug, Deserialize)]
pub struct SetPolicyEnabledBody {
    /// The new enabled state.
    pub enabled: bool,
}

/// `POST /api/policies/{policy_id}/enabled` — flips a policy's enabled
/// flag without touching its other fields.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key, and
/// [`GatewayError::Internal`] on a store failure.
pub async fn set_policy_enabled(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(policy_id): Path<String>,
    Json(body): Json<SetPolicyEnabledBody>,
) -> Result<(), GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    let now = state.now_millis();
    state.store.set_policy_enabled(&local_tenant(), &PolicyId::new(policy_id), body.enabled, now)?;
    Ok(())
}

// ============================================================================
// SECTION: Decision Resolution
// ============================================================================

/// Body accepted by [`resolve_decision`].
#[derive(Debug, Deserialize)]
pub struct ResolveDecisionBody {
    /// Whether the operator is approving (`true`) or denying (`false`)
    /// the pending request.
    pub approve: bool,
    /// Human-readable reason recorded on the resolution.
    pub reason: String,
    /// Identifier of the resolving operator, if the console tracks one.
    #[serde(default)]
    pub resolved_by: Option<String>,
    /// Free-text justification, surfaced alongside the resolution.
    #[serde(default)]
    pub justification: Option<String>,
}

/// `POST /api/decisions/{decision_id}/resolve` — the operator console's
/// approve/deny action on a pending decision record (§4.8).
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key,
/// [`GatewayError::NotFound`] if the decision does not exist,
/// [`GatewayError::Conflict`] if it is no longer pending, and
/// [`GatewayError::Internal`] on a store or signing failure.
pub async fn resolve_decision(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(decision_id): Path<String>,
    Json(body): Json<ResolveDecisionBody>,
) -> Result<Json<ExecutionDecisionRecord>, GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    let now = state.now_millis();
    let record = approval::resolve(
        state.store.as_ref(),
        &local_tenant(),
        &DecisionId::new(decision_id),
        body.approve,
        body.reason,
        body.resolved_by,
        body.justification,
        state.config.decision_token_secret.as_bytes(),
        state.config.decision_token_ttl_seconds,
        now,
    )?;
    Ok(Json(record))
}

/// `POST /api/decisions/{decision_id}/cancel` — withdraws a pending
/// decision request before it is resolved, recorded as a denial with
/// reason `"cancelled"`.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key,
/// [`GatewayError::NotFound`] if the decision does not exist,
/// [`GatewayError::Conflict`] if it is no longer pending, and
/// [`GatewayError::Internal`] on a store failure.
pub async fn cancel_decision(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(decision_id): Path<String>,
) -> Result<Json<ExecutionDecisionRecord>, GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    let now = state.now_millis();
    let record = approval::cancel(state.store.as_ref(), &local_tenant(), &DecisionId::new(decision_id), now)?;
    Ok(Json(record))
}

// ============================================================================
// SECTION: Audit & Trace Inspection
// ============================================================================

/// Query parameters accepted by [`list_audit`].
#[derive(Debug, Deserialize, Default)]
pub struct ListAuditQuery {
    /// Narrow to a single execution.
    #[serde(default)]
    pub execution_id: Option<String>,
    /// Maximum number of entries to return, most recent first.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `GET /api/audit` — lists audit entries, most recent first.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key, and
/// [`GatewayError::Internal`] on a store failure.
pub async fn list_audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    let entries = state.store.list_audit_entries(&AuditFilter {
        tenant_id: local_tenant(),
        execution_id: query.execution_id.map(ExecutionId::new),
        limit: query.limit,
    })?;
    Ok(Json(entries))
}

/// Response body for [`verify_audit`].
#[derive(Debug, Serialize)]
pub struct VerifyAuditResponse {
    /// `true` when every link in the tenant's audit chain checks out;
    /// `false` at the first break. The chain is self-attested — this is
    /// an internal-consistency check, not an externally verifiable
    /// signature (§1, Non-goals).
    pub intact: bool,
}

/// `GET /api/audit/verify` — walks the tenant's audit chain and reports
/// whether every link is intact (§4.9).
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key, and
/// [`GatewayError::Internal`] on a store failure.
pub async fn verify_audit(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VerifyAuditResponse>, GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    let intact = crate::audit_chain::verify(state.store.as_ref(), &local_tenant())?;
    Ok(Json(VerifyAuditResponse { intact }))
}

/// Query parameters accepted by [`list_traces`].
#[derive(Debug, Deserialize, Default)]
pub struct ListTracesQuery {
    /// Narrow to a single execution.
    #[serde(default)]
    pub execution_id: Option<String>,
}

/// `GET /api/traces` — lists ingested traces, optionally narrowed to one
/// execution.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad ops key, and
/// [`GatewayError::Internal`] on a store failure.
pub async fn list_traces(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListTracesQuery>,
) -> Result<Json<Vec<Trace>>, GatewayError> {
    crate::auth::authorize_ops(state.config.ops_api_key.as_deref(), ops_key(&headers))?;
    let execution_id = query.execution_id.map(ExecutionId::new);
    let traces = state.store.list_traces(&local_tenant(), execution_id.as_ref())?;
    Ok(Json(traces))
}
