// gateway-server/src/http/adapter.rs
// ============================================================================
// Module: Adapter HTTP Surface
// Description: Every endpoint an adapter calls: registration, decision
// requests, per-tool authorization, trace/audit ingest, and decision
// polling (§6).
// Purpose: Translate the wire contract onto `gateway_core`/`approval`
// calls; every handler here is gated by `X-Adapter-Token`.
// Dependencies: axum, gateway-core, serde, serde_json, tracing, uuid
// ============================================================================

use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use gateway_core::ids::AdapterId;
use gateway_core::ids::DecisionId;
use gateway_core::ids::ExecutionId;
use gateway_core::ids::PolicyId;
use gateway_core::model::Adapter;
use gateway_core::model::AdapterRegistration;
use gateway_core::model::AuditEntry;
use gateway_core::model::AuditEventType;
use gateway_core::model::Decision;
use gateway_core::model::DecisionStatus;
use gateway_core::model::ExecutionDecisionRecord;
use gateway_core::model::GrantedScope;
use gateway_core::model::Resolution;
use gateway_core::model::Trace;
use gateway_core::model::ToolAuthorization;
use gateway_core::conditions::TemplateVars;
use gateway_core::context::PolicyContext;
use gateway_core::context::Provenance;
use gateway_core::context::SkillState;
use gateway_core::evaluator::PolicyTrace;
use gateway_core::hash_stable_json;
use gateway_core::store::PolicyFilter;
use gateway_core::DecisionOutcome;
use gateway_core::DecisionRequest;
use gateway_core::HashAlgorithm;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::approval;
use crate::approval::NewPendingDecision;
use crate::auth::authorize_adapter;
use crate::error::GatewayError;
use crate::state::AppState;

// ============================================================================
// SECTION: Header Access
// ============================================================================

/// Extracts the `X-Adapter-Token` header value.
fn adapter_token(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-adapter-token").and_then(|value| value.to_str().ok())
}

// ============================================================================
// SECTION: Register Adapter
// ============================================================================

/// `POST /adapters/register` — upserts the calling adapter's registration.
/// Identity (`tenant_id`, `adapter_id`) comes from the presented token, not
/// the body, so an adapter can never register under another adapter's
/// identity.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a missing/invalid token, or
/// [`GatewayError::Internal`] on a store failure.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(registration): Json<AdapterRegistration>,
) -> Result<Json<Adapter>, GatewayError> {
    let now = state.now_millis();
    let auth = authorize_adapter(state.config.adapter_token_secret.as_bytes(), adapter_token(&headers), now)?;
    let adapter = state.store.upsert_adapter(&auth.tenant_id, &auth.adapter_id, registration, now)?;
    Ok(Json(adapter))
}

// ============================================================================
// SECTION: Request Decision
// ============================================================================

/// Body accepted by [`request_decision`].
#[derive(Debug, Deserialize)]
pub struct RequestDecisionBody {
    /// Tool being invoked, if this request is tool-scoped.
    #[serde(default)]
    pub tool: Option<String>,
    /// Tool group the tool belongs to, if known.
    #[serde(default)]
    pub tool_group: Option<String>,
    /// Lifecycle state of the associated skill, if any.
    #[serde(default)]
    pub skill_state: Option<SkillState>,
    /// Estimated cost of the requested action.
    #[serde(default)]
    pub estimated_cost: f64,
    /// Capabilities requested for this execution; must be a subset of the
    /// adapter token's scope.
    #[serde(default)]
    pub requested_capabilities: Vec<String>,
    /// Free-text statement of intent.
    #[serde(default)]
    pub intent: Option<String>,
    /// Adapter-supplied nested context.
    #[serde(default = "default_structured_context")]
    pub structured_context: Value,
    /// Provenance of the request's originating skill or policy.
    pub provenance: Provenance,
    /// Environment name, if reported.
    #[serde(default)]
    pub environment: Option<String>,
    /// Adapter-requested step cap.
    #[serde(default)]
    pub requested_max_steps: Option<u32>,
    /// Fingerprint used to coalesce duplicate pending requests. When
    /// absent, one is derived deterministically from the adapter, tool,
    /// and requested capabilities.
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Adapter-proposed execution identifier. When absent, the gateway
    /// mints one.
    #[serde(default)]
    pub execution_id: Option<String>,
}

/// Default for [`RequestDecisionBody::structured_context`].
fn default_structured_context() -> Value {
    Value::Object(serde_json::Map::new())
}

/// The response envelope for [`request_decision`] (§6): the full
/// [`DecisionOutcome`] plus the identifiers the adapter needs to continue
/// the execution.
#[derive(Debug, Serialize)]
pub struct DecisionEnvelope {
    /// Execution identifier, minted by the gateway when the adapter does
    /// not supply one.
    pub execution_id: ExecutionId,
    /// The materialized decision record's identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<DecisionId>,
    /// Everything the decision engine computed.
    #[serde(flatten)]
    pub outcome: DecisionOutcome,
}

/// `POST /api/execution/request` — runs the full governance pipeline for
/// one request and materializes the resulting decision record.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] on a bad token,
/// [`GatewayError::Unauthorized`] if a requested capability is outside the
/// token's scope, [`GatewayError::NotFound`] if the adapter is not
/// registered, and [`GatewayError::Internal`] on a store failure.
pub async fn request_decision(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RequestDecisionBody>,
) -> Result<Json<DecisionEnvelope>, GatewayError> {
    let now = state.now_millis();
    let auth = authorize_adapter(state.config.adapter_token_secret.as_bytes(), adapter_token(&headers), now)?;

    if !body.requested_capabilities.iter().all(|capability| auth.capabilities.contains(capability)) {
        return Err(GatewayError::Unauthorized("requested capability outside adapter token scope".to_string()));
    }

    let adapter = state
        .store
        .get_adapter(&auth.tenant_id, &auth.adapter_id)?
        .ok_or_else(|| GatewayError::NotFound(format!("adapter {} is not registered", auth.adapter_id)))?;

    let policies = state.store.list_policies(&PolicyFilter {
        tenant_id: Some(auth.tenant_id.clone()),
        workspace_id: Some(auth.workspace_id.clone()),
        environment: body.environment.clone(),
        enabled_only: true,
    })?;
    let configured_budget = state.store.get_tenant_budget(&auth.tenant_id)?;

    let context = PolicyContext {
        tenant_id: auth.tenant_id.clone(),
        workspace_id: auth.workspace_id.clone(),
        environment: body.environment.clone(),
        adapter_id: auth.adapter_id.clone(),
        adapter_risk_class: adapter.risk_class,
        tool: body.tool.clone(),
        tool_group: body.tool_group.clone(),
        skill_state: body.skill_state,
        estimated_cost: body.estimated_cost,
        requested_capabilities: body.requested_capabilities.clone(),
        intent: body.intent.clone(),
        structured_context: body.structured_context.clone(),
        provenance: body.provenance,
        template_vars: TemplateVars::default(),
    };

    let request = DecisionRequest {
        context: &context,
        rbac_allowed: adapter.enabled,
        configured_budget,
        policies: &policies,
        legacy_operators: !state.config.policy_operators_enabled,
        approval_mode: state.config.approval_mode,
        override_: None,
        requested_max_steps: body.requested_max_steps,
        policy_max_steps_cap: None,
        now_millis: now,
    };
    let outcome = gateway_core::decide(&request);

    let execution_id = body
        .execution_id
        .clone()
        .map(ExecutionId::new)
        .unwrap_or_else(|| ExecutionId::new(uuid::Uuid::now_v7().to_string()));
    let request_snapshot =
        serde_json::to_value(&context).map_err(|err| GatewayError::Internal(format!("failed to snapshot request: {err}")))?;

    let decision_id = if outcome.requires_approval {
        materialize_pending(&state, &auth, &body, &execution_id, request_snapshot, outcome.granted_scope.clone(), now)?
    } else {
        materialize_resolved(&state, &auth, &execution_id, &outcome, request_snapshot, now)?
    };

    Ok(Json(DecisionEnvelope { execution_id, decision_id: Some(decision_id), outcome }))
}

/// Materializes (or reuses, by fingerprint) a pending decision record for
/// an outcome that requires operator approval.
fn materialize_pending(
    state: &AppState,
    auth: &crate::auth::AdapterAuthContext,
    body: &RequestDecisionBody,
    execution_id: &ExecutionId,
    request_snapshot: Value,
    granted_scope: Option<GrantedScope>,
    now: i64,
) -> Result<DecisionId, GatewayError> {
    let fingerprint = body
        .fingerprint
        .clone()
        .unwrap_or_else(|| default_fingerprint(&auth.adapter_id, body.tool.as_deref(), &body.requested_capabilities));
    let expires_at = now.saturating_add(i64::try_from(state.config.approval_wait_timeout_ms).unwrap_or(i64::MAX));
    let (record, _reused) = approval::materialize_or_reuse(
        state.store.as_ref(),
        NewPendingDecision {
            decision_id: DecisionId::new(uuid::Uuid::now_v7().to_string()),
            execution_id: execution_id.clone(),
            tenant_id: auth.tenant_id.clone(),
            workspace_id: auth.workspace_id.clone(),
            adapter_id: auth.adapter_id.clone(),
            request_snapshot,
            fingerprint,
            expires_at,
            granted_scope,
        },
        state.config.reuse_window_ms,
        now,
    )?;
    Ok(record.decision_id)
}

/// Materializes an already-terminal decision record for an outcome that
/// did not require approval (a plain `allow`, a plain `deny`, or a
/// `require_approval` auto-allowed under `simulate` mode). Keeps
/// `get_latest_decision_for_execution` valid for every execution, not only
/// ones that passed through the pending state.
fn materialize_resolved(
    state: &AppState,
    auth: &crate::auth::AdapterAuthContext,
    execution_id: &ExecutionId,
    outcome: &DecisionOutcome,
    request_snapshot: Value,
    now: i64,
) -> Result<DecisionId, GatewayError> {
    let decision_id = DecisionId::new(uuid::Uuid::now_v7().to_string());
    let status = if outcome.allowed { DecisionStatus::Approved } else { DecisionStatus::Denied };
    let resolution = (!outcome.allowed).then(|| Resolution {
        reason: outcome.blocked_reason.unwrap_or("denied").to_string(),
        resolved_by: None,
        justification: None,
        resolved_at: now,
    });
    state.store.create_decision(ExecutionDecisionRecord {
        decision_id: decision_id.clone(),
        tenant_id: auth.tenant_id.clone(),
        workspace_id: auth.workspace_id.clone(),
        execution_id: execution_id.clone(),
        adapter_id: auth.adapter_id.clone(),
        status,
        required_role: None,
        expires_at: None,
        request_snapshot,
        granted_scope: outcome.granted_scope.clone(),
        resolution,
        decision_token: None,
        decision_token_jti: None,
        decision_token_used_at: None,
        fingerprint: None,
        created_at: now,
        updated_at: now,
    })?;
    if outcome.auto_allowed_in_core {
        state.store.append_audit_entry(AuditEntry {
            tenant_id: auth.tenant_id.clone(),
            workspace_id: Some(auth.workspace_id.clone()),
            execution_id: Some(execution_id.clone()),
            trace_id: None,
            user_id: None,
            event_type: AuditEventType::ApprovalAutoAllowedInCore,
            event_data: serde_json::json!({"decision_id": decision_id.as_str()}),
            created_at: now,
        })?;
    }
    Ok(decision_id)
}

/// Derives a stable fingerprint for fingerprint-based reuse (§4.8) when the
/// adapter does not supply one: a hash of the adapter identity, tool, and
/// requested capabilities.
fn default_fingerprint(adapter_id: &AdapterId, tool: Option<&str>, requested_capabilities: &[String]) -> String {
    let digest = hash_stable_json(
        HashAlgorithm::Sha256,
        &serde_json::json!({
            "adapter_id": adapter_id.as_str(),
            "tool": tool,
            "requested_capabilities": requested_capabilities,
        }),
    );
    digest.map(|d| d.value).unwrap_or_else(|_| format!("{adapter_id}:{tool:?}"))
}

// ============================================================================
// SECTION: Authorize Tool
// ============================================================================

/// Body accepted by [`authorize_tool`].
#[derive(Debug, Deserialize)]
pub struct AuthorizeToolBody {
    /// The execution this invocation belongs to.
    pub execution_id: String,
    /// Tool name invoked.
    pub tool: String,
    /// Monotonic sequence number of this invocation within the execution.
    pub sequence: u32,
    /// Opaque snapshot of the invocation arguments.
    #[serde(default = "default_structured_context")]
    pub invocation_snapshot: Value,
    /// A decision token presented to activate a granted scope, if this is
    /// the first tool call following operator approval.
    #[serde(default)]
    pub decision_token: Option<String>,
}

/// Response to [`authorize_tool`].
#[derive(Debug, Serialize)]
pub struct ToolAuthorizationResponse {
    /// Whether this specific invocation is permitted.
    pub allowed: bool,
    /// The decision reached for this invocation.
    pub decision: Decision,
    /// Policy that produced a deny, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_policy_id: Option<PolicyId>,
    /// Per-policy condition trace.
    pub decision_trace: Vec<PolicyTrace>,
    /// Human-readable explanation.
    pub explanation: String,
}

/// `POST /api/governance/tool/authorize` — evaluates one tool invocation
/// within an already-decided execution, reconstructing the original
/// request context from the decision record's snapshot.
///
/// A `require_approval` result at this granularity is treated as `deny`:
/// the execution has already passed its one approval gate in
/// [`request_decision`], so a single in-flight tool call cannot itself
/// pause for a second approval round.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if no decision exists for the
/// execution, [`GatewayError::Conflict`] if the execution is not approved
/// or the presented decision token was already consumed, and
/// [`GatewayError::Internal`] if the stored request snapshot is corrupt.
pub async fn authorize_tool(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AuthorizeToolBody>,
) -> Result<Json<ToolAuthorizationResponse>, GatewayError> {
    let now = state.now_millis();
    let auth = authorize_adapter(state.config.adapter_token_secret.as_bytes(), adapter_token(&headers), now)?;
    let execution_id = ExecutionId::new(body.execution_id.clone());

    if let Some(token) = &body.decision_token {
        approval::consume_decision_token(state.store.as_ref(), state.config.decision_token_secret.as_bytes(), token, now)?;
    }

    let record = state
        .store
        .get_latest_decision_for_execution(&auth.tenant_id, &execution_id)?
        .ok_or_else(|| GatewayError::NotFound(format!("no decision for execution {execution_id}")))?;
    if record.status != DecisionStatus::Approved {
        return Err(GatewayError::Conflict(format!("execution {execution_id} is not in an approved state")));
    }

    let mut context: PolicyContext = serde_json::from_value(record.request_snapshot.clone())
        .map_err(|err| GatewayError::Internal(format!("corrupt request snapshot: {err}")))?;
    context.tool = Some(body.tool.clone());

    let policies = state.store.list_policies(&PolicyFilter {
        tenant_id: Some(auth.tenant_id.clone()),
        workspace_id: Some(auth.workspace_id.clone()),
        environment: context.environment.clone(),
        enabled_only: true,
    })?;
    let evaluation = gateway_core::evaluate(&context, &policies, !state.config.policy_operators_enabled);
    let decision = if evaluation.decision == Decision::RequireApproval { Decision::Deny } else { evaluation.decision };
    let matched_policy_id = (decision == Decision::Deny).then(|| evaluation.matched_policies.last().cloned()).flatten();

    state.store.append_audit_entry(AuditEntry {
        tenant_id: auth.tenant_id.clone(),
        workspace_id: Some(auth.workspace_id.clone()),
        execution_id: Some(execution_id.clone()),
        trace_id: None,
        user_id: None,
        event_type: if decision == Decision::Allow {
            AuditEventType::ToolAuthorizationGranted
        } else {
            AuditEventType::ToolAuthorizationDenied
        },
        event_data: serde_json::json!({"tool": body.tool, "sequence": body.sequence}),
        created_at: now,
    })?;

    state.store.insert_tool_authorization(ToolAuthorization {
        execution_id: execution_id.clone(),
        tool: body.tool.clone(),
        sequence: body.sequence,
        decision,
        matched_policy_id: matched_policy_id.clone(),
        invocation_snapshot: body.invocation_snapshot,
        created_at: now,
    })?;

    Ok(Json(ToolAuthorizationResponse {
        allowed: decision == Decision::Allow,
        decision,
        matched_policy_id,
        decision_trace: evaluation.decision_trace,
        explanation: evaluation.explanation,
    }))
}

// ============================================================================
// SECTION: Ingest Trace
// ============================================================================

/// `POST /api/ingest/trace` — validates the submitted trace's step-hash
/// chain, stamps the resulting [`IntegrityStatus`], and stores it.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] on a store failure.
pub async fn ingest_trace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut trace): Json<Trace>,
) -> Result<Json<Trace>, GatewayError> {
    let now = state.now_millis();
    let auth = authorize_adapter(state.config.adapter_token_secret.as_bytes(), adapter_token(&headers), now)?;
    trace.tenant_id = auth.tenant_id.clone();
    trace.integrity_status = trace.verify_chain();
    state.store.insert_trace(trace.clone())?;
    state.store.append_audit_entry(AuditEntry {
        tenant_id: auth.tenant_id,
        workspace_id: Some(auth.workspace_id),
        execution_id: Some(trace.execution_id.clone()),
        trace_id: Some(trace.trace_id.clone()),
        user_id: None,
        event_type: AuditEventType::AdapterTraceIngested,
        event_data: serde_json::json!({"integrity_status": trace.integrity_status}),
        created_at: now,
    })?;
    Ok(Json(trace))
}

// ============================================================================
// SECTION: Ingest Audit
// ============================================================================

/// `POST /api/ingest/audit` — appends an adapter-submitted audit event
/// verbatim to the tenant's hash-linked chain.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] on a store failure.
pub async fn ingest_audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<IngestAuditBody>,
) -> Result<Json<gateway_core::model::AuditChainEntry>, GatewayError> {
    let now = state.now_millis();
    let auth = authorize_adapter(state.config.adapter_token_secret.as_bytes(), adapter_token(&headers), now)?;
    let execution_id = body.execution_id.map(ExecutionId::new);
    let chain_entry = crate::audit_chain::ingest_adapter_event(state.store.as_ref(), &auth.tenant_id, execution_id, body.event_data, now)?;
    Ok(Json(chain_entry))
}

/// Body accepted by [`ingest_audit`].
#[derive(Debug, Deserialize)]
pub struct IngestAuditBody {
    /// Execution this event pertains to, if any.
    #[serde(default)]
    pub execution_id: Option<String>,
    /// Opaque, adapter-defined event payload.
    pub event_data: Value,
}

// ============================================================================
// SECTION: Poll Decision
// ============================================================================

/// Response to [`poll_decision`].
#[derive(Debug, Serialize)]
pub struct PollDecisionResponse {
    /// Current lifecycle status.
    pub status: DecisionStatus,
    /// The signed decision token, present only immediately after approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_token: Option<String>,
    /// The capability grant, present once approved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granted_scope: Option<GrantedScope>,
    /// Resolution details, present once denied or cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

/// `GET /api/decisions/{execution_id}/latest` — the non-blocking poll an
/// adapter calls while waiting on operator resolution (§4.8).
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if no decision exists for this
/// execution.
pub async fn poll_decision(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(execution_id): Path<String>,
) -> Result<Json<PollDecisionResponse>, GatewayError> {
    let now = state.now_millis();
    let auth = authorize_adapter(state.config.adapter_token_secret.as_bytes(), adapter_token(&headers), now)?;
    let (record, outcome) = approval::poll(state.store.as_ref(), &auth.tenant_id, &ExecutionId::new(execution_id), now)?;
    let response = match outcome {
        approval::PollOutcome::Pending => {
            PollDecisionResponse { status: record.status, decision_token: None, granted_scope: None, resolution: None }
        }
        approval::PollOutcome::Approved { decision_token, granted_scope } => {
            PollDecisionResponse { status: record.status, decision_token, granted_scope, resolution: None }
        }
        approval::PollOutcome::Denied { resolution } => {
            PollDecisionResponse { status: record.status, decision_token: None, granted_scope: None, resolution }
        }
        approval::PollOutcome::Expired => {
            PollDecisionResponse { status: record.status, decision_token: None, granted_scope: None, resolution: None }
        }
    };
    Ok(Json(response))
}
