// gateway-server/src/approval.rs
// ============================================================================
// Module: Approval Lifecycle (C8)
// Description: Pending-decision materialization, fingerprint-based reuse,
// operator resolution, decision-token issuance, and adapter polling.
// Purpose: Bridge the pure decision engine (C7) to the durable store and
// the signed decision token, implementing the single state machine
// described in §4.8 / §9.
// Dependencies: gateway-core
// ============================================================================

//! ## Overview
//! Everything here is a thin layer over [`gateway_core::GovernanceStore`]:
//! every mutation is either a single store call or a store call wrapped in
//! the fingerprint-reuse / lazy-expiry logic the spec requires. The core
//! itself never blocks; `poll` always returns immediately with the
//! current status, and adapters are expected to wait on a wall-clock
//! timer between calls.

use gateway_core::GovernanceStore;
use gateway_core::ids::AdapterId;
use gateway_core::ids::DecisionId;
use gateway_core::ids::ExecutionId;
use gateway_core::ids::TenantId;
use gateway_core::ids::WorkspaceId;
use gateway_core::model::AuditEntry;
use gateway_core::model::AuditEventType;
use gateway_core::model::DecisionStatus;
use gateway_core::model::ExecutionDecisionRecord;
use gateway_core::model::GrantedScope;
use gateway_core::model::Resolution;
use gateway_core::StoreError;
use serde_json::Value;
use thiserror::Error;

use crate::auth::AdapterTokenClaims;
use crate::token::TokenError;
use crate::token::sign_token;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the approval lifecycle.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A state transition was attempted that the record's current status
    /// does not permit (double-resolve, stale CAS).
    #[error("conflict: {0}")]
    Conflict(String),
    /// The referenced decision or execution does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Decision token signing failed.
    #[error(transparent)]
    Token(#[from] TokenError),
}

// ============================================================================
// SECTION: Materialization & Fingerprint Reuse
// ============================================================================

/// Everything needed to materialize a new pending decision, short of the
/// identifiers the caller has already minted.
pub struct NewPendingDecision {
    /// Decision identifier for a freshly materialized record.
    pub decision_id: DecisionId,
    /// Execution identifier for a freshly materialized record.
    pub execution_id: ExecutionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Requesting adapter.
    pub adapter_id: AdapterId,
    /// Opaque snapshot of the originating request (the serialized
    /// [`gateway_core::PolicyContext`]), for operator review and for
    /// reconstructing context on a later `authorizeTool` call.
    pub request_snapshot: Value,
    /// Fingerprint used to coalesce duplicate pending requests.
    pub fingerprint: String,
    /// Absolute expiry of the pending wait window.
    pub expires_at: i64,
    /// The scope the decision engine computed this request would be
    /// granted (§4.7 step 9), bound into the decision token on approval.
    pub granted_scope: Option<GrantedScope>,
}

/// Materializes a pending decision record, or reuses an existing pending
/// record with the same fingerprint if one was created within
/// `reuse_window_ms` (§4.8). Returns the record and whether it was reused.
///
/// # Errors
///
/// Returns [`ApprovalError::Store`] on a backend failure.
pub fn materialize_or_reuse(
    store: &dyn GovernanceStore,
    new: NewPendingDecision,
    reuse_window_ms: u64,
    now_millis: i64,
) -> Result<(ExecutionDecisionRecord, bool), ApprovalError> {
    let not_before = now_millis.saturating_sub(i64::try_from(reuse_window_ms).unwrap_or(i64::MAX));
    if let Some(existing) = store.find_pending_decision_by_fingerprint(&new.tenant_id, &new.fingerprint, not_before)? {
        append_audit(
            store,
            &existing.tenant_id,
            Some(existing.workspace_id.clone()),
            Some(existing.execution_id.clone()),
            AuditEventType::ApprovalPendingReused,
            serde_json::json!({"decision_id": existing.decision_id.as_str(), "fingerprint": new.fingerprint}),
            now_millis,
        )?;
        return Ok((existing, true));
    }

    let record = ExecutionDecisionRecord {
        decision_id: new.decision_id,
        tenant_id: new.tenant_id.clone(),
        workspace_id: new.workspace_id.clone(),
        execution_id: new.execution_id.clone(),
        adapter_id: new.adapter_id,
        status: DecisionStatus::Pending,
        required_role: None,
        expires_at: Some(new.expires_at),
        request_snapshot: new.request_snapshot,
        granted_scope: new.granted_scope,
        resolution: None,
        decision_token: None,
        decision_token_jti: None,
        decision_token_used_at: None,
        fingerprint: Some(new.fingerprint),
        created_at: now_millis,
        updated_at: now_millis,
    };
    store.create_decision(record.clone())?;
    append_audit(
        store,
        &new.tenant_id,
        Some(new.workspace_id),
        Some(new.execution_id),
        AuditEventType::PolicyDecisionPending,
        serde_json::json!({"decision_id": record.decision_id.as_str()}),
        now_millis,
    )?;
    Ok((record, false))
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves a pending decision (approve or deny), issuing a decision token
/// on approval. Atomic: the status transition, optional token, and audit
/// append either all happen or none do.
///
/// # Errors
///
/// Returns [`ApprovalError::NotFound`] if the decision does not exist,
/// [`ApprovalError::Conflict`] if it is no longer pending, and
/// [`ApprovalError::Token`] if token signing fails.
#[expect(clippy::too_many_arguments, reason = "mirrors the single atomic resolve operation in the spec")]
pub fn resolve(
    store: &dyn GovernanceStore,
    tenant_id: &TenantId,
    decision_id: &DecisionId,
    approve: bool,
    reason: String,
    resolved_by: Option<String>,
    justification: Option<String>,
    decision_token_secret: &[u8],
    decision_token_ttl_seconds: u64,
    now_millis: i64,
) -> Result<ExecutionDecisionRecord, ApprovalError> {
    let existing = store
        .get_decision(tenant_id, decision_id)?
        .ok_or_else(|| ApprovalError::NotFound(format!("decision {decision_id} not found")))?;
    if existing.status != DecisionStatus::Pending {
        return Err(ApprovalError::Conflict(format!("decision {decision_id} is no longer pending")));
    }

    let next_status = if approve { DecisionStatus::Approved } else { DecisionStatus::Denied };
    let resolution = Resolution { reason, resolved_by, justification, resolved_at: now_millis };

    let (granted_scope, decision_token, decision_token_jti) = if approve {
        // The engine (C7) pre-computes the scope a `require_approval`
        // outcome would grant at materialization time; refresh only the
        // expiry, anchored to the moment of approval rather than the
        // original request, since the wait for a human can outlast the
        // engine's original TTL estimate.
        let expires_at =
            now_millis.saturating_add(i64::try_from(decision_token_ttl_seconds.saturating_mul(1000)).unwrap_or(i64::MAX));
        let scope = match existing.granted_scope.clone() {
            Some(persisted) => GrantedScope { expires_at, ..persisted },
            None => GrantedScope { capabilities: Vec::new(), max_steps: 0, max_cost: 0.0, expires_at },
        };
        let jti = uuid::Uuid::new_v4().to_string();
        let claims = crate::token::DecisionTokenClaims {
            typ: "decision_token".to_string(),
            tenant_id: tenant_id.clone(),
            workspace_id: existing.workspace_id.clone(),
            adapter_id: existing.adapter_id.clone(),
            execution_id: existing.execution_id.clone(),
            decision_id: decision_id.clone(),
            granted_scope: scope.clone(),
            iat: now_millis / 1000,
            exp: now_millis / 1000 + i64::try_from(decision_token_ttl_seconds).unwrap_or(i64::MAX),
            jti: jti.clone(),
        };
        let token = sign_token(decision_token_secret, &claims)?;
        (Some(scope), Some(token), Some(jti))
    } else {
        (None, None, None)
    };

    let applied = store.compare_and_set_status(
        tenant_id,
        decision_id,
        DecisionStatus::Pending,
        next_status,
        Some(resolution),
        granted_scope,
        decision_token,
        decision_token_jti,
        now_millis,
    )?;
    if !applied {
        return Err(ApprovalError::Conflict(format!("decision {decision_id} was resolved concurrently")));
    }

    append_audit(
        store,
        tenant_id,
        Some(existing.workspace_id.clone()),
        Some(existing.execution_id.clone()),
        AuditEventType::PolicyDecisionResolved,
        serde_json::json!({"decision_id": decision_id.as_str(), "approved": approve}),
        now_millis,
    )?;

    store
        .get_decision(tenant_id, decision_id)?
        .ok_or_else(|| ApprovalError::NotFound(format!("decision {decision_id} not found")))
}

/// Cancels a pending decision from either side, modeled as `denied` with
/// `resolution.reason == "cancelled"` (§4.8).
///
/// # Errors
///
/// Returns [`ApprovalError::NotFound`] or [`ApprovalError::Conflict`] on
/// the same terms as [`resolve`].
pub fn cancel(
    store: &dyn GovernanceStore,
    tenant_id: &TenantId,
    decision_id: &DecisionId,
    now_millis: i64,
) -> Result<ExecutionDecisionRecord, ApprovalError> {
    resolve(store, tenant_id, decision_id, false, "cancelled".to_string(), None, None, &[], 0, now_millis)
}

// ============================================================================
// SECTION: Polling
// ============================================================================

/// The outcome of an adapter poll call (§4.8).
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Still awaiting operator resolution.
    Pending,
    /// Approved; carries the signed decision token and granted scope.
    Approved { decision_token: Option<String>, granted_scope: Option<GrantedScope> },
    /// Denied, or cancelled (denial with `resolution.reason == "cancelled"`).
    Denied { resolution: Option<Resolution> },
    /// The wait window elapsed before resolution.
    Expired,
}

/// Returns the latest decision for `execution_id`, lazily transitioning it
/// to `expired` first if its wait window has elapsed (§4.8, §5).
///
/// # Errors
///
/// Returns [`ApprovalError::NotFound`] if no decision exists for this
/// execution, otherwise [`ApprovalError::Store`] on a backend failure.
pub fn poll(
    store: &dyn GovernanceStore,
    tenant_id: &TenantId,
    execution_id: &ExecutionId,
    now_millis: i64,
) -> Result<(ExecutionDecisionRecord, PollOutcome), ApprovalError> {
    let mut record = store
        .get_latest_decision_for_execution(tenant_id, execution_id)?
        .ok_or_else(|| ApprovalError::NotFound(format!("no decision for execution {execution_id}")))?;

    if record.status == DecisionStatus::Pending {
        if let Some(expires_at) = record.expires_at {
            if now_millis >= expires_at {
                let applied = store.compare_and_set_status(
                    tenant_id,
                    &record.decision_id,
                    DecisionStatus::Pending,
                    DecisionStatus::Expired,
                    None,
                    None,
                    None,
                    None,
                    now_millis,
                )?;
                if applied {
                    record.status = DecisionStatus::Expired;
                }
            }
        }
    }

    let outcome = match record.status {
        DecisionStatus::Pending => PollOutcome::Pending,
        DecisionStatus::Approved => PollOutcome::Approved {
            decision_token: record.decision_token.clone(),
            granted_scope: record.granted_scope.clone(),
        },
        DecisionStatus::Denied => PollOutcome::Denied { resolution: record.resolution.clone() },
        DecisionStatus::Expired => PollOutcome::Expired,
    };
    Ok((record, outcome))
}

// ============================================================================
// SECTION: Decision Token Consumption
// ============================================================================

/// Verifies and single-use-consumes a decision token presented by an
/// adapter. Returns the verified claims on first use; a second consumption
/// of the same token fails (S5).
///
/// # Errors
///
/// Returns [`ApprovalError::Token`] if the token does not verify, and
/// [`ApprovalError::Conflict`] if it has already been consumed.
pub fn consume_decision_token(
    store: &dyn GovernanceStore,
    decision_token_secret: &[u8],
    token: &str,
    now_millis: i64,
) -> Result<AdapterTokenClaims, ApprovalError> {
    let claims: crate::token::DecisionTokenClaims = crate::token::verify_token(decision_token_secret, token)?;
    let consumed =
        store.mark_decision_token_used(&claims.tenant_id, &claims.decision_id, &claims.jti, now_millis)?;
    if !consumed {
        return Err(ApprovalError::Conflict("decision token already used".to_string()));
    }
    Ok(AdapterTokenClaims {
        typ: "decision_token".to_string(),
        tenant_id: claims.tenant_id,
        workspace_id: claims.workspace_id,
        adapter_id: claims.adapter_id,
        capabilities: claims.granted_scope.capabilities.into_iter().collect(),
        iat: claims.iat,
        exp: Some(claims.exp),
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Appends an audit entry, surfacing store failures as [`ApprovalError`].
#[expect(clippy::too_many_arguments, reason = "mirrors AuditEntry's own field count")]
fn append_audit(
    store: &dyn GovernanceStore,
    tenant_id: &TenantId,
    workspace_id: Option<WorkspaceId>,
    execution_id: Option<ExecutionId>,
    event_type: AuditEventType,
    event_data: Value,
    now_millis: i64,
) -> Result<(), ApprovalError> {
    store.append_audit_entry(AuditEntry {
        tenant_id: tenant_id.clone(),
        workspace_id,
        execution_id,
        trace_id: None,
        user_id: None,
        event_type,
        event_data,
        created_at: now_millis,
    })?;
    Ok(())
}
