// gateway-core/src/model/decision.rs
// ============================================================================
// Module: Execution Decision Record
// Description: Materialized decision records, granted scope, and the
// approval-lifecycle status machine.
// Purpose: Represent the persisted decision entity that C7/C8 operate on.
// Dependencies: serde, serde_json
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::ids::AdapterId;
use crate::ids::DecisionId;
use crate::ids::ExecutionId;
use crate::ids::TenantId;
use crate::ids::WorkspaceId;
use crate::model::policy::Decision;

// ============================================================================
// SECTION: Status
// ============================================================================

/// The lifecycle status of a decision record.
///
/// # Invariants
/// - Transitions form a DAG `pending -> {approved, denied, expired}` and
///   never move backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    /// Awaiting operator resolution.
    Pending,
    /// Operator approved the request.
    Approved,
    /// Operator denied the request, or it was cancelled.
    Denied,
    /// The wait window elapsed before resolution.
    Expired,
}

impl DecisionStatus {
    /// Returns true for any of the three terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if transitioning from `self` to `next` is a valid
    /// forward move in the status DAG.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(self, Self::Pending) && next.is_terminal()
    }
}

// ============================================================================
// SECTION: Granted Scope
// ============================================================================

/// The capability grant attached to an `allow` decision, or pre-computed
/// for a pending `require_approval` decision so approval has a real scope
/// to bind, produced by C7.
///
/// # Invariants
/// - Residual values (`max_cost`) are always `>= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantedScope {
    /// Capability names granted for this execution.
    pub capabilities: Vec<String>,
    /// Maximum number of tool-invocation steps permitted.
    pub max_steps: u32,
    /// Maximum cost (in the tenant's budget unit) permitted.
    pub max_cost: f64,
    /// Expiry timestamp (Unix milliseconds) after which the grant is void.
    pub expires_at: i64,
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// The outcome recorded when a pending decision is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Free-text or structured reason code, e.g. `"cancelled"`.
    pub reason: String,
    /// Operator identifier who resolved the decision, if applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    /// Free-form operator justification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    /// Timestamp of resolution (Unix milliseconds).
    pub resolved_at: i64,
}

// ============================================================================
// SECTION: Decision Record
// ============================================================================

/// A materialized decision record. Identity is `decision_id`.
///
/// # Invariants
/// - `decision_token` is set at most once.
/// - `decision_token_used_at` may be set exactly once, and only when
///   `decision_token` is already set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDecisionRecord {
    /// Decision identifier (time-ordered UUID).
    pub decision_id: DecisionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// The execution this decision record governs.
    pub execution_id: ExecutionId,
    /// The adapter that requested the decision.
    pub adapter_id: AdapterId,
    /// Current lifecycle status.
    pub status: DecisionStatus,
    /// Role required to resolve this decision, if role-gated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_role: Option<String>,
    /// Expiry timestamp (Unix milliseconds) for the pending wait window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Opaque snapshot of the originating request, for operator review.
    pub request_snapshot: Value,
    /// Capability grant attached once approved or auto-allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_scope: Option<GrantedScope>,
    /// Resolution details once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Signed decision token, set once on approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_token: Option<String>,
    /// JTI of the issued decision token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_token_jti: Option<String>,
    /// Timestamp the token was consumed (Unix milliseconds), set at most
    /// once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_token_used_at: Option<i64>,
    /// Fingerprint used to coalesce duplicate pending requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Creation timestamp (Unix milliseconds).
    pub created_at: i64,
    /// Last-update timestamp (Unix milliseconds).
    pub updated_at: i64,
}

impl ExecutionDecisionRecord {
    /// Returns true if `next` is a valid status transition from the
    /// record's current status.
    #[must_use]
    pub fn can_transition_to(&self, next: DecisionStatus) -> bool {
        self.status.can_transition_to(next)
    }

    /// Maps a policy-level [`Decision`] onto the subset of decision
    /// statuses it can produce when materialized (only `RequireApproval`
    /// ever creates a pending record; callers handling `Allow`/`Deny`
    /// never materialize one).
    #[must_use]
    pub fn status_for_decision(decision: Decision) -> Option<DecisionStatus> {
        match decision {
            Decision::RequireApproval => Some(DecisionStatus::Pending),
            Decision::Allow | Decision::Deny => None,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_move_to_any_terminal_state() {
        assert!(DecisionStatus::Pending.can_transition_to(DecisionStatus::Approved));
        assert!(DecisionStatus::Pending.can_transition_to(DecisionStatus::Denied));
        assert!(DecisionStatus::Pending.can_transition_to(DecisionStatus::Expired));
    }

    #[test]
    fn terminal_states_never_move_again() {
        assert!(!DecisionStatus::Approved.can_transition_to(DecisionStatus::Denied));
        assert!(!DecisionStatus::Denied.can_transition_to(DecisionStatus::Pending));
        assert!(!DecisionStatus::Expired.can_transition_to(DecisionStatus::Approved));
    }
}
