// gateway-core/src/model/audit.rs
// ============================================================================
// Module: Audit Model
// Description: Closed event-type taxonomy and the hash-linked audit chain
// entry shape consumed by C9.
// Purpose: Represent audit entries independent of how they are persisted
// or chained.
// Dependencies: serde, serde_json
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::ids::ExecutionId;
use crate::ids::TenantId;
use crate::ids::TraceId;
use crate::ids::UserId;
use crate::ids::WorkspaceId;

// ============================================================================
// SECTION: Event Type
// ============================================================================

/// The closed set of audit event types. Extensible only by adding variants
/// in a new crate version, never by accepting arbitrary strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A tool authorization was requested.
    ToolAuthorizationRequested,
    /// A tool authorization was granted.
    ToolAuthorizationGranted,
    /// A tool authorization was denied.
    ToolAuthorizationDenied,
    /// A decision entered the `pending` state.
    PolicyDecisionPending,
    /// A pending decision was resolved (approved, denied, or cancelled).
    PolicyDecisionResolved,
    /// A `require_approval` decision was auto-allowed under `simulate`
    /// mode.
    ApprovalAutoAllowedInCore,
    /// A duplicate pending decision was coalesced via fingerprint reuse.
    ApprovalPendingReused,
    /// An adapter-submitted trace was ingested.
    AdapterTraceIngested,
    /// An adapter-submitted audit event was ingested verbatim.
    AdapterAuditEvent,
    /// An operator override bypassed a governance outcome.
    OpsOverrideUsed,
    /// A policy was created via the setup wizard.
    PolicyCreatedViaWizard,
}

// ============================================================================
// SECTION: Audit Entry
// ============================================================================

/// A single append-only audit entry. Every entry also belongs to the
/// tenant's hash-linked audit chain via [`crate::model::audit::AuditChainEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Workspace this event pertains to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
    /// Execution this event pertains to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    /// Trace this event pertains to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    /// Operator user this event pertains to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// The closed event type.
    pub event_type: AuditEventType,
    /// Event-type-specific structured payload.
    pub event_data: Value,
    /// Creation timestamp (Unix milliseconds).
    pub created_at: i64,
}

// ============================================================================
// SECTION: Chain Entry
// ============================================================================

/// The hash-chain linkage fields appended alongside every [`AuditEntry`].
///
/// # Invariants
/// - `event_hash = sha256(stableJson({tenant_id, seq, prev_event_hash,
///   event_type, event_data, created_at}))`.
/// - `prev_event_hash` is the previous chain entry's hash, or `None` for
///   `seq == 1`.
/// - The chain is contiguous and gapless per tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditChainEntry {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Monotonic sequence number, one-based, per tenant.
    pub seq: u64,
    /// Hash of the previous chain entry, or `None` at `seq == 1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_event_hash: Option<String>,
    /// Hash of this entry's core fields.
    pub event_hash: String,
}

/// The fields hashed to produce [`AuditChainEntry::event_hash`].
#[derive(Debug, Clone, Serialize)]
pub struct AuditChainHashInput<'a> {
    /// Owning tenant.
    pub tenant_id: &'a TenantId,
    /// Sequence number of this entry.
    pub seq: u64,
    /// Previous entry's hash, or `None` at `seq == 1`.
    pub prev_event_hash: Option<&'a str>,
    /// Event type of this entry.
    pub event_type: AuditEventType,
    /// Event payload of this entry.
    pub event_data: &'a Value,
    /// Creation timestamp of this entry.
    pub created_at: i64,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::hash_stable_json;
    use crate::hashing::DEFAULT_HASH_ALGORITHM;
    use serde_json::json;

    #[test]
    fn chain_hash_input_serializes_deterministically() {
        let tenant = TenantId::new("local");
        let input = AuditChainHashInput {
            tenant_id: &tenant,
            seq: 1,
            prev_event_hash: None,
            event_type: AuditEventType::PolicyDecisionPending,
            event_data: &json!({"decision_id": "d-1"}),
            created_at: 1_000,
        };
        let a = hash_stable_json(DEFAULT_HASH_ALGORITHM, &input).expect("hash");
        let input2 = AuditChainHashInput {
            tenant_id: &tenant,
            seq: 1,
            prev_event_hash: None,
            event_type: AuditEventType::PolicyDecisionPending,
            event_data: &json!({"decision_id": "d-1"}),
            created_at: 1_000,
        };
        let b = hash_stable_json(DEFAULT_HASH_ALGORITHM, &input2).expect("hash");
        assert_eq!(a, b);
    }
}
