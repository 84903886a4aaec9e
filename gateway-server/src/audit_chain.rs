// gateway-server/src/audit_chain.rs
// ============================================================================
// Module: Audit Chain Wrapper (C9)
// Description: Thin helpers over `GovernanceStore::append_audit_entry` /
// `verify_audit_chain` for the ingest and operator HTTP surfaces.
// Purpose: Keep the "audit write must never fail a decision silently"
// rule (§7) in one place: every append here returns its error to the
// caller rather than swallowing it.
// Dependencies: gateway-core
// ============================================================================

use gateway_core::GovernanceStore;
use gateway_core::StoreError;
use gateway_core::ids::ExecutionId;
use gateway_core::ids::TenantId;
use gateway_core::model::AuditChainEntry;
use gateway_core::model::AuditEntry;
use gateway_core::model::AuditEventType;
use serde_json::Value;

/// Appends an adapter-submitted audit event verbatim, tagging it
/// [`AuditEventType::AdapterAuditEvent`].
///
/// # Errors
///
/// Returns [`StoreError`] if the append fails; callers must not treat a
/// failed audit append as a successful ingest (§7).
pub fn ingest_adapter_event(
    store: &dyn GovernanceStore,
    tenant_id: &TenantId,
    execution_id: Option<ExecutionId>,
    event_data: Value,
    now_millis: i64,
) -> Result<AuditChainEntry, StoreError> {
    store.append_audit_entry(AuditEntry {
        tenant_id: tenant_id.clone(),
        workspace_id: None,
        execution_id,
        trace_id: None,
        user_id: None,
        event_type: AuditEventType::AdapterAuditEvent,
        event_data,
        created_at: now_millis,
    })
}

/// Verifies the full per-tenant hash chain, returning `true` if every
/// link checks out.
///
/// # Errors
///
/// Returns [`StoreError`] on a backend failure while walking the chain.
pub fn verify(store: &dyn GovernanceStore, tenant_id: &TenantId) -> Result<bool, StoreError> {
    store.verify_audit_chain(tenant_id)
}
