// gateway-core/src/store.rs
// ============================================================================
// Module: Persistence (C2)
// Description: The storage-backend-agnostic interface for policies,
// decisions, audit entries, adapters, traces, and tool authorizations,
// plus a reference in-memory implementation.
// Purpose: Let the governance pipeline depend on a trait rather than a
// concrete database, the way the wider gateway threads a single injected
// store through the request path instead of a hidden singleton.
// Dependencies: std only (trait); gateway-store-sqlite provides the
// production backend.
// ============================================================================

//! ## Overview
//! [`GovernanceStore`] is the sole seam between the pure decision pipeline
//! (C3-C7) and durable storage. [`InMemoryStore`] is a reference
//! implementation useful for tests and for running the gateway without a
//! database; `gateway-store-sqlite::SqliteStore` implements the same trait
//! against a WAL-mode SQLite file for production use.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::hashing::hash_stable_json;
use crate::hashing::DEFAULT_HASH_ALGORITHM;
use crate::ids::AdapterId;
use crate::ids::DecisionId;
use crate::ids::ExecutionId;
use crate::ids::PolicyId;
use crate::ids::TenantId;
use crate::ids::TraceId;
use crate::ids::WorkspaceId;
use crate::model::Adapter;
use crate::model::AdapterRegistration;
use crate::model::AuditChainEntry;
use crate::model::AuditChainHashInput;
use crate::model::AuditEntry;
use crate::model::DecisionStatus;
use crate::model::ExecutionDecisionRecord;
use crate::model::GrantedScope;
use crate::model::Policy;
use crate::model::Resolution;
use crate::model::Trace;
use crate::model::ToolAuthorization;
use crate::error::StoreError;

// ============================================================================
// SECTION: Filters
// ============================================================================

/// Filter accepted by [`GovernanceStore::list_policies`].
///
/// # Matching rules
/// - `tenant_id` must match exactly.
/// - When `workspace_id` is `Some`, a policy matches if its own
///   `scope.workspace_id` equals the filter or is `None` (global).
/// - The same rule applies to `environment`.
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    /// Tenant to list policies for.
    pub tenant_id: Option<TenantId>,
    /// Workspace to narrow by, matching global (`None`-scoped) policies
    /// too.
    pub workspace_id: Option<WorkspaceId>,
    /// Environment to narrow by, matching global policies too.
    pub environment: Option<String>,
    /// When true, only enabled policies are returned.
    pub enabled_only: bool,
}

/// Filter accepted by [`GovernanceStore::list_audit_entries`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Tenant to list audit entries for.
    pub tenant_id: TenantId,
    /// Narrow to a single execution.
    pub execution_id: Option<ExecutionId>,
    /// Maximum number of entries to return, most recent first.
    pub limit: Option<usize>,
}

// ============================================================================
// SECTION: Store Trait
// ============================================================================

/// The durable storage contract for the governance gateway.
///
/// # Invariants
/// - All decision-record status transitions are compare-and-set on the
///   prior status; see [`GovernanceStore::compare_and_set_status`].
/// - Audit appends are totally ordered per tenant by `seq` and gapless;
///   implementations must serialize appends per tenant (a per-tenant lock
///   or an equivalent atomic `max(seq)+1` inside one transaction).
pub trait GovernanceStore: Send + Sync {
    /// Inserts or replaces a policy. Last-write-wins on `(tenant_id,
    /// policy_id)`.
    fn upsert_policy(&self, policy: Policy, now_millis: i64) -> Result<(), StoreError>;

    /// Reads a single policy by identity.
    fn get_policy(&self, tenant_id: &TenantId, policy_id: &PolicyId) -> Result<Option<Policy>, StoreError>;

    /// Lists policies matching `filter`, ordered `precedence DESC,
    /// updated_at DESC`.
    fn list_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>, StoreError>;

    /// Enables or disables a policy without touching its other fields.
    fn set_policy_enabled(
        &self,
        tenant_id: &TenantId,
        policy_id: &PolicyId,
        enabled: bool,
        now_millis: i64,
    ) -> Result<(), StoreError>;

    /// Deletes a policy. Returns `Ok(())` even if it did not exist.
    fn delete_policy(&self, tenant_id: &TenantId, policy_id: &PolicyId) -> Result<(), StoreError>;

    /// Materializes a new decision record. Fails with
    /// [`StoreError::Conflict`] if `decision_id` already exists.
    fn create_decision(&self, record: ExecutionDecisionRecord) -> Result<(), StoreError>;

    /// Reads a single decision record by identity.
    fn get_decision(
        &self,
        tenant_id: &TenantId,
        decision_id: &DecisionId,
    ) -> Result<Option<ExecutionDecisionRecord>, StoreError>;

    /// Reads the most recently created decision record for an execution.
    fn get_latest_decision_for_execution(
        &self,
        tenant_id: &TenantId,
        execution_id: &ExecutionId,
    ) -> Result<Option<ExecutionDecisionRecord>, StoreError>;

    /// Finds a still-pending decision whose fingerprint matches and whose
    /// creation time is at or after `not_before_millis` (the reuse
    /// window), for fingerprint-based coalescing (C8).
    fn find_pending_decision_by_fingerprint(
        &self,
        tenant_id: &TenantId,
        fingerprint: &str,
        not_before_millis: i64,
    ) -> Result<Option<ExecutionDecisionRecord>, StoreError>;

    /// Atomically transitions a decision record's status, compare-and-set
    /// on `expected`. Returns `Ok(false)` (not an error) when the current
    /// status no longer equals `expected`; this is the only sanctioned way
    /// to resolve a double-resolve race.
    #[expect(clippy::too_many_arguments, reason = "mirrors the single atomic resolve operation in the spec")]
    fn compare_and_set_status(
        &self,
        tenant_id: &TenantId,
        decision_id: &DecisionId,
        expected: DecisionStatus,
        next: DecisionStatus,
        resolution: Option<Resolution>,
        granted_scope: Option<GrantedScope>,
        decision_token: Option<String>,
        decision_token_jti: Option<String>,
        now_millis: i64,
    ) -> Result<bool, StoreError>;

    /// Compare-and-swaps `decision_token_used_at` from `None` to
    /// `Some(now_millis)`. Returns `true` exactly once across all callers
    /// for a given decision; every subsequent call returns `false`.
    fn mark_decision_token_used(
        &self,
        tenant_id: &TenantId,
        decision_id: &DecisionId,
        jti: &str,
        now_millis: i64,
    ) -> Result<bool, StoreError>;

    /// Appends an audit entry, computing and persisting the next chain
    /// link atomically with the append.
    fn append_audit_entry(&self, entry: AuditEntry) -> Result<AuditChainEntry, StoreError>;

    /// Lists audit entries matching `filter`, most recent first.
    fn list_audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError>;

    /// Walks a tenant's audit chain and verifies every link. Returns
    /// `false` at the first break.
    fn verify_audit_chain(&self, tenant_id: &TenantId) -> Result<bool, StoreError>;

    /// Inserts a newly ingested trace.
    fn insert_trace(&self, trace: Trace) -> Result<(), StoreError>;

    /// Reads a single trace by identity.
    fn get_trace(&self, tenant_id: &TenantId, trace_id: &TraceId) -> Result<Option<Trace>, StoreError>;

    /// Lists traces for a tenant, optionally narrowed to one execution.
    fn list_traces(&self, tenant_id: &TenantId, execution_id: Option<&ExecutionId>) -> Result<Vec<Trace>, StoreError>;

    /// Upserts an adapter registration, idempotent on `(tenant_id,
    /// adapter_id)`. Creates the record on first registration, mutates in
    /// place thereafter.
    fn upsert_adapter(
        &self,
        tenant_id: &TenantId,
        adapter_id: &AdapterId,
        registration: AdapterRegistration,
        now_millis: i64,
    ) -> Result<Adapter, StoreError>;

    /// Reads a single adapter by identity.
    fn get_adapter(&self, tenant_id: &TenantId, adapter_id: &AdapterId) -> Result<Option<Adapter>, StoreError>;

    /// Records the authorization outcome for one tool invocation.
    fn insert_tool_authorization(&self, auth: ToolAuthorization) -> Result<(), StoreError>;

    /// Reads a tenant's configured budget, or `None` if unconfigured.
    fn get_tenant_budget(&self, tenant_id: &TenantId) -> Result<Option<f64>, StoreError>;

    /// Sets (or clears, with `None`) a tenant's configured budget.
    fn set_tenant_budget(&self, tenant_id: &TenantId, budget: Option<f64>) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

#[derive(Default)]
struct InMemoryState {
    policies: HashMap<(TenantId, PolicyId), (Policy, i64)>,
    decisions: HashMap<(TenantId, DecisionId), ExecutionDecisionRecord>,
    audit_log: HashMap<TenantId, Vec<AuditEntry>>,
    audit_chain: HashMap<TenantId, Vec<AuditChainEntry>>,
    traces: HashMap<(TenantId, TraceId), Trace>,
    adapters: HashMap<(TenantId, AdapterId), Adapter>,
    tool_authorizations: Vec<ToolAuthorization>,
    tenant_budgets: HashMap<TenantId, f64>,
}

/// A reference, process-local implementation of [`GovernanceStore`] backed
/// by an in-process mutex-guarded map. Suitable for tests and for running
/// the gateway without a database; not durable across restarts.
pub struct InMemoryStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InMemoryState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        #[expect(clippy::unwrap_used, reason = "poisoning means a prior panic corrupted shared state; propagating here would hide that bug")]
        self.state.lock().unwrap()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GovernanceStore for InMemoryStore {
    fn upsert_policy(&self, policy: Policy, now_millis: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        let key = (policy.scope.tenant_id.clone(), policy.policy_id.clone());
        state.policies.insert(key, (policy, now_millis));
        Ok(())
    }

    fn get_policy(&self, tenant_id: &TenantId, policy_id: &PolicyId) -> Result<Option<Policy>, StoreError> {
        let state = self.lock();
        Ok(state.policies.get(&(tenant_id.clone(), policy_id.clone())).map(|(p, _)| p.clone()))
    }

    fn list_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>, StoreError> {
        let state = self.lock();
        let mut matches: Vec<(Policy, i64)> = state
            .policies
            .values()
            .filter(|(policy, _)| {
                if let Some(tenant_id) = &filter.tenant_id {
                    if &policy.scope.tenant_id != tenant_id {
                        return false;
                    }
                }
                if filter.enabled_only && !policy.enabled {
                    return false;
                }
                if let Some(workspace_id) = &filter.workspace_id {
                    if !policy.scope.workspace_id.as_ref().is_none_or(|w| w == workspace_id) {
                        return false;
                    }
                }
                if let Some(environment) = &filter.environment {
                    if !policy.scope.environment.as_ref().is_none_or(|e| e == environment) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        matches.sort_by(|(a, a_updated), (b, b_updated)| {
            b.precedence.cmp(&a.precedence).then_with(|| b_updated.cmp(a_updated))
        });
        Ok(matches.into_iter().map(|(policy, _)| policy).collect())
    }

    fn set_policy_enabled(
        &self,
        tenant_id: &TenantId,
        policy_id: &PolicyId,
        enabled: bool,
        now_millis: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let key = (tenant_id.clone(), policy_id.clone());
        let Some((policy, updated_at)) = state.policies.get_mut(&key) else {
            return Err(StoreError::NotFound(format!("policy {policy_id} for tenant {tenant_id}")));
        };
        policy.enabled = enabled;
        *updated_at = now_millis;
        Ok(())
    }

    fn delete_policy(&self, tenant_id: &TenantId, policy_id: &PolicyId) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.policies.remove(&(tenant_id.clone(), policy_id.clone()));
        Ok(())
    }

    fn create_decision(&self, record: ExecutionDecisionRecord) -> Result<(), StoreError> {
        let mut state = self.lock();
        let key = (record.tenant_id.clone(), record.decision_id.clone());
        if state.decisions.contains_key(&key) {
            return Err(StoreError::Conflict(format!("decision {} already exists", record.decision_id)));
        }
        state.decisions.insert(key, record);
        Ok(())
    }

    fn get_decision(
        &self,
        tenant_id: &TenantId,
        decision_id: &DecisionId,
    ) -> Result<Option<ExecutionDecisionRecord>, StoreError> {
        let state = self.lock();
        Ok(state.decisions.get(&(tenant_id.clone(), decision_id.clone())).cloned())
    }

    fn get_latest_decision_for_execution(
        &self,
        tenant_id: &TenantId,
        execution_id: &ExecutionId,
    ) -> Result<Option<ExecutionDecisionRecord>, StoreError> {
        let state = self.lock();
        Ok(state
            .decisions
            .values()
            .filter(|d| &d.tenant_id == tenant_id && &d.execution_id == execution_id)
            .max_by_key(|d| d.created_at)
            .cloned())
    }

    fn find_pending_decision_by_fingerprint(
        &self,
        tenant_id: &TenantId,
        fingerprint: &str,
        not_before_millis: i64,
    ) -> Result<Option<ExecutionDecisionRecord>, StoreError> {
        let state = self.lock();
        Ok(state
            .decisions
            .values()
            .find(|d| {
                &d.tenant_id == tenant_id
                    && d.status == DecisionStatus::Pending
                    && d.fingerprint.as_deref() == Some(fingerprint)
                    && d.created_at >= not_before_millis
            })
            .cloned())
    }

    fn compare_and_set_status(
        &self,
        tenant_id: &TenantId,
        decision_id: &DecisionId,
        expected: DecisionStatus,
        next: DecisionStatus,
        resolution: Option<Resolution>,
        granted_scope: Option<GrantedScope>,
        decision_token: Option<String>,
        decision_token_jti: Option<String>,
        now_millis: i64,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let key = (tenant_id.clone(), decision_id.clone());
        let Some(record) = state.decisions.get_mut(&key) else {
            return Err(StoreError::NotFound(format!("decision {decision_id} for tenant {tenant_id}")));
        };
        if record.status != expected {
            return Ok(false);
        }
        record.status = next;
        record.resolution = resolution;
        if granted_scope.is_some() {
            record.granted_scope = granted_scope;
        }
        if decision_token.is_some() {
            record.decision_token = decision_token;
            record.decision_token_jti = decision_token_jti;
        }
        record.updated_at = now_millis;
        Ok(true)
    }

    fn mark_decision_token_used(
        &self,
        tenant_id: &TenantId,
        decision_id: &DecisionId,
        jti: &str,
        now_millis: i64,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let key = (tenant_id.clone(), decision_id.clone());
        let Some(record) = state.decisions.get_mut(&key) else {
            return Err(StoreError::NotFound(format!("decision {decision_id} for tenant {tenant_id}")));
        };
        if record.decision_token_jti.as_deref() != Some(jti) {
            return Ok(false);
        }
        if record.decision_token_used_at.is_some() {
            return Ok(false);
        }
        record.decision_token_used_at = Some(now_millis);
        Ok(true)
    }

    fn append_audit_entry(&self, entry: AuditEntry) -> Result<AuditChainEntry, StoreError> {
        let mut state = self.lock();
        let chain = state.audit_chain.entry(entry.tenant_id.clone()).or_default();
        let seq = u64::try_from(chain.len()).unwrap_or(u64::MAX).saturating_add(1);
        let prev_event_hash = chain.last().map(|e| e.event_hash.clone());
        let hash_input = AuditChainHashInput {
            tenant_id: &entry.tenant_id,
            seq,
            prev_event_hash: prev_event_hash.as_deref(),
            event_type: entry.event_type,
            event_data: &entry.event_data,
            created_at: entry.created_at,
        };
        let digest = hash_stable_json(DEFAULT_HASH_ALGORITHM, &hash_input)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let chain_entry = AuditChainEntry {
            tenant_id: entry.tenant_id.clone(),
            seq,
            prev_event_hash,
            event_hash: digest.value,
        };
        chain.push(chain_entry.clone());
        state.audit_log.entry(entry.tenant_id.clone()).or_default().push(entry);
        Ok(chain_entry)
    }

    fn list_audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let state = self.lock();
        let mut entries: Vec<AuditEntry> = state
            .audit_log
            .get(&filter.tenant_id)
            .into_iter()
            .flatten()
            .filter(|e| filter.execution_id.is_none() || e.execution_id == filter.execution_id)
            .cloned()
            .collect();
        entries.reverse();
        if let Some(limit) = filter.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    fn verify_audit_chain(&self, tenant_id: &TenantId) -> Result<bool, StoreError> {
        let state = self.lock();
        let Some(chain) = state.audit_chain.get(tenant_id) else {
            return Ok(true);
        };
        let mut expected_prev: Option<&str> = None;
        for entry in chain {
            if entry.prev_event_hash.as_deref() != expected_prev {
                return Ok(false);
            }
            expected_prev = Some(entry.event_hash.as_str());
        }
        Ok(true)
    }

    fn insert_trace(&self, trace: Trace) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.traces.insert((trace.tenant_id.clone(), trace.trace_id.clone()), trace);
        Ok(())
    }

    fn get_trace(&self, tenant_id: &TenantId, trace_id: &TraceId) -> Result<Option<Trace>, StoreError> {
        let state = self.lock();
        Ok(state.traces.get(&(tenant_id.clone(), trace_id.clone())).cloned())
    }

    fn list_traces(&self, tenant_id: &TenantId, execution_id: Option<&ExecutionId>) -> Result<Vec<Trace>, StoreError> {
        let state = self.lock();
        Ok(state
            .traces
            .values()
            .filter(|t| &t.tenant_id == tenant_id && (execution_id.is_none() || Some(&t.execution_id) == execution_id))
            .cloned()
            .collect())
    }

    fn upsert_adapter(
        &self,
        tenant_id: &TenantId,
        adapter_id: &AdapterId,
        registration: AdapterRegistration,
        now_millis: i64,
    ) -> Result<Adapter, StoreError> {
        let mut state = self.lock();
        let key = (tenant_id.clone(), adapter_id.clone());
        let adapter = state.adapters.entry(key).or_insert_with(|| Adapter {
            tenant_id: tenant_id.clone(),
            adapter_id: adapter_id.clone(),
            display_name: registration.display_name.clone(),
            risk_class: registration.risk_class,
            capabilities: registration.capabilities.clone(),
            version: registration.version.clone(),
            enabled: true,
            created_at: now_millis,
            updated_at: now_millis,
        });
        adapter.re_register(registration, now_millis);
        Ok(adapter.clone())
    }

    fn get_adapter(&self, tenant_id: &TenantId, adapter_id: &AdapterId) -> Result<Option<Adapter>, StoreError> {
        let state = self.lock();
        Ok(state.adapters.get(&(tenant_id.clone(), adapter_id.clone())).cloned())
    }

    fn insert_tool_authorization(&self, auth: ToolAuthorization) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.tool_authorizations.push(auth);
        Ok(())
    }

    fn get_tenant_budget(&self, tenant_id: &TenantId) -> Result<Option<f64>, StoreError> {
        let state = self.lock();
        Ok(state.tenant_budgets.get(tenant_id).copied())
    }

    fn set_tenant_budget(&self, tenant_id: &TenantId, budget: Option<f64>) -> Result<(), StoreError> {
        let mut state = self.lock();
        match budget {
            Some(value) => {
                state.tenant_budgets.insert(tenant_id.clone(), value);
            }
            None => {
                state.tenant_budgets.remove(tenant_id);
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PolicyEffect;
    use crate::model::PolicyScope;
    use crate::model::PolicySubject;
    use crate::model::SubjectType;
    use crate::model::Decision;
    use std::collections::BTreeMap;

    fn policy(id: &str, precedence: i64) -> Policy {
        Policy {
            policy_id: PolicyId::new(id),
            scope: PolicyScope {
                tenant_id: TenantId::new("local"),
                workspace_id: None,
                environment: None,
            },
            subject: PolicySubject {
                subject_type: SubjectType::Adapter,
                name: None,
            },
            conditions: BTreeMap::new(),
            effect: PolicyEffect { decision: Decision::Allow },
            explanation: None,
            precedence,
            enabled: true,
            wizard_meta: None,
        }
    }

    #[test]
    fn list_policies_orders_by_precedence_desc() {
        let store = InMemoryStore::new();
        store.upsert_policy(policy("low", 1), 1_000).expect("upsert");
        store.upsert_policy(policy("high", 100), 1_000).expect("upsert");
        let results = store
            .list_policies(&PolicyFilter {
                tenant_id: Some(TenantId::new("local")),
                ..Default::default()
            })
            .expect("list");
        assert_eq!(results[0].policy_id, PolicyId::new("high"));
    }

    #[test]
    fn audit_chain_links_are_contiguous() {
        let store = InMemoryStore::new();
        let tenant = TenantId::new("local");
        for i in 0..3 {
            store
                .append_audit_entry(AuditEntry {
                    tenant_id: tenant.clone(),
                    workspace_id: None,
                    execution_id: None,
                    trace_id: None,
                    user_id: None,
                    event_type: crate::model::AuditEventType::AdapterAuditEvent,
                    event_data: serde_json::json!({"i": i}),
                    created_at: 1_000 + i,
                })
                .expect("append");
        }
        assert!(store.verify_audit_chain(&tenant).expect("verify"));
    }

    #[test]
    fn double_resolve_is_rejected_by_compare_and_set() {
        let store = InMemoryStore::new();
        let tenant = TenantId::new("local");
        let decision_id = DecisionId::new("d-1");
        store
            .create_decision(ExecutionDecisionRecord {
                decision_id: decision_id.clone(),
                tenant_id: tenant.clone(),
                workspace_id: WorkspaceId::new("ws-1"),
                execution_id: ExecutionId::new("exec-1"),
                adapter_id: AdapterId::new("claude-code"),
                status: DecisionStatus::Pending,
                required_role: None,
                expires_at: None,
                request_snapshot: serde_json::json!({}),
                granted_scope: None,
                resolution: None,
                decision_token: None,
                decision_token_jti: None,
                decision_token_used_at: None,
                fingerprint: None,
                created_at: 1_000,
                updated_at: 1_000,
            })
            .expect("create");
        let first = store
            .compare_and_set_status(&tenant, &decision_id, DecisionStatus::Pending, DecisionStatus::Approved, None, None, None, None, 2_000)
            .expect("cas");
        assert!(first);
        let second = store
            .compare_and_set_status(&tenant, &decision_id, DecisionStatus::Pending, DecisionStatus::Denied, None, None, None, None, 3_000)
            .expect("cas");
        assert!(!second);
    }

    #[test]
    fn token_can_only_be_marked_used_once() {
        let store = InMemoryStore::new();
        let tenant = TenantId::new("local");
        let decision_id = DecisionId::new("d-1");
        store
            .create_decision(ExecutionDecisionRecord {
                decision_id: decision_id.clone(),
                tenant_id: tenant.clone(),
                workspace_id: WorkspaceId::new("ws-1"),
                execution_id: ExecutionId::new("exec-1"),
                adapter_id: AdapterId::new("claude-code"),
                status: DecisionStatus::Approved,
                required_role: None,
                expires_at: None,
                request_snapshot: serde_json::json!({}),
                granted_scope: None,
                resolution: None,
                decision_token: Some("token".to_string()),
                decision_token_jti: Some("jti-1".to_string()),
                decision_token_used_at: None,
                fingerprint: None,
                created_at: 1_000,
                updated_at: 1_000,
            })
            .expect("create");
        assert!(store.mark_decision_token_used(&tenant, &decision_id, "jti-1", 2_000).expect("mark"));
        assert!(!store.mark_decision_token_used(&tenant, &decision_id, "jti-1", 3_000).expect("mark"));
    }
}
