// gateway-core/src/engine.rs
// ============================================================================
// Module: Decision Engine (C7)
// Description: Fuses RBAC, risk, budget, and policy into the final
// allow/deny/require_approval outcome plus a granted capability scope.
// Purpose: The single entry point `requestDecision` calls into.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `decide` is pure and synchronous: it never touches storage or the
//! clock itself (the caller supplies `now_millis`), so it can be
//! unit-tested exhaustively. Materializing a pending decision record and
//! issuing a decision token (C8) happens in the caller, keyed off
//! `DecisionOutcome::requires_approval`.

use serde::Deserialize;
use serde::Serialize;

use crate::budget::check_budget;
use crate::budget::residual_max_cost;
use crate::context::PolicyContext;
use crate::evaluator::evaluate;
use crate::evaluator::PolicyTrace;
use crate::ids::PolicyId;
use crate::model::Decision;
use crate::model::GrantedScope;
use crate::model::Policy;
use crate::risk::score;
use crate::risk::RiskAssessment;
use crate::risk::RiskLevel;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default step cap applied when neither the request nor any matched
/// policy supplies one.
pub const DEFAULT_MAX_STEPS: u32 = 100;
/// Lifetime of a granted scope, in milliseconds.
pub const GRANTED_SCOPE_TTL_MILLIS: i64 = 15 * 60 * 1000;

// ============================================================================
// SECTION: Approval Mode
// ============================================================================

/// The two approval-fork modes (§6 config surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Auto-allow `require_approval` and high/critical-risk outcomes,
    /// marking them clearly in trace and explanation. The OSS default.
    #[default]
    Simulate,
    /// Return `require_approval` to the caller; the adapter is expected to
    /// wait via C8.
    Enforce,
}

// ============================================================================
// SECTION: Operator Override
// ============================================================================

/// An operator-side override that bypasses a governance outcome. Always
/// audited and always downgrades trust (`LOCAL_OVERRIDE` in the
/// glossary).
#[derive(Debug, Clone)]
pub struct GovernanceOverride {
    /// Structured reason code.
    pub reason_code: String,
    /// Free-form operator justification.
    pub justification: String,
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// Everything [`decide`] needs beyond the context itself.
#[derive(Debug, Clone)]
pub struct DecisionRequest<'a> {
    /// The request context (includes tenant/workspace/adapter/etc).
    pub context: &'a PolicyContext,
    /// Whether RBAC permits this request at all; checked first.
    pub rbac_allowed: bool,
    /// The tenant's configured budget, or `None` for unlimited.
    pub configured_budget: Option<f64>,
    /// Enabled policies already filtered to scope, ordered `precedence
    /// DESC, updated_at DESC`.
    pub policies: &'a [Policy],
    /// Whether only the `eq` operator is honored (`policy_operators_enabled
    /// == false`).
    pub legacy_operators: bool,
    /// The configured approval-fork mode.
    pub approval_mode: ApprovalMode,
    /// An operator override, if supplied with this request.
    pub override_: Option<GovernanceOverride>,
    /// Adapter-requested step cap, if any.
    pub requested_max_steps: Option<u32>,
    /// The strictest step cap among matched policies, if any impose one.
    pub policy_max_steps_cap: Option<u32>,
    /// Current time, in Unix milliseconds.
    pub now_millis: i64,
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// The full decision envelope produced by [`decide`].
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    /// The final decision.
    pub decision: Decision,
    /// Whether the request is permitted to proceed right now.
    pub allowed: bool,
    /// Whether the adapter must wait for operator resolution (C8).
    pub requires_approval: bool,
    /// Stable reason code when `allowed` is false.
    pub blocked_reason: Option<&'static str>,
    /// The capability grant. Present whenever the request is allowed, and
    /// also pre-computed (§4.7 step 9) for a `require_approval` outcome so
    /// the pending record already carries the scope it would grant on
    /// approval. `None` only when the request is denied outright.
    pub granted_scope: Option<GrantedScope>,
    /// Policies that matched during evaluation.
    pub matched_policies: Vec<PolicyId>,
    /// Per-policy condition trace.
    pub decision_trace: Vec<PolicyTrace>,
    /// Human-readable explanation.
    pub explanation: String,
    /// The approval mode this outcome was computed under.
    pub approval_mode: ApprovalMode,
    /// True when a `require_approval` or high-risk outcome was
    /// auto-allowed under `simulate` mode.
    pub auto_allowed_in_core: bool,
    /// True iff no policy matched (the fallback rule fired alone).
    pub policy_fallback_hit: bool,
    /// True iff an operator override was applied to reach this outcome.
    pub ops_override_used: bool,
    /// The computed risk assessment.
    pub risk: RiskAssessment,
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Runs the full governance pipeline for one request.
#[must_use]
pub fn decide(request: &DecisionRequest<'_>) -> DecisionOutcome {
    let risk = score(request.context);

    if !request.rbac_allowed {
        return DecisionOutcome {
            decision: Decision::Deny,
            allowed: false,
            requires_approval: false,
            blocked_reason: Some("rbac_denied"),
            granted_scope: None,
            matched_policies: Vec::new(),
            decision_trace: Vec::new(),
            explanation: "RBAC denied this request".to_string(),
            approval_mode: request.approval_mode,
            auto_allowed_in_core: false,
            policy_fallback_hit: false,
            ops_override_used: false,
            risk,
        };
    }

    let budget = check_budget(&request.context.tenant_id, request.context.estimated_cost, request.configured_budget);
    let policy_context = request.context;
    let evaluation = evaluate(policy_context, request.policies, request.legacy_operators);
    let has_override = request.override_.is_some();

    if !budget.allowed && !has_override {
        return DecisionOutcome {
            decision: Decision::Deny,
            allowed: false,
            requires_approval: false,
            blocked_reason: budget.reason,
            granted_scope: None,
            matched_policies: evaluation.matched_policies,
            decision_trace: evaluation.decision_trace,
            explanation: evaluation.explanation,
            approval_mode: request.approval_mode,
            auto_allowed_in_core: false,
            policy_fallback_hit: evaluation.policy_fallback_hit,
            ops_override_used: false,
            risk,
        };
    }

    if evaluation.decision == Decision::Deny && !has_override {
        return DecisionOutcome {
            decision: Decision::Deny,
            allowed: false,
            requires_approval: false,
            blocked_reason: Some("policy_denied"),
            granted_scope: None,
            matched_policies: evaluation.matched_policies,
            decision_trace: evaluation.decision_trace,
            explanation: evaluation.explanation,
            approval_mode: request.approval_mode,
            auto_allowed_in_core: false,
            policy_fallback_hit: evaluation.policy_fallback_hit,
            ops_override_used: false,
            risk,
        };
    }

    let policy_forks = evaluation.decision == Decision::RequireApproval;
    let risk_forks = matches!(risk.level, RiskLevel::High | RiskLevel::Critical);

    if (policy_forks || risk_forks) && !has_override {
        return fork(&evaluation.matched_policies, evaluation.decision_trace, &evaluation.explanation, request, &risk, &budget, policy_forks);
    }

    let ops_override_used = has_override;
    let granted_scope = build_granted_scope(request, &budget);

    DecisionOutcome {
        decision: Decision::Allow,
        allowed: true,
        requires_approval: false,
        blocked_reason: None,
        granted_scope: Some(granted_scope),
        matched_policies: evaluation.matched_policies,
        decision_trace: evaluation.decision_trace,
        explanation: evaluation.explanation,
        approval_mode: request.approval_mode,
        auto_allowed_in_core: false,
        policy_fallback_hit: evaluation.policy_fallback_hit,
        ops_override_used,
        risk,
    }
}

/// Implements the approval-mode fork shared by policy-triggered and
/// risk-triggered `require_approval` outcomes.
fn fork(
    matched_policies: &[PolicyId],
    decision_trace: Vec<PolicyTrace>,
    explanation: &str,
    request: &DecisionRequest<'_>,
    risk: &RiskAssessment,
    budget: &crate::budget::BudgetCheck,
    policy_forks: bool,
) -> DecisionOutcome {
    match request.approval_mode {
        ApprovalMode::Enforce => {
            let granted_scope = build_granted_scope(request, budget);
            DecisionOutcome {
                decision: Decision::RequireApproval,
                allowed: false,
                requires_approval: true,
                blocked_reason: None,
                granted_scope: Some(granted_scope),
                matched_policies: matched_policies.to_vec(),
                decision_trace,
                explanation: explanation.to_string(),
                approval_mode: request.approval_mode,
                auto_allowed_in_core: false,
                policy_fallback_hit: !policy_forks && matched_policies.is_empty(),
                ops_override_used: false,
                risk: risk.clone(),
            }
        }
        ApprovalMode::Simulate => {
            let granted_scope = build_granted_scope(request, budget);
            DecisionOutcome {
                decision: Decision::Allow,
                allowed: true,
                requires_approval: false,
                blocked_reason: None,
                granted_scope: Some(granted_scope),
                matched_policies: matched_policies.to_vec(),
                decision_trace,
                explanation: format!("{explanation} (auto-allowed in core: simulate mode)"),
                approval_mode: request.approval_mode,
                auto_allowed_in_core: true,
                policy_fallback_hit: false,
                ops_override_used: false,
                risk: risk.clone(),
            }
        }
    }
}

/// Builds the capability grant for an allowed outcome.
fn build_granted_scope(request: &DecisionRequest<'_>, budget: &crate::budget::BudgetCheck) -> GrantedScope {
    let requested_steps = request.requested_max_steps.unwrap_or(DEFAULT_MAX_STEPS);
    let max_steps = match request.policy_max_steps_cap {
        Some(cap) => requested_steps.min(cap),
        None => requested_steps,
    };
    let max_cost = residual_max_cost(request.context.estimated_cost, budget.remaining);
    GrantedScope {
        capabilities: request.context.requested_capabilities.clone(),
        max_steps,
        max_cost,
        expires_at: request.now_millis.saturating_add(GRANTED_SCOPE_TTL_MILLIS),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::TemplateVars;
    use crate::context::Provenance;
    use crate::ids::AdapterId;
    use crate::ids::TenantId;
    use crate::ids::WorkspaceId;
    use crate::model::PolicyEffect;
    use crate::model::PolicyScope;
    use crate::model::PolicySubject;
    use crate::model::RiskClass;
    use crate::model::SubjectType;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn context() -> PolicyContext {
        PolicyContext {
            tenant_id: TenantId::new("local"),
            workspace_id: WorkspaceId::new("ws-1"),
            environment: None,
            adapter_id: AdapterId::new("claude-code"),
            adapter_risk_class: RiskClass::Low,
            tool: Some("exec".to_string()),
            tool_group: None,
            skill_state: None,
            estimated_cost: 1.0,
            requested_capabilities: vec!["external_network".to_string()],
            intent: None,
            structured_context: json!({}),
            provenance: Provenance::Verified,
            template_vars: TemplateVars::default(),
        }
    }

    fn approval_policy() -> Policy {
        Policy {
            policy_id: PolicyId::new("approval_external_network"),
            scope: PolicyScope {
                tenant_id: TenantId::new("local"),
                workspace_id: None,
                environment: None,
            },
            subject: PolicySubject {
                subject_type: SubjectType::Adapter,
                name: None,
            },
            conditions: {
                let mut m = BTreeMap::new();
                m.insert(
                    "requested_capabilities".to_string(),
                    crate::conditions::ConditionExpr::In(vec![json!("external_network")]),
                );
                m
            },
            effect: PolicyEffect {
                decision: Decision::RequireApproval,
            },
            explanation: None,
            precedence: 0,
            enabled: true,
            wizard_meta: None,
        }
    }

    #[test]
    fn rbac_denied_short_circuits_everything() {
        let ctx = context();
        let request = DecisionRequest {
            context: &ctx,
            rbac_allowed: false,
            configured_budget: None,
            policies: &[],
            legacy_operators: false,
            approval_mode: ApprovalMode::Enforce,
            override_: None,
            requested_max_steps: None,
            policy_max_steps_cap: None,
            now_millis: 0,
        };
        let outcome = decide(&request);
        assert_eq!(outcome.blocked_reason, Some("rbac_denied"));
        assert!(!outcome.allowed);
    }

    #[test]
    fn s2_require_approval_in_simulate_auto_allows() {
        let ctx = context();
        let policies = vec![];
        let request = DecisionRequest {
            context: &ctx,
            rbac_allowed: true,
            configured_budget: None,
            policies: &policies,
            legacy_operators: false,
            approval_mode: ApprovalMode::Simulate,
            override_: None,
            requested_max_steps: None,
            policy_max_steps_cap: None,
            now_millis: 0,
        };
        // Force the risk-triggered fork deterministically via a high adapter
        // risk class and privileged capability mix instead of relying on a
        // policy match, keeping this test independent of evaluator wiring.
        let mut high_risk_ctx = ctx.clone();
        high_risk_ctx.adapter_risk_class = RiskClass::High;
        high_risk_ctx.requested_capabilities =
            vec!["process_spawn".to_string(), "credential_read".to_string(), "network_admin".to_string()];
        let request = DecisionRequest {
            context: &high_risk_ctx,
            ..request
        };
        let outcome = decide(&request);
        assert_eq!(outcome.decision, Decision::Allow);
        assert!(outcome.auto_allowed_in_core);
    }

    #[test]
    fn enforce_mode_returns_pending_for_require_approval_policy() {
        let ctx = context();
        let policies = vec![approval_policy()];
        let request = DecisionRequest {
            context: &ctx,
            rbac_allowed: true,
            configured_budget: None,
            policies: &policies,
            legacy_operators: false,
            approval_mode: ApprovalMode::Enforce,
            override_: None,
            requested_max_steps: None,
            policy_max_steps_cap: None,
            now_millis: 0,
        };
        let outcome = decide(&request);
        assert_eq!(outcome.decision, Decision::RequireApproval);
        assert!(outcome.requires_approval);
        assert!(!outcome.allowed);
        let scope = outcome.granted_scope.expect("pending outcome pre-computes its eventual grant");
        assert_eq!(scope.capabilities, vec!["external_network".to_string()]);
        assert!(scope.max_steps > 0);
    }

    #[test]
    fn override_bypasses_the_approval_fork() {
        let ctx = context();
        let policies = vec![approval_policy()];
        let request = DecisionRequest {
            context: &ctx,
            rbac_allowed: true,
            configured_budget: None,
            policies: &policies,
            legacy_operators: false,
            approval_mode: ApprovalMode::Enforce,
            override_: Some(GovernanceOverride {
                reason_code: "incident_response".to_string(),
                justification: "on-call approved via phone".to_string(),
            }),
            requested_max_steps: None,
            policy_max_steps_cap: None,
            now_millis: 0,
        };
        let outcome = decide(&request);
        assert_eq!(outcome.decision, Decision::Allow);
        assert!(outcome.ops_override_used);
    }

    #[test]
    fn granted_scope_residual_is_never_negative() {
        let mut ctx = context();
        ctx.estimated_cost = 1_000.0;
        let request = DecisionRequest {
            context: &ctx,
            rbac_allowed: true,
            configured_budget: Some(10.0),
            policies: &[],
            legacy_operators: false,
            approval_mode: ApprovalMode::Enforce,
            override_: Some(GovernanceOverride {
                reason_code: "budget_waiver".to_string(),
                justification: "approved".to_string(),
            }),
            requested_max_steps: None,
            policy_max_steps_cap: None,
            now_millis: 0,
        };
        let outcome = decide(&request);
        let scope = outcome.granted_scope.expect("allowed outcome carries a granted scope");
        assert!(scope.max_cost >= 0.0);
    }
}
