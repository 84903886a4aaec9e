// gateway-core/src/evaluator.rs
// ============================================================================
// Module: Policy Evaluator (C4)
// Description: Scope + subject + condition matching, precedence ordering,
// and fallback-allow.
// Purpose: Given a context and a candidate set of enabled policies, decide
// which one wins and why.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The evaluator never touches storage; callers pass it the policies
//! already filtered to the tenant/workspace/environment scope (C2's
//! `listPolicies`). It is pure: same inputs, same `EvaluationOutcome`.
//!
//! When `legacy_operators` is set (the `policy_operators_enabled` flag,
//! inverted: legacy mode means the extended operators are disabled), only
//! the `eq` shorthand/operator is honored; every other operator is treated
//! as a non-match. The extended operator set is the default.

use crate::conditions::evaluate_condition;
use crate::conditions::ConditionExpr;
use crate::conditions::ConditionTrace;
use crate::context::PolicyContext;
use crate::ids::PolicyId;
use crate::model::Decision;
use crate::model::Policy;
use crate::model::SubjectType;

// ============================================================================
// SECTION: Evaluation Outcome
// ============================================================================

/// The result of evaluating a context against a set of policies.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EvaluationOutcome {
    /// The winning decision, or `Allow` with an empty `matched_policies`
    /// list when nothing matched (the fallback).
    pub decision: Decision,
    /// Identifiers of every policy that matched (scope, subject, and
    /// conditions all satisfied), in evaluation order.
    pub matched_policies: Vec<PolicyId>,
    /// Per-policy, per-field condition traces, in evaluation order.
    pub decision_trace: Vec<PolicyTrace>,
    /// Human-readable explanation of the winning outcome.
    pub explanation: String,
    /// True iff exactly one policy matched and it is the fallback-marked
    /// rule (see module docs: the evaluator itself never marks a real
    /// policy as a fallback; this is true only when no policy matched at
    /// all).
    pub policy_fallback_hit: bool,
}

/// The per-policy trace entry recorded during evaluation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PolicyTrace {
    /// The policy this trace entry describes.
    pub policy_id: PolicyId,
    /// Whether the policy's scope matched the context.
    pub scope_matched: bool,
    /// Whether the policy's subject matched the context.
    pub subject_matched: bool,
    /// Per-field condition traces; empty if the policy had no conditions.
    pub conditions: Vec<ConditionTrace>,
    /// Whether this policy, overall, matched (scope AND subject AND all
    /// conditions).
    pub matched: bool,
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates `context` against `policies`, which must already be filtered
/// to the applicable scope and ordered `precedence DESC, updated_at DESC`
/// as C2's `listPolicies` guarantees; only enabled policies should be
/// passed in.
///
/// `legacy_operators`: when true, only the `eq` operator (including scalar
/// shorthand) is honored; all other operators never match. This is the
/// `policy_operators_enabled` feature flag, preserved per the open
/// question in the design notes.
#[must_use]
pub fn evaluate(context: &PolicyContext, policies: &[Policy], legacy_operators: bool) -> EvaluationOutcome {
    let mut matched = Vec::new();
    let mut trace = Vec::new();

    for policy in policies {
        let scope_matched = scope_matches(policy, context);
        let subject_matched = scope_matched && subject_matches(policy, context);
        let conditions = if subject_matched {
            evaluate_conditions(policy, context, legacy_operators)
        } else {
            Vec::new()
        };
        let conditions_matched = conditions.iter().all(|c| c.result);
        let overall = subject_matched && conditions_matched;

        trace.push(PolicyTrace {
            policy_id: policy.policy_id.clone(),
            scope_matched,
            subject_matched,
            conditions,
            matched: overall,
        });

        if overall {
            matched.push(policy);
        }
    }

    if matched.is_empty() {
        return EvaluationOutcome {
            decision: Decision::Allow,
            matched_policies: Vec::new(),
            decision_trace: trace,
            explanation: "No matching policy".to_string(),
            policy_fallback_hit: true,
        };
    }

    matched.sort_by(|a, b| {
        b.precedence
            .cmp(&a.precedence)
            .then_with(|| b.scope.specificity().cmp(&a.scope.specificity()))
            .then_with(|| b.effect.decision.severity().cmp(&a.effect.decision.severity()))
    });

    let Some(winner) = matched.first().copied() else {
        return EvaluationOutcome {
            decision: Decision::Allow,
            matched_policies: Vec::new(),
            decision_trace: trace,
            explanation: "No matching policy".to_string(),
            policy_fallback_hit: true,
        };
    };
    let explanation = winner.explanation.clone().unwrap_or_else(|| derive_explanation(winner, &trace));

    EvaluationOutcome {
        decision: winner.effect.decision,
        matched_policies: matched.iter().map(|p| p.policy_id.clone()).collect(),
        decision_trace: trace,
        explanation,
        policy_fallback_hit: false,
    }
}

// ============================================================================
// SECTION: Scope & Subject Matching
// ============================================================================

/// Returns true if every present scope field on `policy` equals the
/// corresponding context field.
fn scope_matches(policy: &Policy, context: &PolicyContext) -> bool {
    if policy.scope.tenant_id != context.tenant_id {
        return false;
    }
    if let Some(workspace_id) = &policy.scope.workspace_id {
        if workspace_id != &context.workspace_id {
            return false;
        }
    }
    if let Some(environment) = &policy.scope.environment {
        if Some(environment) != context.environment.as_ref() {
            return false;
        }
    }
    true
}

/// Returns true if the policy's subject type and (optional) name match the
/// context.
fn subject_matches(policy: &Policy, context: &PolicyContext) -> bool {
    let actual_name: Option<&str> = match policy.subject.subject_type {
        SubjectType::Tool => context.tool.as_deref(),
        SubjectType::Adapter => Some(context.adapter_id.as_str()),
        SubjectType::Skill => context.tool_group.as_deref(),
        SubjectType::Environment => context.environment.as_deref(),
        SubjectType::Risk | SubjectType::Cost => None,
    };
    match &policy.subject.name {
        None => true,
        Some(expected) => actual_name == Some(expected.as_str()),
    }
}

// ============================================================================
// SECTION: Condition Matching
// ============================================================================

/// Evaluates every field condition on `policy`, short-circuiting at the
/// first non-match (subsequent fields are not evaluated, matching the
/// "first non-match short-circuits" rule; their absence from the trace is
/// intentional since they were never checked).
fn evaluate_conditions(policy: &Policy, context: &PolicyContext, legacy_operators: bool) -> Vec<ConditionTrace> {
    let mut traces = Vec::new();
    for (field, expr) in &policy.conditions {
        if legacy_operators && !matches!(expr, ConditionExpr::Eq(_)) {
            traces.push(ConditionTrace {
                field: field.clone(),
                operator: "eq",
                expected: serde_json::Value::Null,
                actual: None,
                result: false,
            });
            break;
        }
        let actual = context.resolve_field(field);
        let condition_trace = evaluate_condition(field, expr, actual.as_ref(), &context.template_vars);
        let matched = condition_trace.result;
        traces.push(condition_trace);
        if !matched {
            break;
        }
    }
    traces
}

// ============================================================================
// SECTION: Explanation
// ============================================================================

/// Derives a human-readable explanation from the winning policy's
/// condition trace when the policy did not supply its own `explanation`.
fn derive_explanation(winner: &Policy, trace: &[PolicyTrace]) -> String {
    let verb = match winner.effect.decision {
        Decision::Allow => "Allowed",
        Decision::Deny => "Blocked",
        Decision::RequireApproval => "Requires approval",
    };
    let winner_trace = trace.iter().find(|t| t.policy_id == winner.policy_id);
    let Some(winner_trace) = winner_trace else {
        return format!("{verb}: policy {}", winner.policy_id);
    };
    let Some(last_condition) = winner_trace.conditions.last() else {
        return format!("{verb}: policy {} matched unconditionally", winner.policy_id);
    };
    format!(
        "{verb}: {} {} {}",
        last_condition.field, last_condition.operator, last_condition.expected
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::TemplateVars;
    use crate::ids::AdapterId;
    use crate::ids::TenantId;
    use crate::ids::WorkspaceId;
    use crate::model::PolicyEffect;
    use crate::model::PolicyScope;
    use crate::model::PolicySubject;
    use crate::model::RiskClass;
    use crate::context::Provenance;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn base_context() -> PolicyContext {
        PolicyContext {
            tenant_id: TenantId::new("local"),
            workspace_id: WorkspaceId::new("ws-1"),
            environment: None,
            adapter_id: AdapterId::new("claude-code"),
            adapter_risk_class: RiskClass::Medium,
            tool: Some("delete_file".to_string()),
            tool_group: None,
            skill_state: None,
            estimated_cost: 0.0,
            requested_capabilities: vec![],
            intent: None,
            structured_context: json!({}),
            provenance: Provenance::Asserted,
            template_vars: TemplateVars::default(),
        }
    }

    fn policy(id: &str, subject_name: Option<&str>, decision: Decision, precedence: i64) -> Policy {
        Policy {
            policy_id: PolicyId::new(id),
            scope: PolicyScope {
                tenant_id: TenantId::new("local"),
                workspace_id: None,
                environment: None,
            },
            subject: PolicySubject {
                subject_type: SubjectType::Tool,
                name: subject_name.map(str::to_string),
            },
            conditions: BTreeMap::new(),
            effect: PolicyEffect { decision },
            explanation: None,
            precedence,
            enabled: true,
            wizard_meta: None,
        }
    }

    #[test]
    fn s1_deny_by_tool_identity() {
        let ctx = base_context();
        let policies = vec![policy("deny_delete_file", Some("delete_file"), Decision::Deny, 100)];
        let outcome = evaluate(&ctx, &policies, false);
        assert_eq!(outcome.decision, Decision::Deny);
        assert_eq!(outcome.matched_policies, vec![PolicyId::new("deny_delete_file")]);
        assert!(!outcome.policy_fallback_hit);
    }

    #[test]
    fn no_match_falls_back_to_allow() {
        let ctx = base_context();
        let outcome = evaluate(&ctx, &[], false);
        assert_eq!(outcome.decision, Decision::Allow);
        assert!(outcome.matched_policies.is_empty());
        assert!(outcome.policy_fallback_hit);
        assert_eq!(outcome.explanation, "No matching policy");
    }

    #[test]
    fn higher_precedence_allow_overrides_lower_precedence_require_approval() {
        let mut ctx = base_context();
        ctx.tool = Some("exec".to_string());
        let base = policy("base_exec_approval", Some("exec"), Decision::RequireApproval, 20);
        let exception = policy("exec_ls_allowed", Some("exec"), Decision::Allow, 30);
        let outcome = evaluate(&ctx, &[base, exception], false);
        assert_eq!(outcome.decision, Decision::Allow);
        assert_eq!(outcome.matched_policies.len(), 2);
    }
}
