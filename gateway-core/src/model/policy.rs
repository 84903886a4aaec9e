// gateway-core/src/model/policy.rs
// ============================================================================
// Module: Policy Model
// Description: Scoped governance rules matched by the policy evaluator.
// Purpose: Represent a policy exactly as persisted, independent of how it
// is matched or ranked.
// Dependencies: serde, serde_json
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::conditions::ConditionExpr;
use crate::ids::PolicyId;
use crate::ids::TenantId;
use crate::ids::WorkspaceId;

// ============================================================================
// SECTION: Scope
// ============================================================================

/// Scope a policy applies to. Present fields must match exactly; absent
/// fields are treated as global (they match any value at evaluation time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyScope {
    /// Owning tenant. Always present.
    pub tenant_id: TenantId,
    /// Workspace the policy is scoped to, or `None` for all workspaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
    /// Environment name (e.g. `"production"`), or `None` for all
    /// environments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl PolicyScope {
    /// Returns the specificity rank used for ordering matched policies:
    /// `workspace_id + environment` > `environment` alone > anything else.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        match (&self.workspace_id, &self.environment) {
            (Some(_), Some(_)) => 2,
            (None, Some(_)) => 1,
            _ => 0,
        }
    }
}

// ============================================================================
// SECTION: Subject
// ============================================================================

/// The kind of entity a policy's subject constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    /// A specific tool invocation.
    Tool,
    /// Any request from an adapter, regardless of tool.
    Adapter,
    /// A skill identifier.
    Skill,
    /// An execution environment.
    Environment,
    /// The computed risk level.
    Risk,
    /// Cost-related requests.
    Cost,
}

/// The subject a policy constrains. `name` further narrows the subject
/// (e.g. a specific tool name) and is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySubject {
    /// Kind of subject.
    #[serde(rename = "type")]
    pub subject_type: SubjectType,
    /// Name narrowing the subject, or `None` to match any name of this
    /// type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ============================================================================
// SECTION: Effect
// ============================================================================

/// The decision a policy produces for the caller when it wins evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Permit the request.
    Allow,
    /// Block the request.
    Deny,
    /// Require human approval before proceeding.
    RequireApproval,
}

impl Decision {
    /// Returns the severity rank used to break ties among equally
    /// specific, equal-precedence matched policies: `deny` > `require_approval`
    /// > `allow`.
    #[must_use]
    pub fn severity(self) -> u8 {
        match self {
            Self::Deny => 2,
            Self::RequireApproval => 1,
            Self::Allow => 0,
        }
    }
}

/// The effect a policy produces when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEffect {
    /// The decision this policy contributes when it wins evaluation.
    pub decision: Decision,
}

// ============================================================================
// SECTION: Wizard Metadata
// ============================================================================

/// Provenance receipt attached by the setup wizard when it authored a
/// policy. Display-only: evaluation must never branch on its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardMeta {
    /// Opaque provenance payload, shown verbatim in the operator console.
    #[serde(flatten)]
    pub attestation: BTreeMap<String, Value>,
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// A single governance rule. Identity is `(tenant_id, policy_id)`.
///
/// # Invariants
/// - `parse(serialize(policy)) == policy` for any valid policy (round-trip
///   preserves scope/subject/conditions/effect/precedence/enabled).
/// - `wizard_meta` never influences evaluation; it is provenance only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy identifier, unique within the owning tenant.
    pub policy_id: PolicyId,
    /// Scope this policy applies to.
    pub scope: PolicyScope,
    /// Subject this policy constrains.
    pub subject: PolicySubject,
    /// Field-keyed condition expressions; absent means the policy matches
    /// unconditionally (subject/scope permitting).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, ConditionExpr>,
    /// The effect produced when this policy wins evaluation.
    pub effect: PolicyEffect,
    /// Human-readable explanation surfaced to operators and adapters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Ranking used to break ties among matched policies; higher wins.
    #[serde(default)]
    pub precedence: i64,
    /// Whether this policy is considered during evaluation.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Provenance receipt, if authored via the setup wizard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wizard_meta: Option<WizardMeta>,
}

/// Default value for [`Policy::enabled`].
fn default_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy() -> Policy {
        Policy {
            policy_id: PolicyId::new("deny_delete_file"),
            scope: PolicyScope {
                tenant_id: TenantId::new("local"),
                workspace_id: None,
                environment: None,
            },
            subject: PolicySubject {
                subject_type: SubjectType::Tool,
                name: Some("delete_file".to_string()),
            },
            conditions: BTreeMap::new(),
            effect: PolicyEffect {
                decision: Decision::Deny,
            },
            explanation: None,
            precedence: 100,
            enabled: true,
            wizard_meta: None,
        }
    }

    #[test]
    fn round_trips_through_json() {
        let policy = sample_policy();
        let json = serde_json::to_string(&policy).expect("serialize");
        let back: Policy = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, policy);
    }

    #[test]
    fn global_scope_has_lowest_specificity() {
        let scope = PolicyScope {
            tenant_id: TenantId::new("local"),
            workspace_id: None,
            environment: None,
        };
        assert_eq!(scope.specificity(), 0);
    }

    #[test]
    fn deny_outranks_require_approval_outranks_allow() {
        assert!(Decision::Deny.severity() > Decision::RequireApproval.severity());
        assert!(Decision::RequireApproval.severity() > Decision::Allow.severity());
    }
}
