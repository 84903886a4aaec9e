// gateway-core/src/context.rs
// ============================================================================
// Module: Policy Context
// Description: The typed request context threaded through C4/C5/C6/C7.
// Purpose: Provide a single, well-defined shape for "everything known about
// this request" instead of ad hoc reflection over untrusted maps.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! `PolicyContext` is the typed `ContextValue` union called for in the
//! design notes: every field the evaluator, risk scorer, and budget
//! manager consult is named here. The free-form `structured_context` field
//! carries adapter-supplied nested data (`context.exec.argv0`,
//! `context.targets.paths`, …) addressed only through
//! [`crate::conditions::resolve_dotted_path`], never through direct map
//! indexing.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::conditions::TemplateVars;
use crate::ids::AdapterId;
use crate::ids::TenantId;
use crate::ids::WorkspaceId;
use crate::model::RiskClass;

// ============================================================================
// SECTION: Skill State
// ============================================================================

/// Lifecycle state of the skill a request is associated with, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillState {
    /// Skill has passed its validation suite.
    Tested,
    /// Skill is pinned to a known-good version.
    Pinned,
    /// Skill is under active development.
    Draft,
    /// Skill is marked for removal.
    Deprecated,
}

// ============================================================================
// SECTION: Provenance
// ============================================================================

/// Trust provenance of the request's originating skill or policy author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Authored and verified by the operator.
    Verified,
    /// Self-attested by the adapter or skill author, unverified.
    Asserted,
    /// No provenance information supplied.
    Untested,
}

// ============================================================================
// SECTION: Policy Context
// ============================================================================

/// Everything the governance pipeline knows about one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyContext {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Environment name, if the adapter reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Requesting adapter.
    pub adapter_id: AdapterId,
    /// Adapter's risk classification, as registered.
    pub adapter_risk_class: RiskClass,
    /// The tool being invoked, if this request is tool-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// The tool group the tool belongs to, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_group: Option<String>,
    /// Lifecycle state of the associated skill, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_state: Option<SkillState>,
    /// Estimated cost of the requested action, in the tenant's budget
    /// unit.
    pub estimated_cost: f64,
    /// Capabilities the adapter is requesting for this execution.
    #[serde(default)]
    pub requested_capabilities: Vec<String>,
    /// Free-text statement of intent supplied by the adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Adapter-supplied nested context (`exec`, `targets`, `side_effects`,
    /// …), addressed only through dotted-path lookups. Always a JSON
    /// object; a non-object value is treated as empty.
    #[serde(default = "default_structured_context")]
    pub structured_context: Value,
    /// Provenance of the request's originating skill or policy.
    pub provenance: Provenance,
    /// Template variables available to condition string literals.
    #[serde(skip)]
    pub template_vars: TemplateVars,
}

impl PolicyContext {
    /// Resolves a condition field. Named top-level fields are checked
    /// first; `capability` is an alias for `requested_capabilities`, both
    /// resolving to the full requested-capability list so array-aware
    /// operators (see `conditions::evaluate_condition`) can test
    /// membership. Anything else falls back to a dotted path into
    /// `structured_context`.
    #[must_use]
    pub fn resolve_field(&self, field: &str) -> Option<Value> {
        match field {
            "tool" => self.tool.clone().map(Value::String),
            "tool_group" => self.tool_group.clone().map(Value::String),
            "adapter_id" => Some(Value::String(self.adapter_id.as_str().to_string())),
            "adapter_risk_class" | "risk_class" => serde_json::to_value(self.adapter_risk_class).ok(),
            "environment" => self.environment.clone().map(Value::String),
            "intent" => self.intent.clone().map(Value::String),
            "skill_state" => self.skill_state.and_then(|state| serde_json::to_value(state).ok()),
            "provenance" => serde_json::to_value(self.provenance).ok(),
            "estimated_cost" => serde_json::Number::from_f64(self.estimated_cost).map(Value::Number),
            "capability" | "requested_capabilities" => Some(Value::Array(
                self.requested_capabilities.iter().cloned().map(Value::String).collect(),
            )),
            _ => crate::conditions::resolve_dotted_path(&self.structured_context, field).cloned(),
        }
    }
}

/// Default value for [`PolicyContext::structured_context`].
fn default_structured_context() -> Value {
    Value::Object(serde_json::Map::new())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PolicyContext {
        PolicyContext {
            tenant_id: TenantId::new("local"),
            workspace_id: WorkspaceId::new("ws-1"),
            environment: None,
            adapter_id: AdapterId::new("claude-code"),
            adapter_risk_class: RiskClass::Medium,
            tool: Some("exec".to_string()),
            tool_group: None,
            skill_state: None,
            estimated_cost: 0.0,
            requested_capabilities: vec![],
            intent: None,
            structured_context: json!({"exec": {"argv0": "ls"}}),
            provenance: Provenance::Asserted,
            template_vars: TemplateVars::default(),
        }
    }

    #[test]
    fn resolves_nested_dotted_field() {
        let ctx = sample();
        assert_eq!(ctx.resolve_field("exec.argv0"), Some(json!("ls")));
    }

    #[test]
    fn missing_field_resolves_to_none() {
        let ctx = sample();
        assert_eq!(ctx.resolve_field("targets.paths"), None);
    }

    #[test]
    fn capability_resolves_to_requested_capabilities_list() {
        let mut ctx = sample();
        ctx.requested_capabilities = vec!["external_network".to_string()];
        assert_eq!(ctx.resolve_field("capability"), Some(json!(["external_network"])));
        assert_eq!(ctx.resolve_field("requested_capabilities"), Some(json!(["external_network"])));
    }

    #[test]
    fn top_level_field_resolves_before_structured_context() {
        let ctx = sample();
        assert_eq!(ctx.resolve_field("tool"), Some(json!("exec")));
        assert_eq!(ctx.resolve_field("estimated_cost"), Some(json!(0.0)));
    }
}
