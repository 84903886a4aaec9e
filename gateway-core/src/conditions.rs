// gateway-core/src/conditions.rs
// ============================================================================
// Module: Condition Operators
// Description: Typed condition language with template variables and path
// safety, used by the policy evaluator.
// Purpose: Provide a closed, fail-closed condition grammar for policy rules.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Conditions are modeled as a sum type rather than dynamic reflection over
//! untrusted maps: `Eq | In | Prefix | AllUnder | AnyUnder | Exists`. Scalar
//! shorthand (a bare string/number/boolean) is normalized to `Eq` at parse
//! time. Template variables of the form `{{name}}` resolve against a fixed
//! allow-list; unknown or missing names fail closed. Dotted paths into the
//! request context reject `__proto__`/`prototype`/`constructor` segments to
//! prevent prototype/metaproperty reaches, and path-containment operators
//! normalize paths lexically before comparison, failing closed on any path
//! that cannot be resolved (for example one that climbs above the
//! filesystem root via `..`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Condition Grammar
// ============================================================================

/// A single condition expression evaluated against one context field.
///
/// # Invariants
/// - Exactly one variant is active per expression; the wire form is a tagged
///   object with exactly one recognized key, or a scalar shorthand for `Eq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConditionExpr {
    /// Strict equality against a literal value (after template resolution
    /// when the value is a string).
    Eq(Value),
    /// Membership in a literal set.
    In(Vec<Value>),
    /// String starts-with, after template resolution.
    Prefix(String),
    /// Every path in the field's value must be under one of the given roots.
    AllUnder(Vec<String>),
    /// At least one path in the field's value must be under one of the
    /// given roots.
    AnyUnder(Vec<String>),
    /// The field's value must be present (neither undefined nor null).
    Exists(bool),
}

impl<'de> Deserialize<'de> for ConditionExpr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawCondition::deserialize(deserializer)?;
        match raw {
            RawCondition::Scalar(value) => Ok(Self::Eq(value)),
            RawCondition::Object(obj) => obj.into_expr().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCondition {
    Scalar(Value),
    Object(RawConditionObject),
}

#[derive(Debug, Default, Deserialize)]
struct RawConditionObject {
    eq: Option<Value>,
    #[serde(rename = "in")]
    in_set: Option<Vec<Value>>,
    prefix: Option<String>,
    all_under: Option<Vec<String>>,
    any_under: Option<Vec<String>>,
    exists: Option<bool>,
}

impl RawConditionObject {
    fn into_expr(self) -> Result<ConditionExpr, String> {
        let mut present = Vec::new();
        if self.eq.is_some() {
            present.push("eq");
        }
        if self.in_set.is_some() {
            present.push("in");
        }
        if self.prefix.is_some() {
            present.push("prefix");
        }
        if self.all_under.is_some() {
            present.push("all_under");
        }
        if self.any_under.is_some() {
            present.push("any_under");
        }
        if self.exists.is_some() {
            present.push("exists");
        }
        match present.as_slice() {
            ["eq"] => Ok(ConditionExpr::Eq(self.eq.unwrap_or(Value::Null))),
            ["in"] => Ok(ConditionExpr::In(self.in_set.unwrap_or_default())),
            ["prefix"] => Ok(ConditionExpr::Prefix(self.prefix.unwrap_or_default())),
            ["all_under"] => Ok(ConditionExpr::AllUnder(self.all_under.unwrap_or_default())),
            ["any_under"] => Ok(ConditionExpr::AnyUnder(self.any_under.unwrap_or_default())),
            ["exists"] => Ok(ConditionExpr::Exists(self.exists.unwrap_or(false))),
            [] => Err("condition object has no recognized operator key".to_string()),
            _ => Err(format!("condition object has conflicting operator keys: {present:?}")),
        }
    }
}

// ============================================================================
// SECTION: Template Variables
// ============================================================================

/// Resolvable template variables for condition string literals.
///
/// # Invariants
/// - Only `workspace.root`, `tenant.id`, and `workspace.id` are recognized;
///   any other name fails closed.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    /// Value substituted for `{{workspace.root}}`.
    pub workspace_root: Option<String>,
    /// Value substituted for `{{tenant.id}}`.
    pub tenant_id: Option<String>,
    /// Value substituted for `{{workspace.id}}`.
    pub workspace_id: Option<String>,
}

impl TemplateVars {
    fn resolve(&self, name: &str) -> Option<&str> {
        match name {
            "workspace.root" => self.workspace_root.as_deref(),
            "tenant.id" => self.tenant_id.as_deref(),
            "workspace.id" => self.workspace_id.as_deref(),
            _ => None,
        }
    }
}

/// Expands `{{name}}` tokens in a string literal against the allow-listed
/// template variables. Returns `None` (fail closed) if any token names an
/// unknown variable or one with no value supplied.
#[must_use]
pub fn resolve_template(literal: &str, vars: &TemplateVars) -> Option<String> {
    let mut out = String::with_capacity(literal.len());
    let mut rest = literal;
    loop {
        let Some(start) = rest.find("{{") else {
            out.push_str(rest);
            break;
        };
        let Some(end_rel) = rest[start..].find("}}") else {
            // Unterminated token: treat the literal tail verbatim, per
            // "unknown or missing names fail closed" only applies to
            // well-formed tokens; an unterminated `{{` is not a template
            // reference at all.
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..start]);
        let name = rest[start + 2..start + end_rel].trim();
        let value = vars.resolve(name)?;
        out.push_str(value);
        rest = &rest[start + end_rel + 2..];
    }
    Some(out)
}

// ============================================================================
// SECTION: Dotted Path Resolution
// ============================================================================

/// Segments rejected anywhere in a dotted context path to prevent
/// prototype/metaproperty reaches into the underlying JSON representation.
const FORBIDDEN_SEGMENTS: [&str; 3] = ["__proto__", "prototype", "constructor"];

/// Resolves a dotted path (e.g. `context.exec.argv0`) against a JSON
/// context object. Returns `None` if any segment is forbidden or the path
/// does not resolve.
#[must_use]
pub fn resolve_dotted_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        if segment.is_empty() || FORBIDDEN_SEGMENTS.contains(&segment) {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

// ============================================================================
// SECTION: Path Safety
// ============================================================================

/// Normalizes an absolute path lexically (no filesystem access): resolves
/// `.` and `..` components without ever climbing above the root. Returns
/// `None` (fail closed) for relative paths or paths that climb above `/`.
#[must_use]
pub fn normalize_path(path: &str) -> Option<PathBuf> {
    let input = Path::new(path);
    if !input.is_absolute() {
        return None;
    }
    let mut out = PathBuf::from("/");
    for component in input.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(segment) => out.push(segment),
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Returns true if `path` equals `root` or is a descendant of `root` after
/// normalizing both. Fails closed (returns false) if either fails to
/// normalize.
#[must_use]
pub fn path_under_root(path: &str, root: &str) -> bool {
    let (Some(path), Some(root)) = (normalize_path(path), normalize_path(root)) else {
        return false;
    };
    path == root || path.starts_with(&root)
}

/// Returns true if `path` is under at least one of `roots`.
#[must_use]
pub fn path_under_any_root(path: &str, roots: &[String]) -> bool {
    roots.iter().any(|root| path_under_root(path, root))
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Outcome of evaluating a single field condition, used to build the
/// operator-console-facing decision trace.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionTrace {
    /// Dotted context field the condition was evaluated against.
    pub field: String,
    /// Operator name (`eq`, `in`, `prefix`, `all_under`, `any_under`,
    /// `exists`).
    pub operator: &'static str,
    /// The expected value or set, as configured on the policy (post
    /// template resolution).
    pub expected: Value,
    /// The actual value resolved from the context, if any.
    pub actual: Option<Value>,
    /// Whether the condition matched.
    pub result: bool,
}

/// Extracts a list of string path values from a resolved context value.
/// A single string is treated as a one-element list; anything else fails
/// closed (returns an empty list, which never matches `all_under`/
/// `any_under`).
fn as_path_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(single) => vec![single.clone()],
        Value::Array(items) => {
            items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect()
        }
        _ => Vec::new(),
    }
}

/// Evaluates a single condition expression against a resolved context
/// value, returning the match result plus a trace entry.
///
/// `actual` is `None` when the dotted path failed to resolve (including
/// rejection of a forbidden segment), which always fails closed except for
/// the `exists` operator checking absence is never expressible here (the
/// grammar only supports `exists: true`).
///
/// `eq` and `in` are array-aware: when `actual` resolves to a JSON array
/// (e.g. a requested-capability list), `eq` tests that the expected value
/// is an element of it and `in` tests that any literal in the set is an
/// element of it, rather than comparing the array as a whole.
#[must_use]
pub fn evaluate_condition(
    field: &str,
    expr: &ConditionExpr,
    actual: Option<&Value>,
    vars: &TemplateVars,
) -> ConditionTrace {
    let (operator, expected, result) = match expr {
        ConditionExpr::Eq(expected) => {
            let resolved_expected = resolve_value_templates(expected, vars);
            let result = match (&resolved_expected, actual) {
                (Some(expected), Some(Value::Array(items))) => items.contains(expected),
                (Some(expected), Some(actual)) => expected == actual,
                _ => false,
            };
            ("eq", resolved_expected.unwrap_or(Value::Null), result)
        }
        ConditionExpr::In(values) => {
            let resolved: Vec<Value> =
                values.iter().filter_map(|v| resolve_value_templates(v, vars)).collect();
            let result = match actual {
                Some(Value::Array(items)) => resolved.iter().any(|candidate| items.contains(candidate)),
                Some(actual) => resolved.iter().any(|candidate| candidate == actual),
                None => false,
            };
            ("in", Value::Array(resolved), result)
        }
        ConditionExpr::Prefix(prefix) => {
            let resolved = resolve_template(prefix, vars);
            let result = match (&resolved, actual.and_then(Value::as_str)) {
                (Some(prefix), Some(actual)) => actual.starts_with(prefix.as_str()),
                _ => false,
            };
            ("prefix", resolved.map(Value::String).unwrap_or(Value::Null), result)
        }
        ConditionExpr::AllUnder(roots) => {
            let resolved_roots: Vec<String> =
                roots.iter().filter_map(|r| resolve_template(r, vars)).collect();
            let result = match actual {
                Some(actual) if resolved_roots.len() == roots.len() => {
                    let paths = as_path_list(actual);
                    !paths.is_empty() && paths.iter().all(|p| path_under_any_root(p, &resolved_roots))
                }
                _ => false,
            };
            ("all_under", Value::from(resolved_roots), result)
        }
        ConditionExpr::AnyUnder(roots) => {
            let resolved_roots: Vec<String> =
                roots.iter().filter_map(|r| resolve_template(r, vars)).collect();
            let result = match actual {
                Some(actual) if resolved_roots.len() == roots.len() => {
                    let paths = as_path_list(actual);
                    paths.iter().any(|p| path_under_any_root(p, &resolved_roots))
                }
                _ => false,
            };
            ("any_under", Value::from(resolved_roots), result)
        }
        ConditionExpr::Exists(required) => {
            let result = actual.is_some_and(|v| !v.is_null()) == *required;
            ("exists", Value::Bool(*required), result)
        }
    };
    ConditionTrace {
        field: field.to_string(),
        operator,
        expected,
        actual: actual.cloned(),
        result,
    }
}

/// Resolves templates within a JSON value's string leaves; non-string
/// values pass through unchanged. Returns `None` if any string leaf fails
/// to resolve.
fn resolve_value_templates(value: &Value, vars: &TemplateVars) -> Option<Value> {
    match value {
        Value::String(s) => resolve_template(s, vars).map(Value::String),
        other => Some(other.clone()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_shorthand_parses_as_eq() {
        let expr: ConditionExpr = serde_json::from_value(json!("delete_file")).expect("parse");
        assert_eq!(expr, ConditionExpr::Eq(json!("delete_file")));
    }

    #[test]
    fn conflicting_keys_are_rejected() {
        let result: Result<ConditionExpr, _> =
            serde_json::from_value(json!({"eq": "a", "prefix": "b"}));
        assert!(result.is_err());
    }

    #[test]
    fn forbidden_segment_fails_closed() {
        let ctx = json!({"a": {"__proto__": {"polluted": true}}});
        assert!(resolve_dotted_path(&ctx, "a.__proto__.polluted").is_none());
    }

    #[test]
    fn unknown_template_name_fails_closed() {
        let vars = TemplateVars::default();
        assert!(resolve_template("{{unknown.thing}}", &vars).is_none());
    }

    #[test]
    fn known_template_name_resolves() {
        let vars = TemplateVars {
            workspace_root: Some("/workspace".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_template("{{workspace.root}}/bin", &vars).as_deref(), Some("/workspace/bin"));
    }

    #[test]
    fn all_under_requires_every_path_contained() {
        let expr = ConditionExpr::AllUnder(vec!["/workspace".to_string()]);
        let actual = json!(["/workspace/a.ts", "/tmp/outside"]);
        let vars = TemplateVars::default();
        let trace = evaluate_condition("context.targets.paths", &expr, Some(&actual), &vars);
        assert!(!trace.result);
    }

    #[test]
    fn all_under_matches_when_every_path_contained() {
        let expr = ConditionExpr::AllUnder(vec!["/workspace".to_string()]);
        let actual = json!(["/workspace/a.ts", "/workspace/sub/b.ts"]);
        let vars = TemplateVars::default();
        let trace = evaluate_condition("context.targets.paths", &expr, Some(&actual), &vars);
        assert!(trace.result);
    }

    #[test]
    fn path_climbing_above_root_fails_closed() {
        assert!(normalize_path("/workspace/../../etc/passwd").is_none());
    }

    #[test]
    fn relative_paths_fail_closed() {
        assert!(normalize_path("workspace/a.ts").is_none());
    }

    #[test]
    fn exists_checks_presence() {
        let expr = ConditionExpr::Exists(true);
        let vars = TemplateVars::default();
        let present = evaluate_condition("f", &expr, Some(&json!("x")), &vars);
        assert!(present.result);
        let missing = evaluate_condition("f", &expr, None, &vars);
        assert!(!missing.result);
    }

    #[test]
    fn eq_matches_membership_in_a_requested_list() {
        let expr = ConditionExpr::Eq(json!("external_network"));
        let vars = TemplateVars::default();
        let actual = json!(["external_network", "process_spawn"]);
        let trace = evaluate_condition("capability", &expr, Some(&actual), &vars);
        assert!(trace.result);
    }

    #[test]
    fn in_matches_intersection_with_a_requested_list() {
        let expr = ConditionExpr::In(vec![json!("external_network")]);
        let vars = TemplateVars::default();
        let actual = json!(["process_spawn"]);
        let trace = evaluate_condition("requested_capabilities", &expr, Some(&actual), &vars);
        assert!(!trace.result);
    }
}
