// gateway-core/src/model/tool_auth.rs
// ============================================================================
// Module: Tool Authorization
// Description: Per-invocation authorization outcomes consumed by audit.
// Purpose: Record the decision outcome for a single tool call within an
// execution.
// Dependencies: serde, serde_json
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::ids::ExecutionId;
use crate::ids::PolicyId;
use crate::model::policy::Decision;

// ============================================================================
// SECTION: Tool Authorization
// ============================================================================

/// The authorization outcome for one tool invocation. Identity is
/// `(execution_id, tool, sequence)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAuthorization {
    /// The execution this invocation belongs to.
    pub execution_id: ExecutionId,
    /// Tool name invoked.
    pub tool: String,
    /// Monotonic sequence number of this invocation within the execution.
    pub sequence: u32,
    /// The decision reached for this invocation.
    pub decision: Decision,
    /// Policy that produced a `deny`, if applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_policy_id: Option<PolicyId>,
    /// Opaque snapshot of the tool invocation arguments.
    pub invocation_snapshot: Value,
    /// Timestamp of the authorization (Unix milliseconds).
    pub created_at: i64,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_json() {
        let auth = ToolAuthorization {
            execution_id: ExecutionId::new("exec-1"),
            tool: "delete_file".to_string(),
            sequence: 0,
            decision: Decision::Deny,
            matched_policy_id: Some(PolicyId::new("deny_delete_file")),
            invocation_snapshot: json!({"path": "/workspace/a.ts"}),
            created_at: 1_000,
        };
        let json = serde_json::to_string(&auth).expect("serialize");
        let back: ToolAuthorization = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, auth);
    }
}
