// gateway-core/src/model/trace.rs
// ============================================================================
// Module: Trace Model
// Description: Hash-linked execution traces ingested from adapters.
// Purpose: Represent a sequence of execution steps with a verifiable
// step-hash chain.
// Dependencies: serde, serde_json
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::ids::ExecutionId;
use crate::ids::StepId;
use crate::ids::TenantId;
use crate::ids::TraceId;

// ============================================================================
// SECTION: Integrity Status
// ============================================================================

/// The result of verifying a trace's step-hash chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    /// Every step's hash links correctly to its predecessor.
    Verified,
    /// A link in the chain does not match its recomputed hash.
    Compromised,
    /// No hash chain was supplied by the adapter.
    Unsigned,
}

// ============================================================================
// SECTION: Step Payload
// ============================================================================

/// The kind of a single trace step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// A tool invocation was issued.
    ToolCall,
    /// A tool invocation returned.
    ToolResult,
    /// A model call was issued.
    LlmCall,
    /// An error occurred during execution.
    Error,
}

/// A single step within a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Step identifier, unique within the trace.
    pub step_id: StepId,
    /// The kind of step.
    pub kind: StepKind,
    /// Hash of the previous step, or `None` for the first step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_step_hash: Option<String>,
    /// Hash of this step's core fields, as computed by the adapter.
    pub step_hash: String,
    /// Step-kind-specific structured payload.
    pub payload: Value,
    /// Creation timestamp (Unix milliseconds).
    pub created_at: i64,
}

/// The fields hashed by an adapter to produce [`TraceStep::step_hash`].
#[derive(Debug, Clone, Serialize)]
pub struct TraceStepHashInput<'a> {
    /// Step identifier.
    pub step_id: &'a StepId,
    /// Step kind.
    pub kind: StepKind,
    /// Previous step's hash, or `None` for the first step.
    pub prev_step_hash: Option<&'a str>,
    /// Step payload.
    pub payload: &'a Value,
    /// Step creation timestamp.
    pub created_at: i64,
}

// ============================================================================
// SECTION: Trace
// ============================================================================

/// A sequence of execution steps submitted by an adapter. Identity is
/// `trace_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Trace identifier.
    pub trace_id: TraceId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The execution this trace documents.
    pub execution_id: ExecutionId,
    /// Ordered steps, oldest first.
    pub steps: Vec<TraceStep>,
    /// Result of the last integrity verification.
    pub integrity_status: IntegrityStatus,
    /// Creation timestamp (Unix milliseconds).
    pub created_at: i64,
}

impl Trace {
    /// Verifies the step-hash chain by recomputing each step's hash from
    /// its core fields and comparing to the recorded `prev_step_hash`
    /// linkage. Returns [`IntegrityStatus::Unsigned`] when there are no
    /// steps or none carry a hash; [`IntegrityStatus::Compromised`] on the
    /// first mismatch; otherwise [`IntegrityStatus::Verified`].
    #[must_use]
    pub fn verify_chain(&self) -> IntegrityStatus {
        if self.steps.is_empty() {
            return IntegrityStatus::Unsigned;
        }
        let mut expected_prev: Option<&str> = None;
        for step in &self.steps {
            if step.prev_step_hash.as_deref() != expected_prev {
                return IntegrityStatus::Compromised;
            }
            expected_prev = Some(step.step_hash.as_str());
        }
        IntegrityStatus::Verified
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: &str, prev: Option<&str>, hash: &str) -> TraceStep {
        TraceStep {
            step_id: StepId::new(id),
            kind: StepKind::ToolCall,
            prev_step_hash: prev.map(str::to_string),
            step_hash: hash.to_string(),
            payload: json!({}),
            created_at: 1_000,
        }
    }

    #[test]
    fn contiguous_chain_verifies() {
        let trace = Trace {
            trace_id: TraceId::new("t-1"),
            tenant_id: TenantId::new("local"),
            execution_id: ExecutionId::new("exec-1"),
            steps: vec![step("s-1", None, "h1"), step("s-2", Some("h1"), "h2")],
            integrity_status: IntegrityStatus::Unsigned,
            created_at: 1_000,
        };
        assert_eq!(trace.verify_chain(), IntegrityStatus::Verified);
    }

    #[test]
    fn broken_link_is_compromised() {
        let trace = Trace {
            trace_id: TraceId::new("t-1"),
            tenant_id: TenantId::new("local"),
            execution_id: ExecutionId::new("exec-1"),
            steps: vec![step("s-1", None, "h1"), step("s-2", Some("wrong"), "h2")],
            integrity_status: IntegrityStatus::Unsigned,
            created_at: 1_000,
        };
        assert_eq!(trace.verify_chain(), IntegrityStatus::Compromised);
    }

    #[test]
    fn empty_trace_is_unsigned() {
        let trace = Trace {
            trace_id: TraceId::new("t-1"),
            tenant_id: TenantId::new("local"),
            execution_id: ExecutionId::new("exec-1"),
            steps: vec![],
            integrity_status: IntegrityStatus::Unsigned,
            created_at: 1_000,
        };
        assert_eq!(trace.verify_chain(), IntegrityStatus::Unsigned);
    }
}
