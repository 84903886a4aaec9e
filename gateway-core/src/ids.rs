// gateway-core/src/ids.rs
// ============================================================================
// Module: Governance Gateway Identifiers
// Description: Canonical opaque identifiers for tenants, adapters, policies,
// executions, decisions, and traces.
// Purpose: Provide strongly typed, serializable identifiers with stable wire
// forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque newtypes over `String` so that a tenant id can
//! never be mistaken for a decision id at compile time, even though both
//! serialize as plain strings on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Macro
// ============================================================================

macro_rules! opaque_string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        ///
        /// # Invariants
        /// - Opaque UTF-8 string; no normalization is applied by this type.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new ", $doc)]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

opaque_string_id!(TenantId, "Tenant identifier.");
opaque_string_id!(WorkspaceId, "Workspace identifier, scoped within a tenant.");
opaque_string_id!(AdapterId, "Adapter identifier, scoped within a tenant.");
opaque_string_id!(PolicyId, "Policy identifier, scoped within a tenant.");
opaque_string_id!(ExecutionId, "Execution identifier for one adapter-initiated action.");
opaque_string_id!(DecisionId, "Decision identifier for a materialized decision record.");
opaque_string_id!(TraceId, "Trace identifier for a sequence of execution steps.");
opaque_string_id!(StepId, "Step identifier within a trace.");
opaque_string_id!(UserId, "Operator user identifier.");

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_round_trip_through_json() {
        let id = TenantId::new("local");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"local\"");
        let back: TenantId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_as_str() {
        let id = PolicyId::new("deny_delete_file");
        assert_eq!(id.to_string(), id.as_str());
    }
}
