// gateway-core/src/model/adapter.rs
// ============================================================================
// Module: Adapter Model
// Description: Registered execution runtimes that delegate pre-execution
// authority to the gateway.
// Purpose: Represent the adapter registry entity.
// Dependencies: serde
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::ids::AdapterId;
use crate::ids::TenantId;

// ============================================================================
// SECTION: Risk Class
// ============================================================================

/// Coarse, operator-assigned risk classification for an adapter, fed into
/// the risk scorer (C5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    /// Low-risk adapter, e.g. a read-only reporting tool.
    Low,
    /// Medium-risk adapter with write access to a bounded workspace.
    Medium,
    /// High-risk adapter with broad capabilities.
    High,
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// A registered execution runtime. Identity is `(tenant_id, adapter_id)`.
///
/// # Invariants
/// - Created on first registration, mutated in place by re-registration;
///   never hard-deleted while any decision record references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adapter {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Adapter identifier, unique within the tenant.
    pub adapter_id: AdapterId,
    /// Operator-facing display name.
    pub display_name: String,
    /// Risk classification used by the risk scorer.
    pub risk_class: RiskClass,
    /// Capability names this adapter is permitted to request.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Adapter-reported version string.
    pub version: String,
    /// Whether the adapter is currently permitted to request decisions.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Registration timestamp (Unix milliseconds).
    pub created_at: i64,
    /// Timestamp of the most recent re-registration (Unix milliseconds).
    pub updated_at: i64,
}

impl Adapter {
    /// Applies a re-registration in place, refreshing mutable fields while
    /// preserving identity and `created_at`.
    pub fn re_register(&mut self, update: AdapterRegistration, now_millis: i64) {
        self.display_name = update.display_name;
        self.risk_class = update.risk_class;
        self.capabilities = update.capabilities;
        self.version = update.version;
        self.updated_at = now_millis;
    }
}

/// The mutable fields of an adapter as submitted on `registerAdapter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterRegistration {
    /// Operator-facing display name.
    pub display_name: String,
    /// Risk classification.
    pub risk_class: RiskClass,
    /// Requested capability set.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Adapter-reported version string.
    pub version: String,
}

/// Default value for [`Adapter::enabled`].
fn default_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_registration_preserves_identity_and_created_at() {
        let mut adapter = Adapter {
            tenant_id: TenantId::new("local"),
            adapter_id: AdapterId::new("claude-code"),
            display_name: "Claude Code".to_string(),
            risk_class: RiskClass::Medium,
            capabilities: BTreeSet::from(["fs_read".to_string()]),
            version: "1.0.0".to_string(),
            enabled: true,
            created_at: 1_000,
            updated_at: 1_000,
        };
        adapter.re_register(
            AdapterRegistration {
                display_name: "Claude Code".to_string(),
                risk_class: RiskClass::High,
                capabilities: BTreeSet::from(["fs_read".to_string(), "fs_write".to_string()]),
                version: "1.1.0".to_string(),
            },
            2_000,
        );
        assert_eq!(adapter.created_at, 1_000);
        assert_eq!(adapter.updated_at, 2_000);
        assert_eq!(adapter.risk_class, RiskClass::High);
        assert_eq!(adapter.capabilities.len(), 2);
    }

    #[test]
    fn risk_class_orders_low_below_high() {
        assert!(RiskClass::Low < RiskClass::High);
    }
}
