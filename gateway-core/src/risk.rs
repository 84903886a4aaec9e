// gateway-core/src/risk.rs
// ============================================================================
// Module: Risk Scorer (C5)
// Description: Heuristic risk scoring from tool mix, skill state,
// capability flags, context flags, and provenance.
// Purpose: Produce a stable risk level the policy evaluator and decision
// engine can key fallback/approval-fork behavior on.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Scoring is monotonic: more tools, a deprecated/draft skill, a higher
//! adapter risk class, privileged capabilities, the combination of
//! external-network plus write capabilities, and untested provenance can
//! each only raise the score, never lower it. Level boundaries are stable
//! cut points on the cumulative score; exact weights are an implementation
//! detail, not part of the contract.

use serde::Serialize;

use crate::context::PolicyContext;
use crate::context::Provenance;
use crate::context::SkillState;
use crate::model::RiskClass;

// ============================================================================
// SECTION: Weights
// ============================================================================

/// Points added per requested capability beyond the first.
const WEIGHT_PER_EXTRA_CAPABILITY: u32 = 3;
/// Points added when the skill is in a deprecated or draft state.
const WEIGHT_UNSTABLE_SKILL: u32 = 10;
/// Points added per step of adapter risk class above `low`.
const WEIGHT_PER_ADAPTER_RISK_STEP: u32 = 8;
/// Points added for each privileged capability requested.
const WEIGHT_PRIVILEGED_CAPABILITY: u32 = 15;
/// Points added when both network and filesystem-write capabilities are
/// requested together.
const WEIGHT_NETWORK_PLUS_WRITE: u32 = 20;
/// Points added when provenance is untested.
const WEIGHT_UNTESTED_PROVENANCE: u32 = 12;
/// Capability names considered privileged.
const PRIVILEGED_CAPABILITIES: [&str; 3] = ["process_spawn", "credential_read", "network_admin"];

/// Score boundary at or above which the level is `medium`.
const LEVEL_MEDIUM_FLOOR: u32 = 15;
/// Score boundary at or above which the level is `high`.
const LEVEL_HIGH_FLOOR: u32 = 35;
/// Score boundary at or above which the level is `critical`.
const LEVEL_CRITICAL_FLOOR: u32 = 60;

// ============================================================================
// SECTION: Risk Level
// ============================================================================

/// The stable risk level derived from the cumulative score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Score below [`LEVEL_MEDIUM_FLOOR`].
    Low,
    /// Score at or above [`LEVEL_MEDIUM_FLOOR`], below [`LEVEL_HIGH_FLOOR`].
    Medium,
    /// Score at or above [`LEVEL_HIGH_FLOOR`], below
    /// [`LEVEL_CRITICAL_FLOOR`].
    High,
    /// Score at or above [`LEVEL_CRITICAL_FLOOR`].
    Critical,
}

impl RiskLevel {
    fn from_score(score: u32) -> Self {
        if score >= LEVEL_CRITICAL_FLOOR {
            Self::Critical
        } else if score >= LEVEL_HIGH_FLOOR {
            Self::High
        } else if score >= LEVEL_MEDIUM_FLOOR {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

// ============================================================================
// SECTION: Risk Assessment
// ============================================================================

/// The result of scoring one request.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    /// Cumulative score; higher is riskier.
    pub score: u32,
    /// The stable level derived from `score`.
    pub level: RiskLevel,
    /// Human-readable contributing factors, in the order they were
    /// applied.
    pub factors: Vec<String>,
}

/// Scores `context`, returning the cumulative score, level, and
/// contributing factors.
#[must_use]
pub fn score(context: &PolicyContext) -> RiskAssessment {
    let mut score: u32 = 0;
    let mut factors = Vec::new();

    let capability_count = context.requested_capabilities.len();
    if capability_count > 1 {
        let extra = u32::try_from(capability_count - 1).unwrap_or(u32::MAX);
        score = score.saturating_add(extra.saturating_mul(WEIGHT_PER_EXTRA_CAPABILITY));
        factors.push(format!("{capability_count} capabilities requested"));
    }

    if matches!(context.skill_state, Some(SkillState::Deprecated) | Some(SkillState::Draft)) {
        score = score.saturating_add(WEIGHT_UNSTABLE_SKILL);
        factors.push("skill is deprecated or draft".to_string());
    }

    let adapter_risk_steps = match context.adapter_risk_class {
        RiskClass::Low => 0,
        RiskClass::Medium => 1,
        RiskClass::High => 2,
    };
    if adapter_risk_steps > 0 {
        score = score.saturating_add(adapter_risk_steps * WEIGHT_PER_ADAPTER_RISK_STEP);
        factors.push(format!("adapter risk class is {:?}", context.adapter_risk_class));
    }

    let privileged_requested: Vec<&str> = context
        .requested_capabilities
        .iter()
        .filter(|c| PRIVILEGED_CAPABILITIES.contains(&c.as_str()))
        .map(String::as_str)
        .collect();
    if !privileged_requested.is_empty() {
        score = score.saturating_add(
            u32::try_from(privileged_requested.len()).unwrap_or(u32::MAX) * WEIGHT_PRIVILEGED_CAPABILITY,
        );
        factors.push(format!("privileged capabilities requested: {privileged_requested:?}"));
    }

    let wants_network = context.requested_capabilities.iter().any(|c| c == "external_network");
    let wants_write = context.requested_capabilities.iter().any(|c| c.ends_with("_write"));
    if wants_network && wants_write {
        score = score.saturating_add(WEIGHT_NETWORK_PLUS_WRITE);
        factors.push("external network combined with write capability".to_string());
    }

    if context.provenance == Provenance::Untested {
        score = score.saturating_add(WEIGHT_UNTESTED_PROVENANCE);
        factors.push("untested provenance".to_string());
    }

    RiskAssessment {
        score,
        level: RiskLevel::from_score(score),
        factors,
    }
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
    use serde_json::json;

    fn minimal_context() -> PolicyContext {
        PolicyContext {
            tenant_id: TenantId::new("local"),
            workspace_id: WorkspaceId::new("ws-1"),
            environment: None,
            adapter_id: AdapterId::new("claude-code"),
            adapter_risk_class: RiskClass::Low,
            tool: None,
            tool_group: None,
            skill_state: None,
            estimated_cost: 0.0,
            requested_capabilities: vec![],
            intent: None,
            structured_context: json!({}),
            provenance: Provenance::Verified,
            template_vars: TemplateVars::default(),
        }
    }

    #[test]
    fn minimal_request_is_low_risk() {
        let assessment = score(&minimal_context());
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.score, 0);
    }

    #[test]
    fn more_tools_only_ever_raises_score() {
        let mut low = minimal_context();
        low.requested_capabilities = vec!["fs_read".to_string()];
        let mut high = minimal_context();
        high.requested_capabilities =
            vec!["fs_read".to_string(), "fs_write".to_string(), "external_network".to_string()];
        assert!(score(&high).score > score(&low).score);
    }

    #[test]
    fn network_and_write_combination_escalates() {
        let mut ctx = minimal_context();
        ctx.requested_capabilities = vec!["external_network".to_string(), "fs_write".to_string()];
        let assessment = score(&ctx);
        assert!(assessment.factors.iter().any(|f| f.contains("network combined with write")));
    }

    #[test]
    fn high_adapter_risk_class_reaches_high_level() {
        let mut ctx = minimal_context();
        ctx.adapter_risk_class = RiskClass::High;
        ctx.requested_capabilities =
            vec!["process_spawn".to_string(), "credential_read".to_string(), "network_admin".to_string()];
        ctx.provenance = Provenance::Untested;
        ctx.skill_state = Some(SkillState::Deprecated);
        let assessment = score(&ctx);
        assert!(assessment.level >= RiskLevel::High);
    }
}
