// gateway-core/src/lib.rs
// ============================================================================
// Crate: gateway-core
// Description: The pure governance pipeline — condition operators, policy
// evaluator, risk scorer, budget manager, and decision engine — plus the
// data model and persistence trait they operate on.
// Purpose: A storage- and transport-agnostic library that gateway-server
// and gateway-cli both depend on.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror
// ============================================================================

//! # gateway-core
//!
//! This crate has no knowledge of HTTP, SQLite, or the clock. Every
//! function here is either pure (the evaluator, risk scorer, budget
//! manager, decision engine) or defined against the [`store::GovernanceStore`]
//! trait rather than a concrete backend. Time is always passed in as
//! `now_millis`, never read directly, so every governance decision is
//! reproducible from its recorded inputs.

pub mod budget;
pub mod conditions;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod hashing;
pub mod ids;
pub mod model;
pub mod risk;
pub mod store;

pub use budget::check_budget;
pub use budget::BudgetCheck;
pub use conditions::ConditionExpr;
pub use conditions::TemplateVars;
pub use context::PolicyContext;
pub use engine::decide;
pub use engine::ApprovalMode;
pub use engine::DecisionOutcome;
pub use engine::DecisionRequest;
pub use engine::GovernanceOverride;
pub use error::StoreError;
pub use evaluator::evaluate;
pub use evaluator::EvaluationOutcome;
pub use hashing::hash_stable_json;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use risk::score as score_risk;
pub use risk::RiskAssessment;
pub use risk::RiskLevel;
pub use store::GovernanceStore;
pub use store::InMemoryStore;
pub use store::PolicyFilter;
