// gateway-core/src/model/mod.rs
// ============================================================================
// Module: Data Model
// Description: Tenant-scoped entities persisted and manipulated by the
// governance pipeline.
// Purpose: Re-export the entity submodules as a single namespace.
// Dependencies: none (re-exports only)
// ============================================================================

//! ## Overview
//! Every entity here is tenant-scoped; most are also workspace-scoped. See
//! the module-level docs of each submodule for the entity's identity and
//! invariants.

pub mod adapter;
pub mod audit;
pub mod decision;
pub mod policy;
pub mod tool_auth;
pub mod trace;

pub use adapter::Adapter;
pub use adapter::AdapterRegistration;
pub use adapter::RiskClass;
pub use audit::AuditChainEntry;
pub use audit::AuditChainHashInput;
pub use audit::AuditEntry;
pub use audit::AuditEventType;
pub use decision::DecisionStatus;
pub use decision::ExecutionDecisionRecord;
pub use decision::GrantedScope;
pub use decision::Resolution;
pub use policy::Decision;
pub use policy::Policy;
pub use policy::PolicyEffect;
pub use policy::PolicyScope;
pub use policy::PolicySubject;
pub use policy::SubjectType;
pub use policy::WizardMeta;
pub use tool_auth::ToolAuthorization;
pub use trace::IntegrityStatus;
pub use trace::StepKind;
pub use trace::Trace;
pub use trace::TraceStep;
pub use trace::TraceStepHashInput;
