//! RuleForge Engine
//!
//! The runtime: the Evaluation Context (C4), the tree-walking Evaluator
//! (C5), and the Rule Orchestrator (C6/C7) that ties parsing, constant
//! resolution, and evaluation together for callers.

pub mod collaborators;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod orchestrator;
pub mod services;

pub use collaborators::{AuditSink, ConstantStore, HttpCollaborator, HttpResponse, RuleStore};
pub use context::EvaluationContext;
pub use error::EvalError;
pub use evaluator::Evaluator;
pub use orchestrator::{BatchOptions, BatchRequest, BatchResult, EvalOptions, EvalResult, RuleOrchestrator};
