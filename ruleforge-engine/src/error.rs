//! Evaluation-time error taxonomy (§4.6/§7 "EvalError").
//!
//! `EvalError` is the only error an evaluation can produce once parsing and
//! validation have both succeeded. It is terminal for the whole rule: no
//! further actions run, the partial computed state is discarded from the
//! result, and the orchestrator maps it onto `EvalResult.error`.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("operator `{op}` applied to unsupported or mismatched types ({lhs} vs {rhs})")]
    TypeMismatch {
        op: String,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("function `{0}` is not in the built-in registry")]
    UnknownFunction(String),

    #[error("function `{name}` expects at least {min} argument(s), got {got}")]
    Arity { name: String, min: usize, got: usize },

    #[error("loop exceeded its maximum iteration cap ({cap})")]
    LoopCapExceeded { cap: usize },

    #[error("action wrote to `{0}`, which is not a Computed identifier")]
    InvalidWriteTarget(String),

    #[error("`calculate` expression for `{0}` did not evaluate to a number")]
    CalculateNotNumeric(String),

    #[error("arithmetic target `{0}` was null for a non-additive operator")]
    NullArithmeticTarget(String),

    #[error("ordering comparison attempted across incompatible types ({lhs} vs {rhs})")]
    IncomparableTypes { lhs: &'static str, rhs: &'static str },

    #[error("{0}")]
    Other(String),
}

impl EvalError {
    /// Stable error code (§7 error taxonomy, E4xxx range).
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::DivisionByZero => "E4001",
            EvalError::TypeMismatch { .. } => "E4002",
            EvalError::UnknownFunction(_) => "E4003",
            EvalError::Arity { .. } => "E4003",
            EvalError::LoopCapExceeded { .. } => "E4004",
            EvalError::InvalidWriteTarget(_) => "E4005",
            EvalError::CalculateNotNumeric(_) => "E4006",
            EvalError::NullArithmeticTarget(_) => "E4007",
            EvalError::IncomparableTypes { .. } => "E4008",
            EvalError::Other(_) => "E4002",
        }
    }
}
