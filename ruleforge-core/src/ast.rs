//! AST node hierarchy (§3 "AST node hierarchy").
//!
//! Three disjoint node families — Expression, Condition, Action — each a
//! tagged enum. Every node carries its `Span`. There is no shared structure
//! across families and no virtual inheritance: dispatch is a single `match`
//! on the variant tag (§9 "Polymorphic AST without inheritance").

use crate::span::Span;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Operators ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
            ArithOp::Pow => "**",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Between,
    NotBetween,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    NotMatches,
    InList,
    NotInList,
    LengthEquals,
    LengthGreaterThan,
    LengthLessThan,
    AgeAtLeast,
    AgeLessThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// Postfix validation operators (§6 "Unary validation"). Never raise; they
/// always produce a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOp {
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
    IsNumeric,
    IsNotNumeric,
    IsNumber,
    IsString,
    IsBoolean,
    IsList,
    IsEmail,
    IsPhone,
    IsDate,
    IsPositive,
    IsNegative,
    IsZero,
    IsNonZero,
    IsPercentage,
    IsCurrency,
    IsCreditScore,
    IsSsn,
    IsAccountNumber,
    IsRoutingNumber,
    IsBusinessDay,
    IsWeekend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListOp {
    Append,
    Prepend,
    Remove,
}

// ── Expressions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value, Span),
    Variable(String, Span),
    Binary(CompareOp, Box<Expr>, Box<Expr>, Span),
    BinaryArith(ArithOp, Box<Expr>, Box<Expr>, Span),
    Logical(LogicalOp, Vec<Expr>, Span),
    Unary(UnaryOp, Box<Expr>, Span),
    Validation(ValidationOp, Box<Expr>, Span),
    /// A chain of `+ - * / %` terms evaluated left-to-right honoring
    /// precedence (kept distinct from `BinaryArith` so the parser can
    /// build flat arithmetic chains without nesting every step).
    Arithmetic(Vec<Expr>, Vec<ArithOp>, Span),
    FunctionCall(String, Vec<Expr>, Span),
    JsonPath(Box<Expr>, String, Span),
    RestCall {
        method: String,
        url: Box<Expr>,
        body: Option<Box<Expr>>,
        headers: Option<Box<Expr>>,
        timeout: Option<Box<Expr>>,
        span: Span,
    },
    List(Vec<Expr>, Span),
    /// `expr[index]`
    Index(Box<Expr>, Box<Expr>, Span),
    /// Existence check on a bare identifier: `exists name`.
    Exists(String, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, s)
            | Expr::Variable(_, s)
            | Expr::Binary(_, _, _, s)
            | Expr::BinaryArith(_, _, _, s)
            | Expr::Logical(_, _, s)
            | Expr::Unary(_, _, s)
            | Expr::Validation(_, _, s)
            | Expr::Arithmetic(_, _, s)
            | Expr::FunctionCall(_, _, s)
            | Expr::JsonPath(_, _, s)
            | Expr::List(_, s)
            | Expr::Index(_, _, s)
            | Expr::Exists(_, s) => *s,
            Expr::RestCall { span, .. } => *span,
        }
    }
}

// ── Conditions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Condition {
    Comparison(CompareOp, Expr, Expr, Span),
    Logical(LogicalOp, Vec<Condition>, Span),
    Not(Box<Condition>, Span),
    /// Any boolean-valued Expression used in condition position.
    ExpressionCondition(Expr, Span),
}

impl Condition {
    pub fn span(&self) -> Span {
        match self {
            Condition::Comparison(_, _, _, s) => *s,
            Condition::Logical(_, _, s) => *s,
            Condition::Not(_, s) => *s,
            Condition::ExpressionCondition(_, s) => *s,
        }
    }
}

// ── Actions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Action {
    Set(String, Expr, Span),
    Assignment(AssignOp, String, Expr, Span),
    Calculate(String, Expr, Span),
    Run(String, Expr, Span),
    Arithmetic(String, ArithOp, Expr, Span),
    FunctionCall(String, Vec<Expr>, Option<String>, Span),
    List(ListOp, String, Expr, Span),
    Conditional(Condition, Vec<Action>, Vec<Action>, Span),
    ForEach {
        item_var: String,
        index_var: Option<String>,
        list: Expr,
        body: Vec<Action>,
        span: Span,
    },
    While(Condition, Vec<Action>, Span),
    DoWhile(Vec<Action>, Condition, Span),
    CircuitBreaker(Expr, Span),
}

impl Action {
    pub fn span(&self) -> Span {
        match self {
            Action::Set(_, _, s)
            | Action::Assignment(_, _, _, s)
            | Action::Calculate(_, _, s)
            | Action::Run(_, _, s)
            | Action::Arithmetic(_, _, _, s)
            | Action::FunctionCall(_, _, _, s)
            | Action::List(_, _, _, s)
            | Action::Conditional(_, _, _, s)
            | Action::While(_, _, s)
            | Action::DoWhile(_, _, s)
            | Action::CircuitBreaker(_, s) => *s,
            Action::ForEach { span, .. } => *span,
        }
    }
}

// ── Rule document model (§3 "Rule document") ────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    Boolean,
    Number,
    Text,
    Date,
    Object,
    List,
}

impl OutputType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "boolean" => Some(OutputType::Boolean),
            "number" => Some(OutputType::Number),
            "text" => Some(OutputType::Text),
            "date" => Some(OutputType::Date),
            "object" => Some(OutputType::Object),
            "list" => Some(OutputType::List),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantDefault {
    pub name: String,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub timeout_ms: u64,
    pub recovery_timeout_ms: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: 5,
            timeout_ms: 5_000,
            recovery_timeout_ms: 30_000,
        }
    }
}

/// A *simple* rule body: `when` + `then` + optional `else`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SimpleLogic {
    pub when: Vec<Condition>,
    pub then: Vec<Action>,
    pub otherwise: Vec<Action>,
}

/// A *structured* rule body: a single nested if/then/else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredLogic {
    pub condition: Condition,
    pub then: Vec<Action>,
    pub otherwise: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleLogic {
    Simple(SimpleLogic),
    Structured(StructuredLogic),
    /// An ordered sequence of sub-rules sharing one context.
    Sequence(Vec<SubRule>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubRule {
    pub name: Option<String>,
    pub guard: Option<Condition>,
    pub logic: Box<RuleLogic>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuleMetadata {
    pub name: String,
    pub description: String,
    pub fields: std::collections::BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDocument {
    pub metadata: RuleMetadata,
    pub inputs: Vec<String>,
    pub constants: Vec<ConstantDefault>,
    pub logic: RuleLogic,
    pub output_schema: std::collections::BTreeMap<String, OutputType>,
    pub circuit: CircuitConfig,
}
