use ruleforge_core::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token kinds produced by the lexer (§4.1 "Token kinds").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    Integer(i64),
    Decimal(String),
    StringLit(String),
    BoolLit(bool),
    NullLit,

    Ident(String),

    // Keywords
    Set,
    To,
    Calculate,
    As,
    Run,
    Add,
    Subtract,
    Multiply,
    Divide,
    Append,
    Prepend,
    Remove,
    From,
    By,
    Call,
    With,
    If,
    Then,
    Else,
    ForEach,
    In,
    While,
    Do,
    CircuitBreaker,
    Store,
    Exists,

    // Logical / comparison keywords (case-insensitive per §6)
    And,
    Or,
    Not,
    Between,
    NotBetween,
    InList,
    NotInList,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    NotMatches,
    GreaterThan,
    LessThan,
    AtLeast,
    AtMost,
    Equals,
    NotEquals,
    LengthEquals,
    LengthGreaterThan,
    LengthLessThan,
    AgeAtLeast,
    AgeLessThan,

    /// `is_*` postfix validation operator; payload is the suffix after `is_`
    /// normalized (e.g. `positive`, `email`).
    ValidationOp(String),

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "{n}"),
            TokenKind::Decimal(s) => write!(f, "{s}"),
            TokenKind::StringLit(s) => write!(f, "\"{s}\""),
            TokenKind::BoolLit(b) => write!(f, "{b}"),
            TokenKind::NullLit => write!(f, "null"),
            TokenKind::Ident(s) => write!(f, "{s}"),
            TokenKind::ValidationOp(s) => write!(f, "is_{s}"),
            TokenKind::Eof => write!(f, "EOF"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Perfect-match keyword/named-operator table, consulted before an
/// identifier is treated as a bare `Ident` (§4.1: "Keywords and named
/// operators take precedence over identifiers via a perfect-match keyword
/// table").
pub fn lookup_keyword(word: &str) -> Option<TokenKind> {
    let lower = word.to_ascii_lowercase();
    let kind = match lower.as_str() {
        "set" => TokenKind::Set,
        "to" => TokenKind::To,
        "calculate" => TokenKind::Calculate,
        "as" => TokenKind::As,
        "run" => TokenKind::Run,
        "add" => TokenKind::Add,
        "subtract" => TokenKind::Subtract,
        "multiply" => TokenKind::Multiply,
        "divide" => TokenKind::Divide,
        "append" => TokenKind::Append,
        "prepend" => TokenKind::Prepend,
        "remove" => TokenKind::Remove,
        "from" => TokenKind::From,
        "by" => TokenKind::By,
        "call" => TokenKind::Call,
        "with" => TokenKind::With,
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "else" => TokenKind::Else,
        "foreach" => TokenKind::ForEach,
        "in" => TokenKind::In,
        "while" => TokenKind::While,
        "do" => TokenKind::Do,
        "circuit_breaker" => TokenKind::CircuitBreaker,
        "store" => TokenKind::Store,
        "exists" => TokenKind::Exists,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "between" => TokenKind::Between,
        "not_between" => TokenKind::NotBetween,
        "in_list" => TokenKind::InList,
        "not_in_list" | "not_in" => TokenKind::NotInList,
        "contains" => TokenKind::Contains,
        "not_contains" => TokenKind::NotContains,
        "starts_with" => TokenKind::StartsWith,
        "ends_with" => TokenKind::EndsWith,
        "matches" => TokenKind::Matches,
        "not_matches" => TokenKind::NotMatches,
        "greater_than" => TokenKind::GreaterThan,
        "less_than" => TokenKind::LessThan,
        "at_least" | "greater_than_or_equal" => TokenKind::AtLeast,
        "at_most" | "less_than_or_equal" => TokenKind::AtMost,
        "equals" => TokenKind::Equals,
        "not_equals" => TokenKind::NotEquals,
        "length_equals" => TokenKind::LengthEquals,
        "length_greater_than" => TokenKind::LengthGreaterThan,
        "length_less_than" => TokenKind::LengthLessThan,
        "age_at_least" => TokenKind::AgeAtLeast,
        "age_less_than" => TokenKind::AgeLessThan,
        "true" => TokenKind::BoolLit(true),
        "false" => TokenKind::BoolLit(false),
        "null" => TokenKind::NullLit,
        _ => {
            if let Some(suffix) = lower.strip_prefix("is_") {
                return Some(TokenKind::ValidationOp(suffix.to_string()));
            }
            return None;
        }
    };
    Some(kind)
}
