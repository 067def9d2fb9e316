//! C2 Parsers (§4.3).
//!
//! Four cooperating parsers share one `ParseError` type: the expression
//! parser (`expr`), the condition parser (`condition`), the action parser
//! (`action`), and the YAML-to-structural document parser (`document`).
//! The first three operate on a token stream produced by [`crate::lexer`];
//! the document parser operates on a generic YAML tree and calls into the
//! other three for scalar expression/condition/action strings.

pub mod action;
pub mod condition;
pub mod document;
pub mod expr;

use crate::lexer::LexError;
use crate::tokens::{Token, TokenKind};
use ruleforge_core::Span;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("lexer error: {0}")]
    Lex(#[from] LexError),
    #[error("unexpected token {found} at line {}, column {} (expected {expected})", span.line, span.column)]
    UnexpectedToken {
        found: String,
        expected: String,
        span: Span,
    },
    #[error("unexpected end of input (expected {expected})")]
    UnexpectedEof { expected: String },
    #[error("unmatched bracket or parenthesis starting at line {}, column {}", span.line, span.column)]
    UnmatchedBracket { span: Span },
    #[error("unrecognized action keyword '{found}' at line {}, column {}", span.line, span.column)]
    UnknownAction { found: String, span: Span },
    #[error("invalid rule document: {0}")]
    Document(String),
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::Lex(_) => "E1001",
            ParseError::UnexpectedToken { .. } => "E2001",
            ParseError::UnexpectedEof { .. } => "E2002",
            ParseError::UnmatchedBracket { .. } => "E2003",
            ParseError::UnknownAction { .. } => "E2004",
            ParseError::Document(_) => "E2005",
        }
    }
}

/// Shared cursor over a token stream, used by the expression, condition,
/// and action parsers.
pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    pub(crate) fn peek_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    pub(crate) fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    pub(crate) fn is_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    pub(crate) fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else if self.is_eof() {
            Err(ParseError::UnexpectedEof {
                expected: context.to_string(),
            })
        } else {
            Err(ParseError::UnexpectedToken {
                found: self.peek().to_string(),
                expected: context.to_string(),
                span: self.peek_span(),
            })
        }
    }

    pub(crate) fn expect_ident(&mut self, context: &str) -> Result<(String, Span), ParseError> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, span))
            }
            _ if self.is_eof() => Err(ParseError::UnexpectedEof {
                expected: context.to_string(),
            }),
            other => Err(ParseError::UnexpectedToken {
                found: other.to_string(),
                expected: context.to_string(),
                span,
            }),
        }
    }
}

pub(crate) fn tokens_from_str(source: &str) -> Result<Vec<Token>, ParseError> {
    crate::lexer::tokenize(source).map_err(ParseError::from)
}
