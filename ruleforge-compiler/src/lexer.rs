//! C1 Lexer (§4.1).
//!
//! Single-pass, single-threaded, restartable by re-creation. Transforms a
//! DSL expression/action/condition string into a finite stream of tokens
//! ending in `Eof`.

use crate::tokens::{lookup_keyword, Token, TokenKind};
use ruleforge_core::Span;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, column {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("unterminated string literal starting at line {line}, column {col}")]
    UnterminatedString { line: usize, col: usize },
    #[error("invalid numeric literal at line {line}, column {col}")]
    InvalidNumber { line: usize, col: usize },
}

pub struct Lexer<'src> {
    source: &'src str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input, returning the token stream (always
    /// terminated by `Eof`) or the first `LexError` encountered. The lexer
    /// does not attempt recovery (§4.1).
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start_offset = self.byte_offset();
            let start_line = self.line;
            let start_col = self.col;
            let Some(ch) = self.peek() else {
                tokens.push(Token::new(
                    TokenKind::Eof,
                    Span::new(start_offset, 0, start_line, start_col),
                ));
                break;
            };

            let kind = if ch == '"' || ch == '\'' {
                self.lex_string(ch)?
            } else if ch.is_ascii_digit() {
                self.lex_number()?
            } else if ch == '_' || ch.is_alphabetic() {
                self.lex_ident_or_keyword()
            } else {
                self.lex_operator_or_punct(start_line, start_col)?
            };

            let end_offset = self.byte_offset();
            let span = Span::new(
                start_offset,
                end_offset - start_offset,
                start_line,
                start_col,
            );
            tokens.push(Token::new(kind, span));
        }
        Ok(tokens)
    }

    fn byte_offset(&self) -> usize {
        self.chars[..self.pos].iter().map(|c| c.len_utf8()).sum()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    /// Skip whitespace and `#`-line comments; both still advance position
    /// (§4.1 "Whitespace and `#`-line comments are skipped but advance
    /// source position").
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<TokenKind, LexError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(LexError::UnterminatedString {
                        line: start_line,
                        col: start_col,
                    })
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some('\'') => out.push('\''),
                    Some(other) => out.push(other),
                    None => {
                        return Err(LexError::UnterminatedString {
                            line: start_line,
                            col: start_col,
                        })
                    }
                },
                Some(c) => out.push(c),
            }
        }
        Ok(TokenKind::StringLit(out))
    }

    /// Longest-prefix match for integer/decimal literals. Leading sign is
    /// not consumed here — that is handled by the parser's unary-context
    /// disambiguation (§4.1 "sign handling is deferred to the parser").
    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let start_line = self.line;
        let start_col = self.col;
        let mut text = String::new();
        let mut is_decimal = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else if c == '.' && !is_decimal && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit())
            {
                is_decimal = true;
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if text.is_empty() {
            return Err(LexError::InvalidNumber {
                line: start_line,
                col: start_col,
            });
        }

        if is_decimal {
            Ok(TokenKind::Decimal(text))
        } else {
            match text.parse::<i64>() {
                Ok(n) => Ok(TokenKind::Integer(n)),
                Err(_) => Ok(TokenKind::Decimal(text)),
            }
        }
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        lookup_keyword(&text).unwrap_or(TokenKind::Ident(text))
    }

    fn lex_operator_or_punct(&mut self, line: usize, col: usize) -> Result<TokenKind, LexError> {
        let c = self.advance().unwrap();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '+' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    TokenKind::StarStar
                } else if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    return Err(LexError::UnexpectedChar { ch: c, line, col });
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            other => return Err(LexError::UnexpectedChar { ch: other, line, col }),
        };
        Ok(kind)
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_comparison() {
        let tokens = tokenize("creditScore >= 650").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("creditScore".into()));
        assert_eq!(tokens[1].kind, TokenKind::GtEq);
        assert_eq!(tokens[2].kind, TokenKind::Integer(650));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn tokenizes_decimal_literal() {
        let tokens = tokenize("0.3").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Decimal("0.3".into()));
    }

    #[test]
    fn tokenizes_string_with_escapes() {
        let tokens = tokenize(r#""hello\nworld""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLit("hello\nworld".into()));
    }

    #[test]
    fn unterminated_string_is_lex_error() {
        let err = tokenize("\"abc").unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn skips_comments() {
        let tokens = tokenize("# a comment\ncreditScore").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("creditScore".into()));
    }

    #[test]
    fn validation_operator_recognized() {
        let tokens = tokenize("is_positive").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::ValidationOp("positive".into()));
    }

    #[test]
    fn unknown_character_is_lex_error() {
        let err = tokenize("a ~ b").unwrap_err();
        assert!(matches!(err, LexError::UnexpectedChar { ch: '~', .. }));
    }

    #[test]
    fn exponent_operator_tokenized() {
        let tokens = tokenize("2 ** 3").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::StarStar);
    }
}
