//! Expression parser (§4.3 "Expression parser").
//!
//! Recursive-descent with precedence climbing, low to high:
//! `or` → `and` → prefix `not` → comparison → additive → multiplicative →
//! exponentiation → unary prefix → postfix → primary.

use super::{Parser, ParseError};
use crate::tokens::TokenKind;
use ruleforge_core::{ArithOp, CompareOp, Expr, LogicalOp, UnaryOp, Value, ValidationOp};

pub fn parse_expr_str(source: &str) -> Result<Expr, ParseError> {
    let tokens = super::tokens_from_str(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parse_expression(&mut parser)?;
    if !parser.is_eof() {
        return Err(ParseError::UnexpectedToken {
            found: parser.peek().to_string(),
            expected: "end of expression".to_string(),
            span: parser.peek_span(),
        });
    }
    Ok(expr)
}

pub(crate) fn parse_expression(p: &mut Parser) -> Result<Expr, ParseError> {
    parse_or(p)
}

fn parse_or(p: &mut Parser) -> Result<Expr, ParseError> {
    let first = parse_and(p)?;
    let mut terms = vec![first];
    let start = terms[0].span();
    while p.matches(&TokenKind::Or) {
        terms.push(parse_and(p)?);
    }
    if terms.len() == 1 {
        Ok(terms.into_iter().next().unwrap())
    } else {
        let end = terms.last().unwrap().span();
        Ok(Expr::Logical(LogicalOp::Or, terms, start.merge(end)))
    }
}

fn parse_and(p: &mut Parser) -> Result<Expr, ParseError> {
    let first = parse_not(p)?;
    let mut terms = vec![first];
    let start = terms[0].span();
    while p.matches(&TokenKind::And) {
        terms.push(parse_not(p)?);
    }
    if terms.len() == 1 {
        Ok(terms.into_iter().next().unwrap())
    } else {
        let end = terms.last().unwrap().span();
        Ok(Expr::Logical(LogicalOp::And, terms, start.merge(end)))
    }
}

/// Prefix logical `not`/`NOT` (level 3); falls through to comparison.
fn parse_not(p: &mut Parser) -> Result<Expr, ParseError> {
    if p.matches(&TokenKind::Not) {
        let start = p.peek_span();
        let operand = parse_not(p)?;
        let span = start.merge(operand.span());
        return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand), span));
    }
    parse_comparison(p)
}

fn named_compare_op(kind: &TokenKind) -> Option<CompareOp> {
    match kind {
        TokenKind::Eq => Some(CompareOp::Eq),
        TokenKind::NotEq => Some(CompareOp::NotEq),
        TokenKind::Lt => Some(CompareOp::Lt),
        TokenKind::Gt => Some(CompareOp::Gt),
        TokenKind::LtEq => Some(CompareOp::LtEq),
        TokenKind::GtEq => Some(CompareOp::GtEq),
        TokenKind::GreaterThan => Some(CompareOp::Gt),
        TokenKind::LessThan => Some(CompareOp::Lt),
        TokenKind::AtLeast => Some(CompareOp::GtEq),
        TokenKind::AtMost => Some(CompareOp::LtEq),
        TokenKind::Equals => Some(CompareOp::Eq),
        TokenKind::NotEquals => Some(CompareOp::NotEq),
        TokenKind::Contains => Some(CompareOp::Contains),
        TokenKind::NotContains => Some(CompareOp::NotContains),
        TokenKind::StartsWith => Some(CompareOp::StartsWith),
        TokenKind::EndsWith => Some(CompareOp::EndsWith),
        TokenKind::Matches => Some(CompareOp::Matches),
        TokenKind::NotMatches => Some(CompareOp::NotMatches),
        TokenKind::InList => Some(CompareOp::InList),
        TokenKind::In => Some(CompareOp::InList),
        TokenKind::NotInList => Some(CompareOp::NotInList),
        TokenKind::LengthEquals => Some(CompareOp::LengthEquals),
        TokenKind::LengthGreaterThan => Some(CompareOp::LengthGreaterThan),
        TokenKind::LengthLessThan => Some(CompareOp::LengthLessThan),
        TokenKind::AgeAtLeast => Some(CompareOp::AgeAtLeast),
        TokenKind::AgeLessThan => Some(CompareOp::AgeLessThan),
        _ => None,
    }
}

fn validation_op(suffix: &str) -> Option<ValidationOp> {
    let op = match suffix {
        "null" => ValidationOp::IsNull,
        "not_null" => ValidationOp::IsNotNull,
        "empty" => ValidationOp::IsEmpty,
        "not_empty" => ValidationOp::IsNotEmpty,
        "numeric" => ValidationOp::IsNumeric,
        "not_numeric" => ValidationOp::IsNotNumeric,
        "number" => ValidationOp::IsNumber,
        "string" => ValidationOp::IsString,
        "boolean" => ValidationOp::IsBoolean,
        "list" => ValidationOp::IsList,
        "email" => ValidationOp::IsEmail,
        "phone" => ValidationOp::IsPhone,
        "date" => ValidationOp::IsDate,
        "positive" => ValidationOp::IsPositive,
        "negative" => ValidationOp::IsNegative,
        "zero" => ValidationOp::IsZero,
        "non_zero" => ValidationOp::IsNonZero,
        "percentage" => ValidationOp::IsPercentage,
        "currency" => ValidationOp::IsCurrency,
        "credit_score" => ValidationOp::IsCreditScore,
        "ssn" => ValidationOp::IsSsn,
        "account_number" => ValidationOp::IsAccountNumber,
        "routing_number" => ValidationOp::IsRoutingNumber,
        "business_day" => ValidationOp::IsBusinessDay,
        "weekend" => ValidationOp::IsWeekend,
        _ => return None,
    };
    Some(op)
}

fn parse_comparison(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut left = parse_additive(p)?;
    loop {
        match p.peek().clone() {
            TokenKind::Between => {
                let start = left.span();
                p.advance();
                let low = parse_additive(p)?;
                p.expect(TokenKind::And, "`and` in `between ... and ...`")?;
                let high = parse_additive(p)?;
                let span = start.merge(high.span());
                let list = Expr::List(vec![low, high], span);
                left = Expr::Binary(CompareOp::Between, Box::new(left), Box::new(list), span);
            }
            TokenKind::NotBetween => {
                let start = left.span();
                p.advance();
                let low = parse_additive(p)?;
                p.expect(TokenKind::And, "`and` in `not_between ... and ...`")?;
                let high = parse_additive(p)?;
                let span = start.merge(high.span());
                let list = Expr::List(vec![low, high], span);
                left = Expr::Binary(CompareOp::NotBetween, Box::new(left), Box::new(list), span);
            }
            TokenKind::ValidationOp(suffix) => {
                let span = p.peek_span();
                p.advance();
                let op = validation_op(&suffix).ok_or_else(|| ParseError::UnexpectedToken {
                    found: format!("is_{suffix}"),
                    expected: "a known validation operator".to_string(),
                    span,
                })?;
                let full_span = left.span().merge(span);
                left = Expr::Validation(op, Box::new(left), full_span);
            }
            ref kind if named_compare_op(kind).is_some() => {
                let op = named_compare_op(kind).unwrap();
                p.advance();
                let right = parse_additive(p)?;
                let span = left.span().merge(right.span());
                left = Expr::Binary(op, Box::new(left), Box::new(right), span);
            }
            _ => break,
        }
    }
    Ok(left)
}

fn parse_additive(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut terms = vec![parse_multiplicative(p)?];
    let mut ops = Vec::new();
    loop {
        let op = match p.peek() {
            TokenKind::Plus => ArithOp::Add,
            TokenKind::Minus => ArithOp::Sub,
            _ => break,
        };
        p.advance();
        ops.push(op);
        terms.push(parse_multiplicative(p)?);
    }
    fold_arithmetic(terms, ops)
}

fn parse_multiplicative(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut terms = vec![parse_unary(p)?];
    let mut ops = Vec::new();
    loop {
        let op = match p.peek() {
            TokenKind::Star => ArithOp::Mul,
            TokenKind::Slash => ArithOp::Div,
            TokenKind::Percent => ArithOp::Mod,
            _ => break,
        };
        p.advance();
        ops.push(op);
        terms.push(parse_unary(p)?);
    }
    fold_arithmetic(terms, ops)
}

/// Builds a flat `Arithmetic` chain when more than one operator is present,
/// otherwise returns the single term unwrapped.
fn fold_arithmetic(terms: Vec<Expr>, ops: Vec<ArithOp>) -> Result<Expr, ParseError> {
    if ops.is_empty() {
        Ok(terms.into_iter().next().unwrap())
    } else {
        let span = terms[0].span().merge(terms.last().unwrap().span());
        Ok(Expr::Arithmetic(terms, ops, span))
    }
}

/// Unary prefix (level 8): `-`, `+`, `not`. Falls through to exponentiation,
/// so `-x ** y` parses as `-(x ** y)` — the exponent binds tighter than the
/// leading sign (§4.3 tie-break).
fn parse_unary(p: &mut Parser) -> Result<Expr, ParseError> {
    let start = p.peek_span();
    let op = match p.peek() {
        TokenKind::Minus => Some(UnaryOp::Neg),
        TokenKind::Plus => Some(UnaryOp::Pos),
        TokenKind::Not => Some(UnaryOp::Not),
        _ => None,
    };
    if let Some(op) = op {
        p.advance();
        let operand = parse_unary(p)?;
        let span = start.merge(operand.span());
        Ok(Expr::Unary(op, Box::new(operand), span))
    } else {
        parse_exponent(p)
    }
}

/// Exponentiation (level 7), right-associative.
fn parse_exponent(p: &mut Parser) -> Result<Expr, ParseError> {
    let base = parse_postfix(p)?;
    if p.matches(&TokenKind::StarStar) {
        let rhs = parse_unary(p)?;
        let span = base.span().merge(rhs.span());
        Ok(Expr::BinaryArith(ArithOp::Pow, Box::new(base), Box::new(rhs), span))
    } else {
        Ok(base)
    }
}

/// Postfix (level 9): function calls, `[index]`, and `.field` json-path
/// access chained onto a primary.
fn parse_postfix(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut expr = parse_primary(p)?;
    loop {
        match p.peek().clone() {
            TokenKind::LBracket => {
                p.advance();
                let index = parse_expression(p)?;
                let end = p.expect(TokenKind::RBracket, "`]` closing an index expression")?;
                let span = expr.span().merge(end.span);
                expr = Expr::Index(Box::new(expr), Box::new(index), span);
            }
            TokenKind::Dot => {
                p.advance();
                let (field, field_span) = p.expect_ident("a field name after `.`")?;
                let span = expr.span().merge(field_span);
                expr = Expr::JsonPath(Box::new(expr), field, span);
            }
            _ => break,
        }
    }
    Ok(expr)
}

/// Primary (level 10): literals, variables, `exists name`, function calls,
/// list literals, and parenthesized expressions.
fn parse_primary(p: &mut Parser) -> Result<Expr, ParseError> {
    let span = p.peek_span();
    match p.peek().clone() {
        TokenKind::Integer(n) => {
            p.advance();
            Ok(Expr::Literal(Value::from(n), span))
        }
        TokenKind::Decimal(text) => {
            p.advance();
            let decimal = text
                .parse::<rust_decimal::Decimal>()
                .map_err(|_| ParseError::UnexpectedToken {
                    found: text.clone(),
                    expected: "a valid decimal literal".to_string(),
                    span,
                })?;
            Ok(Expr::Literal(Value::Number(decimal), span))
        }
        TokenKind::StringLit(s) => {
            p.advance();
            Ok(Expr::Literal(Value::String(s), span))
        }
        TokenKind::BoolLit(b) => {
            p.advance();
            Ok(Expr::Literal(Value::Boolean(b), span))
        }
        TokenKind::NullLit => {
            p.advance();
            Ok(Expr::Literal(Value::Null, span))
        }
        TokenKind::Exists => {
            p.advance();
            let (name, name_span) = p.expect_ident("a variable name after `exists`")?;
            Ok(Expr::Exists(name, span.merge(name_span)))
        }
        TokenKind::Ident(name) => {
            p.advance();
            if p.check(&TokenKind::LParen) {
                parse_call_args(p, name, span)
            } else {
                Ok(Expr::Variable(name, span))
            }
        }
        TokenKind::LParen => {
            p.advance();
            let inner = parse_expression(p)?;
            p.expect(TokenKind::RParen, "`)` closing a parenthesized expression")?;
            Ok(inner)
        }
        TokenKind::LBracket => {
            p.advance();
            let mut items = Vec::new();
            if !p.check(&TokenKind::RBracket) {
                items.push(parse_expression(p)?);
                while p.matches(&TokenKind::Comma) {
                    items.push(parse_expression(p)?);
                }
            }
            let end = p.expect(TokenKind::RBracket, "`]` closing a list literal")?;
            Ok(Expr::List(items, span.merge(end.span)))
        }
        TokenKind::Eof => Err(ParseError::UnexpectedEof {
            expected: "an expression".to_string(),
        }),
        other => Err(ParseError::UnexpectedToken {
            found: other.to_string(),
            expected: "an expression".to_string(),
            span,
        }),
    }
}

fn parse_call_args(p: &mut Parser, name: String, start: ruleforge_core::Span) -> Result<Expr, ParseError> {
    p.expect(TokenKind::LParen, "`(` opening a function call")?;
    let mut args = Vec::new();
    if !p.check(&TokenKind::RParen) {
        args.push(parse_expression(p)?);
        while p.matches(&TokenKind::Comma) {
            args.push(parse_expression(p)?);
        }
    }
    let end = p.expect(TokenKind::RParen, "`)` closing a function call")?;
    Ok(Expr::FunctionCall(name, args, start.merge(end.span)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let expr = parse_expr_str("creditScore >= 650").unwrap();
        assert!(matches!(expr, Expr::Binary(CompareOp::GtEq, _, _, _)));
    }

    #[test]
    fn negative_exponent_binds_tighter_than_unary() {
        let expr = parse_expr_str("-x ** 2").unwrap();
        match expr {
            Expr::Unary(UnaryOp::Neg, inner, _) => {
                assert!(matches!(*inner, Expr::BinaryArith(ArithOp::Pow, _, _, _)));
            }
            other => panic!("expected outer Neg, got {other:?}"),
        }
    }

    #[test]
    fn between_consumes_and_as_lexical_piece() {
        let expr = parse_expr_str("score between 10 and 20").unwrap();
        assert!(matches!(expr, Expr::Binary(CompareOp::Between, _, _, _)));
    }

    #[test]
    fn validation_operator_parses_as_postfix() {
        let expr = parse_expr_str("amount is_positive").unwrap();
        assert!(matches!(expr, Expr::Validation(ValidationOp::IsPositive, _, _)));
    }

    #[test]
    fn function_call_parses_arguments() {
        let expr = parse_expr_str("round(amount, 2)").unwrap();
        match expr {
            Expr::FunctionCall(name, args, _) => {
                assert_eq!(name, "round");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected FunctionCall, got {other:?}"),
        }
    }

    #[test]
    fn and_or_chain_builds_flat_logical_nodes() {
        let expr = parse_expr_str("a and b and c").unwrap();
        match expr {
            Expr::Logical(LogicalOp::And, terms, _) => assert_eq!(terms.len(), 3),
            other => panic!("expected flat And, got {other:?}"),
        }
    }

    #[test]
    fn json_path_postfix_chains() {
        let expr = parse_expr_str("payload.customer.name").unwrap();
        assert!(matches!(expr, Expr::JsonPath(_, ref f, _) if f == "name"));
    }

    #[test]
    fn bare_in_and_not_in_parse_as_list_membership() {
        let expr = parse_expr_str("tier in [\"HIGH\", \"LOW\"]").unwrap();
        assert!(matches!(expr, Expr::Binary(CompareOp::InList, _, _, _)));
        let expr = parse_expr_str("tier not_in [\"HIGH\", \"LOW\"]").unwrap();
        assert!(matches!(expr, Expr::Binary(CompareOp::NotInList, _, _, _)));
    }
}
