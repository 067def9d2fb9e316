//! Action parser (§4.3 "Action parser").
//!
//! Dispatches on the first token of the action text. Block bodies
//! (`forEach`, `while`, `do`) are a `;`-separated action list terminated by
//! whatever non-`;` token follows (the block's own closing keyword or EOF).

use super::condition::parse_condition as parse_condition_tokens;
use super::expr::parse_expression;
use super::{ParseError, Parser};
use crate::tokens::TokenKind;
use ruleforge_core::{Action, ArithOp, AssignOp, ListOp};

pub fn parse_action_str(source: &str) -> Result<Action, ParseError> {
    let tokens = super::tokens_from_str(source)?;
    let mut parser = Parser::new(tokens);
    let action = parse_action(&mut parser)?;
    if !parser.is_eof() {
        return Err(ParseError::UnexpectedToken {
            found: parser.peek().to_string(),
            expected: "end of action".to_string(),
            span: parser.peek_span(),
        });
    }
    Ok(action)
}

pub(crate) fn parse_action(p: &mut Parser) -> Result<Action, ParseError> {
    let start = p.peek_span();
    match p.peek().clone() {
        TokenKind::Set => {
            p.advance();
            let (var, _) = p.expect_ident("a target variable after `set`")?;
            p.expect(TokenKind::To, "`to` in `set <var> to <expr>`")?;
            let expr = parse_expression(p)?;
            let span = start.merge(expr.span());
            Ok(Action::Set(var, expr, span))
        }
        TokenKind::Calculate => {
            p.advance();
            let (var, _) = p.expect_ident("a target variable after `calculate`")?;
            p.expect(TokenKind::As, "`as` in `calculate <var> as <expr>`")?;
            let expr = parse_expression(p)?;
            let span = start.merge(expr.span());
            Ok(Action::Calculate(var, expr, span))
        }
        TokenKind::Run => {
            p.advance();
            let (var, _) = p.expect_ident("a target variable after `run`")?;
            p.expect(TokenKind::As, "`as` in `run <var> as <expr>`")?;
            let expr = parse_expression(p)?;
            let span = start.merge(expr.span());
            Ok(Action::Run(var, expr, span))
        }
        TokenKind::Add | TokenKind::Subtract | TokenKind::Multiply | TokenKind::Divide => {
            let op = match p.peek() {
                TokenKind::Add => ArithOp::Add,
                TokenKind::Subtract => ArithOp::Sub,
                TokenKind::Multiply => ArithOp::Mul,
                TokenKind::Divide => ArithOp::Div,
                _ => unreachable!(),
            };
            p.advance();
            let expr = parse_expression(p)?;
            expect_preposition(p, &[TokenKind::To, TokenKind::From, TokenKind::By])?;
            let (var, var_span) = p.expect_ident("a target variable")?;
            let span = start.merge(var_span);
            Ok(Action::Arithmetic(var, op, expr, span))
        }
        TokenKind::Append | TokenKind::Prepend | TokenKind::Remove => {
            let op = match p.peek() {
                TokenKind::Append => ListOp::Append,
                TokenKind::Prepend => ListOp::Prepend,
                TokenKind::Remove => ListOp::Remove,
                _ => unreachable!(),
            };
            p.advance();
            let expr = parse_expression(p)?;
            expect_preposition(p, &[TokenKind::To, TokenKind::From])?;
            let (var, var_span) = p.expect_ident("a target variable")?;
            let span = start.merge(var_span);
            Ok(Action::List(op, var, expr, span))
        }
        TokenKind::Call => {
            p.advance();
            let (name, _) = p.expect_ident("a function name after `call`")?;
            p.expect(TokenKind::With, "`with` in `call <name> with [args]`")?;
            p.expect(TokenKind::LBracket, "`[` opening the argument list")?;
            let mut args = Vec::new();
            if !p.check(&TokenKind::RBracket) {
                args.push(parse_expression(p)?);
                while p.matches(&TokenKind::Comma) {
                    args.push(parse_expression(p)?);
                }
            }
            let close = p.expect(TokenKind::RBracket, "`]` closing the argument list")?;
            let mut span = start.merge(close.span);
            let store_var = if p.matches(&TokenKind::And) {
                p.expect(TokenKind::Store, "`store` in `and store in <var>`")?;
                p.expect(TokenKind::In, "`in` in `and store in <var>`")?;
                let (var, var_span) = p.expect_ident("a variable name after `store in`")?;
                span = span.merge(var_span);
                Some(var)
            } else {
                None
            };
            Ok(Action::FunctionCall(name, args, store_var, span))
        }
        TokenKind::If => {
            p.advance();
            let cond = parse_condition_tokens(p)?;
            p.expect(TokenKind::Then, "`then` in `if <cond> then <action>`")?;
            let then_action = parse_action(p)?;
            let mut span = start.merge(then_action.span());
            let otherwise = if p.matches(&TokenKind::Else) {
                let else_action = parse_action(p)?;
                span = span.merge(else_action.span());
                vec![else_action]
            } else {
                Vec::new()
            };
            Ok(Action::Conditional(cond, vec![then_action], otherwise, span))
        }
        TokenKind::ForEach => {
            p.advance();
            let (item_var, _) = p.expect_ident("an item variable after `forEach`")?;
            let index_var = if p.matches(&TokenKind::Comma) {
                Some(p.expect_ident("an index variable")?.0)
            } else {
                None
            };
            p.expect(TokenKind::In, "`in` in `forEach <var> in <expr>`")?;
            let list = parse_expression(p)?;
            p.expect(TokenKind::Colon, "`:` opening the forEach body")?;
            let body = parse_action_block(p)?;
            let span = start.merge(body.last().map(|a| a.span()).unwrap_or(list.span()));
            Ok(Action::ForEach {
                item_var,
                index_var,
                list,
                body,
                span,
            })
        }
        TokenKind::While => {
            p.advance();
            let cond = parse_condition_tokens(p)?;
            p.expect(TokenKind::Colon, "`:` opening the while body")?;
            let body = parse_action_block(p)?;
            let span = start.merge(body.last().map(|a| a.span()).unwrap_or(cond.span()));
            Ok(Action::While(cond, body, span))
        }
        TokenKind::Do => {
            p.advance();
            p.expect(TokenKind::Colon, "`:` opening the do body")?;
            let body = parse_action_block(p)?;
            p.expect(TokenKind::While, "`while` closing a do...while body")?;
            let cond = parse_condition_tokens(p)?;
            let span = start.merge(cond.span());
            Ok(Action::DoWhile(body, cond, span))
        }
        TokenKind::CircuitBreaker => {
            p.advance();
            let message = parse_expression(p)?;
            let span = start.merge(message.span());
            Ok(Action::CircuitBreaker(message, span))
        }
        TokenKind::Ident(name) if assign_op(p.peek_at(1)).is_some() => {
            p.advance();
            let op = assign_op(p.peek()).unwrap();
            p.advance();
            let expr = parse_expression(p)?;
            let span = start.merge(expr.span());
            Ok(Action::Assignment(op, name, expr, span))
        }
        TokenKind::Eof => Err(ParseError::UnexpectedEof {
            expected: "an action".to_string(),
        }),
        other => Err(ParseError::UnknownAction {
            found: other.to_string(),
            span: start,
        }),
    }
}

fn assign_op(kind: &TokenKind) -> Option<AssignOp> {
    match kind {
        TokenKind::Assign => Some(AssignOp::Assign),
        TokenKind::PlusAssign => Some(AssignOp::AddAssign),
        TokenKind::MinusAssign => Some(AssignOp::SubAssign),
        TokenKind::StarAssign => Some(AssignOp::MulAssign),
        TokenKind::SlashAssign => Some(AssignOp::DivAssign),
        TokenKind::PercentAssign => Some(AssignOp::ModAssign),
        _ => None,
    }
}

fn expect_preposition(p: &mut Parser, options: &[TokenKind]) -> Result<(), ParseError> {
    for option in options {
        if p.check(option) {
            p.advance();
            return Ok(());
        }
    }
    Err(ParseError::UnexpectedToken {
        found: p.peek().to_string(),
        expected: "`to`, `from`, or `by`".to_string(),
        span: p.peek_span(),
    })
}

/// `<action>(; <action>)*`, stopping at the first non-`;` token.
pub(crate) fn parse_action_block(p: &mut Parser) -> Result<Vec<Action>, ParseError> {
    let mut actions = vec![parse_action(p)?];
    while p.matches(&TokenKind::Semicolon) {
        actions.push(parse_action(p)?);
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_action() {
        let action = parse_action_str("set riskScore to 42").unwrap();
        assert!(matches!(action, Action::Set(ref v, _, _) if v == "riskScore"));
    }

    #[test]
    fn parses_calculate_action() {
        let action = parse_action_str("calculate totalInterest as principal * rate").unwrap();
        assert!(matches!(action, Action::Calculate(ref v, _, _) if v == "totalInterest"));
    }

    #[test]
    fn parses_arithmetic_action() {
        let action = parse_action_str("add 10 to balance").unwrap();
        assert!(matches!(action, Action::Arithmetic(ref v, ArithOp::Add, _, _) if v == "balance"));
    }

    #[test]
    fn parses_call_with_store() {
        let action = parse_action_str("call calculate_apr with [principal, rate] and store in apr").unwrap();
        match action {
            Action::FunctionCall(name, args, store, _) => {
                assert_eq!(name, "calculate_apr");
                assert_eq!(args.len(), 2);
                assert_eq!(store.as_deref(), Some("apr"));
            }
            other => panic!("expected FunctionCall, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_then_else() {
        let action = parse_action_str("if creditScore >= 650 then set approved to true else set approved to false").unwrap();
        match action {
            Action::Conditional(_, then_branch, else_branch, _) => {
                assert_eq!(then_branch.len(), 1);
                assert_eq!(else_branch.len(), 1);
            }
            other => panic!("expected Conditional, got {other:?}"),
        }
    }

    #[test]
    fn parses_foreach_with_semicolon_block() {
        let action = parse_action_str("forEach item in items: add item to total; set seen to true").unwrap();
        match action {
            Action::ForEach { body, .. } => assert_eq!(body.len(), 2),
            other => panic!("expected ForEach, got {other:?}"),
        }
    }

    #[test]
    fn parses_do_while() {
        let action = parse_action_str("do: add 1 to counter while counter < 10").unwrap();
        assert!(matches!(action, Action::DoWhile(_, _, _)));
    }

    #[test]
    fn parses_circuit_breaker() {
        let action = parse_action_str("circuit_breaker \"limit exceeded\"").unwrap();
        assert!(matches!(action, Action::CircuitBreaker(_, _)));
    }

    #[test]
    fn parses_compound_assignment() {
        let action = parse_action_str("total += 5").unwrap();
        assert!(matches!(action, Action::Assignment(AssignOp::AddAssign, ref v, _, _) if v == "total"));
    }
}
