//! Condition parser (§4.3 "Condition parser").
//!
//! Accepts a lexical form starting with a prefix `not`, a bare expression,
//! or (handed down from the document parser) the structured `conditions:`
//! map form (`and:`, `or:`, `not:`, `compare: {left, operator, right}`).

use super::expr::{parse_expr_str, parse_expression};
use super::{ParseError, Parser};
use ruleforge_core::{CompareOp, Condition, Expr, LogicalOp};

pub fn parse_condition_str(source: &str) -> Result<Condition, ParseError> {
    let expr = parse_expr_str(source)?;
    Ok(expr_to_condition(expr))
}

/// Parses a condition from a shared token cursor (used by the action
/// parser for `if`/`while`/`do...while` guards, where the condition is
/// followed by more tokens rather than terminating the input).
pub(crate) fn parse_condition(p: &mut Parser) -> Result<Condition, ParseError> {
    let expr = parse_expression(p)?;
    Ok(expr_to_condition(expr))
}

/// Lowers an already-parsed expression into the Condition node family,
/// promoting a top-level comparison/logical/not shape instead of leaving
/// it boxed inside a generic `ExpressionCondition`.
pub fn expr_to_condition(expr: Expr) -> Condition {
    match expr {
        Expr::Binary(op, lhs, rhs, span) => Condition::Comparison(op, *lhs, *rhs, span),
        Expr::Logical(op, terms, span) => {
            let conditions = terms.into_iter().map(expr_to_condition).collect();
            Condition::Logical(op, conditions, span)
        }
        Expr::Unary(ruleforge_core::UnaryOp::Not, inner, span) => {
            Condition::Not(Box::new(expr_to_condition(*inner)), span)
        }
        other => {
            let span = other.span();
            Condition::ExpressionCondition(other, span)
        }
    }
}

/// Builds a `compare: { left, operator, right }` structured condition from
/// its three scalar strings, used by the document parser.
pub fn structured_compare(left: &str, operator: &str, right: &str) -> Result<Condition, ParseError> {
    let lhs = parse_expr_str(left)?;
    let rhs = parse_expr_str(right)?;
    let op = named_operator(operator).ok_or_else(|| {
        ParseError::Document(format!("unknown comparison operator '{operator}' in `compare:` block"))
    })?;
    let span = lhs.span().merge(rhs.span());
    Ok(Condition::Comparison(op, lhs, rhs, span))
}

fn named_operator(name: &str) -> Option<CompareOp> {
    let op = match name {
        "==" | "equals" => CompareOp::Eq,
        "!=" | "not_equals" => CompareOp::NotEq,
        "<" | "less_than" => CompareOp::Lt,
        ">" | "greater_than" => CompareOp::Gt,
        "<=" | "at_most" | "less_than_or_equal" => CompareOp::LtEq,
        ">=" | "at_least" | "greater_than_or_equal" => CompareOp::GtEq,
        "between" => CompareOp::Between,
        "not_between" => CompareOp::NotBetween,
        "contains" => CompareOp::Contains,
        "not_contains" => CompareOp::NotContains,
        "starts_with" => CompareOp::StartsWith,
        "ends_with" => CompareOp::EndsWith,
        "matches" => CompareOp::Matches,
        "not_matches" => CompareOp::NotMatches,
        "in_list" | "in" => CompareOp::InList,
        "not_in_list" | "not_in" => CompareOp::NotInList,
        "length_equals" => CompareOp::LengthEquals,
        "length_greater_than" => CompareOp::LengthGreaterThan,
        "length_less_than" => CompareOp::LengthLessThan,
        "age_at_least" => CompareOp::AgeAtLeast,
        "age_less_than" => CompareOp::AgeLessThan,
        _ => return None,
    };
    Some(op)
}

pub fn logical(op: LogicalOp, conditions: Vec<Condition>) -> Condition {
    let span = conditions
        .first()
        .map(|c| c.span())
        .unwrap_or_else(ruleforge_core::Span::dummy)
        .merge(conditions.last().map(|c| c.span()).unwrap_or_else(ruleforge_core::Span::dummy));
    Condition::Logical(op, conditions, span)
}

pub fn not(inner: Condition) -> Condition {
    let span = inner.span();
    Condition::Not(Box::new(inner), span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_comparison_lowers_to_comparison_node() {
        let cond = parse_condition_str("creditScore >= 650").unwrap();
        assert!(matches!(cond, Condition::Comparison(CompareOp::GtEq, _, _, _)));
    }

    #[test]
    fn prefix_not_lowers_to_not_node() {
        let cond = parse_condition_str("not isVerified").unwrap();
        assert!(matches!(cond, Condition::Not(_, _)));
    }

    #[test]
    fn and_chain_lowers_to_logical_node() {
        let cond = parse_condition_str("a > 1 and b > 2").unwrap();
        match cond {
            Condition::Logical(LogicalOp::And, terms, _) => assert_eq!(terms.len(), 2),
            other => panic!("expected Logical(And), got {other:?}"),
        }
    }

    #[test]
    fn structured_compare_builds_comparison() {
        let cond = structured_compare("amount", "at_least", "100").unwrap();
        assert!(matches!(cond, Condition::Comparison(CompareOp::GtEq, _, _, _)));
    }

    #[test]
    fn structured_compare_accepts_in_and_not_in_aliases() {
        let cond = structured_compare("tier", "in", "[\"HIGH\", \"LOW\"]").unwrap();
        assert!(matches!(cond, Condition::Comparison(CompareOp::InList, _, _, _)));
        let cond = structured_compare("tier", "not_in", "[\"HIGH\", \"LOW\"]").unwrap();
        assert!(matches!(cond, Condition::Comparison(CompareOp::NotInList, _, _, _)));
    }

    /// Every alias in the shared registry must resolve here, or the registry
    /// and this parser's operator table have drifted apart.
    #[test]
    fn every_registry_alias_is_recognized() {
        for name in ruleforge_core::registry::NAMED_COMPARISON_OPERATORS {
            assert!(named_operator(name).is_some(), "registry alias `{name}` has no parser mapping");
        }
    }
}
