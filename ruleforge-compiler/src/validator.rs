//! C3 Semantic Validator (§4.4).
//!
//! A single logical pass over the parsed document (plus the document
//! parser's own bookkeeping) that collects [`Issue`]s and computes the
//! quality score. Validation never panics on a malformed rule: syntax
//! failures are reported as a single `CRITICAL` issue rather than
//! propagated as a hard error, so callers always get a report back.

use crate::diagnostics::{build_report, Issue, IssueCategory, Location, Severity, ValidationReport};
use crate::parser::document::{parse_document, ParsedDocument};
use ruleforge_core::{registry, Action, Condition, Expr, Namespace, OutputType, RuleLogic, Value};
use std::collections::HashSet;
use std::time::Instant;

pub fn validate(source: &str) -> ValidationReport {
    let started = Instant::now();
    let mut issues = Vec::new();

    match parse_document(source) {
        Ok(parsed) => {
            validate_parsed(&parsed, &mut issues);
        }
        Err(err) => {
            issues.push(Issue::new(
                err.code(),
                Severity::Critical,
                IssueCategory::Syntax,
                err.to_string(),
                Location::at_path("$"),
            ));
        }
    }

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    build_report(issues, chrono::Utc::now(), elapsed_ms)
}

fn validate_parsed(parsed: &ParsedDocument, issues: &mut Vec<Issue>) {
    let doc = &parsed.document;

    // Required top-level keys (E3001).
    if doc.metadata.name.trim().is_empty() {
        issues.push(missing_key_issue("name"));
    }
    if doc.metadata.description.trim().is_empty() {
        issues.push(missing_key_issue("description"));
    }
    if doc.output_schema.is_empty() {
        issues.push(missing_key_issue("output"));
    }
    if parsed.logic_shapes.is_empty() {
        issues.push(missing_key_issue("when/then, conditions, or rules"));
    }

    // Mixed top-level logic shapes (E3010) — resolved as a hard ERROR.
    if parsed.logic_shapes.len() > 1 {
        issues.push(Issue::new(
            "E3010",
            Severity::Error,
            IssueCategory::Logic,
            format!(
                "more than one top-level logic shape is present: {}",
                parsed.logic_shapes.join(", ")
            ),
            Location::at_path("$"),
        ));
    }

    // Unknown keys (E3012).
    for key in &parsed.unknown_keys {
        issues.push(Issue::new(
            "E3012",
            Severity::Warning,
            IssueCategory::BestPractices,
            format!("unrecognized key '{key}' was ignored"),
            Location::at_path(format!("$.{key}")),
        ));
    }

    // Naming convention for declared inputs/constants (E3007, WARNING).
    for input in &doc.inputs {
        if ruleforge_core::namespace::classify(input) != Namespace::Input {
            issues.push(Issue::new(
                "E3007",
                Severity::Warning,
                IssueCategory::Naming,
                format!("input '{input}' is not lowerCamelCase"),
                Location::at_path(format!("$.inputs.{input}")),
            ));
        }
    }
    for constant in &doc.constants {
        if ruleforge_core::namespace::classify(&constant.name) != Namespace::Constant {
            issues.push(Issue::new(
                "E3007",
                Severity::Warning,
                IssueCategory::Naming,
                format!("constant '{}' is not UPPER_SNAKE_CASE", constant.name),
                Location::at_path(format!("$.constants.{}", constant.name)),
            ));
        }
    }

    // Metadata field types (E3009, INFO).
    validate_metadata_fields(doc, issues);

    // Collect Computed targets (conservative over-approximation) and walk
    // every variable reference, expression, and function call.
    let computed_targets = collect_computed_targets_logic(&doc.logic);
    walk_logic(&doc.logic, &doc.inputs, &computed_targets, issues);
}

fn missing_key_issue(which: &str) -> Issue {
    Issue::new(
        "E3001",
        Severity::Error,
        IssueCategory::Syntax,
        format!("required top-level key '{which}' is missing or empty"),
        Location::at_path("$"),
    )
}

fn validate_metadata_fields(doc: &ruleforge_core::RuleDocument, issues: &mut Vec<Issue>) {
    if let Some(tags) = doc.metadata.fields.get("tags") {
        let ok = matches!(tags, Value::List(items) if items.iter().all(|v| matches!(v, Value::String(_))));
        if !ok {
            issues.push(Issue::new(
                "E3009",
                Severity::Info,
                IssueCategory::BestPractices,
                "metadata.tags should be a list of strings",
                Location::at_path("$.metadata.tags"),
            ));
        }
    }
    if let Some(priority) = doc.metadata.fields.get("priority") {
        if !matches!(priority, Value::Number(_)) {
            issues.push(Issue::new(
                "E3009",
                Severity::Info,
                IssueCategory::BestPractices,
                "metadata.priority should be a number",
                Location::at_path("$.metadata.priority"),
            ));
        }
    }
    if let Some(risk) = doc.metadata.fields.get("risk_level") {
        let ok = matches!(
            risk,
            Value::String(s) if matches!(s.as_str(), "LOW" | "MEDIUM" | "HIGH" | "CRITICAL")
        );
        if !ok {
            issues.push(Issue::new(
                "E3009",
                Severity::Info,
                IssueCategory::BestPractices,
                "metadata.risk_level should be one of LOW, MEDIUM, HIGH, CRITICAL",
                Location::at_path("$.metadata.risk_level"),
            ));
        }
    }
}

// ── Computed-target collection (conservative over-approximation) ───────

fn collect_computed_targets_logic(logic: &RuleLogic) -> HashSet<String> {
    let mut set = HashSet::new();
    match logic {
        RuleLogic::Simple(s) => {
            collect_computed_targets_actions(&s.then, &mut set);
            collect_computed_targets_actions(&s.otherwise, &mut set);
        }
        RuleLogic::Structured(s) => {
            collect_computed_targets_actions(&s.then, &mut set);
            collect_computed_targets_actions(&s.otherwise, &mut set);
        }
        RuleLogic::Sequence(subs) => {
            for sub in subs {
                set.extend(collect_computed_targets_logic(&sub.logic));
            }
        }
    }
    set
}

fn collect_computed_targets_actions(actions: &[Action], set: &mut HashSet<String>) {
    for action in actions {
        match action {
            Action::Set(name, _, _)
            | Action::Assignment(_, name, _, _)
            | Action::Calculate(name, _, _)
            | Action::Run(name, _, _)
            | Action::Arithmetic(name, _, _, _)
            | Action::List(_, name, _, _) => {
                set.insert(name.clone());
            }
            Action::FunctionCall(_, _, store, _) => {
                if let Some(name) = store {
                    set.insert(name.clone());
                }
            }
            Action::Conditional(_, then_b, else_b, _) => {
                collect_computed_targets_actions(then_b, set);
                collect_computed_targets_actions(else_b, set);
            }
            Action::ForEach { body, .. } => collect_computed_targets_actions(body, set),
            Action::While(_, body, _) | Action::DoWhile(body, _, _) => {
                collect_computed_targets_actions(body, set)
            }
            Action::CircuitBreaker(_, _) => {}
        }
    }
}

// ── Variable-reference walk ─────────────────────────────────────────────

fn walk_logic(
    logic: &RuleLogic,
    inputs: &[String],
    computed: &HashSet<String>,
    issues: &mut Vec<Issue>,
) {
    match logic {
        RuleLogic::Simple(s) => {
            for cond in &s.when {
                walk_condition(cond, inputs, computed, issues);
            }
            walk_actions(&s.then, inputs, computed, issues);
            walk_actions(&s.otherwise, inputs, computed, issues);
        }
        RuleLogic::Structured(s) => {
            walk_condition(&s.condition, inputs, computed, issues);
            walk_actions(&s.then, inputs, computed, issues);
            walk_actions(&s.otherwise, inputs, computed, issues);
        }
        RuleLogic::Sequence(subs) => {
            for sub in subs {
                if let Some(guard) = &sub.guard {
                    walk_condition(guard, inputs, computed, issues);
                }
                walk_logic(&sub.logic, inputs, computed, issues);
            }
        }
    }
}

fn walk_actions(actions: &[Action], inputs: &[String], computed: &HashSet<String>, issues: &mut Vec<Issue>) {
    for action in actions {
        match action {
            Action::Set(name, expr, span) | Action::Calculate(name, expr, span) => {
                check_write_target(name, *span, issues);
                walk_expr(expr, inputs, computed, issues);
            }
            Action::Run(name, expr, span) => {
                check_write_target(name, *span, issues);
                if !matches!(expr, Expr::FunctionCall(..) | Expr::JsonPath(..) | Expr::RestCall { .. }) {
                    issues.push(Issue::new(
                        "E3011",
                        Severity::Warning,
                        IssueCategory::BestPractices,
                        "`run` expression is not a function call, REST call, or JSON path; consider `calculate`",
                        Location::at_path(format!("$.run.{name}")),
                    ));
                }
                walk_expr(expr, inputs, computed, issues);
            }
            Action::Assignment(_, name, expr, span) | Action::Arithmetic(name, _, expr, span) => {
                check_write_target(name, *span, issues);
                walk_expr(expr, inputs, computed, issues);
            }
            Action::List(_, name, expr, span) => {
                check_write_target(name, *span, issues);
                walk_expr(expr, inputs, computed, issues);
            }
            Action::FunctionCall(fname, args, store, span) => {
                check_function(fname, args.len(), *span, issues);
                for arg in args {
                    walk_expr(arg, inputs, computed, issues);
                }
                if let Some(name) = store {
                    check_write_target(name, *span, issues);
                }
            }
            Action::Conditional(cond, then_b, else_b, _) => {
                walk_condition(cond, inputs, computed, issues);
                walk_actions(then_b, inputs, computed, issues);
                walk_actions(else_b, inputs, computed, issues);
            }
            Action::ForEach { list, body, .. } => {
                walk_expr(list, inputs, computed, issues);
                walk_actions(body, inputs, computed, issues);
            }
            Action::While(cond, body, _) => {
                walk_condition(cond, inputs, computed, issues);
                walk_actions(body, inputs, computed, issues);
            }
            Action::DoWhile(body, cond, _) => {
                walk_actions(body, inputs, computed, issues);
                walk_condition(cond, inputs, computed, issues);
            }
            Action::CircuitBreaker(expr, _) => walk_expr(expr, inputs, computed, issues),
        }
    }
}

fn check_write_target(name: &str, span: ruleforge_core::Span, issues: &mut Vec<Issue>) {
    match ruleforge_core::namespace::classify(name) {
        Namespace::Computed => {}
        Namespace::Constant => issues.push(Issue::new(
            "E3008",
            Severity::Error,
            IssueCategory::Naming,
            format!("action target '{name}' looks like a Constant; this would shadow it"),
            location_at_span(span),
        )),
        _ => issues.push(Issue::new(
            "E4005",
            Severity::Error,
            IssueCategory::Logic,
            format!("action target '{name}' does not have Computed shape"),
            location_at_span(span),
        )),
    }
}

fn check_function(name: &str, arg_count: usize, span: ruleforge_core::Span, issues: &mut Vec<Issue>) {
    match registry::function_min_arity(name) {
        None => issues.push(Issue::new(
            "E3005",
            Severity::Error,
            IssueCategory::Logic,
            format!("'{name}' is not a registered function"),
            location_at_span(span),
        )),
        Some(min) if arg_count < min => issues.push(Issue::new(
            "E3006",
            Severity::Error,
            IssueCategory::Logic,
            format!("'{name}' requires at least {min} argument(s), got {arg_count}"),
            location_at_span(span),
        )),
        _ => {}
    }
}

fn walk_condition(cond: &Condition, inputs: &[String], computed: &HashSet<String>, issues: &mut Vec<Issue>) {
    match cond {
        Condition::Comparison(_, lhs, rhs, _) => {
            walk_expr(lhs, inputs, computed, issues);
            walk_expr(rhs, inputs, computed, issues);
        }
        Condition::Logical(_, conds, _) => {
            for c in conds {
                walk_condition(c, inputs, computed, issues);
            }
        }
        Condition::Not(inner, _) => walk_condition(inner, inputs, computed, issues),
        Condition::ExpressionCondition(expr, _) => walk_expr(expr, inputs, computed, issues),
    }
}

fn walk_expr(expr: &Expr, inputs: &[String], computed: &HashSet<String>, issues: &mut Vec<Issue>) {
    match expr {
        Expr::Literal(_, _) => {}
        Expr::Variable(name, span) => check_read(name, inputs, computed, *span, issues),
        Expr::Exists(name, span) => check_read(name, inputs, computed, *span, issues),
        Expr::Binary(_, lhs, rhs, _) => {
            walk_expr(lhs, inputs, computed, issues);
            walk_expr(rhs, inputs, computed, issues);
        }
        Expr::BinaryArith(_, lhs, rhs, _) => {
            walk_expr(lhs, inputs, computed, issues);
            walk_expr(rhs, inputs, computed, issues);
        }
        Expr::Logical(_, terms, _) => {
            for t in terms {
                walk_expr(t, inputs, computed, issues);
            }
        }
        Expr::Unary(_, inner, _) => walk_expr(inner, inputs, computed, issues),
        Expr::Validation(_, inner, _) => walk_expr(inner, inputs, computed, issues),
        Expr::Arithmetic(terms, _, _) => {
            for t in terms {
                walk_expr(t, inputs, computed, issues);
            }
        }
        Expr::FunctionCall(name, args, span) => {
            check_function(name, args.len(), *span, issues);
            for a in args {
                walk_expr(a, inputs, computed, issues);
            }
        }
        Expr::JsonPath(base, _, _) => walk_expr(base, inputs, computed, issues),
        Expr::RestCall { url, body, headers, timeout, .. } => {
            walk_expr(url, inputs, computed, issues);
            if let Some(b) = body {
                walk_expr(b, inputs, computed, issues);
            }
            if let Some(h) = headers {
                walk_expr(h, inputs, computed, issues);
            }
            if let Some(t) = timeout {
                walk_expr(t, inputs, computed, issues);
            }
        }
        Expr::List(items, _) => {
            for i in items {
                walk_expr(i, inputs, computed, issues);
            }
        }
        Expr::Index(base, index, _) => {
            walk_expr(base, inputs, computed, issues);
            walk_expr(index, inputs, computed, issues);
        }
    }
}

fn check_read(
    name: &str,
    inputs: &[String],
    computed: &HashSet<String>,
    span: ruleforge_core::Span,
    issues: &mut Vec<Issue>,
) {
    match ruleforge_core::namespace::classify(name) {
        Namespace::Input => {
            if !inputs.iter().any(|i| i == name) {
                issues.push(Issue::new(
                    "E3003",
                    Severity::Error,
                    IssueCategory::Logic,
                    format!("input '{name}' is referenced but not declared in `inputs`"),
                    location_at_span(span),
                ));
            }
        }
        Namespace::Computed => {
            if !computed.contains(name) {
                issues.push(Issue::new(
                    "E3004",
                    Severity::Error,
                    IssueCategory::Logic,
                    format!("computed variable '{name}' is read before any action produces it"),
                    location_at_span(span),
                ));
            }
        }
        Namespace::Constant => {}
        Namespace::Unclassified => issues.push(Issue::new(
            "E3002",
            Severity::Error,
            IssueCategory::Naming,
            format!("'{name}' does not classify as Input, Constant, or Computed"),
            location_at_span(span),
        )),
    }
}

fn location_at_span(span: ruleforge_core::Span) -> Location {
    Location {
        path: "$".to_string(),
        line: Some(span.line),
        column: Some(span.column),
        snippet: None,
    }
}

/// Output-coercion helper used by the engine when assembling `EvalResult`
/// (§4.7): declared output types constrain which computed names surface.
pub fn declared_output_names(schema: &std::collections::BTreeMap<String, OutputType>) -> Vec<String> {
    schema.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_DOC: &str = r#"
name: approval_check
description: Approves based on credit score
inputs: [creditScore, annualIncome]
when:
  - creditScore >= 650
  - annualIncome >= 40000
then:
  - set is_approved to true
else:
  - set is_approved to false
output:
  is_approved: boolean
"#;

    #[test]
    fn valid_document_has_no_errors() {
        let report = validate(VALID_DOC);
        assert_eq!(report.summary.errors, 0);
        assert_eq!(report.summary.critical, 0);
        assert_eq!(report.status, "valid");
    }

    #[test]
    fn undeclared_input_is_an_error() {
        let doc = r#"
name: x
description: y
inputs: []
when:
  - creditScore >= 650
then:
  - set approved to true
output:
  approved: boolean
"#;
        let report = validate(doc);
        assert!(report.issues.logic.iter().any(|i| i.code == "E3003"));
    }

    #[test]
    fn computed_read_before_write_is_an_error() {
        let doc = r#"
name: x
description: y
inputs: [a]
when:
  - risk_score > 1
then:
  - set ok to true
output:
  ok: boolean
"#;
        let report = validate(doc);
        assert!(report.issues.logic.iter().any(|i| i.code == "E3004"));
    }

    #[test]
    fn mixed_logic_shapes_is_an_error() {
        let doc = r#"
name: x
description: y
inputs: []
when: []
then: []
conditions:
  compare: { left: a, operator: equals, right: b }
output:
  ok: boolean
"#;
        let report = validate(doc);
        assert!(report.issues.logic.iter().any(|i| i.code == "E3010"));
    }

    #[test]
    fn unknown_function_is_an_error() {
        let doc = r#"
name: x
description: y
inputs: [a]
when:
  - a > 0
then:
  - calculate result as totally_made_up_function(a)
output:
  result: number
"#;
        let report = validate(doc);
        assert!(report.issues.logic.iter().any(|i| i.code == "E3005"));
    }

    #[test]
    fn syntax_error_yields_critical_issue() {
        let report = validate("not: valid: yaml: [");
        assert!(report.summary.critical >= 1);
        assert_eq!(report.status, "invalid");
    }

    #[test]
    fn quality_score_floors_at_zero() {
        let doc = r#"
name: x
description: y
inputs: []
when:
  - a > 0
  - b > 0
  - c > 0
  - d > 0
  - e > 0
then: []
output: {}
"#;
        let report = validate(doc);
        assert!(report.summary.quality_score >= 0);
    }
}
