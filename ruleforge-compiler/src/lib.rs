//! RuleForge Compiler
//!
//! The front end: lexer (C1), parsers (C2 — expression, condition, action,
//! and YAML-to-structural document), and the semantic validator (C3).
//! Pure, synchronous, and side-effect free: no I/O, no async.

pub mod diagnostics;
pub mod digest;
pub mod lexer;
pub mod parser;
pub mod tokens;
pub mod validator;

pub use diagnostics::ValidationReport;
pub use parser::document::ParsedDocument;
pub use parser::ParseError;
pub use ruleforge_core::ast::RuleDocument;

/// Parses rule text into a structural document, failing on the first
/// lexer/parser error. Use [`validator::validate`] instead when a report
/// (rather than a hard error) is wanted even for malformed input.
pub fn parse(source: &str) -> Result<ParsedDocument, ParseError> {
    parser::document::parse_document(source)
}

/// Parses and validates rule text in one call, returning both the parsed
/// document (if parsing succeeded) and the validation report.
pub fn compile(source: &str) -> (Option<ParsedDocument>, ValidationReport) {
    let report = validator::validate(source);
    let parsed = parser::document::parse_document(source).ok();
    (parsed, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
name: simple_approval
description: Approves applicants above a credit threshold
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
    fn compile_parses_and_validates_together() {
        let (parsed, report) = compile(DOC);
        assert!(parsed.is_some());
        assert_eq!(report.summary.errors, 0);
    }
}
