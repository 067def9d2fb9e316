//! Diagnostic types for the semantic validator (§6 "Validation result
//! format").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCategory {
    Syntax,
    Naming,
    Logic,
    BestPractices,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub snippet: Option<String>,
}

impl Location {
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: None,
            column: None,
            snippet: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub code: String,
    pub severity: Severity,
    pub category: IssueCategory,
    pub description: String,
    pub message: String,
    pub location: Location,
    pub suggestion: Option<String>,
}

impl Issue {
    pub fn new(
        code: &str,
        severity: Severity,
        category: IssueCategory,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        let description = ruleforge_core::error_codes::error_doc(code)
            .unwrap_or("no documentation registered for this code")
            .to_string();
        Self {
            code: code.to_string(),
            severity,
            category,
            description,
            message: message.into(),
            location,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_issues: usize,
    pub critical: usize,
    pub errors: usize,
    pub warnings: usize,
    pub suggestions: usize,
    pub quality_score: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorizedIssues {
    pub syntax: Vec<Issue>,
    pub naming: Vec<Issue>,
    pub logic: Vec<Issue>,
    pub best_practices: Vec<Issue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetadata {
    pub validated_at: DateTime<Utc>,
    pub validation_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: String,
    pub summary: ValidationSummary,
    pub issues: CategorizedIssues,
    pub metadata: ValidationMetadata,
}

/// Builds the final report from a flat issue list, bucketing by category
/// and computing the quality score (§4.4 "100 minus 25×critical − 15×error
/// − 5×warning − 1×info, floored at 0").
pub fn build_report(
    issues: Vec<Issue>,
    validated_at: DateTime<Utc>,
    validation_time_ms: f64,
) -> ValidationReport {
    let critical = issues.iter().filter(|i| i.severity == Severity::Critical).count();
    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    let warnings = issues.iter().filter(|i| i.severity == Severity::Warning).count();
    let info = issues.iter().filter(|i| i.severity == Severity::Info).count();

    let raw_score = 100 - 25 * critical as i64 - 15 * errors as i64 - 5 * warnings as i64 - info as i64;
    let quality_score = raw_score.max(0);

    let status = if critical > 0 || errors > 0 { "invalid" } else { "valid" }.to_string();

    let mut categorized = CategorizedIssues::default();
    for issue in issues {
        match issue.category {
            IssueCategory::Syntax => categorized.syntax.push(issue),
            IssueCategory::Naming => categorized.naming.push(issue),
            IssueCategory::Logic => categorized.logic.push(issue),
            IssueCategory::BestPractices => categorized.best_practices.push(issue),
        }
    }

    ValidationReport {
        status,
        summary: ValidationSummary {
            total_issues: categorized.syntax.len()
                + categorized.naming.len()
                + categorized.logic.len()
                + categorized.best_practices.len(),
            critical,
            errors,
            warnings,
            suggestions: info,
            quality_score,
        },
        issues: categorized,
        metadata: ValidationMetadata {
            validated_at,
            validation_time_ms,
        },
    }
}
