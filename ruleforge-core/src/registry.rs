//! Fixed operator and function registries (§6 "Operators" / "Built-in
//! functions"). Shared between the compiler's validator and the engine's
//! function dispatch table so the two never drift apart.

/// Named comparison operator aliases recognized in addition to the
/// symbolic forms (`==`, `<=`, …).
pub const NAMED_COMPARISON_OPERATORS: &[&str] = &[
    "equals",
    "not_equals",
    "greater_than",
    "less_than",
    "at_least",
    "at_most",
    "greater_than_or_equal",
    "less_than_or_equal",
    "between",
    "not_between",
    "contains",
    "not_contains",
    "starts_with",
    "ends_with",
    "matches",
    "not_matches",
    "in_list",
    "in",
    "not_in_list",
    "not_in",
    "length_equals",
    "length_greater_than",
    "length_less_than",
    "age_at_least",
    "age_less_than",
];

pub const VALIDATION_OPERATORS: &[&str] = &[
    "is_null",
    "is_not_null",
    "is_empty",
    "is_not_empty",
    "is_numeric",
    "is_not_numeric",
    "is_number",
    "is_string",
    "is_boolean",
    "is_list",
    "is_email",
    "is_phone",
    "is_date",
    "is_positive",
    "is_negative",
    "is_zero",
    "is_non_zero",
    "is_percentage",
    "is_currency",
    "is_credit_score",
    "is_ssn",
    "is_account_number",
    "is_routing_number",
    "is_business_day",
    "is_weekend",
];

/// Minimum (and, where fixed, exact) arity for each built-in function name,
/// including common aliases. `None` for a name not in the registry at all.
/// A `Some(n)` means "at least `n` arguments"; functions with a single
/// admissible arity simply have `min == max` enforced by the caller.
pub fn function_min_arity(name: &str) -> Option<usize> {
    let arity = match name {
        // Math
        "max" | "min" => 1,
        "abs" | "round" | "ceil" | "floor" | "sqrt" => 1,
        "pow" => 2,
        "sum" | "avg" | "average" => 1,
        // String
        "length" | "len" | "upper" | "uppercase" | "lower" | "lowercase" | "trim" => 1,
        "substring" | "substr" => 2,
        "contains" | "startswith" | "endswith" => 2,
        "replace" => 3,
        // Date/time
        "now" | "today" => 0,
        "dateadd" => 3,
        "datediff" => 2,
        "time_hour" => 1,
        "format_date" => 2,
        "calculate_age" => 1,
        // List
        "size" | "count" | "first" | "last" => 1,
        // Type conversion
        "tonumber" | "number" | "tostring" | "string" | "toboolean" | "boolean" => 1,
        // Validation
        "is_valid_credit_score" | "is_valid_ssn" | "is_valid_account" | "is_valid_routing" => 1,
        "is_business_day" | "validate_email" | "validate_phone" => 1,
        "age_meets_requirement" => 2,
        "is_valid" => 1,
        "in_range" => 3,
        // Financial domain
        "calculate_loan_payment" => 3,
        "calculate_compound_interest" => 4,
        "calculate_amortization" => 3,
        "calculate_apr" => 3,
        "calculate_credit_score" => 1,
        "calculate_risk_score" => 1,
        "calculate_debt_ratio" | "debt_to_income_ratio" => 2,
        "calculate_ltv" | "loan_to_value" => 2,
        "calculate_payment_schedule" => 3,
        "credit_utilization" => 2,
        "payment_history_score" => 1,
        // Formatting & IDs
        "format_currency" | "format_percentage" => 1,
        "generate_account_number" | "generate_transaction_id" => 0,
        "distance_between" => 2,
        // Audit/logging
        "audit" | "audit_log" | "log" => 1,
        "send_notification" => 2,
        // Security
        "encrypt" | "decrypt" => 1,
        "mask_data" => 1,
        // HTTP
        "rest_get" => 1,
        "rest_post" | "rest_put" | "rest_patch" => 2,
        "rest_delete" => 1,
        "rest_call" => 2,
        // JSON
        "json_get" | "json_path" | "json_exists" | "json_size" | "json_type" => 2,
        _ => return None,
    };
    Some(arity)
}

pub fn is_known_function(name: &str) -> bool {
    function_min_arity(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_function_has_arity() {
        assert_eq!(function_min_arity("calculate_loan_payment"), Some(3));
    }

    #[test]
    fn unknown_function_has_no_arity() {
        assert_eq!(function_min_arity("not_a_real_function"), None);
        assert!(!is_known_function("not_a_real_function"));
    }
}
