//! Stable error codes.
//!
//! Code ranges (§7 "Error taxonomy"):
//!   E1xxx  Lexer errors
//!   E2xxx  Parser errors
//!   E3xxx  Validation issues
//!   E4xxx  Evaluation errors
//!   E5xxx  External collaborator failures
//!   E6xxx  Deadline / cancellation outcomes

/// Return a short documentation string for a given error code, or `None`
/// for an unregistered code.
pub fn error_doc(code: &str) -> Option<&'static str> {
    let doc = match code {
        "E1001" => "An unexpected character was found in the rule text outside any string literal.",
        "E1002" => "A string literal was opened but never closed before end of input.",
        "E1003" => "A numeric literal could not be parsed.",

        "E2001" => "The parser encountered a token it did not expect at this position.",
        "E2002" => "The input ended unexpectedly while a construct was still open.",
        "E2003" => "A bracket or parenthesis was opened but never closed.",
        "E2004" => "An action keyword was not recognized.",
        "E2005" => "A YAML document could not be parsed as a rule document.",

        "E3001" => "A required top-level key is missing (name, description, inputs, output, or a logic block).",
        "E3002" => "A variable reference does not classify into any of the three namespaces.",
        "E3003" => "An Input reference is not declared in the rule's `inputs` list.",
        "E3004" => "A Computed reference is read before any action in evaluation order produces it.",
        "E3005" => "An operator or function name is not in the fixed registry.",
        "E3006" => "A function call does not meet the function's minimum arity.",
        "E3007" => "An identifier's casing does not match its namespace's naming convention.",
        "E3008" => "An assignment/calculate/arithmetic/list action target is not a Computed identifier (shadowing risk).",
        "E3009" => "A metadata field has an unexpected type.",
        "E3010" => "More than one top-level logic shape (when/then, conditions, rules) is present; this is ambiguous and refused.",
        "E3011" => "A `calculate` action's expression is a function or REST call rather than an arithmetic expression; prefer `run`.",
        "E3012" => "An unrecognized key was present in the rule document and was ignored.",

        "E4001" => "Division by zero.",
        "E4002" => "An arithmetic or comparison operator was applied to operands of an unsupported or mismatched type.",
        "E4003" => "A called function is not in the built-in registry.",
        "E4004" => "A loop exceeded its maximum iteration cap.",
        "E4005" => "An action wrote to a target that is not a Computed identifier.",
        "E4006" => "A `calculate` action's expression did not evaluate to a number.",
        "E4007" => "An arithmetic action target was null for a non-additive operator.",
        "E4008" => "Ordering comparison attempted across incompatible value types.",

        "E5001" => "A persistence collaborator call failed.",
        "E5002" => "An HTTP collaborator call failed (surfaced as a value, not an exception, per §7).",

        "E6001" => "The evaluation deadline was exceeded.",
        "E6002" => "The evaluation was cancelled.",

        _ => return None,
    };
    Some(doc)
}

pub fn all_error_codes() -> Vec<&'static str> {
    vec![
        "E1001", "E1002", "E1003", "E2001", "E2002", "E2003", "E2004", "E2005", "E3001", "E3002",
        "E3003", "E3004", "E3005", "E3006", "E3007", "E3008", "E3009", "E3010", "E3011", "E3012",
        "E4001", "E4002", "E4003", "E4004", "E4005", "E4006", "E4007", "E4008", "E5001", "E5002",
        "E6001", "E6002",
    ]
}
