//! Classification of bare identifiers into the three disjoint variable
//! namespaces (§3 "Variable namespaces and naming discipline").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Namespace {
    /// `^[a-z][a-zA-Z0-9]*$`, supplied by the caller.
    Input,
    /// `^[A-Z][A-Z0-9_]*$`, loaded from the constant store.
    Constant,
    /// `^[a-z][a-z0-9_]*$` containing `_` or the substring `lower`, produced
    /// by actions.
    Computed,
    /// Matches none of the three shapes.
    Unclassified,
}

/// Classify a bare identifier by its lexical shape alone.
///
/// Input and Computed shapes overlap (both are lowercase-leading); the
/// discriminator is the presence of an underscore or the literal substring
/// `lower`, per spec.md §3's Computed regex
/// `^[a-z][a-z0-9_]*$ containing "_" or "lower"`. An identifier is classified
/// Computed only if it additionally satisfies that extra condition; a plain
/// lowerCamelCase identifier with no underscore is Input.
pub fn classify(name: &str) -> Namespace {
    if name.is_empty() {
        return Namespace::Unclassified;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();

    if first.is_ascii_uppercase() {
        if name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Namespace::Constant;
        }
        return Namespace::Unclassified;
    }

    if first.is_ascii_lowercase() {
        let all_lower_alnum_underscore = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        let is_camel = name.chars().all(|c| c.is_ascii_alphanumeric());

        if all_lower_alnum_underscore && (name.contains('_') || name.contains("lower")) {
            return Namespace::Computed;
        }
        if is_camel {
            return Namespace::Input;
        }
        return Namespace::Unclassified;
    }

    Namespace::Unclassified
}

pub fn is_input(name: &str) -> bool {
    classify(name) == Namespace::Input
}

pub fn is_constant(name: &str) -> bool {
    classify(name) == Namespace::Constant
}

pub fn is_computed(name: &str) -> bool {
    classify(name) == Namespace::Computed
}
