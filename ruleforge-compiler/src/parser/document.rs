//! YAML-to-structural document parser (§4.3 "YAML-to-structural parser").
//!
//! Parses the YAML document to a generic mapping/list/scalar tree via
//! `serde_yaml`, then converts it into [`RuleDocument`] by matching
//! well-known keys. Unknown keys at any level are collected, not fatal.

use super::action::parse_action_str;
use super::condition::{logical, not, parse_condition_str, structured_compare};
use super::ParseError;
use ruleforge_core::{
    CircuitConfig, Condition, ConstantDefault, LogicalOp, OutputType, RuleDocument, RuleLogic,
    RuleMetadata, SimpleLogic, StructuredLogic, SubRule, Value,
};
use rust_decimal::Decimal;
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::BTreeMap;
use std::str::FromStr;

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "name",
    "description",
    "inputs",
    "constants",
    "when",
    "then",
    "else",
    "conditions",
    "rules",
    "output",
    "circuit_breaker",
    "metadata",
];

pub struct ParsedDocument {
    pub document: RuleDocument,
    /// Unrecognized keys encountered while walking the document, each
    /// mapped to error code `E3012` by the validator.
    pub unknown_keys: Vec<String>,
    /// Which top-level logic shapes were present (`"when_then"`,
    /// `"conditions"`, `"rules"`); more than one is ambiguous (`E3010`).
    pub logic_shapes: Vec<&'static str>,
}

pub fn parse_document(source: &str) -> Result<ParsedDocument, ParseError> {
    let root: Yaml =
        serde_yaml::from_str(source).map_err(|e| ParseError::Document(e.to_string()))?;
    let mapping = root
        .as_mapping()
        .ok_or_else(|| ParseError::Document("rule document root must be a YAML mapping".into()))?;

    let mut unknown_keys = Vec::new();
    for key in mapping.keys() {
        if let Some(k) = key.as_str() {
            if !KNOWN_TOP_LEVEL_KEYS.contains(&k) {
                unknown_keys.push(k.to_string());
            }
        }
    }

    let name = get_string(mapping, "name").unwrap_or_default();
    let description = get_string(mapping, "description").unwrap_or_default();
    let inputs = get(mapping, "inputs")
        .and_then(Yaml::as_sequence)
        .map(|seq| seq.iter().filter_map(Yaml::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let constants = parse_constants(get(mapping, "constants"));
    let output_schema = parse_output(get(mapping, "output"), &mut unknown_keys);
    let circuit = parse_circuit(get(mapping, "circuit_breaker"));
    let metadata_fields = parse_metadata(get(mapping, "metadata"));

    let has_when = mapping.contains_key(&Yaml::String("when".into()));
    let has_conditions = mapping.contains_key(&Yaml::String("conditions".into()));
    let has_rules = mapping.contains_key(&Yaml::String("rules".into()));

    let mut logic_shapes = Vec::new();
    if has_when {
        logic_shapes.push("when_then");
    }
    if has_conditions {
        logic_shapes.push("conditions");
    }
    if has_rules {
        logic_shapes.push("rules");
    }

    let logic = if has_rules {
        parse_rules_sequence(get(mapping, "rules"))?
    } else if has_conditions {
        parse_structured(mapping)?
    } else {
        parse_simple(mapping)?
    };

    let document = RuleDocument {
        metadata: RuleMetadata {
            name,
            description,
            fields: metadata_fields,
        },
        inputs,
        constants,
        logic,
        output_schema,
        circuit,
    };

    Ok(ParsedDocument {
        document,
        unknown_keys,
        logic_shapes,
    })
}

fn get<'a>(m: &'a Mapping, key: &str) -> Option<&'a Yaml> {
    m.get(&Yaml::String(key.to_string()))
}

fn get_string(m: &Mapping, key: &str) -> Option<String> {
    get(m, key).and_then(Yaml::as_str).map(str::to_string)
}

fn yaml_to_value(v: &Yaml) -> Value {
    match v {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Boolean(*b),
        Yaml::Number(n) => Decimal::from_str(&n.to_string())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(seq) => Value::List(seq.iter().map(yaml_to_value).collect()),
        Yaml::Mapping(map) => {
            let mut out = BTreeMap::new();
            for (k, v) in map {
                if let Some(key) = k.as_str() {
                    out.insert(key.to_string(), yaml_to_value(v));
                }
            }
            Value::Map(out)
        }
        Yaml::Tagged(tagged) => yaml_to_value(&tagged.value),
    }
}

fn parse_constants(v: Option<&Yaml>) -> Vec<ConstantDefault> {
    let Some(seq) = v.and_then(Yaml::as_sequence) else {
        return Vec::new();
    };
    seq.iter()
        .filter_map(|item| match item {
            Yaml::String(s) => Some(ConstantDefault {
                name: s.clone(),
                default: None,
            }),
            Yaml::Mapping(m) => {
                let name = get_string(m, "name")?;
                let default = get(m, "default").map(yaml_to_value);
                Some(ConstantDefault { name, default })
            }
            _ => None,
        })
        .collect()
}

fn parse_output(v: Option<&Yaml>, unknown: &mut Vec<String>) -> BTreeMap<String, OutputType> {
    let mut out = BTreeMap::new();
    let Some(mapping) = v.and_then(Yaml::as_mapping) else {
        return out;
    };
    for (k, v) in mapping {
        let (Some(key), Some(tag)) = (k.as_str(), v.as_str()) else {
            continue;
        };
        match OutputType::from_tag(tag) {
            Some(ty) => {
                out.insert(key.to_string(), ty);
            }
            None => unknown.push(format!("output.{key}: unrecognized type '{tag}'")),
        }
    }
    out
}

fn parse_circuit(v: Option<&Yaml>) -> CircuitConfig {
    let mut config = CircuitConfig::default();
    let Some(m) = v.and_then(Yaml::as_mapping) else {
        return config;
    };
    if let Some(enabled) = get(m, "enabled").and_then(Yaml::as_bool) {
        config.enabled = enabled;
    }
    if let Some(n) = get(m, "failure_threshold").and_then(Yaml::as_u64) {
        config.failure_threshold = n as u32;
    }
    if let Some(n) = get(m, "timeout_ms").and_then(Yaml::as_u64) {
        config.timeout_ms = n;
    }
    if let Some(n) = get(m, "recovery_timeout_ms").and_then(Yaml::as_u64) {
        config.recovery_timeout_ms = n;
    }
    config
}

fn parse_metadata(v: Option<&Yaml>) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    let Some(m) = v.and_then(Yaml::as_mapping) else {
        return out;
    };
    for (k, v) in m {
        if let Some(key) = k.as_str() {
            out.insert(key.to_string(), yaml_to_value(v));
        }
    }
    out
}

fn parse_action_list(v: Option<&Yaml>) -> Result<Vec<ruleforge_core::Action>, ParseError> {
    let Some(seq) = v.and_then(Yaml::as_sequence) else {
        return Ok(Vec::new());
    };
    seq.iter()
        .filter_map(Yaml::as_str)
        .map(parse_action_str)
        .collect()
}

fn parse_when_list(v: Option<&Yaml>) -> Result<Vec<Condition>, ParseError> {
    let Some(seq) = v.and_then(Yaml::as_sequence) else {
        return Ok(Vec::new());
    };
    seq.iter()
        .filter_map(Yaml::as_str)
        .map(parse_condition_str)
        .collect()
}

fn parse_simple(m: &Mapping) -> Result<RuleLogic, ParseError> {
    Ok(RuleLogic::Simple(SimpleLogic {
        when: parse_when_list(get(m, "when"))?,
        then: parse_action_list(get(m, "then"))?,
        otherwise: parse_action_list(get(m, "else"))?,
    }))
}

fn parse_structured(m: &Mapping) -> Result<RuleLogic, ParseError> {
    let condition_node = get(m, "conditions")
        .ok_or_else(|| ParseError::Document("`conditions` key missing".into()))?;
    let condition = parse_structured_condition(condition_node)?;
    Ok(RuleLogic::Structured(StructuredLogic {
        condition,
        then: parse_action_list(get(m, "then"))?,
        otherwise: parse_action_list(get(m, "else"))?,
    }))
}

/// Structured condition grammar: `and: [..]`, `or: [..]`, `not: ..`, and
/// `compare: { left, operator, right }`, or a bare scalar condition string.
fn parse_structured_condition(v: &Yaml) -> Result<Condition, ParseError> {
    if let Some(s) = v.as_str() {
        return parse_condition_str(s);
    }
    let Some(m) = v.as_mapping() else {
        return Err(ParseError::Document(
            "structured condition must be a string, or one of and/or/not/compare".into(),
        ));
    };
    if let Some(seq) = get(m, "and").and_then(Yaml::as_sequence) {
        let conditions = seq
            .iter()
            .map(parse_structured_condition)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(logical(LogicalOp::And, conditions));
    }
    if let Some(seq) = get(m, "or").and_then(Yaml::as_sequence) {
        let conditions = seq
            .iter()
            .map(parse_structured_condition)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(logical(LogicalOp::Or, conditions));
    }
    if let Some(inner) = get(m, "not") {
        return Ok(not(parse_structured_condition(inner)?));
    }
    if let Some(compare) = get(m, "compare").and_then(Yaml::as_mapping) {
        let left = get_string(compare, "left")
            .ok_or_else(|| ParseError::Document("`compare.left` missing".into()))?;
        let operator = get_string(compare, "operator")
            .ok_or_else(|| ParseError::Document("`compare.operator` missing".into()))?;
        let right = get_string(compare, "right")
            .ok_or_else(|| ParseError::Document("`compare.right` missing".into()))?;
        return structured_compare(&left, &operator, &right);
    }
    Err(ParseError::Document(
        "structured condition map must contain one of and/or/not/compare".into(),
    ))
}

fn parse_rules_sequence(v: Option<&Yaml>) -> Result<RuleLogic, ParseError> {
    let seq = v
        .and_then(Yaml::as_sequence)
        .ok_or_else(|| ParseError::Document("`rules` must be a sequence".into()))?;
    let mut sub_rules = Vec::with_capacity(seq.len());
    for item in seq {
        let m = item
            .as_mapping()
            .ok_or_else(|| ParseError::Document("each `rules` entry must be a mapping".into()))?;
        let name = get_string(m, "name");
        let guard = get_string(m, "when")
            .map(|s| parse_condition_str(&s))
            .transpose()?;
        let logic = if m.contains_key(&Yaml::String("conditions".into())) {
            parse_structured(m)?
        } else {
            RuleLogic::Simple(SimpleLogic {
                when: Vec::new(),
                then: parse_action_list(get(m, "then"))?,
                otherwise: parse_action_list(get(m, "else"))?,
            })
        };
        sub_rules.push(SubRule {
            name,
            guard,
            logic: Box::new(logic),
        });
    }
    Ok(RuleLogic::Sequence(sub_rules))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_DOC: &str = r#"
name: high_value_loan_check
description: Flags loans above a threshold
inputs: [loanAmount, creditScore]
constants:
  - name: MAX_LOAN
    default: 500000
when:
  - loanAmount > MAX_LOAN
  - creditScore is_positive
then:
  - set approved to false
  - calculate riskScore as loanAmount / MAX_LOAN
else:
  - set approved to true
output:
  approved: boolean
  riskScore: number
"#;

    #[test]
    fn parses_simple_document_end_to_end() {
        let parsed = parse_document(SIMPLE_DOC).unwrap();
        assert_eq!(parsed.document.metadata.name, "high_value_loan_check");
        assert_eq!(parsed.document.inputs, vec!["loanAmount", "creditScore"]);
        assert_eq!(parsed.logic_shapes, vec!["when_then"]);
        match parsed.document.logic {
            RuleLogic::Simple(simple) => {
                assert_eq!(simple.when.len(), 2);
                assert_eq!(simple.then.len(), 2);
                assert_eq!(simple.otherwise.len(), 1);
            }
            _ => panic!("expected Simple logic"),
        }
        assert!(parsed.unknown_keys.is_empty());
    }

    const STRUCTURED_DOC: &str = r#"
name: combined_check
description: Structured condition example
inputs: [a, b]
conditions:
  and:
    - compare: { left: a, operator: at_least, right: "10" }
    - not:
        compare: { left: b, operator: equals, right: "0" }
then:
  - set ok to true
"#;

    #[test]
    fn parses_structured_document() {
        let parsed = parse_document(STRUCTURED_DOC).unwrap();
        assert_eq!(parsed.logic_shapes, vec!["conditions"]);
        match parsed.document.logic {
            RuleLogic::Structured(s) => {
                assert!(matches!(s.condition, Condition::Logical(LogicalOp::And, _, _)));
            }
            _ => panic!("expected Structured logic"),
        }
    }

    const UNKNOWN_KEY_DOC: &str = r#"
name: doc
description: has a stray key
inputs: []
when: []
then: []
totallyUnknownField: 42
"#;

    #[test]
    fn records_unknown_top_level_keys() {
        let parsed = parse_document(UNKNOWN_KEY_DOC).unwrap();
        assert_eq!(parsed.unknown_keys, vec!["totallyUnknownField"]);
    }

    const MIXED_SHAPES_DOC: &str = r#"
name: doc
description: mixes shapes
inputs: []
when: []
then: []
conditions:
  compare: { left: a, operator: equals, right: b }
"#;

    #[test]
    fn detects_mixed_logic_shapes() {
        let parsed = parse_document(MIXED_SHAPES_DOC).unwrap();
        assert_eq!(parsed.logic_shapes, vec!["when_then", "conditions"]);
    }

    const SEQUENCE_DOC: &str = r#"
name: doc
description: sequence of sub-rules
inputs: [x]
rules:
  - name: first
    when: x > 0
    then:
      - set positive to true
  - name: second
    then:
      - set checked to true
"#;

    #[test]
    fn parses_rule_sequence_with_guard() {
        let parsed = parse_document(SEQUENCE_DOC).unwrap();
        match parsed.document.logic {
            RuleLogic::Sequence(subs) => {
                assert_eq!(subs.len(), 2);
                assert!(subs[0].guard.is_some());
                assert!(subs[1].guard.is_none());
            }
            _ => panic!("expected Sequence logic"),
        }
    }
}
