//! Quantified invariants and boundary behaviors (spec §8), exercised
//! end-to-end through the public `RuleOrchestrator` API wherever a full
//! evaluation drives the behavior, and directly against `EvaluationContext`
//! for invariants that are about context state rather than a document.

use ruleforge_core::Value;
use ruleforge_engine::collaborators::{InMemoryAuditSink, InMemoryConstantStore, InMemoryRuleStore, StubHttpCollaborator, UnreachableHttpCollaborator};
use ruleforge_engine::{EvalOptions, EvaluationContext, RuleOrchestrator};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

fn num(n: i64) -> Value {
    Value::Number(Decimal::from(n))
}

fn orchestrator_parts() -> (InMemoryRuleStore, InMemoryConstantStore, InMemoryAuditSink, UnreachableHttpCollaborator) {
    (
        InMemoryRuleStore::new(),
        InMemoryConstantStore::new(),
        InMemoryAuditSink::new(),
        UnreachableHttpCollaborator,
    )
}

// Invariant 1 — lookup precedence is computed → inputs → constants → null,
// exercised end-to-end: a name declared both as an input and read as if it
// were a constant must resolve from the input, and once an action writes
// it, the computed value shadows both.
#[test]
fn invariant1_lookup_precedence_computed_beats_input_beats_constant() {
    const RULE: &str = r#"
name: precedence_check
inputs: [creditScore]
constants:
  - name: MIN_SCORE
    default: 1
when:
  - creditScore >= MIN_SCORE
then:
  - set credit_score_doubled to creditScore * 2
  - set credit_score_doubled to credit_score_doubled + 1
output:
  credit_score_doubled: number
"#;
    let (rules, constants, audit, http) = orchestrator_parts();
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
    let mut inputs = BTreeMap::new();
    inputs.insert("creditScore".to_string(), num(10));
    let result = orch.evaluate(RULE, inputs, &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    // First write reads the Input (10 * 2 = 20); the second write reads
    // back its own prior Computed value (20 + 1 = 21), never the Input.
    assert_eq!(result.outputs.get("credit_score_doubled"), Some(&num(21)));
}

// Invariant 1, context-level: an explicit lookup precedence check without
// going through a parsed document at all.
#[test]
fn invariant1_context_lookup_order_directly() {
    // The same name is deliberately planted in all three layers (something
    // real validated rules can never produce, since Input/Constant/Computed
    // shapes are lexically disjoint) purely to pin down the precedence
    // order the three-argument map lookup implements.
    let mut inputs = BTreeMap::new();
    inputs.insert("shared".to_string(), num(1));
    let mut constants = BTreeMap::new();
    constants.insert("shared".to_string(), num(2));
    let mut ctx = EvaluationContext::new(inputs, constants);

    assert_eq!(ctx.lookup("never_declared"), Value::Null);
    assert_eq!(ctx.lookup("shared"), num(1), "Input must win over Constant");

    ctx.write_computed("shared", num(99));
    assert_eq!(ctx.lookup("shared"), num(99), "Computed must win over Input and Constant");
}

// Invariant 2 — an action may only ever write a Computed-shaped name; an
// attempt to shadow a declared Input fails the whole evaluation with a
// stable error code, discarding any partial computed state.
#[test]
fn invariant2_write_target_must_be_computed_shaped() {
    const RULE: &str = r#"
name: bad_write_target
inputs: [creditScore]
when:
  - creditScore >= 0
then:
  - set creditScore to 0
output: {}
"#;
    let (rules, constants, audit, http) = orchestrator_parts();
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
    let mut inputs = BTreeMap::new();
    inputs.insert("creditScore".to_string(), num(700));
    let result = orch.evaluate(RULE, inputs, &EvalOptions::default());

    assert!(!result.success);
    assert!(result.outputs.is_empty());
    assert_eq!(result.error.unwrap().code, "E4005");
}

// Invariant 3 — once `circuit_triggered` becomes true within an
// evaluation, it never flips back to false: a later sub-rule in a
// Sequence must not run, and the flag must still read true afterward.
#[test]
fn invariant3_circuit_triggered_is_monotonic_across_a_sequence() {
    const RULE: &str = r#"
name: circuit_monotonic
inputs: [flag]
rules:
  - name: first
    when: flag
    then:
      - circuit_breaker "first stop"
  - name: second
    then:
      - set second_ran to true
output:
  second_ran: boolean
"#;
    let (rules, constants, audit, http) = orchestrator_parts();
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
    let mut inputs = BTreeMap::new();
    inputs.insert("flag".to_string(), Value::Boolean(true));
    let result = orch.evaluate(RULE, inputs, &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    assert!(result.circuit_breaker.triggered);
    assert_eq!(result.circuit_breaker.message.as_deref(), Some("first stop"));
    // The second sub-rule never ran once the circuit was triggered.
    assert!(!result.outputs.contains_key("second_ran"));
}

// Invariant 3, context-level: triggering twice keeps the same message
// from the first trigger is not asserted (last write wins is acceptable),
// but the flag itself must never clear on its own.
#[test]
fn invariant3_context_circuit_flag_never_self_clears() {
    let mut ctx = EvaluationContext::new(BTreeMap::new(), BTreeMap::new());
    assert!(!ctx.circuit_triggered);
    ctx.trigger_circuit("stop");
    assert!(ctx.circuit_triggered);
    ctx.write_computed("unrelated", num(1));
    assert!(ctx.circuit_triggered, "an unrelated write must not clear the circuit flag");
}

// Invariant 4 — the AST round-trips through serialization losslessly; a
// parsed document serialized to JSON and deserialized back must compare
// equal in its structural content (debug representation, via derived
// `Serialize`/`Deserialize`).
#[test]
fn invariant4_ast_round_trips_through_json() {
    const RULE: &str = r#"
name: round_trip_check
inputs: [creditScore]
when:
  - creditScore >= 650
then:
  - set is_approved to true
else:
  - set is_approved to false
output:
  is_approved: boolean
"#;
    let parsed = ruleforge_compiler::parse(RULE).expect("rule should parse");
    let json = serde_json::to_string(&parsed.document).expect("document should serialize");
    let restored: ruleforge_core::RuleDocument = serde_json::from_str(&json).expect("document should deserialize");
    assert_eq!(format!("{:?}", parsed.document), format!("{:?}", restored));
}

// Invariant 5 — determinism with stubbed externals: the same rule text and
// inputs, run twice against a deterministic (stubbed) HTTP collaborator,
// must produce byte-identical outputs in the same order.
#[test]
fn invariant5_same_inputs_and_stubbed_externals_yield_identical_outputs() {
    const RULE: &str = r#"
name: deterministic_rest
inputs: []
when:
  - 1 is_positive
then:
  - run http_resp as rest_get("https://api.example.test/status")
  - set status_code to http_resp.status
output:
  status_code: number
"#;
    let (rules, constants, audit) = (InMemoryRuleStore::new(), InMemoryConstantStore::new(), InMemoryAuditSink::new());
    let http = StubHttpCollaborator::new();
    http.stub(
        "https://api.example.test/status",
        ruleforge_engine::collaborators::HttpResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: Value::Null,
        },
    );
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);

    let first = orch.evaluate(RULE, BTreeMap::new(), &EvalOptions::default());
    let second = orch.evaluate(RULE, BTreeMap::new(), &EvalOptions::default());

    assert!(first.success && second.success);
    assert_eq!(first.outputs, second.outputs);
    assert_eq!(first.condition_result, second.condition_result);
}

// Boundary — a name the rule never writes is simply absent from the
// output map, not coerced to a null/default value.
#[test]
fn boundary_never_written_output_key_is_absent_not_nulled() {
    const RULE: &str = r#"
name: never_writes_output
inputs: []
when:
  - 1 is_positive
then:
  - set something_else to true
output:
  never_written: boolean
"#;
    let (rules, constants, audit, http) = orchestrator_parts();
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
    let result = orch.evaluate(RULE, BTreeMap::new(), &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    assert!(!result.outputs.contains_key("never_written"));
}

// Boundary — a declared constant with no loaded value and no declared
// default resolves to null on lookup rather than failing the evaluation.
#[test]
fn boundary_missing_constant_without_default_resolves_to_null() {
    const RULE: &str = r#"
name: missing_constant_is_null
inputs: []
constants:
  - name: FOO
when:
  - FOO is_null
then:
  - set is_missing to true
else:
  - set is_missing to false
output:
  is_missing: boolean
"#;
    let (rules, constants, audit, http) = orchestrator_parts();
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
    let result = orch.evaluate(RULE, BTreeMap::new(), &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    assert!(result.condition_result);
    assert_eq!(result.outputs.get("is_missing"), Some(&Value::Boolean(true)));
}

// Boundary — a declared constant with a declared default, and no value in
// the constant store, resolves to that default (mirrors scenario S2).
#[test]
fn boundary_missing_constant_with_default_resolves_to_default() {
    const RULE: &str = r#"
name: constant_default_is_used
inputs: []
constants:
  - name: FLOOR
    default: 42
when:
  - FLOOR == 42
then:
  - set saw_default to true
else:
  - set saw_default to false
output:
  saw_default: boolean
"#;
    let (rules, constants, audit, http) = orchestrator_parts();
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
    let result = orch.evaluate(RULE, BTreeMap::new(), &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    assert_eq!(result.outputs.get("saw_default"), Some(&Value::Boolean(true)));
}
