//! End-to-end scenarios (spec §8) driven entirely through the public
//! `RuleOrchestrator` API and `ruleforge_compiler::validator::validate`.

use ruleforge_core::Value;
use ruleforge_engine::collaborators::{
    InMemoryAuditSink, InMemoryConstantStore, InMemoryRuleStore, StubHttpCollaborator, UnreachableHttpCollaborator,
};
use ruleforge_engine::{EvalOptions, RuleOrchestrator};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

fn num(n: i64) -> Value {
    Value::Number(Decimal::from(n))
}

fn dec(s: &str) -> Value {
    Value::Number(s.parse().unwrap())
}

// S1 — simple approval.
#[test]
fn s1_simple_approval_approves_above_threshold() {
    const RULE: &str = r#"
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
    let (rules, constants, audit, http) = (
        InMemoryRuleStore::new(),
        InMemoryConstantStore::new(),
        InMemoryAuditSink::new(),
        UnreachableHttpCollaborator,
    );
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);

    let mut inputs = BTreeMap::new();
    inputs.insert("creditScore".to_string(), num(720));
    inputs.insert("annualIncome".to_string(), num(50_000));
    let result = orch.evaluate(RULE, inputs, &EvalOptions::default());

    assert!(result.success);
    assert!(result.condition_result);
    assert_eq!(result.outputs.get("is_approved"), Some(&Value::Boolean(true)));
}

// S2 — debt ratio tiering with a constant default.
#[test]
fn s2_debt_ratio_tier_uses_constant_default() {
    const RULE: &str = r#"
name: debt_ratio_tier
description: Tiers an applicant by debt-to-income ratio once a credit floor is met
inputs: [creditScore, annualIncome, existingDebt]
constants:
  - name: MIN_CREDIT_SCORE
    default: 650
when:
  - creditScore >= MIN_CREDIT_SCORE
  - annualIncome > 0
then:
  - calculate debt_ratio as existingDebt / annualIncome
  - if debt_ratio < 0.3 then set tier_level to "HIGH" else set tier_level to "LOW"
output:
  debt_ratio: number
  tier_level: text
"#;
    let (rules, constants, audit, http) = (
        InMemoryRuleStore::new(),
        InMemoryConstantStore::new(),
        InMemoryAuditSink::new(),
        UnreachableHttpCollaborator,
    );
    // No MIN_CREDIT_SCORE loaded into the constant store — the rule's
    // declared default (650) must be used.
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);

    let mut inputs = BTreeMap::new();
    inputs.insert("creditScore".to_string(), num(700));
    inputs.insert("annualIncome".to_string(), num(80_000));
    inputs.insert("existingDebt".to_string(), num(20_000));
    let result = orch.evaluate(RULE, inputs, &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    assert!(result.condition_result);
    assert_eq!(result.outputs.get("debt_ratio"), Some(&dec("0.25")));
    assert_eq!(result.outputs.get("tier_level"), Some(&Value::String("HIGH".to_string())));
}

// S3 — forEach aggregation with a nested single-action conditional.
#[test]
fn s3_foreach_aggregates_total_and_counts_large_amounts() {
    const RULE: &str = r#"
name: aggregate_amounts
description: Sums a list of amounts and counts how many exceed 1000
inputs: [amounts]
when:
  - amounts is_list
then:
  - set total_amount to 0
  - set large_count to 0
  - "forEach a in amounts: calculate total_amount as total_amount + a; if a > 1000 then add 1 to large_count"
output:
  total_amount: number
  large_count: number
"#;
    let (rules, constants, audit, http) = (
        InMemoryRuleStore::new(),
        InMemoryConstantStore::new(),
        InMemoryAuditSink::new(),
        UnreachableHttpCollaborator,
    );
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);

    let mut inputs = BTreeMap::new();
    inputs.insert(
        "amounts".to_string(),
        Value::List(vec![num(100), num(200), num(300), num(1500)]),
    );
    let result = orch.evaluate(RULE, inputs, &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    assert_eq!(result.outputs.get("total_amount"), Some(&num(2100)));
    assert_eq!(result.outputs.get("large_count"), Some(&num(1)));
}

// S4 — circuit breaker halts all further action execution.
#[test]
fn s4_circuit_breaker_halts_subsequent_actions() {
    const RULE: &str = r#"
name: circuit_halts
description: A triggered circuit breaker must stop the next action from running
inputs: [flag]
when:
  - flag is_boolean
then:
  - set a_value to 1
  - if flag then circuit_breaker "stop"
  - set a_value to 2
output:
  a_value: number
"#;
    let (rules, constants, audit, http) = (
        InMemoryRuleStore::new(),
        InMemoryConstantStore::new(),
        InMemoryAuditSink::new(),
        UnreachableHttpCollaborator,
    );
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);

    let mut inputs = BTreeMap::new();
    inputs.insert("flag".to_string(), Value::Boolean(true));
    let result = orch.evaluate(RULE, inputs, &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    assert_eq!(result.outputs.get("a_value"), Some(&num(1)));
    assert!(result.circuit_breaker.triggered);
    assert_eq!(result.circuit_breaker.message.as_deref(), Some("stop"));
}

// S5 — a failed REST call never raises; it materializes as a result map.
#[test]
fn s5_rest_failure_materializes_as_a_map_not_an_error() {
    const RULE: &str = r#"
name: rest_failure_is_not_an_error
description: A REST call to an unreachable host must still produce a successful evaluation
inputs: []
when:
  - 1 is_positive
then:
  - run http_resp as rest_get("https://bad.invalid/x")
  - set is_ok to not (http_resp.status >= 500 or http_resp.error is_not_null)
output:
  is_ok: boolean
"#;
    let (rules, constants, audit, http) = (
        InMemoryRuleStore::new(),
        InMemoryConstantStore::new(),
        InMemoryAuditSink::new(),
        UnreachableHttpCollaborator,
    );
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);

    let result = orch.evaluate(RULE, BTreeMap::new(), &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    assert_eq!(result.outputs.get("is_ok"), Some(&Value::Boolean(false)));
}

// S5b — same scenario, but a stubbed collaborator returns a real 200.
#[test]
fn s5b_rest_success_round_trips_through_stub_collaborator() {
    const RULE: &str = r#"
name: rest_success
description: A successful REST call should flow its status into a computed variable
inputs: []
when:
  - 1 is_positive
then:
  - run http_resp as rest_get("https://api.example.test/ping")
  - set is_ok to not (http_resp.status >= 500 or http_resp.error is_not_null)
output:
  is_ok: boolean
"#;
    let (rules, constants, audit) = (InMemoryRuleStore::new(), InMemoryConstantStore::new(), InMemoryAuditSink::new());
    let http = StubHttpCollaborator::new();
    http.stub(
        "https://api.example.test/ping",
        ruleforge_engine::collaborators::HttpResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: Value::Null,
        },
    );
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);

    let result = orch.evaluate(RULE, BTreeMap::new(), &EvalOptions::default());

    assert!(result.success, "evaluation error: {:?}", result.error);
    assert_eq!(result.outputs.get("is_ok"), Some(&Value::Boolean(true)));
}

// S6 — the validator rejects a write target that shadows a declared input.
#[test]
fn s6_validator_rejects_writes_that_shadow_a_declared_input() {
    const RULE: &str = r#"
name: bad_shadowing
description: Attempts to overwrite a declared input, which the validator must reject
inputs: [creditScore]
when:
  - creditScore >= 0
then:
  - set creditScore to 0
output: {}
"#;
    let report = ruleforge_compiler::validator::validate(RULE);

    assert_eq!(report.status, "invalid");
    assert!(report
        .issues
        .logic
        .iter()
        .any(|issue| issue.code == "E4005" && issue.message.contains("creditScore")));

    // The orchestrator's own `validate` passthrough must agree.
    let (rules, constants, audit, http) = (
        InMemoryRuleStore::new(),
        InMemoryConstantStore::new(),
        InMemoryAuditSink::new(),
        UnreachableHttpCollaborator,
    );
    let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
    let same = orch.validate(RULE);
    assert_eq!(same.status, "invalid");
}
