//! Rule Orchestrator (§4.7). The public entry point callers drive: parses
//! (with AST caching), resolves constants, builds an `EvaluationContext`,
//! runs the Evaluator, and shapes the result.

use crate::collaborators::{AuditSink, ConstantStore, HttpCollaborator, RuleStore};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::evaluator::Evaluator;
use crate::services::cache::AstCache;
use ruleforge_compiler::ValidationReport;
use ruleforge_core::{OutputType, RuleDocument, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::time::Instant;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CircuitBreakerResult {
    pub triggered: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalErrorInfo {
    pub code: String,
    pub message: String,
}

/// `EvalResult` (§4.7).
#[derive(Debug, Clone, Serialize)]
pub struct EvalResult {
    pub success: bool,
    pub condition_result: bool,
    pub outputs: BTreeMap<String, Value>,
    pub execution_time_ms: f64,
    pub circuit_breaker: CircuitBreakerResult,
    pub error: Option<EvalErrorInfo>,
    pub metadata: BTreeMap<String, Value>,
}

impl EvalResult {
    fn failure(code: &str, message: impl Into<String>, started: Instant) -> Self {
        Self {
            success: false,
            condition_result: false,
            outputs: BTreeMap::new(),
            execution_time_ms: elapsed_ms(started),
            circuit_breaker: CircuitBreakerResult::default(),
            error: Some(EvalErrorInfo {
                code: code.to_string(),
                message: message.into(),
            }),
            metadata: BTreeMap::new(),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Shapes raw computed state into the declared `output` schema (§4.7
/// "coerced to declared type"); names absent from the document's
/// `output_schema` are dropped, names the rule never wrote are simply
/// absent from the result (not nulled, per scenario boundary behavior).
fn project_outputs(document: &RuleDocument, computed: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let mut outputs = BTreeMap::new();
    for (name, out_type) in &document.output_schema {
        if let Some(value) = computed.get(name) {
            outputs.insert(name.clone(), coerce_output(value, *out_type));
        }
    }
    outputs
}

fn coerce_output(value: &Value, out_type: OutputType) -> Value {
    match out_type {
        OutputType::Boolean => Value::Boolean(value.is_truthy()),
        OutputType::Number => value
            .as_number()
            .map(Value::Number)
            .unwrap_or_else(|| Value::Number(rust_decimal::Decimal::ZERO)),
        OutputType::Text => Value::String(value.to_display_string()),
        OutputType::Date | OutputType::Object | OutputType::List => value.clone(),
    }
}

/// Resolves `document.constants` against a `ConstantStore`: a loaded value
/// wins, otherwise the declared default, otherwise the name is simply
/// absent (the Evaluation Context then resolves it to null on lookup, per
/// §4.6 "Missing constants").
fn resolve_constants(document: &RuleDocument, store: &dyn ConstantStore) -> BTreeMap<String, Value> {
    let names: Vec<String> = document.constants.iter().map(|c| c.name.clone()).collect();
    let loaded = store.load_constants(&names);
    let mut resolved = BTreeMap::new();
    for decl in &document.constants {
        if let Some(v) = loaded.get(&decl.name) {
            resolved.insert(decl.name.clone(), v.clone());
        } else if let Some(default) = &decl.default {
            resolved.insert(decl.name.clone(), default.clone());
        }
    }
    resolved
}

pub struct RuleOrchestrator<'a> {
    rule_store: &'a dyn RuleStore,
    constant_store: &'a dyn ConstantStore,
    audit_sink: &'a dyn AuditSink,
    http: &'a dyn HttpCollaborator,
    cache: AstCache,
}

impl<'a> RuleOrchestrator<'a> {
    pub fn new(
        rule_store: &'a dyn RuleStore,
        constant_store: &'a dyn ConstantStore,
        audit_sink: &'a dyn AuditSink,
        http: &'a dyn HttpCollaborator,
    ) -> Self {
        Self {
            rule_store,
            constant_store,
            audit_sink,
            http,
            cache: AstCache::new(256, std::time::Duration::from_secs(300)),
        }
    }

    pub fn validate(&self, rule_text: &str) -> ValidationReport {
        ruleforge_compiler::validator::validate(rule_text)
    }

    #[instrument(skip(self, rule_text, inputs, options), fields(rule_len = rule_text.len()))]
    pub fn evaluate(&self, rule_text: &str, inputs: BTreeMap<String, Value>, options: &EvalOptions) -> EvalResult {
        let started = Instant::now();
        let digest = ruleforge_compiler::digest::content_digest(rule_text);
        let document = match self.cache.get(&digest) {
            Some(doc) => doc,
            None => match ruleforge_compiler::parse(rule_text) {
                Ok(parsed) => {
                    self.cache.insert(digest, parsed.document.clone());
                    parsed.document
                }
                Err(e) => return EvalResult::failure("E2001", e.to_string(), started),
            },
        };
        self.run(&document, inputs, options, started)
    }

    #[instrument(skip(self, inputs, options), fields(rule_code))]
    pub fn evaluate_by_code(&self, rule_code: &str, inputs: BTreeMap<String, Value>, options: &EvalOptions) -> EvalResult {
        let started = Instant::now();
        match self.rule_store.load_rule_by_code(rule_code) {
            Some(rule_text) => self.evaluate(&rule_text, inputs, options),
            None => {
                tracing::warn!(rule_code, "no active rule stored under this code");
                EvalResult::failure("E5001", format!("no active rule stored under code `{rule_code}`"), started)
            }
        }
    }

    fn run(&self, document: &RuleDocument, inputs: BTreeMap<String, Value>, options: &EvalOptions, started: Instant) -> EvalResult {
        if let Some(deadline_ms) = options.deadline_ms {
            if deadline_ms == 0 {
                return EvalResult::failure("E6001", "deadline exceeded before evaluation started", started);
            }
        }

        let constants = resolve_constants(document, self.constant_store);
        let mut ctx = EvaluationContext::new(inputs, constants);
        let evaluator = Evaluator::new(self.http);

        let outcome: Result<bool, EvalError> = evaluator.exec_logic(&document.logic, &mut ctx);

        for event in &ctx.audit_events {
            self.audit_sink.record_audit(&event.message, event.data.as_ref());
        }

        match outcome {
            Ok(condition_result) => EvalResult {
                success: true,
                condition_result,
                outputs: project_outputs(document, &ctx.computed_snapshot()),
                execution_time_ms: elapsed_ms(started),
                circuit_breaker: CircuitBreakerResult {
                    triggered: ctx.circuit_triggered,
                    message: ctx.circuit_message.clone(),
                },
                error: None,
                metadata: BTreeMap::new(),
            },
            Err(err) => EvalResult::failure(err.code(), err.to_string(), started),
        }
    }
}

// ---- Batch evaluation (§4.7 "batch_evaluate") ---------------------------

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub rule_text: String,
    pub inputs: BTreeMap<String, Value>,
    pub priority: i64,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub concurrency: usize,
    pub per_request_timeout_ms: u64,
    pub fail_fast: bool,
    pub return_partial_results: bool,
    pub sort_by_priority: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            per_request_timeout_ms: 30_000,
            fail_fast: false,
            return_partial_results: true,
            sort_by_priority: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub results: Vec<EvalResult>,
    pub completed: usize,
    pub total: usize,
}

impl<'a> RuleOrchestrator<'a> {
    /// Evaluates one request against a best-effort deadline. `evaluate`
    /// itself has no internal yield points (the `HttpCollaborator` seam is
    /// a blocking call, not an async one), so the deadline can only be
    /// checked after the fact rather than used to preempt a slow call —
    /// the same limit the previous `tokio::time::timeout`-based version had.
    fn evaluate_with_deadline(&self, request: &BatchRequest, timeout: std::time::Duration) -> EvalResult {
        let started = Instant::now();
        let result = self.evaluate(&request.rule_text, request.inputs.clone(), &EvalOptions::default());
        if started.elapsed() > timeout {
            return EvalResult::failure("E6001", "per-request deadline exceeded", started);
        }
        result
    }

    /// Runs many requests concurrently under a pool bounded to `cap` workers
    /// (§5 "Backpressure"), honoring `sort_by_priority` (higher first,
    /// stable for ties) and `fail_fast`.
    ///
    /// `evaluate` blocks its caller for the duration of any `HttpCollaborator`
    /// call, so bounding concurrency with an async semaphore around
    /// sequential `.await`s (the previous approach) never actually overlaps
    /// two requests — at most one permit is ever doing work. `std::thread::
    /// scope` gives `cap` real OS threads that borrow `self`/`requests` for
    /// the scope's lifetime (no `'static` bound needed, unlike
    /// `tokio::spawn`), so up to `cap` requests are genuinely in flight.
    #[instrument(skip(self, requests, options), fields(count = requests.len()))]
    pub async fn batch_evaluate(&self, mut requests: Vec<BatchRequest>, options: &BatchOptions) -> BatchResult {
        let cap = options.concurrency.clamp(1, 50);
        if options.sort_by_priority {
            requests.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        let total = requests.len();
        if total == 0 {
            return BatchResult { results: Vec::new(), completed: 0, total: 0 };
        }
        let timeout = std::time::Duration::from_millis(options.per_request_timeout_ms);
        let next_index = AtomicU32::new(0);
        let stop = std::sync::atomic::AtomicBool::new(false);
        let slots: Vec<std::sync::Mutex<Option<EvalResult>>> = (0..total).map(|_| std::sync::Mutex::new(None)).collect();

        std::thread::scope(|scope| {
            for _ in 0..cap.min(total) {
                scope.spawn(|| loop {
                    if options.fail_fast && stop.load(AtomicOrdering::Relaxed) {
                        break;
                    }
                    let idx = next_index.fetch_add(1, AtomicOrdering::Relaxed) as usize;
                    if idx >= total {
                        break;
                    }
                    let result = self.evaluate_with_deadline(&requests[idx], timeout);
                    if !result.success && options.fail_fast {
                        stop.store(true, AtomicOrdering::Relaxed);
                    }
                    *slots[idx].lock().unwrap() = Some(result);
                });
            }
        });

        let mut results = Vec::with_capacity(total);
        for slot in slots {
            if let Some(result) = slot.into_inner().unwrap() {
                results.push(result);
            }
        }
        let completed = results.len();
        if !options.return_partial_results && completed < total {
            results.clear();
        }
        BatchResult { results, completed, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryAuditSink, InMemoryConstantStore, InMemoryRuleStore, UnreachableHttpCollaborator};

    const SIMPLE_APPROVAL: &str = r#"
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

    fn orchestrator() -> (InMemoryRuleStore, InMemoryConstantStore, InMemoryAuditSink, UnreachableHttpCollaborator) {
        (
            InMemoryRuleStore::new(),
            InMemoryConstantStore::new(),
            InMemoryAuditSink::new(),
            UnreachableHttpCollaborator,
        )
    }

    #[test]
    fn simple_approval_scenario_matches_s1() {
        let (rules, constants, audit, http) = orchestrator();
        let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
        let mut inputs = BTreeMap::new();
        inputs.insert("creditScore".to_string(), Value::Number(rust_decimal::Decimal::from(720)));
        inputs.insert("annualIncome".to_string(), Value::Number(rust_decimal::Decimal::from(50000)));
        let result = orch.evaluate(SIMPLE_APPROVAL, inputs, &EvalOptions::default());
        assert!(result.success);
        assert!(result.condition_result);
        assert_eq!(result.outputs.get("is_approved"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn evaluate_by_code_fails_when_rule_missing() {
        let (rules, constants, audit, http) = orchestrator();
        let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
        let result = orch.evaluate_by_code("UNKNOWN", BTreeMap::new(), &EvalOptions::default());
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "E5001");
    }

    #[test]
    fn missing_output_key_is_absent_not_null() {
        let (rules, constants, audit, http) = orchestrator();
        let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);
        let mut inputs = BTreeMap::new();
        inputs.insert("creditScore".to_string(), Value::Number(rust_decimal::Decimal::from(100)));
        inputs.insert("annualIncome".to_string(), Value::Number(rust_decimal::Decimal::from(0)));
        let result = orch.evaluate(SIMPLE_APPROVAL, inputs, &EvalOptions::default());
        assert!(result.success);
        assert!(!result.condition_result);
        assert_eq!(result.outputs.get("is_approved"), Some(&Value::Boolean(false)));
    }

    /// An `HttpCollaborator` whose calls block for a fixed duration, tracking
    /// the peak number of calls in flight at once — the direct witness that
    /// `batch_evaluate` overlaps requests instead of running them one at a
    /// time behind a cap that's never actually exercised.
    struct SlowHttp {
        in_flight: std::sync::atomic::AtomicUsize,
        max_in_flight: std::sync::atomic::AtomicUsize,
    }

    impl crate::collaborators::HttpCollaborator for SlowHttp {
        fn request(
            &self,
            _method: &str,
            _url: &str,
            _headers: Option<&Value>,
            _body: Option<&Value>,
            _timeout_ms: u64,
        ) -> Result<crate::collaborators::HttpResponse, String> {
            use std::sync::atomic::Ordering;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(30));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(crate::collaborators::HttpResponse {
                status: 200,
                headers: BTreeMap::new(),
                body: Value::Null,
            })
        }
    }

    #[tokio::test]
    async fn batch_evaluate_runs_requests_concurrently_not_sequentially() {
        const RULE: &str = r#"
name: batch_probe
inputs: []
when:
  - 1 is_positive
then:
  - run probe as rest_get("https://api.example.test/slow")
output: {}
"#;
        let (rules, constants, audit) = (InMemoryRuleStore::new(), InMemoryConstantStore::new(), InMemoryAuditSink::new());
        let http = SlowHttp {
            in_flight: std::sync::atomic::AtomicUsize::new(0),
            max_in_flight: std::sync::atomic::AtomicUsize::new(0),
        };
        let orch = RuleOrchestrator::new(&rules, &constants, &audit, &http);

        let requests: Vec<BatchRequest> = (0..4)
            .map(|_| BatchRequest {
                rule_text: RULE.to_string(),
                inputs: BTreeMap::new(),
                priority: 0,
            })
            .collect();
        let options = BatchOptions { concurrency: 4, ..BatchOptions::default() };
        let result = orch.batch_evaluate(requests, &options).await;

        assert_eq!(result.completed, 4);
        assert!(
            http.max_in_flight.load(std::sync::atomic::Ordering::SeqCst) >= 2,
            "requests never overlapped — batch_evaluate is serializing work instead of running it concurrently"
        );
    }
}
