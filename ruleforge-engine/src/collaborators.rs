//! External collaborator interfaces (§6 "Persistence collaborator" / "HTTP
//! collaborator"). Out of scope for this crate's own implementation — these
//! are the seams the orchestrator calls through; production persistence,
//! auth, and HTTP transport live outside this repository. Each trait gets an
//! in-memory test double so the orchestrator and evaluator can be exercised
//! without a real backend.

use ruleforge_core::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// `load_rule_by_code` / `load_constants` / `record_audit` (§6).
pub trait RuleStore: Send + Sync {
    fn load_rule_by_code(&self, code: &str) -> Option<String>;
}

pub trait ConstantStore: Send + Sync {
    fn load_constants(&self, names: &[String]) -> BTreeMap<String, Value>;
}

pub trait AuditSink: Send + Sync {
    /// Fire-and-forget; failures must not affect the evaluation outcome
    /// (§6), so this has no `Result` return.
    fn record_audit(&self, message: &str, data: Option<&Value>);
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

/// `http_request(method, url, headers, body, timeout) -> {status, headers,
/// body}` (§6). Implementations must surface timeouts as a distinguishable
/// error and must not block the scheduler beyond the timeout; the evaluator
/// never lets an `Err` here escape as a panic — `RestCall` always converts
/// it into a `{status, error, body?}` map (§4.6).
pub trait HttpCollaborator: Send + Sync {
    fn request(
        &self,
        method: &str,
        url: &str,
        headers: Option<&Value>,
        body: Option<&Value>,
        timeout_ms: u64,
    ) -> Result<HttpResponse, String>;
}

/// In-memory rule store keyed by code, for tests and local development.
#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: Mutex<BTreeMap<String, String>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, code: impl Into<String>, rule_text: impl Into<String>) {
        self.rules.lock().unwrap().insert(code.into(), rule_text.into());
    }
}

impl RuleStore for InMemoryRuleStore {
    fn load_rule_by_code(&self, code: &str) -> Option<String> {
        self.rules.lock().unwrap().get(code).cloned()
    }
}

/// In-memory constant store. Missing names are simply absent from the
/// returned map, per §4.6 "Missing constants" — the caller applies declared
/// defaults.
#[derive(Default)]
pub struct InMemoryConstantStore {
    constants: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryConstantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, value: Value) {
        self.constants.lock().unwrap().insert(name.into(), value);
    }
}

impl ConstantStore for InMemoryConstantStore {
    fn load_constants(&self, names: &[String]) -> BTreeMap<String, Value> {
        let store = self.constants.lock().unwrap();
        names
            .iter()
            .filter_map(|n| store.get(n).map(|v| (n.clone(), v.clone())))
            .collect()
    }
}

/// Collects audit events in memory instead of shipping them anywhere — used
/// by tests that want to assert on `audit`/`log` call effects.
#[derive(Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<(String, Option<Value>)>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record_audit(&self, message: &str, data: Option<&Value>) {
        self.events.lock().unwrap().push((message.to_string(), data.cloned()));
    }
}

/// Stub HTTP collaborator that always fails, for exercising §6's
/// "never throws" contract (scenario S5): every call returns `Err` which
/// the evaluator turns into `{status, error}`.
#[derive(Default)]
pub struct UnreachableHttpCollaborator;

impl HttpCollaborator for UnreachableHttpCollaborator {
    fn request(
        &self,
        _method: &str,
        _url: &str,
        _headers: Option<&Value>,
        _body: Option<&Value>,
        _timeout_ms: u64,
    ) -> Result<HttpResponse, String> {
        Err("connection refused".to_string())
    }
}

/// Canned-response HTTP collaborator for deterministic tests.
#[derive(Default)]
pub struct StubHttpCollaborator {
    responses: Mutex<BTreeMap<String, HttpResponse>>,
}

impl StubHttpCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub(&self, url: impl Into<String>, response: HttpResponse) {
        self.responses.lock().unwrap().insert(url.into(), response);
    }
}

impl HttpCollaborator for StubHttpCollaborator {
    fn request(
        &self,
        _method: &str,
        url: &str,
        _headers: Option<&Value>,
        _body: Option<&Value>,
        _timeout_ms: u64,
    ) -> Result<HttpResponse, String> {
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| "no stub registered for url".to_string())
    }
}
