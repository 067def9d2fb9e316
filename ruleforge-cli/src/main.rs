//! RuleForge CLI — command-line interface for the RuleForge rule engine.

use clap::{Parser as ClapParser, Subcommand};
use ruleforge_core::Value;
use ruleforge_engine::collaborators::{InMemoryAuditSink, InMemoryConstantStore, InMemoryRuleStore, UnreachableHttpCollaborator};
use ruleforge_engine::{EvalOptions, RuleOrchestrator};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

#[derive(ClapParser)]
#[command(
    name = "ruleforge",
    version,
    about = "RuleForge — a declarative rule engine for business logic",
    long_about = "RuleForge evaluates business rules expressed in a declarative YAML-embedded DSL.\n\n\
                  Learn more in SPEC_FULL.md.",
    help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}

Examples:
  ruleforge validate rules/approval.yaml
  ruleforge evaluate rules/approval.yaml --inputs inputs.json
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a rule file and print its validation report
    Validate {
        /// Path to the rule YAML file
        #[arg()]
        rule: PathBuf,
    },
    /// Evaluate a rule file against a JSON inputs file (or `{}` if omitted)
    Evaluate {
        /// Path to the rule YAML file
        #[arg()]
        rule: PathBuf,

        /// Path to a JSON file of input values
        #[arg(long)]
        inputs: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_inputs(path: Option<&PathBuf>) -> Result<BTreeMap<String, Value>, String> {
    let raw = match path {
        Some(p) => std::fs::read_to_string(p).map_err(|e| format!("failed to read {}: {e}", p.display()))?,
        None => "{}".to_string(),
    };
    let json: serde_json::Value = serde_json::from_str(&raw).map_err(|e| format!("invalid JSON inputs: {e}"))?;
    match Value::from_json(&json) {
        Value::Map(m) => Ok(m),
        _ => Err("inputs file must contain a JSON object".to_string()),
    }
}

fn run_validate(rule: &PathBuf) -> ExitCode {
    let text = match std::fs::read_to_string(rule) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} failed to read {}: {e}", red("error:"), rule.display());
            return ExitCode::FAILURE;
        }
    };
    let (rules, constants, audit, http) = (
        InMemoryRuleStore::new(),
        InMemoryConstantStore::new(),
        InMemoryAuditSink::new(),
        UnreachableHttpCollaborator,
    );
    let orchestrator = RuleOrchestrator::new(&rules, &constants, &audit, &http);
    let report = orchestrator.validate(&text);
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{} failed to render report: {e}", red("error:")),
    }
    if report.summary.critical > 0 || report.summary.errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_evaluate(rule: &PathBuf, inputs_path: Option<&PathBuf>) -> ExitCode {
    let text = match std::fs::read_to_string(rule) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} failed to read {}: {e}", red("error:"), rule.display());
            return ExitCode::FAILURE;
        }
    };
    let inputs = match load_inputs(inputs_path) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{} {e}", red("error:"));
            return ExitCode::FAILURE;
        }
    };
    let (rules, constants, audit, http) = (
        InMemoryRuleStore::new(),
        InMemoryConstantStore::new(),
        InMemoryAuditSink::new(),
        UnreachableHttpCollaborator,
    );
    let orchestrator = RuleOrchestrator::new(&rules, &constants, &audit, &http);
    let result = orchestrator.evaluate(&text, inputs, &EvalOptions::default());
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{} failed to render result: {e}", red("error:")),
    }
    if result.success {
        println!("{}", bold(&green("ok")));
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match &cli.command {
        Commands::Validate { rule } => run_validate(rule),
        Commands::Evaluate { rule, inputs } => run_evaluate(rule, inputs.as_ref()),
    }
}
