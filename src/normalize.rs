//! Reconciles a remote analysis provider's reply with the local result shape.
//!
//! The provider answers with JSON that is sometimes wrapped in a stray array
//! or broken across lines. Parsing runs as an ordered list of attempts; the
//! first one that yields a value wins. A recognized `output` wrapper is mapped
//! field by field onto [`RemoteAnalysis`], anything else passes through.

use std::borrow::Cow;

use log::{debug, warn};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::{word_count, Keyword, Structure};

/// Value reported as `metadata.source` for provider-backed analyses.
pub const SOURCE: &str = "n8n";

const OUTPUT_WRAPPER: &str = "output";
const JSON_CONTENT_TYPE: &str = "application/json";
const LOG_SNIPPET_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Provider analysis in the local result shape. Keywords and structure are
/// never supplied by the provider and stay empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAnalysis {
    pub prompt_quality_score: Option<Number>,
    pub char_count: usize,
    pub word_count: usize,
    pub keywords: Vec<Keyword>,
    pub structure: Structure,
    pub suggestions: Vec<String>,
    pub raw: RawAnalysis,
    #[serde(
        rename = "criterios_especificos",
        skip_serializing_if = "Option::is_none"
    )]
    pub criteria: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawAnalysis {
    #[serde(rename = "analisis_general", skip_serializing_if = "Option::is_none")]
    pub general: Option<Value>,
}

impl RemoteAnalysis {
    /// Counts come from the prompt the caller sent, not the provider's echo.
    fn for_prompt(prompt: &str) -> Self {
        Self {
            prompt_quality_score: None,
            char_count: prompt.chars().count(),
            word_count: word_count(prompt.trim()),
            keywords: vec![],
            structure: Structure::default(),
            suggestions: vec![],
            raw: RawAnalysis::default(),
            criteria: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// The reply carried the `output` wrapper and was mapped.
    Analysis(RemoteAnalysis),
    /// Valid JSON without the wrapper, returned unchanged.
    PassThrough(Value),
    /// JSON was announced but no attempt could parse it.
    Unparseable,
    /// Not JSON, or an empty body. The caller relays the raw text.
    NotJson,
}

// ---------------------------------------------------------------------------
// Parse attempts
// ---------------------------------------------------------------------------

struct ParseAttempt {
    name: &'static str,
    prepare: fn(&str) -> Cow<'_, str>,
}

static PARSE_ATTEMPTS: [ParseAttempt; 2] = [
    ParseAttempt {
        name: "direct",
        prepare: prepare_direct,
    },
    ParseAttempt {
        name: "cleanup",
        prepare: prepare_cleanup,
    },
];

#[derive(Debug)]
pub enum AttemptOutcome {
    Parsed(Value),
    Empty,
    Failed(serde_json::Error),
}

fn prepare_direct(raw: &str) -> Cow<'_, str> {
    Cow::Borrowed(raw)
}

/// Drops one leading `[` and one trailing `]`, removes newlines, then trims.
fn prepare_cleanup(raw: &str) -> Cow<'_, str> {
    let inner = raw.strip_prefix('[').unwrap_or(raw);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    Cow::Owned(inner.replace('\n', "").trim().to_string())
}

fn run_attempt(attempt: &ParseAttempt, raw: &str) -> AttemptOutcome {
    let candidate = (attempt.prepare)(raw);
    if candidate.is_empty() {
        return AttemptOutcome::Empty;
    }
    match serde_json::from_str(&candidate) {
        Ok(value) => AttemptOutcome::Parsed(value),
        Err(e) => AttemptOutcome::Failed(e),
    }
}

/// Runs every parse attempt in order and reports each outcome, stopping at the
/// first success.
pub fn parse_attempts(raw: &str) -> Vec<(&'static str, AttemptOutcome)> {
    let mut outcomes = Vec::new();
    for attempt in &PARSE_ATTEMPTS {
        let outcome = run_attempt(attempt, raw);
        let parsed = matches!(outcome, AttemptOutcome::Parsed(_));
        outcomes.push((attempt.name, outcome));
        if parsed {
            break;
        }
    }
    outcomes
}

fn snippet(raw: &str) -> String {
    let head: String = raw.chars().take(LOG_SNIPPET_CHARS).collect();
    format!("{head}...")
}

/// Errors worth reporting once every attempt is spent. A final attempt that
/// left nothing to parse gives up quietly.
fn failure_summary(outcomes: &[(&'static str, AttemptOutcome)]) -> Option<String> {
    match outcomes.last() {
        Some((_, AttemptOutcome::Failed(_))) => Some(
            outcomes
                .iter()
                .filter_map(|(name, outcome)| match outcome {
                    AttemptOutcome::Failed(e) => Some(format!("{name}: {e}")),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    }
}

/// Recovers a JSON value from possibly malformed provider text. Failures are
/// logged, never returned.
pub fn recover_json(raw: &str, content_type: &str) -> Option<Value> {
    let mut outcomes = parse_attempts(raw);
    if matches!(outcomes.last(), Some((_, AttemptOutcome::Parsed(_)))) {
        if let Some((name, AttemptOutcome::Parsed(value))) = outcomes.pop() {
            debug!("provider reply parsed by {name} attempt");
            return Some(value);
        }
    }

    match failure_summary(&outcomes) {
        Some(errors) => warn!(
            "failed to parse JSON from provider reply: errors=[{errors}] content_type={content_type} raw_text={}",
            snippet(raw)
        ),
        None => debug!("provider reply left nothing to parse after cleanup"),
    }
    None
}

// ---------------------------------------------------------------------------
// Field mapping
// ---------------------------------------------------------------------------

struct FieldMapping {
    source: &'static str,
    apply: fn(&mut RemoteAnalysis, Option<&Value>),
}

static FIELD_MAP: [FieldMapping; 4] = [
    FieldMapping {
        source: "puntuacion",
        apply: map_score,
    },
    FieldMapping {
        source: "consejos_de_mejora",
        apply: map_advice,
    },
    FieldMapping {
        source: "analisis_general",
        apply: map_general,
    },
    FieldMapping {
        source: "criterios_especificos",
        apply: map_criteria,
    },
];

fn map_score(analysis: &mut RemoteAnalysis, value: Option<&Value>) {
    analysis.prompt_quality_score = value.and_then(coerce_score);
}

fn map_advice(analysis: &mut RemoteAnalysis, value: Option<&Value>) {
    analysis.suggestions = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => vec![],
    };
}

fn map_general(analysis: &mut RemoteAnalysis, value: Option<&Value>) {
    analysis.raw.general = value.cloned();
}

fn map_criteria(analysis: &mut RemoteAnalysis, value: Option<&Value>) {
    analysis.criteria = value.cloned();
}

/// Numbers pass through as-is. Other values are coerced the loose way the
/// provider's clients do: zero or anything non-numeric becomes `None`.
fn coerce_score(value: &Value) -> Option<Number> {
    let n = match value {
        Value::Number(n) => return Some(n.clone()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().ok()?
            }
        }
        Value::Bool(true) => 1.0,
        _ => return None,
    };

    if n == 0.0 || !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Number::from(n as i64))
    } else {
        Number::from_f64(n)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn map_output(output: &Value, prompt: &str) -> RemoteAnalysis {
    let mut analysis = RemoteAnalysis::for_prompt(prompt);
    for mapping in &FIELD_MAP {
        (mapping.apply)(&mut analysis, output.get(mapping.source));
    }
    analysis
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn is_json_content(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains(JSON_CONTENT_TYPE)
}

/// Normalizes an already-fetched provider reply against the prompt that was
/// sent. Never fails: every outcome is a [`Normalized`] variant.
pub fn normalize(raw: &str, content_type: &str, prompt: &str) -> Normalized {
    if raw.is_empty() || !is_json_content(content_type) {
        debug!("provider reply is not JSON (content_type={content_type})");
        return Normalized::NotJson;
    }

    let Some(value) = recover_json(raw, content_type) else {
        return Normalized::Unparseable;
    };

    match value.get(OUTPUT_WRAPPER).filter(|output| is_truthy(output)) {
        Some(output) => Normalized::Analysis(map_output(output, prompt)),
        None => {
            debug!("provider reply has no {OUTPUT_WRAPPER} wrapper, passing through");
            Normalized::PassThrough(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cleanup_strips_brackets_and_newlines() {
        let cleaned = prepare_cleanup("[{\"a\":\n1}\n]");
        assert_eq!(cleaned, "{\"a\":1}");
    }

    #[test]
    fn cleanup_only_strips_outermost_brackets() {
        assert_eq!(prepare_cleanup("[[1]]"), "[1]");
        assert_eq!(prepare_cleanup(" [1]"), "[1");
    }

    #[test]
    fn direct_attempt_wins_and_stops() {
        let outcomes = parse_attempts("{\"ok\":true}");
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, "direct");
        assert!(matches!(outcomes[0].1, AttemptOutcome::Parsed(_)));
    }

    #[test]
    fn cleanup_attempt_runs_after_direct_failure() {
        let outcomes = parse_attempts("[{\"ok\":true}\n,]");
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].1, AttemptOutcome::Failed(_)));
        assert!(matches!(outcomes[1].1, AttemptOutcome::Failed(_)));

        let outcomes = parse_attempts("[{\"ok\":\ntrue}");
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].0, "cleanup");
        assert!(matches!(outcomes[1].1, AttemptOutcome::Parsed(_)));
    }

    #[test]
    fn cleanup_of_brackets_only_is_empty() {
        let outcomes = parse_attempts("[\n");
        assert!(matches!(outcomes[1].1, AttemptOutcome::Empty));
        assert_eq!(recover_json("[\n", "application/json"), None);
    }

    #[test]
    fn empty_cleanup_is_not_reported() {
        assert_eq!(failure_summary(&parse_attempts("[\n")), None);
        assert_eq!(failure_summary(&parse_attempts("[ \n\n")), None);
    }

    #[test]
    fn failed_cleanup_reports_both_errors() {
        let summary = failure_summary(&parse_attempts("not json")).unwrap();
        assert!(summary.starts_with("direct: "), "got {summary}");
        assert!(summary.contains("; cleanup: "), "got {summary}");
    }

    #[test]
    fn score_coercion() {
        assert_eq!(coerce_score(&json!(87)), Some(Number::from(87)));
        assert_eq!(coerce_score(&json!(0)), Some(Number::from(0)));
        assert_eq!(coerce_score(&json!(7.5)), Number::from_f64(7.5));
        assert_eq!(coerce_score(&json!("72")), Some(Number::from(72)));
        assert_eq!(coerce_score(&json!(" 8.25 ")), Number::from_f64(8.25));
        assert_eq!(coerce_score(&json!("0")), None);
        assert_eq!(coerce_score(&json!("")), None);
        assert_eq!(coerce_score(&json!("high")), None);
        assert_eq!(coerce_score(&json!(true)), Some(Number::from(1)));
        assert_eq!(coerce_score(&json!(false)), None);
        assert_eq!(coerce_score(&json!(null)), None);
        assert_eq!(coerce_score(&json!({"value": 3})), None);
    }

    #[test]
    fn truthiness_of_wrapper() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!("text")));
    }
}
