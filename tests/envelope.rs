use std::cell::RefCell;

use prompt_lens::config::{Config, Mode};
use prompt_lens::envelope::{handle, Body, Strategy, Upstream, UpstreamResponse};
use prompt_lens::{Error, Language, Result};

struct FakeUpstream {
    status: u16,
    content_type: &'static str,
    body: &'static str,
    sent: RefCell<Vec<String>>,
}

impl FakeUpstream {
    fn new(status: u16, content_type: &'static str, body: &'static str) -> Self {
        Self {
            status,
            content_type,
            body,
            sent: RefCell::new(Vec::new()),
        }
    }
}

impl Upstream for FakeUpstream {
    fn forward(&self, prompt: &str) -> Result<UpstreamResponse> {
        self.sent.borrow_mut().push(prompt.to_string());
        Ok(UpstreamResponse {
            status: self.status,
            content_type: self.content_type.to_string(),
            body: self.body.to_string(),
        })
    }
}

struct DownUpstream;

impl Upstream for DownUpstream {
    fn forward(&self, _prompt: &str) -> Result<UpstreamResponse> {
        Err(Error::Upstream("connection refused".to_string()))
    }
}

#[test]
fn local_strategy_wraps_analysis() {
    let reply = handle(&Strategy::Local(Language::En), Some("sunset over mountains")).unwrap();
    assert_eq!(reply.status, 200);
    assert!(reply.is_success());

    let Body::Local(envelope) = &reply.body else {
        panic!("expected a local envelope, got {:?}", reply.body);
    };
    assert_eq!(envelope.kind, "prompt-only");
    assert_eq!(envelope.prompt, "sunset over mountains");
    assert_eq!(envelope.analysis.word_count, 3);
    assert_eq!(envelope.metadata.source, None);

    let rendered: serde_json::Value = serde_json::from_str(&reply.render().unwrap()).unwrap();
    assert_eq!(rendered["type"], "prompt-only");
    assert!(rendered["metadata"]["evaluatedAt"].is_string());
    assert!(rendered["metadata"].get("source").is_none());
    assert_eq!(rendered["analysis"]["wordCount"], 3);
}

#[test]
fn local_strategy_treats_missing_prompt_as_empty() {
    let reply = handle(&Strategy::Local(Language::Es), None).unwrap();
    let Body::Local(envelope) = reply.body else {
        panic!("expected a local envelope");
    };
    assert_eq!(envelope.prompt, "");
    assert_eq!(envelope.analysis.prompt_quality_score, 0);
    assert!(envelope.analysis.suggestions[0].starts_with("Proporciona"));
}

#[test]
fn remote_strategy_maps_wrapped_reply() {
    let upstream = FakeUpstream::new(
        201,
        "application/json",
        r#"{"output":{"puntuacion":88,"consejos_de_mejora":["Name a lens"]}}"#,
    );
    let reply = handle(&Strategy::Remote(&upstream), Some("misty harbor at dawn")).unwrap();
    assert_eq!(upstream.sent.borrow().as_slice(), ["misty harbor at dawn"]);
    assert_eq!(reply.status, 201);

    let rendered: serde_json::Value = serde_json::from_str(&reply.render().unwrap()).unwrap();
    assert_eq!(rendered["type"], "prompt-only");
    assert_eq!(rendered["prompt"], "misty harbor at dawn");
    assert_eq!(rendered["metadata"]["source"], "n8n");
    assert_eq!(rendered["analysis"]["promptQualityScore"], 88);
    assert_eq!(rendered["analysis"]["wordCount"], 4);
    assert_eq!(rendered["analysis"]["suggestions"][0], "Name a lens");
}

#[test]
fn remote_strategy_passes_unwrapped_json_through() {
    let upstream = FakeUpstream::new(200, "application/json", r#"{"message":"queued"}"#);
    let reply = handle(&Strategy::Remote(&upstream), Some("harbor")).unwrap();
    assert!(matches!(&reply.body, Body::Json(value) if value["message"] == "queued"));
}

#[test]
fn remote_strategy_relays_unparseable_text_with_status() {
    let upstream = FakeUpstream::new(502, "application/json", "<html>Bad Gateway</html>");
    let reply = handle(&Strategy::Remote(&upstream), Some("harbor")).unwrap();
    assert_eq!(reply.status, 502);
    assert!(!reply.is_success());
    assert_eq!(reply.render().unwrap(), "<html>Bad Gateway</html>");
}

#[test]
fn remote_strategy_relays_plain_text() {
    let upstream = FakeUpstream::new(200, "text/plain", "Workflow accepted");
    let reply = handle(&Strategy::Remote(&upstream), Some("harbor")).unwrap();
    assert!(matches!(&reply.body, Body::Text(text) if text == "Workflow accepted"));
}

#[test]
fn transport_failures_propagate() {
    let err = handle(&Strategy::Remote(&DownUpstream), Some("harbor")).unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
}

#[test]
fn config_selects_remote_strategy() {
    let config = Config {
        mode: Mode::Remote,
        webhook_url: Some("https://hooks.example.com/analyze".to_string()),
        ..Config::default()
    };
    let upstream = FakeUpstream::new(200, "application/json", r#"{"output":{"puntuacion":50}}"#);
    let strategy = config.strategy(Some(&upstream as &dyn Upstream)).unwrap();
    let reply = handle(&strategy, Some("harbor")).unwrap();
    assert!(matches!(reply.body, Body::Remote(_)));
}
