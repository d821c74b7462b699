//! Response envelope and request handling.
//!
//! Whether a prompt is analyzed locally or by a remote provider is decided by
//! the caller through [`Strategy`]. The transport to the provider sits behind
//! [`Upstream`], so this module performs no I/O of its own.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::normalize::{self, Normalized, RemoteAnalysis};
use crate::{analyze_with, AnalysisResult, Language};

const ENVELOPE_KIND: &str = "prompt-only";

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<A> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub prompt: String,
    pub analysis: A,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub evaluated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
}

impl<A> Envelope<A> {
    fn new(prompt: &str, analysis: A, source: Option<&'static str>) -> Self {
        Self {
            kind: ENVELOPE_KIND,
            prompt: prompt.to_string(),
            analysis,
            metadata: Metadata {
                evaluated_at: Utc::now(),
                source,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Local(Envelope<AnalysisResult>),
    Remote(Envelope<RemoteAnalysis>),
    Json(Value),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Body,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Pretty JSON for structured bodies, the text unchanged otherwise.
    pub fn render(&self) -> Result<String> {
        let rendered = match &self.body {
            Body::Local(envelope) => serde_json::to_string_pretty(envelope)?,
            Body::Remote(envelope) => serde_json::to_string_pretty(envelope)?,
            Body::Json(value) => serde_json::to_string_pretty(value)?,
            Body::Text(text) => text.clone(),
        };
        Ok(rendered)
    }
}

/// What a provider sent back, already read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

pub trait Upstream {
    fn forward(&self, prompt: &str) -> Result<UpstreamResponse>;
}

pub enum Strategy<'a> {
    Local(Language),
    Remote(&'a dyn Upstream),
}

/// Answers one analysis request. Only transport failures from the upstream
/// surface as errors; parsing problems degrade to pass-through or raw text.
pub fn handle(strategy: &Strategy<'_>, prompt: Option<&str>) -> Result<Reply> {
    let prompt = prompt.unwrap_or("");
    match strategy {
        Strategy::Local(language) => {
            let analysis = analyze_with(prompt, *language);
            Ok(Reply {
                status: 200,
                body: Body::Local(Envelope::new(prompt, analysis, None)),
            })
        }
        Strategy::Remote(upstream) => {
            let response = upstream.forward(prompt)?;
            debug!(
                "upstream replied status={} content_type={}",
                response.status, response.content_type
            );
            Ok(remote_reply(response, prompt))
        }
    }
}

fn remote_reply(response: UpstreamResponse, prompt: &str) -> Reply {
    let status = response.status;
    let body = match normalize::normalize(&response.body, &response.content_type, prompt) {
        Normalized::Analysis(analysis) => {
            Body::Remote(Envelope::new(prompt, analysis, Some(normalize::SOURCE)))
        }
        Normalized::PassThrough(value) => Body::Json(value),
        Normalized::Unparseable => {
            warn!("relaying unparseable upstream reply as text (status={status})");
            Body::Text(response.body)
        }
        Normalized::NotJson => Body::Text(response.body),
    };
    Reply { status, body }
}
