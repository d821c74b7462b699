use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::envelope::{Strategy, Upstream};
use crate::error::{Error, Result};
use crate::Language;

pub const ENV_MODE: &str = "PROMPT_LENS_MODE";
pub const ENV_WEBHOOK_URL: &str = "PROMPT_LENS_WEBHOOK_URL";
pub const ENV_LANGUAGE: &str = "PROMPT_LENS_LANGUAGE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    /// Provider endpoint. The crate never dials it; the embedding service's
    /// [`Upstream`] implementation reads it through [`Config::webhook_target`].
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Forwarding timeout for that same `Upstream` implementation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub language: Language,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
            language: Language::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookTarget<'a> {
    pub url: &'a str,
    pub timeout: Duration,
}

fn default_timeout_secs() -> u64 {
    30
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load config from the given path, or return defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.webhook_url = config.webhook_url.take().map(|url| trim_url(&url));
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlays non-blank values from `lookup`, keyed by the `PROMPT_LENS_*` names.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = non_blank(lookup(ENV_MODE)) {
            self.mode = match mode.to_ascii_lowercase().as_str() {
                "local" | "server" => Mode::Local,
                "remote" | "n8n" => Mode::Remote,
                other => {
                    return Err(Error::Config(format!(
                        "{ENV_MODE}: unknown mode '{other}' (expected local or remote)"
                    )))
                }
            };
        }
        if let Some(url) = non_blank(lookup(ENV_WEBHOOK_URL)) {
            self.webhook_url = Some(trim_url(&url));
        }
        if let Some(language) = non_blank(lookup(ENV_LANGUAGE)) {
            self.language = language
                .parse()
                .map_err(|e| Error::Config(format!("{ENV_LANGUAGE}: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == Mode::Remote && non_blank(self.webhook_url.clone()).is_none() {
            return Err(Error::Config("webhook_url is not configured".to_string()));
        }
        Ok(())
    }

    /// Endpoint and timeout for forwarding prompts to the provider.
    pub fn webhook_target(&self) -> Option<WebhookTarget<'_>> {
        let url = self.webhook_url.as_deref().map(str::trim)?;
        if url.is_empty() {
            return None;
        }
        Some(WebhookTarget {
            url,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }

    /// Picks the analysis strategy for this config. Remote mode needs the
    /// caller's transport.
    pub fn strategy<'a>(&self, upstream: Option<&'a dyn Upstream>) -> Result<Strategy<'a>> {
        match self.mode {
            Mode::Local => Ok(Strategy::Local(self.language)),
            Mode::Remote => {
                self.validate()?;
                upstream.map(Strategy::Remote).ok_or_else(|| {
                    Error::Config("remote mode requires an upstream transport".to_string())
                })
            }
        }
    }
}

fn trim_url(url: &str) -> String {
    let url = url.trim();
    url.strip_suffix('/').unwrap_or(url).to_string()
}
