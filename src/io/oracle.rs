//! Oracle abstraction over language model backends.
//!
//! The [`Oracle`] trait decouples the reasoning loop from the model backend.
//! Tests use scripted oracles that replay predetermined replies without any
//! network traffic; the production implementation is [`HttpOracle`], a
//! blocking provider-fallback client.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::io::config::OracleConfig;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A blocking text-in/text-out language model collaborator.
///
/// Implementations may return empty strings, prose, or malformed structured
/// text; callers never assume well-formed replies.
pub trait Oracle {
    /// Send one prompt and wait for the full reply text.
    fn ask(&self, prompt: &str) -> Result<String>;
}

/// Oracle backed by HTTP model providers, tried in a fixed order.
///
/// Ollama is the primary backend; OpenAI and Anthropic are fallbacks used
/// only when their API keys are present in the environment. The first
/// provider that returns a reply wins; all providers failing is an error the
/// reasoning loop recovers from.
pub struct HttpOracle {
    config: OracleConfig,
    client: reqwest::blocking::Client,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("build http client")?;
        Ok(Self { config, client })
    }

    fn ask_ollama(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/api/generate",
            self.config.ollama.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.ollama.model,
            "prompt": prompt,
            "stream": false,
            // Low temperature keeps operation selection consistent.
            "options": {
                "temperature": 0.1,
                "top_p": 0.9,
                "top_k": 40,
                "repeat_penalty": 1.1,
                "num_predict": 2048,
            },
        });
        let reply: serde_json::Value = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.ollama.timeout_secs))
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;
        reply_text(&reply, "/response", "ollama")
    }

    fn ask_openai(&self, prompt: &str, api_key: &str) -> Result<String> {
        let body = json!({
            "model": self.config.openai.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 2000,
            "temperature": 0.1,
        });
        let reply: serde_json::Value = self
            .client
            .post(OPENAI_URL)
            .timeout(Duration::from_secs(self.config.openai.timeout_secs))
            .bearer_auth(api_key)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;
        reply_text(&reply, "/choices/0/message/content", "openai")
    }

    fn ask_anthropic(&self, prompt: &str, api_key: &str) -> Result<String> {
        let body = json!({
            "model": self.config.anthropic.model,
            "max_tokens": 2000,
            "messages": [{"role": "user", "content": prompt}],
        });
        let reply: serde_json::Value = self
            .client
            .post(ANTHROPIC_URL)
            .timeout(Duration::from_secs(self.config.anthropic.timeout_secs))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;
        reply_text(&reply, "/content/0/text", "anthropic")
    }
}

impl Oracle for HttpOracle {
    #[instrument(skip_all, fields(prompt_bytes = prompt.len()))]
    fn ask(&self, prompt: &str) -> Result<String> {
        match self.ask_ollama(prompt) {
            Ok(reply) => {
                debug!(model = %self.config.ollama.model, "ollama replied");
                return Ok(reply);
            }
            Err(err) => warn!(error = %err, "ollama failed"),
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            match self.ask_openai(prompt, &api_key) {
                Ok(reply) => {
                    debug!(model = %self.config.openai.model, "openai replied");
                    return Ok(reply);
                }
                Err(err) => warn!(error = %err, "openai failed"),
            }
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            match self.ask_anthropic(prompt, &api_key) {
                Ok(reply) => {
                    debug!(model = %self.config.anthropic.model, "anthropic replied");
                    return Ok(reply);
                }
                Err(err) => warn!(error = %err, "anthropic failed"),
            }
        }

        Err(anyhow!("no oracle provider produced a reply"))
    }
}

/// Pull the reply text out of a provider response body.
fn reply_text(reply: &serde_json::Value, pointer: &str, provider: &str) -> Result<String> {
    reply
        .pointer(pointer)
        .and_then(|value| value.as_str())
        .map(|text| text.trim().to_string())
        .ok_or_else(|| anyhow!("unexpected {provider} response shape"))
}
