//! Thin client over the Anthropic Messages API used for fact extraction,
//! evolution merges, and query rewriting. Supports both the OAuth-token and
//! API-key tiers detected by [`crate::backend`]; Ollama goes through a
//! separate, much simpler completion call since it only needs to run
//! locally-hosted small models.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::backend::{DetectedBackend, Tier};
use crate::config::LLM_TIMEOUT_SECS;
use crate::error::{CoreError, Result};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OAUTH_BETA_HEADER: &str = "oauth-2025-04-20";
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f64 = 0.1;

#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    backend: DetectedBackend,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl LlmClient {
    pub fn new(backend: DetectedBackend) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(LLM_TIMEOUT_SECS))
                .build()
                .expect("reqwest client"),
            backend,
        }
    }

    pub fn extraction_enabled(&self) -> bool {
        self.backend.extraction_enabled()
    }

    /// Single free-text completion call. `system` may be empty.
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        match self.backend.tier {
            Tier::AnthropicOAuth | Tier::AnthropicApiKey => self.complete_anthropic(system, prompt).await,
            Tier::Ollama => self.complete_ollama(system, prompt).await,
            Tier::None => Err(CoreError::Llm("no llm backend available".to_string())),
        }
    }

    async fn complete_anthropic(&self, system: &str, prompt: &str) -> Result<String> {
        let model = self
            .backend
            .model
            .as_deref()
            .ok_or_else(|| CoreError::Llm("no model selected for anthropic tier".to_string()))?;

        let mut req = self
            .client
            .post(ANTHROPIC_BASE_URL)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": model,
                "max_tokens": MAX_TOKENS,
                "temperature": TEMPERATURE,
                "system": system,
                "messages": [{"role": "user", "content": prompt}],
            }));

        req = match self.backend.tier {
            Tier::AnthropicOAuth => {
                let token = self
                    .backend
                    .oauth_token
                    .as_deref()
                    .ok_or_else(|| CoreError::Llm("oauth tier missing token".to_string()))?;
                req.bearer_auth(token)
                    .header("anthropic-beta", OAUTH_BETA_HEADER)
            }
            Tier::AnthropicApiKey => {
                let key = self
                    .backend
                    .api_key
                    .as_deref()
                    .ok_or_else(|| CoreError::Llm("api key tier missing key".to_string()))?;
                req.header("x-api-key", key)
            }
            _ => unreachable!(),
        };

        let resp = req
            .send()
            .await
            .map_err(|e| CoreError::Llm(format!("anthropic request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(CoreError::Llm(format!(
                "anthropic request returned {}",
                resp.status()
            )));
        }

        let parsed: AnthropicResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Llm(format!("anthropic response decode failed: {e}")))?;

        Ok(parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    async fn complete_ollama(&self, system: &str, prompt: &str) -> Result<String> {
        let model = self
            .backend
            .model
            .as_deref()
            .ok_or_else(|| CoreError::Llm("no model selected for ollama tier".to_string()))?;
        let full_prompt = if system.is_empty() {
            prompt.to_string()
        } else {
            format!("{system}\n\n{prompt}")
        };

        let resp = self
            .client
            .post("http://localhost:11434/api/generate")
            .json(&json!({
                "model": model,
                "prompt": full_prompt,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|e| CoreError::Llm(format!("ollama request failed: {e}")))?;

        let parsed: OllamaGenerateResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Llm(format!("ollama response decode failed: {e}")))?;

        Ok(parsed.response)
    }
}
