//! Embedding provider: Voyage AI's OpenAI-compatible endpoint.

use serde::Deserialize;
use std::time::Duration;

use crate::config::LLM_TIMEOUT_SECS;
use crate::error::{CoreError, Result};

pub const EMBEDDING_MODEL: &str = "voyage-3-large";
pub const EMBEDDING_DIM: usize = 1024;
const VOYAGE_BASE_URL: &str = "https://api.voyageai.com/v1";

#[derive(Clone)]
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(LLM_TIMEOUT_SECS))
                .build()
                .expect("reqwest client"),
            api_key,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| CoreError::Llm("embedding response had no vectors".to_string()))
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post(format!("{VOYAGE_BASE_URL}/embeddings"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "input": texts,
                "model": EMBEDDING_MODEL,
            }))
            .send()
            .await
            .map_err(|e| CoreError::Llm(format!("embedding request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(CoreError::Llm(format!(
                "embedding request returned {}",
                resp.status()
            )));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Llm(format!("embedding response decode failed: {e}")))?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
