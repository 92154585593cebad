use async_trait::async_trait;

use crate::{
    error::{LearnerError, Result, truncate_chars},
    provider::Provider,
};

const SERVICE: &str = "generation backend";

/// Stateless request/response access to a generative text + embedding backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// `None` when the backend cannot embed (unsupported, failed, empty result).
    async fn embed_text(&self, text: &str) -> Option<Vec<f64>>;
}

/// [`TextGenerator`] speaking the OpenAI-compatible chat/embeddings API of a [`Provider`].
pub struct ProviderGateway {
    client: reqwest::Client,
    provider: Provider,
    api_key: String,
    model: String,
}

impl ProviderGateway {
    pub fn new(provider: Provider, api_key: String, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| provider.config().model.to_string());
        tracing::info!(provider = provider.name(), %model, "Initialized generation backend");
        Self {
            client: reqwest::Client::new(),
            provider,
            api_key,
            model,
        }
    }

    async fn request_embedding(&self, url: &str, model: &str, text: &str) -> Result<Vec<f64>> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": model,
                "input": text,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let embedding: Vec<f64> = response["data"][0]["embedding"]
            .as_array()
            .map(|values| values.iter().filter_map(|v| v.as_f64()).collect())
            .unwrap_or_default();

        if embedding.is_empty() {
            return Err(LearnerError::upstream(SERVICE, "Embedding response had no vector"));
        }
        Ok(embedding)
    }
}

#[async_trait]
impl TextGenerator for ProviderGateway {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let config = self.provider.config();

        let response = self
            .client
            .post(config.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": &self.model,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt,
                    },
                ],
                "temperature": 0.3,
            }))
            .send()
            .await
            .map_err(|e| LearnerError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Generation request failed");
            return Err(LearnerError::upstream(
                SERVICE,
                format!("HTTP {}: {}", status, truncate_chars(&body, 300)),
            ));
        }

        let response = response.json::<serde_json::Value>().await?;

        // Extract content from response
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                LearnerError::upstream(SERVICE, format!("Invalid API response: {}", response))
            })?;

        tracing::debug!(preview = truncate_chars(content, 200), "Raw generation output");
        Ok(content.to_string())
    }

    async fn embed_text(&self, text: &str) -> Option<Vec<f64>> {
        let config = self.provider.config();
        let (url, model) = config.embeddings_url.zip(config.embedding_model)?;

        match self.request_embedding(url, model, text).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                tracing::warn!(error = %e, "Embedding request failed");
                None
            }
        }
    }
}
