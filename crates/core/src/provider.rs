use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing API key for {provider_name}: {env_var} is not set")]
    MissingApiKey {
        provider_name: String,
        env_var: String,
    },

    #[error("Unknown provider '{0}' (expected gemini, openai or grok)")]
    Unknown(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Openai,
    Grok,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    /// OpenAI-compatible embeddings endpoint, if the provider offers one.
    pub embeddings_url: Option<&'static str>,
    pub model: &'static str,
    pub embedding_model: Option<&'static str>,
    pub env_var: &'static str,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                embeddings_url: Some(
                    "https://generativelanguage.googleapis.com/v1beta/openai/embeddings",
                ),
                model: "gemini-1.5-flash",
                embedding_model: Some("text-embedding-004"),
                env_var: "GEMINI_API_KEY",
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                embeddings_url: Some("https://api.openai.com/v1/embeddings"),
                model: "gpt-4o-mini",
                embedding_model: Some("text-embedding-3-small"),
                env_var: "OPENAI_API_KEY",
            },
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                embeddings_url: None,
                model: "grok-4-fast",
                embedding_model: None,
                env_var: "XAI_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Openai => "OpenAI",
            Provider::Grok => "Grok",
        }
    }

    /// Validate that the API key is set for this provider
    pub fn validate_api_key(&self) -> Result<String, ProviderError> {
        let config = self.config();
        match std::env::var(config.env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ProviderError::MissingApiKey {
                provider_name: self.name().to_string(),
                env_var: config.env_var.to_string(),
            }),
        }
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::Openai),
            "grok" | "xai" => Ok(Provider::Grok),
            other => Err(ProviderError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("Gemini".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!(" openai ".parse::<Provider>().unwrap(), Provider::Openai);
        assert_eq!("xai".parse::<Provider>().unwrap(), Provider::Grok);
        assert!("claude".parse::<Provider>().is_err());
    }

    #[test]
    fn grok_has_no_embeddings_endpoint() {
        let config = Provider::Grok.config();
        assert!(config.embeddings_url.is_none());
        assert!(config.embedding_model.is_none());
    }
}
