use std::path::PathBuf;

use crate::{
    chunking::ChunkConfig,
    error::{LearnerError, Result},
    provider::Provider,
};

pub const PROVIDER_ENV: &str = "LLM_PROVIDER";
pub const MODEL_ENV: &str = "LLM_MODEL";
pub const YOUTUBE_KEY_ENV: &str = "YOUTUBE_API_KEY";
pub const DATA_DIR_ENV: &str = "YTLEARNER_DATA_DIR";

/// Runtime configuration resolved once per process.
#[derive(Debug, Clone, Default)]
pub struct LearnerConfig {
    pub provider: Provider,
    pub model: Option<String>,
    /// `None` means the generation backend is absent and every fallback path engages.
    pub api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    /// `None` selects the process-local store.
    pub data_dir: Option<PathBuf>,
    pub chunking: ChunkConfig,
}

impl LearnerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match non_empty(PROVIDER_ENV) {
            Some(name) => name
                .parse::<Provider>()
                .map_err(|e| LearnerError::invalid(e.to_string()))?,
            None => Provider::default(),
        };

        let api_key = non_empty(provider.config().env_var);
        if api_key.is_none() {
            tracing::warn!(
                provider = provider.name(),
                env_var = provider.config().env_var,
                "No API key configured, generation backend disabled (fallbacks only)"
            );
        }

        Ok(Self {
            provider,
            model: non_empty(MODEL_ENV),
            api_key,
            youtube_api_key: non_empty(YOUTUBE_KEY_ENV),
            data_dir: non_empty(DATA_DIR_ENV).map(PathBuf::from),
            chunking: ChunkConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_gemini_without_backend() {
        let config = LearnerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, Provider::Gemini);
        assert!(config.api_key.is_none());
        assert!(config.data_dir.is_none());
        assert_eq!(config.chunking.chunk_size, 2000);
        assert_eq!(config.chunking.overlap, 50);
    }

    #[test]
    fn picks_key_for_selected_provider() {
        let config = LearnerConfig::from_lookup(lookup(&[
            ("LLM_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
            ("GEMINI_API_KEY", "ignored"),
            ("YTLEARNER_DATA_DIR", "/var/lib/ytlearner"),
        ]))
        .unwrap();
        assert_eq!(config.provider, Provider::Openai);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/ytlearner")));
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let config =
            LearnerConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  "), ("LLM_MODEL", "")]))
                .unwrap();
        assert!(config.api_key.is_none());
        assert!(config.model.is_none());
    }

    #[test]
    fn unknown_provider_is_invalid() {
        let err = LearnerConfig::from_lookup(lookup(&[("LLM_PROVIDER", "nope")])).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Invalid);
    }
}
