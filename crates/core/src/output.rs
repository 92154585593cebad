//! Parsing of free-form generation output into typed values.

use serde::de::DeserializeOwned;

/// Result of interpreting a generation backend response as `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput<T> {
    Parsed(T),
    /// Carries the cleaned raw text so callers can salvage something from it.
    Malformed(String),
}

impl<T> ModelOutput<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            ModelOutput::Parsed(value) => Some(value),
            ModelOutput::Malformed(_) => None,
        }
    }
}

/// Strip markdown code fences and surrounding whitespace.
pub fn clean_json_response(text: &str) -> &str {
    let text = text.trim();

    let fenced = text
        .split_once("```json")
        .or_else(|| text.split_once("```"))
        .map(|(_, rest)| rest);

    match fenced {
        Some(rest) => rest.split_once("```").map_or(rest, |(inner, _)| inner).trim(),
        None => text,
    }
}

pub fn parse_model_output<T: DeserializeOwned>(raw: &str) -> ModelOutput<T> {
    let cleaned = clean_json_response(raw);
    match serde_json::from_str::<T>(cleaned) {
        Ok(value) => ModelOutput::Parsed(value),
        Err(e) => {
            tracing::debug!(error = %e, "Model output did not match expected shape");
            ModelOutput::Malformed(cleaned.to_string())
        }
    }
}
