use thiserror::Error;

/// Coarse classification callers branch on. Every [`LearnerError`] maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested quiz/video is absent from cache and cannot be recovered.
    NotFound,
    /// A collaborator (generation backend, transcript provider, store, video API) failed.
    UpstreamUnavailable,
    /// The request itself is invalid.
    Invalid,
}

#[derive(Error, Debug)]
pub enum LearnerError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: &'static str, reason: String },

    #[error("Malformed model output: {}", preview(raw))]
    MalformedOutput { raw: String },

    #[error("Invalid request: {reason}")]
    Invalid { reason: String },

    #[error("Storage failure: {reason}")]
    Storage { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

impl LearnerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn upstream(service: &'static str, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LearnerError::NotFound { .. } => ErrorKind::NotFound,
            LearnerError::Invalid { .. } => ErrorKind::Invalid,
            LearnerError::UpstreamUnavailable { .. }
            | LearnerError::MalformedOutput { .. }
            | LearnerError::Storage { .. }
            | LearnerError::IoError(_)
            | LearnerError::JsonError(_)
            | LearnerError::ApiError(_) => ErrorKind::UpstreamUnavailable,
        }
    }

    /// Storage failures are internal faults rather than a flaky upstream.
    pub fn is_storage(&self) -> bool {
        matches!(self, LearnerError::Storage { .. } | LearnerError::IoError(_))
    }
}

fn preview(raw: &str) -> String {
    truncate_chars(raw, 200).to_string()
}

/// Char-boundary safe prefix of at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub type Result<T> = std::result::Result<T, LearnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_output_counts_as_upstream_failure() {
        let err = LearnerError::MalformedOutput {
            raw: "not json".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn not_found_is_distinct_from_upstream() {
        assert_eq!(LearnerError::not_found("Quiz abc").kind(), ErrorKind::NotFound);
        assert_eq!(
            LearnerError::upstream("generation backend", "timeout").kind(),
            ErrorKind::UpstreamUnavailable
        );
        assert_eq!(LearnerError::invalid("topic").kind(), ErrorKind::Invalid);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
