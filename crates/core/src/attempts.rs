use std::sync::Arc;

use crate::{error::Result, store::DocumentStore, types::Attempt};

pub const ATTEMPTS: &str = "attempts";

/// Append-only log of graded attempts.
#[derive(Clone)]
pub struct AttemptStore {
    store: Arc<dyn DocumentStore>,
}

impl AttemptStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, attempt: &Attempt) -> Result<()> {
        self.store
            .append(ATTEMPTS, serde_json::to_value(attempt)?)
            .await?;
        tracing::info!(
            attempt_id = %attempt.graded.attempt_id,
            quiz_id = %attempt.graded.quiz_id,
            score = attempt.graded.score_percent,
            "Recorded attempt"
        );
        Ok(())
    }

    /// Attempts for one quiz, oldest first.
    pub async fn for_quiz(&self, quiz_id: &str) -> Result<Vec<Attempt>> {
        let mut attempts = Vec::new();
        for doc in self.store.entries(ATTEMPTS).await? {
            let attempt: Attempt = serde_json::from_value(doc)?;
            if attempt.graded.quiz_id == quiz_id {
                attempts.push(attempt);
            }
        }
        Ok(attempts)
    }
}
