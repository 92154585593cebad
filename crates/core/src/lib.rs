pub mod attempts;
pub mod cache;
pub mod chunking;
pub mod config;
pub mod error;
pub mod format;
pub mod gateway;
pub mod grading;
pub mod learner;
pub mod output;
pub mod provider;
pub mod quiz;
pub mod report;
pub mod resources;
pub mod store;
pub mod summary;
pub mod transcript;
pub mod types;
pub mod youtube;

pub use cache::{Cache, KeyedLocks, Timestamped};
pub use chunking::{ChunkConfig, chunk_transcript};
pub use config::LearnerConfig;
pub use error::{ErrorKind, LearnerError, Result};
pub use format::{
    format_quiz_readable, format_result_readable, format_summary_readable, format_timestamp,
    format_transcript_with_timestamps,
};
pub use gateway::{ProviderGateway, TextGenerator};
pub use learner::Learner;
pub use provider::{Provider, ProviderConfig};
pub use store::{DocumentStore, FileStore, MemoryStore, StorageMode};
pub use transcript::{TranscriptProvider, YtDlpTranscriptProvider};
pub use types::{
    AnswerValue, Attempt, ClientQuestion, ClientQuiz, Question, Quiz, Report, Submission,
    SubmissionResult, SubmitRequest, Transcript, VideoSummary,
};
