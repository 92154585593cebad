use std::sync::Arc;

use crate::{
    attempts::AttemptStore,
    chunking::ChunkConfig,
    config::LearnerConfig,
    error::{LearnerError, Result},
    gateway::{ProviderGateway, TextGenerator},
    grading::GradingEngine,
    quiz::QuizService,
    report::ReportGenerator,
    resources::{LearningResources, recommend_resources, validate_topic},
    store::{DocumentStore, FileStore, MemoryStore, StorageMode},
    summary::SummaryService,
    transcript::{TranscriptProvider, YtDlpTranscriptProvider},
    types::{Attempt, ClientQuiz, Submission, SubmissionResult, Transcript, VideoSummary},
    youtube::{SearchResult, VideoMetadata, YouTubeClient},
};

/// Every service, wired once per process over one shared store.
pub struct Learner {
    store: Arc<dyn DocumentStore>,
    generator: Option<Arc<dyn TextGenerator>>,
    summaries: Arc<SummaryService>,
    quizzes: Arc<QuizService>,
    grading: GradingEngine,
    youtube: YouTubeClient,
}

/// Pick the persistent store when a data dir is configured, else the in-memory one.
pub async fn open_store(config: &LearnerConfig) -> Result<Arc<dyn DocumentStore>> {
    match &config.data_dir {
        Some(dir) => Ok(Arc::new(FileStore::open(dir.clone()).await?)),
        None => {
            tracing::warn!(
                "YTLEARNER_DATA_DIR not set, using in-memory storage (degraded: data is lost on restart)"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

impl Learner {
    pub async fn from_config(config: &LearnerConfig) -> Result<Self> {
        let store = open_store(config).await?;
        let generator = config.api_key.clone().map(|key| {
            Arc::new(ProviderGateway::new(config.provider, key, config.model.clone()))
                as Arc<dyn TextGenerator>
        });

        Ok(Self::new(
            store,
            generator,
            Arc::new(YtDlpTranscriptProvider::new()),
            config.youtube_api_key.clone(),
            config.chunking,
        ))
    }

    pub fn new(
        store: Arc<dyn DocumentStore>,
        generator: Option<Arc<dyn TextGenerator>>,
        transcripts: Arc<dyn TranscriptProvider>,
        youtube_api_key: Option<String>,
        chunking: ChunkConfig,
    ) -> Self {
        let summaries = Arc::new(SummaryService::new(
            generator.clone(),
            transcripts,
            Arc::clone(&store),
            chunking,
        ));
        let quizzes = Arc::new(QuizService::new(
            generator.clone(),
            Arc::clone(&summaries),
            Arc::clone(&store),
        ));
        let grading = GradingEngine::new(
            generator.clone(),
            Arc::clone(&quizzes),
            Arc::clone(&summaries),
            ReportGenerator::new(generator.clone()),
            AttemptStore::new(Arc::clone(&store)),
        );
        let youtube = YouTubeClient::new(youtube_api_key, Arc::clone(&store));

        Self {
            store,
            generator,
            summaries,
            quizzes,
            grading,
            youtube,
        }
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.store.mode()
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn transcript(&self, video_id: &str) -> Result<Transcript> {
        self.summaries.transcripts().get_transcript(video_id).await
    }

    pub async fn summary(&self, video_id: &str) -> Result<VideoSummary> {
        self.summaries.get_or_generate(video_id).await
    }

    pub async fn quiz(&self, video_id: &str, num_mcq: u32, num_short: u32) -> Result<ClientQuiz> {
        self.quizzes.get_or_generate(video_id, num_mcq, num_short).await
    }

    pub async fn submit(&self, quiz_id: &str, submission: &Submission) -> Result<SubmissionResult> {
        self.grading.submit(quiz_id, submission).await
    }

    pub async fn attempts(&self, quiz_id: &str) -> Result<Vec<Attempt>> {
        self.grading.attempts().for_quiz(quiz_id).await
    }

    pub async fn resources(&self, topic: &str) -> Result<LearningResources> {
        let topic = validate_topic(topic)?;
        let generator = self.generator.as_deref().ok_or_else(|| {
            LearnerError::upstream("generation backend", "no generation backend configured")
        })?;
        recommend_resources(generator, topic).await
    }

    pub async fn metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        self.youtube.metadata(video_id).await
    }

    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>> {
        self.youtube.search(query, max_results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn store_follows_data_dir() {
        let memory = open_store(&LearnerConfig::default()).await.unwrap();
        assert_eq!(memory.mode(), StorageMode::Memory);

        let dir = tempfile::tempdir().unwrap();
        let config = LearnerConfig {
            data_dir: Some(dir.path().join("data")),
            ..Default::default()
        };
        let persistent = open_store(&config).await.unwrap();
        assert_eq!(persistent.mode(), StorageMode::Persistent);
        assert!(dir.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn resources_need_a_backend() {
        let learner = Learner::from_config(&LearnerConfig::default()).await.unwrap();
        assert!(!learner.has_generator());
        let err = learner.resources("Rust").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);

        let err = learner.resources(" x ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }
}
