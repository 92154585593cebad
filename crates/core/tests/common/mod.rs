#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ytlearner_core::{
    ChunkConfig, DocumentStore, Learner, LearnerError, MemoryStore, Result, TextGenerator,
    Transcript, TranscriptProvider, VideoSummary,
    cache::{Cache, SUMMARY_FRESHNESS},
    summary::SUMMARIES,
    types::{Segment, SummaryMethod},
};

// Every prompt opens with a fixed heading.
pub const CHUNK: &str = "Analyze the following transcript chunk";
pub const MERGE: &str = "Merge the following chunk summaries";
pub const ANALYSIS: &str = "Analyze this YouTube video";
pub const QUIZ: &str = "Based on the following video summary";
pub const REPORT: &str = "Generate a detailed learning report";

/// Replies chosen by prompt heading, embeddings by exact text.
#[derive(Default)]
pub struct FakeGenerator {
    replies: Vec<(&'static str, std::result::Result<String, String>)>,
    embeddings: HashMap<String, Vec<f64>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, heading: &'static str, body: &str) -> Self {
        self.replies.push((heading, Ok(body.to_string())));
        self
    }

    pub fn fail(mut self, heading: &'static str) -> Self {
        self.replies.push((heading, Err("scripted failure".to_string())));
        self
    }

    pub fn embedding(mut self, text: &str, vector: Vec<f64>) -> Self {
        self.embeddings.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self, heading: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with(heading))
            .count()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        // Last scripted reply for a heading wins.
        match self
            .replies
            .iter()
            .rev()
            .find(|(heading, _)| prompt.starts_with(heading))
        {
            Some((_, Ok(body))) => Ok(body.clone()),
            Some((_, Err(reason))) => Err(LearnerError::upstream("generation backend", reason.clone())),
            None => Err(LearnerError::upstream("generation backend", "unscripted prompt")),
        }
    }

    async fn embed_text(&self, text: &str) -> Option<Vec<f64>> {
        self.embeddings.get(text).cloned()
    }
}

#[derive(Default)]
pub struct FakeTranscripts {
    texts: HashMap<String, String>,
    calls: AtomicUsize,
}

impl FakeTranscripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, video_id: &str, text: &str) -> Self {
        self.texts.insert(video_id.to_string(), text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptProvider for FakeTranscripts {
    async fn get_transcript(&self, video_id: &str) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;

        let text = self
            .texts
            .get(video_id)
            .ok_or_else(|| LearnerError::not_found(format!("Transcript for video {}", video_id)))?;
        Ok(Transcript {
            transcript_text: text.clone(),
            segments: vec![Segment {
                start: 0.0,
                end: 1.0,
                text: text.clone(),
            }],
            source: "fake".to_string(),
        })
    }
}

pub struct Harness {
    pub learner: Learner,
    pub store: Arc<dyn DocumentStore>,
    pub generator: Option<Arc<FakeGenerator>>,
    pub transcripts: Arc<FakeTranscripts>,
}

pub fn harness(generator: Option<FakeGenerator>, transcripts: FakeTranscripts) -> Harness {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let generator = generator.map(Arc::new);
    let transcripts = Arc::new(transcripts);

    let learner = Learner::new(
        Arc::clone(&store),
        generator
            .clone()
            .map(|g| g as Arc<dyn TextGenerator>),
        Arc::clone(&transcripts) as Arc<dyn TranscriptProvider>,
        None,
        ChunkConfig::default(),
    );

    Harness {
        learner,
        store,
        generator,
        transcripts,
    }
}

pub fn summary(video_id: &str, generated_at: DateTime<Utc>) -> VideoSummary {
    VideoSummary {
        video_id: video_id.to_string(),
        summary: "Photosynthesis converts light energy into chemical energy.".to_string(),
        takeaways: vec!["chlorophyll".to_string(), "glucose".to_string()],
        focus: "Plant biology".to_string(),
        highlights: vec![],
        topics: vec![],
        generated_at,
        method: SummaryMethod::TranscriptChunks,
    }
}

pub async fn seed_summary(store: &Arc<dyn DocumentStore>, summary: &VideoSummary) {
    Cache::<VideoSummary>::new(Arc::clone(store), SUMMARIES, SUMMARY_FRESHNESS)
        .put(&summary.video_id, summary)
        .await
        .unwrap();
}

pub const CHUNK_REPLY: &str = r#"{"chunk_summary": "Plants capture light.", "takeaways": ["light"], "highlights": [{"text": "Light matters", "start": 4}]}"#;
pub const MERGE_REPLY: &str = r#"```json
{"summary": "Plants turn light into sugar.", "takeaways": ["light", "sugar"], "focus": "Photosynthesis"}
```"#;
