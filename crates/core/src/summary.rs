//! Chunk-summarize-merge pipeline and the summary cache in front of it.
//!
//! A transcript is split into overlapping word windows ([`crate::chunking`]), each window is
//! summarized on its own, and the chunk summaries are merged into one [`VideoSummary`]. Chunks
//! that fail are skipped; only a run where every chunk fails is an error. When no transcript can
//! be fetched the backend is asked to analyze the video from its URL instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;

use crate::{
    cache::{Cache, KeyedLocks, SUMMARY_FRESHNESS, Timestamped},
    chunking::{ChunkConfig, chunk_transcript},
    error::{LearnerError, Result, truncate_chars},
    gateway::TextGenerator,
    output::{ModelOutput, parse_model_output},
    store::DocumentStore,
    transcript::{TranscriptProvider, watch_url},
    types::{ChunkSummary, Highlight, SummaryMethod, VideoSummary},
};

pub const SUMMARIES: &str = "summaries";

const SERVICE: &str = "generation backend";
const MAX_HIGHLIGHTS: usize = 10;
const SALVAGED_TAKEAWAYS: usize = 5;
const NO_OUTPUT: &str = "Failed to generate summary";

impl Timestamped for VideoSummary {
    fn timestamp(&self) -> DateTime<Utc> {
        self.generated_at
    }
}

fn chunk_prompt(chunk_text: &str) -> String {
    format!(
        r#"Analyze the following transcript chunk and provide a structured summary in JSON format.

Transcript:
{chunk_text}

Respond with ONLY a valid JSON object (no markdown, no code fences) with this structure:
{{
  "chunk_summary": "A concise 2-3 sentence summary of the main points",
  "takeaways": ["key point 1", "key point 2", "key point 3"],
  "highlights": [{{"text": "important quote or fact", "start": 0}}]
}}
"#
    )
}

fn merge_prompt(chunks: &[ChunkSummary]) -> String {
    let chunk_summaries = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "Chunk {}:\nSummary: {}\nTakeaways: {}",
                i + 1,
                chunk.chunk_summary,
                chunk.takeaways.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Merge the following chunk summaries into a comprehensive final summary in JSON format.

Chunk Summaries:
{chunk_summaries}

Respond with ONLY a valid JSON object (no markdown, no code fences) with this structure:
{{
  "summary": "A comprehensive 3-5 sentence summary of the entire video",
  "takeaways": ["main takeaway 1", "main takeaway 2", "main takeaway 3"],
  "focus": "The primary focus or theme of the video in one sentence"
}}
"#
    )
}

fn video_analysis_prompt(video_url: &str) -> String {
    format!(
        r#"Analyze this YouTube video and provide a comprehensive summary in JSON format.

Video URL: {video_url}

Provide a detailed analysis covering:
1. Main topics and themes discussed
2. Key points and takeaways
3. Important concepts explained
4. Overall focus and purpose of the video

Respond with ONLY a valid JSON object (no markdown, no code fences) with this structure:
{{
  "summary": "A comprehensive 4-6 sentence summary of the entire video",
  "takeaways": ["main takeaway 1", "main takeaway 2", "main takeaway 3", "main takeaway 4"],
  "focus": "The primary focus or theme of the video in one sentence",
  "topics": ["topic 1", "topic 2", "topic 3"]
}}
"#
    )
}

#[derive(Debug, Default, Deserialize)]
struct MergedSummary {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    takeaways: Vec<String>,
    #[serde(default)]
    focus: String,
}

#[derive(Debug, Default, Deserialize)]
struct VideoAnalysis {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    takeaways: Vec<String>,
    #[serde(default)]
    focus: String,
    #[serde(default)]
    topics: Vec<String>,
}

fn salvage(raw: &str, max_chars: usize) -> String {
    if raw.trim().is_empty() {
        NO_OUTPUT.to_string()
    } else {
        truncate_chars(raw, max_chars).to_string()
    }
}

/// Summarize one chunk. Backend errors propagate; unparsable output is salvaged.
pub async fn summarize_chunk(generator: &dyn TextGenerator, chunk_text: &str) -> Result<ChunkSummary> {
    tracing::debug!(chars = chunk_text.len(), "Summarizing chunk");
    let raw = generator.generate_text(&chunk_prompt(chunk_text)).await?;

    Ok(match parse_model_output::<ChunkSummary>(&raw) {
        ModelOutput::Parsed(summary) => summary,
        ModelOutput::Malformed(cleaned) => {
            tracing::warn!("Chunk summary was not valid JSON, keeping raw text");
            ChunkSummary {
                chunk_summary: salvage(&cleaned, 200),
                ..Default::default()
            }
        }
    })
}

/// Merge chunk summaries, in chunk order, into the final summary text.
pub async fn merge_summaries(
    generator: &dyn TextGenerator,
    video_id: &str,
    chunks: &[ChunkSummary],
) -> Result<VideoSummary> {
    tracing::info!(video_id, chunks = chunks.len(), "Merging chunk summaries");
    let raw = generator.generate_text(&merge_prompt(chunks)).await?;

    let highlights: Vec<Highlight> = chunks
        .iter()
        .flat_map(|chunk| chunk.highlights.iter().cloned())
        .take(MAX_HIGHLIGHTS)
        .collect();

    let merged = match parse_model_output::<MergedSummary>(&raw) {
        ModelOutput::Parsed(merged) => merged,
        ModelOutput::Malformed(cleaned) => {
            tracing::warn!(video_id, "Merged summary was not valid JSON, salvaging");
            MergedSummary {
                summary: salvage(&cleaned, 300),
                takeaways: chunks
                    .iter()
                    .flat_map(|chunk| chunk.takeaways.iter().cloned())
                    .take(SALVAGED_TAKEAWAYS)
                    .collect(),
                focus: "Video content summary".to_string(),
            }
        }
    };

    Ok(VideoSummary {
        video_id: video_id.to_string(),
        summary: merged.summary,
        takeaways: merged.takeaways,
        focus: merged.focus,
        highlights,
        topics: Vec::new(),
        generated_at: Utc::now(),
        method: SummaryMethod::TranscriptChunks,
    })
}

/// Full chunk-summarize-merge run over a transcript.
pub async fn summarize_transcript(
    generator: &dyn TextGenerator,
    video_id: &str,
    transcript_text: &str,
    config: ChunkConfig,
) -> Result<VideoSummary> {
    let chunks = chunk_transcript(transcript_text, config);
    tracing::info!(video_id, chunks = chunks.len(), "Summarizing transcript");

    let results = join_all(chunks.iter().map(|chunk| summarize_chunk(generator, chunk))).await;

    let mut summaries = Vec::with_capacity(results.len());
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(summary) => summaries.push(summary),
            Err(e) => tracing::warn!(video_id, chunk = index, error = %e, "Skipping failed chunk"),
        }
    }

    if summaries.is_empty() {
        tracing::error!(video_id, "Every chunk summary failed");
        return Err(LearnerError::upstream(SERVICE, "no summaries generated"));
    }

    merge_summaries(generator, video_id, &summaries).await
}

/// Summarize straight from the video URL when there is no transcript to work with.
pub async fn analyze_video(generator: &dyn TextGenerator, video_id: &str) -> Result<VideoSummary> {
    tracing::info!(video_id, "Falling back to direct video analysis");
    let raw = generator
        .generate_text(&video_analysis_prompt(&watch_url(video_id)))
        .await?;

    let analysis = match parse_model_output::<VideoAnalysis>(&raw) {
        ModelOutput::Parsed(analysis) => analysis,
        ModelOutput::Malformed(cleaned) => {
            tracing::warn!(video_id, "Video analysis was not valid JSON, salvaging");
            VideoAnalysis {
                summary: salvage(&cleaned, 500),
                takeaways: vec!["Unable to parse detailed analysis".to_string()],
                focus: "Video analysis completed but format parsing failed".to_string(),
                topics: Vec::new(),
            }
        }
    };

    Ok(VideoSummary {
        video_id: video_id.to_string(),
        summary: analysis.summary,
        takeaways: analysis.takeaways,
        focus: analysis.focus,
        highlights: Vec::new(),
        topics: analysis.topics,
        generated_at: Utc::now(),
        method: SummaryMethod::VideoAnalysis,
    })
}

/// Cached access to video summaries. Quiz generation and grading both go through here.
pub struct SummaryService {
    generator: Option<Arc<dyn TextGenerator>>,
    transcripts: Arc<dyn TranscriptProvider>,
    cache: Cache<VideoSummary>,
    locks: KeyedLocks,
    chunking: ChunkConfig,
}

impl SummaryService {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        transcripts: Arc<dyn TranscriptProvider>,
        store: Arc<dyn DocumentStore>,
        chunking: ChunkConfig,
    ) -> Self {
        Self {
            generator,
            transcripts,
            cache: Cache::new(store, SUMMARIES, SUMMARY_FRESHNESS),
            locks: KeyedLocks::new(),
            chunking,
        }
    }

    pub fn transcripts(&self) -> &Arc<dyn TranscriptProvider> {
        &self.transcripts
    }

    pub async fn get_or_generate(&self, video_id: &str) -> Result<VideoSummary> {
        if let Some(summary) = self.cache.get(video_id).await? {
            tracing::info!(video_id, "Summary cache hit");
            return Ok(summary);
        }

        let _guard = self.locks.lock(video_id).await;
        // Another request may have finished generating while we waited.
        if let Some(summary) = self.cache.get(video_id).await? {
            return Ok(summary);
        }

        tracing::info!(video_id, "Summary cache miss, generating");
        let summary = self.generate(video_id).await?;
        self.cache.put(video_id, &summary).await?;
        Ok(summary)
    }

    async fn generate(&self, video_id: &str) -> Result<VideoSummary> {
        let generator = self
            .generator
            .as_deref()
            .ok_or_else(|| LearnerError::upstream(SERVICE, "no generation backend configured"))?;

        match self.transcripts.get_transcript(video_id).await {
            Ok(transcript) => {
                summarize_transcript(generator, video_id, &transcript.transcript_text, self.chunking)
                    .await
            }
            Err(e) => {
                tracing::warn!(video_id, error = %e, "Transcript unavailable");
                analyze_video(generator, video_id).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Replies by matching a marker in the prompt.
    struct Scripted {
        replies: Vec<(&'static str, std::result::Result<String, &'static str>)>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<(&'static str, std::result::Result<&str, &'static str>)>) -> Self {
            Self {
                replies: replies
                    .into_iter()
                    .map(|(marker, reply)| (marker, reply.map(str::to_string)))
                    .collect(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate_text(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            for (marker, reply) in &self.replies {
                if prompt.contains(marker) {
                    return reply
                        .clone()
                        .map_err(|e| LearnerError::upstream(SERVICE, e));
                }
            }
            Err(LearnerError::upstream(SERVICE, "unscripted prompt"))
        }

        async fn embed_text(&self, _text: &str) -> Option<Vec<f64>> {
            None
        }
    }

    #[tokio::test]
    async fn malformed_chunk_keeps_raw_prefix() {
        let raw = "x".repeat(450);
        let generator = Scripted::new(vec![("transcript chunk", Ok(raw.as_str()))]);
        let summary = summarize_chunk(&generator, "words").await.unwrap();
        assert_eq!(summary.chunk_summary.len(), 200);
        assert!(summary.takeaways.is_empty());
    }

    #[tokio::test]
    async fn odd_highlights_keep_chunk_fields() {
        let generator = Scripted::new(vec![(
            "transcript chunk",
            Ok(r#"{"chunk_summary": "Plants capture light.", "takeaways": ["light"], "highlights": [{"text": "Light matters", "start": "00:45"}, "quote"]}"#),
        )]);
        let summary = summarize_chunk(&generator, "words").await.unwrap();
        assert_eq!(summary.chunk_summary, "Plants capture light.");
        assert_eq!(summary.takeaways, vec!["light"]);
        assert_eq!(summary.highlights.len(), 2);
        assert_eq!(summary.highlights[0].offset, 45.0);
        assert_eq!(summary.highlights[1].text, "quote");
    }

    #[tokio::test]
    async fn failed_chunks_are_skipped() {
        // The merge prompt quotes chunk text, so it has to be matched first.
        let generator = Scripted::new(vec![
            (
                "Merge the following",
                Ok(r#"{"summary": "all", "takeaways": ["t"], "focus": "f"}"#),
            ),
            ("alpha", Err("boom")),
            (
                "beta",
                Ok(r#"{"chunk_summary": "beta part", "takeaways": ["b"], "highlights": [{"text": "hb", "start": 3}]}"#),
            ),
        ]);
        let config = ChunkConfig {
            chunk_size: 1,
            overlap: 0,
        };

        let summary = summarize_transcript(&generator, "vid", "alpha beta", config)
            .await
            .unwrap();
        assert_eq!(summary.summary, "all");
        assert_eq!(summary.method, SummaryMethod::TranscriptChunks);
        assert_eq!(summary.highlights.len(), 1);
        assert_eq!(summary.highlights[0].offset, 3.0);

        let prompts = generator.prompts.lock().unwrap();
        let merge = prompts.iter().find(|p| p.contains("Merge")).unwrap();
        assert!(merge.contains("Chunk 1:\nSummary: beta part"));
        assert!(!merge.contains("Chunk 2:"));
    }

    #[tokio::test]
    async fn all_chunks_failing_is_an_error() {
        let generator = Scripted::new(vec![("transcript chunk", Err("down"))]);
        let err = summarize_transcript(&generator, "vid", "one two three", ChunkConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no summaries generated"));
    }

    #[tokio::test]
    async fn malformed_merge_salvages_chunk_takeaways() {
        let chunks: Vec<ChunkSummary> = (0..4)
            .map(|i| ChunkSummary {
                chunk_summary: format!("part {i}"),
                takeaways: vec![format!("a{i}"), format!("b{i}")],
                highlights: (0..4)
                    .map(|j| Highlight {
                        text: format!("h{i}{j}"),
                        offset: j as f64,
                    })
                    .collect(),
            })
            .collect();
        let generator = Scripted::new(vec![("Merge", Ok("Sorry, here is prose instead."))]);

        let summary = merge_summaries(&generator, "vid", &chunks).await.unwrap();
        assert_eq!(summary.summary, "Sorry, here is prose instead.");
        assert_eq!(summary.focus, "Video content summary");
        assert_eq!(summary.takeaways, vec!["a0", "b0", "a1", "b1", "a2"]);
        assert_eq!(summary.highlights.len(), 10);
        assert_eq!(summary.highlights[0].text, "h00");
        assert_eq!(summary.highlights[9].text, "h21");
    }

    #[tokio::test]
    async fn malformed_analysis_is_tagged() {
        let generator = Scripted::new(vec![("Video URL", Ok(""))]);
        let summary = analyze_video(&generator, "vid").await.unwrap();
        assert_eq!(summary.method, SummaryMethod::VideoAnalysis);
        assert_eq!(summary.summary, NO_OUTPUT);
        assert_eq!(summary.takeaways, vec!["Unable to parse detailed analysis"]);
        assert!(
            generator.prompts.lock().unwrap()[0]
                .contains("https://www.youtube.com/watch?v=vid")
        );
    }
}
