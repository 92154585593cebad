use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::{fs, process::Command};
use uuid::Uuid;

use crate::{
    error::{LearnerError, Result, truncate_chars},
    store::{get_root_cache_dir, hash_key},
    types::{Segment, Transcript},
};

const SERVICE: &str = "transcript provider";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static CUE_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d[\d:.]*)\s+-->\s+(\d[\d:.]*)").expect("valid regex")
});

#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn get_transcript(&self, video_id: &str) -> Result<Transcript>;
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Fetches English subtitles through the `yt-dlp` executable.
pub struct YtDlpTranscriptProvider {
    binary: String,
    work_root: PathBuf,
}

impl Default for YtDlpTranscriptProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpTranscriptProvider {
    pub fn new() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            work_root: get_root_cache_dir().join("subtitles"),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Scratch directory for one request. Concurrent requests for a video never share one.
    fn work_dir(&self, video_id: &str) -> PathBuf {
        self.work_root
            .join(format!("{}-{}", hash_key(video_id), Uuid::new_v4().simple()))
    }

    /// Download subtitles for a video using yt-dlp
    async fn download_subtitles(&self, video_id: &str, work_dir: &Path) -> Result<()> {
        let output_template = work_dir.join(format!("{}.%(ext)s", hash_key(video_id)));
        let output = Command::new(&self.binary)
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .arg("--sub-langs")
            .arg("en")
            .arg("--sub-format")
            .arg("json3/vtt/best")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&output_template)
            .arg(watch_url(video_id))
            .output()
            .await
            .map_err(|e| LearnerError::upstream(SERVICE, format!("{}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LearnerError::upstream(
                SERVICE,
                format!(
                    "Failed to download subtitles: {}",
                    truncate_chars(stderr.trim(), 500)
                ),
            ));
        }

        Ok(())
    }

    async fn load_segments(&self, video_id: &str, work_dir: &Path) -> Result<Vec<Segment>> {
        let Some(path) = find_subtitle_file(work_dir).await? else {
            return Err(LearnerError::not_found(format!(
                "English subtitles for video {}",
                video_id
            )));
        };

        let content = fs::read_to_string(&path).await?;
        if path.extension().is_some_and(|ext| ext == "json3") {
            parse_json3(&content)
        } else {
            Ok(parse_vtt(&content))
        }
    }
}

#[async_trait]
impl TranscriptProvider for YtDlpTranscriptProvider {
    async fn get_transcript(&self, video_id: &str) -> Result<Transcript> {
        let work_dir = self.work_dir(video_id);
        fs::create_dir_all(&work_dir).await?;

        let result = async {
            self.download_subtitles(video_id, &work_dir).await?;
            self.load_segments(video_id, &work_dir).await
        }
        .await;

        if let Err(e) = fs::remove_dir_all(&work_dir).await {
            tracing::debug!(dir = %work_dir.display(), error = %e, "Could not clean subtitle dir");
        }

        let segments = result?;
        if segments.is_empty() {
            return Err(LearnerError::not_found(format!(
                "Transcript content for video {}",
                video_id
            )));
        }

        tracing::info!(video_id, segments = segments.len(), "Fetched transcript");
        Ok(Transcript {
            transcript_text: segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            segments,
            source: "yt-dlp".to_string(),
        })
    }
}

async fn find_subtitle_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut fallback = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if name.ends_with(".json3") {
            return Ok(Some(path));
        }
        if name.ends_with(".vtt") && name.contains(".en") && fallback.is_none() {
            fallback = Some(path);
        }
    }

    Ok(fallback)
}

#[derive(Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs")]
    start_ms: Option<f64>,
    #[serde(rename = "dDurationMs")]
    duration_ms: Option<f64>,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Deserialize)]
struct Json3Seg {
    utf8: Option<String>,
}

/// Parse YouTube's `json3` caption format.
pub fn parse_json3(content: &str) -> Result<Vec<Segment>> {
    let data: Json3 = serde_json::from_str(content)?;

    Ok(data
        .events
        .into_iter()
        .filter_map(|event| {
            let (start_ms, duration_ms) = event.start_ms.zip(event.duration_ms)?;
            let joined: String = event.segs.iter().filter_map(|s| s.utf8.as_deref()).collect();
            let text = WHITESPACE.replace_all(joined.trim(), " ").to_string();
            if text.is_empty() {
                return None;
            }

            let start = start_ms / 1000.0;
            Some(Segment {
                start,
                end: start + duration_ms / 1000.0,
                text,
            })
        })
        .collect())
}

/// Parse WebVTT cues, stripping inline markup.
pub fn parse_vtt(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let Some(caps) = CUE_TIMING.captures(line) else {
            continue;
        };
        let (Some(start), Some(end)) = (
            timestamp_to_seconds(&caps[1]),
            timestamp_to_seconds(&caps[2]),
        ) else {
            continue;
        };

        let mut cue_text = Vec::new();
        for text_line in lines.by_ref() {
            if text_line.trim().is_empty() {
                break;
            }
            cue_text.push(text_line.trim());
        }

        let joined = cue_text.join(" ");
        let text = MARKUP.replace_all(&joined, "");
        let text = WHITESPACE.replace_all(text.trim(), " ").to_string();
        if !text.is_empty() {
            segments.push(Segment { start, end, text });
        }
    }

    segments
}

/// `HH:MM:SS.mmm`, `MM:SS.mmm` or plain seconds.
pub fn timestamp_to_seconds(timestamp: &str) -> Option<f64> {
    let parts: Vec<&str> = timestamp.split(':').collect();
    match parts.as_slice() {
        [hours, minutes, seconds] => Some(
            hours.parse::<f64>().ok()? * 3600.0
                + minutes.parse::<f64>().ok()? * 60.0
                + seconds.parse::<f64>().ok()?,
        ),
        [minutes, seconds] => {
            Some(minutes.parse::<f64>().ok()? * 60.0 + seconds.parse::<f64>().ok()?)
        }
        [seconds] => seconds.parse().ok(),
        _ => None,
    }
}
