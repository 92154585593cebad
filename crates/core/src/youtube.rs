//! YouTube Data API v3 lookups: video metadata and keyword search, both cached.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    cache::{Cache, METADATA_FRESHNESS, SEARCH_FRESHNESS, Timestamped},
    error::{LearnerError, Result, truncate_chars},
    store::DocumentStore,
    transcript::watch_url,
};

pub const VIDEOS: &str = "videos";
pub const SEARCH_CACHE: &str = "search_cache";
pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const MAX_RESULTS_LIMIT: u32 = 50;

const SERVICE: &str = "YouTube Data API";
const VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";
const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
        .expect("valid regex")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: String,
    pub like_count: String,
    pub comment_count: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub duration_seconds: u64,
    pub published_at: String,
    pub statistics: VideoStatistics,
    pub youtube_url: String,
    pub embed_url: String,
    pub metadata_fetched_at: DateTime<Utc>,
}

impl Timestamped for VideoMetadata {
    fn timestamp(&self) -> DateTime<Utc> {
        self.metadata_fetched_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub duration_seconds: u64,
}

/// Cached results for one query, good for any request up to `max_results`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct SearchCacheEntry {
    query: String,
    max_results: u32,
    results: Vec<SearchResult>,
    created_at: DateTime<Utc>,
}

impl Timestamped for SearchCacheEntry {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// ISO-8601 duration (`PT1H2M3S`) to whole seconds.
pub fn parse_iso8601_duration(duration: &str) -> Option<u64> {
    let caps = ISO_DURATION.captures(duration)?;
    // A bare "P" or "PT" carries no components.
    if caps.iter().skip(1).all(|c| c.is_none()) {
        return None;
    }

    let part = |i: usize| -> f64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    let seconds = part(1) * 604_800.0 + part(2) * 86_400.0 + part(3) * 3_600.0 + part(4) * 60.0
        + part(5);
    Some(seconds as u64)
}

fn text(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn count(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => "0".to_string(),
    }
}

fn thumbnail(snippet: &Value) -> String {
    let thumbnails = &snippet["thumbnails"];
    thumbnails["high"]["url"]
        .as_str()
        .or_else(|| thumbnails["default"]["url"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn duration_of(item: &Value) -> u64 {
    item["contentDetails"]["duration"]
        .as_str()
        .and_then(parse_iso8601_duration)
        .unwrap_or(0)
}

fn metadata_from_item(video_id: &str, item: &Value) -> VideoMetadata {
    let snippet = &item["snippet"];
    let statistics = &item["statistics"];

    VideoMetadata {
        video_id: video_id.to_string(),
        title: text(&snippet["title"]),
        description: text(&snippet["description"]),
        channel_title: text(&snippet["channelTitle"]),
        thumbnail_url: thumbnail(snippet),
        duration_seconds: duration_of(item),
        published_at: text(&snippet["publishedAt"]),
        statistics: VideoStatistics {
            view_count: count(&statistics["viewCount"]),
            like_count: count(&statistics["likeCount"]),
            comment_count: count(&statistics["commentCount"]),
        },
        youtube_url: watch_url(video_id),
        embed_url: format!("https://www.youtube.com/embed/{}", video_id),
        metadata_fetched_at: Utc::now(),
    }
}

fn search_result_from_item(item: &Value) -> Option<SearchResult> {
    let snippet = &item["snippet"];
    Some(SearchResult {
        video_id: item["id"].as_str()?.to_string(),
        title: text(&snippet["title"]),
        channel_title: text(&snippet["channelTitle"]),
        thumbnail_url: thumbnail(snippet),
        duration_seconds: duration_of(item),
    })
}

pub fn validate_search(query: &str, max_results: u32) -> Result<()> {
    if query.trim().is_empty() {
        return Err(LearnerError::invalid("Search query must not be empty"));
    }
    if !(1..=MAX_RESULTS_LIMIT).contains(&max_results) {
        return Err(LearnerError::invalid(format!(
            "maxResults must be between 1 and {}, got {}",
            MAX_RESULTS_LIMIT, max_results
        )));
    }
    Ok(())
}

pub struct YouTubeClient {
    client: reqwest::Client,
    api_key: Option<String>,
    metadata: Cache<VideoMetadata>,
    searches: Cache<SearchCacheEntry>,
}

impl YouTubeClient {
    pub fn new(api_key: Option<String>, store: Arc<dyn DocumentStore>) -> Self {
        if api_key.is_none() {
            tracing::warn!("YOUTUBE_API_KEY not set, metadata and search are unavailable");
        }
        Self {
            client: reqwest::Client::new(),
            api_key,
            metadata: Cache::new(Arc::clone(&store), VIDEOS, METADATA_FRESHNESS),
            searches: Cache::new(store, SEARCH_CACHE, SEARCH_FRESHNESS),
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LearnerError::upstream(SERVICE, "YOUTUBE_API_KEY is not set"))
    }

    async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("key", self.api_key()?)])
            .send()
            .await
            .map_err(|e| LearnerError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "YouTube API request failed");
            return Err(LearnerError::upstream(
                SERVICE,
                format!("HTTP {}: {}", status, truncate_chars(&body, 300)),
            ));
        }

        Ok(response.json().await?)
    }

    pub async fn metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        if let Some(metadata) = self.metadata.get(video_id).await? {
            tracing::info!(video_id, "Metadata cache hit");
            return Ok(metadata);
        }

        let data = self
            .get_json(
                VIDEOS_URL,
                &[("part", "snippet,contentDetails,statistics"), ("id", video_id)],
            )
            .await?;

        let item = data["items"]
            .as_array()
            .and_then(|items| items.first())
            .ok_or_else(|| LearnerError::not_found(format!("Video {}", video_id)))?;

        let metadata = metadata_from_item(video_id, item);
        self.metadata.put(video_id, &metadata).await?;
        Ok(metadata)
    }

    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>> {
        validate_search(query, max_results)?;

        match self.searches.get(query).await? {
            Some(entry) if entry.max_results >= max_results => {
                tracing::info!(query, "Search cache hit");
                return Ok(entry.results.into_iter().take(max_results as usize).collect());
            }
            _ => {}
        }

        let max = max_results.to_string();
        let found = self
            .get_json(
                SEARCH_URL,
                &[("part", "id"), ("q", query), ("type", "video"), ("maxResults", &max)],
            )
            .await?;

        let video_ids: Vec<&str> = found["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"]["videoId"].as_str())
                    .collect()
            })
            .unwrap_or_default();

        if video_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = video_ids.join(",");
        let details = self
            .get_json(VIDEOS_URL, &[("part", "snippet,contentDetails"), ("id", &ids)])
            .await?;

        let results: Vec<SearchResult> = details["items"]
            .as_array()
            .map(|items| items.iter().filter_map(search_result_from_item).collect())
            .unwrap_or_default();

        self.searches
            .put(
                query,
                &SearchCacheEntry {
                    query: query.to_string(),
                    max_results,
                    results: results.clone(),
                    created_at: Utc::now(),
                },
            )
            .await?;

        Ok(results)
    }
}
