use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{
        Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use ytlearner_core::{
    Attempt, ClientQuiz, Learner, SubmissionResult, SubmitRequest, Transcript, VideoSummary,
    quiz::{DEFAULT_NUM_MCQ, DEFAULT_NUM_SHORT},
    resources::LearningResources,
    youtube::{DEFAULT_MAX_RESULTS, SearchResult, VideoMetadata},
};

use crate::error::ApiResult;

pub fn router(learner: Arc<Learner>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/api", get(handle_root))
        .route("/api/", get(handle_root))
        .route("/api/video/:video_id/transcript", get(handle_transcript))
        .route("/api/video/:video_id/summary", get(handle_summary))
        .route("/api/video/:video_id/quiz", get(handle_quiz))
        .route("/api/video/:video_id/metadata", get(handle_metadata))
        .route("/api/quiz/:quiz_id/submit", post(handle_submit))
        .route("/api/quiz/:quiz_id/attempts", get(handle_attempts))
        .route("/api/resources/recommendations", post(handle_resources))
        .route("/api/search", get(handle_search))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(learner))
}

async fn handle_root(Extension(learner): Extension<Arc<Learner>>) -> Json<Value> {
    Json(json!({
        "message": "Welcome to YtLearner API",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": learner.storage_mode(),
    }))
}

#[derive(Serialize)]
pub struct TranscriptResponse {
    #[serde(flatten)]
    pub transcript: Transcript,
    pub success: bool,
}

async fn handle_transcript(
    Path(video_id): Path<String>,
    Extension(learner): Extension<Arc<Learner>>,
) -> ApiResult<Json<TranscriptResponse>> {
    let transcript = learner.transcript(&video_id).await?;
    Ok(Json(TranscriptResponse {
        transcript,
        success: true,
    }))
}

async fn handle_summary(
    Path(video_id): Path<String>,
    Extension(learner): Extension<Arc<Learner>>,
) -> ApiResult<Json<VideoSummary>> {
    Ok(Json(learner.summary(&video_id).await?))
}

#[derive(Deserialize)]
pub struct QuizParams {
    pub num_mcq: Option<u32>,
    pub num_short: Option<u32>,
}

async fn handle_quiz(
    Path(video_id): Path<String>,
    params: Result<Query<QuizParams>, QueryRejection>,
    Extension(learner): Extension<Arc<Learner>>,
) -> ApiResult<Json<ClientQuiz>> {
    let Query(params) = params?;
    let quiz = learner
        .quiz(
            &video_id,
            params.num_mcq.unwrap_or(DEFAULT_NUM_MCQ),
            params.num_short.unwrap_or(DEFAULT_NUM_SHORT),
        )
        .await?;
    Ok(Json(quiz))
}

async fn handle_submit(
    Path(quiz_id): Path<String>,
    Extension(learner): Extension<Arc<Learner>>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<Json<SubmissionResult>> {
    let Json(req) = body?;
    Ok(Json(learner.submit(&quiz_id, &req.into()).await?))
}

async fn handle_attempts(
    Path(quiz_id): Path<String>,
    Extension(learner): Extension<Arc<Learner>>,
) -> ApiResult<Json<Vec<Attempt>>> {
    Ok(Json(learner.attempts(&quiz_id).await?))
}

#[derive(Deserialize)]
pub struct ResourceRequest {
    #[serde(default)]
    pub topic: String,
}

async fn handle_resources(
    Extension(learner): Extension<Arc<Learner>>,
    body: Result<Json<ResourceRequest>, JsonRejection>,
) -> ApiResult<Json<LearningResources>> {
    let Json(req) = body?;
    Ok(Json(learner.resources(&req.topic).await?))
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(rename = "maxResults")]
    pub max_results: Option<u32>,
}

async fn handle_search(
    params: Result<Query<SearchParams>, QueryRejection>,
    Extension(learner): Extension<Arc<Learner>>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    let Query(params) = params?;
    let results = learner
        .search(&params.q, params.max_results.unwrap_or(DEFAULT_MAX_RESULTS))
        .await?;
    Ok(Json(results))
}

async fn handle_metadata(
    Path(video_id): Path<String>,
    Extension(learner): Extension<Arc<Learner>>,
) -> ApiResult<Json<VideoMetadata>> {
    Ok(Json(learner.metadata(&video_id).await?))
}
