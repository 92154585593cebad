use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::transcript::timestamp_to_seconds;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub transcript_text: String,
    pub segments: Vec<Segment>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Highlight {
    #[serde(default)]
    pub text: String,
    /// Seconds into the video.
    #[serde(default, alias = "start")]
    pub offset: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkSummary {
    #[serde(default)]
    pub chunk_summary: String,
    #[serde(default)]
    pub takeaways: Vec<String>,
    #[serde(default, deserialize_with = "lenient_highlights")]
    pub highlights: Vec<Highlight>,
}

impl Highlight {
    /// Read whatever highlight shape the backend produced: an object with a numeric or `MM:SS`
    /// offset, or a bare quote. Anything else is dropped.
    fn from_loose(value: Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Highlight { text, offset: 0.0 }),
            Value::Object(fields) => {
                let text = fields.get("text").and_then(Value::as_str)?.to_string();
                let offset = fields
                    .get("offset")
                    .or_else(|| fields.get("start"))
                    .and_then(|offset| match offset {
                        Value::Number(n) => n.as_f64(),
                        Value::String(s) => timestamp_to_seconds(s.trim()),
                        _ => None,
                    })
                    .unwrap_or(0.0);
                Some(Highlight { text, offset })
            }
            _ => None,
        }
    }
}

fn lenient_highlights<'de, D>(deserializer: D) -> std::result::Result<Vec<Highlight>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = match Value::deserialize(deserializer)? {
        Value::Array(values) => values,
        _ => Vec::new(),
    };
    Ok(values.into_iter().filter_map(Highlight::from_loose).collect())
}

/// How a [`VideoSummary`] was produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMethod {
    TranscriptChunks,
    VideoAnalysis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub video_id: String,
    pub summary: String,
    pub takeaways: Vec<String>,
    pub focus: String,
    pub highlights: Vec<Highlight>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub method: SummaryMethod,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Mcq,
    Short,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "mcq",
            QuestionType::Short => "short",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McqQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`. Server-only.
    pub correct_answer: usize,
    pub max_points: f64,
    #[serde(default)]
    pub rubric_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShortQuestion {
    pub id: String,
    pub prompt: String,
    /// Reference answer. Server-only.
    pub correct_answer: String,
    pub max_points: f64,
    #[serde(default)]
    pub rubric_keywords: Vec<String>,
    /// Embedding of `correct_answer`, computed once at generation time. Server-only.
    #[serde(default)]
    pub answer_embedding: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Question {
    Mcq(McqQuestion),
    Short(ShortQuestion),
}

impl Question {
    pub fn id(&self) -> &str {
        match self {
            Question::Mcq(q) => &q.id,
            Question::Short(q) => &q.id,
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match self {
            Question::Mcq(_) => QuestionType::Mcq,
            Question::Short(_) => QuestionType::Short,
        }
    }

    pub fn max_points(&self) -> f64 {
        match self {
            Question::Mcq(q) => q.max_points,
            Question::Short(q) => q.max_points,
        }
    }

    pub fn rubric_keywords(&self) -> &[String] {
        match self {
            Question::Mcq(q) => &q.rubric_keywords,
            Question::Short(q) => &q.rubric_keywords,
        }
    }

    /// Drop every server-only field.
    pub fn to_client(&self) -> ClientQuestion {
        match self {
            Question::Mcq(q) => ClientQuestion::Mcq {
                id: q.id.clone(),
                prompt: q.prompt.clone(),
                options: q.options.clone(),
                max_points: q.max_points,
                rubric_keywords: q.rubric_keywords.clone(),
            },
            Question::Short(q) => ClientQuestion::Short {
                id: q.id.clone(),
                prompt: q.prompt.clone(),
                max_points: q.max_points,
                rubric_keywords: q.rubric_keywords.clone(),
            },
        }
    }
}

/// Full quiz as cached server-side, answers and embeddings included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    #[serde(rename = "quizId")]
    pub quiz_id: String,
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub num_mcq: u32,
    pub num_short: u32,
    pub questions: Vec<Question>,
    #[serde(rename = "totalPoints")]
    pub total_points: f64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    pub fn to_client(&self) -> ClientQuiz {
        ClientQuiz {
            quiz_id: self.quiz_id.clone(),
            video_id: self.video_id.clone(),
            num_mcq: self.num_mcq,
            num_short: self.num_short,
            questions: self.questions.iter().map(Question::to_client).collect(),
            total_points: self.total_points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientQuestion {
    Mcq {
        id: String,
        prompt: String,
        options: Vec<String>,
        max_points: f64,
        rubric_keywords: Vec<String>,
    },
    Short {
        id: String,
        prompt: String,
        max_points: f64,
        rubric_keywords: Vec<String>,
    },
}

/// Quiz as returned to clients. Has no place to carry answers or embeddings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientQuiz {
    #[serde(rename = "quizId")]
    pub quiz_id: String,
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub num_mcq: u32,
    pub num_short: u32,
    pub questions: Vec<ClientQuestion>,
    #[serde(rename = "totalPoints")]
    pub total_points: f64,
}

/// A client answer: option index for mcq, free text for short answers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AnswerValue {
    Index(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for AnswerValue {
    /// Integral numbers (`1` or `1.0`) are indexes. `null` and `false` are an empty answer, and
    /// any other value is graded as its text.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => AnswerValue::Text(text),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(index), _) => AnswerValue::Index(index),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => {
                    AnswerValue::Index(f as i64)
                }
                _ => AnswerValue::Text(n.to_string()),
            },
            Value::Null | Value::Bool(false) => AnswerValue::Text(String::new()),
            other => AnswerValue::Text(other.to_string()),
        })
    }
}

impl Default for AnswerValue {
    fn default() -> Self {
        AnswerValue::Text(String::new())
    }
}

impl AnswerValue {
    pub fn as_text(&self) -> String {
        match self {
            AnswerValue::Index(i) => i.to_string(),
            AnswerValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    #[serde(rename = "questionId")]
    pub question_id: usize,
    pub answer: AnswerValue,
}

/// Body of `POST /quiz/{id}/submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub answers: Vec<SubmittedAnswer>,
}

/// Answers keyed by question index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub answers: BTreeMap<usize, AnswerValue>,
}

impl Submission {
    pub fn answer_for(&self, index: usize) -> AnswerValue {
        self.answers.get(&index).cloned().unwrap_or_default()
    }
}

impl From<SubmitRequest> for Submission {
    fn from(req: SubmitRequest) -> Self {
        Self {
            answers: req
                .answers
                .into_iter()
                .map(|a| (a.question_id, a.answer))
                .collect(),
        }
    }
}

impl FromIterator<(usize, AnswerValue)> for Submission {
    fn from_iter<I: IntoIterator<Item = (usize, AnswerValue)>>(iter: I) -> Self {
        Self {
            answers: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFeedback {
    pub question_id: usize,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub student_answer: AnswerValue,
    pub points_earned: f64,
    pub max_points: f64,
    pub feedback: String,
}

/// Scores for one submission, before the report is attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradedAttempt {
    pub attempt_id: Uuid,
    pub quiz_id: String,
    pub video_id: String,
    pub score_percent: f64,
    pub points_earned: f64,
    pub points_possible: f64,
    pub question_feedbacks: Vec<QuestionFeedback>,
    pub submitted_at: DateTime<Utc>,
}

/// What the attempt store keeps. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    #[serde(flatten)]
    pub graded: GradedAttempt,
    pub report: Report,
}

/// Response of a quiz submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionResult {
    pub attempt: GradedAttempt,
    pub report: Report,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MicroExercise {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub overall_percent: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub detailed_feedback: Vec<String>,
    pub micro_exercises: Vec<MicroExercise>,
}
