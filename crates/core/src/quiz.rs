//! Quiz identity, generation and caching.
//!
//! A quiz is addressed by a hash of `(video id, num_mcq, num_short)`, so the same request always
//! lands on the same cache entry. The cached quiz keeps answers and reference embeddings for
//! grading; callers only ever see the [`ClientQuiz`] projection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    cache::{Cache, KeyedLocks, QUIZ_FRESHNESS, Timestamped},
    error::{LearnerError, Result, truncate_chars},
    gateway::TextGenerator,
    output::{ModelOutput, parse_model_output},
    store::{DocumentStore, hash_key},
    summary::SummaryService,
    types::{ClientQuiz, McqQuestion, Question, Quiz, ShortQuestion, VideoSummary},
};

pub const QUIZZES: &str = "quizzes";
pub const MAX_QUESTIONS_PER_TYPE: u32 = 10;
pub const DEFAULT_NUM_MCQ: u32 = 3;
pub const DEFAULT_NUM_SHORT: u32 = 2;

const MCQ_POINTS: f64 = 1.0;
const SHORT_POINTS: f64 = 2.0;

impl Timestamped for Quiz {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Content-addressed quiz id: hex SHA-256 of `"{video_id}_{num_mcq}_{num_short}"`.
pub fn quiz_id(video_id: &str, num_mcq: u32, num_short: u32) -> String {
    hash_key(&format!("{}_{}_{}", video_id, num_mcq, num_short))
}

pub fn validate_counts(num_mcq: u32, num_short: u32) -> Result<()> {
    for (name, count) in [("num_mcq", num_mcq), ("num_short", num_short)] {
        if count > MAX_QUESTIONS_PER_TYPE {
            return Err(LearnerError::invalid(format!(
                "{} must be between 0 and {}, got {}",
                name, MAX_QUESTIONS_PER_TYPE, count
            )));
        }
    }
    Ok(())
}

fn quiz_prompt(summary: &VideoSummary, num_mcq: u32, num_short: u32) -> String {
    format!(
        r#"Based on the following video summary, generate quiz questions in JSON format.

Video Summary:
Summary: {summary}
Key Takeaways: {takeaways}
Focus: {focus}

Generate {num_mcq} multiple choice questions and {num_short} short answer questions.

Respond with ONLY a valid JSON array (no markdown, no code fences) with this structure:
[
  {{
    "id": "q1",
    "type": "mcq",
    "prompt": "Question text here?",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correct_answer": "Option B",
    "max_points": 1,
    "rubric_keywords": ["keyword1", "keyword2"]
  }},
  {{
    "id": "q2",
    "type": "short",
    "prompt": "Explain the main concept discussed in the video.",
    "correct_answer": "A detailed answer here",
    "max_points": 2,
    "rubric_keywords": ["concept1", "concept2", "concept3"]
  }}
]
"#,
        summary = summary.summary,
        takeaways = summary.takeaways.join(", "),
        focus = summary.focus,
    )
}

/// A question as the backend writes it, before validation.
#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    question_type: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_answer: Value,
    #[serde(default)]
    max_points: Option<f64>,
    #[serde(default)]
    rubric_keywords: Vec<String>,
}

fn points_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|p| p.is_finite() && *p > 0.0).unwrap_or(default)
}

/// Resolve an mcq answer given as an index, option text or option letter.
fn resolve_option(answer: &Value, options: &[String]) -> Option<usize> {
    match answer {
        Value::Number(n) => n
            .as_u64()
            .map(|i| i as usize)
            .filter(|i| *i < options.len()),
        Value::String(text) => {
            let text = text.trim();
            options
                .iter()
                .position(|option| option.trim().eq_ignore_ascii_case(text))
                .or_else(|| {
                    let mut chars = text.chars();
                    match (chars.next(), chars.next()) {
                        (Some(letter), None) if letter.is_ascii_alphabetic() => {
                            let index = (letter.to_ascii_uppercase() as u8 - b'A') as usize;
                            (index < options.len()).then_some(index)
                        }
                        _ => None,
                    }
                })
        }
        _ => None,
    }
}

impl RawQuestion {
    fn into_question(self, position: usize) -> std::result::Result<Question, String> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("q{}", position + 1));

        if self.prompt.trim().is_empty() {
            return Err(format!("question {} has no prompt", id));
        }

        match self.question_type.to_ascii_lowercase().as_str() {
            "mcq" => {
                if self.options.len() < 2 {
                    return Err(format!("question {} needs at least two options", id));
                }
                let correct_answer = resolve_option(&self.correct_answer, &self.options)
                    .ok_or_else(|| {
                        format!(
                            "question {} answer {} matches no option",
                            id, self.correct_answer
                        )
                    })?;
                Ok(Question::Mcq(McqQuestion {
                    id,
                    prompt: self.prompt,
                    options: self.options,
                    correct_answer,
                    max_points: points_or(self.max_points, MCQ_POINTS),
                    rubric_keywords: self.rubric_keywords,
                }))
            }
            "short" => {
                let correct_answer = match self.correct_answer {
                    Value::String(text) => text,
                    Value::Number(n) => n.to_string(),
                    _ => String::new(),
                };
                if correct_answer.trim().is_empty() {
                    return Err(format!("question {} has no reference answer", id));
                }
                Ok(Question::Short(ShortQuestion {
                    id,
                    prompt: self.prompt,
                    correct_answer,
                    max_points: points_or(self.max_points, SHORT_POINTS),
                    rubric_keywords: self.rubric_keywords,
                    answer_embedding: None,
                }))
            }
            other => Err(format!("question {} has unknown type {:?}", id, other)),
        }
    }
}

/// Parse and validate backend quiz output. Any invalid question rejects the whole set.
pub fn parse_questions(raw: &str) -> Result<Vec<Question>> {
    let raw_questions = match parse_model_output::<Vec<RawQuestion>>(raw) {
        ModelOutput::Parsed(questions) => questions,
        ModelOutput::Malformed(cleaned) => {
            return Err(LearnerError::MalformedOutput { raw: cleaned });
        }
    };

    if raw_questions.is_empty() {
        return Err(LearnerError::MalformedOutput {
            raw: truncate_chars(raw, 200).to_string(),
        });
    }

    raw_questions
        .into_iter()
        .enumerate()
        .map(|(position, raw)| {
            raw.into_question(position).map_err(|reason| {
                tracing::warn!(%reason, "Generated question failed validation");
                LearnerError::MalformedOutput { raw: reason }
            })
        })
        .collect()
}

/// Ask the backend for questions and embed every short-answer reference once.
pub async fn generate_questions(
    generator: &dyn TextGenerator,
    summary: &VideoSummary,
    num_mcq: u32,
    num_short: u32,
) -> Result<Vec<Question>> {
    tracing::info!(num_mcq, num_short, "Generating quiz questions");
    let raw = generator
        .generate_text(&quiz_prompt(summary, num_mcq, num_short))
        .await?;
    let mut questions = parse_questions(&raw)?;

    for question in &mut questions {
        if let Question::Short(short) = question {
            short.answer_embedding = generator.embed_text(&short.correct_answer).await;
            if short.answer_embedding.is_none() {
                tracing::warn!(question = %short.id, "No reference embedding, grading will use keywords");
            }
        }
    }

    Ok(questions)
}

/// Deterministic template quiz used when the backend is absent or misbehaves.
pub fn fallback_quiz(summary: &VideoSummary, num_mcq: u32, num_short: u32) -> Vec<Question> {
    let text = if summary.summary.is_empty() {
        "video content"
    } else {
        summary.summary.as_str()
    };
    let first_takeaway = summary
        .takeaways
        .first()
        .map(String::as_str)
        .unwrap_or("various concepts");
    let keywords = |count: usize, default: &[&str]| -> Vec<String> {
        if summary.takeaways.is_empty() {
            default.iter().map(|k| k.to_string()).collect()
        } else {
            summary.takeaways.iter().take(count).cloned().collect()
        }
    };

    let mut questions = Vec::with_capacity((num_mcq + num_short) as usize);

    for _ in 0..num_mcq {
        questions.push(Question::Mcq(McqQuestion {
            id: format!("q{}", questions.len() + 1),
            prompt: "Based on the video, which statement is most accurate about the topic discussed?"
                .to_string(),
            options: vec![
                format!("The video primarily focuses on {}...", truncate_chars(text, 30)),
                format!("The main topic is unrelated to {}...", truncate_chars(text, 20)),
                format!("The video discusses {}", first_takeaway),
                "None of the above".to_string(),
            ],
            correct_answer: 2,
            max_points: MCQ_POINTS,
            rubric_keywords: keywords(3, &["content", "topic", "video"]),
        }));
    }

    for _ in 0..num_short {
        questions.push(Question::Short(ShortQuestion {
            id: format!("q{}", questions.len() + 1),
            prompt: "Describe the main concept discussed in the video.".to_string(),
            correct_answer: if summary.summary.is_empty() {
                "Summary of video content".to_string()
            } else {
                truncate_chars(&summary.summary, 150).to_string()
            },
            max_points: SHORT_POINTS,
            rubric_keywords: keywords(5, &["concept", "main", "topic"]),
            answer_embedding: None,
        }));
    }

    questions
}

pub struct QuizService {
    generator: Option<Arc<dyn TextGenerator>>,
    summaries: Arc<SummaryService>,
    cache: Cache<Quiz>,
    locks: KeyedLocks,
}

impl QuizService {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        summaries: Arc<SummaryService>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            generator,
            summaries,
            cache: Cache::new(store, QUIZZES, QUIZ_FRESHNESS),
            locks: KeyedLocks::new(),
        }
    }

    /// Get or create the quiz for these counts, with answers stripped.
    pub async fn get_or_generate(
        &self,
        video_id: &str,
        num_mcq: u32,
        num_short: u32,
    ) -> Result<ClientQuiz> {
        validate_counts(num_mcq, num_short)?;
        let id = quiz_id(video_id, num_mcq, num_short);

        if let Some(quiz) = self.cache.get(&id).await? {
            tracing::info!(quiz_id = %id, "Quiz cache hit");
            return Ok(quiz.to_client());
        }

        let _guard = self.locks.lock(&id).await;
        if let Some(quiz) = self.cache.get(&id).await? {
            return Ok(quiz.to_client());
        }

        let summary = self.summaries.get_or_generate(video_id).await?;
        let questions = self.build_questions(&summary, num_mcq, num_short).await;

        let quiz = Quiz {
            quiz_id: id,
            video_id: video_id.to_string(),
            num_mcq,
            num_short,
            total_points: questions.iter().map(Question::max_points).sum(),
            questions,
            created_at: Utc::now(),
        };
        self.cache.put(&quiz.quiz_id, &quiz).await?;
        tracing::info!(quiz_id = %quiz.quiz_id, questions = quiz.questions.len(), "Cached new quiz");

        Ok(quiz.to_client())
    }

    /// The full cached quiz, answers included. Missing or expired quizzes are not found.
    pub async fn get_full(&self, quiz_id: &str) -> Result<Quiz> {
        self.cache
            .get(quiz_id)
            .await?
            .ok_or_else(|| LearnerError::not_found(format!("Quiz {}", quiz_id)))
    }

    async fn build_questions(
        &self,
        summary: &VideoSummary,
        num_mcq: u32,
        num_short: u32,
    ) -> Vec<Question> {
        if num_mcq + num_short == 0 {
            return Vec::new();
        }

        let Some(generator) = self.generator.as_deref() else {
            tracing::warn!("No generation backend, using template quiz");
            return fallback_quiz(summary, num_mcq, num_short);
        };

        match generate_questions(generator, summary, num_mcq, num_short).await {
            Ok(questions) => questions,
            Err(e) => {
                tracing::warn!(error = %e, "Quiz generation failed, using template quiz");
                fallback_quiz(summary, num_mcq, num_short)
            }
        }
    }
}
