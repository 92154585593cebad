//! Scoring of quiz submissions.
//!
//! Multiple-choice questions are all-or-nothing on the option index. Short answers are compared
//! against the reference embedding stored with the quiz; when either side has no embedding the
//! rubric keywords decide instead. Matched keywords add a small bonus on top of either path.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    attempts::AttemptStore,
    error::Result,
    gateway::TextGenerator,
    quiz::QuizService,
    report::ReportGenerator,
    summary::SummaryService,
    types::{
        AnswerValue, Attempt, GradedAttempt, McqQuestion, Question, QuestionFeedback,
        ShortQuestion, Submission, SubmissionResult,
    },
};

pub const SIMILARITY_FULL: f64 = 0.85;
pub const SIMILARITY_PARTIAL: f64 = 0.70;
pub const KEYWORDS_FULL: f64 = 0.7;
pub const KEYWORDS_PARTIAL: f64 = 0.4;
pub const PARTIAL_CREDIT: f64 = 0.5;
pub const KEYWORD_BONUS: f64 = 0.1;
pub const MAX_KEYWORD_BONUS: f64 = 0.5;

/// Dot product over magnitudes; 0 for empty, mismatched or zero-magnitude input.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Case-insensitive substring matches of each keyword in `response`.
pub fn count_keyword_matches(response: &str, keywords: &[String]) -> usize {
    let response = response.to_lowercase();
    keywords
        .iter()
        .filter(|keyword| response.contains(&keyword.to_lowercase()))
        .count()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionGrade {
    pub points_earned: f64,
    pub feedback: String,
}

pub fn grade_mcq(question: &McqQuestion, answer: &AnswerValue) -> QuestionGrade {
    let chosen = match answer {
        AnswerValue::Index(index) => usize::try_from(*index).ok(),
        AnswerValue::Text(_) => None,
    };

    if chosen == Some(question.correct_answer) {
        return QuestionGrade {
            points_earned: question.max_points,
            feedback: "Correct!".to_string(),
        };
    }

    let correct_option = question
        .options
        .get(question.correct_answer)
        .cloned()
        .unwrap_or_else(|| question.correct_answer.to_string());
    QuestionGrade {
        points_earned: 0.0,
        feedback: format!("Incorrect. The correct answer was: {}", correct_option),
    }
}

/// Grade a short answer given the student's text and, when available, its embedding.
pub fn grade_short(
    question: &ShortQuestion,
    answer: &str,
    answer_embedding: Option<&[f64]>,
) -> QuestionGrade {
    let max_points = question.max_points;
    let keywords = &question.rubric_keywords;
    let matches = count_keyword_matches(answer, keywords);

    let (mut points, mut feedback) =
        match (answer_embedding, question.answer_embedding.as_deref()) {
            (Some(student), Some(reference)) => {
                let similarity = cosine_similarity(student, reference);
                if similarity >= SIMILARITY_FULL {
                    (
                        max_points,
                        format!("Excellent answer! (Similarity: {:.2})", similarity),
                    )
                } else if similarity >= SIMILARITY_PARTIAL {
                    (
                        max_points * PARTIAL_CREDIT,
                        format!(
                            "Partially correct ({}% credit). Consider adding more detail. (Similarity: {:.2})",
                            (PARTIAL_CREDIT * 100.0) as u32,
                            similarity
                        ),
                    )
                } else {
                    (
                        0.0,
                        format!(
                            "Answer needs improvement. Review the video content. (Similarity: {:.2})",
                            similarity
                        ),
                    )
                }
            }
            _ => {
                let matched = matches as f64;
                let total = keywords.len() as f64;
                // An empty rubric is met trivially.
                if matched >= total * KEYWORDS_FULL {
                    (max_points, "Good answer based on keywords.".to_string())
                } else if matched >= total * KEYWORDS_PARTIAL {
                    (
                        max_points * PARTIAL_CREDIT,
                        "Partial credit for covering some key points.".to_string(),
                    )
                } else {
                    (0.0, "Answer missing key concepts.".to_string())
                }
            }
        };

    // Added on either path and not clamped to max_points.
    let bonus = (matches as f64 * KEYWORD_BONUS).min(MAX_KEYWORD_BONUS);
    if bonus > 0.0 {
        points += bonus;
        feedback.push_str(&format!(" (+{:.1} bonus for keywords)", bonus));
    }

    QuestionGrade {
        points_earned: round2(points),
        feedback,
    }
}

pub async fn grade_question(
    generator: Option<&dyn TextGenerator>,
    question: &Question,
    answer: &AnswerValue,
) -> QuestionGrade {
    match question {
        Question::Mcq(mcq) => grade_mcq(mcq, answer),
        Question::Short(short) => {
            let text = answer.as_text();
            // Only worth embedding when there is a reference to compare against.
            let embedding = match generator {
                Some(generator) if short.answer_embedding.is_some() && !text.trim().is_empty() => {
                    generator.embed_text(&text).await
                }
                _ => None,
            };
            grade_short(short, &text, embedding.as_deref())
        }
    }
}

/// Grades submissions against cached quizzes, attaches a report and records the attempt.
pub struct GradingEngine {
    generator: Option<Arc<dyn TextGenerator>>,
    quizzes: Arc<QuizService>,
    summaries: Arc<SummaryService>,
    reports: ReportGenerator,
    attempts: AttemptStore,
}

impl GradingEngine {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        quizzes: Arc<QuizService>,
        summaries: Arc<SummaryService>,
        reports: ReportGenerator,
        attempts: AttemptStore,
    ) -> Self {
        Self {
            generator,
            quizzes,
            summaries,
            reports,
            attempts,
        }
    }

    pub fn attempts(&self) -> &AttemptStore {
        &self.attempts
    }

    pub async fn grade(&self, quiz_id: &str, submission: &Submission) -> Result<GradedAttempt> {
        let quiz = self.quizzes.get_full(quiz_id).await?;

        let mut question_feedbacks = Vec::with_capacity(quiz.questions.len());
        let mut points_earned = 0.0;
        let mut points_possible = 0.0;

        for (index, question) in quiz.questions.iter().enumerate() {
            let answer = submission.answer_for(index);
            let grade = grade_question(self.generator.as_deref(), question, &answer).await;

            points_earned += grade.points_earned;
            points_possible += question.max_points();
            question_feedbacks.push(QuestionFeedback {
                question_id: index,
                question_type: question.question_type(),
                student_answer: answer,
                points_earned: grade.points_earned,
                max_points: question.max_points(),
                feedback: grade.feedback,
            });
        }

        let score_percent = if points_possible > 0.0 {
            points_earned / points_possible * 100.0
        } else {
            0.0
        };

        Ok(GradedAttempt {
            attempt_id: Uuid::new_v4(),
            quiz_id: quiz.quiz_id,
            video_id: quiz.video_id,
            score_percent: round2(score_percent),
            points_earned: round2(points_earned),
            points_possible,
            question_feedbacks,
            submitted_at: Utc::now(),
        })
    }

    /// Grade, report, record. Fails only for an unknown quiz or a failed attempt write.
    pub async fn submit(&self, quiz_id: &str, submission: &Submission) -> Result<SubmissionResult> {
        let graded = self.grade(quiz_id, submission).await?;
        tracing::info!(
            quiz_id,
            score = graded.score_percent,
            "Graded submission"
        );

        let summary = match self.summaries.get_or_generate(&graded.video_id).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(video_id = %graded.video_id, error = %e, "No summary for report");
                None
            }
        };

        let report = self.reports.generate(&graded, summary.as_ref()).await;
        let attempt = Attempt {
            graded,
            report,
        };
        self.attempts.record(&attempt).await?;

        Ok(SubmissionResult {
            attempt: attempt.graded,
            report: attempt.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(correct: usize) -> McqQuestion {
        McqQuestion {
            id: "q1".into(),
            prompt: "Pick".into(),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: correct,
            max_points: 1.0,
            rubric_keywords: vec!["b".into()],
        }
    }

    fn short(keywords: &[&str], embedding: Option<Vec<f64>>) -> ShortQuestion {
        ShortQuestion {
            id: "q2".into(),
            prompt: "Explain".into(),
            correct_answer: "reference".into(),
            max_points: 2.0,
            rubric_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            answer_embedding: embedding,
        }
    }

    #[test]
    fn cosine_similarity_properties() {
        assert!((cosine_similarity(&[0.3, -1.2, 4.0], &[0.3, -1.2, 4.0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn keyword_matching_ignores_case() {
        let keywords = vec!["Calvin".to_string(), "light".to_string(), "ATP".to_string()];
        assert_eq!(count_keyword_matches("the calvin cycle uses LIGHT", &keywords), 2);
        assert_eq!(count_keyword_matches("", &keywords), 0);
    }

    #[test]
    fn mcq_is_all_or_nothing() {
        let question = mcq(1);
        assert_eq!(grade_mcq(&question, &AnswerValue::Index(1)).points_earned, 1.0);

        let wrong = grade_mcq(&question, &AnswerValue::Index(2));
        assert_eq!(wrong.points_earned, 0.0);
        assert_eq!(wrong.feedback, "Incorrect. The correct answer was: b");

        assert_eq!(grade_mcq(&question, &AnswerValue::Index(-1)).points_earned, 0.0);
        // Text never matches, even when it spells the index or the option.
        assert_eq!(grade_mcq(&question, &AnswerValue::Text("1".into())).points_earned, 0.0);
        assert_eq!(grade_mcq(&question, &AnswerValue::Text("b".into())).points_earned, 0.0);
    }

    #[test]
    fn similarity_thresholds() {
        let question = short(&[], Some(vec![1.0, 0.0]));

        let full = grade_short(&question, "x", Some(&[1.0, 0.0]));
        assert_eq!(full.points_earned, 2.0);
        assert!(full.feedback.contains("Similarity: 1.00"));

        // cos = 0.8
        let partial = grade_short(&question, "x", Some(&[0.8, 0.6]));
        assert_eq!(partial.points_earned, 1.0);
        assert!(partial.feedback.starts_with("Partially correct (50% credit)"));

        let none = grade_short(&question, "x", Some(&[0.0, 1.0]));
        assert_eq!(none.points_earned, 0.0);
    }

    #[test]
    fn keyword_fallback_without_embeddings() {
        let question = short(&["alpha", "beta", "gamma", "delta"], Some(vec![1.0]));

        // 3 of 4 = 75% -> full credit, plus 0.3 bonus.
        let full = grade_short(&question, "alpha beta gamma", None);
        assert_eq!(full.points_earned, 2.3);
        assert_eq!(
            full.feedback,
            "Good answer based on keywords. (+0.3 bonus for keywords)"
        );

        // 2 of 4 = 50% -> half credit, plus 0.2 bonus.
        assert_eq!(grade_short(&question, "alpha beta", None).points_earned, 1.2);

        // 1 of 4 = 25% -> only the bonus.
        assert_eq!(grade_short(&question, "alpha", None).points_earned, 0.1);
        assert_eq!(grade_short(&question, "", None).points_earned, 0.0);
    }

    #[test]
    fn empty_rubric_gets_full_keyword_credit() {
        let question = short(&[], None);
        let grade = grade_short(&question, "a real answer", None);
        assert_eq!(grade.points_earned, question.max_points);
        assert_eq!(grade.feedback, "Good answer based on keywords.");
    }

    #[test]
    fn bonus_is_capped_but_not_clamped() {
        let keywords = ["a1", "a2", "a3", "a4", "a5", "a6", "a7"];
        let question = short(&keywords, Some(vec![1.0, 0.0]));
        let grade = grade_short(&question, "a1 a2 a3 a4 a5 a6 a7", Some(&[1.0, 0.0]));
        assert_eq!(grade.points_earned, 2.5);
        assert!(grade.feedback.ends_with("(+0.5 bonus for keywords)"));
    }
}
