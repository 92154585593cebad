use std::sync::Arc;

use serde::Deserialize;

use crate::{
    gateway::TextGenerator,
    output::{ModelOutput, parse_model_output},
    types::{GradedAttempt, MicroExercise, Report, VideoSummary},
};

fn report_prompt(attempt: &GradedAttempt, summary: Option<&VideoSummary>) -> String {
    let summary_text = match summary {
        Some(summary) => format!(
            "Summary: {}\nKey Points: {}",
            summary.summary,
            summary.takeaways.join(", ")
        ),
        None => "Summary not available".to_string(),
    };

    let question_details = attempt
        .question_feedbacks
        .iter()
        .map(|q| {
            format!(
                "Q{} ({}): {}/{} pts - {}",
                q.question_id,
                q.question_type.as_str(),
                q.points_earned,
                q.max_points,
                q.feedback
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Generate a detailed learning report for a student who just completed a quiz.

Student Performance:
Score: {score}%
Points: {earned}/{possible}

Video Summary:
{summary_text}

Quiz Questions & Student Performance:
{question_details}

Provide a comprehensive learning report in JSON format with:
{{
  "overall_percent": {score},
  "strengths": ["strength1", "strength2"],
  "weaknesses": ["weakness1", "weakness2"],
  "detailed_feedback": ["feedback point 1", "feedback point 2", "feedback point 3"],
  "micro_exercises": [
    {{"task": "exercise 1", "purpose": "reinforce concept X"}},
    {{"task": "exercise 2", "purpose": "practice skill Y"}}
  ]
}}

Respond with ONLY valid JSON (no markdown, no code fences).
"#,
        score = attempt.score_percent,
        earned = attempt.points_earned,
        possible = attempt.points_possible,
    )
}

/// Report as the backend writes it. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct RawReport {
    overall_percent: Option<f64>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    detailed_feedback: Vec<String>,
    #[serde(default)]
    micro_exercises: Vec<MicroExercise>,
}

impl RawReport {
    fn into_report(self, score_percent: f64) -> Report {
        Report {
            overall_percent: self.overall_percent.unwrap_or(score_percent),
            strengths: self.strengths,
            weaknesses: self.weaknesses,
            detailed_feedback: self.detailed_feedback,
            micro_exercises: self.micro_exercises,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn exercise(task: &str, purpose: &str) -> MicroExercise {
    MicroExercise {
        task: task.to_string(),
        purpose: purpose.to_string(),
    }
}

/// Deterministic report bucketed by score tier.
pub fn fallback_report(attempt: &GradedAttempt) -> Report {
    let score = attempt.score_percent;

    let (strengths, weaknesses) = if score >= 80.0 {
        (
            strings(&[
                "Strong understanding of the video content",
                "Excellent performance on quiz questions",
            ]),
            strings(&["Minor areas for improvement in detail retention"]),
        )
    } else if score >= 60.0 {
        (
            strings(&[
                "Good grasp of main concepts",
                "Adequate comprehension of key points",
            ]),
            strings(&[
                "Some concepts need reinforcement",
                "Consider reviewing sections where points were lost",
            ]),
        )
    } else {
        (
            strings(&["Attempted all questions"]),
            strings(&[
                "Need to review video content more thoroughly",
                "Key concepts not fully understood",
                "Recommend re-watching the video",
            ]),
        )
    };

    let mut detailed_feedback: Vec<String> = attempt
        .question_feedbacks
        .iter()
        .filter(|q| q.points_earned < q.max_points)
        .map(|q| {
            format!(
                "Question {}: Review this topic for better understanding",
                q.question_id
            )
        })
        .collect();
    if detailed_feedback.is_empty() {
        detailed_feedback.push("Great job! All questions answered correctly.".to_string());
    }

    let mut micro_exercises = vec![
        exercise(
            "Re-watch the video and take notes on key concepts",
            "Reinforce understanding",
        ),
        exercise(
            "Explain the main idea to someone else",
            "Test comprehension through teaching",
        ),
    ];
    if score < 70.0 {
        micro_exercises.push(exercise(
            "Create a mind map of the video's main topics",
            "Visualize concept relationships",
        ));
    }

    Report {
        overall_percent: score,
        strengths,
        weaknesses,
        detailed_feedback,
        micro_exercises,
    }
}

/// Turns a graded attempt into a report. Never fails: every backend problem falls back to
/// [`fallback_report`].
#[derive(Clone)]
pub struct ReportGenerator {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ReportGenerator {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub async fn generate(&self, attempt: &GradedAttempt, summary: Option<&VideoSummary>) -> Report {
        let Some(generator) = self.generator.as_deref() else {
            tracing::warn!("No generation backend, using fallback report");
            return fallback_report(attempt);
        };

        tracing::info!(score = attempt.score_percent, "Generating report");
        let raw = match generator
            .generate_text(&report_prompt(attempt, summary))
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Report generation failed, using fallback");
                return fallback_report(attempt);
            }
        };

        match parse_model_output::<RawReport>(&raw) {
            ModelOutput::Parsed(report) => report.into_report(attempt.score_percent),
            ModelOutput::Malformed(_) => {
                tracing::warn!("Report was not valid JSON, using fallback");
                fallback_report(attempt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::{
        error::{LearnerError, Result},
        types::{AnswerValue, QuestionFeedback, QuestionType},
    };

    fn attempt(score_percent: f64, earned: &[(f64, f64)]) -> GradedAttempt {
        GradedAttempt {
            attempt_id: Uuid::new_v4(),
            quiz_id: "quiz".into(),
            video_id: "vid".into(),
            score_percent,
            points_earned: earned.iter().map(|(e, _)| e).sum(),
            points_possible: earned.iter().map(|(_, m)| m).sum(),
            question_feedbacks: earned
                .iter()
                .enumerate()
                .map(|(i, (e, m))| QuestionFeedback {
                    question_id: i,
                    question_type: QuestionType::Mcq,
                    student_answer: AnswerValue::Index(0),
                    points_earned: *e,
                    max_points: *m,
                    feedback: String::new(),
                })
                .collect(),
            submitted_at: Utc::now(),
        }
    }

    struct Reply(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl TextGenerator for Reply {
        async fn generate_text(&self, _prompt: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .map_err(|e| LearnerError::upstream("generation backend", e))
        }

        async fn embed_text(&self, _text: &str) -> Option<Vec<f64>> {
            None
        }
    }

    #[test]
    fn low_score_recommends_review() {
        let report = fallback_report(&attempt(45.0, &[(1.0, 1.0), (0.0, 1.0)]));
        assert_eq!(report.overall_percent, 45.0);
        assert!(
            report
                .weaknesses
                .iter()
                .any(|w| w.contains("review") || w.contains("re-watching"))
        );
        assert_eq!(
            report.detailed_feedback,
            vec!["Question 1: Review this topic for better understanding"]
        );
        assert_eq!(report.micro_exercises.len(), 3);
    }

    #[test]
    fn perfect_score_congratulates() {
        let report = fallback_report(&attempt(100.0, &[(1.0, 1.0)]));
        assert_eq!(
            report.detailed_feedback,
            vec!["Great job! All questions answered correctly."]
        );
        assert_eq!(report.strengths.len(), 2);
        assert_eq!(report.micro_exercises.len(), 2);
    }

    #[test]
    fn middle_tier() {
        let report = fallback_report(&attempt(65.0, &[(0.5, 1.0)]));
        assert_eq!(report.strengths[0], "Good grasp of main concepts");
        assert_eq!(report.micro_exercises.len(), 3);
    }

    #[tokio::test]
    async fn absent_backend_uses_fallback() {
        let report = ReportGenerator::new(None)
            .generate(&attempt(45.0, &[(0.0, 1.0)]), None)
            .await;
        assert_eq!(report, fallback_report(&attempt(45.0, &[(0.0, 1.0)])));
    }

    #[tokio::test]
    async fn partial_backend_report_is_defaulted() {
        let generator = ReportGenerator::new(Some(Arc::new(Reply(Ok(
            r#"{"strengths": ["Clear recall"]}"#,
        )))));
        let report = generator.generate(&attempt(72.5, &[(1.0, 1.0)]), None).await;
        assert_eq!(report.overall_percent, 72.5);
        assert_eq!(report.strengths, vec!["Clear recall"]);
        assert!(report.weaknesses.is_empty());
        assert!(report.micro_exercises.is_empty());
    }

    #[tokio::test]
    async fn failing_backend_falls_back() {
        let graded = attempt(30.0, &[(0.0, 2.0)]);
        for reply in [Err("down"), Ok("no json here")] {
            let report = ReportGenerator::new(Some(Arc::new(Reply(reply))))
                .generate(&graded, None)
                .await;
            assert_eq!(report, fallback_report(&graded));
        }
    }
}
