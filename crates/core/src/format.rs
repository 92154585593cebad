use crate::types::{ClientQuestion, ClientQuiz, SubmissionResult, Transcript, VideoSummary};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format transcript segments with timestamps
pub fn format_transcript_with_timestamps(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .map(|seg| format!("[{}] {}", format_timestamp(seg.start), seg.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a video summary as human-readable markdown
pub fn format_summary_readable(summary: &VideoSummary) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Video {}\n\n", summary.video_id));
    if !summary.focus.is_empty() {
        output.push_str(&format!("**Focus:** {}\n\n", summary.focus));
    }

    output.push_str("## Summary\n\n");
    output.push_str(&summary.summary);
    output.push_str("\n\n");

    if !summary.takeaways.is_empty() {
        output.push_str("## Key Takeaways\n\n");
        for (i, takeaway) in summary.takeaways.iter().enumerate() {
            output.push_str(&format!("{}. {}\n", i + 1, takeaway));
        }
        output.push('\n');
    }

    if !summary.topics.is_empty() {
        output.push_str("## Topics Covered\n\n");
        for topic in &summary.topics {
            output.push_str(&format!("• {}\n", topic));
        }
        output.push('\n');
    }

    if !summary.highlights.is_empty() {
        output.push_str("## Highlights\n\n");
        for highlight in &summary.highlights {
            output.push_str(&format!(
                "- [{}] {}\n",
                format_timestamp(highlight.offset),
                highlight.text
            ));
        }
        output.push('\n');
    }

    output
}

/// Format a client quiz for answering in the terminal
pub fn format_quiz_readable(quiz: &ClientQuiz) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Quiz {}\n\n**Questions:** {} | **Total points:** {}\n\n",
        quiz.quiz_id,
        quiz.questions.len(),
        quiz.total_points
    ));

    for (index, question) in quiz.questions.iter().enumerate() {
        match question {
            ClientQuestion::Mcq {
                prompt,
                options,
                max_points,
                ..
            } => {
                output.push_str(&format!("### {}. {} ({} pt)\n\n", index, prompt, max_points));
                for (i, option) in options.iter().enumerate() {
                    output.push_str(&format!("  [{}] {}\n", i, option));
                }
            }
            ClientQuestion::Short {
                prompt, max_points, ..
            } => {
                output.push_str(&format!("### {}. {} ({} pts)\n\n", index, prompt, max_points));
                output.push_str("  (short answer)\n");
            }
        }
        output.push('\n');
    }

    output
}

/// Format a graded submission and its report as markdown
pub fn format_result_readable(result: &SubmissionResult) -> String {
    let mut output = String::new();
    let attempt = &result.attempt;
    let report = &result.report;

    output.push_str(&format!(
        "# Score: {:.2}% ({}/{})\n\n",
        attempt.score_percent, attempt.points_earned, attempt.points_possible
    ));

    output.push_str("## Questions\n\n");
    for feedback in &attempt.question_feedbacks {
        output.push_str(&format!(
            "- Q{} [{}] {}/{}: {}\n",
            feedback.question_id,
            feedback.question_type.as_str(),
            feedback.points_earned,
            feedback.max_points,
            feedback.feedback
        ));
    }
    output.push('\n');

    let sections = [
        ("Strengths", &report.strengths),
        ("Weaknesses", &report.weaknesses),
        ("Feedback", &report.detailed_feedback),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        output.push_str(&format!("## {}\n\n", title));
        for item in items {
            output.push_str(&format!("- {}\n", item));
        }
        output.push('\n');
    }

    if !report.micro_exercises.is_empty() {
        output.push_str("## Exercises\n\n");
        for exercise in &report.micro_exercises {
            output.push_str(&format!("- **{}**: {}\n", exercise.task, exercise.purpose));
        }
        output.push('\n');
    }

    output
}
