use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use ytlearner_core::{
    Learner, LearnerConfig, Provider, Submission, SubmitRequest,
    config::{DATA_DIR_ENV, PROVIDER_ENV},
    format_quiz_readable, format_result_readable, format_summary_readable,
    format_transcript_with_timestamps,
    quiz::{DEFAULT_NUM_MCQ, DEFAULT_NUM_SHORT},
    store::get_root_cache_dir,
};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Copy, ValueEnum)]
enum CliProvider {
    Gemini,
    Openai,
    Grok,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Gemini => Provider::Gemini,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Grok => Provider::Grok,
        }
    }
}

#[derive(Parser)]
#[command(name = "ytlearner")]
#[command(about = "Summarize YouTube videos, quiz yourself on them and get a graded learning report")]
struct Cli {
    /// AI provider, overrides LLM_PROVIDER
    #[arg(short, long, global = true)]
    provider: Option<CliProvider>,

    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the timestamped transcript of a video
    Transcript {
        /// Video id or URL
        video: String,
    },
    /// Summarize a video
    Summary {
        /// Video id or URL
        video: String,
    },
    /// Generate (or reuse) a quiz for a video
    Quiz {
        /// Video id or URL
        video: String,

        /// Number of multiple choice questions
        #[arg(long, default_value_t = DEFAULT_NUM_MCQ)]
        mcq: u32,

        /// Number of short answer questions
        #[arg(long, default_value_t = DEFAULT_NUM_SHORT)]
        short: u32,
    },
    /// Submit answers for a quiz and print the graded report
    Take {
        /// Quiz id printed by `ytlearner quiz`
        quiz_id: String,

        /// JSON file shaped like {"answers": [{"questionId": 0, "answer": 1}]}
        #[arg(short, long)]
        answers: PathBuf,
    },
}

/// Accept a bare video id or a watch, shorts, embed or youtu.be URL.
fn video_id(input: &str) -> String {
    let input = input.trim();

    let watch_param = input
        .split_once('?')
        .and_then(|(_, query)| query.split('&').find_map(|pair| pair.strip_prefix("v=")));
    if let Some(id) = watch_param {
        return id.to_string();
    }

    for marker in ["youtu.be/", "/shorts/", "/embed/"] {
        if let Some((_, rest)) = input.split_once(marker) {
            return rest.split(['?', '&', '/']).next().unwrap_or(rest).to_string();
        }
    }

    input.to_string()
}

/// Environment lookup with the CLI's overrides applied.
///
/// Unlike the server, the CLI persists by default: `quiz` and `take` run as separate processes.
fn cli_lookup(
    provider: Option<Provider>,
    env: impl Fn(&str) -> Option<String>,
) -> impl Fn(&str) -> Option<String> {
    let default_data_dir = get_root_cache_dir().join("data");
    move |key| match key {
        PROVIDER_ENV if provider.is_some() => provider.map(|p| p.name().to_string()),
        DATA_DIR_ENV => env(key)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| Some(default_data_dir.display().to_string())),
        _ => env(key),
    }
}

fn create_spinner(msg: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Close a spinner with a tick or a cross depending on how the step went.
fn finish_step<T>(
    spinner: ProgressBar,
    started: Instant,
    result: ytlearner_core::Result<T>,
    done: impl FnOnce(&T) -> String,
) -> Result<T> {
    match result {
        Ok(value) => {
            spinner.finish_with_message(format!(
                "{} {} {}",
                style("✓").green().bold(),
                done(&value),
                style(format!("[{}]", format_duration(started.elapsed()))).dim()
            ));
            Ok(value)
        }
        Err(e) => {
            spinner.finish_with_message(format!("{} {}", style("✗").red().bold(), style(&e).red()));
            Err(e.into())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let provider = cli.provider.map(Provider::from);
    let config = LearnerConfig::from_lookup(cli_lookup(provider, |key| std::env::var(key).ok()))
        .context("invalid configuration")?;

    if let Err(e) = config.provider.validate_api_key() {
        eprintln!(
            "{} {} (template fallbacks only)",
            style("Warning:").yellow().bold(),
            e
        );
    }

    let learner = Learner::from_config(&config).await?;

    if !cli.json {
        println!(
            "\n{}  {}\n",
            style("ytlearner").cyan().bold(),
            style("Video Learner").dim()
        );
    }

    let total_start = Instant::now();

    match cli.command {
        Command::Transcript { video } => {
            let id = video_id(&video);
            let spinner = create_spinner("Fetching transcript...", cli.json);
            let transcript = finish_step(
                spinner,
                Instant::now(),
                learner.transcript(&id).await,
                |t| {
                    let minutes = t.segments.last().map(|s| s.end / 60.0).unwrap_or(0.0);
                    format!("Transcript: {:.1} min, {} segments", minutes, t.segments.len())
                },
            )?;

            if cli.json {
                return print_json(&transcript);
            }
            println!("{}", style("─".repeat(60)).dim());
            println!("{}", format_transcript_with_timestamps(&transcript));
        }
        Command::Summary { video } => {
            let id = video_id(&video);
            let spinner = create_spinner(
                &format!("Summarizing with {}...", config.provider.name()),
                cli.json,
            );
            let summary = finish_step(
                spinner,
                Instant::now(),
                learner.summary(&id).await,
                |s| format!("Summary ready ({} takeaways)", s.takeaways.len()),
            )?;

            if cli.json {
                return print_json(&summary);
            }
            println!("{}", style("─".repeat(60)).dim());
            println!("{}", format_summary_readable(&summary));
        }
        Command::Quiz { video, mcq, short } => {
            let id = video_id(&video);
            let spinner = create_spinner("Preparing quiz...", cli.json);
            let quiz = finish_step(
                spinner,
                Instant::now(),
                learner.quiz(&id, mcq, short).await,
                |q| format!("Quiz ready: {} questions", q.questions.len()),
            )?;

            if cli.json {
                return print_json(&quiz);
            }
            println!("{}", style("─".repeat(60)).dim());
            println!("{}", format_quiz_readable(&quiz));
            println!(
                "{} ytlearner take {} --answers answers.json",
                style("Submit with:").dim(),
                style(&quiz.quiz_id).cyan()
            );
        }
        Command::Take { quiz_id, answers } => {
            let raw = tokio::fs::read_to_string(&answers)
                .await
                .with_context(|| format!("failed to read {}", answers.display()))?;
            let request: SubmitRequest = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a valid answers file", answers.display()))?;
            let submission = Submission::from(request);

            let spinner = create_spinner("Grading...", cli.json);
            let result = finish_step(
                spinner,
                Instant::now(),
                learner.submit(&quiz_id, &submission).await,
                |r| format!("Graded: {:.2}%", r.attempt.score_percent),
            )?;

            if cli.json {
                return print_json(&result);
            }
            println!("{}", style("─".repeat(60)).dim());
            println!("{}", format_result_readable(&result));
        }
    }

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_ids_from_urls() {
        assert_eq!(video_id("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ?t=3"), "dQw4w9WgXcQ");
        assert_eq!(
            video_id("https://www.youtube.com/shorts/abc123"),
            "abc123"
        );
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn lookup_defaults_data_dir_and_overrides_provider() {
        let lookup = cli_lookup(Some(Provider::Grok), |key| match key {
            "LLM_PROVIDER" => Some("openai".to_string()),
            _ => None,
        });
        assert_eq!(lookup(PROVIDER_ENV).as_deref(), Some("Grok"));
        assert!(lookup(DATA_DIR_ENV).unwrap().ends_with("data"));

        let config = LearnerConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.provider, Provider::Grok);
        assert!(config.data_dir.is_some());
    }

    #[test]
    fn explicit_data_dir_wins() {
        let lookup = cli_lookup(None, |key| {
            (key == DATA_DIR_ENV).then(|| "/srv/ytlearner".to_string())
        });
        assert_eq!(lookup(DATA_DIR_ENV).as_deref(), Some("/srv/ytlearner"));
    }
}
