//! Terminal front-end for the interview-prep backend.

mod config;
mod render;

use std::future::Future;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use interview_stream::config::DEFAULT_BASE_URL;
use interview_stream::prelude::*;
use interview_stream::{EndpointRequest, init_observability};

use crate::render::{RenderEnd, render_result, render_session};

#[derive(Debug, Parser)]
#[command(name = "interview", version, about = "Stream interview questions, evaluations and resume analyses")]
pub struct Cli {
    /// Backend base URL.
    #[arg(long, global = true, env = "INTERVIEW_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    /// Bearer token sent with every request.
    #[arg(long, global = true, env = "INTERVIEW_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Timeout in seconds for streaming requests.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
    /// Timeout in seconds for resume uploads.
    #[arg(long, global = true)]
    pub upload_timeout_secs: Option<u64>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate interview questions.
    Questions(QuestionsArgs),
    /// Submit an answer and stream its evaluation.
    Evaluate(EvaluateArgs),
    /// Ask the knowledge base.
    Chat(ChatArgs),
    /// Upload a resume and print its analysis.
    AnalyzeResume(AnalyzeResumeArgs),
}

#[derive(Debug, Args)]
pub struct QuestionsArgs {
    #[command(subcommand)]
    pub source: QuestionSource,
    #[arg(long, default_value = "intermediate", value_parser = parse_difficulty)]
    pub difficulty: Difficulty,
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub count: u32,
    #[arg(long)]
    pub user_id: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum QuestionSource {
    /// Questions for a company and position.
    Company { company: String, position: String },
    /// Practice questions for the given keywords.
    Practice { keywords: String },
    /// Questions based on a resume, uploading `--file` first when given.
    Resume {
        /// Resume to upload before generating questions; otherwise the last
        /// uploaded one is used.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub question: String,
    #[arg(long)]
    pub answer: String,
    /// JSON file with a resume analysis; switches to resume-based evaluation.
    #[arg(long)]
    pub resume_analysis: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    pub query: String,
    #[arg(long, default_value_t = 3)]
    pub top_k: u32,
}

#[derive(Debug, Args)]
pub struct AnalyzeResumeArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub target_position: Option<String>,
    #[arg(long)]
    pub job_description: Option<String>,
    #[command(flatten)]
    pub retry: RetryArgs,
}

#[derive(Debug, Args)]
pub struct RetryArgs {
    /// Total upload attempts.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: u32,
    /// Delay before the first retry; doubles on each later one.
    #[arg(long, default_value_t = 1_000)]
    pub base_delay_ms: u64,
}

fn parse_difficulty(value: &str) -> Result<Difficulty, String> {
    value.parse().map_err(|e: ClientError| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init();
    init_observability();
    let cli = Cli::parse();

    let client = InterviewClient::new(config::client_config(&cli))?;
    let credentials = config::credentials(&cli);
    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; cancelling");
            on_interrupt.cancel();
        }
    });

    match &cli.command {
        Command::Questions(args) => match &args.source {
            QuestionSource::Company { company, position } => {
                let mut req = CompanyInterviewRequest::new(company, position);
                req.difficulty = args.difficulty;
                req.question_count = args.count;
                req.user_id = args.user_id.clone();
                stream(&client, &req, &credentials, &cancel).await
            }
            QuestionSource::Practice { keywords } => {
                let mut req = SelfInterviewRequest::new(keywords);
                req.difficulty = args.difficulty;
                req.question_count = args.count;
                req.user_id = args.user_id.clone();
                stream(&client, &req, &credentials, &cancel).await
            }
            QuestionSource::Resume { file } => {
                if let Some(path) = file {
                    let upload = ResumeUpload::from_path(path).await?;
                    client
                        .analyze_resume(&upload, &credentials, &RetryPolicy::none(), &cancel)
                        .await
                        .context("resume upload failed")?;
                    tracing::info!(file = %path.display(), "resume uploaded");
                }
                let req = ResumeInterviewRequest {
                    difficulty: args.difficulty,
                    question_count: args.count,
                    user_id: args.user_id.clone(),
                };
                stream(&client, &req, &credentials, &cancel).await
            }
        },
        Command::Evaluate(args) => match &args.resume_analysis {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let analysis = serde_json::from_str(&raw)
                    .with_context(|| format!("{} is not valid JSON", path.display()))?;
                let req = ResumeAnswerEvaluation::new(&args.question, &args.answer, analysis);
                stream(&client, &req, &credentials, &cancel).await
            }
            None => {
                let req = AnswerSubmission::new(&args.question, &args.answer);
                stream(&client, &req, &credentials, &cancel).await
            }
        },
        Command::Chat(args) => {
            let req = KnowledgeQuery {
                query: args.query.clone(),
                top_k: args.top_k,
            };
            stream(&client, &req, &credentials, &cancel).await
        }
        Command::AnalyzeResume(args) => {
            let mut upload = ResumeUpload::from_path(&args.file).await?;
            if let Some(position) = &args.target_position {
                upload = upload.with_target_position(position);
            }
            if let Some(description) = &args.job_description {
                upload = upload.with_job_description(description);
            }
            let policy = config::retry_policy(&args.retry);
            let result = client
                .analyze_resume(&upload, &credentials, &policy, &cancel)
                .await
                .context("resume analysis failed")?;
            let mut out = std::io::stdout().lock();
            render_result(&result, &mut out)?;
            out.flush()?;
            Ok(())
        }
    }
}

async fn stream<R: EndpointRequest>(
    client: &InterviewClient,
    request: &R,
    credentials: &Credentials,
    cancel: &CancelHandle,
) -> anyhow::Result<()> {
    let Some(opened) = until_cancelled(cancel, client.open(request, credentials)).await else {
        println!("[cancelled]");
        return Ok(());
    };
    let session = opened
        .with_context(|| format!("failed to open {}", R::ENDPOINT))?
        .with_cancel_handle(cancel.clone());
    let mut out = std::io::stdout();
    let (answer, end) = render_session(session, &mut out).await?;
    if matches!(end, RenderEnd::Completed) && !answer.has_usable_content() {
        if let Some(message) = answer.error_signals.last() {
            anyhow::bail!("backend reported an error: {message}");
        }
        anyhow::bail!("stream ended without any content");
    }
    Ok(())
}

/// Resolves to `None` as soon as `cancel` fires, dropping `fut`.
async fn until_cancelled<F: Future>(cancel: &CancelHandle, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}
