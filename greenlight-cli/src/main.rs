#![deny(missing_docs)]
//! Greenlight command-line interface.
//!
//! Checks GitLab projects and user profiles against the built-in compliance
//! catalog and renders scored reports.

mod gitlab;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gitlab::GitLabApiClient;
use greenlight_core::{
    Catalog, Report, TargetKind, build_catalog, format_score, render_json, render_markdown,
    run_inspection,
};
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "greenlight", version, about = "GitLab compliance checker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ConnectionArgs {
    /// Base URL of the GitLab instance.
    #[arg(long, env = "GITLAB_URL", default_value = "https://gitlab.com")]
    gitlab_url: String,
    /// Personal access token for API requests.
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one project for compliance.
    Project {
        /// Project path, URL, or numeric id.
        target: String,
        #[command(flatten)]
        connection: ConnectionArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Check one user profile for a profile README.
    User {
        /// Username, profile URL, or numeric user id.
        target: String,
        #[command(flatten)]
        connection: ConnectionArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Check projects listed in a file (one per line).
    Batch {
        /// File containing project paths or URLs (one per line).
        #[arg(short, long)]
        file: PathBuf,
        /// Maximum number of concurrent checks.
        #[arg(short = 'j', long, default_value_t = 5)]
        concurrency: usize,
        #[command(flatten)]
        connection: ConnectionArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Project {
            target,
            connection,
            report,
        } => run_single(TargetKind::Project, target, connection, report).await,
        Commands::User {
            target,
            connection,
            report,
        } => run_single(TargetKind::UserProfile, target, connection, report).await,
        Commands::Batch {
            file,
            concurrency,
            connection,
            report,
        } => run_batch(file, concurrency, connection, report).await,
    }
}

#[cfg(test)]
fn main() {}

async fn run_single(
    kind: TargetKind,
    target: String,
    connection: ConnectionArgs,
    report: OutputArgs,
) -> CliResult<()> {
    let catalog = Arc::new(build_catalog()?);
    let client = GitLabApiClient::new(connection.gitlab_url, connection.token, &catalog);

    let result = tokio::task::spawn_blocking({
        let catalog = catalog.clone();
        move || check_target(&client, &catalog, kind, &target)
    })
    .await?;

    emit_reports(&[result], &report).await
}

async fn run_batch(
    file: PathBuf,
    concurrency: usize,
    connection: ConnectionArgs,
    report: OutputArgs,
) -> CliResult<()> {
    let targets = load_targets(&file).await?;
    if targets.is_empty() {
        println!("No targets found to check.");
        return Ok(());
    }

    let catalog = Arc::new(build_catalog()?);
    let client = GitLabApiClient::new(connection.gitlab_url, connection.token, &catalog);
    let concurrency = if concurrency == 0 { 1 } else { concurrency };
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for target in targets {
        let permit = semaphore.clone().acquire_owned().await?;
        let client = client.clone();
        let catalog = catalog.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            check_target(&client, &catalog, TargetKind::Project, &target)
        });
    }

    let mut results = Vec::new();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(entry) => results.push(entry),
            Err(err) => results.push(TargetReport::failed("unknown", err.to_string())),
        }
    }
    results.sort_by(|a, b| a.target.cmp(&b.target));

    emit_reports(&results, &report).await
}

fn check_target(
    client: &GitLabApiClient,
    catalog: &Catalog,
    kind: TargetKind,
    target: &str,
) -> TargetReport {
    match run_inspection(client, catalog, kind, target) {
        Ok(report) => TargetReport::completed(target, report),
        Err(err) => TargetReport::failed(target, err.to_string()),
    }
}

/// Per-target check result: a report, or the fetch error that prevented one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetReport {
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TargetReport {
    fn completed(target: &str, report: Report) -> Self {
        Self {
            target: target.to_string(),
            report: Some(report),
            error: None,
        }
    }

    fn failed(target: &str, error: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            report: None,
            error: Some(error.into()),
        }
    }
}

async fn load_targets(path: &Path) -> CliResult<Vec<String>> {
    let contents = tokio::fs::read_to_string(path).await?;
    let targets = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    Ok(targets)
}

async fn emit_reports(results: &[TargetReport], output: &OutputArgs) -> CliResult<()> {
    let contents = match output.format {
        OutputFormat::Text => render_text(results),
        OutputFormat::Markdown => render_markdown_doc(results),
        OutputFormat::Json => render_json(results)?,
    };
    emit_output(output, contents).await
}

async fn emit_output(output: &OutputArgs, contents: String) -> CliResult<()> {
    if let Some(path) = &output.report_output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
    } else {
        print!("{contents}");
    }
    Ok(())
}

fn render_text(results: &[TargetReport]) -> String {
    let mut output = String::new();
    for result in results {
        let _ = writeln!(output, "Target: {}", result.target);
        let Some(report) = &result.report else {
            let error = result.error.as_deref().unwrap_or("no report produced");
            let _ = writeln!(output, "Status: failed ({error})");
            let _ = writeln!(output);
            continue;
        };

        let _ = writeln!(output, "Overall: {}", format_score(report.overall_score));
        let _ = writeln!(output, "Outcomes:");
        for outcome in &report.outcomes {
            let _ = writeln!(
                output,
                "- {}: {} ({})",
                outcome.rule_id,
                outcome.status.label(),
                outcome.detail
            );
        }
        if report.suggestions.is_empty() {
            let _ = writeln!(output, "Suggestions: none");
        } else {
            let _ = writeln!(output, "Suggestions:");
            for suggestion in &report.suggestions {
                let _ = writeln!(
                    output,
                    "- [{}] {}: {}",
                    suggestion.severity.label(),
                    suggestion.rule_id,
                    suggestion.text
                );
            }
        }
        let _ = writeln!(output);
    }
    output
}

fn render_markdown_doc(results: &[TargetReport]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# GitLab Compliance Report\n");
    for result in results {
        let _ = writeln!(output, "## {}\n", result.target);
        match (&result.report, &result.error) {
            (Some(report), _) => output.push_str(&render_markdown(report)),
            (None, Some(error)) => {
                let _ = writeln!(output, "Check failed: {error}\n");
            }
            (None, None) => {
                let _ = writeln!(output, "No report produced.\n");
            }
        }
    }
    output
}
