//! Shipwright - build manifest resolution from the command line
//!
//! Drives the resolution engine against a local git repository.
//!
//! ## Commands
//!
//! - `branches`: list branches of the repository
//! - `commits`: show history for a branch, newest first
//! - `resolve`: resolve the commit range for a strategy
//! - `files`: show the authoritative changed-file list for a strategy
//! - `assemble`: select files and print the final manifest request

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::Level;

use shipwright_core::{init_tracing, new_job_id, BuildSession, BuildStrategy};
use shipwright_providers::{
    BuildSubmitter, CachedGitProvider, CliGitProvider, DataResult, GitDataProvider,
    ManifestRequest, SubmitReceipt,
};

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve which repository files go into a deployable build", long_about = None)]
struct Cli {
    /// Path to the git repository
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Project identifier carried into the manifest
    #[arg(long, global = true)]
    project: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Full,
    SingleCommit,
    Manual,
}

impl From<StrategyArg> for BuildStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Full => BuildStrategy::Full,
            StrategyArg::SingleCommit => BuildStrategy::SingleCommit,
            StrategyArg::Manual => BuildStrategy::Manual,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List branches
    Branches,

    /// Show commit history for a branch, newest first
    Commits {
        /// Branch name
        #[arg(short, long, default_value = "main")]
        branch: String,
    },

    /// Resolve the commit range for a strategy
    Resolve {
        #[arg(short, long, value_enum)]
        strategy: StrategyArg,

        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Selected commit sha (single-commit strategy)
        #[arg(short, long)]
        commit: Option<String>,
    },

    /// Show the authoritative changed-file list for a strategy
    Files {
        #[arg(short, long, value_enum)]
        strategy: StrategyArg,

        #[arg(short, long, default_value = "main")]
        branch: String,

        #[arg(short, long)]
        commit: Option<String>,
    },

    /// Select files and print the final manifest request as JSON
    Assemble {
        #[arg(short, long, value_enum)]
        strategy: StrategyArg,

        #[arg(short, long, default_value = "main")]
        branch: String,

        #[arg(short, long)]
        commit: Option<String>,

        /// Paths to include (repeatable). Omit to include every file.
        #[arg(long = "select")]
        select: Vec<String>,

        /// Forward the environment overrides flag with the manifest
        #[arg(long)]
        apply_overrides: bool,

        /// Job id to submit under (defaults to a fresh UUID)
        #[arg(long)]
        job_id: Option<String>,
    },
}

/// Submitter that prints the manifest to stdout instead of calling a
/// build service. The receipt echoes the job id as any submitter must.
struct StdoutSubmitter;

#[async_trait]
impl BuildSubmitter for StdoutSubmitter {
    async fn submit(&self, request: &ManifestRequest) -> DataResult<SubmitReceipt> {
        println!("{}", serde_json::to_string_pretty(request).unwrap_or_default());
        Ok(SubmitReceipt {
            job_id: request.job_id.clone(),
            accepted_at: Utc::now(),
        })
    }
}

fn project_name(cli: &Cli) -> String {
    cli.project.clone().unwrap_or_else(|| {
        cli.repo
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "default".to_string())
    })
}

async fn prepare_session(
    cli: &Cli,
    strategy: BuildStrategy,
    branch: &str,
    commit: Option<&str>,
) -> Result<BuildSession> {
    let git = Arc::new(CachedGitProvider::new(CliGitProvider::for_repo(
        cli.repo.clone(),
    )));
    let submitter = Arc::new(StdoutSubmitter);

    let mut session = BuildSession::new(git, submitter);
    session.set_project(project_name(cli));
    session.set_branch(branch);
    session.set_strategy(strategy);
    if strategy != BuildStrategy::Manual {
        session.load_commits().await.context("loading history")?;
    }
    if let Some(sha) = commit {
        session.select_commit(sha);
    }
    session.load_files().await.context("loading file list")?;
    Ok(session)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.json, level);

    let git = CliGitProvider::for_repo(cli.repo.clone());
    let project = project_name(&cli);

    match &cli.command {
        Commands::Branches => {
            for branch in git.list_branches(&project).await? {
                println!("{branch}");
            }
        }

        Commands::Commits { branch } => {
            for commit in git.list_commits(&project, branch).await? {
                println!("{} {}", commit.short_sha(), commit.message);
            }
        }

        Commands::Resolve {
            strategy,
            branch,
            commit,
        } => {
            let session =
                prepare_session(&cli, (*strategy).into(), branch, commit.as_deref()).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "strategy": session.strategy(),
                    "base_sha": session.base_sha(),
                    "head_sha": session.head_sha(),
                }))?
            );
        }

        Commands::Files {
            strategy,
            branch,
            commit,
        } => {
            let session =
                prepare_session(&cli, (*strategy).into(), branch, commit.as_deref()).await?;
            for entry in session.entries() {
                println!("{:<10} {}", entry.status.label(), entry.path);
            }
        }

        Commands::Assemble {
            strategy,
            branch,
            commit,
            select,
            apply_overrides,
            job_id,
        } => {
            let mut session =
                prepare_session(&cli, (*strategy).into(), branch, commit.as_deref()).await?;
            session.advance().context("entering file selection")?;

            if select.is_empty() {
                for path in shipwright_core::leaf_paths(session.forest()) {
                    session.toggle_file(&path)?;
                }
            } else {
                for path in select {
                    session.toggle_file(path)?;
                }
            }

            // walk the remaining steps; preview is skipped for Manual
            while session.step() != shipwright_core::BuildStep::Summary {
                session.advance()?;
            }

            session.set_apply_overrides(*apply_overrides);
            let job_id = job_id.clone().unwrap_or_else(new_job_id);
            let receipt = session.submit(job_id).await?;
            eprintln!("job {} accepted at {}", receipt.job_id, receipt.accepted_at);
        }
    }

    Ok(())
}
