use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use xdg::BaseDirectories;

use prt::app::App;
use prt::cache;
use prt::config::{Config, APP_NAME};
use prt::git::GitCli;
use prt::github::GitHubClient;
use prt::model::StateFilter;

#[derive(Parser, Debug)]
#[command(name = "prt")]
#[command(about = "TUI for triaging and reviewing pull requests across repositories")]
#[command(version)]
struct Args {
    /// Repository to include (e.g., "owner/repo"). Repeatable.
    #[arg(short, long = "repo")]
    repos: Vec<String>,

    /// Pull request state to list
    #[arg(short, long, value_enum, default_value_t = StateFilter::Open)]
    state: StateFilter,

    /// Local working copy used to compute diffs (default: current directory)
    #[arg(short = 'C', long)]
    workdir: Option<String>,

    /// Config file (default: ~/.config/prt/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// 端末は TUI が使うのでログはファイルに書く
fn init_tracing(config: &Config) -> Result<()> {
    let log_path = BaseDirectories::with_prefix(APP_NAME)
        .context("Failed to resolve XDG directories")?
        .place_state_file("prt.log")
        .context("Failed to create log directory")?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;

    let filter = EnvFilter::try_from_env("PRT_LOG")
        .or_else(|_| EnvFilter::try_new(config.log_filter.as_deref().unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    init_tracing(&config)?;

    let repos = config.repo_keys(&args.repos)?;
    if repos.is_empty() {
        anyhow::bail!(
            "No repositories given. Pass --repo owner/name or set 'repositories' in the config file."
        );
    }
    if let Err(e) = cache::record_visits(repos.iter().map(|r| r.name.as_str())) {
        tracing::warn!("Failed to record recent repositories: {:#}", e);
    }
    tracing::info!(repositories = repos.len(), "Starting prt");

    let client = Arc::new(GitHubClient::new(config.page_size));
    let git = Arc::new(GitCli::new(args.workdir));
    let mut app = App::new(config, repos, args.state, client, git);

    app.run().await
}
