use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use spotcast_core::{
    Config, PollConfig, RetryPolicy, SavedConfig, Settings, SpotCastApi, SpotCastClient, Workflow,
    config::{API_KEY_VAR, DEFAULT_BASE_URL, normalize_base_url},
    workflow,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "spotcast", version, about = "SeaLegs SpotCast API client")]
pub struct Cli {
    /// Log debug events to stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Local override file with KEY=VALUE lines; never replaces variables
    /// already set in the environment.
    #[arg(long, global = true, default_value = ".env")]
    pub env_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Exercise every SpotCast endpoint end to end (costs ~2 credits).
    Run(RunArgs),

    /// Show the account credit balance.
    Balance,

    /// Show the current status of a SpotCast.
    Status {
        /// SpotCast id, e.g. "sc_abc123".
        id: String,
    },

    /// List SpotCasts on the account.
    List {
        #[arg(long, default_value_t = 5)]
        limit: u32,
    },

    /// Save an API key (and optionally a base URL) to the config file.
    Configure,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Seconds between status polls.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: u64,

    /// Seconds to wait for each job before giving up.
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_timeout: u64,

    /// Page size for the history and SpotCast listings.
    #[arg(long, default_value_t = 5)]
    pub limit: u32,

    /// Total attempts for read-only requests on transient failures.
    #[arg(long, default_value_t = 1)]
    pub retries: u32,

    /// Also retry create and refresh. Each attempt may be billed.
    #[arg(long)]
    pub retry_billed: bool,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,
}

impl Cli {
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Run(args) => {
                let config = load_config(&self.env_file)?;
                run_workflow(config, args, cancel).await
            }
            Command::Balance => {
                let config = load_config(&self.env_file)?;
                let client = SpotCastClient::new(&config, cancel)?;
                let balance = client.get_balance().await?;
                workflow::write_balance(&mut io::stdout(), &balance)?;
                Ok(())
            }
            Command::Status { id } => {
                let config = load_config(&self.env_file)?;
                let client = SpotCastClient::new(&config, cancel)?;
                let report = client.get_status(&id).await?;
                workflow::write_status(&mut io::stdout(), &report)?;
                Ok(())
            }
            Command::List { limit } => {
                let config = load_config(&self.env_file)?;
                let client = SpotCastClient::new(&config, cancel)?;
                let page = client.list_spotcasts(limit).await?;
                workflow::write_spotcast_list(&mut io::stdout(), &page)?;
                Ok(())
            }
        }
    }
}

/// Environment first, then the override file, then the saved config.
fn load_config(env_file: &Path) -> anyhow::Result<Config> {
    let mut settings = Settings::from_env();
    settings.merge_env_path(env_file)?;
    let saved = SavedConfig::load_or_default();

    let config = Config::resolve(&settings, &saved)?;
    debug!(base_url = %config.base_url, "configuration loaded");
    Ok(config)
}

async fn run_workflow(
    mut config: Config,
    args: RunArgs,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    config.poll = PollConfig::new(
        Duration::from_secs(args.poll_interval),
        Duration::from_secs(args.poll_timeout),
    )?;
    config.list_limit = args.limit;
    config.retry = RetryPolicy::with_attempts(args.retries);
    config.retry_billed = args.retry_billed;
    config.request_timeout = Duration::from_secs(args.request_timeout);

    let client = SpotCastClient::new(&config, cancel.clone())?;
    let mut out = io::stdout();
    Workflow::new(&client, &config, cancel).run(&mut out).await?;

    Ok(())
}

fn configure() -> anyhow::Result<()> {
    // A broken file gets replaced rather than blocking the fix.
    let mut saved = SavedConfig::load_or_default();

    let api_key = inquire::Password::new(&format!("{API_KEY_VAR}:"))
        .without_confirmation()
        .with_help_message("Starts with sk_live_ or sk_test_")
        .prompt()
        .context("Failed to read API key")?;

    let base_url = inquire::Text::new("Base URL:")
        .with_default(saved.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))
        .prompt()
        .context("Failed to read base URL")?;

    let base_url = normalize_base_url(&base_url)?;
    saved.api_key = Some(api_key.trim().to_string());
    saved.base_url = (base_url != DEFAULT_BASE_URL).then_some(base_url);

    let path = saved.save()?;
    println!("Saved configuration to {}", path.display());

    Ok(())
}
