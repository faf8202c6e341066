//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use migratebot_convert::{Converter, OpenRouterClient};
use migratebot_core::{
    JobOutcome, Orchestrator, ProgressReporter, RunContext, RunSummary, Services, SystemRunner,
    write_progress_report,
};
use migratebot_diff::{FontFace, visualize};
use migratebot_extract::HttpPageFetcher;
use migratebot_forge::{GitHubClient, HttpImageHost, sweep_branches};
use migratebot_shared::{
    AppConfig, ImageHost, JobStatus, SlugTable, Ticket, apply_repository_override, init_config,
    load_config, load_config_from, load_credentials, load_github_token,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// migratebot: migrate reference pages into the docs corpus, one ticket at a time.
#[derive(Parser)]
#[command(
    name = "migratebot",
    version,
    about = "Migrate reference pages into the documentation corpus from tracker tickets.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./migratebot.toml, then ~/.migratebot/migratebot.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process every open migration ticket.
    Run,

    /// Delete migration branches that no open pull request uses.
    Sweep {
        /// List stale branches without deleting them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the migration progress report.
    Progress {
        /// Report file.
        #[arg(short, long, default_value = "PROGRESS.md")]
        output: PathBuf,
    },

    /// Render a diff image for two linearized text files.
    Diff {
        /// Text before migration.
        old: PathBuf,
        /// Text after migration.
        new: PathBuf,
        /// PNG output path.
        #[arg(short, long, default_value = "diff.png")]
        output: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init {
        /// Directory to write migratebot.toml into.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "migratebot=info",
        1 => "migratebot=debug",
        _ => "migratebot=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run => cmd_run(resolve_config(cli.config.as_deref())?).await,
        Command::Sweep { dry_run } => cmd_sweep(resolve_config(cli.config.as_deref())?, dry_run).await,
        Command::Progress { output } => cmd_progress(resolve_config(cli.config.as_deref())?, &output),
        Command::Diff { old, new, output } => {
            cmd_diff(resolve_config(cli.config.as_deref())?, &old, &new, &output)
        }
        Command::Config { action } => match action {
            ConfigAction::Init { dir } => cmd_config_init(&dir),
            ConfigAction::Show => cmd_config_show(resolve_config(cli.config.as_deref())?),
        },
    }
}

/// Load the config file and apply environment overrides.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    apply_repository_override(
        &mut config,
        std::env::var("GITHUB_REPOSITORY").ok().as_deref(),
    );
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: AppConfig) -> Result<()> {
    // Validate credentials before touching any ticket
    let credentials = load_credentials(&config)?;

    let slugs = SlugTable::load(&config.corpus.slug_map_path())?;
    let converter = Converter::from_config(&config)?;

    let github = GitHubClient::new(&config.github, credentials.github_token.clone())?;
    let fetcher = HttpPageFetcher::new()?;
    let model = OpenRouterClient::new(&config.openrouter, credentials.model_api_key.clone())?;
    let image_host = config
        .image_host
        .as_ref()
        .map(|host| HttpImageHost::new(host, credentials.image_host_token.clone()))
        .transpose()?;
    let font = match FontFace::discover(&config.diff) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(error = %e, "no font available, diff images disabled");
            None
        }
    };
    let runner = SystemRunner;

    info!(
        repo = %github.repository(),
        slugs = slugs.len(),
        model = %config.openrouter.model,
        "starting migration run"
    );

    let services = Services {
        tracker: &github,
        fetcher: &fetcher,
        model: &model,
        change_requests: &github,
        image_host: image_host.as_ref().map(|h| h as &dyn ImageHost),
        runner: &runner,
    };
    let ctx = RunContext {
        config: &config,
        slugs: &slugs,
        converter: &converter,
        font: font.as_ref(),
    };

    let reporter = CliProgress::new();
    let summary = Orchestrator::new(services, ctx, &reporter).run().await?;

    println!();
    println!("  Migration run complete");
    println!("  Published: {}", summary.published());
    println!("  Failed:    {}", summary.failed());
    println!("  Skipped:   {}", summary.skipped());
    for (ticket, outcome) in &summary.outcomes {
        match outcome {
            JobOutcome::Published { change_request } => {
                println!("    #{ticket} -> pull request #{change_request}");
            }
            JobOutcome::Failed { stage, message } => {
                let first_line = message.lines().next().unwrap_or_default();
                println!("    #{ticket} failed while {stage}: {first_line}");
            }
            JobOutcome::Skipped => {}
        }
    }
    println!();

    Ok(())
}

async fn cmd_sweep(config: AppConfig, dry_run: bool) -> Result<()> {
    let token = load_github_token(&config)?;
    let github = GitHubClient::new(&config.github, token)?;

    let report = sweep_branches(&github, &config.github.branch_prefix, dry_run).await?;

    if dry_run {
        println!("Stale branches ({}):", report.stale.len());
        for branch in &report.stale {
            println!("  {branch}");
        }
        return Ok(());
    }

    println!("Deleted {} of {} stale branches", report.deleted.len(), report.stale.len());
    for (branch, error) in &report.failed {
        println!("  failed: {branch}: {error}");
    }
    Ok(())
}

fn cmd_progress(config: AppConfig, output: &Path) -> Result<()> {
    let slugs = SlugTable::load(&config.corpus.slug_map_path())?;
    let (migrated, total) = write_progress_report(&config, &slugs, output)?;
    println!("{migrated} / {total} migrated, report written to {}", output.display());
    Ok(())
}

fn cmd_diff(config: AppConfig, old: &Path, new: &Path, output: &Path) -> Result<()> {
    let old_text = std::fs::read_to_string(old)
        .map_err(|e| eyre!("cannot read '{}': {e}", old.display()))?;
    let new_text = std::fs::read_to_string(new)
        .map_err(|e| eyre!("cannot read '{}': {e}", new.display()))?;

    let font = FontFace::discover(&config.diff)?;
    match visualize(&old_text, &new_text, &font)? {
        Some(png) => {
            std::fs::write(output, png)
                .map_err(|e| eyre!("cannot write '{}': {e}", output.display()))?;
            println!("Diff image written to {}", output.display());
        }
        None => println!("no differences"),
    }
    Ok(())
}

fn cmd_config_init(dir: &Path) -> Result<()> {
    let path = init_config(dir)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn job_started(&self, ticket: &Ticket, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] #{} {}", ticket.number, ticket.title));
    }

    fn stage(&self, ticket: u64, status: JobStatus) {
        self.spinner.set_message(format!("#{ticket} {status}"));
    }

    fn job_finished(&self, ticket: u64, outcome: &JobOutcome) {
        let line = match outcome {
            JobOutcome::Skipped => format!("#{ticket} already linked, skipped"),
            JobOutcome::Published { change_request } => {
                format!("#{ticket} opened pull request #{change_request}")
            }
            JobOutcome::Failed { stage, .. } => format!("#{ticket} failed while {stage}"),
        };
        self.spinner.println(line);
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
