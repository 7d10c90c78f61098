use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use blogsmith::config::{self, Config, RunOptions};
use blogsmith::engine::OllamaEngine;
use blogsmith::generator::{ContentGenerator, GenerationLimits};
use blogsmith::remote::OpenAiClient;
use blogsmith::scheduler::{RunOutcome, Scheduler};
use blogsmith::sentinel::Sentinel;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Generate pending blog posts from the queue file",
    long_about = "Generate pending blog posts from the queue file.\n\nBy default only posts scheduled for now or earlier are generated. A missing queue file is replaced by a sample entry."
)]
struct Args {
    /// Path to YAML config file (built-in defaults when absent)
    #[arg(long, default_value = "blogsmith.yaml")]
    config: PathBuf,

    /// Generate all pending posts regardless of their scheduled date
    #[arg(short, long)]
    force: bool,

    /// Local engine model to use (default from config)
    #[arg(short, long)]
    model: Option<String>,

    /// Remote API key (defaults to the configured environment variable)
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Only generate pending posts whose title contains this text
    #[arg(short, long)]
    title: Option<String>,

    /// Fall back to the remote API when the local engine fails
    #[arg(short = 'o', long)]
    openai: bool,

    /// Skip the local engine probe and log at debug level
    #[arg(short, long)]
    debug: bool,

    /// Exit immediately when this cycle's run sentinel exists
    #[arg(long)]
    skip_if_sentinel: bool,

    /// Delete the run sentinel to arm the next cycle, then exit
    #[arg(long, conflicts_with = "skip_if_sentinel")]
    reset_cycle: bool,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            force: self.force,
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            title_filter: self.title.clone().filter(|t| !t.trim().is_empty()),
            fallback: self.openai,
            skip_probe: self.debug,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "blog post generation failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let cfg = config::load_or_default(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    let sentinel = Sentinel::new(&cfg.paths.sentinel_file);

    if args.reset_cycle {
        sentinel.clear()?;
        return Ok(());
    }
    if args.skip_if_sentinel && sentinel.exists() {
        info!(path = %sentinel.path().display(), "run sentinel present; this cycle already ran");
        return Ok(());
    }

    cfg.ensure_dirs().context("failed to create content directories")?;
    let options = args.run_options();
    let generator = build_generator(&cfg, &options)?;

    info!(
        model = %generator.model(),
        fallback = generator.has_fallback(),
        "starting blog post generation"
    );
    let scheduler = Scheduler::from_config(&cfg, generator, options);
    match scheduler.run(Utc::now()).await? {
        RunOutcome::Bootstrapped => {
            info!(path = %cfg.paths.queue_file.display(), "edit the sample queue and run again")
        }
        RunOutcome::NoMatch => {}
        RunOutcome::Completed(report) => {
            info!(generated = report.generated, failed = report.failed, "run complete")
        }
    }
    Ok(())
}

fn build_generator(cfg: &Config, options: &RunOptions) -> Result<ContentGenerator> {
    let engine = Arc::new(OllamaEngine::from_config(cfg));
    let mut generator = ContentGenerator::new(engine, options.model(cfg))
        .with_limits(GenerationLimits::from_config(cfg));
    if options.fallback {
        let remote = OpenAiClient::from_config(&cfg.remote, options.api_key.clone())
            .context("failed to configure remote API client")?;
        generator = generator.with_fallback(Arc::new(remote));
    }
    Ok(generator)
}
