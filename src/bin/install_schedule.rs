use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

use blogsmith::config;
use blogsmith::trigger::{self, CronPlan};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Print or install the crontab entries that drive scheduled generation"
)]
struct Args {
    /// Path to YAML config file (built-in defaults when absent)
    #[arg(long, default_value = "blogsmith.yaml")]
    config: PathBuf,

    /// Project root the entries change into (defaults to the current directory)
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Generator binary to invoke (defaults to `blogsmith` next to this binary)
    #[arg(long)]
    binary: Option<PathBuf>,

    /// Merge the entries into the current user's crontab instead of printing them
    #[arg(long)]
    apply: bool,

    /// Run the generator once in debug mode and abort the install if it fails
    #[arg(long, requires = "apply")]
    test_first: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load_or_default(&args.config)?;

    let project_root = match args.project_root {
        Some(root) => root,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let binary = match args.binary {
        Some(binary) => binary,
        None => sibling_binary("blogsmith")?,
    };

    let plan = CronPlan {
        schedule: cfg.schedule.clone(),
        project_root: absolute(&project_root)?,
        binary: absolute(&binary)?,
        config: args.config.clone(),
        log_file: cfg.paths.log_file.clone(),
    };
    let entries = plan.render();

    if !args.apply {
        for line in &entries {
            println!("{line}");
        }
        return Ok(());
    }

    if args.test_first {
        let status = plan.trial_run().await.with_context(|| {
            format!("failed to run generator {}", plan.binary.display())
        })?;
        if !status.success() {
            return Err(anyhow!(
                "trial run exited with {status}; crontab left unchanged"
            ));
        }
    }

    let current = read_crontab().await?;
    let merged = trigger::merge_crontab(&current, &entries);
    write_crontab(&merged).await?;
    info!(entries = entries.len(), "installed crontab entries");
    info!(
        "primary run at {}:00, fallbacks at {:?}, reset at {}:{:02}",
        cfg.schedule.primary_hour,
        cfg.schedule.fallback_hours,
        cfg.schedule.reset_hour,
        cfg.schedule.reset_minute
    );
    info!(log = %cfg.paths.log_file.display(), "run output is appended to the log file");
    Ok(())
}

fn sibling_binary(name: &str) -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate current executable")?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow!("executable has no parent directory"))?;
    Ok(dir.join(name))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("failed to read current directory")?
        .join(path))
}

/// Current crontab; an empty string when the user has none yet.
async fn read_crontab() -> Result<String> {
    let output = Command::new("crontab")
        .arg("-l")
        .kill_on_drop(true)
        .output()
        .await
        .context("crontab is not available on this system")?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Ok(String::new())
    }
}

async fn write_crontab(contents: &str) -> Result<()> {
    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn crontab")?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(contents.as_bytes())
            .await
            .context("failed to write crontab")?;
    }
    let status = child.wait().await.context("failed to wait for crontab")?;
    if !status.success() {
        return Err(anyhow!("crontab exited with status {}", status));
    }
    Ok(())
}
