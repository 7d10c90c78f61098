use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;

use blogsmith::config;
use blogsmith::queue::QueueStore;
use blogsmith::sentinel::Sentinel;
use blogsmith::slug::slugify;
use blogsmith::writer::PostWriter;

#[derive(Parser, Debug)]
#[command(about = "Print every queue entry with its slug and generation state")]
struct Args {
    /// Path to YAML config (built-in defaults when absent)
    #[arg(long, default_value = "blogsmith.yaml")]
    config: PathBuf,

    /// Evaluate due dates as a forced run would
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load_or_default(&args.config)?;
    let store = QueueStore::new(&cfg.paths.queue_file);
    let writer = PostWriter::new(&cfg.paths.blog_dir);
    let specs = store.load()?;
    let now = Utc::now();

    println!("Queue: {} ({} entries)", store.path().display(), specs.len());
    for spec in &specs {
        let state = if spec.created {
            match spec.created_date {
                Some(at) => format!("created {}", at.format("%Y-%m-%d %H:%M")),
                None => "created".to_string(),
            }
        } else if writer.exists(spec) {
            "file exists, queue not marked".to_string()
        } else if spec.is_due(now, args.force) {
            "due".to_string()
        } else {
            match spec.scheduled_date {
                Some(at) => format!("scheduled for {}", at.format("%Y-%m-%d %H:%M")),
                None => "scheduled".to_string(),
            }
        };
        println!("  {:<40} {:<40} {}", spec.title, slugify(&spec.title), state);
    }

    let sentinel = Sentinel::new(&cfg.paths.sentinel_file);
    match sentinel.read() {
        Some(report) => println!(
            "Sentinel: present (finished {}, generated {}, failed {})",
            report
                .finished_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "unknown".into()),
            report.generated,
            report.failed
        ),
        None if sentinel.exists() => println!("Sentinel: present (unreadable)"),
        None => println!("Sentinel: absent"),
    }
    Ok(())
}
