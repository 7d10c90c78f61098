//! Batch driver: probe, evaluate each pending post, generate, write, persist
//! the queue and record the run sentinel.
use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use crate::config::{Config, RunOptions};
use crate::error::{QueueError, RunError};
use crate::generator::ContentGenerator;
use crate::model::{Backend, PostSpec};
use crate::queue::{pending_indices, QueueStore};
use crate::sentinel::{RunReport, Sentinel};
use crate::slug::slugify;
use crate::writer::PostWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    SkippedNotDue,
    SkippedAlreadyExists,
    Generated { slug: String, backend: Backend },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The queue file was missing and a sample was written; nothing generated.
    Bootstrapped,
    /// The title filter matched no pending post; nothing generated.
    NoMatch,
    /// The batch ran to completion and the sentinel was written.
    Completed(RunReport),
}

pub struct Scheduler {
    queue: QueueStore,
    generator: ContentGenerator,
    writer: PostWriter,
    sentinel: Sentinel,
    options: RunOptions,
}

impl Scheduler {
    pub fn new(
        queue: QueueStore,
        generator: ContentGenerator,
        writer: PostWriter,
        sentinel: Sentinel,
        options: RunOptions,
    ) -> Self {
        Self {
            queue,
            generator,
            writer,
            sentinel,
            options,
        }
    }

    pub fn from_config(cfg: &Config, generator: ContentGenerator, options: RunOptions) -> Self {
        Self::new(
            QueueStore::new(&cfg.paths.queue_file),
            generator,
            PostWriter::new(&cfg.paths.blog_dir),
            Sentinel::new(&cfg.paths.sentinel_file),
            options,
        )
    }

    #[instrument(skip_all, fields(force = self.options.force))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunOutcome, RunError> {
        if self.options.skip_probe {
            info!("debug mode enabled, skipping local engine probe");
        } else if !self.generator.probe().await {
            return Err(RunError::ProbeFailed {
                model: self.generator.model().to_string(),
            });
        }

        let mut specs = match self.queue.load() {
            Ok(specs) => specs,
            Err(QueueError::ConfigMissing(path)) => {
                warn!(path = %path.display(), "queue file missing; bootstrapping a sample");
                self.queue.bootstrap(now)?;
                return Ok(RunOutcome::Bootstrapped);
            }
            Err(err) => return Err(err.into()),
        };

        let filter = self.options.title_filter.as_deref();
        let pending = pending_indices(&specs, filter);
        if let Some(filter) = filter {
            if pending.is_empty() {
                info!(filter, "no pending posts match the title filter");
                return Ok(RunOutcome::NoMatch);
            }
            info!(filter, matches = pending.len(), "narrowed pending posts by title");
        }

        let mut report = RunReport {
            force: self.options.force,
            pending: pending.len(),
            ..RunReport::default()
        };

        if pending.is_empty() {
            info!("no pending posts to generate; add more posts to the queue file");
        } else {
            info!(pending = pending.len(), "found pending posts");
            if self.options.force {
                info!("force mode: scheduled dates are ignored");
            }
        }

        for idx in pending {
            let spec = &mut specs[idx];
            let outcome = self.process(spec, now).await;
            match outcome {
                PostOutcome::SkippedNotDue => report.skipped_not_due += 1,
                PostOutcome::SkippedAlreadyExists => report.skipped_existing += 1,
                PostOutcome::Generated { slug, .. } => {
                    report.generated += 1;
                    report.generated_slugs.push(slug);
                }
                PostOutcome::Failed { .. } => report.failed += 1,
            }
        }

        if report.generated > 0 {
            self.queue.save(&specs)?;
            info!(path = %self.queue.path().display(), "updated queue file");
        }

        report.finished_at = Some(now);
        self.sentinel.mark(&report)?;
        info!(
            generated = report.generated,
            not_due = report.skipped_not_due,
            existing = report.skipped_existing,
            failed = report.failed,
            "blog post generation completed"
        );
        Ok(RunOutcome::Completed(report))
    }

    /// Evaluate one pending post. Generation and write failures are downgraded
    /// to [`PostOutcome::Failed`]; the post stays pending for the next trigger.
    pub async fn process(&self, spec: &mut PostSpec, now: DateTime<Utc>) -> PostOutcome {
        let title = spec.title.clone();
        if !spec.is_due(now, self.options.force) {
            info!(
                title = %title,
                scheduled = ?spec.scheduled_date,
                "post is scheduled for the future; skipping (use --force to generate anyway)"
            );
            return PostOutcome::SkippedNotDue;
        }

        let slug = slugify(&title);
        if slug.is_empty() {
            error!(title = %title, "title yields an empty slug; fix the queue entry");
            return PostOutcome::Failed {
                reason: "empty slug".into(),
            };
        }
        if self.writer.exists(spec) {
            warn!(
                title = %title,
                path = %self.writer.path_for(spec).display(),
                "content file already exists but the queue entry is not marked created; skipping"
            );
            return PostOutcome::SkippedAlreadyExists;
        }

        info!(title = %title, slug = %slug, "generating post");
        let content = match self.generator.generate(&title, &spec.tags).await {
            Ok(content) => content,
            Err(err) => {
                error!(
                    title = %title,
                    fallback = self.generator.has_fallback(),
                    error = %err,
                    "generation failed; post stays pending"
                );
                return PostOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        match self.writer.write(spec, &content.text, now) {
            Ok(Some(path)) => {
                spec.mark_created(now);
                info!(
                    title = %title,
                    path = %path.display(),
                    backend = %content.backend,
                    "generated post"
                );
                PostOutcome::Generated {
                    slug,
                    backend: content.backend,
                }
            }
            Ok(None) => PostOutcome::SkippedAlreadyExists,
            Err(err) => {
                error!(title = %title, ?err, "failed to write post");
                PostOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}
