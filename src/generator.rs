use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::engine::LocalEngine;
use crate::error::GenerationError;
use crate::model::{Backend, GeneratedContent};
use crate::remote::RemoteApi;

/// Wall-clock ceilings per backend attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationLimits {
    pub local: Duration,
    pub remote: Duration,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            local: Duration::from_secs(10 * 60),
            remote: Duration::from_secs(60),
        }
    }
}

impl GenerationLimits {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            local: cfg.engine.run_timeout(),
            remote: cfg.remote.timeout(),
        }
    }
}

/// Fixed long-form prompt for one post.
pub fn build_prompt(title: &str, tags: &[String]) -> String {
    format!(
        r#"Write a comprehensive, well-structured blog post with the title: "{title}"

The blog post should:
1. Have an engaging introduction that explains the topic.
2. Include multiple sections with detailed information.
3. Use markdown formatting with proper headings, lists, code blocks (if relevant), and emphasis.
4. Be approximately 1500-2000 words.
5. Include practical examples and best practices.
6. End with a conclusion summarizing key points.
7. Be written in a professional but conversational tone.
8. Target web developers and technology enthusiasts.
9. Include relevant information about: {tags}

DO NOT include any placeholders - write complete, thoughtful content.
"#,
        tags = tags.join(", ")
    )
}

/// Runs the local engine first and, when a remote client is attached, falls
/// back to it once. No retries beyond that; a failed post waits for the next
/// trigger.
pub struct ContentGenerator {
    local: Arc<dyn LocalEngine>,
    remote: Option<Arc<dyn RemoteApi>>,
    model: String,
    limits: GenerationLimits,
}

impl ContentGenerator {
    pub fn new(local: Arc<dyn LocalEngine>, model: impl Into<String>) -> Self {
        Self {
            local,
            remote: None,
            model: model.into(),
            limits: GenerationLimits::default(),
        }
    }

    pub fn with_fallback(mut self, remote: Arc<dyn RemoteApi>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_limits(mut self, limits: GenerationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_fallback(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn probe(&self) -> bool {
        self.local.probe(&self.model).await
    }

    #[instrument(skip_all, fields(title = %title))]
    pub async fn generate(
        &self,
        title: &str,
        tags: &[String],
    ) -> Result<GeneratedContent, GenerationError> {
        let prompt = build_prompt(title, tags);

        info!(model = %self.model, "generating with local engine; this may take several minutes");
        let local_err = match bounded(
            Backend::Local,
            self.limits.local,
            self.local.run(&prompt, &self.model),
        )
        .await
        {
            Ok(text) => {
                return Ok(GeneratedContent {
                    text,
                    backend: Backend::Local,
                })
            }
            Err(err) => err,
        };
        warn!(backend = %Backend::Local, error = %local_err, "local generation failed");

        let Some(remote) = &self.remote else {
            return Err(local_err);
        };

        info!("falling back to remote API");
        match bounded(Backend::Remote, self.limits.remote, remote.run(&prompt)).await {
            Ok(text) => Ok(GeneratedContent {
                text,
                backend: Backend::Remote,
            }),
            Err(err) => {
                warn!(backend = %Backend::Remote, error = %err, "remote generation failed");
                Err(err)
            }
        }
    }
}

/// Apply a deadline to one backend attempt. On expiry the attempt's future is
/// dropped, which kills a local child process and aborts an HTTP request.
async fn bounded<F>(
    backend: Backend,
    limit: Duration,
    attempt: F,
) -> Result<String, GenerationError>
where
    F: Future<Output = Result<String, GenerationError>>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout {
            backend,
            after: limit,
        }),
    }
}
