//! Error taxonomy shared by the queue, the generation backends and the batch
//! driver. Skips (`NotDue`, `AlreadyExists`) are not errors; they are
//! [`crate::scheduler::PostOutcome`] variants.
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::model::Backend;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue file not found: {}", .0.display())]
    ConfigMissing(PathBuf),
    #[error("queue I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("queue file {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{backend} generation timed out after {}s", after.as_secs())]
    Timeout { backend: Backend, after: Duration },
    #[error("local engine failed: {message}")]
    Process { message: String },
    #[error("remote API error{}: {message}", status.map(|s| format!(" {s}")).unwrap_or_default())]
    Api { status: Option<u16>, message: String },
    #[error("remote API key is required (use --api-key or set the configured environment variable)")]
    MissingCredential,
}

impl GenerationError {
    pub fn process(message: impl Into<String>) -> Self {
        GenerationError::Process {
            message: message.into(),
        }
    }

    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        GenerationError::Api {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("local engine probe failed for model {model}; check that the engine is running and the model is pulled, or pass --debug to skip the check")]
    ProbeFailed { model: String },
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("sentinel I/O error on {}: {source}", path.display())]
    Sentinel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
