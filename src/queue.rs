//! File-backed queue of post entries.
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::QueueError;
use crate::model::PostSpec;

#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every queue entry. A missing file is reported as
    /// [`QueueError::ConfigMissing`] so the caller can bootstrap.
    pub fn load(&self) -> Result<Vec<PostSpec>, QueueError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(QueueError::ConfigMissing(self.path.clone()))
            }
            Err(source) => {
                return Err(QueueError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let specs: Vec<PostSpec> = serde_json::from_str(&raw).map_err(|source| QueueError::Parse {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), entries = specs.len(), "loaded queue");
        Ok(specs)
    }

    /// Replace the queue file. Writes a sibling temp file, syncs it and
    /// renames it into place so readers never see a partial queue.
    pub fn save(&self, specs: &[PostSpec]) -> Result<(), QueueError> {
        let io_err = |source| QueueError::Io {
            path: self.path.clone(),
            source,
        };
        let mut json = serde_json::to_string_pretty(specs).map_err(|source| QueueError::Parse {
            path: self.path.clone(),
            source,
        })?;
        json.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp_path = self.temp_path();
        let written = (|| {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        })();
        if let Err(source) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_err(source));
        }
        debug!(path = %self.path.display(), entries = specs.len(), "saved queue");
        Ok(())
    }

    /// Write the first-run sample queue: one post scheduled a week after `now`.
    pub fn bootstrap(&self, now: DateTime<Utc>) -> Result<Vec<PostSpec>, QueueError> {
        let sample = vec![sample_post(now)];
        self.save(&sample)?;
        info!(path = %self.path.display(), "created sample queue file; edit it and run again");
        Ok(sample)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "queue".into());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
    }
}

pub fn sample_post(now: DateTime<Utc>) -> PostSpec {
    PostSpec::new(
        "Sample Post Title",
        vec!["JavaScript".into(), "Web Development".into()],
    )
    .scheduled_for(now + Duration::weeks(1))
}

/// Entries not yet created, narrowed to titles containing `filter`
/// (case-insensitive) when one is given. Returns indices into `specs`.
pub fn pending_indices(specs: &[PostSpec], filter: Option<&str>) -> Vec<usize> {
    let needle = filter.map(str::to_lowercase);
    specs
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.created)
        .filter(|(_, s)| match &needle {
            Some(n) => s.title.to_lowercase().contains(n.as_str()),
            None => true,
        })
        .map(|(i, _)| i)
        .collect()
}
