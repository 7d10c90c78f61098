//! Per-cycle run marker. Presence means "this cycle's batch run completed";
//! the content is the run report of that batch.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::RunError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub finished_at: Option<DateTime<Utc>>,
    pub force: bool,
    pub pending: usize,
    pub generated: usize,
    pub skipped_not_due: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    #[serde(default)]
    pub generated_slugs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Sentinel {
    path: PathBuf,
}

impl Sentinel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Record a completed run for this cycle, replacing any earlier marker.
    pub fn mark(&self, report: &RunReport) -> Result<(), RunError> {
        let err = |source| RunError::Sentinel {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| err(std::io::Error::new(ErrorKind::InvalidData, e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(err)?;
        }
        let tmp = self.path.with_extension("tmp");
        let written = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();
        if let Err(source) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err(source));
        }
        info!(path = %self.path.display(), "recorded run sentinel");
        Ok(())
    }

    /// Report of the run that created the marker, if it exists and parses.
    /// Markers holding only a timestamp yield a report with just `finished_at`.
    pub fn read(&self) -> Option<RunReport> {
        let raw = fs::read_to_string(&self.path).ok()?;
        if let Ok(report) = serde_json::from_str(&raw) {
            return Some(report);
        }
        let at = DateTime::parse_from_rfc3339(raw.trim()).ok()?;
        Some(RunReport {
            finished_at: Some(at.with_timezone(&Utc)),
            ..RunReport::default()
        })
    }

    /// Arm the next cycle. Returns whether a marker was removed.
    pub fn clear(&self) -> Result<bool, RunError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "cleared run sentinel");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no run sentinel to clear");
                Ok(false)
            }
            Err(source) => Err(RunError::Sentinel {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn mark_read_clear_cycle() {
        let td = tempdir().unwrap();
        let sentinel = Sentinel::new(td.path().join("scripts/success.flag"));
        assert!(!sentinel.exists());
        assert!(sentinel.read().is_none());

        let report = RunReport {
            finished_at: Some(Utc.with_ymd_and_hms(2025, 5, 2, 13, 5, 0).unwrap()),
            pending: 2,
            generated: 1,
            skipped_not_due: 1,
            generated_slugs: vec!["intro-to-widgets".into()],
            ..RunReport::default()
        };
        sentinel.mark(&report).unwrap();
        assert!(sentinel.exists());
        assert_eq!(sentinel.read(), Some(report));

        assert!(sentinel.clear().unwrap());
        assert!(!sentinel.exists());
        assert!(!sentinel.clear().unwrap());
    }

    #[test]
    fn failed_mark_leaves_no_temp_file() {
        let td = tempdir().unwrap();
        let path = td.path().join("success.flag");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let err = Sentinel::new(&path).mark(&RunReport::default()).unwrap_err();
        assert!(matches!(err, RunError::Sentinel { .. }));
        assert!(!td.path().join("success.tmp").exists());
        assert!(path.is_dir());
    }

    #[test]
    fn reads_legacy_timestamp_marker() {
        let td = tempdir().unwrap();
        let path = td.path().join("success.flag");
        fs::write(&path, "2025-05-02T13:05:00.000Z").unwrap();
        let report = Sentinel::new(&path).read().unwrap();
        assert_eq!(
            report.finished_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 2, 13, 5, 0).unwrap())
        );
        assert_eq!(report.generated, 0);
    }
}
