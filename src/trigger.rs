//! Crontab entries for the external trigger layer.
//!
//! The primary attempt always runs. Fallback attempts run in force mode and
//! exit early when the sentinel exists, so the first completed attempt of a
//! cycle suppresses the rest. The reset entry removes the sentinel to arm the
//! next cycle. Exit codes are only logged, never inspected.
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::info;

use crate::config::Schedule;

/// Comment appended to every managed line so reinstalling replaces them.
pub const MARKER: &str = "# blogsmith";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronPlan {
    pub schedule: Schedule,
    pub project_root: PathBuf,
    pub binary: PathBuf,
    pub config: PathBuf,
    pub log_file: PathBuf,
}

impl CronPlan {
    pub fn render(&self) -> Vec<String> {
        let s = &self.schedule;
        let mut lines = Vec::with_capacity(s.fallback_hours.len() + 2);
        lines.push(self.attempt_line(s.primary_hour, &[]));
        for hour in &s.fallback_hours {
            lines.push(self.attempt_line(*hour, &["--force", "--skip-if-sentinel"]));
        }
        lines.push(format!(
            "{} {} * * {} cd {} && {} --reset-cycle >> {} 2>&1 {MARKER}",
            s.reset_minute,
            s.reset_hour,
            s.day_of_week,
            shell_quote(&self.project_root),
            self.invocation(),
            shell_quote(&self.log_file),
        ));
        lines
    }

    /// One debug-mode generator run from the project root, the way the
    /// primary entry would invoke it (minus the log redirection).
    pub fn trial_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--config")
            .arg(&self.config)
            .arg("--debug")
            .current_dir(&self.project_root)
            .kill_on_drop(true);
        cmd
    }

    pub async fn trial_run(&self) -> std::io::Result<ExitStatus> {
        info!(binary = %self.binary.display(), "running the generator once before installing");
        let status = self.trial_command().status().await?;
        info!(%status, "trial run finished");
        Ok(status)
    }

    fn invocation(&self) -> String {
        format!(
            "{} --config {}",
            shell_quote(&self.binary),
            shell_quote(&self.config)
        )
    }

    fn attempt_line(&self, hour: u8, extra: &[&str]) -> String {
        let log = shell_quote(&self.log_file);
        let mut cmd = self.invocation();
        for flag in extra {
            cmd.push(' ');
            cmd.push_str(flag);
        }
        format!(
            "0 {hour} * * {dow} cd {root} && {cmd} >> {log} 2>&1 || echo \"Job failed at {label}\" >> {log} {MARKER}",
            dow = self.schedule.day_of_week,
            root = shell_quote(&self.project_root),
            label = hour_label(hour),
        )
    }
}

/// Replace previously installed managed lines in `current` with `entries`,
/// keeping every unrelated line in order.
pub fn merge_crontab(current: &str, entries: &[String]) -> String {
    let mut out: Vec<&str> = current
        .lines()
        .filter(|line| !line.trim_end().ends_with(MARKER))
        .collect();
    while out.last().is_some_and(|l| l.trim().is_empty()) {
        out.pop();
    }
    let mut merged = out.join("\n");
    if !merged.is_empty() {
        merged.push('\n');
    }
    for entry in entries {
        merged.push_str(entry);
        merged.push('\n');
    }
    merged
}

/// `13` -> `1pm`, `0` -> `12am`.
pub fn hour_label(hour: u8) -> String {
    let suffix = if hour < 12 { "am" } else { "pm" };
    let h = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{h}{suffix}")
}

fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:=@%,".contains(c))
    {
        raw.into_owned()
    } else {
        format!("'{}'", raw.replace('\'', r"'\''"))
    }
}
