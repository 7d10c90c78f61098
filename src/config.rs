//! Configuration loader and validator for the post generator.
//!
//! The YAML file is optional: every section and field falls back to the
//! values shown in [`example`], which reproduce the default deployment.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub paths: Paths,
    pub engine: Engine,
    pub remote: Remote,
    pub schedule: Schedule,
}

/// File-system locations. Relative paths resolve against the working
/// directory, which the cron entries set to the project root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Paths {
    pub queue_file: PathBuf,
    pub blog_dir: PathBuf,
    pub sentinel_file: PathBuf,
    pub scratch_dir: PathBuf,
    pub log_file: PathBuf,
}

/// Local text-generation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Engine {
    /// Program plus leading arguments, e.g. `["docker", "exec", "llm", "ollama"]`.
    pub command: Vec<String>,
    pub model: String,
    pub probe_timeout_secs: u64,
    pub run_timeout_secs: u64,
}

/// Hosted chat-completion API used as fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Remote {
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Environment variable holding the API key when `--api-key` is absent.
    pub api_key_env: String,
}

/// Cron cadence for the trigger layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Schedule {
    /// Cron day-of-week field (`5` is Friday, `*` every day).
    pub day_of_week: String,
    pub primary_hour: u8,
    pub fallback_hours: Vec<u8>,
    pub reset_hour: u8,
    pub reset_minute: u8,
}

/// Per-invocation options parsed from the command line. Built once in `main`
/// and handed to the components that need them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Ignore scheduled dates.
    pub force: bool,
    /// Local model override.
    pub model: Option<String>,
    /// Remote API key override.
    pub api_key: Option<String>,
    /// Only posts whose title contains this (case-insensitive).
    pub title_filter: Option<String>,
    /// Fall back to the remote API when the local engine fails.
    pub fallback: bool,
    /// Skip the pre-flight probe.
    pub skip_probe: bool,
}

impl RunOptions {
    pub fn model<'a>(&'a self, cfg: &'a Config) -> &'a str {
        self.model.as_deref().unwrap_or(&cfg.engine.model)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            queue_file: PathBuf::from("scripts/blog-posts-config.json"),
            blog_dir: PathBuf::from("src/content/blog"),
            sentinel_file: PathBuf::from("scripts/success.flag"),
            scratch_dir: PathBuf::from("scripts"),
            log_file: PathBuf::from("scripts/blog-generator.log"),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            command: vec!["ollama".into()],
            model: "mistral:latest".into(),
            probe_timeout_secs: 10,
            run_timeout_secs: 600,
        }
    }
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/".into(),
            model: "gpt-3.5-turbo".into(),
            system_prompt:
                "You are a professional technical writer specializing in web development topics."
                    .into(),
            temperature: 0.7,
            max_tokens: 4000,
            timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            day_of_week: "5".into(),
            primary_hour: 13,
            fallback_hours: vec![14, 15, 16, 17, 18],
            reset_hour: 18,
            reset_minute: 1,
        }
    }
}

impl Engine {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl Remote {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API key from the configured environment variable.
    pub fn key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Config {
    /// Ensure the content and scratch directories exist.
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.paths.blog_dir)?;
        fs::create_dir_all(&self.paths.scratch_dir)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `blogsmith.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("blogsmith.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Like [`load`], but a missing file yields the built-in defaults.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        load(Some(path))
    } else {
        let cfg = Config::default();
        validate(&cfg)?;
        Ok(cfg)
    }
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let p = &cfg.paths;
    if p.queue_file.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("paths.queue_file must be non-empty"));
    }
    if p.blog_dir.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("paths.blog_dir must be non-empty"));
    }
    if p.sentinel_file.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("paths.sentinel_file must be non-empty"));
    }

    if cfg.engine.command.first().map_or(true, |c| c.trim().is_empty()) {
        return Err(ConfigError::Invalid("engine.command must name a program"));
    }
    if cfg.engine.model.trim().is_empty() {
        return Err(ConfigError::Invalid("engine.model must be non-empty"));
    }
    if cfg.engine.probe_timeout_secs == 0 {
        return Err(ConfigError::Invalid("engine.probe_timeout_secs must be > 0"));
    }
    if cfg.engine.run_timeout_secs == 0 {
        return Err(ConfigError::Invalid("engine.run_timeout_secs must be > 0"));
    }

    if reqwest::Url::parse(&cfg.remote.base_url).is_err() {
        return Err(ConfigError::Invalid("remote.base_url must be an absolute URL"));
    }
    if cfg.remote.model.trim().is_empty() {
        return Err(ConfigError::Invalid("remote.model must be non-empty"));
    }
    if !(0.0..=2.0).contains(&cfg.remote.temperature) {
        return Err(ConfigError::Invalid("remote.temperature must be within 0.0..=2.0"));
    }
    if cfg.remote.max_tokens == 0 {
        return Err(ConfigError::Invalid("remote.max_tokens must be > 0"));
    }
    if cfg.remote.timeout_secs == 0 {
        return Err(ConfigError::Invalid("remote.timeout_secs must be > 0"));
    }

    let s = &cfg.schedule;
    if s.day_of_week.trim().is_empty() || s.day_of_week.contains(char::is_whitespace) {
        return Err(ConfigError::Invalid("schedule.day_of_week must be a single cron field"));
    }
    if s.primary_hour > 23 || s.reset_hour > 23 || s.fallback_hours.iter().any(|h| *h > 23) {
        return Err(ConfigError::Invalid("schedule hours must be within 0..=23"));
    }
    if s.reset_minute > 59 {
        return Err(ConfigError::Invalid("schedule.reset_minute must be within 0..=59"));
    }
    if s.fallback_hours.iter().any(|h| *h <= s.primary_hour) {
        return Err(ConfigError::Invalid("schedule.fallback_hours must come after primary_hour"));
    }
    let last = s.fallback_hours.iter().copied().max().unwrap_or(s.primary_hour);
    if (s.reset_hour, s.reset_minute) <= (last, 0) {
        return Err(ConfigError::Invalid("schedule reset must come after the last attempt"));
    }

    Ok(())
}

/// Returns the documented example YAML, equal to the built-in defaults.
pub fn example() -> &'static str {
    r#"paths:
  queue_file: "scripts/blog-posts-config.json"
  blog_dir: "src/content/blog"
  sentinel_file: "scripts/success.flag"
  scratch_dir: "scripts"
  log_file: "scripts/blog-generator.log"

engine:
  command: ["ollama"]
  model: "mistral:latest"
  probe_timeout_secs: 10
  run_timeout_secs: 600

remote:
  base_url: "https://api.openai.com/"
  model: "gpt-3.5-turbo"
  system_prompt: "You are a professional technical writer specializing in web development topics."
  temperature: 0.7
  max_tokens: 4000
  timeout_secs: 60
  api_key_env: "OPENAI_API_KEY"

schedule:
  day_of_week: "5"
  primary_hour: 13
  fallback_hours: [14, 15, 16, 17, 18]
  reset_hour: 18
  reset_minute: 1
"#
}
