//! Markdown content files with YAML front matter for the static-site build.
use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tracing::info;

use crate::model::PostSpec;
use crate::slug::slugify;

const EXCERPT_LINES: usize = 3;
const EXCERPT_CHARS: usize = 150;

#[derive(Debug, Clone)]
pub struct PostWriter {
    blog_dir: PathBuf,
}

impl PostWriter {
    pub fn new(blog_dir: impl Into<PathBuf>) -> Self {
        Self {
            blog_dir: blog_dir.into(),
        }
    }

    pub fn path_for(&self, spec: &PostSpec) -> PathBuf {
        self.blog_dir.join(format!("{}.md", slugify(&spec.title)))
    }

    pub fn exists(&self, spec: &PostSpec) -> bool {
        self.path_for(spec).exists()
    }

    /// Write the content file for `spec` exactly once.
    ///
    /// Returns `Ok(None)` when a file already sits at the derived path; the
    /// existing file is never touched. The queue is not modified here.
    pub fn write(
        &self,
        spec: &PostSpec,
        body: &str,
        now: DateTime<Utc>,
    ) -> std::io::Result<Option<PathBuf>> {
        let path = self.path_for(spec);
        if path.exists() {
            info!(title = %spec.title, path = %path.display(), "post already exists, skipping");
            return Ok(None);
        }

        let document = render(spec, body, now);
        fs::create_dir_all(&self.blog_dir)?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                info!(
                    title = %spec.title,
                    path = %path.display(),
                    "post appeared concurrently, skipping"
                );
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        if let Err(err) = file.write_all(document.as_bytes()).and_then(|_| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(err);
        }

        info!(
            title = %spec.title,
            path = %path.display(),
            "wrote post ({:.2} KB)",
            document.len() as f64 / 1024.0
        );
        Ok(Some(path))
    }
}

/// Front matter plus hero image plus body.
pub fn render(spec: &PostSpec, body: &str, now: DateTime<Utc>) -> String {
    let slug = slugify(&spec.title);
    let image = format!("/{slug}/{slug}.webp");
    let title = quote(&spec.title);

    let mut out = String::with_capacity(body.len() + 512);
    out.push_str("---\n");
    out.push_str(&format!("title: {title}\n"));
    out.push_str(&format!("excerpt: {}\n", quote(&excerpt(body))));
    out.push_str(&format!(
        "publishDate: '{}'\n",
        publish_date(&now.with_timezone(&Local))
    ));
    out.push_str("isFeatured: false\n");
    if spec.tags.is_empty() {
        out.push_str("tags: []\n");
    } else {
        out.push_str("tags:\n");
        for tag in &spec.tags {
            out.push_str(&format!("  - {}\n", quote(tag)));
        }
    }
    out.push_str("seo:\n  image:\n");
    out.push_str(&format!("    src: '{image}'\n"));
    out.push_str(&format!("    alt: {title}\n"));
    out.push_str("---\n\n");
    out.push_str(&format!("![{}]({image})\n\n", spec.title));
    out.push_str(body);
    out.push('\n');
    out
}

/// First three lines joined by spaces, cut to 150 characters, plus `...`.
pub fn excerpt(body: &str) -> String {
    let joined = body.split('\n').take(EXCERPT_LINES).collect::<Vec<_>>().join(" ");
    let mut cut: String = joined.chars().take(EXCERPT_CHARS).collect();
    cut.push_str("...");
    cut
}

/// `Mon DD YYYY`, e.g. `May 02 2025`, in the calendar of `at`'s offset.
/// [`render`] passes the host's local time.
pub fn publish_date<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%b %d %Y").to_string()
}

fn quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "")
        .replace('\n', " ");
    format!("\"{escaped}\"")
}
