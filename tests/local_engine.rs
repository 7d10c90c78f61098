#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use blogsmith::engine::{LocalEngine, OllamaEngine};
use blogsmith::error::GenerationError;
use blogsmith::generator::{ContentGenerator, GenerationLimits};
use blogsmith::model::Backend;

/// Shell script standing in for the engine CLI. Run through `sh` so the
/// file never needs the executable bit.
fn fake_engine(dir: &Path, run_body: &str) -> PathBuf {
    let script = format!(
        r#"case "$1" in
  list)
    echo "NAME              ID      SIZE"
    echo "mistral:latest    abc123  4.1 GB"
    ;;
  run)
    {run_body}
    ;;
  *)
    exit 64
    ;;
esac
"#
    );
    let path = dir.join("fake-ollama.sh");
    fs::write(&path, script).unwrap();
    path
}

fn engine(script: &Path, scratch: &Path) -> OllamaEngine {
    OllamaEngine::new(
        &["sh".to_string(), script.display().to_string()],
        scratch,
    )
    .with_probe_timeout(Duration::from_millis(500))
}

fn scratch_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn probe_succeeds_for_listed_model_that_answers() {
    let td = tempfile::tempdir().unwrap();
    let script = fake_engine(td.path(), r#"echo "Hello! How can I help?""#);
    let engine = engine(&script, &td.path().join("scratch"));

    assert!(engine.probe("mistral:latest").await);
}

#[tokio::test]
async fn probe_fails_for_missing_model() {
    let td = tempfile::tempdir().unwrap();
    let script = fake_engine(td.path(), r#"echo "Hello""#);
    let engine = engine(&script, &td.path().join("scratch"));

    assert!(!engine.probe("llama3:8b").await);
}

#[tokio::test]
async fn probe_fails_when_model_never_answers() {
    let td = tempfile::tempdir().unwrap();
    let script = fake_engine(td.path(), "exec sleep 30");
    let engine = engine(&script, &td.path().join("scratch"));

    let started = std::time::Instant::now();
    assert!(!engine.probe("mistral:latest").await);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn probe_gives_up_when_model_closes_stdout_and_lingers() {
    let td = tempfile::tempdir().unwrap();
    let script = fake_engine(
        td.path(),
        r#"exec 1>&-
    exec sleep 30"#,
    );
    let engine = engine(&script, &td.path().join("scratch"));

    let started = std::time::Instant::now();
    assert!(!engine.probe("mistral:latest").await);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "probe took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn probe_fails_when_program_is_missing() {
    let td = tempfile::tempdir().unwrap();
    let engine = OllamaEngine::new(
        &["definitely-not-an-engine-binary".to_string()],
        td.path(),
    );

    assert!(!engine.probe("mistral:latest").await);
}

#[tokio::test]
async fn run_feeds_prompt_on_stdin_and_returns_stdout() {
    let td = tempfile::tempdir().unwrap();
    let scratch = td.path().join("scratch");
    let script = fake_engine(
        td.path(),
        r#"echo "model=$2"
    cat"#,
    );
    let engine = engine(&script, &scratch);

    let text = engine
        .run("Write about Intro to Widgets", "mistral:latest")
        .await
        .unwrap();
    assert_eq!(text, "model=mistral:latest\nWrite about Intro to Widgets");
    assert_eq!(scratch_entries(&scratch), 0);
}

#[tokio::test]
async fn run_reports_non_zero_exit() {
    let td = tempfile::tempdir().unwrap();
    let scratch = td.path().join("scratch");
    let script = fake_engine(
        td.path(),
        r#"echo "model not loaded" >&2
    exit 3"#,
    );
    let engine = engine(&script, &scratch);

    let err = engine.run("prompt", "mistral:latest").await.unwrap_err();
    match err {
        GenerationError::Process { message } => {
            assert!(message.contains("model not loaded"), "{message}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(scratch_entries(&scratch), 0);
}

#[tokio::test]
async fn run_rejects_empty_output() {
    let td = tempfile::tempdir().unwrap();
    let script = fake_engine(td.path(), "cat > /dev/null");
    let engine = engine(&script, &td.path().join("scratch"));

    let err = engine.run("prompt", "mistral:latest").await.unwrap_err();
    assert!(matches!(err, GenerationError::Process { .. }));
}

#[tokio::test]
async fn generator_timeout_kills_engine_and_removes_prompt_file() {
    let td = tempfile::tempdir().unwrap();
    let scratch = td.path().join("scratch");
    let script = fake_engine(td.path(), "exec sleep 30");
    let engine = Arc::new(engine(&script, &scratch));

    let generator = ContentGenerator::new(engine, "mistral:latest").with_limits(GenerationLimits {
        local: Duration::from_millis(300),
        remote: Duration::from_secs(1),
    });

    let started = std::time::Instant::now();
    let err = generator
        .generate("Intro to Widgets", &["JS".to_string()])
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(
        err,
        GenerationError::Timeout {
            backend: Backend::Local,
            ..
        }
    ));
    assert_eq!(scratch_entries(&scratch), 0);
}
