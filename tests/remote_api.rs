use reqwest::Url;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use blogsmith::config;
use blogsmith::error::GenerationError;
use blogsmith::model::Backend;
use blogsmith::remote::{ChatSettings, OpenAiClient, RemoteApi};

fn settings(timeout: Duration) -> ChatSettings {
    ChatSettings {
        timeout,
        ..ChatSettings::from(&config::Remote::default())
    }
}

fn client(server: &MockServer, key: Option<&str>, timeout: Duration) -> OpenAiClient {
    OpenAiClient::with_base_url(
        key.map(str::to_string),
        settings(timeout),
        Url::parse(&server.uri()).unwrap(),
    )
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-3.5-turbo",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn sends_chat_request_and_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 4000,
            "messages": [
                { "role": "system" },
                { "role": "user", "content": "Write about widgets" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("# Widgets\n\nBody")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server, Some("sk-test"), Duration::from_secs(5))
        .run("Write about widgets")
        .await
        .unwrap();
    assert_eq!(text, "# Widgets\n\nBody");
}

#[tokio::test]
async fn server_error_maps_to_api_error_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, Some("sk-test"), Duration::from_secs(5))
        .run("prompt")
        .await
        .unwrap_err();
    assert!(
        matches!(err, GenerationError::Api { status: Some(500), .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn unauthorized_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let err = client(&server, Some("sk-wrong"), Duration::from_secs(5))
        .run("prompt")
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Api { status: Some(401), .. }));
}

#[tokio::test]
async fn malformed_body_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = client(&server, Some("sk-test"), Duration::from_secs(5))
        .run("prompt")
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Api { status: None, .. }), "{err:?}");
}

#[tokio::test]
async fn empty_choices_map_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = client(&server, Some("sk-test"), Duration::from_secs(5))
        .run("prompt")
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Api { .. }));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("too late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = client(&server, Some("sk-test"), Duration::from_millis(200))
        .run("prompt")
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            GenerationError::Timeout {
                backend: Backend::Remote,
                ..
            }
        ),
        "{err:?}"
    );
}

#[tokio::test]
async fn missing_key_fails_without_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, None, Duration::from_secs(5))
        .run("prompt")
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::MissingCredential));

    let blank = client(&server, Some("   "), Duration::from_secs(5))
        .run("prompt")
        .await
        .unwrap_err();
    assert!(matches!(blank, GenerationError::MissingCredential));
}

#[tokio::test]
async fn from_config_prefers_explicit_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer sk-flag"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let remote = config::Remote {
        base_url: server.uri(),
        api_key_env: "BLOGSMITH_TEST_UNSET_KEY".into(),
        ..config::Remote::default()
    };
    let client = OpenAiClient::from_config(&remote, Some("sk-flag".into())).unwrap();
    assert_eq!(client.run("prompt").await.unwrap(), "ok");
}
