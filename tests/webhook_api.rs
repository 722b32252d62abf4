//! End-to-end tests for `POST /webhook` with fake model and speech backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use shadowdesk::config::SummarizerConfig;
use shadowdesk::{
    router, AppState, ChatCompletionClient, CompletionClient, Fallback, PromptSpec, SpeechBackend,
    SpeechError, SpeechSynthesizer, SummarizeError, Summarizer, WebhookPipeline,
};
use tower::ServiceExt;

// --- Test doubles ---

#[derive(Clone, Default)]
struct FakeModel {
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<PromptSpec>>>,
}

#[async_trait]
impl CompletionClient for FakeModel {
    async fn complete(&self, prompt: &PromptSpec) -> Result<String, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        Ok("Hark, Sir Cody: the tunnels to HQ have collapsed.".into())
    }
}

#[derive(Clone, Default)]
struct FakeVoice {
    spoken: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl SpeechBackend for FakeVoice {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn synthesize(&self, text: &str) -> Result<(), SpeechError> {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.fail {
            Err(SpeechError::PlayerMissing("ffplay".into()))
        } else {
            Ok(())
        }
    }
}

struct PanickingModel;

#[async_trait]
impl CompletionClient for PanickingModel {
    async fn complete(&self, _prompt: &PromptSpec) -> Result<String, SummarizeError> {
        panic!("model client bug");
    }
}

// --- Helpers ---

fn app(model: impl CompletionClient + 'static, voice: FakeVoice) -> axum::Router {
    let pipeline = WebhookPipeline::new(Summarizer::new(model), SpeechSynthesizer::new(voice));
    router(AppState {
        pipeline: Arc::new(pipeline),
    })
}

fn webhook(content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/webhook");
    if let Some(ct) = content_type {
        builder = builder.header("content-type", ct);
    }
    builder.body(body.into()).unwrap()
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    (status, body.to_vec())
}

// --- Scenarios ---

#[tokio::test]
async fn json_ticket_is_summarized_and_spoken_once() {
    let model = FakeModel::default();
    let voice = FakeVoice::default();
    let body = r#"{"Name":"Cody","Department":"IT","Location":"HQ","Issue":"VPN down"}"#;

    let (status, resp_body) = send(
        app(model.clone(), voice.clone()),
        webhook(Some("application/json"), body),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(resp_body.is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *voice.spoken.lock().unwrap(),
        vec!["Hark, Sir Cody: the tunnels to HQ have collapsed.".to_string()]
    );

    let prompts = model.prompts.lock().unwrap();
    let content = &prompts[0].user_content;
    for value in ["Cody", "IT", "HQ", "VPN down"] {
        assert!(content.contains(value));
    }
    assert!(!content.contains("Department"));
}

#[tokio::test]
async fn empty_body_speaks_void_line_without_model() {
    let model = FakeModel::default();
    let voice = FakeVoice::default();

    let (status, _) = send(app(model.clone(), voice.clone()), webhook(None, Body::empty())).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        *voice.spoken.lock().unwrap(),
        vec![Fallback::VoidInput.announcement().to_string()]
    );
}

#[tokio::test]
async fn empty_json_object_is_void() {
    let model = FakeModel::default();
    let voice = FakeVoice::default();

    let (status, _) = send(app(model.clone(), voice.clone()), webhook(Some("application/json"), "{}")).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(voice.spoken.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn object_of_blank_values_is_void() {
    let model = FakeModel::default();
    let voice = FakeVoice::default();

    let (status, _) = send(
        app(model.clone(), voice.clone()),
        webhook(Some("application/json"), r#"{"Name":"","Issue":"  "}"#),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        *voice.spoken.lock().unwrap(),
        vec![Fallback::VoidInput.announcement().to_string()]
    );
}

#[tokio::test]
async fn malformed_json_is_rejected_before_speaking() {
    let model = FakeModel::default();
    let voice = FakeVoice::default();

    let (status, body) = send(
        app(model.clone(), voice.clone()),
        webhook(Some("application/json"), r#"{"Name":"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid JSON format");
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert!(voice.spoken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bad_text_encoding_is_rejected() {
    let voice = FakeVoice::default();

    let (status, body) = send(
        app(FakeModel::default(), voice.clone()),
        webhook(Some("text/plain"), vec![0x63, 0x61, 0x66, 0xe9]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid text encoding");
    assert!(voice.spoken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn plain_text_is_sent_verbatim() {
    let model = FakeModel::default();
    let text = "Hello,\nThis is Priya in Legal (4th floor). Teams won't start.\n";

    let (status, _) = send(
        app(model.clone(), FakeVoice::default()),
        webhook(Some("text/plain; charset=utf-8"), text),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(model.prompts.lock().unwrap()[0].user_content, text);
}

#[tokio::test]
async fn binary_body_of_unknown_type_is_void() {
    let model = FakeModel::default();
    let voice = FakeVoice::default();

    let (status, _) = send(
        app(model.clone(), voice.clone()),
        webhook(Some("application/octet-stream"), vec![0xff, 0xd8, 0xff, 0x00]),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        *voice.spoken.lock().unwrap(),
        vec![Fallback::VoidInput.announcement().to_string()]
    );
}

#[tokio::test]
async fn unreachable_model_speaks_unavailable_line() {
    // Grab a free port and close it again so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ChatCompletionClient::new(SummarizerConfig {
        base_url: format!("http://{addr}"),
        api_key: Some("sk-test".into()),
        timeout_secs: 5,
        ..SummarizerConfig::default()
    });
    let voice = FakeVoice::default();

    let (status, _) = send(
        app(client, voice.clone()),
        webhook(Some("application/json"), r#"{"Name":"Cody","Issue":"VPN down"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        *voice.spoken.lock().unwrap(),
        vec![Fallback::ModelUnavailable.announcement().to_string()]
    );
}

#[tokio::test]
async fn speech_failure_still_answers_204() {
    let voice = FakeVoice {
        fail: true,
        ..Default::default()
    };

    let (status, _) = send(
        app(FakeModel::default(), voice.clone()),
        webhook(Some("text/plain"), "printer on fire"),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(voice.spoken.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn internal_fault_is_a_generic_500() {
    let voice = FakeVoice::default();

    let (status, body) = send(
        app(PanickingModel, voice.clone()),
        webhook(Some("text/plain"), "anything"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Internal Server Error");
    assert!(voice.spoken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_backend() {
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(FakeModel::default(), FakeVoice::default()), req).await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["backend"], "fake");
}
