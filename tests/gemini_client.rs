//! GeminiClient against a local axum stand-in for generateContent.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use tts_studio::config::SynthesisConfig;
use tts_studio::gemini::{GeminiClient, SynthesisErrorKind};
use tts_studio::voice::Voice;

#[derive(Clone, Default)]
struct MockState {
    reply: Arc<Mutex<(u16, Value)>>,
    seen: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

async fn generate(
    State(state): State<MockState>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.seen.lock().unwrap().push((action, key, body));

    let (code, reply) = state.reply.lock().unwrap().clone();
    (StatusCode::from_u16(code).unwrap(), Json(reply))
}

async fn start_mock(code: u16, reply: Value) -> (GeminiClient, MockState) {
    let state = MockState::default();
    *state.reply.lock().unwrap() = (code, reply);

    let app = Router::new()
        .route("/v1beta/models/{action}", post(generate))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = SynthesisConfig {
        base_url: format!("http://{addr}/v1beta"),
        ..SynthesisConfig::default()
    };
    let client = GeminiClient::with_api_key(&config, "test-key".into()).unwrap();
    (client, state)
}

fn api_error(code: u16, status: &str, message: &str) -> Value {
    json!({ "error": { "code": code, "message": message, "status": status } })
}

#[tokio::test]
async fn returns_inline_audio_and_sends_wire_contract() {
    let (client, state) = start_mock(
        200,
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{
                    "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AID/fw==" }
                }]},
                "finishReason": "STOP"
            }]
        }),
    )
    .await;

    let audio = client.generate_speech("Good morning", Voice::Puck).await.unwrap();
    assert_eq!(audio, "AID/fw==");

    let seen = state.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (action, key, body) = &seen[0];
    assert_eq!(action, "gemini-2.5-flash-preview-tts:generateContent");
    assert_eq!(key.as_deref(), Some("test-key"));
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Say: Good morning");
    assert_eq!(body["generationConfig"]["responseModalities"], json!(["AUDIO"]));
    assert_eq!(
        body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
        "Puck"
    );
}

#[tokio::test]
async fn blocked_prompt_is_content_blocked() {
    let (client, _) = start_mock(200, json!({ "promptFeedback": { "blockReason": "SAFETY" } })).await;
    let err = client.generate_speech("something", Voice::Kore).await.unwrap_err();
    assert_eq!(err.kind(), SynthesisErrorKind::ContentBlocked);
}

#[tokio::test]
async fn server_fault_is_server_busy() {
    let (client, _) = start_mock(503, api_error(503, "UNAVAILABLE", "The model is overloaded.")).await;
    let err = client.generate_speech("hello", Voice::Kore).await.unwrap_err();
    assert_eq!(err.kind(), SynthesisErrorKind::ServerBusy);
    assert!(err.to_string().contains("try again"));
    assert_eq!(err.detail(), "The model is overloaded.");
}

#[tokio::test]
async fn quota_is_rate_limited() {
    let (client, _) = start_mock(
        429,
        api_error(429, "RESOURCE_EXHAUSTED", "You exceeded your current quota."),
    )
    .await;
    let err = client.generate_speech("hello", Voice::Kore).await.unwrap_err();
    assert_eq!(err.kind(), SynthesisErrorKind::RateLimited);
}

#[tokio::test]
async fn bad_credentials_are_auth_failed() {
    for (code, status, message) in [
        (400, "INVALID_ARGUMENT", "API key not valid. Please pass a valid API key."),
        (403, "PERMISSION_DENIED", "The caller does not have permission"),
        (404, "NOT_FOUND", "Requested entity was not found."),
    ] {
        let (client, _) = start_mock(code, api_error(code, status, message)).await;
        let err = client.generate_speech("hello", Voice::Kore).await.unwrap_err();
        assert_eq!(err.kind(), SynthesisErrorKind::AuthFailed, "{message}");
        assert!(err.needs_reauth());
    }
}

#[tokio::test]
async fn text_only_reply_is_unknown_with_model_text() {
    let (client, _) = start_mock(
        200,
        json!({
            "candidates": [{ "content": { "parts": [{ "text": "I cannot produce audio for this." }] } }]
        }),
    )
    .await;
    let err = client.generate_speech("hello", Voice::Kore).await.unwrap_err();
    assert_eq!(err.kind(), SynthesisErrorKind::Unknown);
    assert_eq!(err.to_string(), "I cannot produce audio for this.");
}

#[tokio::test]
async fn unreachable_server_is_reported() {
    let config = SynthesisConfig {
        base_url: "http://127.0.0.1:9/v1beta".into(),
        ..SynthesisConfig::default()
    };
    let client = GeminiClient::with_api_key(&config, "test-key".into()).unwrap();
    let err = client.generate_speech("hello", Voice::Kore).await.unwrap_err();
    assert_eq!(err.kind(), SynthesisErrorKind::Unknown);
    assert!(err.to_string().contains("Failed to communicate"));
}
