use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use actix_web::{App, test, web};
use llama_openai_proxy::app_state::AppState;
use llama_openai_proxy::config::AppConfig;
use llama_openai_proxy::server;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct MockBackend {
    url: String,
    hits: Arc<AtomicUsize>,
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// One-shot HTTP responder on a local socket. Answers `/completion` and
/// `/tokenize` with the given canned bodies and counts accepted calls.
async fn spawn_backend(completion_body: &str, tokenize_body: &str) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let completion_body = completion_body.to_string();
    let tokenize_body = tokenize_body.to_string();

    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let completion_body = completion_body.clone();
            let tokenize_body = tokenize_body.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut tmp = [0u8; 4096];
                let mut header_end = None;
                let mut content_len = 0usize;
                loop {
                    let n = sock.read(&mut tmp).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&tmp[..n]);
                    if header_end.is_none() {
                        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
                            header_end = Some(pos + 4);
                            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                            content_len = head
                                .lines()
                                .find_map(|line| {
                                    let (name, value) = line.split_once(':')?;
                                    if name.eq_ignore_ascii_case("content-length") {
                                        value.trim().parse().ok()
                                    } else {
                                        None
                                    }
                                })
                                .unwrap_or(0);
                        }
                    }
                    if let Some(end) = header_end {
                        if buf.len() >= end + content_len {
                            break;
                        }
                    }
                }
                let request_line = String::from_utf8_lossy(&buf).to_string();
                let body = if request_line.starts_with("POST /tokenize") {
                    tokenize_body
                } else {
                    completion_body
                };
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    MockBackend {
        url: format!("http://{}", addr),
        hits,
    }
}

fn app_state(backend_url: &str, api_key: Option<&str>) -> web::Data<AppState> {
    let config = AppConfig {
        backend_url: backend_url.to_string(),
        api_key: api_key.map(str::to_string),
        timeout_secs: 5,
        ..AppConfig::default()
    };
    web::Data::new(AppState::new(config).unwrap())
}

const SINGLE_SHOT: &str =
    r#"{"content":"4","tokens_predicted":1,"truncated":false,"stopped_eos":true,"stopped_word":false}"#;

#[actix_web::test]
async fn test_chat_completion_single_shot() {
    let backend = spawn_backend(SINGLE_SHOT, "{}").await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, None))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat/completions")
        .set_json(json!({"messages": [{"role": "user", "content": "2+2?"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], "chatcmpl");
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "LLaMA_CPP");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "4");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["prompt_tokens"], 0);
    assert_eq!(body["usage"]["completion_tokens"], 1);
    assert_eq!(body["usage"]["total_tokens"], 1);
    assert_eq!(backend.hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_text_completion_single_shot() {
    let backend = spawn_backend(SINGLE_SHOT, "{}").await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, None))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/completions")
        .set_json(json!({"prompt": "2+2=", "stop": ["\n"]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], "cmpl");
    assert_eq!(body["object"], "text_completion");
    assert_eq!(body["choices"][0]["text"], "4");
    assert!(body["choices"][0]["logprobs"].is_null());
}

#[actix_web::test]
async fn test_tokenize_feeds_usage_accounting() {
    let backend = spawn_backend(SINGLE_SHOT, r#"{"tokens":["2","+","2","?"]}"#).await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, None))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat/completions")
        .set_json(json!({
            "messages": [{"role": "user", "content": "2+2?"}],
            "tokenize": true,
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["usage"]["prompt_tokens"], 4);
    assert_eq!(body["usage"]["completion_tokens"], 1);
    assert_eq!(body["usage"]["total_tokens"], 5);
    assert_eq!(body["promptToken"], json!(["2", "+", "2", "?"]));
    // tokenize call plus completion call
    assert_eq!(backend.hits.load(Ordering::SeqCst), 2);
}

#[actix_web::test]
async fn test_streaming_chat_frames() {
    let chunks = concat!(
        r#"{"content":"","start":true}"#,
        "\n",
        r#"{"content":"he"}"#,
        "\n",
        r#"{"content":"llo","stop":true,"stopped_word":true}"#,
    );
    let backend = spawn_backend(chunks, "{}").await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, None))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat/completions")
        .set_json(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let body = test::read_body(resp).await;
    let text = std::str::from_utf8(&body).unwrap();
    let frames: Vec<&str> = text
        .lines()
        .map(|line| line.strip_prefix("data: ").unwrap())
        .collect();

    // one frame per backend chunk plus the [DONE] sentinel
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[3], "[DONE]");

    let first: Value = serde_json::from_str(frames[0]).unwrap();
    assert_eq!(first["object"], "chat.completion.chunk");
    assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
    assert!(first["choices"][0]["delta"].get("content").is_none());
    assert!(first["choices"][0]["finish_reason"].is_null());

    let second: Value = serde_json::from_str(frames[1]).unwrap();
    assert_eq!(second["choices"][0]["delta"]["content"], "he");
    assert!(second["choices"][0]["finish_reason"].is_null());

    let last: Value = serde_json::from_str(frames[2]).unwrap();
    assert_eq!(last["choices"][0]["delta"]["content"], "llo");
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
}

#[actix_web::test]
async fn test_malformed_json_is_400_with_no_backend_call() {
    let backend = spawn_backend(SINGLE_SHOT, "{}").await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, None))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat/completions")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
    assert_eq!(backend.hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_missing_messages_is_400_with_no_backend_call() {
    let backend = spawn_backend(SINGLE_SHOT, "{}").await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, None))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat/completions")
        .set_json(json!({"stream": false}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(backend.hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_wrong_api_key_is_403_with_empty_body() {
    let backend = spawn_backend(SINGLE_SHOT, "{}").await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, Some("secret")))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat/completions")
        .insert_header(("authorization", "Bearer wrong"))
        .set_json(json!({"messages": []}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    let body = test::read_body(resp).await;
    assert!(body.is_empty());
    assert_eq!(backend.hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_wrong_api_key_beats_malformed_body() {
    let backend = spawn_backend(SINGLE_SHOT, "{}").await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, Some("secret")))
            .configure(server::configure),
    )
    .await;

    // auth is checked before the body is parsed
    let req = test::TestRequest::post()
        .uri("/chat/completions")
        .insert_header(("authorization", "Bearer wrong"))
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(backend.hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_correct_api_key_passes() {
    let backend = spawn_backend(SINGLE_SHOT, "{}").await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, Some("secret")))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/completions")
        .insert_header(("authorization", "Bearer secret"))
        .set_json(json!({"prompt": "hi"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn test_unreachable_backend_is_502() {
    // Bind then drop a listener so the port is closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let app = test::init_service(
        App::new()
            .app_data(app_state(&url, None))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/completions")
        .set_json(json!({"prompt": "hi"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

#[actix_web::test]
async fn test_malformed_backend_result_is_502() {
    // tokens_predicted missing from the backend result
    let backend = spawn_backend(r#"{"content":"4"}"#, "{}").await;
    let app = test::init_service(
        App::new()
            .app_data(app_state(&backend.url, None))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/completions")
        .set_json(json!({"prompt": "hi"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);
}
