use actix_web::{HttpRequest, HttpResponse, HttpServer, post, web};
use std::io::Write;

use crate::app_state::{AppState, PromptInput};
use crate::config::AppConfig;
use crate::error::ProxyError;
use crate::io_struct::{ChatCompletionRequest, CompletionRequest};

/// Bearer-token check, active only when a key is configured.
fn check_auth(req: &HttpRequest, state: &AppState) -> Result<(), ProxyError> {
    let Some(expected) = &state.config.api_key else {
        return Ok(());
    };
    let token = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    match token {
        Some(token) if token == expected.as_str() => Ok(()),
        _ => Err(ProxyError::Auth),
    }
}

/// Parse a JSON body after auth has passed; a decode failure is a
/// `400 {"error": "<message>"}` like the rest of the client errors.
fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ProxyError> {
    serde_json::from_slice(body).map_err(|e| ProxyError::client(e.to_string()))
}

#[post("/chat/completions")]
pub async fn chat_completions(
    req: HttpRequest,
    body: web::Bytes,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ProxyError> {
    // auth comes first so a bad key is 403 even when the body is garbage
    check_auth(&req, &app_state)?;
    let body: ChatCompletionRequest = parse_body(&body)?;
    let messages = body
        .messages
        .ok_or_else(|| ProxyError::client("messages is required"))?;
    app_state
        .complete(PromptInput::Chat(messages), body.options)
        .await
}

#[post("/completions")]
pub async fn completions(
    req: HttpRequest,
    body: web::Bytes,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ProxyError> {
    check_auth(&req, &app_state)?;
    let body: CompletionRequest = parse_body(&body)?;
    let prompt = body
        .prompt
        .ok_or_else(|| ProxyError::client("prompt is required"))?;
    app_state
        .complete(PromptInput::Text(prompt), body.options)
        .await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chat_completions).service(completions);
}

pub async fn startup(config: AppConfig, app_state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(app_state);

    println!("Starting server at {}:{}", config.host, config.port);

    // default level is info
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .init();

    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(configure)
    })
    .bind((config.host, config.port))?
    .run()
    .await?;

    std::io::Result::Ok(())
}
