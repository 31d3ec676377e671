use actix_web::HttpResponse;
use futures::StreamExt;

use crate::backend::BackendClient;
use crate::config::AppConfig;
use crate::error::ProxyError;
use crate::io_struct::{ChatMessage, GenerationOptions};
use crate::request::build_backend_request;
use crate::response;

/// What the inbound body resolved to: either chat turns to be templated
/// or a raw prompt string.
pub enum PromptInput {
    Chat(Vec<ChatMessage>),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub backend: BackendClient,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let backend = BackendClient::new(config.backend_url.clone(), config.timeout_secs)?;
        Ok(AppState { config, backend })
    }

    /// Shared completion path for both endpoints. Resolves the prompt,
    /// maps the request, optionally tokenizes, then dispatches in either
    /// single-shot or streaming mode.
    pub async fn complete(
        &self,
        input: PromptInput,
        options: GenerationOptions,
    ) -> Result<HttpResponse, ProxyError> {
        let chat = matches!(input, PromptInput::Chat(_));
        let prompt = match input {
            PromptInput::Chat(messages) => {
                self.config.template.render(&messages, &self.config.stop)
            }
            PromptInput::Text(prompt) => prompt,
        };

        let stream = options.stream;
        let request = build_backend_request(prompt, &options, &self.config, stream)?;
        log::info!(
            "backend request: {}",
            serde_json::to_string(&request).map_err(ProxyError::semantic)?
        );

        let prompt_tokens = if options.tokenize {
            self.backend.tokenize(&request.prompt).await
        } else {
            Vec::new()
        };

        let created = chrono::Utc::now().timestamp();
        if !stream {
            let result = self.backend.complete(&request).await?;
            log::debug!("backend result: {:?}", result);
            let resp = if chat {
                HttpResponse::Ok().json(response::build_chat_response(
                    result,
                    &prompt_tokens,
                    created,
                ))
            } else {
                HttpResponse::Ok().json(response::build_text_response(
                    result,
                    &prompt_tokens,
                    created,
                ))
            };
            return Ok(resp);
        }

        // Each decoded chunk is mapped and forwarded immediately; dropping
        // the response stream cancels the in-flight backend request.
        let chunks = self.backend.complete_stream(&request).await?;
        let frames = chunks
            .map(move |item| {
                item.and_then(|chunk| response::chunk_frame(&chunk, chat, created))
                    .map_err(actix_web::Error::from)
            })
            .chain(futures::stream::once(async {
                Ok(response::done_frame())
            }));
        Ok(HttpResponse::Ok()
            .content_type("text/event-stream")
            .streaming(frames))
    }
}
