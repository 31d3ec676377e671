use bytes::Bytes;
use serde::Serialize;

use crate::error::ProxyError;
use crate::io_struct::{
    AssistantMessage, BackendChunk, BackendResult, CHAT_CHUNK_OBJECT, CHAT_ID, CHAT_OBJECT,
    ChatChoice, ChatCompletionResponse, CompletionResponse, Delta, FinishReason, MODEL_NAME,
    StreamChoice, StreamResponse, TEXT_ID, TEXT_OBJECT, TextChoice, Usage,
};

fn finish_reason(stopped_eos: bool, stopped_word: bool) -> FinishReason {
    if stopped_eos || stopped_word {
        FinishReason::Stop
    } else {
        FinishReason::Length
    }
}

fn usage(prompt_tokens: &[String], tokens_predicted: u64) -> Usage {
    let prompt_tokens = prompt_tokens.len() as u64;
    Usage {
        prompt_tokens,
        completion_tokens: tokens_predicted,
        total_tokens: prompt_tokens + tokens_predicted,
    }
}

fn echoed_tokens(prompt_tokens: &[String]) -> Option<Vec<String>> {
    if prompt_tokens.is_empty() {
        None
    } else {
        Some(prompt_tokens.to_vec())
    }
}

pub fn build_chat_response(
    result: BackendResult,
    prompt_tokens: &[String],
    created: i64,
) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: CHAT_ID.to_string(),
        object: CHAT_OBJECT.to_string(),
        created,
        model: MODEL_NAME.to_string(),
        truncated: result.truncated,
        usage: usage(prompt_tokens, result.tokens_predicted),
        prompt_token: echoed_tokens(prompt_tokens),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: result.content,
            },
            finish_reason: finish_reason(result.stopped_eos, result.stopped_word),
        }],
    }
}

pub fn build_text_response(
    result: BackendResult,
    prompt_tokens: &[String],
    created: i64,
) -> CompletionResponse {
    CompletionResponse {
        id: TEXT_ID.to_string(),
        object: TEXT_OBJECT.to_string(),
        created,
        model: MODEL_NAME.to_string(),
        truncated: result.truncated,
        usage: usage(prompt_tokens, result.tokens_predicted),
        prompt_token: echoed_tokens(prompt_tokens),
        choices: vec![TextChoice {
            text: result.content,
            index: 0,
            logprobs: None,
            finish_reason: finish_reason(result.stopped_eos, result.stopped_word),
        }],
    }
}

fn sse_frame<T: Serialize>(payload: &T) -> Result<Bytes, ProxyError> {
    let json = serde_json::to_string(payload).map_err(ProxyError::semantic)?;
    Ok(Bytes::from(format!("data: {json}\n")))
}

/// Map one backend chunk onto one SSE `data:` frame. The first chunk of a
/// chat stream announces the assistant role; the terminal chunk carries
/// the finish reason on its final content delta.
pub fn chunk_frame(chunk: &BackendChunk, chat: bool, created: i64) -> Result<Bytes, ProxyError> {
    let terminal_reason = if chunk.stop {
        Some(finish_reason(chunk.stopped_eos, chunk.stopped_word))
    } else {
        None
    };

    let choice = if chat {
        if chunk.start {
            StreamChoice {
                finish_reason: None,
                index: 0,
                delta: Some(Delta {
                    role: Some("assistant".to_string()),
                    content: None,
                }),
                text: None,
            }
        } else {
            StreamChoice {
                finish_reason: terminal_reason,
                index: 0,
                delta: Some(Delta {
                    role: None,
                    content: Some(chunk.content.clone()),
                }),
                text: None,
            }
        }
    } else {
        StreamChoice {
            finish_reason: terminal_reason,
            index: 0,
            delta: None,
            text: Some(chunk.content.clone()),
        }
    };

    let (id, object) = if chat {
        (CHAT_ID, CHAT_CHUNK_OBJECT)
    } else {
        (TEXT_ID, TEXT_OBJECT)
    };
    sse_frame(&StreamResponse {
        id: id.to_string(),
        object: object.to_string(),
        created,
        model: MODEL_NAME.to_string(),
        choices: vec![choice],
    })
}

/// End-of-stream sentinel expected by OpenAI streaming clients.
pub fn done_frame() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n")
}
