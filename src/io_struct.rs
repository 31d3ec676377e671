use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

pub const CHAT_ID: &str = "chatcmpl";
pub const CHAT_OBJECT: &str = "chat.completion";
pub const CHAT_CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const TEXT_ID: &str = "cmpl";
pub const TEXT_OBJECT: &str = "text_completion";
pub const MODEL_NAME: &str = "LLaMA_CPP";

/// A `stop` field in an inbound body may be a single string or a list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StopSequences {
    Single(String),
    Multiple(Vec<String>),
}

impl StopSequences {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StopSequences::Single(s) => vec![s],
            StopSequences::Multiple(v) => v,
        }
    }
}

/// One chat turn. Both fields stay optional so a malformed entry can be
/// skipped by the prompt templater instead of rejecting the whole body.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        ChatMessage {
            role: Some(role.to_string()),
            content: Some(content.to_string()),
        }
    }
}

/// Integer parameters arrive as JSON numbers and may carry a fractional
/// representation (`128.0`); accept any number and truncate.
fn int_from_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.map(|v| v as i64))
}

fn u32_from_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.map(|v| v as u32))
}

/// Sampling and control fields shared by both inbound request shapes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub tokenize: bool,
    pub stop: Option<StopSequences>,
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "int_from_number")]
    pub top_k: Option<i64>,
    pub top_p: Option<f64>,
    #[serde(default, deserialize_with = "int_from_number")]
    pub max_tokens: Option<i64>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub repeat_penalty: Option<f64>,
    #[serde(default, deserialize_with = "u32_from_number")]
    pub mirostat: Option<u32>,
    pub mirostat_tau: Option<f64>,
    pub mirostat_eta: Option<f64>,
    #[serde(default, deserialize_with = "int_from_number")]
    pub seed: Option<i64>,
    pub logit_bias: Option<HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(flatten)]
    pub options: GenerationOptions,
}

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub options: GenerationOptions,
}

/// Request body for the backend `/completion` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRequest {
    pub prompt: String,
    pub stop: Vec<String>,
    pub n_keep: i64,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_predict: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat_tau: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat_eta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<HashMap<i64, f64>>,
}

/// Full backend completion result. Required fields are required in serde
/// so a missing `tokens_predicted` is a decode error, not a panic.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendResult {
    pub content: String,
    pub tokens_predicted: u64,
    #[serde(default)]
    pub truncated: bool,
    pub stopped_eos: bool,
    pub stopped_word: bool,
}

/// One element of a streamed backend result. `start` is set only on the
/// first chunk, `stop` only on the terminal one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendChunk {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub start: bool,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub stopped_eos: bool,
    #[serde(default)]
    pub stopped_word: bool,
}

#[derive(Debug, Serialize)]
pub struct TokenizeRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenizeResponse {
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub truncated: bool,
    pub usage: Usage,
    #[serde(rename = "promptToken", skip_serializing_if = "Option::is_none")]
    pub prompt_token: Option<Vec<String>>,
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TextChoice {
    pub text: String,
    pub index: u32,
    pub logprobs: Option<serde_json::Value>,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub truncated: bool,
    pub usage: Usage,
    #[serde(rename = "promptToken", skip_serializing_if = "Option::is_none")]
    pub prompt_token: Option<Vec<String>>,
    pub choices: Vec<TextChoice>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One choice inside an SSE chunk. `finish_reason` serializes as `null`
/// on every frame except the terminal one.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamChoice {
    pub finish_reason: Option<FinishReason>,
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<StreamChoice>,
}
