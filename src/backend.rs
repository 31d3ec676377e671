use std::pin::Pin;

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use crate::error::ProxyError;
use crate::io_struct::{
    BackendChunk, BackendRequest, BackendResult, TokenizeRequest, TokenizeResponse,
};

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<BackendChunk, ProxyError>> + Send>>;

/// HTTP client for the backend completion server.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

/// Pull every complete JSON object out of `buf`, leaving any trailing
/// partial object in place for the next read.
pub fn drain_chunks(buf: &mut Vec<u8>) -> Result<Vec<BackendChunk>, ProxyError> {
    let mut chunks = Vec::new();
    loop {
        let start = match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => pos,
            None => {
                buf.clear();
                return Ok(chunks);
            }
        };
        let mut iter = serde_json::Deserializer::from_slice(&buf[start..])
            .into_iter::<BackendChunk>();
        match iter.next() {
            Some(Ok(chunk)) => {
                let consumed = start + iter.byte_offset();
                buf.drain(..consumed);
                chunks.push(chunk);
            }
            Some(Err(e)) if e.is_eof() => return Ok(chunks),
            Some(Err(e)) => return Err(ProxyError::transport(e)),
            None => return Ok(chunks),
        }
    }
}

impl BackendClient {
    pub fn new(base_url: String, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(BackendClient { client, base_url })
    }

    fn api_path(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Best-effort tokenization of a prompt. Any transport or decode
    /// failure degrades to an empty token list.
    pub async fn tokenize(&self, prompt: &str) -> Vec<String> {
        let body = TokenizeRequest {
            content: prompt.to_string(),
        };
        let result = async {
            self.client
                .post(self.api_path("/tokenize"))
                .json(&body)
                .send()
                .await?
                .json::<TokenizeResponse>()
                .await
        }
        .await;
        match result {
            Ok(resp) => resp.tokens,
            Err(e) => {
                log::warn!("tokenize request failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Single-shot completion; blocks until the full result arrives.
    pub async fn complete(&self, request: &BackendRequest) -> Result<BackendResult, ProxyError> {
        let resp = self
            .client
            .post(self.api_path("/completion"))
            .json(request)
            .send()
            .await
            .map_err(ProxyError::transport)?;
        let body = resp.bytes().await.map_err(ProxyError::transport)?;
        serde_json::from_slice(&body).map_err(ProxyError::semantic)
    }

    /// Streamed completion. Each JSON object is decoded from the body as
    /// it arrives and yielded immediately, so SSE frames can be forwarded
    /// without buffering the whole backend response.
    pub async fn complete_stream(
        &self,
        request: &BackendRequest,
    ) -> Result<ChunkStream, ProxyError> {
        let resp = self
            .client
            .post(self.api_path("/completion"))
            .json(request)
            .send()
            .await
            .map_err(ProxyError::transport)?;
        let mut body = resp.bytes_stream();

        Ok(Box::pin(try_stream! {
            let mut buf: Vec<u8> = Vec::new();
            while let Some(part) = body.next().await {
                let part = part.map_err(ProxyError::transport)?;
                buf.extend_from_slice(&part);
                for chunk in drain_chunks(&mut buf)? {
                    yield chunk;
                }
            }
            if buf.iter().any(|b| !b.is_ascii_whitespace()) {
                Err(ProxyError::transport("backend stream ended mid-object"))?;
            }
        }))
    }
}
