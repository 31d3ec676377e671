use std::collections::HashMap;

use crate::config::AppConfig;
use crate::error::ProxyError;
use crate::io_struct::{BackendRequest, GenerationOptions};

fn convert_logit_bias(
    bias: &HashMap<String, f64>,
) -> Result<HashMap<i64, f64>, ProxyError> {
    bias.iter()
        .map(|(token, bias)| {
            let id = token.parse::<i64>().map_err(|_| {
                ProxyError::client(format!("logit_bias key is not a token id: {token:?}"))
            })?;
            Ok((id, *bias))
        })
        .collect()
}

/// Map validated inbound options onto the backend parameter schema. Chat
/// and text requests share this path; they differ only in how `prompt`
/// was resolved by the caller.
pub fn build_backend_request(
    prompt: String,
    options: &GenerationOptions,
    config: &AppConfig,
    stream: bool,
) -> Result<BackendRequest, ProxyError> {
    // The configured stop sequence always comes first; user-supplied
    // stops follow in their given order, duplicates kept.
    let mut stop = vec![config.stop.clone()];
    if let Some(user_stop) = &options.stop {
        stop.extend(user_stop.clone().into_vec());
    }

    let logit_bias = options
        .logit_bias
        .as_ref()
        .map(|bias| convert_logit_bias(bias))
        .transpose()?;

    Ok(BackendRequest {
        prompt,
        stop,
        n_keep: -1,
        stream,
        n_predict: options.max_tokens,
        temperature: options.temperature,
        top_k: options.top_k,
        top_p: options.top_p,
        presence_penalty: options.presence_penalty,
        frequency_penalty: options.frequency_penalty,
        repeat_penalty: options.repeat_penalty,
        mirostat: options.mirostat,
        mirostat_tau: options.mirostat_tau,
        mirostat_eta: options.mirostat_eta,
        seed: options.seed,
        logit_bias,
    })
}
