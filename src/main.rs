use clap::Parser;
use llama_openai_proxy::app_state::AppState;
use llama_openai_proxy::config::{AppConfig, PromptTemplate};
use llama_openai_proxy::server;

/// OpenAI-compatible API proxy for a llama.cpp completion server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The top prompt in chat completions
    #[arg(long, default_value = "A chat between a curious user and an artificial \
        intelligence assistant. The assistant follows the given rules no matter what.\n")]
    chat_prompt: String,

    /// USER name in chat completions
    #[arg(long, default_value = "\nUSER: ")]
    user_name: String,

    /// ASSISTANT name in chat completions
    #[arg(long, default_value = "\nASSISTANT: ")]
    ai_name: String,

    /// SYSTEM name in chat completions
    #[arg(long, default_value = "\nASSISTANT's RULE: ")]
    system_name: String,

    /// The end of the response in chat completions
    #[arg(long, default_value = "</s>")]
    stop: String,

    /// Address of the llama.cpp completion server
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    llama_api: String,

    /// API key to allow only a few users
    #[arg(long, default_value = "")]
    api_key: String,

    /// IP address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8081)]
    port: u16,

    /// Backend request timeout in seconds
    #[arg(long, default_value_t = 600)]
    timeout: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig {
        host: args.host,
        port: args.port,
        backend_url: args.llama_api,
        api_key: (!args.api_key.is_empty()).then_some(args.api_key),
        stop: args.stop,
        template: PromptTemplate {
            leading: args.chat_prompt,
            user_prefix: args.user_name,
            assistant_prefix: args.ai_name,
            system_prefix: args.system_name,
        },
        timeout_secs: args.timeout,
    };
    let app_state = AppState::new(config.clone())?;

    actix_web::rt::System::new().block_on(async move {
        server::startup(config, app_state).await?;
        Ok(())
    })
}
