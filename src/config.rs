/// Role prefixes used when flattening chat turns into a single prompt.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub leading: String,
    pub user_prefix: String,
    pub assistant_prefix: String,
    pub system_prefix: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        PromptTemplate {
            leading: "A chat between a curious user and an artificial intelligence \
                      assistant. The assistant follows the given rules no matter what.\n"
                .to_string(),
            user_prefix: "\nUSER: ".to_string(),
            assistant_prefix: "\nASSISTANT: ".to_string(),
            system_prefix: "\nASSISTANT's RULE: ".to_string(),
        }
    }
}

/// Immutable process-wide configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub api_key: Option<String>,
    pub stop: String,
    pub template: PromptTemplate,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            host: "0.0.0.0".to_string(),
            port: 8081,
            backend_url: "http://127.0.0.1:8080".to_string(),
            api_key: None,
            stop: "</s>".to_string(),
            template: PromptTemplate::default(),
            timeout_secs: 600,
        }
    }
}
