use crate::config::PromptTemplate;
use crate::io_struct::ChatMessage;

impl PromptTemplate {
    fn role_prefix(&self, role: &str) -> Option<&str> {
        match role {
            "system" => Some(&self.system_prefix),
            "user" => Some(&self.user_prefix),
            "assistant" => Some(&self.assistant_prefix),
            _ => None,
        }
    }

    /// Flatten chat turns into a single prompt. Malformed entries are
    /// skipped with a warning; unknown roles contribute nothing. The
    /// suffix primes the backend to continue as the assistant.
    pub fn render(&self, messages: &[ChatMessage], stop: &str) -> String {
        let mut prompt = String::with_capacity(self.leading.len() + 64);
        prompt.push_str(&self.leading);

        for msg in messages {
            let (role, content) = match (&msg.role, &msg.content) {
                (Some(role), Some(content)) => (role, content),
                _ => {
                    log::warn!("skipping chat message with missing role or content");
                    continue;
                }
            };
            if let Some(prefix) = self.role_prefix(role) {
                prompt.push_str(prefix);
                prompt.push_str(content);
            }
        }

        prompt.push_str(self.assistant_prefix.trim_end_matches('\n'));
        prompt.push_str(stop);
        prompt
    }
}
