use crate::config::DEFAULT_SYSTEM_PROMPT;
use crate::session::Message;
use crate::traits::ChatMessage;

/// Assembles the transcript a turn starts from.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl ContextBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// System instruction followed by the conversation in order.
    pub fn build_messages(&self, history: &[Message]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !self.system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(self.system_prompt.clone()));
        }
        messages.extend(history.iter().map(ChatMessage::from));
        messages
    }
}
