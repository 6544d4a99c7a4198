use crate::traits::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

/// One visible turn of the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        match message.role {
            Role::System => ChatMessage::system(message.content.clone()),
            Role::User => ChatMessage::user(message.content.clone()),
            Role::Assistant | Role::Tool => ChatMessage::assistant(message.content.clone()),
        }
    }
}

/// Append-only list of turns, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// A conversation opened by the assistant's greeting. A blank greeting
    /// opens it empty.
    pub fn seeded(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        if greeting.trim().is_empty() {
            return Self::default();
        }
        Self {
            messages: vec![Message::assistant(greeting)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
