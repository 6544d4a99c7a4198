pub mod conversation;

pub use conversation::{Conversation, Message};

use crate::agent::{AgentLoop, ContextBuilder, ToolRegistry, TurnObserver};
use crate::config::Config;
use crate::error::ScoutError;
use crate::providers::create_provider;
use crate::tools::default_tools;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A single chat from greeting to exit. Owns the conversation and the
/// agent that answers it; nothing outlives [`ChatSession::end`].
pub struct ChatSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    conversation: Conversation,
    agent: AgentLoop,
}

impl ChatSession {
    pub fn start(agent: AgentLoop, greeting: impl Into<String>) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            conversation: Conversation::seeded(greeting),
            agent,
        };
        info!(
            session = %session.id,
            model = session.agent.provider().model(),
            tools = ?session.agent.tool_registry().names(),
            "session started"
        );
        session
    }

    /// Builds the model client, tools and agent from `config`, then starts.
    /// Fails with [`ScoutError::MissingCredential`] before constructing
    /// anything when no usable key is given.
    pub fn connect(config: &Config, credential: Option<String>) -> Result<Self> {
        let api_key = credential
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ScoutError::MissingCredential)?;

        let provider = create_provider(config, &api_key).context("Failed to create provider")?;
        let registry = ToolRegistry::with_tools(default_tools(&config.tools));

        let agent = AgentLoop::new(
            Arc::from(provider),
            ContextBuilder::new(config.system_prompt.clone()),
            Arc::new(registry),
        )
        .with_streaming(config.stream.enabled)
        .with_max_iterations(config.max_iterations);

        Ok(Self::start(agent, config.greeting.clone()))
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Runs one turn. On success the answer is appended and returned; on
    /// failure the user turn stays and the error is returned.
    pub async fn send(&mut self, input: &str, observer: &mut dyn TurnObserver) -> Result<String> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ScoutError::EmptyInput.into());
        }

        self.conversation.push_user(input);
        debug!(session = %self.id, turns = self.conversation.len(), "running turn");

        match self.agent.run(self.conversation.messages(), observer).await {
            Ok(output) => {
                debug!(
                    session = %self.id,
                    tool_calls = output.tool_calls,
                    "turn complete"
                );
                self.conversation.push_assistant(output.answer.clone());
                Ok(output.answer)
            }
            Err(e) => {
                warn!(session = %self.id, "Turn aborted: {:#}", e);
                Err(e)
            }
        }
    }

    pub fn end(self) -> Conversation {
        info!(
            session = %self.id,
            turns = self.conversation.len(),
            seconds = (Utc::now() - self.started_at).num_seconds(),
            "session ended"
        );
        self.conversation
    }
}
