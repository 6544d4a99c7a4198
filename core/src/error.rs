use thiserror::Error;

/// Failures that end a turn or prevent a session from starting.
///
/// Call sites carry these inside `anyhow::Error`; use
/// [`ScoutError::find`] to recover the typed kind.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("No API key found. Set GROQ_API_KEY or run `scout onboard`.")]
    MissingCredential,

    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Invalid input for tool '{tool}': {message}")]
    InvalidToolInput { tool: String, message: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Message is empty")]
    EmptyInput,

    #[error("Gave up after {0} model calls without a final answer")]
    IterationLimit(usize),
}

impl ScoutError {
    pub fn tool(tool: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: err.to_string(),
        }
    }

    pub fn invalid_input(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidToolInput {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn find(err: &anyhow::Error) -> Option<&ScoutError> {
        err.chain().find_map(|cause| cause.downcast_ref::<ScoutError>())
    }
}
