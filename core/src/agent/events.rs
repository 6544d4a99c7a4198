/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    AwaitingToolResult,
    Done,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingModel => write!(f, "awaiting-model"),
            Self::AwaitingToolResult => write!(f, "awaiting-tool-result"),
            Self::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent<'a> {
    State(LoopState),
    /// A streamed fragment and everything received so far for this model call.
    Token {
        fragment: &'a str,
        text: &'a str,
    },
    ToolStarted {
        name: &'a str,
        arguments: &'a str,
    },
    ToolFinished {
        name: &'a str,
        output: &'a str,
    },
}

pub trait TurnObserver {
    fn on_event(&mut self, event: &AgentEvent<'_>);
}

impl<F> TurnObserver for F
where
    F: FnMut(&AgentEvent<'_>),
{
    fn on_event(&mut self, event: &AgentEvent<'_>) {
        self(event)
    }
}

pub struct NoopObserver;

impl TurnObserver for NoopObserver {
    fn on_event(&mut self, _event: &AgentEvent<'_>) {}
}

/// Running text of one streamed model response.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
}

impl StreamAccumulator {
    pub fn push(&mut self, fragment: &str) -> &str {
        self.text.push_str(fragment);
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
