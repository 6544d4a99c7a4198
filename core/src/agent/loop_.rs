use crate::agent::events::{AgentEvent, LoopState, StreamAccumulator, TurnObserver};
use crate::agent::{ContextBuilder, ToolRegistry};
use crate::error::ScoutError;
use crate::session::Message;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ProviderEvent, ToolCall};
use anyhow::Result;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::debug;

/// Result of one completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub answer: String,
    /// Working transcript: system prompt, history, tool traffic, final answer.
    pub transcript: Vec<ChatMessage>,
    pub states: Vec<LoopState>,
    pub tool_calls: usize,
}

/// Alternates model calls and tool calls until the model answers without
/// requesting a tool.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    context_builder: ContextBuilder,
    tool_registry: Arc<ToolRegistry>,
    streaming: bool,
    max_iterations: Option<usize>,
}

struct Trace<'o> {
    states: Vec<LoopState>,
    observer: &'o mut dyn TurnObserver,
}

impl Trace<'_> {
    fn enter(&mut self, state: LoopState) {
        debug!(%state, "agent loop transition");
        self.states.push(state);
        self.observer.on_event(&AgentEvent::State(state));
    }
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        context_builder: ContextBuilder,
        tool_registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            context_builder,
            tool_registry,
            streaming: true,
            max_iterations: None,
        }
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Caps the number of model calls per turn. Unbounded when `None`.
    pub fn with_max_iterations(mut self, max: Option<usize>) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming && self.provider.supports_streaming()
    }

    pub async fn run(
        &self,
        history: &[Message],
        observer: &mut dyn TurnObserver,
    ) -> Result<TurnOutput> {
        let mut transcript = self.context_builder.build_messages(history);
        let specs = self.tool_registry.get_specs();
        let tools = (!self.tool_registry.is_empty()).then_some(specs.as_slice());

        let mut trace = Trace {
            states: vec![],
            observer,
        };
        let mut model_calls = 0;
        let mut tool_calls = 0;

        loop {
            trace.enter(LoopState::AwaitingModel);

            if let Some(max) = self.max_iterations
                && model_calls >= max
            {
                return Err(ScoutError::IterationLimit(max).into());
            }
            model_calls += 1;

            let request = ChatRequest {
                messages: &transcript,
                tools,
            };
            let response = self.call_model(request, trace.observer).await?;

            if !response.has_tool_calls() {
                let answer = response.text.unwrap_or_default();
                transcript.push(ChatMessage::assistant(answer.clone()));
                trace.enter(LoopState::Done);

                return Ok(TurnOutput {
                    answer,
                    transcript,
                    states: trace.states,
                    tool_calls,
                });
            }

            let calls = response.tool_calls;
            transcript.push(ChatMessage::assistant_with_tool_calls(
                response.text.unwrap_or_default(),
                calls.clone(),
            ));

            trace.enter(LoopState::AwaitingToolResult);
            for call in calls {
                let output = self.dispatch(&call, trace.observer).await?;
                transcript.push(ChatMessage::tool_result(call.id, output));
                tool_calls += 1;
            }
        }
    }

    async fn dispatch(&self, call: &ToolCall, observer: &mut dyn TurnObserver) -> Result<String> {
        observer.on_event(&AgentEvent::ToolStarted {
            name: &call.name,
            arguments: &call.arguments,
        });

        let output = self
            .tool_registry
            .execute(&call.name, &call.arguments)
            .await?
            .into_text();

        observer.on_event(&AgentEvent::ToolFinished {
            name: &call.name,
            output: &output,
        });

        Ok(output)
    }

    async fn call_model(
        &self,
        request: ChatRequest<'_>,
        observer: &mut dyn TurnObserver,
    ) -> Result<ChatResponse> {
        if !self.is_streaming() {
            return self.provider.chat(request).await.map_err(model_error);
        }

        let mut stream = self.provider.chat_stream(request).await.map_err(model_error)?;
        let mut accumulator = StreamAccumulator::default();
        let mut tool_calls = vec![];

        while let Some(event) = stream.next().await {
            match event {
                ProviderEvent::Token(fragment) => {
                    let text = accumulator.push(&fragment);
                    observer.on_event(&AgentEvent::Token {
                        fragment: &fragment,
                        text,
                    });
                }
                ProviderEvent::ToolCall(call) => tool_calls.push(call),
                ProviderEvent::Error(message) => return Err(ScoutError::Model(message).into()),
                ProviderEvent::Done => break,
            }
        }

        let text = accumulator.into_text();
        if text.trim().is_empty() && tool_calls.is_empty() {
            return Err(ScoutError::Model(
                "Empty response from API: no content or tool calls".to_string(),
            )
            .into());
        }

        Ok(ChatResponse {
            text: (!text.is_empty()).then_some(text),
            tool_calls,
        })
    }
}

fn model_error(err: anyhow::Error) -> anyhow::Error {
    if ScoutError::find(&err).is_some() {
        err
    } else {
        ScoutError::Model(format!("{err:#}")).into()
    }
}
