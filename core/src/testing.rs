//! In-memory providers and tools for exercising the agent loop offline.

use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ProviderEvent, Tool, ToolCall};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub enum Step {
    Reply(ChatResponse),
    Fail(String),
}

pub fn reply(text: &str) -> Step {
    Step::Reply(ChatResponse::text(text))
}

pub fn call_tool(name: &str, query: &str) -> Step {
    Step::Reply(ChatResponse {
        text: None,
        tool_calls: vec![ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: serde_json::json!({ "query": query }).to_string(),
        }],
    })
}

/// Replays a fixed script of responses and records every request.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ChatRequest<'_>) -> Step {
        self.requests.lock().unwrap().push(request.messages.to_vec());
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Fail("script exhausted".to_string()))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        match self.next(request) {
            Step::Reply(response) => Ok(response),
            Step::Fail(message) => Err(crate::error::ScoutError::Model(message).into()),
        }
    }

    async fn chat_stream(
        &self,
        request: ChatRequest<'_>,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let events = match self.next(request) {
            Step::Reply(response) => {
                let mut events: Vec<ProviderEvent> = response
                    .text_or_empty()
                    .split_inclusive(' ')
                    .map(|fragment| ProviderEvent::Token(fragment.to_string()))
                    .collect();
                events.extend(response.tool_calls.into_iter().map(ProviderEvent::ToolCall));
                events.push(ProviderEvent::Done);
                events
            }
            Step::Fail(message) => vec![ProviderEvent::Error(message)],
        };
        Ok(stream::iter(events).boxed())
    }
}

pub struct FixedTool {
    name: String,
    output: String,
}

impl FixedTool {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            output: output.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FixedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Returns a canned answer."
    }

    async fn run(&self, _query: &str) -> anyhow::Result<String> {
        Ok(self.output.clone())
    }
}

pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails."
    }

    async fn run(&self, _query: &str) -> anyhow::Result<String> {
        anyhow::bail!("provider unavailable (429 Too Many Requests)")
    }
}

/// Local HTTP endpoint answering one canned response per connection, in
/// order, and recording each request line.
pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(vec![]));
        let seen = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };

                let mut raw = vec![];
                let mut buf = [0u8; 4096];
                while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => raw.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&raw);
                let line = request.lines().next().unwrap_or_default().to_string();
                seen.lock().unwrap().push(line);

                let response = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            url: format!("http://{addr}"),
            requests,
        }
    }

    pub async fn ok(body: &str) -> Self {
        Self::start(vec![(200, body.to_string())]).await
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// An address nothing listens on.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
