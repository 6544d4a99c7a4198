use crate::error::ScoutError;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ProviderEvent, ToolCall, ToolSpec};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Serialize)]
struct GroqRequest<'a> {
    model: &'a str,
    messages: Vec<GroqMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GroqTool<'a>>>,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GroqMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<GroqToolCallRequest<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct GroqToolCallRequest<'a> {
    id: &'a str,
    r#type: &'a str,
    function: GroqFunctionRequest<'a>,
}

#[derive(Debug, Serialize)]
struct GroqFunctionRequest<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct GroqTool<'a> {
    r#type: &'a str,
    function: GroqToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct GroqToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
}

#[derive(Debug, Deserialize)]
struct GroqResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<GroqToolCall>>,
}

#[derive(Debug, Deserialize)]
struct GroqToolCall {
    id: String,
    function: GroqFunction,
}

#[derive(Debug, Deserialize)]
struct GroqFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

/// Tool-call fragments collected across stream chunks, keyed by index.
#[derive(Debug, Default)]
pub(crate) struct PendingToolCalls {
    calls: BTreeMap<usize, ToolCall>,
}

impl PendingToolCalls {
    fn merge(&mut self, delta: &StreamToolCall) {
        let entry = self.calls.entry(delta.index).or_insert_with(|| ToolCall {
            id: String::new(),
            name: String::new(),
            arguments: String::new(),
        });

        if let Some(id) = delta.id.as_deref()
            && !id.is_empty()
        {
            entry.id = id.to_string();
        }

        if let Some(func) = &delta.function {
            if let Some(name) = func.name.as_deref()
                && !name.is_empty()
            {
                entry.name = name.to_string();
            }
            if let Some(args) = &func.arguments {
                entry.arguments.push_str(args);
            }
        }
    }

    fn drain(&mut self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.calls)
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|mut call| {
                if call.id.is_empty() {
                    call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                }
                if call.arguments.trim().is_empty() {
                    call.arguments = "{}".to_string();
                }
                ProviderEvent::ToolCall(call)
            })
            .collect()
    }
}

/// OpenAI-compatible chat completions client pointed at Groq.
pub struct GroqProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

impl GroqProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: crate::config::DEFAULT_MODEL.to_string(),
            base_url: GROQ_BASE_URL.to_string(),
            temperature: 0.7,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<GroqMessage<'_>> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = m.tool_calls.as_ref().map(|tcs| {
                    tcs.iter()
                        .map(|tc| GroqToolCallRequest {
                            id: &tc.id,
                            r#type: "function",
                            function: GroqFunctionRequest {
                                name: &tc.name,
                                arguments: &tc.arguments,
                            },
                        })
                        .collect()
                });

                // Assistant tool-call turns may carry no text.
                let content = if m.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(m.content.as_str())
                };

                GroqMessage {
                    role: m.role.as_str(),
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.as_deref(),
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<GroqTool<'_>> {
        tools
            .iter()
            .map(|t| GroqTool {
                r#type: "function",
                function: GroqToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect()
    }

    fn build_request<'a>(&'a self, request: ChatRequest<'a>, stream: bool) -> GroqRequest<'a> {
        GroqRequest {
            model: &self.model,
            messages: Self::convert_messages(request.messages),
            tools: request
                .tools
                .filter(|t| !t.is_empty())
                .map(Self::convert_tools),
            temperature: self.temperature,
            stream,
        }
    }

    async fn post(&self, body: &GroqRequest<'_>) -> anyhow::Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ScoutError::Model(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScoutError::Model(format!("Groq API error ({status}): {error_text}")).into());
        }

        Ok(response)
    }

    fn parse_response(response: GroqResponse) -> anyhow::Result<ChatResponse> {
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ScoutError::Model("No choices in response".to_string()))?;

        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .map(|tcs| {
                tcs.into_iter()
                    .map(|tc| ToolCall {
                        id: tc.id,
                        name: tc.function.name,
                        arguments: tc.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let has_content = message
            .content
            .as_ref()
            .is_some_and(|c| !c.trim().is_empty());
        if !has_content && tool_calls.is_empty() {
            return Err(ScoutError::Model(
                "Empty response from API: no content or tool calls".to_string(),
            )
            .into());
        }

        Ok(ChatResponse {
            text: message.content,
            tool_calls,
        })
    }

    pub(crate) fn parse_sse_line(line: &str, pending: &mut PendingToolCalls) -> Vec<ProviderEvent> {
        let line = line.trim();

        let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
            return vec![];
        };

        if data == "[DONE]" {
            return pending.drain();
        }

        let response = match serde_json::from_str::<StreamResponse>(data) {
            Ok(response) => response,
            Err(e) => {
                debug!("Skipping unparseable stream chunk: {}", e);
                return vec![];
            }
        };

        let mut events = vec![];
        for choice in response.choices {
            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                events.push(ProviderEvent::Token(content));
            }

            for delta in choice.delta.tool_calls.iter().flatten() {
                pending.merge(delta);
            }

            if choice.finish_reason.as_deref() == Some("tool_calls") {
                events.extend(pending.drain());
            }
        }

        events
    }
}

#[async_trait]
impl Provider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let body = self.build_request(request, false);
        let response = self.post(&body).await?;

        let groq_response: GroqResponse = response
            .json()
            .await
            .map_err(|e| ScoutError::Model(format!("Failed to decode response: {e}")))?;

        Self::parse_response(groq_response)
    }

    async fn chat_stream(
        &self,
        request: ChatRequest<'_>,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let body = self.build_request(request, true);
        let response = self.post(&body).await?;

        let (tx, rx) = tokio::sync::mpsc::channel::<ProviderEvent>(256);

        tokio::spawn(async move {
            use futures_util::StreamExt as _;
            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut pending = PendingToolCalls::default();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(ProviderEvent::Error(e.to_string())).await;
                        return;
                    }
                };

                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);

                    for event in Self::parse_sse_line(&line, &mut pending) {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }

            for event in pending.drain() {
                if tx.send(event).await.is_err() {
                    return;
                }
            }

            let _ = tx.send(ProviderEvent::Done).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ToolQuery;

    #[test]
    fn content_chunks_become_tokens() {
        let mut pending = PendingToolCalls::default();
        let events = GroqProvider::parse_sse_line(
            r#"data: {"choices":[{"delta":{"content":"Par"},"finish_reason":null}]}"#,
            &mut pending,
        );
        assert_eq!(events, vec![ProviderEvent::Token("Par".to_string())]);
    }

    #[test]
    fn ignores_comments_and_garbage() {
        let mut pending = PendingToolCalls::default();
        assert!(GroqProvider::parse_sse_line(": keep-alive", &mut pending).is_empty());
        assert!(GroqProvider::parse_sse_line("", &mut pending).is_empty());
        assert!(GroqProvider::parse_sse_line("data: {not json", &mut pending).is_empty());
    }

    #[test]
    fn tool_call_fragments_are_assembled() {
        let mut pending = PendingToolCalls::default();
        let first = GroqProvider::parse_sse_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"arxiv","arguments":"{\"query\":"}}]},"finish_reason":null}]}"#,
            &mut pending,
        );
        assert!(first.is_empty());

        let second = GroqProvider::parse_sse_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"transformers\"}"}}]},"finish_reason":"tool_calls"}]}"#,
            &mut pending,
        );

        assert_eq!(
            second,
            vec![ProviderEvent::ToolCall(ToolCall {
                id: "call_1".to_string(),
                name: "arxiv".to_string(),
                arguments: r#"{"query":"transformers"}"#.to_string(),
            })]
        );
    }

    #[test]
    fn parallel_tool_calls_keep_index_order() {
        let mut pending = PendingToolCalls::default();
        let events = GroqProvider::parse_sse_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"id":"b","function":{"name":"wikipedia","arguments":"{}"}},{"index":0,"id":"a","function":{"name":"web_search","arguments":"{}"}}]},"finish_reason":"tool_calls"}]}"#,
            &mut pending,
        );

        let names: Vec<_> = events
            .iter()
            .map(|e| match e {
                ProviderEvent::ToolCall(call) => call.name.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(names, vec!["web_search", "wikipedia"]);
    }

    #[test]
    fn done_flushes_unfinished_tool_calls() {
        let mut pending = PendingToolCalls::default();
        GroqProvider::parse_sse_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"wikipedia"}}]},"finish_reason":null}]}"#,
            &mut pending,
        );

        let events = GroqProvider::parse_sse_line("data: [DONE]", &mut pending);
        match events.as_slice() {
            [ProviderEvent::ToolCall(call)] => {
                assert_eq!(call.name, "wikipedia");
                assert_eq!(call.arguments, "{}");
                assert!(call.id.starts_with("call_"));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn parse_response_with_text() {
        let response: GroqResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Paris."}}]}"#,
        )
        .unwrap();

        let parsed = GroqProvider::parse_response(response).unwrap();
        assert_eq!(parsed.text_or_empty(), "Paris.");
        assert!(!parsed.has_tool_calls());
    }

    #[test]
    fn parse_response_with_tool_call() {
        let response: GroqResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":null,"tool_calls":[{"id":"call_9","type":"function","function":{"name":"arxiv","arguments":"{\"query\":\"transformers\"}"}}]}}]}"#,
        )
        .unwrap();

        let parsed = GroqProvider::parse_response(response).unwrap();
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "arxiv");
    }

    #[test]
    fn parse_response_rejects_empty() {
        let empty: GroqResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        let err = GroqProvider::parse_response(empty).unwrap_err();
        assert!(matches!(ScoutError::find(&err), Some(ScoutError::Model(_))));

        let blank: GroqResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(GroqProvider::parse_response(blank).is_err());
    }

    #[test]
    fn request_serializes_tool_turns() {
        let provider = GroqProvider::new("gsk_test");
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("hi"),
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "wikipedia".to_string(),
                    arguments: r#"{"query":"Paris"}"#.to_string(),
                }],
            ),
            ChatMessage::tool_result("call_1", "Page: Paris"),
        ];
        let specs = vec![ToolSpec {
            name: "wikipedia".to_string(),
            description: "Search Wikipedia for factual information.".to_string(),
            parameters_schema: ToolQuery::schema(),
        }];

        let body = provider.build_request(
            ChatRequest {
                messages: &messages,
                tools: Some(&specs),
            },
            true,
        );
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "llama-3.1-8b-instant");
        assert_eq!(json["stream"], true);
        assert!(json["messages"][2].get("content").is_none());
        assert_eq!(json["messages"][2]["tool_calls"][0]["function"]["name"], "wikipedia");
        assert_eq!(json["messages"][3]["role"], "tool");
        assert_eq!(json["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(json["tools"][0]["type"], "function");
    }
}
