use crate::config::ToolsConfig;
use crate::error::ScoutError;
use crate::tools::{collapse_whitespace, decode_entities, http_client, truncate_chars};
use crate::traits::Tool;
use async_trait::async_trait;

pub const NAME: &str = "web_search";
const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const NO_RESULT: &str = "No good web search result was found";

/// General web search over the DuckDuckGo HTML endpoint (no API key).
pub struct WebSearchTool {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    max_chars: usize,
}

impl WebSearchTool {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            client: http_client(),
            base_url: DDG_HTML_URL.to_string(),
            max_results: config.top_k_results.max(1),
            max_chars: config.max_chars,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn summarize(&self, html: &str) -> String {
        let snippets = extract_snippets(html, self.max_results);
        if snippets.is_empty() {
            return truncate_chars(NO_RESULT, self.max_chars);
        }
        truncate_chars(&snippets.join(" "), self.max_chars)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search the web for recent information."
    }

    async fn run(&self, query: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ScoutError::tool(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::tool(NAME, format!("HTTP {status}")).into());
        }

        let html = response
            .text()
            .await
            .map_err(|e| ScoutError::tool(NAME, e))?;

        Ok(self.summarize(&html))
    }
}

/// Snippet text of the first `limit` organic results.
fn extract_snippets(html: &str, limit: usize) -> Vec<String> {
    html.split("class=\"result__snippet\"")
        .skip(1)
        .filter_map(|chunk| {
            let body = chunk.split_once('>')?.1;
            let body = body.split("</a>").next().unwrap_or(body);
            let text = collapse_whitespace(&decode_entities(&strip_tags(body)));
            (!text.is_empty()).then_some(text)
        })
        .take(limit)
        .collect()
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}
