pub mod arxiv;
pub mod web_search;
pub mod wikipedia;

pub use arxiv::ArxivTool;
pub use web_search::WebSearchTool;
pub use wikipedia::WikipediaTool;

use crate::config::ToolsConfig;
use crate::traits::Tool;
use std::time::Duration;

const USER_AGENT: &str = concat!("scout/", env!("CARGO_PKG_VERSION"));

/// The lookup tools enabled by `config`, in registration order.
pub fn default_tools(config: &ToolsConfig) -> Vec<Box<dyn Tool>> {
    let mut tools: Vec<Box<dyn Tool>> = vec![];

    if config.is_enabled(web_search::NAME) {
        tools.push(Box::new(WebSearchTool::new(config)));
    }
    if config.is_enabled(arxiv::NAME) {
        tools.push(Box::new(ArxivTool::new(config)));
    }
    if config.is_enabled(wikipedia::NAME) {
        tools.push(Box::new(WikipediaTool::new(config)));
    }

    for name in &config.enabled {
        if ![web_search::NAME, arxiv::NAME, wikipedia::NAME].contains(&name.as_str()) {
            tracing::warn!("Ignoring unknown tool in config: {}", name);
        }
    }

    tools
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
