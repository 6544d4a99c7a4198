use crate::config::ToolsConfig;
use crate::error::ScoutError;
use crate::tools::{http_client, truncate_chars};
use crate::traits::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

pub const NAME: &str = "wikipedia";
const WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const MAX_QUERY_CHARS: usize = 300;
const NO_RESULT: &str = "No good Wikipedia Search Result was found";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    extract: Option<String>,
}

/// Encyclopedic lookup: finds matching article titles, then fetches each
/// article's plain-text introduction.
pub struct WikipediaTool {
    client: reqwest::Client,
    api_url: String,
    top_k: usize,
    max_chars: usize,
}

impl WikipediaTool {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            client: http_client(),
            api_url: WIKIPEDIA_API_URL.to_string(),
            top_k: config.top_k_results.max(1),
            max_chars: config.max_chars,
        }
    }

    /// Point at another MediaWiki install, e.g. a different language edition.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> anyhow::Result<T> {
        let response = self
            .client
            .get(&self.api_url)
            .query(params)
            .send()
            .await
            .map_err(|e| ScoutError::tool(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::tool(NAME, format!("HTTP {status}")).into());
        }

        Ok(response
            .json()
            .await
            .map_err(|e| ScoutError::tool(NAME, e))?)
    }

    async fn search_titles(&self, query: &str) -> anyhow::Result<Vec<String>> {
        let limit = self.top_k.to_string();
        let response: SearchResponse = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .await?;

        Ok(response
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default())
    }

    async fn fetch_summary(&self, title: &str) -> anyhow::Result<Option<(String, String)>> {
        let response: ExtractResponse = self
            .get_json(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
            ])
            .await?;

        Ok(first_extract(response))
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search Wikipedia for factual information."
    }

    async fn run(&self, query: &str) -> anyhow::Result<String> {
        let query = truncate_chars(query, MAX_QUERY_CHARS);
        let titles = self.search_titles(&query).await?;

        let mut pages = vec![];
        for title in titles.iter().take(self.top_k) {
            if let Some(page) = self.fetch_summary(title).await? {
                pages.push(page);
            }
        }

        Ok(format_pages(&pages, self.max_chars))
    }
}

fn first_extract(response: ExtractResponse) -> Option<(String, String)> {
    response
        .query?
        .pages
        .into_values()
        .find_map(|page| {
            let extract = page.extract?.trim().to_string();
            (!extract.is_empty()).then_some((page.title, extract))
        })
}

fn format_pages(pages: &[(String, String)], max_chars: usize) -> String {
    if pages.is_empty() {
        return truncate_chars(NO_RESULT, max_chars);
    }

    let joined = pages
        .iter()
        .map(|(title, summary)| format!("Page: {title}\nSummary: {summary}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_chars(&joined, max_chars)
}
