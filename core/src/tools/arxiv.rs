use crate::config::ToolsConfig;
use crate::error::ScoutError;
use crate::tools::{collapse_whitespace, decode_entities, http_client, truncate_chars};
use crate::traits::Tool;
use async_trait::async_trait;

pub const NAME: &str = "arxiv";
const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
const MAX_QUERY_CHARS: usize = 300;
const NO_RESULT: &str = "No good Arxiv Result was found";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Paper {
    published: String,
    title: String,
    authors: Vec<String>,
    summary: String,
}

/// Academic paper search over the arXiv export API (Atom feed).
pub struct ArxivTool {
    client: reqwest::Client,
    api_url: String,
    top_k: usize,
    max_chars: usize,
}

impl ArxivTool {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            client: http_client(),
            api_url: ARXIV_API_URL.to_string(),
            top_k: config.top_k_results.max(1),
            max_chars: config.max_chars,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl Tool for ArxivTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search arXiv for academic papers."
    }

    async fn run(&self, query: &str) -> anyhow::Result<String> {
        let query = truncate_chars(query.trim(), MAX_QUERY_CHARS);
        let max_results = self.top_k.to_string();

        // Bare identifiers ("1706.03762", "2301.00001v2") go through id_list.
        let lookup = if is_arxiv_identifier(&query) {
            ("id_list", query.split_whitespace().collect::<Vec<_>>().join(","))
        } else {
            ("search_query", format!("all:{query}"))
        };

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                (lookup.0, lookup.1.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ScoutError::tool(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::tool(NAME, format!("HTTP {status}")).into());
        }

        let feed = response
            .text()
            .await
            .map_err(|e| ScoutError::tool(NAME, e))?;

        let papers: Vec<Paper> = parse_feed(&feed).into_iter().take(self.top_k).collect();
        Ok(format_papers(&papers, self.max_chars))
    }
}

fn is_arxiv_identifier(query: &str) -> bool {
    let mut parts = query.split_whitespace().peekable();
    parts.peek().is_some()
        && parts.all(|part| {
            let (core, version) = match part.split_once('v') {
                Some((core, version)) => (core, Some(version)),
                None => (part, None),
            };
            let version_ok = version
                .is_none_or(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()));
            let core_ok = match core.split_once('.') {
                Some((yymm, seq)) => {
                    yymm.len() == 4
                        && (4..=5).contains(&seq.len())
                        && yymm.chars().chain(seq.chars()).all(|c| c.is_ascii_digit())
                }
                None => false,
            };
            core_ok && version_ok
        })
}

/// Text between the first `<tag ...>` and `</tag>` in `xml`.
fn tag_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut rest = xml;
    loop {
        let start = rest.find(&open)?;
        let after = &rest[start + open.len()..];
        // Skip longer tag names sharing the prefix, e.g. <title> vs <titles>.
        match after.chars().next() {
            Some('>') | Some(' ') | Some('\n') | Some('\t') => {
                let body_start = after.find('>')? + 1;
                let body = &after[body_start..];
                let end = body.find(&close)?;
                return Some(&body[..end]);
            }
            _ => rest = after,
        }
    }
}

fn clean(text: &str) -> String {
    collapse_whitespace(&decode_entities(text))
}

fn parse_feed(feed: &str) -> Vec<Paper> {
    feed.split("<entry>")
        .skip(1)
        .filter_map(|entry| {
            let entry = entry.split("</entry>").next().unwrap_or(entry);
            let title = clean(tag_text(entry, "title")?);
            let summary = clean(tag_text(entry, "summary").unwrap_or_default());
            let published = tag_text(entry, "published")
                .map(|p| p.trim().chars().take(10).collect())
                .unwrap_or_default();
            let authors = entry
                .split("<author>")
                .skip(1)
                .filter_map(|author| tag_text(author, "name").map(clean))
                .collect();

            // arXiv reports malformed queries as a single entry titled "Error".
            if title == "Error" && summary.starts_with("incorrect") {
                return None;
            }

            Some(Paper {
                published,
                title,
                authors,
                summary,
            })
        })
        .collect()
}

fn format_papers(papers: &[Paper], max_chars: usize) -> String {
    if papers.is_empty() {
        return truncate_chars(NO_RESULT, max_chars);
    }

    let joined = papers
        .iter()
        .map(|p| {
            format!(
                "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
                p.published,
                p.title,
                p.authors.join(", "),
                p.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_chars(&joined, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubServer, closed_url};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:transformers</title>
  <opensearch:totalResults xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">1</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex recurrent or
convolutional neural networks &amp; attention.
    </summary>
    <author>
      <name>Ashish Vaswani</name>
    </author>
    <author>
      <name>Noam Shazeer</name>
      <arxiv:affiliation xmlns:arxiv="http://arxiv.org/schemas/atom">Google</arxiv:affiliation>
    </author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_atom_entry() {
        let papers = parse_feed(FEED);
        assert_eq!(
            papers,
            vec![Paper {
                published: "2017-06-12".to_string(),
                title: "Attention Is All You Need".to_string(),
                authors: vec!["Ashish Vaswani".to_string(), "Noam Shazeer".to_string()],
                summary: "The dominant sequence transduction models are based on complex recurrent or convolutional neural networks & attention.".to_string(),
            }]
        );
    }

    #[test]
    fn formats_paper() {
        let text = format_papers(&parse_feed(FEED), 1000);
        assert!(text.starts_with(
            "Published: 2017-06-12\nTitle: Attention Is All You Need\nAuthors: Ashish Vaswani, Noam Shazeer\nSummary: The dominant"
        ));
    }

    #[test]
    fn output_is_bounded() {
        let papers = parse_feed(FEED);
        for max in [0, 5, 200, 300] {
            assert!(format_papers(&papers, max).chars().count() <= max);
            assert!(format_papers(&[], max).chars().count() <= max);
        }
    }

    #[test]
    fn empty_feed_reports_no_result() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>ArXiv Query</title></feed>"#;
        assert_eq!(format_papers(&parse_feed(feed), 200), NO_RESULT);
    }

    #[test]
    fn error_entry_is_not_a_paper() {
        let feed = "<feed><entry><id>http://arxiv.org/api/errors#incorrect_id_format</id><title>Error</title><summary>incorrect id format for 1234</summary></entry></feed>";
        assert!(parse_feed(feed).is_empty());
    }

    #[test]
    fn recognizes_identifiers() {
        assert!(is_arxiv_identifier("1706.03762"));
        assert!(is_arxiv_identifier("2301.00001v2 1706.03762"));
        assert!(!is_arxiv_identifier("recent transformers papers"));
        assert!(!is_arxiv_identifier("1706.03762v"));
        assert!(!is_arxiv_identifier(""));
    }

    fn tool_at(url: &str, max_chars: usize) -> ArxivTool {
        ArxivTool::new(&ToolsConfig {
            max_chars,
            ..Default::default()
        })
        .with_api_url(format!("{url}/api/query"))
    }

    #[tokio::test]
    async fn free_text_searches_all_fields() {
        let server = StubServer::ok(FEED).await;
        let output = tool_at(&server.url, 200)
            .run("recent transformers papers")
            .await
            .unwrap();

        assert!(output.starts_with("Published: 2017-06-12"));
        assert!(output.chars().count() <= 200);
        assert_eq!(
            server.requests(),
            vec![
                "GET /api/query?search_query=all%3Arecent+transformers+papers&start=0&max_results=1 HTTP/1.1"
            ]
        );
    }

    #[tokio::test]
    async fn identifiers_go_through_id_list() {
        let server = StubServer::ok(FEED).await;
        tool_at(&server.url, 200).run("1706.03762v7").await.unwrap();

        let requests = server.requests();
        assert!(
            requests[0].starts_with("GET /api/query?id_list=1706.03762v7&"),
            "{requests:?}"
        );
    }

    #[tokio::test]
    async fn long_queries_are_clipped() {
        let server = StubServer::ok(FEED).await;
        tool_at(&server.url, 200).run(&"a".repeat(400)).await.unwrap();

        let expected = format!("search_query=all%3A{}&", "a".repeat(300));
        assert!(server.requests()[0].contains(&expected));
    }

    #[tokio::test]
    async fn provider_failures_are_tool_errors() {
        let server = StubServer::start(vec![(503, "busy".to_string())]).await;
        let err = tool_at(&server.url, 200).run("transformers").await.unwrap_err();
        assert!(matches!(
            ScoutError::find(&err),
            Some(ScoutError::Tool { tool, .. }) if tool == NAME
        ));

        let err = tool_at(&closed_url().await, 200)
            .run("transformers")
            .await
            .unwrap_err();
        assert!(matches!(
            ScoutError::find(&err),
            Some(ScoutError::Tool { tool, .. }) if tool == NAME
        ));
    }
}
