use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, transport_error, Action, ActionDescriptor};
use crate::error::ActionError;

pub const NAME: &str = "wikipedia_search";

const DEFAULT_SENTENCES: usize = 3;
const MAX_OPTIONS: usize = 5;

/// Short English Wikipedia summaries.
///
/// The query is first resolved through opensearch (the closest title wins),
/// then the page summary is fetched from the REST API.
pub struct WikipediaSearch {
    client: reqwest::Client,
    base_url: String,
    descriptor: ActionDescriptor,
}

#[derive(Deserialize)]
struct Args {
    query: String,
    #[serde(default)]
    sentences: Option<usize>,
}

#[derive(Deserialize)]
struct PageSummary {
    #[serde(rename = "type", default)]
    kind: String,
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Deserialize)]
struct ContentUrls {
    desktop: PageUrl,
}

#[derive(Deserialize)]
struct PageUrl {
    page: String,
}

enum Lookup {
    Found { title: String, summary: String, url: String },
    Disambiguation(Vec<String>),
    NotFound,
}

impl WikipediaSearch {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        let descriptor = ActionDescriptor::new(
            NAME,
            "Fetch a short summary from Wikipedia. \
             Args: query (str): Search term (e.g., \"Python programming language\"); \
             sentences (int): Number of summary sentences (default 3). \
             Returns the page title, summary and URL, or error info.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search term (e.g., \"Python programming language\")" },
                    "sentences": { "type": "integer", "description": "Number of summary sentences", "default": DEFAULT_SENTENCES }
                },
                "required": ["query"]
            }),
        );
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            descriptor,
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, reqwest::Error> {
        let limit = (MAX_OPTIONS + 1).to_string();
        let body: Value = self
            .client
            .get(format!("{}/w/api.php", self.base_url))
            .query(&[
                ("action", "opensearch"),
                ("search", query),
                ("limit", limit.as_str()),
                ("namespace", "0"),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // [query, [titles], [descriptions], [urls]]
        Ok(body
            .get(1)
            .and_then(Value::as_array)
            .map(|titles| {
                titles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn summary_url(&self, title: &str) -> Option<Url> {
        let mut url = Url::parse(&format!("{}/api/rest_v1/page/summary", self.base_url)).ok()?;
        url.path_segments_mut().ok()?.push(&title.replace(' ', "_"));
        Some(url)
    }

    async fn lookup(&self, query: &str, sentences: usize) -> Result<Lookup, String> {
        let candidates = self.search(query).await.map_err(transport_error)?;
        let Some(title) = candidates.first() else {
            return Ok(Lookup::NotFound);
        };

        let url = self
            .summary_url(title)
            .ok_or_else(|| format!("invalid Wikipedia base URL: {}", self.base_url))?;
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Lookup::NotFound);
        }
        let page: PageSummary = response
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        if page.kind == "disambiguation" {
            let options = candidates
                .iter()
                .filter(|candidate| **candidate != page.title)
                .take(MAX_OPTIONS)
                .cloned()
                .collect();
            return Ok(Lookup::Disambiguation(options));
        }

        let url = page
            .content_urls
            .map(|urls| urls.desktop.page)
            .unwrap_or_else(|| format!("{}/wiki/{}", self.base_url, page.title.replace(' ', "_")));
        Ok(Lookup::Found {
            summary: first_sentences(&page.extract, sentences),
            title: page.title,
            url,
        })
    }
}

#[async_trait]
impl Action for WikipediaSearch {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: Value) -> Result<Value, ActionError> {
        let Args { query, sentences } = parse_args(NAME, args)?;
        let sentences = sentences.unwrap_or(DEFAULT_SENTENCES).max(1);

        Ok(match self.lookup(&query, sentences).await {
            Ok(Lookup::Found { title, summary, url }) => {
                json!({ "title": title, "summary": summary, "url": url })
            }
            Ok(Lookup::Disambiguation(options)) => json!({
                "query": query,
                "error": "Disambiguation error",
                "options": options,
            }),
            Ok(Lookup::NotFound) => json!({ "query": query, "error": "Page not found" }),
            Err(error) => json!({ "query": query, "error": error }),
        })
    }
}

/// The first `count` sentences of `text`. A sentence ends at `.`, `!` or `?`
/// followed by whitespace or the end of the text.
pub fn first_sentences(text: &str, count: usize) -> String {
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            seen += 1;
            if seen == count {
                return text[..idx + ch.len_utf8()].trim().to_string();
            }
        }
    }
    text.trim().to_string()
}
