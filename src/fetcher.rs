use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use html_escape::decode_html_entities;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{FeedEndpoints, HttpConfig};

/// Shared HTTP client for feeds, article pages and images.
pub fn build_client(config: &HttpConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed returned status {0}")]
    Status(StatusCode),
    #[error("feed could not be parsed: {0}")]
    Parse(#[from] parser::ParseFeedError),
}

/// The fixed list of aggregator sections offered as favourite topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Topic {
    #[default]
    World,
    Nation,
    Business,
    Technology,
    Entertainment,
    Sports,
    Science,
    Health,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::World,
        Topic::Nation,
        Topic::Business,
        Topic::Technology,
        Topic::Entertainment,
        Topic::Sports,
        Topic::Science,
        Topic::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::World => "WORLD",
            Topic::Nation => "NATION",
            Topic::Business => "BUSINESS",
            Topic::Technology => "TECHNOLOGY",
            Topic::Entertainment => "ENTERTAINMENT",
            Topic::Sports => "SPORTS",
            Topic::Science => "SCIENCE",
            Topic::Health => "HEALTH",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsMode {
    Top,
    Topic(Topic),
    Search(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published: Option<DateTime<Utc>>,
}

impl FeedItem {
    pub fn published_display(&self) -> String {
        match self.published {
            Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            None => "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ItemField {
    Link,
    Source,
}

impl ItemField {
    fn buffer<'a>(self, link: &'a mut String, source: &'a mut String) -> &'a mut String {
        match self {
            ItemField::Link => link,
            ItemField::Source => source,
        }
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    endpoints: FeedEndpoints,
}

impl Fetcher {
    pub fn new(client: Client, endpoints: FeedEndpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn feed_url(&self, mode: &NewsMode) -> String {
        match mode {
            NewsMode::Top => self.endpoints.top_url.clone(),
            NewsMode::Topic(topic) => self.endpoints.topic_url.replace("{topic}", topic.as_str()),
            NewsMode::Search(text) => {
                let stripped = text.replace(' ', "");
                self.endpoints
                    .search_url
                    .replace("{query}", &urlencoding::encode(&stripped))
            }
        }
    }

    pub async fn fetch(&self, mode: &NewsMode) -> Result<Vec<FeedItem>, FetchError> {
        let url = self.feed_url(mode);
        info!("Fetching feed: {:?} ({})", mode, url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let bytes = response.bytes().await?;

        let items = Self::parse_items(&bytes)?;
        info!(count = items.len(), "Parsed feed items");
        Ok(items)
    }

    /// Map every feed entry to a [`FeedItem`], keeping upstream order.
    pub fn parse_items(xml_bytes: &[u8]) -> Result<Vec<FeedItem>, FetchError> {
        // feed_rs drops the RSS <source> element, so read it from the raw XML
        let sources = Self::extract_sources_from_xml(xml_bytes);
        let parsed = parser::parse(xml_bytes)?;

        let mut items = Vec::with_capacity(parsed.entries.len());
        for entry in parsed.entries {
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();

            if link.is_empty() {
                warn!("Skipping entry with no link: {}", title);
                continue;
            }

            let source = sources
                .get(&link)
                .cloned()
                .or_else(|| Self::host_name(&link))
                .unwrap_or_else(|| "source".to_string());

            let published: Option<DateTime<Utc>> = entry.published.or(entry.updated);

            items.push(FeedItem {
                title,
                link,
                source,
                published,
            });
        }

        Ok(items)
    }

    /// `<source>` text of every RSS `<item>`, keyed by the item's `<link>`.
    pub fn extract_sources_from_xml(xml_bytes: &[u8]) -> HashMap<String, String> {
        let mut sources = HashMap::new();
        let xml_str = match std::str::from_utf8(xml_bytes) {
            Ok(s) => s,
            Err(_) => return sources,
        };

        let mut reader = Reader::from_str(xml_str);
        let mut in_item = false;
        let mut field: Option<ItemField> = None;
        let mut link = String::new();
        let mut source = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"item" => {
                        in_item = true;
                        link.clear();
                        source.clear();
                    }
                    b"link" if in_item => field = Some(ItemField::Link),
                    b"source" if in_item => field = Some(ItemField::Source),
                    _ => field = None,
                },
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"item" => {
                        in_item = false;
                        let name = decode_html_entities(source.trim()).to_string();
                        let key = decode_html_entities(link.trim()).to_string();
                        if !key.is_empty() && !name.is_empty() {
                            sources.entry(key).or_insert(name);
                        }
                    }
                    _ => field = None,
                },
                Ok(Event::Text(e)) => {
                    if let (Some(target), Ok(text)) = (field, e.decode()) {
                        target.buffer(&mut link, &mut source).push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let (Some(target), Ok(text)) = (field, e.decode()) {
                        target.buffer(&mut link, &mut source).push_str(&text);
                    }
                }
                // Entity references arrive on their own; keep them escaped
                // until the element is complete.
                Ok(Event::GeneralRef(e)) => {
                    if let (Some(target), Ok(name)) = (field, e.decode()) {
                        let buffer = target.buffer(&mut link, &mut source);
                        buffer.push('&');
                        buffer.push_str(&name);
                        buffer.push(';');
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => {
                    warn!(error = %err, "Stopped reading <source> elements early");
                    break;
                }
                _ => {}
            }
        }

        sources
    }

    fn host_name(link: &str) -> Option<String> {
        let url = url::Url::parse(link).ok()?;
        let host = url.host_str()?;
        Some(host.trim_start_matches("www.").to_string())
    }
}
