use dom_smoothie::Readability;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::fetcher::FeedItem;
use crate::summarizer;

static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| parse_selector("p"));

// Candidate image locations, most specific first, with the attribute holding the URL.
static IMAGE_CANDIDATES: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    vec![
        (parse_selector(r#"meta[property="og:image"]"#), "content"),
        (parse_selector(r#"meta[name="og:image"]"#), "content"),
        (parse_selector(r#"meta[name="twitter:image"]"#), "content"),
        (parse_selector(r#"meta[property="twitter:image"]"#), "content"),
        (parse_selector(r#"link[rel="image_src"]"#), "href"),
        (parse_selector("article img[src]"), "src"),
        (parse_selector("img[src]"), "src"),
    ]
});

fn parse_selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("article download failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("article host returned status {0}")]
    Status(StatusCode),
}

/// What extraction pulls out of one article page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleContent {
    pub text: String,
    pub summary: String,
    pub top_image: Option<String>,
}

/// A feed item together with whatever could be extracted from its page.
#[derive(Debug, Clone)]
pub struct EnrichedArticle {
    pub item: FeedItem,
    pub text: String,
    pub summary: String,
    pub top_image: Option<String>,
    /// Set when the page could not be enriched; shown inline on the card.
    pub warning: Option<String>,
}

impl EnrichedArticle {
    pub fn from_result(item: FeedItem, result: Result<ArticleContent, EnrichError>) -> Self {
        match result {
            Ok(content) => Self {
                item,
                text: content.text,
                summary: content.summary,
                top_image: content.top_image,
                warning: None,
            },
            Err(err) => Self {
                item,
                text: String::new(),
                summary: String::new(),
                top_image: None,
                warning: Some(err.to_string()),
            },
        }
    }
}

#[derive(Clone)]
pub struct Enricher {
    client: Client,
    summary_sentences: usize,
}

impl Enricher {
    pub fn new(client: Client, summary_sentences: usize) -> Self {
        Self {
            client,
            summary_sentences,
        }
    }

    /// Download `link` and extract its text, lead image and summary.
    /// Nothing is cached; every call downloads the page again.
    pub async fn enrich(&self, link: &str) -> Result<ArticleContent, EnrichError> {
        debug!(%link, "Downloading article");

        let response = self.client.get(link).send().await?;
        if !response.status().is_success() {
            return Err(EnrichError::Status(response.status()));
        }
        let page_url = response.url().clone();
        let html = response.text().await?;

        let content = extract(&html, &page_url, self.summary_sentences);
        info!(
            %page_url,
            chars = content.text.len(),
            has_image = content.top_image.is_some(),
            "Enriched article"
        );
        Ok(content)
    }
}

/// Pull body text, lead image and summary out of an HTML page.
pub fn extract(html: &str, page_url: &Url, summary_sentences: usize) -> ArticleContent {
    let (title, text) = readable_text(html, page_url);
    let summary = summarizer::summarize(&title, &text, summary_sentences);
    let top_image = top_image(&Html::parse_document(html), page_url);

    ArticleContent {
        text,
        summary,
        top_image,
    }
}

/// Title and main text as found by Readability. Pages it cannot make sense
/// of yield no text.
fn readable_text(html: &str, page_url: &Url) -> (String, String) {
    let parsed = Readability::new(html, Some(page_url.as_str()), None)
        .and_then(|mut readability| readability.parse());
    match parsed {
        Ok(article) => {
            let text = paragraph_text(&article.content)
                .unwrap_or_else(|| collapse_whitespace(&article.text_content));
            (collapse_whitespace(&article.title), text)
        }
        Err(err) => {
            debug!(%page_url, error = %err, "No readable content");
            (String::new(), String::new())
        }
    }
}

/// The cleaned content's paragraphs separated by blank lines.
fn paragraph_text(content: &str) -> Option<String> {
    let fragment = Html::parse_fragment(content);
    let paragraphs: Vec<String> = fragment
        .select(&PARAGRAPHS)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect();

    if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs.join("\n\n"))
    }
}

fn top_image(document: &Html, page_url: &Url) -> Option<String> {
    IMAGE_CANDIDATES.iter().find_map(|(selector, attr)| {
        document
            .select(selector)
            .filter_map(|element| element.value().attr(attr))
            .map(str::trim)
            .filter(|value| !value.is_empty() && !value.starts_with("data:"))
            .find_map(|value| page_url.join(value).ok())
            .map(|resolved| resolved.to_string())
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<!doctype html>
        <html>
        <head>
            <title>Harbour bridge reopens</title>
            <meta property="og:image" content="/media/bridge.jpg">
        </head>
        <body>
            <article>
                <h1>Harbour bridge reopens</h1>
                <p>The harbour bridge reopened to traffic on Monday after two years of repairs, with the first cars crossing shortly after dawn.</p>
                <p>Engineers replaced the <b>main cables</b> and resurfaced the entire deck, according to the city transport office, which oversaw the work.</p>
                <p>Commuters said the bridge would cut their journeys by twenty minutes, and local shops expect more trade from the returning traffic.</p>
                <p>The city council plans a small ceremony next week to thank the crews, who worked through two winters to finish the job on schedule.</p>
            </article>
        </body>
        </html>"#;

    fn page_url() -> Url {
        Url::parse("https://news.example.com/world/bridge").unwrap()
    }

    fn item(link: &str) -> FeedItem {
        FeedItem {
            title: "Harbour bridge reopens".to_string(),
            link: link.to_string(),
            source: "Example Times".to_string(),
            published: None,
        }
    }

    mod extract_tests {
        use super::*;

        #[test]
        fn test_text_comes_from_readable_paragraphs() {
            let content = extract(PAGE, &page_url(), 5);

            assert!(content.text.contains("reopened to traffic"));
            assert!(content.text.contains("Engineers replaced the main cables and resurfaced"));
            assert!(content.text.contains("thank the crews"));
            assert!(!content.text.contains("<b>"));
        }

        #[test]
        fn test_paragraphs_separated_by_blank_lines() {
            let text = paragraph_text("<div><p>First  one.</p><p>Second\n one.</p><p> </p></div>");
            assert_eq!(text.as_deref(), Some("First one.\n\nSecond one."));
        }

        #[test]
        fn test_content_without_paragraphs() {
            assert_eq!(paragraph_text("<div>Just a block of text</div>"), None);
        }

        #[test]
        fn test_og_image_resolved_against_page() {
            let content = extract(PAGE, &page_url(), 5);
            assert_eq!(
                content.top_image.as_deref(),
                Some("https://news.example.com/media/bridge.jpg")
            );
        }

        #[test]
        fn test_image_falls_back_to_img_tag() {
            let html = r#"<html><body>
                <img src="data:image/gif;base64,R0lGOD">
                <img src="https://cdn.example.com/photo.png">
            </body></html>"#;
            let content = extract(html, &page_url(), 5);
            assert_eq!(
                content.top_image.as_deref(),
                Some("https://cdn.example.com/photo.png")
            );
        }

        #[test]
        fn test_no_image() {
            let html = PAGE.replace(r#"<meta property="og:image" content="/media/bridge.jpg">"#, "");
            let content = extract(&html, &page_url(), 5);
            assert_eq!(content.top_image, None);
            assert!(!content.summary.is_empty());
        }

        #[test]
        fn test_empty_page_has_no_text() {
            let content = extract("<html><body></body></html>", &page_url(), 5);
            assert_eq!(content.text, "");
            assert_eq!(content.summary, "");
            assert_eq!(content.top_image, None);
        }

        #[test]
        fn test_summary_is_capped() {
            let content = extract(PAGE, &page_url(), 2);
            assert_eq!(summarizer::split_sentences(&content.summary).len(), 2);
        }

        #[test]
        fn test_tolerates_malformed_html() {
            let html = "<html><body><article><p>Unclosed paragraph that keeps going<div></article>";
            let content = extract(html, &page_url(), 5);
            assert!(content.top_image.is_none());
        }
    }

    mod enriched_article_tests {
        use super::*;

        #[test]
        fn test_from_success() {
            let content = ArticleContent {
                text: "body".to_string(),
                summary: "sum".to_string(),
                top_image: Some("https://img".to_string()),
            };
            let article = EnrichedArticle::from_result(item("https://a"), Ok(content));
            assert_eq!(article.summary, "sum");
            assert_eq!(article.top_image.as_deref(), Some("https://img"));
            assert!(article.warning.is_none());
        }

        #[test]
        fn test_from_failure_keeps_item_and_warns() {
            let err = EnrichError::Status(StatusCode::FORBIDDEN);
            let article = EnrichedArticle::from_result(item("https://a"), Err(err));
            assert_eq!(article.item.title, "Harbour bridge reopens");
            assert!(article.summary.is_empty());
            assert!(article.text.is_empty());
            assert!(article.top_image.is_none());
            assert_eq!(
                article.warning.as_deref(),
                Some("article host returned status 403 Forbidden")
            );
        }
    }

    mod enrich_tests {
        use super::*;

        #[tokio::test]
        async fn test_enrich_downloads_and_extracts() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/story"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "text/html")
                        .set_body_string(PAGE),
                )
                .expect(2)
                .mount(&server)
                .await;

            let enricher = Enricher::new(Client::new(), 5);
            let link = format!("{}/story", server.uri());

            let first = enricher.enrich(&link).await.unwrap();
            // No caching: the second call hits the server again
            let second = enricher.enrich(&link).await.unwrap();

            assert_eq!(first, second);
            assert_eq!(
                first.top_image,
                Some(format!("{}/media/bridge.jpg", server.uri()))
            );
        }

        #[tokio::test]
        async fn test_enrich_error_status() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let enricher = Enricher::new(Client::new(), 5);
            let result = enricher.enrich(&format!("{}/gone", server.uri())).await;
            assert!(matches!(result, Err(EnrichError::Status(StatusCode::NOT_FOUND))));
        }

        #[tokio::test]
        async fn test_enrich_invalid_link() {
            let enricher = Enricher::new(Client::new(), 5);
            let result = enricher.enrich("not a url").await;
            assert!(matches!(result, Err(EnrichError::Request(_))));
        }
    }
}
