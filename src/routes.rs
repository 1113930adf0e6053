use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::article::Enricher;
use crate::cards::{build_cards, Card};
use crate::config::{Config, DisplayConfig};
use crate::fetcher::{build_client, Fetcher, NewsMode, Topic};
use crate::images::{DisplayImage, Normalizer};

/// Slider bounds for the trending and topic pages.
const FEED_COUNT_RANGE: (u32, u32) = (5, 25);
/// Search results are capped lower.
const SEARCH_COUNT_RANGE: (u32, u32) = (5, 15);

pub struct AppState {
    pub fetcher: Fetcher,
    pub enricher: Enricher,
    pub normalizer: Normalizer,
    pub display: DisplayConfig,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = build_client(&config.http)?;

        Ok(Self {
            fetcher: Fetcher::new(client.clone(), config.feeds.clone()),
            enricher: Enricher::new(client.clone(), config.display.summary_sentences),
            normalizer: Normalizer::new(client, config.display.placeholder_image.clone())
                .with_max_bytes(config.http.image_max_bytes),
            display: config.display.clone(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(trending))
        .route("/topics", get(topics))
        .route("/search", get(search))
        .route("/banner", get(banner_image))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "news.html")]
pub struct NewsTemplate {
    pub nav: Vec<NavLink>,
    pub form_action: &'static str,
    pub topics: Vec<TopicOption>,
    /// Present on the search page, holding the current query text
    pub search: Option<String>,
    pub slider: Slider,
    pub submit_label: &'static str,
    pub heading: Option<String>,
    pub notice: Option<Notice>,
    pub cards: Vec<Card>,
}

pub struct NavLink {
    pub label: &'static str,
    pub href: &'static str,
    pub active: bool,
}

pub struct TopicOption {
    pub name: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slider {
    pub min: u32,
    pub max: u32,
    pub value: u32,
}

impl Slider {
    /// Missing counts start at the minimum; out-of-range counts are clamped.
    pub fn new((min, max): (u32, u32), requested: Option<u32>) -> Self {
        Self {
            min,
            max,
            value: requested.unwrap_or(min).clamp(min, max),
        }
    }
}

pub struct Notice {
    pub kind: &'static str,
    pub text: String,
}

impl Notice {
    fn error(text: String) -> Self {
        Self { kind: "error", text }
    }

    fn warning(text: String) -> Self {
        Self {
            kind: "warning",
            text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Trending,
    Topics,
    Search,
}

fn nav(active: Page) -> Vec<NavLink> {
    vec![
        NavLink {
            label: "Trending🔥 News",
            href: "/",
            active: active == Page::Trending,
        },
        NavLink {
            label: "Favourite💙 Topics",
            href: "/topics",
            active: active == Page::Topics,
        },
        NavLink {
            label: "Search🔍 Topic",
            href: "/search",
            active: active == Page::Search,
        },
    ]
}

// Wrapper for HTML responses
pub struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

/// Fetch the feed for `mode` and build up to `quantity` cards.
/// An unreachable or empty feed yields no cards and a "no results" notice.
async fn load_cards(
    state: &AppState,
    mode: &NewsMode,
    quantity: u32,
    not_found: String,
) -> (Vec<Card>, Option<Notice>) {
    match state.fetcher.fetch(mode).await {
        Ok(items) if !items.is_empty() => {
            let cards = build_cards(
                &items,
                quantity as usize,
                &state.enricher,
                &state.normalizer,
                state.display.image_max_width,
            )
            .await;
            (cards, None)
        }
        Ok(_) => {
            info!(?mode, "Feed returned no items");
            (Vec::new(), Some(Notice::error(not_found)))
        }
        Err(err) => {
            warn!(?mode, error = %err, "Feed retrieval failed");
            (Vec::new(), Some(Notice::error(not_found)))
        }
    }
}

/// Uppercase the first character and lowercase the rest.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

// Route handlers
#[derive(Deserialize)]
pub struct CountQuery {
    pub count: Option<u32>,
}

pub async fn trending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CountQuery>,
) -> HtmlTemplate<NewsTemplate> {
    let slider = Slider::new(FEED_COUNT_RANGE, query.count);
    let (cards, notice) = load_cards(
        &state,
        &NewsMode::Top,
        slider.value,
        "No News Found.".to_string(),
    )
    .await;

    HtmlTemplate(NewsTemplate {
        nav: nav(Page::Trending),
        form_action: "/",
        topics: Vec::new(),
        search: None,
        slider,
        submit_label: "Show",
        heading: Some("Trending🔥 News for You".to_string()),
        notice,
        cards,
    })
}

#[derive(Deserialize)]
pub struct TopicQuery {
    #[serde(default)]
    pub topic: Topic,
    pub count: Option<u32>,
}

pub async fn topics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopicQuery>,
) -> HtmlTemplate<NewsTemplate> {
    let slider = Slider::new(FEED_COUNT_RANGE, query.count);
    let topic = query.topic;
    let (cards, notice) = load_cards(
        &state,
        &NewsMode::Topic(topic),
        slider.value,
        format!("No News Found for {}.", topic),
    )
    .await;

    HtmlTemplate(NewsTemplate {
        nav: nav(Page::Topics),
        form_action: "/topics",
        topics: Topic::ALL
            .iter()
            .map(|t| TopicOption {
                name: t.as_str(),
                selected: *t == topic,
            })
            .collect(),
        search: None,
        slider,
        submit_label: "Show",
        heading: Some(format!("News on {}", topic)),
        notice,
        cards,
    })
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub count: Option<u32>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> HtmlTemplate<NewsTemplate> {
    let slider = Slider::new(SEARCH_COUNT_RANGE, query.count);
    let text = query.q.as_deref().map(str::trim).unwrap_or_default().to_string();

    let (heading, cards, notice) = if text.is_empty() {
        (
            None,
            Vec::new(),
            Some(Notice::warning("Please Enter a Topic to Search.".to_string())),
        )
    } else {
        let (cards, notice) = load_cards(
            &state,
            &NewsMode::Search(text.clone()),
            slider.value,
            format!("No News Found for {}.", text),
        )
        .await;
        let heading = (!cards.is_empty()).then(|| format!("News on {}", capitalize(&text)));
        (heading, cards, notice)
    };

    HtmlTemplate(NewsTemplate {
        nav: nav(Page::Search),
        form_action: "/search",
        topics: Vec::new(),
        search: Some(text),
        slider,
        submit_label: "Search",
        heading,
        notice,
        cards,
    })
}

pub async fn banner_image(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let image = state
        .normalizer
        .local(&state.display.banner_image, state.display.banner_max_width);
    png_response(&image)
}

fn png_response(image: &DisplayImage) -> Result<Response, AppError> {
    let png = image.to_png()?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
