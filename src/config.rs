use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feeds: FeedEndpoints,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8501".to_string()
}

/// Aggregator URL shapes. `{topic}` and `{query}` are substituted per request.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedEndpoints {
    #[serde(default = "default_top_url")]
    pub top_url: String,
    #[serde(default = "default_topic_url")]
    pub topic_url: String,
    #[serde(default = "default_search_url")]
    pub search_url: String,
}

impl Default for FeedEndpoints {
    fn default() -> Self {
        Self {
            top_url: default_top_url(),
            topic_url: default_topic_url(),
            search_url: default_search_url(),
        }
    }
}

fn default_top_url() -> String {
    "https://news.google.com/news/rss".to_string()
}

fn default_topic_url() -> String {
    "https://news.google.com/news/rss/headlines/section/topic/{topic}".to_string()
}

fn default_search_url() -> String {
    "https://news.google.com/rss/search?q={query}".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Article images larger than this are not downloaded
    #[serde(default = "default_image_max_bytes")]
    pub image_max_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            image_max_bytes: default_image_max_bytes(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; ShortNews/1.0)".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_image_max_bytes() -> usize {
    5 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_image_max_width")]
    pub image_max_width: u32,
    #[serde(default = "default_banner_max_width")]
    pub banner_max_width: u32,
    /// Sentences kept in each article summary
    #[serde(default = "default_summary_sentences")]
    pub summary_sentences: usize,
    #[serde(default = "default_banner_image")]
    pub banner_image: PathBuf,
    #[serde(default = "default_placeholder_image")]
    pub placeholder_image: PathBuf,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            image_max_width: default_image_max_width(),
            banner_max_width: default_banner_max_width(),
            summary_sentences: default_summary_sentences(),
            banner_image: default_banner_image(),
            placeholder_image: default_placeholder_image(),
        }
    }
}

fn default_image_max_width() -> u32 {
    700
}

fn default_banner_max_width() -> u32 {
    1000
}

fn default_summary_sentences() -> usize {
    5
}

fn default_banner_image() -> PathBuf {
    PathBuf::from("assets/newspaper.png")
}

fn default_placeholder_image() -> PathBuf {
    PathBuf::from("assets/no_image.png")
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to the built-in defaults.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
