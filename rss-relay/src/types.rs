use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
// Shared value types live in the interfaces crate
pub use interfaces::defs::{CategorySpec, DeliveryMode, InputItem, SkipReason, SummaryOutcome};

/// Settings for fetching article pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_redirects: usize,
    pub min_host_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0".to_string(),
            timeout_seconds: 12,
            max_redirects: 5,
            min_host_interval_ms: 250,
        }
    }
}

/// Settings shared by the reader API clients.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub base_url: String,
    pub user: String,
    pub password: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl ReaderConfig {
    pub fn new(base_url: &str, user: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

// Google Reader stream/contents payload

#[derive(Debug, Clone, Deserialize)]
pub struct StreamContents {
    #[serde(default)]
    pub items: Vec<StreamItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamItem {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub alternate: Vec<Link>,
    #[serde(default)]
    pub origin: Option<Origin>,
    #[serde(default)]
    pub summary: Option<HtmlBlock>,
    #[serde(default)]
    pub content: Option<HtmlBlock>,
    #[serde(default)]
    pub enclosure: Vec<Enclosure>,
    #[serde(default)]
    pub published: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Origin {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HtmlBlock {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Enclosure {
    #[serde(default, rename = "type")]
    pub mime_type: String,
}

impl StreamItem {
    /// Items without an alternate link cannot be posted and are dropped.
    pub fn into_input_item(self) -> Option<InputItem> {
        let link = self
            .alternate
            .into_iter()
            .next()
            .map(|l| l.href)
            .filter(|href| !href.is_empty())?;

        let html = self
            .summary
            .map(|s| s.content)
            .filter(|c| !c.is_empty())
            .or_else(|| self.content.map(|c| c.content))
            .unwrap_or_default();

        Some(InputItem {
            id: self.id,
            link,
            title: self.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| "News".to_string()),
            source_title: self.origin.map(|o| o.title).unwrap_or_default(),
            html,
            enclosure_types: self.enclosure.into_iter().map(|e| e.mime_type).collect(),
            published: self.published.and_then(unix_time),
        })
    }
}

// Fever API payloads

#[derive(Debug, Clone, Deserialize)]
pub struct FeverAuth {
    #[serde(default)]
    pub auth: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeverGroups {
    #[serde(default)]
    pub groups: Vec<FeverGroup>,
    #[serde(default)]
    pub feeds_groups: Vec<FeverFeedsGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeverGroup {
    #[serde(deserialize_with = "fever_id")]
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeverFeedsGroup {
    #[serde(deserialize_with = "fever_id")]
    pub group_id: i64,
    #[serde(default)]
    pub feed_ids: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeverFeeds {
    #[serde(default)]
    pub feeds: Vec<FeverFeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeverFeed {
    #[serde(deserialize_with = "fever_id")]
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeverUnread {
    #[serde(default)]
    pub unread_item_ids: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeverItems {
    #[serde(default)]
    pub items: Vec<FeverItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeverItem {
    #[serde(deserialize_with = "fever_id")]
    pub id: i64,
    #[serde(deserialize_with = "fever_id")]
    pub feed_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_on_time: Option<i64>,
}

impl FeverItem {
    pub fn into_input_item(self, source_title: &str) -> Option<InputItem> {
        if self.url.is_empty() {
            return None;
        }
        Some(InputItem {
            id: self.id.to_string(),
            link: self.url,
            title: if self.title.trim().is_empty() { "News".to_string() } else { self.title },
            source_title: source_title.to_string(),
            html: self.html,
            enclosure_types: Vec::new(),
            published: self.created_on_time.and_then(unix_time),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

/// FreshRSS sends 64-bit item ids as JSON strings; other servers use numbers.
fn fever_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Parse a Fever comma list ("1,2,3") into ids, ignoring junk.
pub fn parse_id_list(list: &str) -> Vec<i64> {
    list.split(',').filter_map(|id| id.trim().parse().ok()).collect()
}

fn unix_time(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Per-category counters produced by one pass.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: String,
    pub mode: DeliveryMode,
    pub fetched: usize,
    pub already_seen: usize,
    pub summarized: usize,
    pub skipped: usize,
    pub unavailable: usize,
    pub posted: usize,
    pub marked_read: usize,
}

impl CategoryReport {
    pub fn new(category: &CategorySpec) -> Self {
        Self {
            category: category.name.clone(),
            mode: category.mode,
            fetched: 0,
            already_seen: 0,
            summarized: 0,
            skipped: 0,
            unavailable: 0,
            posted: 0,
            marked_read: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub categories: Vec<CategoryReport>,
}

impl RunReport {
    pub fn posted(&self) -> usize {
        self.categories.iter().map(|c| c.posted).sum()
    }

    pub fn marked_read(&self) -> usize {
        self.categories.iter().map(|c| c.marked_read).sum()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Reader authentication failed: {0}")]
    Auth(String),

    #[error("Reader API error: {0}")]
    Reader(String),

    #[error("Provider {provider} failed ({status}): {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Telegram rejected the message ({status}): {description}")]
    Telegram { status: u16, description: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
