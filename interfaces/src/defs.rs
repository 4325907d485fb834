use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the items of a category reach the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Every item is summarized and the category goes out as one digest message.
    Digest,
    /// Every item is posted on its own with a link preview.
    Direct,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Digest => write!(f, "digest"),
            DeliveryMode::Direct => write!(f, "direct"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub mode: DeliveryMode,
}

impl CategorySpec {
    pub fn digest(name: impl Into<String>) -> Self {
        Self { name: name.into(), mode: DeliveryMode::Digest }
    }

    pub fn direct(name: impl Into<String>) -> Self {
        Self { name: name.into(), mode: DeliveryMode::Direct }
    }
}

/// An unread item as handed over by a reader backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputItem {
    /// Reader-side id, the handle used to mark the item read.
    pub id: String,
    pub link: String,
    pub title: String,
    pub source_title: String,
    /// Summary or content HTML shipped by the reader. May be empty.
    pub html: String,
    pub enclosure_types: Vec<String>,
    pub published: Option<DateTime<Utc>>,
}

impl InputItem {
    pub fn has_video_enclosure(&self) -> bool {
        self.enclosure_types.iter().any(|t| t.contains("video"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The model answered with the SKIP sentinel.
    ModelSaidSkip,
    /// The summary is near-identical to a recent one.
    NearDuplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ModelSaidSkip => write!(f, "model said skip"),
            SkipReason::NearDuplicate => write!(f, "near duplicate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryOutcome {
    Summary(String),
    Skip(SkipReason),
    /// Not enough text, or no provider produced an answer.
    Unavailable,
}

impl SummaryOutcome {
    pub fn is_skip(&self) -> bool {
        matches!(self, SummaryOutcome::Skip(_))
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            SummaryOutcome::Summary(text) => Some(text),
            _ => None,
        }
    }
}
