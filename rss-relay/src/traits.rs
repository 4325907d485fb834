use crate::types::{InputItem, Result};
use async_trait::async_trait;

/// A reader backend that holds unread items grouped by category.
#[async_trait]
pub trait FeedReader: Send + Sync {
    /// Human-readable name of the backend, for logs.
    fn backend_name(&self) -> &'static str;

    /// Authenticate against the backend. Must succeed before anything else.
    async fn login(&self) -> Result<()>;

    /// Unread items of a category, newest first, at most `limit`.
    async fn unread_items(&self, category: &str, limit: usize) -> Result<Vec<InputItem>>;

    /// Mark items read by their reader-side ids.
    async fn mark_read(&self, ids: &[String]) -> Result<()>;
}

/// Somewhere formatted messages are delivered to.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Send an HTML message. With `preview_link` the link preview is shown
    /// above the text; without it previews are disabled.
    async fn send(&self, text: &str, preview_link: Option<&str>) -> Result<()>;
}
