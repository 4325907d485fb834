use crate::digest::Summarizer;
use crate::format::direct_title;
use crate::parser::ArticleExtractor;
use crate::rss_utils::{link::is_youtube, tag::smart_tag};
use crate::types::{DeliveryMode, InputItem, SummaryOutcome};
use tracing::debug;

/// An item ready to be formatted, with the id needed to mark it read.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedItem {
    Digest {
        id: String,
        link: String,
        tag: String,
        outcome: SummaryOutcome,
    },
    Direct {
        id: String,
        link: String,
        tag: String,
        title: String,
        is_youtube: bool,
    },
}

impl ProcessedItem {
    pub fn id(&self) -> &str {
        match self {
            ProcessedItem::Digest { id, .. } | ProcessedItem::Direct { id, .. } => id,
        }
    }
}

/// Turns one unread item into a `ProcessedItem`: extraction, tagging and,
/// for digest categories, summarization.
pub struct ItemProcessor {
    extractor: ArticleExtractor,
    summarizer: Summarizer,
}

impl ItemProcessor {
    pub fn new(extractor: ArticleExtractor, summarizer: Summarizer) -> Self {
        Self { extractor, summarizer }
    }

    /// `None` means the item could not be handled this round and stays unread.
    pub async fn process(&self, item: &InputItem, mode: DeliveryMode) -> Option<ProcessedItem> {
        let article = self.extractor.extract(item).await;
        let tag = smart_tag(&item.source_title, &item.link);

        match mode {
            DeliveryMode::Digest => {
                let outcome = self.summarizer.summarize(&article.text, article.is_video).await;
                if outcome == SummaryOutcome::Unavailable {
                    debug!("No summary for {}", item.link);
                    return None;
                }
                Some(ProcessedItem::Digest {
                    id: item.id.clone(),
                    link: item.link.clone(),
                    tag,
                    outcome,
                })
            }
            DeliveryMode::Direct => {
                let youtube = is_youtube(&item.link);
                Some(ProcessedItem::Direct {
                    id: item.id.clone(),
                    link: item.link.clone(),
                    tag,
                    title: direct_title(&item.title, article.is_video, youtube),
                    is_youtube: youtube,
                })
            }
        }
    }
}
