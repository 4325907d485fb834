use crate::fetcher::Fetcher;
use crate::rss_utils::link::is_video_link;
use crate::types::InputItem;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

static MAIN_TEXT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["div.tgme_widget_message_text", "article"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

static VIDEO_MARKUP: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["video", "div.tgme_widget_message_video_player"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

/// What a fetched page yielded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtract {
    pub main_text: Option<String>,
    pub has_video_markup: bool,
}

/// Text prepared for summarization plus the video flag used when formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub text: String,
    pub is_video: bool,
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pull the main text block and video markers out of an article page.
pub fn extract_page(html: &str) -> PageExtract {
    let document = Html::parse_document(html);

    let main_text = MAIN_TEXT
        .iter()
        .find_map(|selector| document.select(selector).next())
        .map(element_text);

    let has_video_markup = VIDEO_MARKUP
        .iter()
        .any(|selector| document.select(selector).next().is_some());

    PageExtract {
        main_text,
        has_video_markup,
    }
}

/// Visible text of an HTML fragment with whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    element_text(fragment.root_element())
}

/// Cut `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Best-effort article text: the page's main block when it can be fetched and
/// found, otherwise the HTML the reader shipped with the item.
pub struct ArticleExtractor {
    fetcher: Arc<Fetcher>,
    max_chars: usize,
}

impl ArticleExtractor {
    pub fn new(fetcher: Arc<Fetcher>, max_chars: usize) -> Self {
        Self { fetcher, max_chars }
    }

    pub async fn extract(&self, item: &InputItem) -> Article {
        let page = match self.fetcher.fetch_page(&item.link).await {
            Ok(html) => extract_page(&html),
            Err(e) => {
                warn!("Could not fetch {}: {}", item.link, e);
                PageExtract::default()
            }
        };

        let text = match page.main_text.filter(|t| !t.is_empty()) {
            Some(text) => text,
            None => {
                debug!("No main text block on {}, using reader content", item.link);
                html_to_text(&item.html)
            }
        };

        let is_video = is_video_link(&item.link) || item.has_video_enclosure() || page.has_video_markup;

        Article {
            text: truncate_chars(&text, self.max_chars).to_string(),
            is_video,
        }
    }
}
