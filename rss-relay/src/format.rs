use crate::parser::truncate_chars;
use crate::rss_utils::tag::make_hashtag;
use html_escape::{encode_single_quoted_attribute, encode_text};

/// Telegram rejects messages longer than this many characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Room left in a message next to the category header.
const MAX_ENTRY_CHARS: usize = TELEGRAM_MESSAGE_LIMIT - 256;

/// Escaped `text` of at most `budget` characters. Cuts happen on the raw text
/// so no entity is split; a cut text ends with an ellipsis.
fn fit_escaped(text: &str, budget: usize) -> String {
    let escaped = encode_text(text);
    if escaped.chars().count() <= budget {
        return escaped.into_owned();
    }

    let budget = budget.saturating_sub(1);
    let mut raw = text;
    loop {
        let escaped = encode_text(raw);
        let excess = escaped.chars().count().saturating_sub(budget);
        if excess == 0 {
            return format!("{}…", escaped.trim_end());
        }
        raw = truncate_chars(raw, raw.chars().count().saturating_sub(excess));
    }
}

/// One line pair of a digest message. Long summaries are cut so the entry
/// always fits a single message.
pub fn digest_entry(link: &str, summary: &str, tag: &str) -> String {
    let href = encode_single_quoted_attribute(link);
    let frame = format!("📌 <a href='{}'>→</a> <i></i>\n🏷️ {}", href, tag);
    let summary = fit_escaped(summary, MAX_ENTRY_CHARS.saturating_sub(frame.chars().count()));
    format!("📌 <a href='{}'>→</a> <i>{}</i>\n🏷️ {}", href, summary, tag)
}

/// Digest messages for a category. Entries are packed into as few messages as
/// fit the Telegram limit; every message starts with the category hashtag.
pub fn digest_messages(category: &str, entries: &[String]) -> Vec<String> {
    if entries.is_empty() {
        return Vec::new();
    }

    let header = make_hashtag(category);
    let mut messages = Vec::new();
    let mut current = String::new();

    for entry in entries {
        let candidate = if current.is_empty() {
            format!("{}\n\n{}", header, entry)
        } else {
            format!("{}\n\n{}", current, entry)
        };

        if candidate.chars().count() > TELEGRAM_MESSAGE_LIMIT && !current.is_empty() {
            messages.push(std::mem::take(&mut current));
            current = format!("{}\n\n{}", header, entry);
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

/// Title shown for a directly posted item.
pub fn direct_title(title: &str, is_video: bool, is_youtube: bool) -> String {
    if is_video && !is_youtube {
        format!("{} 🎬", title)
    } else {
        title.to_string()
    }
}

pub fn direct_post(link: &str, title: &str, tag: &str) -> String {
    format!(
        "📍 <b><a href='{}'>{}</a></b>\n🏷️ {}",
        encode_single_quoted_attribute(link),
        encode_text(title),
        tag
    )
}
