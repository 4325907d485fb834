/// Link and hashtag helpers for posted items

/// Link classification
pub mod link {
    use url::Url;

    const YOUTUBE_HOSTS: [&str; 2] = ["youtube.com", "youtu.be"];
    const VIDEO_HOSTS: [&str; 3] = ["youtube.com", "youtu.be", "vimeo.com"];

    /// Extract domain from URL
    pub fn extract_domain(url_str: &str) -> Option<String> {
        Url::parse(url_str)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.to_lowercase()))
    }

    pub fn is_youtube(link: &str) -> bool {
        let link = link.to_lowercase();
        YOUTUBE_HOSTS.iter().any(|host| link.contains(host))
    }

    /// Links to video hosting sites
    pub fn is_video_link(link: &str) -> bool {
        let link = link.to_lowercase();
        VIDEO_HOSTS.iter().any(|host| link.contains(host))
    }
}

/// Hashtags appended to posted items
pub mod tag {
    use super::link::extract_domain;
    use regex::Regex;
    use std::sync::LazyLock;

    static TELEGRAM_CHANNEL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\s*-*\s*telegram\s*channel\s*").expect("static regex")
    });

    fn is_tag_char(c: char) -> bool {
        c.is_ascii_alphanumeric()
            || ('а'..='я').contains(&c)
            || ('А'..='Я').contains(&c)
            || c == 'ё'
            || c == 'Ё'
    }

    /// `#` followed by the Latin, Cyrillic and digit characters of `text`;
    /// empty when nothing survives.
    pub fn make_hashtag(text: &str) -> String {
        let clean: String = text.chars().filter(|c| is_tag_char(*c)).collect();
        if clean.is_empty() {
            String::new()
        } else {
            format!("#{}", clean)
        }
    }

    /// Tag for an item: the channel name for Telegram channel feeds, otherwise
    /// the first label of the link's domain.
    pub fn smart_tag(source_title: &str, link: &str) -> String {
        if source_title.to_lowercase().contains("telegram channel") {
            let name = TELEGRAM_CHANNEL.replace_all(source_title, "");
            return make_hashtag(name.trim());
        }

        let label = extract_domain(link)
            .map(|host| host.replace("www.", ""))
            .and_then(|host| host.split('.').next().map(|l| l.replace('-', "")))
            .filter(|label| !label.is_empty());

        match label {
            Some(label) => format!("#{}", capitalize(&label)),
            None => "#News".to_string(),
        }
    }

    fn capitalize(word: &str) -> String {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::link::*;
    use super::tag::*;

    #[test]
    fn hashtag_keeps_latin_cyrillic_and_digits() {
        assert_eq!(make_hashtag("Tech News 24"), "#TechNews24");
        assert_eq!(make_hashtag("Новости ёлки!"), "#Новостиёлки");
        assert_eq!(make_hashtag("Ёж-2"), "#Ёж2");
        assert_eq!(make_hashtag("  ---  "), "");
    }

    #[test]
    fn telegram_channel_source_becomes_channel_tag() {
        assert_eq!(smart_tag("Meduza - Telegram Channel", "https://t.me/meduzalive/1"), "#Meduza");
        assert_eq!(smart_tag("Рыбарь telegram channel", "https://t.me/rybar/5"), "#Рыбарь");
    }

    #[test]
    fn domain_label_is_used_otherwise() {
        assert_eq!(smart_tag("", "https://www.the-verge.com/2024/1/1/story"), "#Theverge");
        assert_eq!(smart_tag("Habr", "https://habr.com/ru/articles/1/"), "#Habr");
        assert_eq!(smart_tag("Anything", "not a url"), "#News");
    }

    #[test]
    fn video_links() {
        assert!(is_youtube("https://www.YouTube.com/watch?v=x"));
        assert!(is_youtube("https://youtu.be/x"));
        assert!(!is_youtube("https://vimeo.com/1"));
        assert!(is_video_link("https://vimeo.com/1"));
        assert_eq!(extract_domain("https://Example.COM/path").as_deref(), Some("example.com"));
    }
}
