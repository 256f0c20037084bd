//! Message texts sent alongside an item.

use crate::config::duration::format_clock;
use crate::domain::FeedItem;

/// HTML caption of the permanent cover message.
pub fn cover_caption(title: &str) -> String {
    format!("<u><b>{}</b></u>", html_escape::encode_text(title))
}

/// Plain caption of the permanent audio message.
pub fn audio_caption(title: &str, performer: &str, item: &FeedItem, duration_secs: u64) -> String {
    let link = format!("{} {}", item.short_link(), format_clock(duration_secs));
    [title, performer, link.as_str()]
        .iter()
        .filter(|line| !line.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Posted in place of an item that can never be fetched.
pub fn unavailable_notice(title: &str, item: &FeedItem, reason: &str) -> String {
    format!("{}\n{}\n{}", title, item.short_link(), reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cover_caption_escapes_markup() {
        assert_eq!(
            cover_caption("Q&A <live>"),
            "<u><b>Q&amp;A &lt;live&gt;</b></u>"
        );
    }

    #[test]
    fn test_audio_caption() {
        let item = FeedItem::new("abc123", "2024-01-01T00:00:00Z");
        assert_eq!(
            audio_caption("Episode 4", "The Show", &item, 3723),
            "Episode 4\nThe Show\nyoutu.be/abc123 1:02:03"
        );
    }

    #[test]
    fn test_audio_caption_without_performer() {
        let item = FeedItem::new("abc123", "2024-01-01T00:00:00Z");
        assert_eq!(
            audio_caption("Episode 4", "", &item, 59),
            "Episode 4\nyoutu.be/abc123 0:59"
        );
    }

    #[test]
    fn test_unavailable_notice() {
        let item = FeedItem::new("abc123", "2024-01-01T00:00:00Z");
        assert_eq!(
            unavailable_notice("Episode 4", &item, "age restricted"),
            "Episode 4\nyoutu.be/abc123\nage restricted"
        );
    }
}
