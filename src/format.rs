//! Renders matched items into channel-specific notification content.

use crate::{feed::FeedItem, matcher::KeywordSet, notify::ChannelKind};
use chrono::{FixedOffset, NaiveDateTime, TimeZone, Utc};
use std::fmt::Write;

/// Offset of the displayed local time from UTC. Fixed, no DST.
pub const LOCAL_OFFSET_SECONDS: i32 = 8 * 3600;
pub const LOCAL_TIMEZONE_LABEL: &str = "Beijing Time";

/// Shown in place of a timestamp that could not be parsed.
pub const TIME_PARSE_FAILED: &str = "time parse failed";

/// Used as the push summary when the first item has no usable title.
pub const FALLBACK_SUMMARY: &str = "New matching notice";

const FEED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MAIL_SEPARATOR: &str = "----------------------------------------";
const SUMMARY_MAX_CHARS: usize = 64;

pub struct Formatter {
    heading: String,
    link_base: String,
}

impl Formatter {
    pub fn new(heading: impl Into<String>, link_base: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            link_base: link_base.into(),
        }
    }

    pub fn render(&self, kind: ChannelKind, items: &[FeedItem], keywords: &KeywordSet) -> String {
        match kind {
            ChannelKind::Mail => self.render_mail(items, keywords),
            ChannelKind::Push => self.render_push(items, keywords),
        }
    }

    /// Plain-text body for mail.
    fn render_mail(&self, items: &[FeedItem], keywords: &KeywordSet) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "{}\n", self.heading);
        let _ = writeln!(
            out,
            "Detected {} new notice(s) matching: {}\n",
            items.len(),
            describe_keywords(keywords, |k| k.to_string())
        );

        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                let _ = writeln!(out, "{MAIL_SEPARATOR}\n");
            }

            let _ = writeln!(out, "Title: {}", item.title);
            if let Some(created_at) = &item.created_at {
                let _ = writeln!(out, "Published: {}", to_local_time(created_at));
            }
            if let Some(category) = &item.category {
                let _ = writeln!(out, "Category: {category}");
            }
            if let Some(summary) = &item.summary {
                let _ = writeln!(out, "\nSummary:\n{summary}");
            }
            if let Some(link) = self.detail_link(item) {
                let _ = writeln!(out, "\nLink: {link}");
            }
            out.push('\n');
        }

        out.push_str("Please check the official site for the full notice.\n");
        out.push_str("This message was generated automatically, please do not reply.\n");
        out
    }

    /// Markdown body for the push relay.
    fn render_push(&self, items: &[FeedItem], keywords: &KeywordSet) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "## {}\n", self.heading);
        let _ = writeln!(
            out,
            "Matched keywords: {}",
            describe_keywords(keywords, |k| format!("**{k}**"))
        );

        for item in items {
            let _ = writeln!(out, "\n### {}\n", item.title);
            if let Some(created_at) = &item.created_at {
                let _ = writeln!(out, "- Published: {}", to_local_time(created_at));
            }
            if let Some(category) = &item.category {
                let _ = writeln!(out, "- Category: {category}");
            }
            if let Some(summary) = &item.summary {
                let _ = writeln!(out, "- Summary: {summary}");
            }
            if let Some(link) = self.detail_link(item) {
                let _ = writeln!(out, "- [View notice]({link})");
            }
        }

        out
    }

    fn detail_link(&self, item: &FeedItem) -> Option<String> {
        item.id.map(|id| format!("{}{id}", self.link_base))
    }
}

/// Single-line summary for push notifications, taken from the first item.
pub fn push_summary(items: &[FeedItem]) -> String {
    let title = items.first().map(|item| item.title.trim()).unwrap_or("");
    if title.is_empty() {
        return FALLBACK_SUMMARY.to_string();
    }

    let mut summary: String = title.chars().take(SUMMARY_MAX_CHARS).collect();
    if title.chars().count() > SUMMARY_MAX_CHARS {
        summary.push_str("...");
    }
    if items.len() > 1 {
        let _ = write!(summary, " (+{} more)", items.len() - 1);
    }
    summary
}

/// Converts a naive UTC feed timestamp into the display timezone.
///
/// Returns [`TIME_PARSE_FAILED`] instead of failing.
pub fn to_local_time(utc: &str) -> String {
    let Ok(naive) = NaiveDateTime::parse_from_str(utc, FEED_TIME_FORMAT) else {
        return TIME_PARSE_FAILED.to_string();
    };
    let Some(offset) = FixedOffset::east_opt(LOCAL_OFFSET_SECONDS) else {
        return TIME_PARSE_FAILED.to_string();
    };

    let local = Utc.from_utc_datetime(&naive).with_timezone(&offset);
    format!("{} ({LOCAL_TIMEZONE_LABEL})", local.format(DISPLAY_TIME_FORMAT))
}

fn describe_keywords(keywords: &KeywordSet, decorate: impl Fn(&str) -> String) -> String {
    if keywords.is_empty() {
        return "(any)".to_string();
    }
    keywords
        .as_slice()
        .iter()
        .map(|k| decorate(k))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> Formatter {
        Formatter::new("Notice alert", "https://dasai.lanqiao.cn/notices/")
    }

    fn item(title: &str, created_at: Option<&str>, id: Option<i64>) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            created_at: created_at.map(str::to_string),
            category: None,
            summary: None,
            id,
        }
    }

    #[test]
    fn converts_to_local_time() {
        assert_eq!(
            to_local_time("2025-06-16T09:11:44"),
            "2025-06-16 17:11:44 (Beijing Time)"
        );
    }

    #[test]
    fn conversion_crosses_midnight() {
        assert_eq!(
            to_local_time("2024-12-31T20:30:00"),
            "2025-01-01 04:30:00 (Beijing Time)"
        );
    }

    #[test]
    fn malformed_time_yields_placeholder() {
        assert_eq!(to_local_time("not-a-date"), TIME_PARSE_FAILED);
        assert_eq!(to_local_time(""), TIME_PARSE_FAILED);
        assert_eq!(to_local_time("2025-13-40T99:00:00"), TIME_PARSE_FAILED);
    }

    #[test]
    fn mail_body_contains_item_details() {
        let items = vec![FeedItem {
            category: Some("News".to_string()),
            summary: Some("Registration opens soon.".to_string()),
            ..item("Spring Competition Notice", Some("2025-06-16T09:11:44"), Some(42))
        }];
        let body = formatter().render(ChannelKind::Mail, &items, &KeywordSet::new(["competition"]));

        assert!(body.starts_with("Notice alert\n"));
        assert!(body.contains("matching: competition"));
        assert!(body.contains("Title: Spring Competition Notice\n"));
        assert!(body.contains("Published: 2025-06-16 17:11:44 (Beijing Time)\n"));
        assert!(body.contains("Category: News\n"));
        assert!(body.contains("Summary:\nRegistration opens soon.\n"));
        assert!(
            body.lines()
                .any(|line| line.starts_with("Link: ") && line.ends_with("/42"))
        );
    }

    #[test]
    fn missing_optional_fields_omit_lines() {
        let items = vec![item("Bare notice", None, None)];
        let body = formatter().render(ChannelKind::Mail, &items, &KeywordSet::default());

        assert!(body.contains("Title: Bare notice"));
        assert!(body.contains("matching: (any)"));
        assert!(!body.contains("Published:"));
        assert!(!body.contains("Category:"));
        assert!(!body.contains("Summary:"));
        assert!(!body.contains("Link:"));
    }

    #[test]
    fn bad_timestamp_does_not_suppress_other_items() {
        let items = vec![
            item("Broken", Some("not-a-date"), Some(1)),
            item("Fine", Some("2025-06-16T09:11:44"), Some(2)),
        ];
        let body = formatter().render(ChannelKind::Mail, &items, &KeywordSet::default());

        assert!(body.contains("Published: time parse failed"));
        assert!(body.contains("Title: Fine"));
        assert!(body.contains("2025-06-16 17:11:44 (Beijing Time)"));
        assert_eq!(body.matches(MAIL_SEPARATOR).count(), 1);
    }

    #[test]
    fn push_body_uses_markup() {
        let items = vec![item("Spring Competition Notice", Some("2025-06-16T09:11:44"), Some(42))];
        let body = formatter().render(
            ChannelKind::Push,
            &items,
            &KeywordSet::new(["competition", "spring"]),
        );

        assert!(body.starts_with("## Notice alert\n"));
        assert!(body.contains("Matched keywords: **competition**, **spring**"));
        assert!(body.contains("### Spring Competition Notice"));
        assert!(body.contains("- Published: 2025-06-16 17:11:44 (Beijing Time)"));
        assert!(body.contains("- [View notice](https://dasai.lanqiao.cn/notices/42)"));
    }

    #[test]
    fn rendering_is_idempotent() {
        let items = vec![
            item("One", Some("2025-06-17T09:00:00"), Some(1)),
            item("Two", None, None),
        ];
        let keywords = KeywordSet::new(["o"]);
        let formatter = formatter();

        for kind in [ChannelKind::Mail, ChannelKind::Push] {
            assert_eq!(
                formatter.render(kind, &items, &keywords),
                formatter.render(kind, &items, &keywords)
            );
        }
    }

    #[test]
    fn push_summary_uses_first_title() {
        let items = vec![item("Newest", None, None), item("Older", None, None)];
        assert_eq!(push_summary(&items), "Newest (+1 more)");
        assert_eq!(push_summary(&items[..1]), "Newest");
    }

    #[test]
    fn push_summary_falls_back() {
        // Whitespace-only titles are eligible for matching, so this is the
        // path that actually produces the fallback.
        assert_eq!(push_summary(&[item("   ", None, None)]), FALLBACK_SUMMARY);
        assert_eq!(push_summary(&[]), FALLBACK_SUMMARY);
    }

    #[test]
    fn push_summary_is_truncated() {
        let long = "x".repeat(100);
        let summary = push_summary(&[item(&long, None, None)]);
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS + 3);
        assert!(summary.ends_with("..."));
    }
}
