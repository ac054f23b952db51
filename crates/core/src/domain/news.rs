use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,

    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Body excerpt, untrimmed.
    #[serde(default, alias = "body", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    #[serde(default, alias = "link", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl NewsItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: None,
            content: None,
            published_at: None,
            url: None,
        }
    }

    /// Prompt block: `title - summary` then the body excerpt cut at
    /// `excerpt_chars` characters.
    pub fn digest(&self, excerpt_chars: usize) -> String {
        let summary = self.summary.as_deref().unwrap_or("").trim();
        let content = self.content.as_deref().unwrap_or("").trim();
        let excerpt: String = content.chars().take(excerpt_chars).collect();
        format!("{} - {summary}\n{excerpt}...", self.title.trim())
    }

    /// Everything a keyword rule should see.
    pub fn searchable_text(&self) -> String {
        [
            Some(self.title.as_str()),
            self.summary.as_deref(),
            self.content.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// News for one run: either what the source returned, or the reason it
/// could not be fetched.
#[derive(Debug, Clone)]
pub enum NewsFeed {
    Items(Vec<NewsItem>),
    Unavailable(String),
}

impl NewsFeed {
    pub fn items(&self) -> &[NewsItem] {
        match self {
            NewsFeed::Items(items) => items,
            NewsFeed::Unavailable(_) => &[],
        }
    }

    pub fn headlines(&self, limit: usize) -> Vec<String> {
        self.items()
            .iter()
            .take(limit)
            .map(|n| n.title.trim().to_string())
            .collect()
    }

    pub fn summary(&self, max_items: usize, excerpt_chars: usize) -> String {
        match self {
            NewsFeed::Items(items) if items.is_empty() => "No recent news found.".to_string(),
            NewsFeed::Items(items) => items
                .iter()
                .take(max_items)
                .map(|n| n.digest(excerpt_chars))
                .collect::<Vec<_>>()
                .join("\n\n"),
            NewsFeed::Unavailable(err) => format!("No news available. (Error: {err})"),
        }
    }

    pub fn searchable_text(&self) -> String {
        self.items()
            .iter()
            .map(NewsItem::searchable_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_with_field_aliases() {
        let v = json!({
            "title": "Tesla beats estimates",
            "description": "Deliveries up",
            "body": "Full text",
            "published_at": "2026-01-27T10:00:00Z",
        });
        let item: NewsItem = serde_json::from_value(v).unwrap();
        assert_eq!(item.summary.as_deref(), Some("Deliveries up"));
        assert_eq!(item.content.as_deref(), Some("Full text"));
        assert!(item.published_at.is_some());
        assert!(item.url.is_none());
    }

    #[test]
    fn digest_truncates_body_by_characters() {
        let mut item = NewsItem::titled("Headline");
        item.summary = Some("short".into());
        item.content = Some("é".repeat(10));
        assert_eq!(item.digest(3), "Headline - short\nééé...");
    }

    #[test]
    fn unavailable_feed_renders_error_and_no_headlines() {
        let feed = NewsFeed::Unavailable("HTTP 503".into());
        assert_eq!(feed.summary(5, 500), "No news available. (Error: HTTP 503)");
        assert!(feed.headlines(3).is_empty());
        assert!(feed.searchable_text().is_empty());
    }

    #[test]
    fn headlines_are_capped() {
        let feed = NewsFeed::Items(
            (1..=5)
                .map(|i| NewsItem::titled(format!("Story {i}")))
                .collect(),
        );
        assert_eq!(feed.headlines(3), vec!["Story 1", "Story 2", "Story 3"]);
    }
}
