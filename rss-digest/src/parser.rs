use crate::types::FeedEntry;
use feed_rs::parser;
use tracing::debug;

const UNTITLED: &str = "(no title)";

#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses an RSS/Atom/JSON Feed document into entries, in document order.
    pub fn parse_feed(&self, content: &str) -> Result<Vec<FeedEntry>, parser::ParseFeedError> {
        debug!("Parsing feed content ({} bytes)", content.len());

        // feed-rs invents ids for entries without one; keep them empty so the
        // fingerprint falls back to the link instead.
        let feed = parser::Builder::new()
            .id_generator(|_links, _title, _uri| String::new())
            .build()
            .parse(content.as_bytes())?;
        let entries: Vec<FeedEntry> = feed.entries.into_iter().map(Self::convert_entry).collect();

        debug!("Parsed feed with {} entries", entries.len());
        Ok(entries)
    }

    fn convert_entry(entry: feed_rs::model::Entry) -> FeedEntry {
        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        let link = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();

        let authors = entry
            .authors
            .iter()
            .map(|a| a.name.trim())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let summary = match entry.summary {
            Some(text) => text.content,
            None => entry.content.and_then(|c| c.body).unwrap_or_default(),
        };

        FeedEntry {
            identifier: entry.id,
            link,
            title,
            authors,
            summary,
            published_at: entry.published.or(entry.updated),
        }
    }
}
