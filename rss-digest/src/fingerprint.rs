//! Stable identity for feed items.
//!
//! The fingerprint is the only deduplication key: SHA-256 over
//! `"{identifier or link}::{published as RFC 3339}"`, hex encoded. Entries that
//! carry neither identifier nor link hash only the timestamp part and may
//! collide with each other.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::types::FeedEntry;

const DELIMITER: &str = "::";

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 64;

pub fn fingerprint(identifier: &str, link: &str, published_at: Option<DateTime<Utc>>) -> String {
    let base = if identifier.is_empty() { link } else { identifier };
    let stamp = published_at
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(DELIMITER.as_bytes());
    hasher.update(stamp.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn fingerprint_entry(entry: &FeedEntry) -> String {
    fingerprint(&entry.identifier, &entry.link, entry.published_at)
}
