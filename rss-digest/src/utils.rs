/// Timestamp helpers for the storage layer.
///
/// Timestamps are stored as `INTEGER` Unix epoch milliseconds (UTC).
pub mod time {
    use chrono::{DateTime, TimeZone, Utc};

    #[inline]
    pub fn datetime_to_ms(dt: DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    /// Out-of-range values clamp instead of panicking.
    pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
        match Utc.timestamp_millis_opt(ms) {
            chrono::LocalResult::Single(dt) => dt,
            chrono::LocalResult::Ambiguous(dt, _) => dt,
            chrono::LocalResult::None => {
                if ms.is_negative() {
                    DateTime::<Utc>::MIN_UTC
                } else {
                    DateTime::<Utc>::MAX_UTC
                }
            }
        }
    }

    /// `YYYY-MM-DD HH:MM`, or an empty string.
    pub fn format_date(dt: Option<DateTime<Utc>>) -> String {
        dt.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

/// Text processing utilities
pub mod text {
    use std::collections::HashSet;

    /// Removes duplicates, keeping the first occurrence.
    pub fn dedup_preserve_order<I>(items: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        items
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .collect()
    }

    /// Splits on `,`, `;` and newlines, trimming and dropping blanks.
    pub fn split_list(value: &str) -> Vec<String> {
        value
            .split(|c| matches!(c, ',' | ';' | '\n'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn escape_html(input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::text::*;
    use super::time::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn split_and_dedup() {
        let parts = split_list(" a@x.com; b@x.com,\n a@x.com ,, ");
        assert_eq!(parts, vec!["a@x.com", "b@x.com", "a@x.com"]);
        assert_eq!(dedup_preserve_order(parts), vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<b>R&D</b> \"q\""), "&lt;b&gt;R&amp;D&lt;/b&gt; &quot;q&quot;");
    }

    #[test]
    fn millis_round_trip() {
        let dt = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(ms_to_datetime(datetime_to_ms(dt)), dt);
        assert_eq!(format_date(Some(dt)), "2025-01-02 03:04");
        assert_eq!(format_date(None), "");
    }
}
