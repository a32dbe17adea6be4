//! Subject and body rendering for group digests.

use crate::types::Item;
use crate::utils::text::escape_html;
use crate::utils::time::format_date;
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Subject plus both body representations of one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

#[derive(Debug, Clone)]
pub struct DigestRenderer {
    subject_prefix: String,
}

impl DigestRenderer {
    pub fn new(subject_prefix: impl Into<String>) -> Self {
        Self {
            subject_prefix: subject_prefix.into(),
        }
    }

    /// Renders `items` as a digest, or the "no new papers" notice when empty.
    pub fn render(&self, group: &str, items: &[Item], generated_at: DateTime<Utc>) -> RenderedDigest {
        if items.is_empty() {
            return self.render_empty(group, generated_at);
        }

        RenderedDigest {
            subject: format!("{} [{}] {} new papers", self.subject_prefix, group, items.len()),
            html_body: render_html(group, items, generated_at),
            text_body: render_text(group, items),
        }
    }

    pub fn render_empty(&self, group: &str, generated_at: DateTime<Utc>) -> RenderedDigest {
        let ts = format_date(Some(generated_at));
        RenderedDigest {
            subject: format!("{} [{}] No new papers", self.subject_prefix, group),
            html_body: format!(
                "<html>\n  <body>\n    <p>No new papers for group: {}</p>\n    <p>Generated at {}</p>\n  </body>\n</html>\n",
                escape_html(group),
                ts
            ),
            text_body: format!("No new papers for group: {}\nGenerated at {}", group, ts),
        }
    }

    /// Connectivity check message, clearly not a digest.
    pub fn render_test(&self, sent_at: DateTime<Utc>) -> RenderedDigest {
        let ts = format_date(Some(sent_at));
        RenderedDigest {
            subject: format!("{} SMTP test", self.subject_prefix),
            html_body: format!("<p>This is a test email sent at {}.</p>", ts),
            text_body: format!("This is a test email sent at {}.", ts),
        }
    }
}

fn render_html(group: &str, items: &[Item], generated_at: DateTime<Utc>) -> String {
    let mut list = String::new();
    for item in items {
        let _ = writeln!(
            list,
            "      <li><a href=\"{}\">{}</a><br/><small>{} | {} | {}</small><p>{}</p></li>",
            escape_html(&item.link),
            escape_html(&item.title),
            escape_html(&item.authors),
            format_date(item.published_at),
            escape_html(&item.source),
            escape_html(&item.summary),
        );
    }

    format!(
        "<html>\n  <body>\n    <p>Latest papers for group: {}</p>\n    <ul>\n{}    </ul>\n    <p>Generated at {}</p>\n  </body>\n</html>\n",
        escape_html(group),
        list,
        format_date(Some(generated_at))
    )
}

fn render_text(group: &str, items: &[Item]) -> String {
    let mut lines = vec![format!("Group: {}\n", group)];
    for item in items {
        let authors = if item.authors.is_empty() {
            "Unknown authors"
        } else {
            item.authors.as_str()
        };
        lines.push(format!(
            "{}\n{} | {} | {}\n{}\n",
            item.title,
            authors,
            format_date(item.published_at),
            item.source,
            item.link
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(title: &str, authors: &str) -> Item {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Item {
            id: title.to_string(),
            title: title.to_string(),
            authors: authors.to_string(),
            summary: "A <b>bold</b> claim".to_string(),
            link: "https://arxiv.example/abs/1?a=1&b=2".to_string(),
            published_at: Some(now),
            source: "https://arxiv.example/rss".to_string(),
            sent: false,
            created_at: now,
            inserted_at: now,
        }
    }

    #[test]
    fn batch_digest() {
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 7, 45, 0).unwrap();
        let rendered = DigestRenderer::new("[Papers]").render(
            "ml",
            &[item("Attention & more", "Ada"), item("Second", "")],
            at,
        );

        assert_eq!(rendered.subject, "[Papers] [ml] 2 new papers");
        assert!(rendered.html_body.contains("Latest papers for group: ml"));
        assert!(rendered.html_body.contains("Attention &amp; more"));
        assert!(rendered.html_body.contains("href=\"https://arxiv.example/abs/1?a=1&amp;b=2\""));
        assert!(rendered.html_body.contains("A &lt;b&gt;bold&lt;/b&gt; claim"));
        assert!(rendered.html_body.contains("Generated at 2025-03-02 07:45"));
        assert_eq!(rendered.html_body.matches("<li>").count(), 2);

        assert!(rendered.text_body.starts_with("Group: ml\n"));
        assert!(rendered
            .text_body
            .contains("Attention & more\nAda | 2025-03-01 09:00 | https://arxiv.example/rss\n"));
        assert!(rendered.text_body.contains("Unknown authors"));
    }

    #[test]
    fn empty_batch_renders_notice() {
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 7, 45, 0).unwrap();
        let rendered = DigestRenderer::new("[Papers]").render("nlp", &[], at);

        assert_eq!(rendered.subject, "[Papers] [nlp] No new papers");
        assert!(rendered.html_body.contains("No new papers for group: nlp"));
        assert_eq!(
            rendered.text_body,
            "No new papers for group: nlp\nGenerated at 2025-03-02 07:45"
        );
    }

    #[test]
    fn test_message_is_not_a_notice() {
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 7, 45, 0).unwrap();
        let rendered = DigestRenderer::new("[Papers]").render_test(at);

        assert_eq!(rendered.subject, "[Papers] SMTP test");
        assert_eq!(rendered.text_body, "This is a test email sent at 2025-03-02 07:45.");
        assert!(!rendered.html_body.contains("No new papers"));
    }
}
