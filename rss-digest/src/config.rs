//! Settings loaded from the environment (and an optional `.env`), plus the
//! group and recipient JSON files they point at.

use crate::recipients::RecipientResolver;
use crate::types::{ConfigError, FetchConfig, DEFAULT_GROUP};
use crate::utils::text::dedup_preserve_order;
use email_delivery::SmtpConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BATCH_LIMIT: usize = 20;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 15;
pub const DEFAULT_SUBJECT_PREFIX: &str = "[Papers]";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/rss.db";
pub const DEFAULT_GROUPS_FILE: &str = "rss_groups.json";
pub const DEFAULT_SCHEDULE_TIME: &str = "08:30";
pub const DEFAULT_SCHEDULE_TZ: &str = "Asia/Shanghai";

/// A named topic: its feeds in configuration order, duplicates removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub feeds: Vec<String>,
}

/// Configured groups plus the URL → owning group map, built once.
///
/// When a URL is listed under several groups the first group in file order
/// owns it. The URL is still fetched once per listing group, but items from
/// it are always dispatched to the owner.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    groups: Vec<Group>,
    owners: HashMap<String, String>,
}

impl GroupTable {
    pub fn new(groups: Vec<Group>) -> Self {
        let mut owners = HashMap::new();
        for group in &groups {
            for url in &group.feeds {
                owners.entry(url.clone()).or_insert_with(|| group.name.clone());
            }
        }
        Self { groups, owners }
    }

    /// Parses `{"group": ["url", ...]}`, preserving the file's order.
    pub fn from_json_str(content: &str, path: &str) -> Result<Self, ConfigError> {
        let data: Value = serde_json::from_str(content).map_err(|source| ConfigError::Json {
            kind: "RSS groups",
            path: path.to_string(),
            source,
        })?;

        let Value::Object(map) = data else {
            return Err(ConfigError::Invalid(
                "RSS groups file must contain a JSON object mapping group -> list of URLs".to_string(),
            ));
        };

        let mut groups = Vec::with_capacity(map.len());
        for (name, urls) in map {
            let Value::Array(urls) = urls else {
                return Err(ConfigError::Invalid(format!(
                    "Feeds for group '{}' must be a list of URLs",
                    name
                )));
            };

            let mut feeds = Vec::with_capacity(urls.len());
            for url in urls {
                let url = match url {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                };
                if url.is_empty() {
                    return Err(ConfigError::EmptyUrl { group: name });
                }
                feeds.push(url);
            }

            if feeds.is_empty() {
                warn!("Group '{}' lists no feeds; ignoring it", name);
                continue;
            }
            groups.push(Group {
                name,
                feeds: dedup_preserve_order(feeds),
            });
        }

        if groups.is_empty() {
            return Err(ConfigError::Invalid(
                "RSS groups file has no valid groups or URLs".to_string(),
            ));
        }
        Ok(Self::new(groups))
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn owner_of(&self, url: &str) -> Option<&str> {
        self.owners.get(url).map(String::as_str)
    }

    /// Owning group for an item's source, or the implicit default group.
    pub fn group_for_source(&self, url: &str) -> &str {
        self.owner_of(url).unwrap_or(DEFAULT_GROUP)
    }

    /// Every distinct URL across all groups, first appearance first.
    pub fn unique_urls(&self) -> Vec<String> {
        dedup_preserve_order(self.groups.iter().flat_map(|g| g.feeds.iter().cloned()))
    }
}

/// Dispatch knobs.
#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub batch_limit: usize,
    pub lookback_days: u32,
    pub subject_prefix: String,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
        }
    }
}

impl DigestOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_limit == 0 {
            return Err(ConfigError::Invalid("Batch limit must be a positive integer".to_string()));
        }
        if self.lookback_days == 0 {
            return Err(ConfigError::Invalid(
                "Look-back window must be a positive number of days".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub groups: GroupTable,
    pub recipients: RecipientResolver,
    pub options: DigestOptions,
    pub database_url: String,
    pub smtp: SmtpConfig,
    pub fetch: FetchConfig,
    pub schedule_time: String,
    /// IANA zone for `schedule_time`; blank or unknown means local time.
    pub schedule_tz: String,
}

impl Settings {
    /// Assembles and validates settings. Every configured group must have a
    /// recipient entry; this is checked here so that a bad configuration
    /// fails before anything is fetched.
    pub fn new(
        groups: GroupTable,
        recipients: RecipientResolver,
        options: DigestOptions,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            groups,
            recipients,
            options,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            smtp: SmtpConfig::default(),
            fetch: FetchConfig::default(),
            schedule_time: DEFAULT_SCHEDULE_TIME.to_string(),
            schedule_tz: DEFAULT_SCHEDULE_TZ.to_string(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.validate()?;
        if self.recipients.is_empty() {
            return Err(ConfigError::Invalid(
                "GROUP_RECIPIENTS_FILE is required and must define recipients per group".to_string(),
            ));
        }
        for name in self.groups.names() {
            self.recipients.resolve(name)?;
        }
        Ok(())
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        // a missing .env is fine
        let _ = dotenvy::dotenv();

        let groups_path = env_or("RSS_GROUPS_FILE", DEFAULT_GROUPS_FILE);
        let groups = GroupTable::from_json_str(&read_file("RSS groups", &groups_path)?, &groups_path)?;

        let recipients_path = std::env::var("GROUP_RECIPIENTS_FILE").map_err(|_| {
            ConfigError::Invalid(
                "GROUP_RECIPIENTS_FILE is required and must define recipients per group".to_string(),
            )
        })?;
        let recipients = RecipientResolver::from_json_str(
            &read_file("Group recipients", &recipients_path)?,
            &recipients_path,
        )?;

        let options = DigestOptions {
            batch_limit: env_parse("BATCH_LIMIT", DEFAULT_BATCH_LIMIT)?,
            lookback_days: env_parse("LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS)?,
            subject_prefix: env_or("MAIL_SUBJECT_PREFIX", DEFAULT_SUBJECT_PREFIX),
        };

        let mut settings = Self::new(groups, recipients, options)?;
        settings.database_url = env_or("DATABASE_URL", DEFAULT_DATABASE_URL);
        settings.schedule_time = env_or("SCHEDULE_TIME", DEFAULT_SCHEDULE_TIME);
        settings.schedule_tz = env_or("SCHEDULE_TZ", DEFAULT_SCHEDULE_TZ);

        settings.smtp = SmtpConfig {
            host: env_or("SMTP_HOST", ""),
            port: env_parse("SMTP_PORT", settings.smtp.port)?,
            username: env_or("SMTP_USER", ""),
            password: env_or("SMTP_PASS", ""),
            sender: env_or("SMTP_SENDER", ""),
            timeout: Duration::from_secs(env_parse("SMTP_TIMEOUT_SECS", settings.smtp.timeout.as_secs())?),
        };
        settings.fetch.timeout_seconds = env_parse("FETCH_TIMEOUT_SECS", settings.fetch.timeout_seconds)?;

        Ok(settings)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::BadEnv { name, value }),
        _ => Ok(default),
    }
}

fn read_file(kind: &'static str, path: &str) -> Result<String, ConfigError> {
    if !Path::new(path).exists() {
        return Err(ConfigError::FileNotFound {
            kind,
            path: path.to_string(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPS: &str = r#"{
        "ml": ["https://a.example/rss", " https://b.example/rss ", "https://a.example/rss"],
        "nlp": ["https://c.example/rss", "https://b.example/rss"]
    }"#;

    #[test]
    fn groups_keep_order_and_drop_duplicates() {
        let table = GroupTable::from_json_str(GROUPS, "g.json").unwrap();
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, vec!["ml", "nlp"]);
        assert_eq!(
            table.groups()[0].feeds,
            vec!["https://a.example/rss", "https://b.example/rss"]
        );
        assert_eq!(
            table.unique_urls(),
            vec!["https://a.example/rss", "https://b.example/rss", "https://c.example/rss"]
        );
    }

    #[test]
    fn first_group_owns_shared_url() {
        let table = GroupTable::from_json_str(GROUPS, "g.json").unwrap();
        assert_eq!(table.owner_of("https://b.example/rss"), Some("ml"));
        assert_eq!(table.owner_of("https://c.example/rss"), Some("nlp"));
        assert_eq!(table.group_for_source("https://gone.example/rss"), DEFAULT_GROUP);
    }

    #[test]
    fn empty_url_is_rejected() {
        let err = GroupTable::from_json_str(r#"{"ml": ["https://a.example", "  "]}"#, "g.json").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyUrl { group } if group == "ml"));
    }

    #[test]
    fn no_groups_is_rejected() {
        assert!(GroupTable::from_json_str(r#"{"ml": []}"#, "g.json").is_err());
        assert!(GroupTable::from_json_str(r#"["x"]"#, "g.json").is_err());
    }

    #[test]
    fn every_group_needs_recipients() {
        let groups = GroupTable::from_json_str(GROUPS, "g.json").unwrap();
        let recipients =
            RecipientResolver::from_json_str(r#"{"ml": {"to": "a@x.com"}}"#, "r.json").unwrap();

        let err = Settings::new(groups, recipients, DigestOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRecipients { group } if group == "nlp"));
    }

    #[test]
    fn zero_batch_limit_is_rejected() {
        let groups = GroupTable::from_json_str(GROUPS, "g.json").unwrap();
        let recipients = RecipientResolver::from_json_str(
            r#"{"ml": {"to": "a@x.com"}, "nlp": {"to": "b@x.com"}}"#,
            "r.json",
        )
        .unwrap();
        let options = DigestOptions {
            batch_limit: 0,
            ..DigestOptions::default()
        };
        assert!(Settings::new(groups, recipients, options).is_err());
    }
}
