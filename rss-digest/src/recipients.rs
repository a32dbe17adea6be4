use crate::types::{ConfigError, Recipients};
use crate::utils::text::{dedup_preserve_order, split_list};
use serde_json::Value;
use std::collections::HashMap;

/// Group name → to/cc/bcc lists, loaded once from configuration.
///
/// A group with an entry whose lists are all empty is valid and resolves to
/// empty lists; a group with no entry at all is a configuration error.
#[derive(Debug, Clone, Default)]
pub struct RecipientResolver {
    entries: HashMap<String, Recipients>,
}

impl RecipientResolver {
    pub fn new(entries: HashMap<String, Recipients>) -> Self {
        Self { entries }
    }

    /// Parses `{"group": {"to": [...] | "a,b", "cc": ..., "bcc": ...}}`.
    pub fn from_json_str(content: &str, path: &str) -> Result<Self, ConfigError> {
        let data: Value = serde_json::from_str(content).map_err(|source| ConfigError::Json {
            kind: "Group recipients",
            path: path.to_string(),
            source,
        })?;

        let Value::Object(map) = data else {
            return Err(ConfigError::Invalid(
                "Group recipients file must be a JSON object mapping group -> recipients".to_string(),
            ));
        };

        let mut entries = HashMap::with_capacity(map.len());
        for (group, rec) in map {
            let Value::Object(rec) = rec else {
                return Err(ConfigError::Invalid(format!(
                    "Recipients for group '{}' must be an object with to/cc/bcc",
                    group
                )));
            };
            let recipients = Recipients {
                to: parse_recipient_entry(rec.get("to")),
                cc: parse_recipient_entry(rec.get("cc")),
                bcc: parse_recipient_entry(rec.get("bcc")),
            };
            entries.insert(group, recipients);
        }

        Ok(Self { entries })
    }

    pub fn resolve(&self, group: &str) -> Result<&Recipients, ConfigError> {
        self.entries
            .get(group)
            .ok_or_else(|| ConfigError::MissingRecipients {
                group: group.to_string(),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accepts a list or a delimiter-separated string; anything else is empty.
fn parse_recipient_entry(value: Option<&Value>) -> Vec<String> {
    let raw = match value {
        Some(Value::String(s)) => split_list(s),
        Some(Value::Array(values)) => values
            .iter()
            .flat_map(|v| match v {
                Value::String(s) => split_list(s),
                Value::Null => Vec::new(),
                other => split_list(&other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    };
    dedup_preserve_order(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_and_strings_are_both_accepted() {
        let resolver = RecipientResolver::from_json_str(
            r#"{
                "ml": {"to": ["a@x.com", "b@x.com", "a@x.com"], "cc": "c@x.com; d@x.com", "bcc": ""},
                "nlp": {"to": "e@x.com,\nf@x.com"}
            }"#,
            "recipients.json",
        )
        .unwrap();

        let ml = resolver.resolve("ml").unwrap();
        assert_eq!(ml.to, vec!["a@x.com", "b@x.com"]);
        assert_eq!(ml.cc, vec!["c@x.com", "d@x.com"]);
        assert!(ml.bcc.is_empty());

        let nlp = resolver.resolve("nlp").unwrap();
        assert_eq!(nlp.to, vec!["e@x.com", "f@x.com"]);
        assert!(nlp.cc.is_empty());
    }

    #[test]
    fn empty_entry_is_not_missing_entry() {
        let resolver = RecipientResolver::from_json_str(r#"{"quiet": {}}"#, "r.json").unwrap();

        let quiet = resolver.resolve("quiet").unwrap();
        assert!(quiet.is_empty());

        assert!(matches!(
            resolver.resolve("loud"),
            Err(ConfigError::MissingRecipients { group }) if group == "loud"
        ));
    }

    #[test]
    fn non_object_entry_is_rejected() {
        let err = RecipientResolver::from_json_str(r#"{"ml": ["a@x.com"]}"#, "r.json").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
