use serde::{Deserialize, Serialize};
use std::path::Path;

use super::sequence::SequenceError;

/// A literal (key, value) pair from the global settings tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettingItem {
    pub key: String,
    pub value: String,
}

impl GlobalSettingItem {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Deployment-wide text tables. `replacements` are applied verbatim to
/// the finished note, in table order. `pronunciations` are carried for
/// speech consumers and never touch the note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub replacements: Vec<GlobalSettingItem>,
    #[serde(default)]
    pub pronunciations: Vec<GlobalSettingItem>,
}

impl GlobalSettings {
    pub fn load(path: &Path) -> Result<GlobalSettings, SequenceError> {
        let contents = std::fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(ron::from_str(&contents)?)
        }
    }

    /// Apply every replacement as a plain substring substitution.
    pub fn apply_replacements(&self, text: &str) -> String {
        let mut out = text.to_string();
        for item in &self.replacements {
            if item.key.is_empty() {
                continue;
            }
            out = out.replace(&item.key, &item.value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_is_verbatim() {
        let settings = GlobalSettings {
            replacements: vec![GlobalSettingItem::new(" teh ", " the ")],
            pronunciations: Vec::new(),
        };
        assert_eq!(settings.apply_replacements("a teh b"), "a the b");
    }

    #[test]
    fn replacements_run_in_table_order() {
        let settings = GlobalSettings {
            replacements: vec![
                GlobalSettingItem::new("pt", "patient"),
                GlobalSettingItem::new("patient", "resident"),
            ],
            pronunciations: Vec::new(),
        };
        assert_eq!(settings.apply_replacements("pt is stable"), "resident is stable");
    }

    #[test]
    fn empty_key_is_ignored() {
        let settings = GlobalSettings {
            replacements: vec![GlobalSettingItem::new("", "x")],
            pronunciations: Vec::new(),
        };
        assert_eq!(settings.apply_replacements("abc"), "abc");
    }

    #[test]
    fn parse_settings_ron() {
        let settings: GlobalSettings = ron::from_str(
            r#"(replacements: [(key: "w/", value: "with")], pronunciations: [(key: "PRN", value: "as needed")])"#,
        )
        .unwrap();
        assert_eq!(settings.replacements.len(), 1);
        assert_eq!(settings.pronunciations[0].value, "as needed");
    }
}
