use serde::{Deserialize, Serialize};

/// A singular/plural phrase pair used wherever the text has to agree
/// with how many items were selected ("is"/"are", "wound"/"wounds").
#[derive(Debug, Clone, Default, Eq, Serialize, Deserialize)]
pub struct IrregularForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singular: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
}

impl IrregularForm {
    pub fn new(singular: &str, plural: &str) -> Self {
        Self {
            singular: Some(singular.to_string()),
            plural: Some(plural.to_string()),
        }
    }

    /// A form that only has a singular phrase.
    pub fn singular(phrase: &str) -> Self {
        Self {
            singular: Some(phrase.to_string()),
            plural: None,
        }
    }

    /// True when neither phrase carries any text.
    pub fn is_empty(&self) -> bool {
        blank(&self.singular) && blank(&self.plural)
    }

    /// Pick the phrase for a selection. The plural phrase is used when
    /// `plural` is requested and one exists, otherwise the singular.
    pub fn pick(&self, plural: bool) -> Option<&str> {
        if plural && !blank(&self.plural) {
            return self.plural.as_deref();
        }
        if blank(&self.singular) {
            None
        } else {
            self.singular.as_deref()
        }
    }
}

fn blank(phrase: &Option<String>) -> bool {
    phrase.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// `None` and `Some("")` are the same phrase.
impl PartialEq for IrregularForm {
    fn eq(&self, other: &Self) -> bool {
        let norm = |s: &Option<String>| s.as_deref().unwrap_or("").to_string();
        norm(&self.singular) == norm(&other.singular) && norm(&self.plural) == norm(&other.plural)
    }
}
