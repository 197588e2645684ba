/// Selectable answer options and their self-describing record format.
use serde::{Deserialize, Deserializer, Serialize};
use std::hash::{Hash, Hasher};
use thiserror::Error;

use super::irregular::IrregularForm;

#[derive(Debug, Error)]
pub enum OptionDecodeError {
    #[error("option record has no id")]
    MissingId,
    #[error("option '{0}' matches no variant (every variant needs a title)")]
    Unrecognized(String),
}

/// A vertex of a selectable image region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// What kind of choice an option is, with the payload each kind carries.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    /// Plain choice.
    Text { title: String },
    /// "None of the above"; excludes the other selections of its group.
    None { title: String },
    /// Numeric or size input. Size narratives are juxtaposed, never list-joined.
    Size { title: String, unit: String },
    /// Selecting it splices a copy of the shared sub-tree `id`.
    Repetitive { id: String, title: String },
    /// A selectable image region; narrates like `Text`.
    Polygon { points: Vec<Point>, title: String },
    /// Composite answer. `children` are the items being qualified (body
    /// locations), `options` the qualifiers offered for each child.
    Grouped {
        title: String,
        before_group: IrregularForm,
        after_group: IrregularForm,
        children: Vec<AnswerOption>,
        options: Vec<AnswerOption>,
    },
    /// Qualifier whose narrative replaces the whole grouped composition.
    GroupedOverride {
        title: String,
        children: Vec<AnswerOption>,
    },
}

impl OptionKind {
    pub fn title(&self) -> &str {
        match self {
            Self::Text { title }
            | Self::None { title }
            | Self::Size { title, .. }
            | Self::Repetitive { title, .. }
            | Self::Polygon { title, .. }
            | Self::Grouped { title, .. }
            | Self::GroupedOverride { title, .. } => title,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None { .. })
    }

    /// Nested options of grouped kinds; empty for every other kind.
    pub fn children(&self) -> &[AnswerOption] {
        match self {
            Self::Grouped { children, .. } | Self::GroupedOverride { children, .. } => children,
            _ => &[],
        }
    }
}

/// One selectable answer choice. Identity is the `id` alone: two options
/// with the same id are equal and hash alike even if their content differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawOption", into = "RawOption")]
pub struct AnswerOption {
    pub id: String,
    /// Literal text contributed to the note when selected.
    pub narrative: String,
    pub kind: OptionKind,
}

impl AnswerOption {
    pub fn new(id: &str, narrative: &str, kind: OptionKind) -> Self {
        Self {
            id: id.to_string(),
            narrative: narrative.to_string(),
            kind,
        }
    }

    pub fn text(id: &str, narrative: &str) -> Self {
        Self::new(
            id,
            narrative,
            OptionKind::Text {
                title: narrative.to_string(),
            },
        )
    }

    pub fn none(id: &str, narrative: &str) -> Self {
        Self::new(
            id,
            narrative,
            OptionKind::None {
                title: narrative.to_string(),
            },
        )
    }

    pub fn title(&self) -> &str {
        self.kind.title()
    }

    pub fn is_none(&self) -> bool {
        self.kind.is_none()
    }

    pub fn children(&self) -> &[AnswerOption] {
        self.kind.children()
    }

    /// Same id and kind, different narrative.
    pub fn with_narrative(&self, narrative: String) -> Self {
        Self {
            id: self.id.clone(),
            narrative,
            kind: self.kind.clone(),
        }
    }
}

impl PartialEq for AnswerOption {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AnswerOption {}

impl Hash for AnswerOption {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Flat record form of an option. Which optional fields are present
/// decides the variant; see [`VARIANT_MATCHERS`]. Multi-word fields also
/// accept their camelCase spelling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOption {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub narrative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub none: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<RawOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<RawOption>>,
    #[serde(default, alias = "beforeGroup", skip_serializing_if = "Option::is_none")]
    pub before_group: Option<IrregularForm>,
    #[serde(default, alias = "afterGroup", skip_serializing_if = "Option::is_none")]
    pub after_group: Option<IrregularForm>,
    #[serde(default, alias = "repetitiveId", skip_serializing_if = "Option::is_none")]
    pub repetitive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<Point>>,
}

type Matcher = fn(&RawOption, &str) -> Option<OptionKind>;

/// Variant matchers in priority order. Field sets overlap (a grouped
/// record also has `children` and `title`), so the first match wins.
pub const VARIANT_MATCHERS: [(&str, Matcher); 7] = [
    ("none", match_none),
    ("grouped", match_grouped),
    ("grouped_override", match_grouped_override),
    ("repetitive", match_repetitive),
    ("size", match_size),
    ("polygon", match_polygon),
    ("text", match_text),
];

fn match_none(raw: &RawOption, title: &str) -> Option<OptionKind> {
    (raw.none == Some(true)).then(|| OptionKind::None {
        title: title.to_string(),
    })
}

fn match_grouped(raw: &RawOption, title: &str) -> Option<OptionKind> {
    let children = raw.children.as_ref()?;
    let options = raw.options.as_ref()?;
    Some(OptionKind::Grouped {
        title: title.to_string(),
        before_group: raw.before_group.clone().unwrap_or_default(),
        after_group: raw.after_group.clone().unwrap_or_default(),
        children: decode_lenient(children.clone()),
        options: decode_lenient(options.clone()),
    })
}

fn match_grouped_override(raw: &RawOption, title: &str) -> Option<OptionKind> {
    let children = raw.children.as_ref()?;
    Some(OptionKind::GroupedOverride {
        title: title.to_string(),
        children: decode_lenient(children.clone()),
    })
}

fn match_repetitive(raw: &RawOption, title: &str) -> Option<OptionKind> {
    raw.repetitive_id.as_ref().map(|id| OptionKind::Repetitive {
        id: id.clone(),
        title: title.to_string(),
    })
}

fn match_size(raw: &RawOption, title: &str) -> Option<OptionKind> {
    raw.unit.as_ref().map(|unit| OptionKind::Size {
        title: title.to_string(),
        unit: unit.clone(),
    })
}

fn match_polygon(raw: &RawOption, title: &str) -> Option<OptionKind> {
    raw.polygon.as_ref().map(|points| OptionKind::Polygon {
        points: points.clone(),
        title: title.to_string(),
    })
}

fn match_text(_raw: &RawOption, title: &str) -> Option<OptionKind> {
    Some(OptionKind::Text {
        title: title.to_string(),
    })
}

impl TryFrom<RawOption> for AnswerOption {
    type Error = OptionDecodeError;

    fn try_from(raw: RawOption) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err(OptionDecodeError::MissingId);
        }
        let title = raw
            .title
            .as_deref()
            .ok_or_else(|| OptionDecodeError::Unrecognized(raw.id.clone()))?;

        let kind = VARIANT_MATCHERS
            .iter()
            .find_map(|(_, matcher)| matcher(&raw, title))
            .ok_or_else(|| OptionDecodeError::Unrecognized(raw.id.clone()))?;

        Ok(AnswerOption {
            id: raw.id,
            narrative: raw.narrative,
            kind,
        })
    }
}

impl From<AnswerOption> for RawOption {
    fn from(option: AnswerOption) -> Self {
        let mut raw = RawOption {
            id: option.id,
            narrative: option.narrative,
            ..RawOption::default()
        };
        let encode = |list: Vec<AnswerOption>| -> Vec<RawOption> {
            list.into_iter().map(RawOption::from).collect()
        };
        let present = |form: IrregularForm| (!form.is_empty()).then_some(form);

        match option.kind {
            OptionKind::Text { title } => raw.title = Some(title),
            OptionKind::None { title } => {
                raw.title = Some(title);
                raw.none = Some(true);
            }
            OptionKind::Size { title, unit } => {
                raw.title = Some(title);
                raw.unit = Some(unit);
            }
            OptionKind::Repetitive { id, title } => {
                raw.title = Some(title);
                raw.repetitive_id = Some(id);
            }
            OptionKind::Polygon { points, title } => {
                raw.title = Some(title);
                raw.polygon = Some(points);
            }
            OptionKind::Grouped {
                title,
                before_group,
                after_group,
                children,
                options,
            } => {
                raw.title = Some(title);
                raw.before_group = present(before_group);
                raw.after_group = present(after_group);
                raw.children = Some(encode(children));
                raw.options = Some(encode(options));
            }
            OptionKind::GroupedOverride { title, children } => {
                raw.title = Some(title);
                raw.children = Some(encode(children));
            }
        }
        raw
    }
}

/// Decode option records, dropping (and logging) any no matcher accepts.
pub fn decode_lenient(records: Vec<RawOption>) -> Vec<AnswerOption> {
    records
        .into_iter()
        .filter_map(|raw| match AnswerOption::try_from(raw) {
            Ok(option) => Some(option),
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable option record");
                None
            }
        })
        .collect()
}

/// `deserialize_with` helper for option lists embedded in questions.
pub fn deserialize_options<'de, D>(deserializer: D) -> Result<Vec<AnswerOption>, D::Error>
where
    D: Deserializer<'de>,
{
    let records = Vec::<RawOption>::deserialize(deserializer)?;
    Ok(decode_lenient(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn grouped_leg() -> AnswerOption {
        AnswerOption::new(
            "leg",
            "",
            OptionKind::Grouped {
                title: "Leg".to_string(),
                before_group: IrregularForm::singular("the"),
                after_group: IrregularForm::new("leg", "legs"),
                children: vec![AnswerOption::text("left", "left"), AnswerOption::text("right", "right")],
                options: vec![
                    AnswerOption::text("swollen", "swollen"),
                    AnswerOption::none("normal", "normal"),
                ],
            },
        )
    }

    #[test]
    fn identity_is_id_only() {
        let a = AnswerOption::text("a", "red");
        let b = AnswerOption::text("a", "blue");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn none_wins_over_text() {
        let raw = RawOption {
            id: "n".to_string(),
            title: Some("None".to_string()),
            none: Some(true),
            ..RawOption::default()
        };
        let option = AnswerOption::try_from(raw).unwrap();
        assert!(option.is_none());
    }

    #[test]
    fn children_without_options_is_override() {
        let raw = RawOption {
            id: "o".to_string(),
            title: Some("Not assessed".to_string()),
            children: Some(vec![]),
            ..RawOption::default()
        };
        let option = AnswerOption::try_from(raw).unwrap();
        assert!(matches!(option.kind, OptionKind::GroupedOverride { .. }));
    }

    #[test]
    fn children_with_options_is_grouped() {
        let raw: RawOption = grouped_leg().into();
        let option = AnswerOption::try_from(raw).unwrap();
        match option.kind {
            OptionKind::Grouped {
                children, options, ..
            } => {
                assert_eq!(children.len(), 2);
                assert!(options[1].is_none());
            }
            other => panic!("expected grouped, got {:?}", other),
        }
    }

    #[test]
    fn missing_title_is_rejected() {
        let raw = RawOption {
            id: "x".to_string(),
            unit: Some("cm".to_string()),
            ..RawOption::default()
        };
        assert!(matches!(
            AnswerOption::try_from(raw),
            Err(OptionDecodeError::Unrecognized(id)) if id == "x"
        ));
    }

    #[test]
    fn every_kind_survives_ron() {
        let options = vec![
            AnswerOption::text("t", "plain"),
            AnswerOption::none("n", "none"),
            AnswerOption::new(
                "s",
                "3",
                OptionKind::Size {
                    title: "Length".to_string(),
                    unit: "cm".to_string(),
                },
            ),
            AnswerOption::new(
                "r",
                "",
                OptionKind::Repetitive {
                    id: "wound".to_string(),
                    title: "Add wound".to_string(),
                },
            ),
            AnswerOption::new(
                "p",
                "sacrum",
                OptionKind::Polygon {
                    points: vec![Point { x: 0.0, y: 1.0 }, Point { x: 2.5, y: 3.0 }],
                    title: "Sacrum".to_string(),
                },
            ),
            grouped_leg(),
            AnswerOption::new(
                "g",
                "no swelling noted",
                OptionKind::GroupedOverride {
                    title: "None".to_string(),
                    children: vec![AnswerOption::text("c", "c")],
                },
            ),
        ];

        let text = ron::to_string(&options).unwrap();
        let decoded: Vec<AnswerOption> = ron::from_str(&text).unwrap();
        assert_eq!(decoded.len(), options.len());
        for (before, after) in options.iter().zip(&decoded) {
            assert_eq!(before, after);
            assert_eq!(before.narrative, after.narrative);
            assert_eq!(before.kind, after.kind);
        }
    }

    #[test]
    fn lenient_list_drops_bad_records() {
        let json = r#"[{"id": "a", "title": "A"}, {"id": "b"}, {"title": "no id"}]"#;
        let records: Vec<RawOption> = serde_json::from_str(json).unwrap();
        let options = decode_lenient(records);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].id, "a");
    }
}
