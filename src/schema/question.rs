use serde::{Deserialize, Serialize};

use super::irregular::IrregularForm;
use super::option::{deserialize_options, AnswerOption};

/// Which half of a grouped fragment comes first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupOrder {
    /// "the left and right legs are swollen"
    #[default]
    QuestionThenAnswer,
    /// "swelling is present in the left and right legs"
    AnswerThenQuestion,
}

/// How a question is answered and narrated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum QuestionKind {
    #[default]
    List,
    Size,
    DateTime,
    Image,
    Grouped {
        #[serde(default)]
        order: GroupOrder,
        #[serde(default, alias = "linkingVerb")]
        linking_verb: IrregularForm,
    },
    GroupedOverride,
    /// Pseudo-question that emits the named variable buffers.
    VariablesToOutput { names: Vec<String> },
}

/// Text placed around a question's option narratives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<IrregularForm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<IrregularForm>,
    /// Emitted after the question's children have been narrated.
    #[serde(default, alias = "afterChildren", skip_serializing_if = "Option::is_none")]
    pub after_children: Option<String>,
}

/// One node of the questionnaire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub narrative: Narrative,
    /// Route this question's narrative into a named buffer instead of the note.
    #[serde(default, alias = "outputToVariable", skip_serializing_if = "Option::is_none")]
    pub output_to_variable: Option<String>,
    #[serde(default = "default_rule")]
    pub rule: String,
    #[serde(default)]
    pub children: Vec<Question>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<AnswerOption>,
}

fn default_rule() -> String {
    "true".to_string()
}

impl Question {
    pub fn new(id: &str, prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: QuestionKind::default(),
            prompt: prompt.to_string(),
            narrative: Narrative::default(),
            output_to_variable: None,
            rule: default_rule(),
            children: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: QuestionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_rule(mut self, rule: &str) -> Self {
        self.rule = rule.to_string();
        self
    }

    pub fn with_options(mut self, options: Vec<AnswerOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_children(mut self, children: Vec<Question>) -> Self {
        self.children = children;
        self
    }

    pub fn with_narrative(mut self, narrative: Narrative) -> Self {
        self.narrative = narrative;
        self
    }

    pub fn with_output_to_variable(mut self, name: &str) -> Self {
        self.output_to_variable = Some(name.to_string());
        self
    }

    pub fn is_variables_output(&self) -> bool {
        matches!(self.kind, QuestionKind::VariablesToOutput { .. })
    }

    pub fn option(&self, id: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Depth-first search of this question and its descendants.
    pub fn find(&self, id: &str) -> Option<&Question> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let q: Question = ron::from_str(r#"(id: "q1")"#).unwrap();
        assert_eq!(q.rule, "true");
        assert_eq!(q.kind, QuestionKind::List);
        assert!(q.children.is_empty());
        assert!(q.options.is_empty());
    }

    #[test]
    fn parse_grouped_question_ron() {
        let input = r#"#![enable(implicit_some)]
        (
            id: "edema",
            prompt: "Edema",
            kind: Grouped(order: AnswerThenQuestion, linking_verb: (singular: "is", plural: "are")),
            narrative: (before: (singular: "Edema:")),
            options: [
                (id: "leg", title: "Leg", children: [(id: "l", title: "Left")], options: []),
            ],
        )"#;
        let q: Question = ron::from_str(input).unwrap();
        match &q.kind {
            QuestionKind::Grouped {
                order,
                linking_verb,
            } => {
                assert_eq!(*order, GroupOrder::AnswerThenQuestion);
                assert_eq!(linking_verb.pick(true), Some("are"));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(q.options[0].children().len(), 1);
    }

    #[test]
    fn find_descends_into_children() {
        let q = Question::new("root", "Root").with_children(vec![
            Question::new("a", "A").with_children(vec![Question::new("b", "B")]),
        ]);
        assert_eq!(q.find("b").map(|q| q.prompt.as_str()), Some("B"));
        assert!(q.find("zzz").is_none());
    }
}
