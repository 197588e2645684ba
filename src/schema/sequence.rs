/// Question forests and their loading from content files.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::question::Question;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An ordered forest of root questions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionsSequence {
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuestionsSequence {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Load a sequence, picking the format from the file extension
    /// (`.json` is JSON, anything else is RON).
    pub fn load(path: &Path) -> Result<QuestionsSequence, SequenceError> {
        let contents = std::fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::parse_json(&contents)
        } else {
            Self::parse_ron(&contents)
        }
    }

    pub fn parse_ron(input: &str) -> Result<QuestionsSequence, SequenceError> {
        Ok(ron::from_str(input)?)
    }

    pub fn parse_json(input: &str) -> Result<QuestionsSequence, SequenceError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Recursive lookup by id across the whole forest.
    pub fn find(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find_map(|q| q.find(id))
    }

    /// The question whose `children` contain `id`. `None` for roots and
    /// unknown ids.
    pub fn parent_of(&self, id: &str) -> Option<&Question> {
        fn search<'a>(nodes: &'a [Question], id: &str) -> Option<&'a Question> {
            for node in nodes {
                if node.children.iter().any(|c| c.id == id) {
                    return Some(node);
                }
                if let Some(found) = search(&node.children, id) {
                    return Some(found);
                }
            }
            None
        }
        search(&self.questions, id)
    }
}

/// Load a single shared question sub-tree from a RON or JSON file.
pub fn load_question(path: &Path) -> Result<Question, SequenceError> {
    let contents = std::fs::read_to_string(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("json") {
        Ok(serde_json::from_str(&contents)?)
    } else {
        Ok(ron::from_str(&contents)?)
    }
}
