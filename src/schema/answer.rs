use serde::{Deserialize, Serialize};

use super::option::AnswerOption;

/// The recorded selection for one question. Answers are kept in a flat
/// list; tree position is implied by `question_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub selected: Vec<AnswerOption>,
}

impl Answer {
    pub fn new(question_id: &str, selected: Vec<AnswerOption>) -> Self {
        Self {
            question_id: question_id.to_string(),
            selected,
        }
    }

    pub fn first(&self) -> Option<&AnswerOption> {
        self.selected.first()
    }

    pub fn is_selected(&self, option_id: &str) -> bool {
        self.selected.iter().any(|o| o.id == option_id)
    }

    /// True when the leading selection is a "none of the above" option.
    pub fn starts_with_none(&self) -> bool {
        self.first().is_some_and(AnswerOption::is_none)
    }
}

/// The answer recorded for `question_id`, if any.
pub fn answer_for<'a>(answers: &'a [Answer], question_id: &str) -> Option<&'a Answer> {
    answers.iter().find(|a| a.question_id == question_id)
}

pub fn is_answered(answers: &[Answer], question_id: &str) -> bool {
    answer_for(answers, question_id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_question_id() {
        let answers = vec![
            Answer::new("q1", vec![AnswerOption::text("a", "red")]),
            Answer::new("q2", vec![AnswerOption::none("n", "none")]),
        ];
        assert!(is_answered(&answers, "q1"));
        assert!(!is_answered(&answers, "q3"));
        assert!(answer_for(&answers, "q1").unwrap().is_selected("a"));
        assert!(answer_for(&answers, "q2").unwrap().starts_with_none());
        assert!(!answer_for(&answers, "q1").unwrap().starts_with_none());
    }
}
