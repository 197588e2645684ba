/// Step-by-step answering state for one user session.
use serde::{Deserialize, Serialize};

use crate::core::navigator::Navigator;
use crate::schema::answer::{answer_for, Answer};
use crate::schema::option::AnswerOption;
use crate::schema::question::Question;

/// Answers collected so far plus the question on screen. One answer per
/// question id; answering again replaces the earlier answer in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    answers: Vec<Answer>,
    current: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from previously stored answers.
    pub fn resume(answers: Vec<Answer>) -> Self {
        Self {
            answers,
            current: None,
        }
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn answer(&self, question_id: &str) -> Option<&Answer> {
        answer_for(&self.answers, question_id)
    }

    pub fn record(&mut self, question_id: &str, selected: Vec<AnswerOption>) {
        match self.answers.iter_mut().find(|a| a.question_id == question_id) {
            Some(existing) => existing.selected = selected,
            None => self.answers.push(Answer::new(question_id, selected)),
        }
        self.current = Some(question_id.to_string());
    }

    pub fn remove(&mut self, question_id: &str) {
        self.answers.retain(|a| a.question_id != question_id);
    }

    /// Move to the next question: the next one below or after the current
    /// question, else the first unanswered root.
    pub fn advance<'t>(&mut self, navigator: &Navigator<'t>) -> Option<&'t Question> {
        let next = self
            .current
            .as_deref()
            .and_then(|current| navigator.next_question(current, &self.answers))
            .or_else(|| navigator.find_next_root_question(&self.answers));
        self.current = next.map(|q| q.id.clone());
        next
    }
}
