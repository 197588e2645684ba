/// Question tree navigation: which question to ask next.
///
/// Children come before siblings. A child is eligible when it has not been
/// answered, its rule passes, and it is not a variables-to-output
/// pseudo-question (unless those are requested). When a question has no
/// eligible child the search climbs to its parent and repeats.
use rustc_hash::FxHashMap;

use crate::core::rule::can_show;
use crate::core::tree::{IdMinter, QuestionTree};
use crate::schema::answer::{answer_for, is_answered, Answer};
use crate::schema::option::OptionKind;
use crate::schema::question::Question;

pub struct Navigator<'t> {
    tree: &'t QuestionTree,
    ignore_variable_questions: bool,
}

impl<'t> Navigator<'t> {
    pub fn new(tree: &'t QuestionTree, ignore_variable_questions: bool) -> Self {
        Self {
            tree,
            ignore_variable_questions,
        }
    }

    fn eligible(&self, question: &Question, answers: &[Answer]) -> bool {
        if is_answered(answers, &question.id) {
            return false;
        }
        if self.ignore_variable_questions && question.is_variables_output() {
            return false;
        }
        can_show(question, answers)
    }

    /// The next question after `current_id`, or `None` at the end of the
    /// sub-tree rooted at `current_id`'s root.
    pub fn next_question(&self, current_id: &str, answers: &[Answer]) -> Option<&'t Question> {
        let Some(mut current) = self.tree.node_id(current_id) else {
            tracing::warn!(question = current_id, "next question requested for unknown id");
            return None;
        };

        loop {
            let node = self.tree.node(current);
            for &child in &node.children {
                let question = &self.tree.node(child).question;
                if self.eligible(question, answers) {
                    tracing::debug!(from = current_id, next = %question.id, "next question");
                    return Some(question);
                }
            }
            current = node.parent?;
        }
    }

    /// The first root question not yet answered. Used to start or resume.
    pub fn find_next_root_question(&self, answers: &[Answer]) -> Option<&'t Question> {
        self.tree.roots().find(|q| {
            !is_answered(answers, &q.id)
                && !(self.ignore_variable_questions && q.is_variables_output())
        })
    }

    /// A fresh copy of the shared sub-tree `id`, looked up in the forest
    /// first and then in `library`.
    pub fn find_repetitive_question(
        &self,
        id: &str,
        library: &FxHashMap<String, Question>,
        minter: &mut IdMinter,
    ) -> Option<Question> {
        let source = self.tree.subtree(id).or_else(|| library.get(id).cloned());
        match source {
            Some(source) => Some(self.tree.reusable_copy(&source, minter)),
            None => {
                tracing::warn!(repetitive_id = id, "shared sub-tree not found");
                None
            }
        }
    }
}

/// The shared sub-tree id requested by the answer to `question`, when its
/// first selected option is repetitive.
pub fn check_is_repetitive(question: &Question, answers: &[Answer]) -> Option<String> {
    let answer = answer_for(answers, &question.id)?;
    match &answer.first()?.kind {
        OptionKind::Repetitive { id, .. } => Some(id.clone()),
        _ => None,
    }
}
