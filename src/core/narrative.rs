/// Narrative generation: walks the question tree in document order and
/// turns the answer set into note text.
use rustc_hash::FxHashMap;

use crate::core::formatter::SentenceFormatter;
use crate::core::tree::{NodeId, QuestionTree};
use crate::schema::answer::Answer;
use crate::schema::question::{Question, QuestionKind};
use crate::schema::settings::GlobalSettings;

/// Append `fragment`, separated by one space unless the fragment is bare
/// punctuation or the target is still empty.
pub fn append_fragment(target: &mut String, fragment: &str) {
    if fragment.is_empty() {
        return;
    }
    if !target.is_empty() && !matches!(fragment, "." | "," | ":") {
        target.push(' ');
    }
    target.push_str(fragment);
}

/// Join as a natural list: "A", "A and B", "A, B and C". Empty entries
/// are skipped.
pub fn compound_join(items: &[&str]) -> String {
    let items: Vec<&str> = items.iter().copied().filter(|s| !s.is_empty()).collect();
    match items.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// One tree walk over one answer set. Variable buffers live only for the
/// duration of the walk.
pub struct NarrativeGenerator<'a> {
    tree: &'a QuestionTree,
    answers: FxHashMap<&'a str, &'a Answer>,
    variables: FxHashMap<String, String>,
    text: String,
}

impl<'a> NarrativeGenerator<'a> {
    pub fn new(tree: &'a QuestionTree, answers: &'a [Answer]) -> Self {
        let mut index = FxHashMap::default();
        for answer in answers {
            index.entry(answer.question_id.as_str()).or_insert(answer);
        }
        Self {
            tree,
            answers: index,
            variables: FxHashMap::default(),
            text: String::new(),
        }
    }

    /// The raw note text, before replacements and formatting.
    pub fn generate(mut self) -> String {
        let tree = self.tree;
        for &root in tree.root_ids() {
            self.visit(root);
        }
        self.text
    }

    fn visit(&mut self, id: NodeId) {
        let tree = self.tree;
        let node = tree.node(id);
        let question = &node.question;
        let answer = self.answers.get(question.id.as_str()).copied();

        if let QuestionKind::VariablesToOutput { names } = &question.kind {
            for name in names {
                let value = self.variables.get(name).cloned().unwrap_or_default();
                append_fragment(&mut self.text, &value);
            }
        } else if let Some(answer) = answer {
            self.narrate_answer(question, answer);
        }

        for &child in &node.children {
            self.visit(child);
        }

        if let (Some(literal), Some(_)) = (&question.narrative.after_children, answer) {
            append_fragment(&mut self.text, literal);
        }
    }

    fn narrate_answer(&mut self, question: &Question, answer: &Answer) {
        let mut buffer = String::new();
        let sink = if question.output_to_variable.is_some() {
            &mut buffer
        } else {
            &mut self.text
        };

        let plural = answer.selected.len() > 1;
        let leads_with_none = answer.starts_with_none();

        if !leads_with_none {
            if let Some(before) = question.narrative.before.as_ref().and_then(|f| f.pick(plural)) {
                append_fragment(sink, before);
            }
        }

        let narratives: Vec<&str> = answer.selected.iter().map(|o| o.narrative.as_str()).collect();
        let body = match question.kind {
            QuestionKind::Size => narratives
                .iter()
                .copied()
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            _ => compound_join(&narratives),
        };
        append_fragment(sink, &body);

        if !leads_with_none {
            if let Some(after) = question.narrative.after.as_ref().and_then(|f| f.pick(plural)) {
                append_fragment(sink, after);
            }
        }

        if let Some(name) = &question.output_to_variable {
            self.variables.insert(name.clone(), buffer);
        }
    }
}

/// The finished note: tree walk, then the replacement table, then the
/// sentence formatter.
pub fn get_narrative(
    tree: &QuestionTree,
    answers: &[Answer],
    settings: &GlobalSettings,
    formatter: &SentenceFormatter,
) -> String {
    let raw = NarrativeGenerator::new(tree, answers).generate();
    let replaced = settings.apply_replacements(&raw);
    formatter.format(&replaced)
}
