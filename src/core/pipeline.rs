/// The engine: content loading and the public entry points.
///
/// Wires together the question tree, rule evaluation, navigation,
/// repetitive sub-tree insertion, grouped aggregation, and narrative
/// generation behind one builder-constructed value.
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::formatter::SentenceFormatter;
use crate::core::grouped::GroupedAggregator;
use crate::core::narrative::{get_narrative, NarrativeGenerator};
use crate::core::navigator::{check_is_repetitive, Navigator};
use crate::core::rule::can_show;
use crate::core::session::Session;
use crate::core::tree::{IdMinter, QuestionTree, TreeError};
use crate::schema::answer::Answer;
use crate::schema::option::AnswerOption;
use crate::schema::question::{Question, QuestionKind};
use crate::schema::sequence::{load_question, QuestionsSequence, SequenceError};
use crate::schema::settings::GlobalSettings;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("content error: {0}")]
    Sequence(#[from] SequenceError),
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Per-session settings, assembled once by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Skip variables-to-output pseudo-questions while navigating.
    pub ignore_variable_questions: bool,
    /// Separator the capitalization pass splits sentences on.
    pub sentence_separator: String,
    /// Characters whose consecutive runs collapse to one.
    pub collapse_chars: Vec<char>,
    /// Seed for ids given to reusable sub-tree copies.
    pub id_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ignore_variable_questions: true,
            sentence_separator: ". ".to_string(),
            collapse_chars: vec![' ', '.'],
            id_seed: 0,
        }
    }
}

/// The top-level engine. Built via `NarrativeEngine::builder()`.
#[derive(Debug)]
pub struct NarrativeEngine {
    tree: QuestionTree,
    shared: FxHashMap<String, Question>,
    settings: GlobalSettings,
    config: EngineConfig,
    formatter: SentenceFormatter,
    minter: IdMinter,
    /// Question id to the shared sub-tree its answer asked for and the id
    /// of the copy spliced under it.
    expanded: FxHashMap<String, (String, String)>,
}

/// Builder for constructing a `NarrativeEngine`.
pub struct NarrativeEngineBuilder {
    sequence_path: Option<String>,
    settings_path: Option<String>,
    shared_dir: Option<String>,
    config_path: Option<String>,
    seed: Option<u64>,
    /// Directly provided content (for testing without files).
    sequence: Option<QuestionsSequence>,
    settings: Option<GlobalSettings>,
    shared: Option<FxHashMap<String, Question>>,
    config: Option<EngineConfig>,
}

impl NarrativeEngine {
    pub fn builder() -> NarrativeEngineBuilder {
        NarrativeEngineBuilder {
            sequence_path: None,
            settings_path: None,
            shared_dir: None,
            config_path: None,
            seed: None,
            sequence: None,
            settings: None,
            shared: None,
            config: None,
        }
    }

    pub fn tree(&self) -> &QuestionTree {
        &self.tree
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The current forest, spliced sub-trees included.
    pub fn sequence(&self) -> QuestionsSequence {
        self.tree.to_sequence()
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.tree.get(question_id)
    }

    pub fn navigator(&self) -> Navigator<'_> {
        Navigator::new(&self.tree, self.config.ignore_variable_questions)
    }

    pub fn next_question(&self, current_id: &str, answers: &[Answer]) -> Option<&Question> {
        self.navigator().next_question(current_id, answers)
    }

    pub fn find_next_root_question(&self, answers: &[Answer]) -> Option<&Question> {
        self.navigator().find_next_root_question(answers)
    }

    /// Visibility of one question outside strict navigation. Unknown ids
    /// are hidden.
    pub fn can_show_question(&self, question_id: &str, answers: &[Answer]) -> bool {
        self.tree
            .get(question_id)
            .is_some_and(|q| can_show(q, answers))
    }

    pub fn check_is_repetitive(&self, question_id: &str, answers: &[Answer]) -> Option<String> {
        check_is_repetitive(self.tree.get(question_id)?, answers)
    }

    /// A freshly id-rewritten copy of shared sub-tree `id`.
    pub fn find_repetitive_question(&mut self, id: &str) -> Option<Question> {
        Navigator::new(&self.tree, self.config.ignore_variable_questions).find_repetitive_question(
            id,
            &self.shared,
            &mut self.minter,
        )
    }

    /// If the answer to `question_id` asks for a shared sub-tree, splice a
    /// fresh copy under it and return the copy's id.
    pub fn expand_repetitive(&mut self, question_id: &str, answers: &[Answer]) -> Option<String> {
        let shared_id = self.check_is_repetitive(question_id, answers)?;
        let copy = self.find_repetitive_question(&shared_id)?;
        match self.tree.splice(question_id, copy) {
            Ok(node) => Some(self.tree.node(node).question.id.clone()),
            Err(e) => {
                tracing::warn!(question = question_id, error = %e, "could not insert shared sub-tree");
                None
            }
        }
    }

    /// Aggregator for a grouped question; `None` for any other kind.
    pub fn grouped_aggregator(&self, question_id: &str) -> Option<GroupedAggregator> {
        let question = self.tree.get(question_id)?;
        match question.kind {
            QuestionKind::Grouped { .. } | QuestionKind::GroupedOverride => {
                Some(GroupedAggregator::new(question))
            }
            _ => None,
        }
    }

    /// Record an answer and keep the question's shared sub-tree in step
    /// with it. A question holds at most one spliced copy: answering the
    /// same repetitive option again keeps it, any other answer removes it
    /// along with the answers given inside it.
    pub fn answer(&mut self, session: &mut Session, question_id: &str, selected: Vec<AnswerOption>) {
        session.record(question_id, selected);
        let wanted = self.check_is_repetitive(question_id, session.answers());

        if let Some((shared_id, copy_id)) = self.expanded.get(question_id).cloned() {
            if wanted.as_ref() == Some(&shared_id) && self.tree.contains(&copy_id) {
                return;
            }
            self.collapse(session, question_id, &copy_id);
        }

        if let Some(shared_id) = wanted {
            if let Some(inserted) = self.expand_repetitive(question_id, session.answers()) {
                tracing::debug!(question = question_id, inserted = %inserted, "repetitive sub-tree added");
                self.expanded.insert(question_id.to_string(), (shared_id, inserted));
            }
        }
    }

    fn collapse(&mut self, session: &mut Session, question_id: &str, copy_id: &str) {
        self.expanded.remove(question_id);
        match self.tree.remove(copy_id) {
            Ok(removed) => {
                for id in &removed {
                    session.remove(id);
                    self.expanded.remove(id);
                }
                tracing::debug!(question = question_id, removed = removed.len(), "repetitive sub-tree dropped");
            }
            Err(e) => tracing::warn!(question = question_id, error = %e, "could not drop shared sub-tree"),
        }
    }

    /// Rebuild a session from persisted answers. Spliced copies are dropped,
    /// the id minter is reseeded, and the answers are replayed in order, so
    /// an engine with the same seed recreates the same copy ids. Answers
    /// for questions that do not exist after the replay are dropped.
    pub fn restore(&mut self, answers: Vec<Answer>) -> Session {
        let copies: Vec<String> = self.expanded.drain().map(|(_, (_, copy))| copy).collect();
        for copy in copies {
            if self.tree.contains(&copy) {
                if let Err(e) = self.tree.remove(&copy) {
                    tracing::warn!(question = %copy, error = %e, "could not drop shared sub-tree");
                }
            }
        }
        self.minter = IdMinter::new(self.config.id_seed);

        let mut replayed = Session::new();
        for answer in answers {
            if !self.tree.contains(&answer.question_id) {
                tracing::warn!(question = %answer.question_id, "restored answer has no question; dropped");
                continue;
            }
            self.answer(&mut replayed, &answer.question_id, answer.selected);
        }
        Session::resume(replayed.answers().to_vec())
    }

    pub fn advance(&self, session: &mut Session) -> Option<&Question> {
        session.advance(&self.navigator())
    }

    /// The finished note for `answers`.
    pub fn narrative(&self, answers: &[Answer]) -> String {
        get_narrative(&self.tree, answers, &self.settings, &self.formatter)
    }

    /// The note before replacements and formatting.
    pub fn raw_narrative(&self, answers: &[Answer]) -> String {
        NarrativeGenerator::new(&self.tree, answers).generate()
    }
}

impl NarrativeEngineBuilder {
    pub fn sequence_path(mut self, path: &str) -> Self {
        self.sequence_path = Some(path.to_string());
        self
    }

    pub fn settings_path(mut self, path: &str) -> Self {
        self.settings_path = Some(path.to_string());
        self
    }

    pub fn shared_dir(mut self, path: &str) -> Self {
        self.shared_dir = Some(path.to_string());
        self
    }

    pub fn config_path(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Overrides `EngineConfig::id_seed`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Provide the question forest directly (for testing without files).
    pub fn with_sequence(mut self, sequence: QuestionsSequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Provide global settings directly (for testing without files).
    pub fn with_settings(mut self, settings: GlobalSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Provide shared sub-trees directly (for testing without files).
    pub fn with_shared(mut self, shared: Vec<Question>) -> Self {
        self.shared = Some(shared.into_iter().map(|q| (q.id.clone(), q)).collect());
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<NarrativeEngine, PipelineError> {
        let mut config = match (self.config, &self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) if Path::new(path).exists() => {
                ron::from_str(&std::fs::read_to_string(path)?)?
            }
            _ => EngineConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.id_seed = seed;
        }

        let sequence = match (self.sequence, &self.sequence_path) {
            (Some(sequence), _) => sequence,
            (None, Some(path)) if Path::new(path).exists() => QuestionsSequence::load(Path::new(path))?,
            (None, Some(path)) => {
                tracing::warn!(path = %path, "sequence file not found; starting empty");
                QuestionsSequence::default()
            }
            (None, None) => QuestionsSequence::default(),
        };

        let settings = match (self.settings, &self.settings_path) {
            (Some(settings), _) => settings,
            (None, Some(path)) if Path::new(path).exists() => GlobalSettings::load(Path::new(path))?,
            _ => GlobalSettings::default(),
        };

        let mut shared = self.shared.unwrap_or_default();
        if let Some(ref dir) = self.shared_dir {
            if Path::new(dir).exists() {
                load_content_files_from_dir(dir, |path| {
                    let question = load_question(path)?;
                    shared.insert(question.id.clone(), question);
                    Ok(())
                })?;
            }
        }

        let tree = QuestionTree::from_sequence(sequence)?;
        tracing::debug!(questions = tree.len(), shared = shared.len(), "engine built");

        Ok(NarrativeEngine {
            tree,
            shared,
            settings,
            formatter: SentenceFormatter::standard(&config.sentence_separator, &config.collapse_chars),
            minter: IdMinter::new(config.id_seed),
            expanded: FxHashMap::default(),
            config,
        })
    }
}

/// Load all .ron and .json files from a directory, calling `loader` for each.
fn load_content_files_from_dir<F>(dir: &str, mut loader: F) -> Result<(), PipelineError>
where
    F: FnMut(&Path) -> Result<(), PipelineError>,
{
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    paths.sort();
    for path in paths {
        if matches!(path.extension().and_then(|s| s.to_str()), Some("ron") | Some("json")) {
            loader(&path)?;
        }
    }
    Ok(())
}
