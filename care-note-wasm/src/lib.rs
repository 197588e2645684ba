//! WASM bindings for care-note-engine: drives a questionnaire session
//! from a web page.

use wasm_bindgen::prelude::*;

use care_note_engine::core::pipeline::NarrativeEngine;
use care_note_engine::core::session::Session;
use care_note_engine::schema::answer::Answer;
use care_note_engine::schema::option::{AnswerOption, OptionKind};
use care_note_engine::schema::question::{Question, QuestionKind};
use care_note_engine::schema::sequence::QuestionsSequence;
use care_note_engine::schema::settings::GlobalSettings;

// ---------------------------------------------------------------------------
// Bundled wound-care content, compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const WOUND_CARE_SEQUENCE: &str =
        include_str!("../../content_data/wound_care/sequence.ron");
    pub const ADDITIONAL_WOUND: &str =
        include_str!("../../content_data/shared/additional_wound.ron");
    pub const SETTINGS: &str = include_str!("../../content_data/settings.ron");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct OptionView {
    id: String,
    title: String,
    kind: &'static str,
    items: Vec<OptionView>,
    qualifiers: Vec<OptionView>,
}

#[derive(serde::Serialize)]
struct QuestionView {
    id: String,
    prompt: String,
    kind: &'static str,
    options: Vec<OptionView>,
}

#[derive(serde::Deserialize)]
struct GroupedPick {
    item: String,
    qualifier: String,
}

fn kind_label(kind: &OptionKind) -> &'static str {
    match kind {
        OptionKind::Text { .. } => "text",
        OptionKind::None { .. } => "none",
        OptionKind::Size { .. } => "size",
        OptionKind::Repetitive { .. } => "repetitive",
        OptionKind::Polygon { .. } => "polygon",
        OptionKind::Grouped { .. } => "grouped",
        OptionKind::GroupedOverride { .. } => "grouped_override",
    }
}

fn question_label(kind: &QuestionKind) -> &'static str {
    match kind {
        QuestionKind::List => "list",
        QuestionKind::Size => "size",
        QuestionKind::DateTime => "date_time",
        QuestionKind::Image => "image",
        QuestionKind::Grouped { .. } => "grouped",
        QuestionKind::GroupedOverride => "grouped_override",
        QuestionKind::VariablesToOutput { .. } => "variables_to_output",
    }
}

fn option_view(option: &AnswerOption) -> OptionView {
    let (items, qualifiers) = match &option.kind {
        OptionKind::Grouped {
            children, options, ..
        } => (
            children.iter().map(option_view).collect(),
            options.iter().map(option_view).collect(),
        ),
        OptionKind::GroupedOverride { children, .. } => {
            (children.iter().map(option_view).collect(), Vec::new())
        }
        _ => (Vec::new(), Vec::new()),
    };
    OptionView {
        id: option.id.clone(),
        title: option.title().to_string(),
        kind: kind_label(&option.kind),
        items,
        qualifiers,
    }
}

fn question_view(question: &Question) -> QuestionView {
    QuestionView {
        id: question.id.clone(),
        prompt: question.prompt.clone(),
        kind: question_label(&question.kind),
        options: question.options.iter().map(option_view).collect(),
    }
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

// ---------------------------------------------------------------------------
// Session handle
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct CareNoteSession {
    engine: NarrativeEngine,
    session: Session,
}

#[wasm_bindgen]
impl CareNoteSession {
    /// Start a session over the bundled wound-care content.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<CareNoteSession, JsError> {
        let sequence = QuestionsSequence::parse_ron(data::WOUND_CARE_SEQUENCE)
            .map_err(|e| js_err("Sequence parse error", e))?;
        let shared: Question =
            ron::from_str(data::ADDITIONAL_WOUND).map_err(|e| js_err("Shared parse error", e))?;
        let settings: GlobalSettings =
            ron::from_str(data::SETTINGS).map_err(|e| js_err("Settings parse error", e))?;

        let engine = NarrativeEngine::builder()
            .seed(seed)
            .with_sequence(sequence)
            .with_shared(vec![shared])
            .with_settings(settings)
            .build()
            .map_err(|e| js_err("Engine build error", e))?;

        Ok(CareNoteSession {
            engine,
            session: Session::new(),
        })
    }

    /// Start a session over caller-supplied JSON content.
    pub fn from_json(
        sequence_json: &str,
        settings_json: &str,
        shared_json: &str,
        seed: u64,
    ) -> Result<CareNoteSession, JsError> {
        let sequence = QuestionsSequence::parse_json(sequence_json)
            .map_err(|e| js_err("Invalid sequence JSON", e))?;
        let settings: GlobalSettings = serde_json::from_str(settings_json)
            .map_err(|e| js_err("Invalid settings JSON", e))?;
        let shared: Vec<Question> =
            serde_json::from_str(shared_json).map_err(|e| js_err("Invalid shared JSON", e))?;

        let engine = NarrativeEngine::builder()
            .seed(seed)
            .with_sequence(sequence)
            .with_shared(shared)
            .with_settings(settings)
            .build()
            .map_err(|e| js_err("Engine build error", e))?;

        Ok(CareNoteSession {
            engine,
            session: Session::new(),
        })
    }

    /// Move to the next question. Returns its JSON view, or an empty
    /// string when the questionnaire is finished.
    pub fn next(&mut self) -> Result<String, JsError> {
        match self.engine.advance(&mut self.session) {
            Some(question) => serde_json::to_string(&question_view(question))
                .map_err(|e| js_err("Serialization error", e)),
            None => Ok(String::new()),
        }
    }

    /// Answer the current question by option ids (JSON array of strings).
    pub fn answer(&mut self, option_ids_json: &str) -> Result<(), JsError> {
        let ids: Vec<String> = serde_json::from_str(option_ids_json)
            .map_err(|e| js_err("Invalid option ids", e))?;
        let question = self.current_question()?;
        let selected = ids
            .iter()
            .map(|id| {
                question
                    .option(id)
                    .cloned()
                    .ok_or_else(|| JsError::new(&format!("Unknown option: {id}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.record(&question.id, selected);
        Ok(())
    }

    /// Answer a size question with one value per option (JSON array of strings).
    pub fn answer_size(&mut self, values_json: &str) -> Result<(), JsError> {
        let values: Vec<String> =
            serde_json::from_str(values_json).map_err(|e| js_err("Invalid size values", e))?;
        let question = self.current_question()?;
        let selected = question
            .options
            .iter()
            .zip(values)
            .map(|(option, value)| option.with_narrative(value))
            .collect();
        self.record(&question.id, selected);
        Ok(())
    }

    /// Answer a grouped question with `[{"item": id, "qualifier": id}, ...]`.
    pub fn answer_grouped(&mut self, picks_json: &str) -> Result<(), JsError> {
        let picks: Vec<GroupedPick> =
            serde_json::from_str(picks_json).map_err(|e| js_err("Invalid grouped picks", e))?;
        let question = self.current_question()?;
        let mut aggregator = self
            .engine
            .grouped_aggregator(&question.id)
            .ok_or_else(|| JsError::new("Current question is not grouped"))?;

        for pick in &picks {
            let found = question.options.iter().find_map(|root| match &root.kind {
                OptionKind::Grouped {
                    children, options, ..
                } => Some((
                    children.iter().find(|c| c.id == pick.item)?,
                    options.iter().find(|q| q.id == pick.qualifier)?,
                )),
                _ => None,
            });
            let (item, qualifier) = found.ok_or_else(|| {
                JsError::new(&format!("Unknown pick: {}={}", pick.item, pick.qualifier))
            })?;
            aggregator.option_selected(item, qualifier);
        }

        let selected = aggregator
            .next_button_pressed()
            .ok_or_else(|| JsError::new("Nothing selected"))?;
        self.record(&question.id, vec![selected]);
        Ok(())
    }

    /// The formatted note so far.
    pub fn narrative(&self) -> String {
        self.engine.narrative(self.session.answers())
    }

    /// Recorded answers as JSON, for persisting a session.
    pub fn answers_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self.session.answers()).map_err(|e| js_err("Serialization error", e))
    }

    /// Replace the session with previously persisted answers. Answers are
    /// replayed, so shared sub-trees are spliced again; copy ids match the
    /// persisted ones when the session was created with the same seed.
    pub fn restore(&mut self, answers_json: &str) -> Result<(), JsError> {
        let answers: Vec<Answer> =
            serde_json::from_str(answers_json).map_err(|e| js_err("Invalid answers JSON", e))?;
        self.session = self.engine.restore(answers);
        Ok(())
    }
}

impl CareNoteSession {
    fn current_question(&self) -> Result<Question, JsError> {
        self.session
            .current()
            .and_then(|id| self.engine.question(id))
            .cloned()
            .ok_or_else(|| JsError::new("No current question; call next() first"))
    }

    fn record(&mut self, question_id: &str, selected: Vec<AnswerOption>) {
        self.engine.answer(&mut self.session, question_id, selected);
    }
}
