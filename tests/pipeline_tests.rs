/// Pipeline integration tests: bundled wound-care content from first
/// question to finished note.

use care_note_engine::core::pipeline::{EngineConfig, NarrativeEngine};
use care_note_engine::core::session::Session;
use care_note_engine::schema::option::{AnswerOption, OptionKind};
use care_note_engine::schema::sequence::QuestionsSequence;

fn load_engine() -> NarrativeEngine {
    NarrativeEngine::builder()
        .sequence_path("content_data/wound_care/sequence.ron")
        .settings_path("content_data/settings.ron")
        .shared_dir("content_data/shared")
        .config_path("content_data/engine.ron")
        .build()
        .unwrap()
}

fn pick(engine: &NarrativeEngine, question_id: &str, option_ids: &[&str]) -> Vec<AnswerOption> {
    let question = engine.question(question_id).unwrap();
    option_ids
        .iter()
        .map(|id| question.option(id).unwrap().clone())
        .collect()
}

fn size_answer(engine: &NarrativeEngine) -> Vec<AnswerOption> {
    let question = engine.question("size").unwrap();
    [("size-length", "3 cm"), ("size-by", "by"), ("size-width", "2 cm")]
        .iter()
        .map(|(id, value)| question.option(id).unwrap().with_narrative(value.to_string()))
        .collect()
}

fn swollen_legs(engine: &NarrativeEngine) -> AnswerOption {
    let mut aggregator = engine.grouped_aggregator("edema").unwrap();
    let leg = aggregator.question().options[0].clone();
    let OptionKind::Grouped { options, .. } = &leg.kind else {
        panic!("expected grouped root, got {:?}", leg.kind);
    };
    for item in leg.children() {
        aggregator.option_selected(item, &options[0]);
    }
    aggregator.next_button_pressed().unwrap()
}

#[test]
fn content_loads_with_config() {
    let engine = load_engine();
    assert_eq!(engine.config().id_seed, 7);
    assert_eq!(engine.settings().pronunciations.len(), 2);
    assert!(engine.tree().contains("tunneling"));
    assert!(!engine.tree().contains("additional-wound"));

    let roots: Vec<&str> = engine.tree().roots().map(|q| q.id.as_str()).collect();
    assert_eq!(roots, vec!["wound", "edema", "infection"]);
}

#[test]
fn full_session_walk_and_note() {
    let mut engine = load_engine();
    let mut session = Session::new();
    let mut asked = Vec::new();

    while let Some(question) = engine.advance(&mut session) {
        let id = question.id.clone();
        asked.push(id.clone());
        let selected = match id.as_str() {
            "wound" => pick(&engine, "wound", &["wound-yes"]),
            "site" => pick(&engine, "site", &["site-sacrum"]),
            "stage" => pick(&engine, "stage", &["stage-3"]),
            "tunneling" => pick(&engine, "tunneling", &["tunneling-none"]),
            "size" => size_answer(&engine),
            "drainage" => pick(&engine, "drainage", &["drainage-serous"]),
            "another" => pick(&engine, "another", &["another-done"]),
            "edema" => vec![swollen_legs(&engine)],
            "infection" => pick(&engine, "infection", &["infection-warmth", "infection-odor"]),
            other => panic!("unexpected question {}", other),
        };
        engine.answer(&mut session, &id, selected);
    }

    assert_eq!(
        asked,
        vec!["wound", "site", "stage", "tunneling", "size", "drainage", "another", "edema", "infection"]
    );
    assert_eq!(
        engine.narrative(session.answers()),
        "Patient has a pressure injury on the sacrum classified as stage III without tunneling \
         with serous drainage measuring 3 cm by 2 cm. The left and right legs are swollen. \
         Signs of infection include warmth and odor."
    );
}

#[test]
fn no_wound_skips_wound_branch() {
    let mut engine = load_engine();
    let mut session = Session::new();

    let first = engine.advance(&mut session).unwrap().id.clone();
    assert_eq!(first, "wound");
    engine.answer(&mut session, "wound", pick(&engine, "wound", &["wound-no"]));

    assert_eq!(engine.advance(&mut session).unwrap().id, "edema");
    engine.answer(&mut session, "edema", vec![swollen_legs(&engine)]);
    assert_eq!(engine.advance(&mut session).unwrap().id, "infection");
    engine.answer(&mut session, "infection", pick(&engine, "infection", &["infection-none"]));
    assert!(engine.advance(&mut session).is_none());

    assert_eq!(
        engine.narrative(session.answers()),
        "No wounds noted. The left and right legs are swollen. No signs of infection."
    );
}

#[test]
fn stage_two_hides_tunneling() {
    let engine = load_engine();
    let mut session = Session::new();
    session.record("wound", pick(&engine, "wound", &["wound-yes"]));
    session.record("site", pick(&engine, "site", &["site-left-heel"]));
    session.record("stage", pick(&engine, "stage", &["stage-2"]));
    assert!(!engine.can_show_question("tunneling", session.answers()));
    assert_eq!(engine.advance(&mut session).unwrap().id, "size");
}

#[test]
fn additional_wound_is_spliced_and_narrated() {
    let mut engine = load_engine();
    let mut session = Session::new();
    engine.answer(&mut session, "wound", pick(&engine, "wound", &["wound-yes"]));
    engine.answer(&mut session, "site", pick(&engine, "site", &["site-sacrum"]));
    engine.answer(&mut session, "stage", pick(&engine, "stage", &["stage-3"]));
    engine.answer(&mut session, "tunneling", pick(&engine, "tunneling", &["tunneling-none"]));
    engine.answer(&mut session, "size", size_answer(&engine));
    engine.answer(&mut session, "drainage", pick(&engine, "drainage", &["drainage-serous"]));
    engine.answer(&mut session, "another", pick(&engine, "another", &["another-add"]));

    let copy_id = engine.advance(&mut session).unwrap().id.clone();
    assert!(copy_id.starts_with("additional-wound~"));
    engine.answer(&mut session, &copy_id, pick(&engine, &copy_id, &["additional-elbow"]));

    let stage_id = engine.advance(&mut session).unwrap().id.clone();
    assert!(stage_id.starts_with("additional-stage~"));
    engine.answer(&mut session, &stage_id, pick(&engine, &stage_id, &["additional-stage-2"]));

    assert_eq!(engine.advance(&mut session).unwrap().id, "edema");
    assert_eq!(
        engine.narrative(session.answers()),
        "Patient has a pressure injury on the sacrum classified as stage III without tunneling \
         with serous drainage measuring 3 cm by 2 cm; an additional wound is present on the \
         elbow at stage II."
    );

    let exported = QuestionsSequence::parse_ron(&engine.sequence().to_ron().unwrap()).unwrap();
    assert_eq!(exported.parent_of(&copy_id).unwrap().id, "another");
    assert_eq!(exported.parent_of(&stage_id).unwrap().id, copy_id);
}

#[test]
fn two_copies_get_distinct_ids() {
    let mut engine = load_engine();
    let mut session = Session::new();
    engine.answer(&mut session, "wound", pick(&engine, "wound", &["wound-yes"]));
    let first = engine.find_repetitive_question("additional-wound").unwrap();
    let second = engine.find_repetitive_question("additional-wound").unwrap();
    assert_ne!(first.id, second.id);
    assert!(engine.find_repetitive_question("unknown").is_none());
}

#[test]
fn same_seed_same_ids() {
    let copy_id = || {
        let mut engine = load_engine();
        engine.find_repetitive_question("additional-wound").unwrap().id
    };
    assert_eq!(copy_id(), copy_id());
}

#[test]
fn session_survives_json_round_trip() {
    let engine = load_engine();
    let mut session = Session::new();
    session.record("wound", pick(&engine, "wound", &["wound-yes"]));
    session.record("size", size_answer(&engine));
    session.record("edema", vec![swollen_legs(&engine)]);

    let json = serde_json::to_string(&session).unwrap();
    let restored: Session = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.current(), Some("edema"));
    assert_eq!(
        engine.narrative(restored.answers()),
        engine.narrative(session.answers())
    );
}

#[test]
fn custom_config_keeps_variable_questions() {
    let engine = NarrativeEngine::builder()
        .sequence_path("content_data/wound_care/sequence.ron")
        .with_config(EngineConfig {
            ignore_variable_questions: false,
            ..EngineConfig::default()
        })
        .build()
        .unwrap();

    let answers = pick(&engine, "wound", &["wound-yes"]);
    let mut session = Session::new();
    session.record("wound", answers);
    for id in ["site", "stage", "size", "drainage"] {
        session.record(id, Vec::new());
    }
    assert_eq!(
        engine.next_question("drainage", session.answers()).unwrap().id,
        "size-output"
    );
}

#[test]
fn changing_mind_about_another_wound_drops_it() {
    let mut engine = load_engine();
    let mut session = Session::new();
    engine.answer(&mut session, "wound", pick(&engine, "wound", &["wound-yes"]));
    engine.answer(&mut session, "another", pick(&engine, "another", &["another-add"]));
    engine.answer(&mut session, "another", pick(&engine, "another", &["another-add"]));
    assert_eq!(engine.tree().children("another").len(), 1);

    let copy_id = engine.tree().children("another")[0].id.clone();
    engine.answer(&mut session, &copy_id, pick(&engine, &copy_id, &["additional-elbow"]));

    engine.answer(&mut session, "another", pick(&engine, "another", &["another-done"]));
    assert!(engine.tree().children("another").is_empty());
    assert!(!engine.narrative(session.answers()).contains("elbow"));
    assert!(session.answers().iter().all(|a| a.question_id != copy_id));
    // Back to the unanswered wound questions, not the dropped copy.
    assert_eq!(engine.advance(&mut session).unwrap().id, "site");
}

#[test]
fn restored_answers_bring_their_copies_back() {
    let mut engine = load_engine();
    let mut session = Session::new();
    engine.answer(&mut session, "wound", pick(&engine, "wound", &["wound-yes"]));
    engine.answer(&mut session, "another", pick(&engine, "another", &["another-add"]));
    let copy_id = engine.tree().children("another")[0].id.clone();
    engine.answer(&mut session, &copy_id, pick(&engine, &copy_id, &["additional-elbow"]));

    let json = serde_json::to_string(session.answers()).unwrap();
    let mut fresh = load_engine();
    let restored = fresh.restore(serde_json::from_str(&json).unwrap());
    assert!(fresh.tree().contains(&copy_id));
    assert_eq!(
        fresh.narrative(restored.answers()),
        engine.narrative(session.answers())
    );
}
