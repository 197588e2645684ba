/// Wound Note example: a scripted wound-care visit using the bundled content.
///
/// One pressure injury, an additional wound added through the shared
/// sub-tree, bilateral leg edema, and signs of infection.
///
/// Run with: cargo run --example wound_note

use care_note_engine::core::pipeline::NarrativeEngine;
use care_note_engine::core::session::Session;
use care_note_engine::schema::option::{AnswerOption, OptionKind};

fn pick(engine: &NarrativeEngine, question_id: &str, option_ids: &[&str]) -> Vec<AnswerOption> {
    let question = engine
        .question(question_id)
        .expect("question missing from content");
    option_ids
        .iter()
        .filter_map(|id| question.option(id).cloned())
        .collect()
}

fn main() {
    let mut engine = NarrativeEngine::builder()
        .sequence_path("content_data/wound_care/sequence.ron")
        .settings_path("content_data/settings.ron")
        .shared_dir("content_data/shared")
        .config_path("content_data/engine.ron")
        .build()
        .expect("Failed to load wound care content");

    let mut session = Session::new();

    // --- Scripted answers, keyed by question id prefix ---
    while let Some(question) = engine.advance(&mut session).cloned() {
        let selected = match question.id.split('~').next().unwrap_or_default() {
            "wound" => pick(&engine, &question.id, &["wound-yes"]),
            "site" => pick(&engine, &question.id, &["site-sacrum"]),
            "stage" => pick(&engine, &question.id, &["stage-3"]),
            "tunneling" => pick(&engine, &question.id, &["tunneling-present"]),
            "size" => question
                .options
                .iter()
                .zip(["4.5 cm", "by", "3 cm"])
                .map(|(option, value)| option.with_narrative(value.to_string()))
                .collect(),
            "drainage" => pick(&engine, &question.id, &["drainage-purulent"]),
            "another" => pick(&engine, &question.id, &["another-add"]),
            "additional-wound" => pick(&engine, &question.id, &["additional-coccyx"]),
            "additional-stage" => pick(&engine, &question.id, &["additional-stage-1"]),
            "edema" => {
                let mut aggregator = engine
                    .grouped_aggregator(&question.id)
                    .expect("edema is grouped");
                let leg = &question.options[0];
                if let OptionKind::Grouped { children, options, .. } = &leg.kind {
                    aggregator.option_selected(&children[0], &options[1]);
                    aggregator.option_selected(&children[1], &options[2]);
                }
                aggregator.next_button_pressed().into_iter().collect()
            }
            "infection" => pick(&engine, &question.id, &["infection-warmth", "infection-erythema"]),
            _ => Vec::new(),
        };

        println!("[{}] {}", question.id, question.prompt);
        for option in &selected {
            println!("    -> {}", option.title());
        }
        engine.answer(&mut session, &question.id, selected);
    }

    println!("\n--- Note ---\n");
    println!("{}", engine.narrative(session.answers()));
}
