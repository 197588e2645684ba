/// Rule Linter: validates every visibility rule in a question sequence.
///
/// Usage: rule_linter <sequence_file> [--shared-dir <dir>] [-v]

use care_note_engine::core::rule::Rule;
use care_note_engine::core::tree::QuestionTree;
use care_note_engine::schema::option::OptionKind;
use care_note_engine::schema::question::Question;
use care_note_engine::schema::sequence::{load_question, QuestionsSequence};
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: rule_linter <sequence_file> [--shared-dir <dir>] [-v]");
        process::exit(0);
    }

    let sequence_file = &args[1];
    let mut shared_dir = None;
    let mut verbose = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--shared-dir" if i + 1 < args.len() => {
                i += 1;
                shared_dir = Some(args[i].clone());
            }
            "-v" | "--verbose" => verbose = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(if verbose { "debug" } else { "warn" }))
        .with_target(false)
        .init();

    let sequence = match QuestionsSequence::load(Path::new(sequence_file)) {
        Ok(sequence) => sequence,
        Err(e) => {
            eprintln!("ERROR: Failed to load sequence file: {}", e);
            process::exit(1);
        }
    };

    let tree = match QuestionTree::from_sequence(sequence) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };
    println!("Loaded {} questions", tree.len());

    let shared = shared_dir.as_deref().map(load_shared).unwrap_or_default();
    if !shared.is_empty() {
        println!("Loaded {} shared sub-trees", shared.len());
    }

    let (errors, warnings) = lint(&tree, &shared);

    println!("\n=== Rule Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_shared(dir: &str) -> Vec<Question> {
    let mut shared = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        eprintln!("  ERROR: cannot read shared dir {}", dir);
        return shared;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !matches!(path.extension().and_then(|s| s.to_str()), Some("ron") | Some("json")) {
            continue;
        }
        match load_question(&path) {
            Ok(question) => {
                println!("  Loaded: {}", path.display());
                shared.push(question);
            }
            Err(e) => eprintln!("  ERROR loading {}: {}", path.display(), e),
        }
    }
    shared
}

fn lint(tree: &QuestionTree, shared: &[Question]) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut questions: Vec<&Question> = tree
        .document_order()
        .into_iter()
        .map(|id| &tree.node(id).question)
        .collect();
    let mut pending: Vec<&Question> = shared.iter().collect();
    while let Some(q) = pending.pop() {
        questions.push(q);
        pending.extend(q.children.iter());
    }

    let find = |id: &str| questions.iter().copied().find(|q| q.id == id);

    for question in &questions {
        match Rule::parse(&question.rule) {
            Ok(rule) => {
                for (qid, oid) in rule.references() {
                    match find(qid) {
                        None => errors.push(format!(
                            "Question '{}' references unknown question '{}'",
                            question.id, qid
                        )),
                        Some(target) if target.option(oid).is_none() => errors.push(format!(
                            "Question '{}' references unknown option '{}' of '{}'",
                            question.id, oid, qid
                        )),
                        Some(_) => {}
                    }
                }
            }
            Err(e) => errors.push(format!(
                "Question '{}' has an invalid rule \"{}\": {}",
                question.id, question.rule, e
            )),
        }

        if question.options.is_empty() && !question.is_variables_output() {
            warnings.push(format!("Question '{}' has no options", question.id));
        }

        for option in &question.options {
            if let OptionKind::Repetitive { id, .. } = &option.kind {
                if find(id).is_none() {
                    errors.push(format!(
                        "Option '{}' of '{}' asks for unknown sub-tree '{}'",
                        option.id, question.id, id
                    ));
                }
            }
        }
    }

    (errors, warnings)
}
