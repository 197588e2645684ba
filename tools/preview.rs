/// Preview: interactive shell that walks a question sequence and prints
/// the note as it grows.
///
/// Usage: preview --sequence <path> [--settings <path>] [--shared <dir>] [--seed <n>] [-v]
///
/// Answer input:
///   1,3                        select options by number
///   3 cm, by, 2 cm             values for a size question, one per option
///   left=swollen right=normal  grouped question, item=qualifier by number or id
///
/// Commands:
///   note     print the formatted note
///   raw      print the note before replacements and formatting
///   answers  list recorded answers
///   skip     answer the current question with nothing selected
///   help     list commands
///   quit     exit

use care_note_engine::core::pipeline::NarrativeEngine;
use care_note_engine::core::session::Session;
use care_note_engine::schema::option::{AnswerOption, OptionKind};
use care_note_engine::schema::question::{Question, QuestionKind};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut builder = NarrativeEngine::builder();
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sequence" if i + 1 < args.len() => {
                i += 1;
                builder = builder.sequence_path(&args[i]);
            }
            "--settings" if i + 1 < args.len() => {
                i += 1;
                builder = builder.settings_path(&args[i]);
            }
            "--shared" if i + 1 < args.len() => {
                i += 1;
                builder = builder.shared_dir(&args[i]);
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                builder = builder.seed(args[i].parse().unwrap_or(0));
            }
            "-v" | "--verbose" => verbose = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(if verbose { "debug" } else { "warn" }))
        .with_target(false)
        .init();

    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: Failed to build engine: {}", e);
            std::process::exit(1);
        }
    };
    println!("Loaded {} questions. Type 'help' for commands.", engine.tree().len());

    let mut session = Session::new();
    let stdin = io::stdin();

    loop {
        let Some(question) = engine.advance(&mut session).cloned() else {
            println!("\nAll questions answered.\n");
            println!("{}", engine.narrative(session.answers()));
            return;
        };

        show_question(&question);

        let selected = loop {
            print!("> ");
            let _ = io::stdout().flush();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
                return;
            }
            let line = line.trim();

            match line {
                "quit" | "exit" => return,
                "help" => print_usage(),
                "note" => println!("{}", engine.narrative(session.answers())),
                "raw" => println!("{}", engine.raw_narrative(session.answers())),
                "answers" => {
                    for answer in session.answers() {
                        let ids: Vec<&str> = answer.selected.iter().map(|o| o.id.as_str()).collect();
                        println!("  {}: {}", answer.question_id, ids.join(", "));
                    }
                }
                "skip" => break Vec::new(),
                "" => {}
                input => match parse_answer(&engine, &question, input) {
                    Ok(selected) => break selected,
                    Err(msg) => println!("  {}", msg),
                },
            }
        };

        engine.answer(&mut session, &question.id, selected);
        println!("\n{}\n", engine.narrative(session.answers()));
    }
}

fn show_question(question: &Question) {
    println!("\n[{}] {}", question.id, question.prompt);
    for (n, option) in question.options.iter().enumerate() {
        match &option.kind {
            OptionKind::Grouped {
                children, options, ..
            } => {
                println!("  {}. {}", n + 1, option.title());
                let items: Vec<String> = children
                    .iter()
                    .enumerate()
                    .map(|(i, c)| format!("{}={}", i + 1, c.title()))
                    .collect();
                let quals: Vec<String> = options
                    .iter()
                    .enumerate()
                    .map(|(i, q)| format!("{}={}", i + 1, q.title()))
                    .collect();
                println!("     items: {}", items.join("  "));
                println!("     qualifiers: {}", quals.join("  "));
            }
            OptionKind::Size { unit, .. } => println!("  {}. {} ({})", n + 1, option.title(), unit),
            _ => println!("  {}. {}", n + 1, option.title()),
        }
    }
}

fn parse_answer(engine: &NarrativeEngine, question: &Question, input: &str) -> Result<Vec<AnswerOption>, String> {
    match question.kind {
        QuestionKind::Size => {
            let values: Vec<&str> = input.split(',').map(str::trim).collect();
            if values.len() != question.options.len() {
                return Err(format!("expected {} values", question.options.len()));
            }
            Ok(question
                .options
                .iter()
                .zip(values)
                .map(|(option, value)| option.with_narrative(value.to_string()))
                .collect())
        }
        QuestionKind::Grouped { .. } | QuestionKind::GroupedOverride => {
            parse_grouped(engine, question, input).map(|option| vec![option])
        }
        _ => input
            .split(',')
            .map(|n| {
                n.trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|n| question.options.get(n))
                    .cloned()
                    .ok_or_else(|| format!("no option '{}'", n.trim()))
            })
            .collect(),
    }
}

/// `item=qualifier` pairs against the first grouped root.
fn parse_grouped(engine: &NarrativeEngine, question: &Question, input: &str) -> Result<AnswerOption, String> {
    let mut aggregator = engine
        .grouped_aggregator(&question.id)
        .ok_or_else(|| "not a grouped question".to_string())?;
    let root = question
        .options
        .first()
        .ok_or_else(|| "question has no grouped options".to_string())?;
    let OptionKind::Grouped {
        children, options, ..
    } = &root.kind
    else {
        return Err("first option is not grouped".to_string());
    };

    let lookup = |list: &[AnswerOption], key: &str| -> Option<AnswerOption> {
        key.parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|n| list.get(n))
            .or_else(|| list.iter().find(|o| o.id == key || o.title().eq_ignore_ascii_case(key)))
            .cloned()
    };

    for pair in input.split_whitespace() {
        let (item, qualifier) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected item=qualifier, got '{}'", pair))?;
        let item = lookup(children, item).ok_or_else(|| format!("no item '{}'", item))?;
        let qualifier = lookup(options, qualifier).ok_or_else(|| format!("no qualifier '{}'", qualifier))?;
        aggregator.option_selected(&item, &qualifier);
    }

    aggregator
        .next_button_pressed()
        .ok_or_else(|| "nothing selected".to_string())
}

fn print_usage() {
    println!("Usage: preview --sequence <path> [--settings <path>] [--shared <dir>] [--seed <n>] [-v]");
    println!();
    println!("Answer input:");
    println!("  1,3                        select options by number");
    println!("  3 cm, by, 2 cm             values for a size question, one per option");
    println!("  left=swollen right=normal  grouped question, item=qualifier by number or id");
    println!();
    println!("Commands:");
    println!("  note     print the formatted note");
    println!("  raw      print the note before replacements and formatting");
    println!("  answers  list recorded answers");
    println!("  skip     answer the current question with nothing selected");
    println!("  help     list commands");
    println!("  quit     exit");
}
