/// Sentence formatter: ordered text-normalization passes run over the
/// finished note.
use std::fmt;

/// One normalization pass.
pub trait FormatPass: fmt::Debug {
    fn format(&self, text: &str) -> String;
}

/// Uppercase the first letter of every sentence.
#[derive(Debug, Clone)]
pub struct Capitalize {
    pub separator: String,
}

impl FormatPass for Capitalize {
    fn format(&self, text: &str) -> String {
        if self.separator.is_empty() {
            return capitalize_first(text);
        }
        text.split(self.separator.as_str())
            .map(capitalize_first)
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}

/// Uppercase the first character after any leading whitespace.
fn capitalize_first(sentence: &str) -> String {
    let lead = sentence.len() - sentence.trim_start().len();
    let (space, rest) = sentence.split_at(lead);
    let mut chars = rest.chars();
    match chars.next() {
        Some(first) => format!("{}{}{}", space, first.to_uppercase(), chars.as_str()),
        None => sentence.to_string(),
    }
}

/// `" ;"` becomes `"; "`, repeated until no space precedes a semicolon.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemicolonSpacing;

impl FormatPass for SemicolonSpacing {
    fn format(&self, text: &str) -> String {
        let mut out = text.to_string();
        while out.contains(" ;") {
            out = out.replace(" ;", "; ");
        }
        out
    }
}

/// Collapse runs of the configured characters to a single occurrence.
#[derive(Debug, Clone)]
pub struct Deduplicate {
    pub chars: Vec<char>,
}

impl FormatPass for Deduplicate {
    fn format(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut prev: Option<char> = None;
        for c in text.chars() {
            if prev == Some(c) && self.chars.contains(&c) {
                continue;
            }
            out.push(c);
            prev = Some(c);
        }
        out
    }
}

/// The pass chain, applied in order.
#[derive(Debug)]
pub struct SentenceFormatter {
    passes: Vec<Box<dyn FormatPass + Send + Sync>>,
}

impl SentenceFormatter {
    pub fn new(passes: Vec<Box<dyn FormatPass + Send + Sync>>) -> Self {
        Self { passes }
    }

    /// Capitalization, then semicolon spacing, then deduplication.
    pub fn standard(separator: &str, collapse_chars: &[char]) -> Self {
        Self::new(vec![
            Box::new(Capitalize {
                separator: separator.to_string(),
            }),
            Box::new(SemicolonSpacing),
            Box::new(Deduplicate {
                chars: collapse_chars.to_vec(),
            }),
        ])
    }

    pub fn format(&self, text: &str) -> String {
        self.passes
            .iter()
            .fold(text.to_string(), |acc, pass| pass.format(&acc))
    }
}

impl Default for SentenceFormatter {
    fn default() -> Self {
        Self::standard(". ", &[' ', '.'])
    }
}
