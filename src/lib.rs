//! Care Note Engine: branching clinical questionnaires that write their
//! own notes.
//!
//! A forest of questions is walked one answer at a time. Visibility rules
//! gate each question, reusable sub-trees are spliced in on request, and
//! the collected answers are rendered into a formatted narrative.

pub mod core;
pub mod schema;
