pub mod formatter;
pub mod grouped;
pub mod narrative;
pub mod navigator;
pub mod pipeline;
pub mod rule;
pub mod session;
pub mod tree;
