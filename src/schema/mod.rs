pub mod answer;
pub mod irregular;
pub mod option;
pub mod question;
pub mod sequence;
pub mod settings;
