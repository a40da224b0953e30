//! Quiz authoring, rubric scoring, and the grade lifecycle for gradebook.
//!
//! The validation, scoring, and lifecycle modules are pure: they take complete
//! values and return new ones. The `engine` module runs them against the
//! persistence and notification collaborators defined in `traits`.

pub mod engine;
pub mod error;
pub mod evaluation;
pub mod lifecycle;
pub mod model;
pub mod parser;
pub mod question;
pub mod quiz;
pub mod report;
pub mod rubric;
pub mod scoring;
pub mod statistics;
pub mod store;
pub mod traits;
