//! Questionnaire answer collection.
//!
//! Answers are gathered client-side, validated as a whole, and submitted
//! once as an immutable snapshot.

pub mod answers;
pub mod collector;
pub mod input;

pub use answers::WireVersion;
pub use collector::{Collector, Phase, RequiredPolicy};
pub use input::{build_collector, parse_answers_file};

use thiserror::Error;

/// Required questions left unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} required question(s) unanswered", unanswered.len())]
pub struct ValidationError {
    /// Texts of every unanswered question, in question order.
    pub unanswered: Vec<String>,
}

/// Errors raised while collecting answers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    /// The session has already produced its snapshot.
    #[error("answers were already submitted for this session")]
    AlreadySubmitted,

    /// No question has this key.
    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    /// The value is not one of the question's options.
    #[error("{value:?} is not an option for question {key}")]
    InvalidOption { key: String, value: String },

    /// A stored answer could not be decoded.
    #[error("cannot decode answer {0}")]
    Decode(String),

    /// Validation failed.
    #[error(transparent)]
    Incomplete(#[from] ValidationError),
}
