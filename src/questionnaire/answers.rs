//! Answer representation and its versioned wire encoding.

use crate::models::Question;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::CollectorError;

/// A recorded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Answer {
    /// Radio selection.
    Single(String),
    /// Checkbox selections in the order they were toggled on. No duplicates.
    Multi(Vec<String>),
}

impl Answer {
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Single(value) => value.trim().is_empty(),
            Answer::Multi(values) => values.is_empty(),
        }
    }

    /// Selected tokens, in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Answer::Single(value) => vec![value.as_str()],
            Answer::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.values().join(", "))
    }
}

/// Wire format of a submitted answer set.
///
/// `V1` keys answers by numeric question id and joins multi-select tokens
/// with commas. `V2` keys answers by `question_key` and encodes multi-select
/// tokens as a JSON array string. One version is used for a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVersion {
    V1,
    #[default]
    V2,
}

impl WireVersion {
    /// Wire key for a question.
    pub fn key_for(&self, question: &Question) -> String {
        match self {
            WireVersion::V1 => question.id.to_string(),
            WireVersion::V2 => question.question_key.clone(),
        }
    }

    /// Find the question a wire key refers to.
    pub fn resolve<'q>(&self, wire_key: &str, questions: &'q [Question]) -> Option<&'q Question> {
        questions.iter().find(|q| match self {
            WireVersion::V1 => q.id.to_string() == wire_key,
            WireVersion::V2 => q.question_key == wire_key,
        })
    }

    /// Encode an answer value.
    pub fn encode(&self, answer: &Answer) -> Result<String, CollectorError> {
        match answer {
            Answer::Single(value) => Ok(value.clone()),
            Answer::Multi(values) => match self {
                WireVersion::V1 => Ok(values.join(",")),
                WireVersion::V2 => serde_json::to_string(values)
                    .map_err(|e| CollectorError::Decode(e.to_string())),
            },
        }
    }

    /// Decode a wire value for a question of known type.
    pub fn decode(&self, raw: &str, multi_select: bool) -> Result<Answer, CollectorError> {
        if !multi_select {
            return Ok(Answer::Single(raw.to_string()));
        }

        let tokens: Vec<String> = match self {
            WireVersion::V1 => raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            WireVersion::V2 if raw.trim().is_empty() => Vec::new(),
            WireVersion::V2 => serde_json::from_str(raw)
                .map_err(|e| CollectorError::Decode(format!("{:?}: {}", raw, e)))?,
        };

        let mut deduped: Vec<String> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if !deduped.contains(&token) {
                deduped.push(token);
            }
        }
        Ok(Answer::Multi(deduped))
    }
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireVersion::V1 => write!(f, "v1"),
            WireVersion::V2 => write!(f, "v2"),
        }
    }
}
