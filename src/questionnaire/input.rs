//! Answer input from the command line and answer files.
//!
//! An answers file is either a submitted snapshot (`{"answers": {...}}` in
//! the session's wire version) or a plain object mapping question keys to a
//! value or a list of values.

use crate::models::{ProjectAnswers, Question};
use serde_json::Value;

use super::answers::WireVersion;
use super::collector::{AnswerEvent, Collector};
use super::CollectorError;

/// Parsed content of an answers file.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerSource {
    /// A previously submitted snapshot, for edit and resubmit.
    Snapshot(ProjectAnswers),
    /// Question key and value pairs.
    Values(Vec<(String, String)>),
}

/// Parse the content of an answers file.
pub fn parse_answers_file(content: &str) -> Result<AnswerSource, CollectorError> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| CollectorError::Decode(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(CollectorError::Decode(
            "answers file must contain a JSON object".to_string(),
        ));
    };

    if map.len() == 1 && map.get("answers").is_some_and(Value::is_object) {
        let snapshot: ProjectAnswers = serde_json::from_value(Value::Object(map))
            .map_err(|e| CollectorError::Decode(e.to_string()))?;
        return Ok(AnswerSource::Snapshot(snapshot));
    }

    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::String(s) => pairs.push((key, s)),
            Value::Number(n) => pairs.push((key, n.to_string())),
            Value::Bool(b) => pairs.push((key, b.to_string())),
            Value::Null => pairs.push((key, String::new())),
            Value::Array(items) => {
                if items.is_empty() {
                    pairs.push((key.clone(), String::new()));
                }
                for item in items {
                    let token = match item {
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        other => {
                            return Err(CollectorError::Decode(format!(
                                "unsupported value for {}: {}",
                                key, other
                            )))
                        }
                    };
                    pairs.push((key.clone(), token));
                }
            }
            Value::Object(_) => {
                return Err(CollectorError::Decode(format!(
                    "unsupported value for {}: nested object",
                    key
                )))
            }
        }
    }
    Ok(AnswerSource::Values(pairs))
}

/// Apply key/value pairs to a collector.
///
/// Each key mentioned replaces that question's prior answer. Several pairs
/// for a checkbox question select several options; for a radio question the
/// last one wins. An empty value clears the answer.
pub fn apply_pairs(
    collector: Collector,
    questions: &[Question],
    pairs: &[(String, String)],
) -> Result<Collector, CollectorError> {
    let mut keys: Vec<&str> = Vec::new();
    for (key, _) in pairs {
        if !keys.contains(&key.as_str()) {
            keys.push(key);
        }
    }

    let mut next = collector;
    for key in keys {
        let question = questions
            .iter()
            .find(|q| q.question_key == key)
            .ok_or_else(|| CollectorError::UnknownQuestion(key.to_string()))?;

        next = next.apply(AnswerEvent::Clear {
            key: key.to_string(),
        })?;

        let mut seen: Vec<&str> = Vec::new();
        for (_, value) in pairs.iter().filter(|(k, _)| k == key) {
            if value.is_empty() || seen.contains(&value.as_str()) {
                continue;
            }
            seen.push(value);
            next = next.apply_checked(questions, AnswerEvent::for_question(question, value))?;
        }
    }

    Ok(next)
}

/// Build a collector from an optional answers file and command-line pairs.
///
/// Command-line pairs take precedence over the file.
pub fn build_collector(
    wire: WireVersion,
    questions: &[Question],
    file: Option<AnswerSource>,
    pairs: &[(String, String)],
) -> Result<Collector, CollectorError> {
    let start = match file {
        Some(AnswerSource::Snapshot(snapshot)) => Collector::seeded(wire, &snapshot, questions)?,
        Some(AnswerSource::Values(values)) => {
            apply_pairs(Collector::new(wire), questions, &values)?
        }
        None => Collector::new(wire),
    };
    apply_pairs(start, questions, pairs)
}
