//! Questionnaire answer collection.
//!
//! The collector is an immutable-update reducer: [`Collector::apply`] takes
//! the current state and an event and returns the next state. It moves from
//! `Empty` to `Editing` on the first event and to the terminal `Submitted`
//! phase once a validated snapshot has been produced.

use crate::models::{ProjectAnswers, Question};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::answers::{Answer, WireVersion};
use super::{CollectorError, ValidationError};

/// Lifecycle of one assessment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Editing,
    Submitted,
}

/// Which questions must be answered before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredPolicy {
    /// Only questions flagged `is_required`.
    #[default]
    Flagged,
    /// Every question.
    All,
}

/// A user interaction on the questionnaire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEvent {
    /// Radio: replace any prior value.
    Select { key: String, value: String },
    /// Checkbox: add the value if absent, remove it if present.
    Toggle { key: String, value: String },
    /// Forget the answer for a key.
    Clear { key: String },
}

impl AnswerEvent {
    /// The event a value produces for this question's input type.
    pub fn for_question(question: &Question, value: &str) -> Self {
        if question.question_type.is_multi_select() {
            AnswerEvent::Toggle {
                key: question.question_key.clone(),
                value: value.to_string(),
            }
        } else {
            AnswerEvent::Select {
                key: question.question_key.clone(),
                value: value.to_string(),
            }
        }
    }

    pub fn key(&self) -> &str {
        match self {
            AnswerEvent::Select { key, .. }
            | AnswerEvent::Toggle { key, .. }
            | AnswerEvent::Clear { key } => key,
        }
    }
}

/// Answer set for one assessment session, keyed by `question_key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Collector {
    wire: WireVersion,
    answers: BTreeMap<String, Answer>,
    phase: Phase,
}

impl Collector {
    pub fn new(wire: WireVersion) -> Self {
        Self {
            wire,
            answers: BTreeMap::new(),
            phase: Phase::Empty,
        }
    }

    /// Start from previously submitted answers (edit and resubmit).
    ///
    /// `initial` must be in this collector's wire version.
    pub fn seeded(
        wire: WireVersion,
        initial: &ProjectAnswers,
        questions: &[Question],
    ) -> Result<Self, CollectorError> {
        let mut answers = BTreeMap::new();
        for (wire_key, raw) in &initial.answers {
            let question = wire
                .resolve(wire_key, questions)
                .ok_or_else(|| CollectorError::UnknownQuestion(wire_key.clone()))?;
            let answer = wire.decode(raw, question.question_type.is_multi_select())?;
            if !answer.is_empty() {
                answers.insert(question.question_key.clone(), answer);
            }
        }

        let phase = if answers.is_empty() {
            Phase::Empty
        } else {
            Phase::Editing
        };
        debug!("Seeded collector with {} prior answers", answers.len());

        Ok(Self {
            wire,
            answers,
            phase,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn wire_version(&self) -> WireVersion {
        self.wire
    }

    pub fn answer(&self, key: &str) -> Option<&Answer> {
        self.answers.get(key)
    }

    pub fn answers(&self) -> &BTreeMap<String, Answer> {
        &self.answers
    }

    /// Apply an event, returning the next state.
    pub fn apply(&self, event: AnswerEvent) -> Result<Collector, CollectorError> {
        if self.phase == Phase::Submitted {
            return Err(CollectorError::AlreadySubmitted);
        }

        let mut next = self.clone();
        next.phase = Phase::Editing;

        match event {
            AnswerEvent::Select { key, value } => {
                next.answers.insert(key, Answer::Single(value));
            }
            AnswerEvent::Toggle { key, value } => {
                let mut values = match next.answers.remove(&key) {
                    Some(Answer::Multi(values)) => values,
                    Some(Answer::Single(prior)) if !prior.is_empty() => vec![prior],
                    _ => Vec::new(),
                };
                if let Some(pos) = values.iter().position(|v| *v == value) {
                    values.remove(pos);
                } else {
                    values.push(value);
                }
                next.answers.insert(key, Answer::Multi(values));
            }
            AnswerEvent::Clear { key } => {
                next.answers.remove(&key);
            }
        }

        Ok(next)
    }

    /// Apply an event after checking it against the question list.
    pub fn apply_checked(
        &self,
        questions: &[Question],
        event: AnswerEvent,
    ) -> Result<Collector, CollectorError> {
        let question = questions
            .iter()
            .find(|q| q.question_key == event.key())
            .ok_or_else(|| CollectorError::UnknownQuestion(event.key().to_string()))?;

        if let AnswerEvent::Select { value, .. } | AnswerEvent::Toggle { value, .. } = &event {
            if !question.accepts(value) {
                return Err(CollectorError::InvalidOption {
                    key: question.question_key.clone(),
                    value: value.clone(),
                });
            }
        }

        self.apply(event)
    }

    /// Check that every required question has a non-empty answer.
    ///
    /// Reports all unanswered questions, in question order.
    pub fn validate(
        &self,
        questions: &[Question],
        policy: RequiredPolicy,
    ) -> Result<(), ValidationError> {
        let unanswered: Vec<String> = questions
            .iter()
            .filter(|q| policy == RequiredPolicy::All || q.is_required)
            .filter(|q| {
                self.answers
                    .get(&q.question_key)
                    .map_or(true, Answer::is_empty)
            })
            .map(|q| q.question_text.clone())
            .collect();

        if unanswered.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { unanswered })
        }
    }

    /// Validate and encode the answer snapshot, closing the session.
    ///
    /// On validation failure the collector stays editable.
    pub fn submit(
        &mut self,
        questions: &[Question],
        policy: RequiredPolicy,
    ) -> Result<ProjectAnswers, CollectorError> {
        if self.phase == Phase::Submitted {
            return Err(CollectorError::AlreadySubmitted);
        }
        self.validate(questions, policy)?;

        let mut wire_answers = BTreeMap::new();
        for (key, answer) in &self.answers {
            if answer.is_empty() {
                continue;
            }
            let question = questions
                .iter()
                .find(|q| &q.question_key == key)
                .ok_or_else(|| CollectorError::UnknownQuestion(key.clone()))?;
            wire_answers.insert(self.wire.key_for(question), self.wire.encode(answer)?);
        }

        self.phase = Phase::Submitted;
        debug!(
            "Submitting {} answers using wire {}",
            wire_answers.len(),
            self.wire
        );

        Ok(ProjectAnswers {
            answers: wire_answers,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{QuestionOption, QuestionType};

    pub(crate) fn question(
        id: i64,
        key: &str,
        kind: QuestionType,
        required: bool,
        options: &[&str],
    ) -> Question {
        Question {
            id,
            question_key: key.to_string(),
            question_text: format!("Question {}?", key),
            question_type: kind,
            help_text: None,
            display_order: id as i32,
            is_required: required,
            options: options
                .iter()
                .enumerate()
                .map(|(i, v)| QuestionOption {
                    id: i as i64,
                    option_value: v.to_string(),
                    option_label: v.to_uppercase(),
                    display_order: i as i32,
                })
                .collect(),
        }
    }

    pub(crate) fn questions() -> Vec<Question> {
        vec![
            question(1, "recipient_type", QuestionType::Radio, true, &["state", "non_state"]),
            question(6, "funding", QuestionType::Checkbox, true, &["5307", "5310", "5311"]),
            question(9, "notes", QuestionType::Radio, false, &[]),
        ]
    }

    fn toggle(key: &str, value: &str) -> AnswerEvent {
        AnswerEvent::Toggle {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn select(key: &str, value: &str) -> AnswerEvent {
        AnswerEvent::Select {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_multi_select_toggle_round_trip() {
        let collector = Collector::new(WireVersion::V2)
            .apply(toggle("q", "a"))
            .and_then(|c| c.apply(toggle("q", "b")))
            .and_then(|c| c.apply(toggle("q", "a")))
            .unwrap();

        assert_eq!(collector.answer("q"), Some(&Answer::Multi(vec!["b".to_string()])));
    }

    #[test]
    fn test_toggle_keeps_insertion_order() {
        let collector = Collector::new(WireVersion::V2)
            .apply(toggle("q", "c"))
            .and_then(|c| c.apply(toggle("q", "a")))
            .and_then(|c| c.apply(toggle("q", "b")))
            .unwrap();

        assert_eq!(
            collector.answer("q").map(Answer::values),
            Some(vec!["c", "a", "b"])
        );
    }

    #[test]
    fn test_select_replaces() {
        let first = Collector::new(WireVersion::V2).apply(select("q", "yes")).unwrap();
        let second = first.apply(select("q", "no")).unwrap();

        assert_eq!(second.answer("q"), Some(&Answer::Single("no".to_string())));
        // Prior state is untouched.
        assert_eq!(first.answer("q"), Some(&Answer::Single("yes".to_string())));
    }

    #[test]
    fn test_phase_transitions() {
        let empty = Collector::new(WireVersion::V2);
        assert_eq!(empty.phase(), Phase::Empty);

        let mut editing = empty
            .apply(select("recipient_type", "state"))
            .and_then(|c| c.apply(toggle("funding", "5307")))
            .unwrap();
        assert_eq!(editing.phase(), Phase::Editing);

        editing.submit(&questions(), RequiredPolicy::Flagged).unwrap();
        assert_eq!(editing.phase(), Phase::Submitted);
        assert_eq!(
            editing.apply(select("recipient_type", "non_state")),
            Err(CollectorError::AlreadySubmitted)
        );
        assert!(matches!(
            editing.submit(&questions(), RequiredPolicy::Flagged),
            Err(CollectorError::AlreadySubmitted)
        ));
    }

    #[test]
    fn test_validation_reports_every_missing_question() {
        let collector = Collector::new(WireVersion::V2);

        let err = collector.validate(&questions(), RequiredPolicy::Flagged).unwrap_err();
        assert_eq!(
            err.unanswered,
            vec!["Question recipient_type?", "Question funding?"]
        );

        let err = collector.validate(&questions(), RequiredPolicy::All).unwrap_err();
        assert_eq!(err.unanswered.len(), 3);
    }

    #[test]
    fn test_emptied_multi_select_is_unanswered() {
        let collector = Collector::new(WireVersion::V2)
            .apply(select("recipient_type", "state"))
            .and_then(|c| c.apply(toggle("funding", "5307")))
            .and_then(|c| c.apply(toggle("funding", "5307")))
            .unwrap();

        let err = collector.validate(&questions(), RequiredPolicy::Flagged).unwrap_err();
        assert_eq!(err.unanswered, vec!["Question funding?"]);
    }

    #[test]
    fn test_failed_submit_stays_editable() {
        let mut collector = Collector::new(WireVersion::V2)
            .apply(select("recipient_type", "state"))
            .unwrap();

        let result = collector.submit(&questions(), RequiredPolicy::Flagged);
        assert!(matches!(result, Err(CollectorError::Incomplete(_))));
        assert_eq!(collector.phase(), Phase::Editing);
    }

    #[test]
    fn test_submit_v2_wire() {
        let mut collector = Collector::new(WireVersion::V2)
            .apply(select("recipient_type", "state"))
            .and_then(|c| c.apply(toggle("funding", "5310")))
            .and_then(|c| c.apply(toggle("funding", "5307")))
            .unwrap();

        let submitted = collector.submit(&questions(), RequiredPolicy::Flagged).unwrap();
        assert_eq!(submitted.answers.get("recipient_type").map(String::as_str), Some("state"));
        assert_eq!(
            submitted.answers.get("funding").map(String::as_str),
            Some(r#"["5310","5307"]"#)
        );
    }

    #[test]
    fn test_submit_v1_wire() {
        let mut collector = Collector::new(WireVersion::V1)
            .apply(select("recipient_type", "state"))
            .and_then(|c| c.apply(toggle("funding", "5310")))
            .and_then(|c| c.apply(toggle("funding", "5311")))
            .unwrap();

        let submitted = collector.submit(&questions(), RequiredPolicy::Flagged).unwrap();
        assert_eq!(submitted.answers.get("1").map(String::as_str), Some("state"));
        assert_eq!(submitted.answers.get("6").map(String::as_str), Some("5310,5311"));
    }

    #[test]
    fn test_seeded_from_prior_answers() {
        let mut prior = ProjectAnswers::default();
        prior.answers.insert("recipient_type".to_string(), "non_state".to_string());
        prior.answers.insert("funding".to_string(), r#"["5311"]"#.to_string());

        let seeded = Collector::seeded(WireVersion::V2, &prior, &questions()).unwrap();
        assert_eq!(seeded.phase(), Phase::Editing);

        let next = seeded.apply(toggle("funding", "5307")).unwrap();
        assert_eq!(
            next.answer("funding").map(Answer::values),
            Some(vec!["5311", "5307"])
        );
    }

    #[test]
    fn test_seeded_rejects_unknown_key() {
        let mut prior = ProjectAnswers::default();
        prior.answers.insert("retired_question".to_string(), "yes".to_string());

        assert_eq!(
            Collector::seeded(WireVersion::V2, &prior, &questions()),
            Err(CollectorError::UnknownQuestion("retired_question".to_string()))
        );
    }

    #[test]
    fn test_apply_checked() {
        let qs = questions();
        let collector = Collector::new(WireVersion::V2);

        assert!(matches!(
            collector.apply_checked(&qs, select("missing", "x")),
            Err(CollectorError::UnknownQuestion(_))
        ));
        assert!(matches!(
            collector.apply_checked(&qs, select("recipient_type", "tribal")),
            Err(CollectorError::InvalidOption { .. })
        ));
        // Free-form question without options.
        assert!(collector.apply_checked(&qs, select("notes", "anything")).is_ok());
    }

    #[test]
    fn test_event_for_question_type() {
        let qs = questions();
        assert_eq!(AnswerEvent::for_question(&qs[1], "5307"), toggle("funding", "5307"));
        assert_eq!(AnswerEvent::for_question(&qs[0], "state"), select("recipient_type", "state"));
    }

    #[test]
    fn test_clear() {
        let collector = Collector::new(WireVersion::V2)
            .apply(select("q", "yes"))
            .and_then(|c| c.apply(AnswerEvent::Clear { key: "q".to_string() }))
            .unwrap();
        assert!(collector.answer("q").is_none());
    }
}
