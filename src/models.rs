//! Data models for the scoping client.
//!
//! This module contains the records exchanged with the assessment service
//! and the read-models derived from them (section aggregates and the
//! project LOE summary).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Confidence tier for an LOE figure.
///
/// This is the single tiering policy: every view that shows a confidence
/// score buckets it through [`ConfidenceTier::from_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    /// Score below 60.
    Low,
    /// Score from 60 up to (not including) 80.
    Medium,
    /// Score of 80 or more.
    High,
}

impl ConfidenceTier {
    pub const HIGH_THRESHOLD: f64 = 80.0;
    pub const MEDIUM_THRESHOLD: f64 = 60.0;

    /// Bucket a 0-100 confidence score.
    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            ConfidenceTier::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    /// Returns an emoji representation of the tier.
    pub fn emoji(&self) -> &'static str {
        match self {
            ConfidenceTier::Low => "🔴",
            ConfidenceTier::Medium => "🟡",
            ConfidenceTier::High => "🟢",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::Low => write!(f, "low"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::High => write!(f, "high"),
        }
    }
}

/// An indicator of compliance attached to a sub-area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorOfCompliance {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Display code, e.g. `"F1.1"`.
    pub indicator_id: String,
    pub text: String,
}

/// One applicable review sub-area for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAreaResult {
    /// Stable section identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub section_id: String,
    /// Display name of the section.
    pub section_name: String,
    /// Chapter number used as the section sort key.
    #[serde(default)]
    pub chapter_number: Option<u32>,
    /// Unique within one project snapshot.
    #[serde(deserialize_with = "string_or_number")]
    pub sub_area_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub basic_requirement: String,
    /// Estimated review hours.
    #[serde(default)]
    pub loe_hours: f64,
    /// Confidence category as labelled by the service.
    #[serde(rename = "loe_confidence", default)]
    pub loe_confidence_label: String,
    /// Confidence score, 0-100.
    #[serde(default)]
    pub loe_confidence_score: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub indicators: Vec<IndicatorOfCompliance>,
}

impl SubAreaResult {
    pub fn confidence_tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_score(self.loe_confidence_score)
    }
}

/// Applicable sub-areas for a project, as computed by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectApplicabilityResult {
    pub project_id: i64,
    pub applicable_count: usize,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub applicable_sub_areas: Vec<SubAreaResult>,
}

/// Per-section rollup of applicable sub-areas.
///
/// Derived, never persisted. A section with no applicable sub-areas is
/// never materialized, so `sub_area_count` is at least one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionAggregate {
    #[serde(deserialize_with = "string_or_number")]
    pub section_id: String,
    pub section_name: String,
    #[serde(default)]
    pub chapter_number: Option<u32>,
    pub sub_area_count: usize,
    pub total_hours: f64,
    pub avg_confidence_score: f64,
    /// The service names this `indicator_count`.
    #[serde(default, alias = "indicator_count")]
    pub total_indicators: usize,
}

impl SectionAggregate {
    /// Section heading, prefixed with the chapter number when known.
    pub fn label(&self) -> String {
        section_label(self.chapter_number, &self.section_name)
    }

    pub fn confidence_tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_score(self.avg_confidence_score)
    }
}

/// Project-level LOE rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectLOESummary {
    pub project_id: i64,
    pub project_name: String,
    pub total_sub_areas: usize,
    pub total_hours: f64,
    /// Mean over all sub-areas, not the mean of section means.
    pub avg_confidence_score: f64,
    #[serde(default)]
    pub total_indicators: usize,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sections: Vec<SectionAggregate>,
}

impl ProjectLOESummary {
    pub fn confidence_tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_score(self.avg_confidence_score)
    }
}

/// Format a section heading as `"<chapter>. <name>"`.
pub fn section_label(chapter_number: Option<u32>, section_name: &str) -> String {
    match chapter_number {
        Some(chapter) => format!("{}. {}", chapter, section_name),
        None => section_name.to_string(),
    }
}

/// A project record owned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub grantee_name: Option<String>,
    #[serde(default)]
    pub grant_number: Option<String>,
    #[serde(default)]
    pub review_type: Option<String>,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grantee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_type: Option<String>,
}

/// Partial update for a project. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grantee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_type: Option<String>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.grantee_name.is_none()
            && self.grant_number.is_none()
            && self.review_type.is_none()
    }
}

/// How a question collects its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Single-select.
    Radio,
    /// Multi-select.
    Checkbox,
    #[serde(other)]
    Other,
}

impl QuestionType {
    pub fn is_multi_select(&self) -> bool {
        matches!(self, QuestionType::Checkbox)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(default)]
    pub id: i64,
    pub option_value: String,
    pub option_label: String,
    #[serde(default)]
    pub display_order: i32,
}

/// A questionnaire question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question_key: String,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_required")]
    pub is_required: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub options: Vec<QuestionOption>,
}

fn default_required() -> bool {
    true
}

impl Question {
    /// Whether `value` is one of this question's option values.
    ///
    /// Questions without a declared option list accept any value.
    pub fn accepts(&self, value: &str) -> bool {
        self.options.is_empty() || self.options.iter().any(|o| o.option_value == value)
    }
}

/// Immutable answer snapshot submitted for a project.
///
/// Multi-select values are already encoded as a single string per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnswers {
    pub answers: BTreeMap<String, String>,
}

/// Result of the stateless `/api/assess` preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentPreview {
    pub total_sub_areas: usize,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub applicable_sub_areas: Vec<SubArea>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_hours: f64,
    #[serde(default)]
    pub avg_confidence: f64,
}

/// A regulatory section in the service catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(alias = "title")]
    pub section_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Pages of the review guide covering this section.
    #[serde(default)]
    pub page_range: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub chapter_number: Option<u32>,
}

/// Catalog-wide statistics for a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    #[serde(flatten)]
    pub section: Section,
    pub sub_area_count: usize,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_loe_hours: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg_loe_hours: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg_confidence_score: f64,
}

/// A sub-area definition from the service catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubArea {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub section_id: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub basic_requirement: Option<String>,
    #[serde(default)]
    pub applicability: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub loe_hours: Option<f64>,
    #[serde(default)]
    pub loe_confidence: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub loe_confidence_score: Option<f64>,
}

/// A deficiency a reviewer may cite for a sub-area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deficiency {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Deficiency code, e.g. `"P4-1"`.
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub determination: Option<String>,
    #[serde(default)]
    pub suggested_corrective_action: Option<String>,
}

/// A catalog sub-area with its review guidance, indicators and deficiencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAreaDetail {
    #[serde(flatten)]
    pub sub_area: SubArea,
    #[serde(default)]
    pub detailed_explanation: Option<String>,
    #[serde(default)]
    pub instructions_for_reviewer: Option<String>,
    #[serde(default)]
    pub loe_reasoning: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub indicators: Vec<IndicatorOfCompliance>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub deficiencies: Vec<Deficiency>,
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

// Wire-tolerance helpers. The service mixes integer and string identifiers,
// serializes decimals as strings, and omits timezone offsets.

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(f) => f.to_string(),
    })
}

fn scalar_to_f64<E: serde::de::Error>(scalar: Scalar) -> Result<f64, E> {
    match scalar {
        Scalar::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| E::custom(format!("invalid number: {:?}", s))),
        Scalar::Int(n) => Ok(n as f64),
        Scalar::Float(f) => Ok(f),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        Some(scalar) => scalar_to_f64(scalar),
        None => Ok(0.0),
    }
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Scalar>::deserialize(deserializer)?
        .map(scalar_to_f64)
        .transpose()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn flexible_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {:?}: {}", raw, e)))
}
