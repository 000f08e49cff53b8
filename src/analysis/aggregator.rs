//! Sub-area aggregation and statistics.
//!
//! This module groups the applicable sub-areas of a project into sections
//! and computes the section-level and project-level LOE rollups.

use crate::models::{ProjectLOESummary, SectionAggregate, SubAreaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sort sentinel for sections without a chapter number.
const NO_CHAPTER: u32 = u32::MAX;

/// Which field identifies a section when grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    /// Group by the stable `section_id`.
    #[default]
    SectionId,
    /// Group by display name. Distinct sections sharing a name are merged.
    SectionName,
}

impl GroupingKey {
    /// Extract the grouping key of a sub-area.
    pub fn key_of<'a>(&self, sub_area: &'a SubAreaResult) -> &'a str {
        match self {
            GroupingKey::SectionId => &sub_area.section_id,
            GroupingKey::SectionName => &sub_area.section_name,
        }
    }
}

/// The members of one section, in input order.
#[derive(Debug, Clone)]
pub struct SectionGroup<'a> {
    /// Value of the grouping key shared by all members.
    pub key: String,
    pub section_id: String,
    pub section_name: String,
    /// Chapter of the first member seen.
    pub chapter_number: Option<u32>,
    pub sub_areas: Vec<&'a SubAreaResult>,
}

impl SectionGroup<'_> {
    /// Compute the rollup for this group.
    pub fn aggregate(&self) -> SectionAggregate {
        let count = self.sub_areas.len();
        let total_hours: f64 = self.sub_areas.iter().map(|s| s.loe_hours).sum();
        let score_sum: f64 = self.sub_areas.iter().map(|s| s.loe_confidence_score).sum();
        let total_indicators = self.sub_areas.iter().map(|s| s.indicators.len()).sum();

        SectionAggregate {
            section_id: self.section_id.clone(),
            section_name: self.section_name.clone(),
            chapter_number: self.chapter_number,
            sub_area_count: count,
            total_hours,
            avg_confidence_score: mean(score_sum, count),
            total_indicators,
        }
    }
}

/// Arithmetic mean that yields 0.0 instead of NaN for an empty set.
pub fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Chapter sort key with absent chapters last.
pub fn chapter_sort_key(chapter_number: Option<u32>) -> u32 {
    chapter_number.unwrap_or(NO_CHAPTER)
}

/// Group sub-areas into sections, sorted by chapter number.
///
/// Groups are created on first observation, so none is ever empty. Sections
/// without a chapter sort after all numbered ones; ties keep first-seen order.
pub fn group_by_section(sub_areas: &[SubAreaResult], key: GroupingKey) -> Vec<SectionGroup<'_>> {
    let mut groups: Vec<SectionGroup<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for sub_area in sub_areas {
        let group_key = key.key_of(sub_area);
        let slot = *index.entry(group_key).or_insert_with(|| {
            groups.push(SectionGroup {
                key: group_key.to_string(),
                section_id: sub_area.section_id.clone(),
                section_name: sub_area.section_name.clone(),
                chapter_number: sub_area.chapter_number,
                sub_areas: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].sub_areas.push(sub_area);
    }

    groups.sort_by_key(|g| chapter_sort_key(g.chapter_number));
    groups
}

/// Per-section rollups in chapter order.
pub fn summarize_sections(sub_areas: &[SubAreaResult], key: GroupingKey) -> Vec<SectionAggregate> {
    group_by_section(sub_areas, key)
        .iter()
        .map(SectionGroup::aggregate)
        .collect()
}

/// Build the project LOE summary from the applicable sub-areas.
///
/// Project totals are taken directly over every sub-area. In particular the
/// average confidence is the mean of all sub-area scores, which differs from
/// the mean of section averages whenever section sizes differ.
pub fn summarize_project(
    project_id: i64,
    project_name: &str,
    sub_areas: &[SubAreaResult],
    key: GroupingKey,
) -> ProjectLOESummary {
    let total_hours: f64 = sub_areas.iter().map(|s| s.loe_hours).sum();
    let score_sum: f64 = sub_areas.iter().map(|s| s.loe_confidence_score).sum();
    let total_indicators = sub_areas.iter().map(|s| s.indicators.len()).sum();

    ProjectLOESummary {
        project_id,
        project_name: project_name.to_string(),
        total_sub_areas: sub_areas.len(),
        total_hours,
        avg_confidence_score: mean(score_sum, sub_areas.len()),
        total_indicators,
        sections: summarize_sections(sub_areas, key),
    }
}

/// Sort server-supplied section rollups into chapter order.
pub fn sort_sections_by_chapter(sections: &mut [SectionAggregate]) {
    sections.sort_by_key(|s| chapter_sort_key(s.chapter_number));
}
