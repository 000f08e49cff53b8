//! Display-ready projections of aggregated results.
//!
//! Turns sub-areas and LOE summaries into the structures the report layer
//! renders: bar-chart shares, grouped or flat result cards, and the
//! expand/collapse view state.

use crate::analysis::aggregator::{group_by_section, GroupingKey};
use crate::models::{
    section_label, ConfidenceTier, ProjectLOESummary, SectionAggregate, SubAreaResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default number of sections shown in the hours distribution chart.
pub const DEFAULT_TOP_SECTIONS: usize = 10;

/// One bar of the hours distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionBar {
    pub label: String,
    pub total_hours: f64,
    /// Share of project hours, 0-100.
    pub percentage: f64,
}

/// Share of `part` in `total` as a percentage; zero when `total` is zero.
pub fn percentage_of(part: f64, total: f64) -> f64 {
    if total == 0.0 || !total.is_finite() {
        return 0.0;
    }
    let pct = part / total * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Bars for the first `limit` sections of a summary, in chapter order.
///
/// `summary.sections` must already be chapter-sorted.
pub fn section_bars(summary: &ProjectLOESummary, limit: usize) -> Vec<SectionBar> {
    summary
        .sections
        .iter()
        .take(limit)
        .map(|section| SectionBar {
            label: section.label(),
            total_hours: section.total_hours,
            percentage: percentage_of(section.total_hours, summary.total_hours),
        })
        .collect()
}

/// How results are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsMode {
    /// Grouped under section headings.
    #[default]
    Section,
    /// One flat list, each card annotated with its section.
    All,
}

/// A user interaction on the results view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    ToggleMode,
    /// Toggle a section, keyed by the grouping key value.
    ToggleSection(String),
    ToggleSubArea(String),
    ExpandAllSections(Vec<String>),
}

/// Client-local view state. Never feeds back into aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub mode: ResultsMode,
    pub expanded_sections: BTreeSet<String>,
    pub expanded_sub_areas: BTreeSet<String>,
}

impl ViewState {
    /// Apply an event, returning the next state.
    pub fn apply(&self, event: ViewEvent) -> ViewState {
        let mut next = self.clone();
        match event {
            ViewEvent::ToggleMode => {
                next.mode = match self.mode {
                    ResultsMode::Section => ResultsMode::All,
                    ResultsMode::All => ResultsMode::Section,
                };
            }
            ViewEvent::ToggleSection(key) => toggle(&mut next.expanded_sections, key),
            ViewEvent::ToggleSubArea(id) => toggle(&mut next.expanded_sub_areas, id),
            ViewEvent::ExpandAllSections(keys) => next.expanded_sections.extend(keys),
        }
        next
    }

    pub fn is_section_expanded(&self, key: &str) -> bool {
        self.expanded_sections.contains(key)
    }

    pub fn is_sub_area_expanded(&self, sub_area_id: &str) -> bool {
        self.expanded_sub_areas.contains(sub_area_id)
    }
}

fn toggle(set: &mut BTreeSet<String>, key: String) {
    if !set.remove(&key) {
        set.insert(key);
    }
}

/// A sub-area ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubAreaCard<'a> {
    pub sub_area: &'a SubAreaResult,
    /// Section heading, for context in the flat layout.
    pub section_label: String,
    pub tier: ConfidenceTier,
    pub expanded: bool,
}

/// A section heading with its cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView<'a> {
    pub key: String,
    pub label: String,
    pub aggregate: SectionAggregate,
    pub tier: ConfidenceTier,
    pub expanded: bool,
    pub cards: Vec<SubAreaCard<'a>>,
}

/// The results view in the selected layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ResultsProjection<'a> {
    Section { sections: Vec<SectionView<'a>> },
    All { cards: Vec<SubAreaCard<'a>> },
}

impl ResultsProjection<'_> {
    /// Number of sub-areas shown, identical in either layout.
    pub fn sub_area_count(&self) -> usize {
        match self {
            ResultsProjection::Section { sections } => sections.iter().map(|s| s.cards.len()).sum(),
            ResultsProjection::All { cards } => cards.len(),
        }
    }
}

fn card<'a>(sub_area: &'a SubAreaResult, state: &ViewState) -> SubAreaCard<'a> {
    SubAreaCard {
        sub_area,
        section_label: section_label(sub_area.chapter_number, &sub_area.section_name),
        tier: sub_area.confidence_tier(),
        expanded: state.is_sub_area_expanded(&sub_area.sub_area_id),
    }
}

/// Project sub-areas into the layout selected by `state`.
///
/// The flat layout keeps service order; the grouped layout follows
/// chapter order.
pub fn project_results<'a>(
    sub_areas: &'a [SubAreaResult],
    state: &ViewState,
    key: GroupingKey,
) -> ResultsProjection<'a> {
    match state.mode {
        ResultsMode::All => ResultsProjection::All {
            cards: sub_areas.iter().map(|s| card(s, state)).collect(),
        },
        ResultsMode::Section => ResultsProjection::Section {
            sections: group_by_section(sub_areas, key)
                .into_iter()
                .map(|group| {
                    let aggregate = group.aggregate();
                    SectionView {
                        label: aggregate.label(),
                        tier: aggregate.confidence_tier(),
                        expanded: state.is_section_expanded(&group.key),
                        cards: group.sub_areas.iter().map(|s| card(s, state)).collect(),
                        key: group.key,
                        aggregate,
                    }
                })
                .collect(),
        },
    }
}
