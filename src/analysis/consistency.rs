//! Internal consistency checks for LOE rollups.
//!
//! Section totals must reconcile with project totals, and a summary rebuilt
//! locally from the applicability result must agree with the one the
//! service returns.

use crate::models::ProjectLOESummary;
use std::collections::HashMap;
use thiserror::Error;

/// Absolute tolerance for hour and score comparisons, scaled by magnitude.
pub const EPSILON: f64 = 1e-9;

/// A rollup that does not reconcile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyError {
    /// Section counts do not add up to the project count.
    #[error("section sub-area counts sum to {sections}, project reports {project}")]
    SubAreaCount { project: usize, sections: usize },

    /// Section hours do not add up to the project hours.
    #[error("section hours sum to {sections}, project reports {project}")]
    Hours { project: f64, sections: f64 },

    /// Two summaries of the same project disagree on a figure.
    #[error("{field} mismatch: service reports {authoritative}, local rollup gives {derived}")]
    Mismatch {
        field: String,
        authoritative: String,
        derived: String,
    },

    /// A section appears in one summary but not the other.
    #[error("section {section_id} present in {present_in} summary only")]
    MissingSection {
        section_id: String,
        present_in: &'static str,
    },
}

/// Whether two floats agree within [`EPSILON`] relative to their size.
pub fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= EPSILON * scale
}

/// Verify that a summary's sections reconcile with its project totals.
pub fn check_summary(summary: &ProjectLOESummary) -> Result<(), ConsistencyError> {
    let sections: usize = summary.sections.iter().map(|s| s.sub_area_count).sum();
    if sections != summary.total_sub_areas {
        return Err(ConsistencyError::SubAreaCount {
            project: summary.total_sub_areas,
            sections,
        });
    }

    let section_hours: f64 = summary.sections.iter().map(|s| s.total_hours).sum();
    if !approx_eq(section_hours, summary.total_hours) {
        return Err(ConsistencyError::Hours {
            project: summary.total_hours,
            sections: section_hours,
        });
    }

    Ok(())
}

/// Compare the service summary against a locally derived one.
///
/// Sections are matched by `section_id`. Indicator totals are not compared
/// because the service summary does not always carry them.
pub fn compare_summaries(
    authoritative: &ProjectLOESummary,
    derived: &ProjectLOESummary,
) -> Result<(), ConsistencyError> {
    if authoritative.total_sub_areas != derived.total_sub_areas {
        return Err(mismatch(
            "total_sub_areas",
            authoritative.total_sub_areas,
            derived.total_sub_areas,
        ));
    }
    if !approx_eq(authoritative.total_hours, derived.total_hours) {
        return Err(mismatch(
            "total_hours",
            authoritative.total_hours,
            derived.total_hours,
        ));
    }
    if !approx_eq(
        authoritative.avg_confidence_score,
        derived.avg_confidence_score,
    ) {
        return Err(mismatch(
            "avg_confidence_score",
            authoritative.avg_confidence_score,
            derived.avg_confidence_score,
        ));
    }

    let local: HashMap<&str, _> = derived
        .sections
        .iter()
        .map(|s| (s.section_id.as_str(), s))
        .collect();

    for section in &authoritative.sections {
        let Some(other) = local.get(section.section_id.as_str()) else {
            return Err(ConsistencyError::MissingSection {
                section_id: section.section_id.clone(),
                present_in: "service",
            });
        };
        if section.sub_area_count != other.sub_area_count {
            return Err(mismatch(
                &format!("section {} sub_area_count", section.section_id),
                section.sub_area_count,
                other.sub_area_count,
            ));
        }
        if !approx_eq(section.total_hours, other.total_hours) {
            return Err(mismatch(
                &format!("section {} total_hours", section.section_id),
                section.total_hours,
                other.total_hours,
            ));
        }
    }

    if let Some(extra) = derived.sections.iter().find(|d| {
        !authoritative
            .sections
            .iter()
            .any(|a| a.section_id == d.section_id)
    }) {
        return Err(ConsistencyError::MissingSection {
            section_id: extra.section_id.clone(),
            present_in: "local",
        });
    }

    Ok(())
}

fn mismatch(field: &str, authoritative: impl ToString, derived: impl ToString) -> ConsistencyError {
    ConsistencyError::Mismatch {
        field: field.to_string(),
        authoritative: authoritative.to_string(),
        derived: derived.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::tests::{create_sub_area, scenario};
    use crate::analysis::aggregator::{summarize_project, GroupingKey};

    #[test]
    fn test_derived_summary_is_consistent() {
        let summary = summarize_project(1, "Metro", &scenario(), GroupingKey::SectionId);
        assert_eq!(check_summary(&summary), Ok(()));
    }

    #[test]
    fn test_float_noise_is_tolerated() {
        let sub_areas: Vec<_> = (0..10)
            .map(|i| {
                let section = format!("Sec{}", i % 3);
                create_sub_area(&format!("S{}", i), &section, Some(i % 3), 0.1, 70.0, 0)
            })
            .collect();
        let summary = summarize_project(1, "Noise", &sub_areas, GroupingKey::SectionId);

        assert_eq!(check_summary(&summary), Ok(()));
    }

    #[test]
    fn test_count_divergence_detected() {
        let mut summary = summarize_project(1, "Metro", &scenario(), GroupingKey::SectionId);
        summary.total_sub_areas = 4;

        assert_eq!(
            check_summary(&summary),
            Err(ConsistencyError::SubAreaCount {
                project: 4,
                sections: 3
            })
        );
    }

    #[test]
    fn test_hours_divergence_detected() {
        let mut summary = summarize_project(1, "Metro", &scenario(), GroupingKey::SectionId);
        summary.sections[0].total_hours += 0.5;

        assert!(matches!(
            check_summary(&summary),
            Err(ConsistencyError::Hours { .. })
        ));
    }

    #[test]
    fn test_compare_matching_summaries() {
        let derived = summarize_project(1, "Metro", &scenario(), GroupingKey::SectionId);
        let mut service = derived.clone();
        // Service orders sections by hours and omits indicator totals.
        service.sections.reverse();
        service.total_indicators = 0;

        assert_eq!(compare_summaries(&service, &derived), Ok(()));
    }

    #[test]
    fn test_compare_detects_mean_of_means() {
        let derived = summarize_project(1, "Metro", &scenario(), GroupingKey::SectionId);
        let mut service = derived.clone();
        service.avg_confidence_score = (50.0 + 80.0) / 2.0;

        let err = compare_summaries(&service, &derived).unwrap_err();
        assert!(err.to_string().contains("avg_confidence_score"));
    }

    #[test]
    fn test_compare_detects_missing_section() {
        let derived = summarize_project(1, "Metro", &scenario(), GroupingKey::SectionId);
        let mut service = derived.clone();
        service.sections[0].section_id = "OTHER".to_string();

        assert!(matches!(
            compare_summaries(&service, &derived),
            Err(ConsistencyError::MissingSection { present_in: "service", .. })
        ));
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(0.1 + 0.2, 0.3));
        assert!(!approx_eq(1.0, 1.001));
        assert!(approx_eq(1e12, 1e12 + 1e-1));
    }
}
