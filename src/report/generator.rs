//! Markdown and JSON report generation.
//!
//! This module renders projected results, LOE summaries and catalog
//! listings as Markdown, or serializes them as JSON.

use crate::analysis::{ResultsProjection, SectionBar, SectionView, SubAreaCard};
use crate::models::{
    section_label, AssessmentPreview, ConfidenceTier, Project, ProjectLOESummary, Question,
    Section, SectionSummary, SubArea, SubAreaDetail, SubAreaResult,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Width of a full (100%) bar in the hours chart.
const BAR_WIDTH: usize = 20;

/// Outcome of cross-checking the service LOE summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum Verification {
    Consistent,
    Inconsistent(String),
}

/// Everything shown by the results view.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsReport<'a> {
    pub project_id: i64,
    pub project_name: Option<String>,
    pub applicable_count: usize,
    pub generated_at: DateTime<Utc>,
    pub view: ResultsProjection<'a>,
    /// Render indicators for expanded sub-areas.
    #[serde(skip)]
    pub show_indicators: bool,
}

/// Everything shown by the LOE view.
#[derive(Debug, Clone, Serialize)]
pub struct LoeReport<'a> {
    pub summary: &'a ProjectLOESummary,
    pub bars: Vec<SectionBar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    pub generated_at: DateTime<Utc>,
}

/// Serialize any report as pretty JSON.
pub fn generate_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

/// Generate the results report.
pub fn generate_results_markdown(report: &ResultsReport<'_>) -> String {
    let mut output = String::new();

    match report.project_name {
        Some(ref name) => output.push_str(&format!("# Applicable Sub-Areas: {}\n\n", name)),
        None => output.push_str(&format!(
            "# Applicable Sub-Areas: Project {}\n\n",
            report.project_id
        )),
    }

    output.push_str(&format!(
        "- **Applicable Sub-Areas:** {}\n",
        report.applicable_count
    ));
    output.push_str(&format!(
        "- **Generated:** {}\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if report.view.sub_area_count() == 0 {
        output.push_str("No sub-areas apply to this project.\n\n");
        output.push_str(&generate_footer());
        return output;
    }

    match report.view {
        ResultsProjection::Section { ref sections } => {
            for section in sections {
                output.push_str(&generate_section_block(section, report.show_indicators));
            }
            if sections.iter().all(|s| !s.expanded) {
                output.push_str(concat!(
                    "*Use `--expand <SECTION>` (name or id) or `--expand-all` ",
                    "to list sub-areas.*\n\n"
                ));
            }
        }
        ResultsProjection::All { ref cards } => {
            output.push_str("## All Sub-Areas\n\n");
            for card in cards {
                output.push_str(&generate_card(card, true, report.show_indicators));
            }
        }
    }

    output.push_str(&generate_footer());
    output
}

/// Generate one section heading and, when expanded, its cards.
fn generate_section_block(section: &SectionView<'_>, show_indicators: bool) -> String {
    let mut block = String::new();
    let aggregate = &section.aggregate;

    if section.key == aggregate.section_name {
        block.push_str(&format!("## {}\n\n", section.label));
    } else {
        block.push_str(&format!("## {} (`{}`)\n\n", section.label, section.key));
    }
    block.push_str(&format!(
        "*Sub-areas: {} | Hours: {:.2} | Confidence: {} {:.0}% | Indicators: {}*\n\n",
        aggregate.sub_area_count,
        aggregate.total_hours,
        section.tier.emoji(),
        aggregate.avg_confidence_score,
        aggregate.total_indicators
    ));

    if section.expanded {
        for card in &section.cards {
            block.push_str(&generate_card(card, false, show_indicators));
        }
    }

    block
}

/// Generate a single sub-area card.
fn generate_card(card: &SubAreaCard<'_>, with_section: bool, show_indicators: bool) -> String {
    let mut block = String::new();
    let sub_area = card.sub_area;

    block.push_str(&format!(
        "### {} {}\n\n",
        sub_area.sub_area_id,
        display_question(sub_area)
    ));
    if with_section {
        block.push_str(&format!("**Section:** {}\n\n", card.section_label));
    }
    block.push_str(&format!(
        "**LOE:** {:.2} h | {} {} confidence ({:.0}%)\n\n",
        sub_area.loe_hours,
        card.tier.emoji(),
        tier_badge(card.tier),
        sub_area.loe_confidence_score
    ));

    if card.expanded {
        if !sub_area.basic_requirement.is_empty() {
            block.push_str(&format!(
                "> **Basic Requirement:** {}\n\n",
                sub_area.basic_requirement
            ));
        }
        if show_indicators && !sub_area.indicators.is_empty() {
            block.push_str("**Indicators of Compliance:**\n\n");
            for indicator in &sub_area.indicators {
                block.push_str(&format!("- `{}` {}\n", indicator.indicator_id, indicator.text));
            }
            block.push('\n');
        }
    }

    block
}

fn display_question(sub_area: &SubAreaResult) -> &str {
    if sub_area.question.is_empty() {
        "(no question text)"
    } else {
        &sub_area.question
    }
}

fn tier_badge(tier: ConfidenceTier) -> &'static str {
    match tier {
        ConfidenceTier::High => "**HIGH**",
        ConfidenceTier::Medium => "**MEDIUM**",
        ConfidenceTier::Low => "**LOW**",
    }
}

/// Generate the LOE summary report.
pub fn generate_loe_markdown(report: &LoeReport<'_>) -> String {
    let mut output = String::new();
    let summary = report.summary;

    output.push_str(&format!("# LOE Summary: {}\n\n", summary.project_name));

    output.push_str("## Totals\n\n");
    output.push_str("| Sub-Areas | Hours | Avg Confidence | Indicators |\n");
    output.push_str("|:---:|:---:|:---:|:---:|\n");
    output.push_str(&format!(
        "| {} | {:.2} | {} {:.0}% | {} |\n\n",
        summary.total_sub_areas,
        summary.total_hours,
        summary.confidence_tier().emoji(),
        summary.avg_confidence_score,
        summary.total_indicators
    ));

    if let Some(ref verification) = report.verification {
        match verification {
            Verification::Consistent => {
                output.push_str("✅ Service summary matches the local rollup.\n\n")
            }
            Verification::Inconsistent(detail) => output.push_str(&format!(
                "⚠️ Service summary disagrees with the local rollup: {}\n\n",
                detail
            )),
        }
    }

    if summary.sections.is_empty() {
        output.push_str("No applicable sections.\n\n");
        output.push_str(&generate_footer());
        return output;
    }

    output.push_str("## Sections\n\n");
    output.push_str("| Section | Sub-Areas | Hours | Confidence | Indicators |\n");
    output.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    for section in &summary.sections {
        output.push_str(&format!(
            "| {} | {} | {:.2} | {} {:.0}% | {} |\n",
            section.label(),
            section.sub_area_count,
            section.total_hours,
            section.confidence_tier().emoji(),
            section.avg_confidence_score,
            section.total_indicators
        ));
    }
    output.push('\n');

    if !report.bars.is_empty() {
        output.push_str("## Hours by Section\n\n");
        output.push_str("```\n");
        let width = report
            .bars
            .iter()
            .map(|b| b.label.chars().count())
            .max()
            .unwrap_or(0);
        for bar in &report.bars {
            output.push_str(&format!(
                "{:<width$}  {:<bar_width$}  {:>5.1}%  {:.2} h\n",
                bar.label,
                render_bar(bar.percentage),
                bar.percentage,
                bar.total_hours,
                width = width,
                bar_width = BAR_WIDTH
            ));
        }
        output.push_str("```\n\n");
    }

    output.push_str(&generate_footer());
    output
}

/// Draw a bar for a 0-100 percentage.
fn render_bar(percentage: f64) -> String {
    let clamped = percentage.clamp(0.0, 100.0);
    let filled = (clamped / 100.0 * BAR_WIDTH as f64).round() as usize;
    "█".repeat(filled)
}

/// Generate the project list.
pub fn generate_projects_markdown(projects: &[Project]) -> String {
    let mut output = String::new();

    output.push_str("# Projects\n\n");
    if projects.is_empty() {
        output.push_str("No projects yet. Create one with `loescope projects create <NAME>`.\n");
        return output;
    }

    output.push_str("| ID | Name | Grantee | Review Type | Updated |\n");
    output.push_str("|:---:|:---|:---|:---|:---|\n");
    for project in projects {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            project.id,
            project.name,
            project.grantee_name.as_deref().unwrap_or("-"),
            project.review_type.as_deref().unwrap_or("-"),
            project.updated_at.format("%Y-%m-%d")
        ));
    }
    output.push('\n');
    output
}

/// Generate the detail view of one project.
pub fn generate_project_markdown(project: &Project) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", project.name));
    output.push_str(&format!("- **ID:** {}\n", project.id));
    if let Some(ref description) = project.description {
        output.push_str(&format!("- **Description:** {}\n", description));
    }
    if let Some(ref grantee) = project.grantee_name {
        output.push_str(&format!("- **Grantee:** {}\n", grantee));
    }
    if let Some(ref grant_number) = project.grant_number {
        output.push_str(&format!("- **Grant Number:** {}\n", grant_number));
    }
    if let Some(ref review_type) = project.review_type {
        output.push_str(&format!("- **Review Type:** {}\n", review_type));
    }
    output.push_str(&format!(
        "- **Created:** {}\n",
        project.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
        "- **Updated:** {}\n\n",
        project.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}

/// Generate the questionnaire listing.
pub fn generate_questions_markdown(questions: &[Question]) -> String {
    let mut output = String::new();

    output.push_str("# Scoping Questionnaire\n\n");
    for (i, question) in questions.iter().enumerate() {
        let required = if question.is_required { " *(required)*" } else { "" };
        let kind = if question.question_type.is_multi_select() {
            "select any"
        } else {
            "select one"
        };
        output.push_str(&format!(
            "## {}. {}{}\n\n",
            i + 1,
            question.question_text,
            required
        ));
        output.push_str(&format!("Key: `{}` ({})\n\n", question.question_key, kind));
        if let Some(ref help) = question.help_text {
            output.push_str(&format!("> {}\n\n", help));
        }
        for option in &question.options {
            output.push_str(&format!(
                "- `{}` {}\n",
                option.option_value, option.option_label
            ));
        }
        if !question.options.is_empty() {
            output.push('\n');
        }
    }

    output
}

/// Generate the section listing.
pub fn generate_sections_markdown(sections: &[Section]) -> String {
    let mut output = String::new();

    output.push_str("# Sections\n\n");
    output.push_str("| ID | Section | Description |\n");
    output.push_str("|:---|:---|:---|\n");
    for section in sections {
        output.push_str(&format!(
            "| {} | {} | {} |\n",
            section.section_id.as_deref().unwrap_or(&section.id),
            section_label(section.chapter_number, &section.section_name),
            section.description.as_deref().unwrap_or("")
        ));
    }
    output.push('\n');
    output
}

/// Generate the detail view of one section.
pub fn generate_section_markdown(section: &Section) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# {}\n\n",
        section_label(section.chapter_number, &section.section_name)
    ));
    output.push_str(&format!(
        "- **ID:** {}\n",
        section.section_id.as_deref().unwrap_or(&section.id)
    ));
    if let Some(ref pages) = section.page_range {
        output.push_str(&format!("- **Pages:** {}\n", pages));
    }
    output.push('\n');

    if let Some(ref purpose) = section.purpose {
        output.push_str(&format!("## Purpose\n\n{}\n\n", purpose));
    }
    if let Some(ref description) = section.description {
        output.push_str(&format!("{}\n\n", description));
    }

    output
}

/// Generate the catalog-wide section statistics.
pub fn generate_section_summaries_markdown(summaries: &[SectionSummary]) -> String {
    let mut output = String::new();

    output.push_str("# Section Catalog Summary\n\n");
    output.push_str("| Section | Sub-Areas | Total Hours | Avg Hours | Avg Confidence |\n");
    output.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    for summary in summaries {
        let section = &summary.section;
        output.push_str(&format!(
            "| {} | {} | {:.2} | {:.2} | {} {:.0}% |\n",
            section_label(section.chapter_number, &section.section_name),
            summary.sub_area_count,
            summary.total_loe_hours,
            summary.avg_loe_hours,
            ConfidenceTier::from_score(summary.avg_confidence_score).emoji(),
            summary.avg_confidence_score
        ));
    }
    output.push('\n');
    output
}

/// Generate the sub-area catalog listing.
pub fn generate_sub_areas_markdown(sub_areas: &[SubArea]) -> String {
    let mut output = String::new();

    output.push_str("# Sub-Areas\n\n");
    output.push_str("| ID | Section | Question | LOE Hours | Confidence |\n");
    output.push_str("|:---|:---|:---|:---:|:---:|\n");
    for sub_area in sub_areas {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            sub_area.id,
            sub_area.section_id,
            sub_area.question.as_deref().unwrap_or(""),
            sub_area
                .loe_hours
                .map(|h| format!("{:.2}", h))
                .unwrap_or_else(|| "-".to_string()),
            sub_area.loe_confidence.as_deref().unwrap_or("-")
        ));
    }
    output.push('\n');
    output
}

/// Generate the detail view of one sub-area.
pub fn generate_sub_area_detail_markdown(detail: &SubAreaDetail) -> String {
    let mut output = String::new();
    let sub_area = &detail.sub_area;

    output.push_str(&format!("# Sub-Area {}\n\n", sub_area.id));
    if let Some(ref question) = sub_area.question {
        output.push_str(&format!("**{}**\n\n", question));
    }
    output.push_str(&format!("- **Section:** {}\n", sub_area.section_id));
    if let Some(hours) = sub_area.loe_hours {
        output.push_str(&format!("- **LOE:** {:.2} h\n", hours));
    }
    if let Some(score) = sub_area.loe_confidence_score {
        let tier = ConfidenceTier::from_score(score);
        output.push_str(&format!(
            "- **Confidence:** {} {} ({:.0}%)\n",
            tier.emoji(),
            tier_badge(tier),
            score
        ));
    }
    output.push('\n');

    let guidance = [
        ("Basic Requirement", &sub_area.basic_requirement),
        ("Detailed Explanation", &detail.detailed_explanation),
        ("Instructions for Reviewer", &detail.instructions_for_reviewer),
        ("LOE Reasoning", &detail.loe_reasoning),
    ];
    for (title, text) in guidance {
        if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
            output.push_str(&format!("## {}\n\n{}\n\n", title, text));
        }
    }

    if !detail.indicators.is_empty() {
        output.push_str("## Indicators of Compliance\n\n");
        for indicator in &detail.indicators {
            output.push_str(&format!("- `{}` {}\n", indicator.indicator_id, indicator.text));
        }
        output.push('\n');
    }

    if !detail.deficiencies.is_empty() {
        output.push_str("## Deficiencies\n\n");
        output.push_str("| Code | Title | Corrective Action |\n");
        output.push_str("|:---|:---|:---|\n");
        for deficiency in &detail.deficiencies {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                deficiency.code,
                deficiency.title,
                deficiency.suggested_corrective_action.as_deref().unwrap_or("")
            ));
        }
        output.push('\n');
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the stateless assessment preview.
pub fn generate_preview_markdown(preview: &AssessmentPreview) -> String {
    let mut output = String::new();

    output.push_str("# Assessment Preview\n\n");
    output.push_str(&format!(
        "- **Applicable Sub-Areas:** {} of {}\n",
        preview.applicable_sub_areas.len(),
        preview.total_sub_areas
    ));
    output.push_str(&format!("- **Total Hours:** {:.2}\n", preview.total_hours));
    output.push_str(&format!(
        "- **Avg Confidence:** {} {:.0}%\n\n",
        ConfidenceTier::from_score(preview.avg_confidence).emoji(),
        preview.avg_confidence
    ));

    if !preview.applicable_sub_areas.is_empty() {
        output.push_str(&generate_sub_areas_markdown(&preview.applicable_sub_areas));
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by LOEScope v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}
