//! Per-project read-model cache.
//!
//! A session holds the last accepted applicability result and LOE summary
//! for one project, plus the client-local view state. View changes work on
//! the cached data and never trigger a fetch.

use crate::analysis::{
    check_summary, compare_summaries, group_by_section, project_results, summarize_project,
    ConsistencyError, GroupingKey, ResultsProjection, ViewEvent, ViewState,
};
use crate::client::{Latest, ServiceClient, ServiceError};
use crate::models::{section_label, ProjectApplicabilityResult, ProjectLOESummary, SubAreaDetail};
use tracing::{debug, warn};

pub struct ProjectSession {
    client: ServiceClient,
    project_id: i64,
    grouping: GroupingKey,
    results: Latest<ProjectApplicabilityResult>,
    summary: Latest<ProjectLOESummary>,
    view: ViewState,
}

impl ProjectSession {
    pub fn new(client: ServiceClient, project_id: i64, grouping: GroupingKey) -> Self {
        Self {
            client,
            project_id,
            grouping,
            results: Latest::new(),
            summary: Latest::new(),
            view: ViewState::default(),
        }
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    pub fn grouping(&self) -> GroupingKey {
        self.grouping
    }

    /// Fetch the applicability result.
    pub async fn load_results(
        &mut self,
    ) -> Result<Option<&ProjectApplicabilityResult>, ServiceError> {
        let ticket = self.results.begin();
        let fetched = self.client.applicable_sub_areas(self.project_id).await?;
        if !self.results.resolve(ticket, fetched) {
            debug!(
                "Discarded stale applicability response for project {}",
                self.project_id
            );
        }
        Ok(self.results.get())
    }

    /// Fetch the catalog detail of a cached sub-area and fill in what the
    /// applicability listing left out (indicators, basic requirement).
    ///
    /// Returns `Ok(false)` when the sub-area is not among the cached results.
    pub async fn load_detail(&mut self, sub_area_id: &str) -> Result<bool, ServiceError> {
        let cached = self
            .results
            .get()
            .is_some_and(|r| r.applicable_sub_areas.iter().any(|s| s.sub_area_id == sub_area_id));
        if !cached {
            return Ok(false);
        }

        let detail = self.client.sub_area_detail(sub_area_id).await?;
        Ok(self.merge_detail(detail))
    }

    fn merge_detail(&mut self, detail: SubAreaDetail) -> bool {
        let Some(results) = self.results.get_mut() else {
            return false;
        };
        let Some(sub_area) = results
            .applicable_sub_areas
            .iter_mut()
            .find(|s| s.sub_area_id == detail.sub_area.id)
        else {
            return false;
        };

        if sub_area.indicators.is_empty() {
            sub_area.indicators = detail.indicators;
        }
        if sub_area.basic_requirement.is_empty() {
            if let Some(requirement) = detail.sub_area.basic_requirement {
                sub_area.basic_requirement = requirement;
            }
        }
        true
    }

    /// Fetch the service LOE summary.
    pub async fn load_summary(&mut self) -> Result<Option<&ProjectLOESummary>, ServiceError> {
        let ticket = self.summary.begin();
        let fetched = self.client.loe_summary(self.project_id).await?;
        if !self.summary.resolve(ticket, fetched) {
            debug!("Discarded stale LOE summary for project {}", self.project_id);
        }
        Ok(self.summary.get())
    }

    /// Fetch both read-models concurrently.
    pub async fn load_all(&mut self) -> Result<(), ServiceError> {
        let results_ticket = self.results.begin();
        let summary_ticket = self.summary.begin();

        let (results, summary) = tokio::try_join!(
            self.client.applicable_sub_areas(self.project_id),
            self.client.loe_summary(self.project_id)
        )?;

        self.results.resolve(results_ticket, results);
        self.summary.resolve(summary_ticket, summary);
        Ok(())
    }

    /// Seed the results cache, e.g. from a submission response.
    pub fn accept_results(&mut self, results: ProjectApplicabilityResult) {
        let ticket = self.results.begin();
        self.results.resolve(ticket, results);
    }

    pub fn results(&self) -> Option<&ProjectApplicabilityResult> {
        self.results.get()
    }

    pub fn summary(&self) -> Option<&ProjectLOESummary> {
        self.summary.get()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Apply a view event. Cached data is reused as is.
    pub fn apply_view(&mut self, event: ViewEvent) {
        self.view = self.view.apply(event);
    }

    /// Section keys of the cached results, in chapter order.
    pub fn section_keys(&self) -> Vec<String> {
        self.results
            .get()
            .map(|r| {
                group_by_section(&r.applicable_sub_areas, self.grouping)
                    .into_iter()
                    .map(|g| g.key)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Find the section a user refers to, by grouping key, section id,
    /// section name or rendered label. Case-insensitive.
    pub fn resolve_section(&self, wanted: &str) -> Option<String> {
        let wanted = wanted.trim();
        let results = self.results.get()?;
        group_by_section(&results.applicable_sub_areas, self.grouping)
            .into_iter()
            .find(|g| {
                [
                    g.key.as_str(),
                    g.section_id.as_str(),
                    g.section_name.as_str(),
                    section_label(g.chapter_number, &g.section_name).as_str(),
                ]
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(wanted))
            })
            .map(|g| g.key)
    }

    /// Expand a section by key. Already expanded sections stay expanded.
    pub fn expand_section(&mut self, key: &str) {
        if !self.view.is_section_expanded(key) {
            self.apply_view(ViewEvent::ToggleSection(key.to_string()));
        }
    }

    /// Expand a sub-area card and the section holding it.
    ///
    /// Returns false when the sub-area is not among the cached results.
    pub fn show_sub_area(&mut self, sub_area_id: &str) -> bool {
        let section_key = self.results.get().and_then(|r| {
            r.applicable_sub_areas
                .iter()
                .find(|s| s.sub_area_id == sub_area_id)
                .map(|s| self.grouping.key_of(s).to_string())
        });
        let Some(section_key) = section_key else {
            return false;
        };

        self.expand_section(&section_key);
        if !self.view.is_sub_area_expanded(sub_area_id) {
            self.apply_view(ViewEvent::ToggleSubArea(sub_area_id.to_string()));
        }
        true
    }

    /// Project the cached results in the current layout.
    pub fn results_view(&self) -> Option<ResultsProjection<'_>> {
        self.results
            .get()
            .map(|r| project_results(&r.applicable_sub_areas, &self.view, self.grouping))
    }

    /// Rebuild the LOE summary locally from the cached results.
    ///
    /// Always grouped by section id, the way the service groups its summary,
    /// whatever grouping the results view uses.
    pub fn derived_summary(&self) -> Option<ProjectLOESummary> {
        let results = self.results.get()?;
        let project_name = self
            .summary
            .get()
            .map(|s| s.project_name.as_str())
            .unwrap_or_default();
        Some(summarize_project(
            self.project_id,
            project_name,
            &results.applicable_sub_areas,
            GroupingKey::SectionId,
        ))
    }

    /// Compare the service summary with the local rollup.
    ///
    /// Returns `Ok(false)` when either read-model has not been loaded.
    pub fn verify(&self) -> Result<bool, ConsistencyError> {
        let (Some(authoritative), Some(derived)) = (self.summary.get(), self.derived_summary())
        else {
            return Ok(false);
        };
        check_summary(authoritative)?;
        if let Err(e) = compare_summaries(authoritative, &derived) {
            warn!(
                "LOE summary for project {} disagrees with local rollup: {}",
                self.project_id, e
            );
            return Err(e);
        }
        Ok(true)
    }
}
