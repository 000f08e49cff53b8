//! Client for the remote assessment service.
//!
//! The service owns questions, applicability rules, LOE scoring, project
//! persistence and workbook rendering. This client exposes each of its
//! operations as a typed async method.

pub mod error;
pub mod generation;
pub mod http;

pub use error::{Resource, ServiceError};
pub use generation::Latest;

use crate::analysis::sort_sections_by_chapter;
use crate::config::ServiceConfig;
use crate::models::{
    AssessmentPreview, HealthStatus, Project, ProjectAnswers, ProjectApplicabilityResult,
    ProjectCreate, ProjectLOESummary, ProjectUpdate, Question, Section, SectionSummary, SubArea,
    SubAreaDetail,
};
use self::http::{
    check_response, default_workbook_filename, filename_from_content_disposition, send_error,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// A downloaded scoping workbook.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Workbook {
    /// Write the workbook into `dir`, returning the file path.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Typed client for the assessment service API.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    /// Create a client from service settings.
    ///
    /// A zero timeout leaves requests unbounded.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let mut builder = reqwest::Client::builder();
        if config.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_seconds));
        }
        let http = builder.build()?;

        info!("Using assessment service at {}", config.base_url);
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        resource: Resource,
    ) -> Result<reqwest::Response, ServiceError> {
        let resp = request
            .send()
            .await
            .map_err(|e| send_error(e, &self.base_url))?;
        check_response(resp, resource).await
    }

    async fn decode<T: DeserializeOwned>(
        resp: reqwest::Response,
        resource: Resource,
    ) -> Result<T, ServiceError> {
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ServiceError::Decode {
            resource,
            message: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: Resource,
    ) -> Result<T, ServiceError> {
        debug!("GET {}", path);
        let resp = self.send(self.http.get(self.url(path)), resource).await?;
        Self::decode(resp, resource).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
        resource: Resource,
    ) -> Result<T, ServiceError> {
        debug!("{} {}", method, path);
        let request = self.http.request(method, self.url(path)).json(body);
        let resp = self.send(request, resource).await?;
        Self::decode(resp, resource).await
    }

    /// Check service health.
    pub async fn health(&self) -> Result<HealthStatus, ServiceError> {
        self.get_json("/health", Resource::Health).await
    }

    /// All questionnaire questions, in display order.
    pub async fn list_questions(&self) -> Result<Vec<Question>, ServiceError> {
        let mut questions: Vec<Question> =
            self.get_json("/api/questions", Resource::Questions).await?;
        questions.sort_by_key(|q| q.display_order);
        Ok(questions)
    }

    /// One question with its options, by `question_key`.
    pub async fn get_question(&self, key: &str) -> Result<Question, ServiceError> {
        self.get_json(
            &format!("/api/questions/{}", urlencoding::encode(key)),
            Resource::Question,
        )
        .await
    }

    pub async fn list_sections(&self) -> Result<Vec<Section>, ServiceError> {
        self.get_json("/api/sections", Resource::Sections).await
    }

    pub async fn get_section(&self, id: &str) -> Result<Section, ServiceError> {
        self.get_json(
            &format!("/api/sections/{}", urlencoding::encode(id)),
            Resource::Section,
        )
        .await
    }

    /// Catalog-wide per-section statistics.
    pub async fn section_summaries(&self) -> Result<Vec<SectionSummary>, ServiceError> {
        self.get_json("/api/sections/summary", Resource::Sections)
            .await
    }

    /// Sub-area catalog, optionally restricted to one section.
    pub async fn list_sub_areas(
        &self,
        section_id: Option<&str>,
    ) -> Result<Vec<SubArea>, ServiceError> {
        debug!("GET /api/sub-areas (section: {:?})", section_id);
        let mut request = self.http.get(self.url("/api/sub-areas"));
        if let Some(section_id) = section_id {
            request = request.query(&[("section_id", section_id)]);
        }
        let resp = self.send(request, Resource::SubAreas).await?;
        Self::decode(resp, Resource::SubAreas).await
    }

    /// Full catalog record of a sub-area: review guidance, indicators of
    /// compliance and deficiencies.
    pub async fn sub_area_detail(&self, id: &str) -> Result<SubAreaDetail, ServiceError> {
        self.get_json(
            &format!("/api/sub-areas/{}", urlencoding::encode(id)),
            Resource::SubArea,
        )
        .await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        self.get_json("/api/projects", Resource::Project).await
    }

    pub async fn create_project(&self, project: &ProjectCreate) -> Result<Project, ServiceError> {
        self.send_json(
            reqwest::Method::POST,
            "/api/projects",
            project,
            Resource::Project,
        )
        .await
    }

    pub async fn get_project(&self, id: i64) -> Result<Project, ServiceError> {
        self.get_json(&format!("/api/projects/{}", id), Resource::Project)
            .await
    }

    pub async fn update_project(
        &self,
        id: i64,
        update: &ProjectUpdate,
    ) -> Result<Project, ServiceError> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("/api/projects/{}", id),
            update,
            Resource::Project,
        )
        .await
    }

    /// Delete a project. Callers confirm with the user first.
    pub async fn delete_project(&self, id: i64) -> Result<(), ServiceError> {
        let path = format!("/api/projects/{}", id);
        debug!("DELETE {}", path);
        self.send(self.http.delete(self.url(&path)), Resource::Project)
            .await?;
        Ok(())
    }

    /// Submit answers; the service recomputes applicability and LOE.
    pub async fn submit_answers(
        &self,
        id: i64,
        answers: &ProjectAnswers,
    ) -> Result<ProjectApplicabilityResult, ServiceError> {
        self.send_json(
            reqwest::Method::POST,
            &format!("/api/projects/{}/answers", id),
            answers,
            Resource::Project,
        )
        .await
    }

    /// Re-read the applicability result of the last submission.
    pub async fn applicable_sub_areas(
        &self,
        id: i64,
    ) -> Result<ProjectApplicabilityResult, ServiceError> {
        self.get_json(
            &format!("/api/projects/{}/applicable-sub-areas", id),
            Resource::ApplicabilityResults,
        )
        .await
    }

    /// The service's pre-aggregated LOE summary, sections in chapter order.
    pub async fn loe_summary(&self, id: i64) -> Result<ProjectLOESummary, ServiceError> {
        let mut summary: ProjectLOESummary = self
            .get_json(
                &format!("/api/projects/{}/loe-summary", id),
                Resource::LoeSummary,
            )
            .await?;
        sort_sections_by_chapter(&mut summary.sections);
        Ok(summary)
    }

    /// Download the scoping workbook for a project.
    pub async fn export_workbook(&self, id: i64) -> Result<Workbook, ServiceError> {
        let path = format!("/api/projects/{}/export-workbook", id);
        debug!("GET {}", path);
        let resp = self
            .send(self.http.get(self.url(&path)), Resource::Workbook)
            .await?;

        let filename = resp
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| default_workbook_filename(id));
        let bytes = resp.bytes().await?.to_vec();

        debug!("Downloaded {} ({} bytes)", filename, bytes.len());
        Ok(Workbook { filename, bytes })
    }

    /// Evaluate answers without creating a project.
    pub async fn assess(
        &self,
        answers: &ProjectAnswers,
    ) -> Result<AssessmentPreview, ServiceError> {
        self.send_json(
            reqwest::Method::POST,
            "/api/assess",
            answers,
            Resource::Assessment,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ServiceClient {
        ServiceClient::new(&ServiceConfig {
            base_url: format!("{}/", server.uri()),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn project_json(id: i64, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "description": null,
            "created_at": "2024-05-01T12:00:00",
            "updated_at": "2024-05-01T12:00:00"
        })
    }

    #[tokio::test]
    async fn test_list_questions_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/questions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 2, "question_key": "funding", "question_text": "Funding?",
                 "question_type": "checkbox", "display_order": 2, "is_required": true,
                 "options": [{"id": 1, "option_value": "5307", "option_label": "Section 5307",
                              "display_order": 1}]},
                {"id": 1, "question_key": "recipient_type", "question_text": "Recipient?",
                 "question_type": "radio", "display_order": 1, "is_required": true}
            ])))
            .mount(&server)
            .await;

        let questions = client_for(&server).list_questions().await.unwrap();
        assert_eq!(questions[0].question_key, "recipient_type");
        assert!(questions[1].question_type.is_multi_select());
        assert!(questions[0].options.is_empty());
    }

    #[tokio::test]
    async fn test_submit_answers_posts_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/projects/7/answers"))
            .and(body_json(json!({
                "answers": {"funding": "[\"5307\"]", "recipient_type": "state"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project_id": 7,
                "applicable_count": 1,
                "applicable_sub_areas": [
                    {"section_id": "PROC", "section_name": "Procurement", "sub_area_id": 12,
                     "question": "Q", "basic_requirement": "R", "loe_hours": 3.0,
                     "loe_confidence": "high", "loe_confidence_score": 82}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut answers = ProjectAnswers::default();
        answers.answers.insert("recipient_type".to_string(), "state".to_string());
        answers.answers.insert("funding".to_string(), "[\"5307\"]".to_string());

        let result = client_for(&server).submit_answers(7, &answers).await.unwrap();
        assert_eq!(result.applicable_count, 1);
        assert_eq!(result.applicable_sub_areas[0].sub_area_id, "12");
    }

    #[tokio::test]
    async fn test_loe_summary_sections_sorted_by_chapter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects/4/loe-summary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project_id": 4,
                "project_name": "Metro",
                "total_sub_areas": 3,
                "total_hours": 10.0,
                "avg_confidence_score": 70.0,
                "sections": [
                    {"section_id": "PROC", "section_name": "Procurement", "chapter_number": 3,
                     "sub_area_count": 2, "total_hours": 8.0, "avg_confidence_score": 80.0,
                     "indicator_count": 3},
                    {"section_id": "SAFE", "section_name": "Safety",
                     "sub_area_count": 0, "total_hours": 0.0, "avg_confidence_score": 0.0},
                    {"section_id": "ADA", "section_name": "ADA", "chapter_number": 1,
                     "sub_area_count": 1, "total_hours": 2.0, "avg_confidence_score": 50.0}
                ]
            })))
            .mount(&server)
            .await;

        let summary = client_for(&server).loe_summary(4).await.unwrap();
        let ids: Vec<&str> = summary.sections.iter().map(|s| s.section_id.as_str()).collect();
        assert_eq!(ids, vec!["ADA", "PROC", "SAFE"]);
        assert_eq!(summary.sections[1].total_indicators, 3);
    }

    #[tokio::test]
    async fn test_missing_summary_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects/3/loe-summary"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Project not found"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).loe_summary(3).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { resource: Resource::LoeSummary }));
        assert!(err.user_message().contains("complete the assessment first"));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server).list_projects().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_project(1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Decode { resource: Resource::Project, .. }));
    }

    #[tokio::test]
    async fn test_project_crud() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/projects"))
            .and(body_json(json!({"name": "Metro"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(project_json(4, "Metro")))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/projects/4"))
            .and(body_json(json!({"name": "Metro Transit"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(project_json(4, "Metro Transit")),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/projects/4"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let created = client
            .create_project(&ProjectCreate {
                name: "Metro".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id, 4);

        let updated = client
            .update_project(
                4,
                &ProjectUpdate {
                    name: Some("Metro Transit".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Metro Transit");

        client.delete_project(4).await.unwrap();
    }

    #[tokio::test]
    async fn test_export_workbook_uses_server_filename() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects/9/export-workbook"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "content-disposition",
                        "attachment; filename*=UTF-8''Metro%20Scoping.xlsx",
                    )
                    .set_body_bytes(vec![0x50, 0x4b, 0x03, 0x04]),
            )
            .mount(&server)
            .await;

        let workbook = client_for(&server).export_workbook(9).await.unwrap();
        assert_eq!(workbook.filename, "Metro Scoping.xlsx");
        assert_eq!(workbook.bytes, vec![0x50, 0x4b, 0x03, 0x04]);

        let dir = tempfile::tempdir().unwrap();
        let written = workbook.write_to(dir.path()).unwrap();
        assert_eq!(std::fs::read(written).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_export_workbook_default_filename() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects/9/export-workbook"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .mount(&server)
            .await;

        let workbook = client_for(&server).export_workbook(9).await.unwrap();
        assert_eq!(workbook.filename, "Project-9-Scoping-Workbook.xlsx");
    }

    #[tokio::test]
    async fn test_list_sub_areas_filters_by_section() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sub-areas"))
            .and(query_param("section_id", "PROC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 12, "section_id": "PROC", "question": "Q", "loe_hours": "4.50",
                 "loe_confidence_score": 70}
            ])))
            .mount(&server)
            .await;

        let sub_areas = client_for(&server).list_sub_areas(Some("PROC")).await.unwrap();
        assert_eq!(sub_areas.len(), 1);
        assert_eq!(sub_areas[0].loe_hours, Some(4.5));
    }

    #[tokio::test]
    async fn test_sub_area_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sub-areas/P4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "P4",
                "section_id": "PROC",
                "question": "Written procedures?",
                "loe_hours": "4.25",
                "basic_requirement": "Maintain written procedures.",
                "loe_reasoning": "Manual review",
                "indicators": [
                    {"id": 1, "indicator_id": "P4.1", "text": "Manual on file"},
                    {"id": 2, "indicator_id": "P4.2", "text": "Manual current"}
                ],
                "deficiencies": [{"id": 9, "code": "P4-1", "title": "Lacking procedures"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let detail = client_for(&server).sub_area_detail("P4").await.unwrap();
        assert_eq!(detail.sub_area.section_id, "PROC");
        assert_eq!(detail.indicators.len(), 2);
        assert_eq!(detail.deficiencies[0].title, "Lacking procedures");
        assert_eq!(detail.loe_reasoning.as_deref(), Some("Manual review"));
    }

    #[tokio::test]
    async fn test_missing_sub_area_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sub-areas/NOPE"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Sub-area not found"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).sub_area_detail("NOPE").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { resource: Resource::SubArea }));
        assert_eq!(err.user_message(), "The requested sub-area was not found.");
    }

    #[tokio::test]
    async fn test_get_section_and_question() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sections/PROC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "PROC",
                "title": "Procurement",
                "page_range": "12-30",
                "purpose": "Third-party contracting"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/questions/recipient_type"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1, "question_key": "recipient_type", "question_text": "Recipient?",
                "question_type": "radio", "display_order": 1, "is_required": true,
                "options": [{"id": 1, "option_value": "state", "option_label": "State",
                             "display_order": 1}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let section = client.get_section("PROC").await.unwrap();
        assert_eq!(section.section_name, "Procurement");

        let question = client.get_question("recipient_type").await.unwrap();
        assert!(question.accepts("state"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let client = ServiceClient::new(&ServiceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
        })
        .unwrap();

        let err = client.health().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
