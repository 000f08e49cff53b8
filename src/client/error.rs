//! Service error types.

use std::fmt;
use thiserror::Error;

/// What a request was fetching, used to phrase not-found messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Health,
    Questions,
    Question,
    Sections,
    Section,
    SubAreas,
    SubArea,
    Project,
    ApplicabilityResults,
    LoeSummary,
    Workbook,
    Assessment,
}

impl Resource {
    /// Whether a missing resource means the assessment has not been run yet.
    fn needs_assessment(&self) -> bool {
        matches!(
            self,
            Resource::ApplicabilityResults | Resource::LoeSummary | Resource::Workbook
        )
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Health => "health status",
            Resource::Questions => "questions",
            Resource::Question => "question",
            Resource::Sections => "sections",
            Resource::Section => "section",
            Resource::SubAreas => "sub-areas",
            Resource::SubArea => "sub-area",
            Resource::Project => "project",
            Resource::ApplicabilityResults => "assessment results",
            Resource::LoeSummary => "LOE summary",
            Resource::Workbook => "scoping workbook",
            Resource::Assessment => "assessment",
        };
        write!(f, "{}", name)
    }
}

/// Errors that can occur when talking to the assessment service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The requested record does not exist.
    #[error("{resource} not found")]
    NotFound { resource: Resource },

    /// The service could not be reached or is temporarily failing.
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    /// The service rejected the request.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("failed to decode {resource}: {message}")]
    Decode { resource: Resource, message: String },
}

impl ServiceError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Unavailable { .. } => true,
            ServiceError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::NotFound { resource } if resource.needs_assessment() => {
                "No assessment results found. Please complete the assessment first.".to_string()
            }
            ServiceError::NotFound { resource } => {
                format!("The requested {} was not found.", resource)
            }
            e if e.is_retryable() => format!("{}. Please try again.", e),
            e => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_directs_to_assessment() {
        let err = ServiceError::NotFound {
            resource: Resource::LoeSummary,
        };
        assert!(err.user_message().contains("complete the assessment first"));
        assert!(!err.is_retryable());

        let err = ServiceError::NotFound {
            resource: Resource::Project,
        };
        assert_eq!(err.user_message(), "The requested project was not found.");
    }

    #[test]
    fn test_unavailable_is_retryable() {
        let err = ServiceError::Unavailable {
            message: "503 Service Unavailable".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.user_message().ends_with("Please try again."));
    }

    #[test]
    fn test_api_error_is_not_retryable() {
        let err = ServiceError::Api {
            status: 422,
            message: "invalid answers".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "API error (422): invalid answers");
    }
}
