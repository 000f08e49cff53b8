//! Shared HTTP response helpers for the service client.
//!
//! Centralizes status-code mapping and `Content-Disposition` parsing so the
//! client methods stay focused on request construction.

use super::error::{Resource, ServiceError};

/// Map a non-success response onto the error taxonomy.
///
/// - **404** → [`ServiceError::NotFound`]
/// - **408 / 429 / 5xx** → [`ServiceError::Unavailable`]
/// - any other non-success → [`ServiceError::Api`] with the response body
pub async fn check_response(
    resp: reqwest::Response,
    resource: Resource,
) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ServiceError::NotFound { resource });
    }

    let body = resp.text().await.unwrap_or_default();
    if status.is_server_error()
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
    {
        return Err(ServiceError::Unavailable {
            message: format!("{} {}", status, body).trim().to_string(),
        });
    }

    Err(ServiceError::Api {
        status: status.as_u16(),
        message: body,
    })
}

/// Classify a transport failure.
pub fn send_error(e: reqwest::Error, base_url: &str) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Unavailable {
            message: "request timed out".to_string(),
        }
    } else if e.is_connect() {
        ServiceError::Unavailable {
            message: format!("cannot connect to {}", base_url),
        }
    } else {
        ServiceError::Http(e)
    }
}

/// Extract a download filename from a `Content-Disposition` header value.
///
/// Prefers the RFC 5987 `filename*=UTF-8''...` form, then plain `filename=`.
/// Directory components are stripped.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';').map(str::trim) {
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = value.trim().splitn(3, '\'').nth(2).unwrap_or(value.trim());
                extended = urlencoding::decode(encoded).ok().map(|s| s.into_owned());
            }
            "filename" => {
                plain = Some(value.trim().trim_matches('"').to_string());
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .and_then(|name| {
            name.rsplit(['/', '\\'])
                .next()
                .map(|s| s.trim().to_string())
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}

/// Filename used when the service does not supply one.
pub fn default_workbook_filename(project_id: i64) -> String {
    format!("Project-{}-Scoping-Workbook.xlsx", project_id)
}
