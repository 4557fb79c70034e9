//! Shared HTTP plumbing for the REST platform clients

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::PostingResult;
use crate::error::PlatformError;
use crate::types::Platform;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client() -> PostingResult<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("cadence/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))
}

/// API base from the account override, without a trailing slash
pub(crate) fn api_base(override_base: Option<&str>, default: &str) -> String {
    override_base
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

pub(crate) fn transport_error(platform: Platform, context: &str, error: reqwest::Error) -> PlatformError {
    PlatformError::Network(format!("{} {} failed: {}", platform, context, error))
}

/// Map a non-success HTTP status onto the platform error taxonomy
pub(crate) fn status_error(
    platform: Platform,
    context: &str,
    status: StatusCode,
    body: &str,
) -> PlatformError {
    let detail = format!("{} {} returned {}: {}", platform, context, status, body.trim());
    match status.as_u16() {
        401 | 403 => PlatformError::Authentication(detail),
        429 => PlatformError::RateLimit(detail),
        400 | 413 | 422 => PlatformError::Validation(detail),
        500..=599 => PlatformError::Network(detail),
        _ => PlatformError::Posting(detail),
    }
}

/// Pass successful responses through, turn the rest into a [`PlatformError`]
pub(crate) async fn check(
    platform: Platform,
    context: &str,
    response: Response,
) -> PostingResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(platform, context, status, &body))
}

/// Check the status and decode the JSON body
pub(crate) async fn json<T: DeserializeOwned>(
    platform: Platform,
    context: &str,
    response: Response,
) -> PostingResult<T> {
    check(platform, context, response)
        .await?
        .json::<T>()
        .await
        .map_err(|e| {
            PlatformError::Posting(format!(
                "{} {} returned an unexpected body: {}",
                platform, context, e
            ))
        })
}

/// Fetch the bytes of an image to re-upload it
pub(crate) async fn download(client: &Client, platform: Platform, url: &str) -> PostingResult<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| transport_error(platform, "image download", e))?;
    let bytes = check(platform, "image download", response)
        .await?
        .bytes()
        .await
        .map_err(|e| transport_error(platform, "image download", e))?;
    Ok(bytes.to_vec())
}

/// Reclassify a failure of the image step.
///
/// Rejected credentials stay authentication failures; everything else
/// becomes [`PlatformError::Media`].
pub(crate) fn media_failure(error: PlatformError) -> PlatformError {
    match error {
        PlatformError::Authentication(_) | PlatformError::Media(_) => error,
        other => PlatformError::Media(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (401, "auth"),
            (403, "auth"),
            (429, "rate"),
            (400, "validation"),
            (422, "validation"),
            (404, "posting"),
            (503, "network"),
        ];
        for (code, expected) in cases {
            let error = status_error(
                Platform::Twitter,
                "posting",
                StatusCode::from_u16(code).unwrap(),
                "body",
            );
            let kind = match error {
                PlatformError::Authentication(_) => "auth",
                PlatformError::RateLimit(_) => "rate",
                PlatformError::Validation(_) => "validation",
                PlatformError::Posting(_) => "posting",
                PlatformError::Network(_) => "network",
                PlatformError::Media(_) => "media",
            };
            assert_eq!(kind, expected, "status {}", code);
        }
    }

    #[test]
    fn test_status_error_message_carries_context() {
        let error = status_error(
            Platform::LinkedIn,
            "image registration",
            StatusCode::BAD_GATEWAY,
            " upstream down\n",
        );
        let message = error.to_string();
        assert!(message.contains("linkedin image registration returned 502"));
        assert!(message.contains("upstream down"));
    }

    #[test]
    fn test_media_failure_keeps_authentication() {
        let auth = PlatformError::Authentication("expired".to_string());
        assert_eq!(media_failure(auth.clone()), auth);

        let network = PlatformError::Network("reset".to_string());
        assert!(matches!(media_failure(network), PlatformError::Media(_)));
    }

    #[test]
    fn test_api_base_trims_trailing_slash() {
        assert_eq!(api_base(Some("http://localhost:8080/"), "x"), "http://localhost:8080");
        assert_eq!(api_base(None, "https://api.example"), "https://api.example");
    }
}
