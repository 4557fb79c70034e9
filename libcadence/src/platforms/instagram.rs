//! Instagram business account posting (container, then publish)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::http::{self, media_failure, transport_error};
use super::{PlatformClient, PostingResult, PublishedPost};
use crate::config::PlatformAccountConfig;
use crate::error::{PlatformError, Result};
use crate::types::Platform;

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v18.0";

#[derive(Deserialize)]
struct GraphId {
    id: String,
}

pub struct InstagramClient {
    http: Client,
    token: SecretString,
    account_id: String,
    api_base: String,
}

impl InstagramClient {
    pub fn new(account: &PlatformAccountConfig) -> Result<Self> {
        Ok(Self {
            http: http::build_client()?,
            token: SecretString::from(account.access_token.clone()),
            account_id: account.account_id.clone(),
            api_base: http::api_base(account.api_base.as_deref(), DEFAULT_API_BASE),
        })
    }

    async fn call(&self, edge: &str, params: &[(&str, &str)], context: &str) -> PostingResult<GraphId> {
        let response = self
            .http
            .post(format!("{}/{}/{}", self.api_base, self.account_id, edge))
            .form(params)
            .send()
            .await
            .map_err(|e| transport_error(Platform::Instagram, context, e))?;
        http::json(Platform::Instagram, context, response).await
    }
}

#[async_trait]
impl PlatformClient for InstagramClient {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn post(&self, content: &str, image_url: Option<&str>) -> PostingResult<PublishedPost> {
        // Instagram has no text-only posts
        let image_url = image_url.ok_or_else(|| {
            PlatformError::Validation("Instagram requires an image".to_string())
        })?;
        let token = self.token.expose_secret();

        let container = self
            .call(
                "media",
                &[("image_url", image_url), ("caption", content), ("access_token", token)],
                "media container",
            )
            .await
            .map_err(media_failure)?;

        let published = self
            .call(
                "media_publish",
                &[("creation_id", container.id.as_str()), ("access_token", token)],
                "publishing",
            )
            .await?;

        Ok(PublishedPost {
            url: format!("https://www.instagram.com/p/{}/", published.id),
            post_id: published.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> InstagramClient {
        InstagramClient::new(&PlatformAccountConfig {
            enabled: true,
            access_token: "ig-token".to_string(),
            account_id: "ig-1".to_string(),
            api_base: Some(server.uri()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_text_only_is_validation_error() {
        let server = MockServer::start().await;
        let err = client_for(&server).post("Caption", None).await.unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_container_then_publish() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ig-1/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "container-9" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ig-1/media_publish"))
            .and(body_string_contains("creation_id=container-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "media-3" })))
            .expect(1)
            .mount(&server)
            .await;

        let published = client_for(&server)
            .post("Caption", Some("https://img.example/a.png"))
            .await
            .unwrap();
        assert_eq!(published.post_id, "media-3");
        assert_eq!(published.url, "https://www.instagram.com/p/media-3/");
    }

    #[tokio::test]
    async fn test_container_failure_is_media_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ig-1/media"))
            .respond_with(ResponseTemplate::new(400).set_body_string("image too small"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post("Caption", Some("https://img.example/a.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Media(_)));
    }
}
