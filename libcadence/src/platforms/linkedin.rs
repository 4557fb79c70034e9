//! LinkedIn platform implementation (UGC posts API)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use super::http::{self, media_failure, transport_error};
use super::{PlatformClient, PostingResult, PublishedPost};
use crate::config::PlatformAccountConfig;
use crate::error::{PlatformError, Result};
use crate::types::Platform;

const DEFAULT_API_BASE: &str = "https://api.linkedin.com";

#[derive(Deserialize)]
struct RegisterUploadResponse {
    value: RegisterUploadValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUploadValue {
    asset: String,
    upload_mechanism: UploadMechanism,
}

#[derive(Deserialize)]
struct UploadMechanism {
    #[serde(rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest")]
    request: UploadRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    upload_url: String,
}

pub struct LinkedInClient {
    http: Client,
    token: SecretString,
    author: String,
    api_base: String,
}

impl LinkedInClient {
    pub fn new(account: &PlatformAccountConfig) -> Result<Self> {
        let author = if account.account_id.starts_with("urn:") {
            account.account_id.clone()
        } else {
            format!("urn:li:person:{}", account.account_id)
        };

        Ok(Self {
            http: http::build_client()?,
            token: SecretString::from(account.access_token.clone()),
            author,
            api_base: http::api_base(account.api_base.as_deref(), DEFAULT_API_BASE),
        })
    }

    /// Register an upload, push the image bytes and return the asset URN
    async fn upload_image(&self, image_url: &str) -> PostingResult<String> {
        let register = json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                "owner": self.author,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent"
                }]
            }
        });

        let response = self
            .http
            .post(format!("{}/v2/assets?action=registerUpload", self.api_base))
            .bearer_auth(self.token.expose_secret())
            .json(&register)
            .send()
            .await
            .map_err(|e| transport_error(Platform::LinkedIn, "image registration", e))?;
        let registered: RegisterUploadResponse =
            http::json(Platform::LinkedIn, "image registration", response).await?;

        let bytes = http::download(&self.http, Platform::LinkedIn, image_url).await?;

        let response = self
            .http
            .put(&registered.value.upload_mechanism.request.upload_url)
            .bearer_auth(self.token.expose_secret())
            .body(bytes)
            .send()
            .await
            .map_err(|e| transport_error(Platform::LinkedIn, "image upload", e))?;
        http::check(Platform::LinkedIn, "image upload", response).await?;

        Ok(registered.value.asset)
    }
}

#[async_trait]
impl PlatformClient for LinkedInClient {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    async fn post(&self, content: &str, image_url: Option<&str>) -> PostingResult<PublishedPost> {
        let asset = match image_url {
            Some(url) => Some(self.upload_image(url).await.map_err(media_failure)?),
            None => None,
        };

        let category = if asset.is_some() { "IMAGE" } else { "NONE" };
        let mut share = json!({
            "shareCommentary": { "text": content },
            "shareMediaCategory": category
        });
        if let Some(asset) = &asset {
            share["media"] = json!([{ "status": "READY", "media": asset }]);
        }

        let payload = json!({
            "author": self.author,
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
        });

        let response = self
            .http
            .post(format!("{}/v2/ugcPosts", self.api_base))
            .bearer_auth(self.token.expose_secret())
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(Platform::LinkedIn, "posting", e))?;
        let response = http::check(Platform::LinkedIn, "posting", response).await?;

        // The id comes back in the body or, on some API versions, only as a header
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let post_id = body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(header_id)
            .ok_or_else(|| {
                PlatformError::Posting("LinkedIn response carried no post id".to_string())
            })?;

        tracing::debug!("Published LinkedIn post {}", post_id);
        Ok(PublishedPost {
            url: format!("https://www.linkedin.com/feed/update/{}", post_id),
            post_id,
        })
    }
}
