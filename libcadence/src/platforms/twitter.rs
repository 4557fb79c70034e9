//! Twitter/X platform implementation
//!
//! Tweets go through the v2 API. Images are re-uploaded through the v1.1
//! media endpoint as base64 and attached by media id.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::http::{self, media_failure, transport_error};
use super::{PlatformClient, PostingResult, PublishedPost};
use crate::config::PlatformAccountConfig;
use crate::error::Result;
use crate::types::Platform;

const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const DEFAULT_UPLOAD_BASE: &str = "https://upload.twitter.com";

#[derive(Deserialize)]
struct MediaUpload {
    media_id_string: String,
}

#[derive(Deserialize)]
struct TweetEnvelope {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

pub struct TwitterClient {
    http: Client,
    token: SecretString,
    api_base: String,
    upload_base: String,
}

impl TwitterClient {
    pub fn new(account: &PlatformAccountConfig) -> Result<Self> {
        // A single override points both endpoints at the same host
        let override_base = account.api_base.as_deref();
        Ok(Self {
            http: http::build_client()?,
            token: SecretString::from(account.access_token.clone()),
            api_base: http::api_base(override_base, DEFAULT_API_BASE),
            upload_base: http::api_base(override_base, DEFAULT_UPLOAD_BASE),
        })
    }

    async fn upload_media(&self, image_url: &str) -> PostingResult<String> {
        let bytes = http::download(&self.http, Platform::Twitter, image_url).await?;
        let encoded = STANDARD.encode(bytes);

        let response = self
            .http
            .post(format!("{}/1.1/media/upload.json", self.upload_base))
            .bearer_auth(self.token.expose_secret())
            .form(&[("media_data", encoded.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(Platform::Twitter, "media upload", e))?;
        let uploaded: MediaUpload = http::json(Platform::Twitter, "media upload", response).await?;
        Ok(uploaded.media_id_string)
    }
}

#[async_trait]
impl PlatformClient for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn post(&self, content: &str, image_url: Option<&str>) -> PostingResult<PublishedPost> {
        let mut payload = json!({ "text": content });
        if let Some(url) = image_url {
            let media_id = self.upload_media(url).await.map_err(media_failure)?;
            payload["media"] = json!({ "media_ids": [media_id] });
        }

        let response = self
            .http
            .post(format!("{}/2/tweets", self.api_base))
            .bearer_auth(self.token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(Platform::Twitter, "posting", e))?;
        let tweet: TweetEnvelope = http::json(Platform::Twitter, "posting", response).await?;

        Ok(PublishedPost {
            url: format!("https://twitter.com/i/web/status/{}", tweet.data.id),
            post_id: tweet.data.id,
        })
    }
}
