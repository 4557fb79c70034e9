//! Facebook page posting through the Graph API

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::http::{self, media_failure, transport_error};
use super::{PlatformClient, PostingResult, PublishedPost};
use crate::config::PlatformAccountConfig;
use crate::error::Result;
use crate::types::Platform;

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v18.0";

#[derive(Deserialize)]
struct GraphId {
    id: String,
    /// Set by the photos edge: the id of the feed story wrapping the photo
    post_id: Option<String>,
}

pub struct FacebookClient {
    http: Client,
    token: SecretString,
    page_id: String,
    api_base: String,
}

impl FacebookClient {
    pub fn new(account: &PlatformAccountConfig) -> Result<Self> {
        Ok(Self {
            http: http::build_client()?,
            token: SecretString::from(account.access_token.clone()),
            page_id: account.account_id.clone(),
            api_base: http::api_base(account.api_base.as_deref(), DEFAULT_API_BASE),
        })
    }

    async fn publish(&self, edge: &str, params: &[(&str, &str)], context: &str) -> PostingResult<GraphId> {
        let response = self
            .http
            .post(format!("{}/{}/{}", self.api_base, self.page_id, edge))
            .form(params)
            .send()
            .await
            .map_err(|e| transport_error(Platform::Facebook, context, e))?;
        http::json(Platform::Facebook, context, response).await
    }
}

#[async_trait]
impl PlatformClient for FacebookClient {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn post(&self, content: &str, image_url: Option<&str>) -> PostingResult<PublishedPost> {
        let token = self.token.expose_secret();

        let created = match image_url {
            Some(url) => self
                .publish(
                    "photos",
                    &[("url", url), ("caption", content), ("access_token", token)],
                    "photo posting",
                )
                .await
                .map_err(media_failure)?,
            None => {
                self.publish(
                    "feed",
                    &[("message", content), ("access_token", token)],
                    "posting",
                )
                .await?
            }
        };

        let post_id = created.post_id.unwrap_or(created.id);
        Ok(PublishedPost {
            url: format!("https://www.facebook.com/{}", post_id),
            post_id,
        })
    }
}
