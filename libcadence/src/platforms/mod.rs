//! Platform clients
//!
//! Every publishing target implements [`PlatformClient`]. Clients take the
//! final text and an optional image URL and either publish or report a
//! [`PlatformError`]. They never retry on their own and never drop the image
//! silently: a failed image step is reported as [`PlatformError::Media`] so
//! the publisher can decide to degrade to text-only.
//!
//! # Examples
//!
//! ```no_run
//! use libcadence::config::Config;
//! use libcadence::platforms::PlatformTable;
//! use libcadence::Platform;
//!
//! # async fn example() -> libcadence::Result<()> {
//! let config = Config::load()?;
//! let table = PlatformTable::from_config(&config.platforms)?;
//!
//! if let Some(client) = table.get(Platform::LinkedIn) {
//!     let published = client.post("Hello from Cadence", None).await?;
//!     println!("Published {} at {}", published.post_id, published.url);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PlatformsConfig;
use crate::error::{PlatformError, Result};
use crate::types::Platform;

pub mod facebook;
mod http;
pub mod instagram;
pub mod linkedin;
pub mod twitter;

// Mock client is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Result type of a single platform call
pub type PostingResult<T> = std::result::Result<T, PlatformError>;

/// What a platform hands back for a published post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    /// Platform-specific post ID
    pub post_id: String,
    /// Public URL of the post
    pub url: String,
}

/// A connected publishing target
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// The platform this client publishes to
    fn platform(&self) -> Platform;

    /// Publish `content`, attaching `image_url` when given.
    ///
    /// # Errors
    ///
    /// - `PlatformError::Media` if the image could not be uploaded or attached
    /// - `PlatformError::Authentication` for rejected credentials
    /// - `PlatformError::Validation` if the platform refused the content
    /// - `PlatformError::RateLimit` / `PlatformError::Network` for transient failures
    async fn post(&self, content: &str, image_url: Option<&str>) -> PostingResult<PublishedPost>;
}

/// Fixed table of clients, one slot per [`Platform`]
#[derive(Clone, Default)]
pub struct PlatformTable {
    clients: [Option<Arc<dyn PlatformClient>>; 4],
}

impl PlatformTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP clients for every enabled account in the configuration
    pub fn from_config(config: &PlatformsConfig) -> Result<Self> {
        let mut table = Self::new();

        if let Some(account) = config.account(Platform::LinkedIn) {
            table.insert(Arc::new(linkedin::LinkedInClient::new(account)?));
        }
        if let Some(account) = config.account(Platform::Facebook) {
            table.insert(Arc::new(facebook::FacebookClient::new(account)?));
        }
        if let Some(account) = config.account(Platform::Twitter) {
            table.insert(Arc::new(twitter::TwitterClient::new(account)?));
        }
        if let Some(account) = config.account(Platform::Instagram) {
            table.insert(Arc::new(instagram::InstagramClient::new(account)?));
        }

        tracing::debug!("Configured platforms: {:?}", table.configured());
        Ok(table)
    }

    /// Register `client` under its own platform, replacing any previous one
    pub fn insert(&mut self, client: Arc<dyn PlatformClient>) {
        let slot = client.platform().index();
        self.clients[slot] = Some(client);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.insert(client);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn PlatformClient>> {
        self.clients[platform.index()].as_ref()
    }

    /// Platforms that have a client, in [`Platform::ALL`] order
    pub fn configured(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.clients[p.index()].is_some())
            .collect()
    }
}

impl fmt::Debug for PlatformTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformTable")
            .field("configured", &self.configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockClient;
    use super::*;
    use crate::config::PlatformAccountConfig;

    #[test]
    fn test_table_indexes_by_platform() {
        let table = PlatformTable::new()
            .with(Arc::new(MockClient::success(Platform::Twitter)))
            .with(Arc::new(MockClient::success(Platform::LinkedIn)));

        assert!(table.get(Platform::Twitter).is_some());
        assert!(table.get(Platform::Facebook).is_none());
        assert_eq!(
            table.configured(),
            vec![Platform::LinkedIn, Platform::Twitter]
        );
        assert_eq!(
            table.get(Platform::Twitter).unwrap().platform(),
            Platform::Twitter
        );
    }

    #[test]
    fn test_insert_replaces_existing_client() {
        let first = Arc::new(MockClient::success(Platform::Facebook));
        let second = Arc::new(MockClient::failure(
            Platform::Facebook,
            PlatformError::Posting("down".to_string()),
        ));
        let mut table = PlatformTable::new();
        table.insert(first);
        table.insert(second);
        assert_eq!(table.configured(), vec![Platform::Facebook]);
    }

    #[test]
    fn test_from_config_skips_disabled_accounts() {
        let config = PlatformsConfig {
            linkedin: Some(PlatformAccountConfig {
                enabled: true,
                access_token: "token".to_string(),
                account_id: "abc".to_string(),
                api_base: None,
            }),
            instagram: Some(PlatformAccountConfig {
                enabled: false,
                access_token: "token".to_string(),
                account_id: "ig".to_string(),
                api_base: None,
            }),
            ..Default::default()
        };

        let table = PlatformTable::from_config(&config).unwrap();
        assert_eq!(table.configured(), vec![Platform::LinkedIn]);
    }

    #[test]
    fn test_debug_lists_configured_platforms() {
        let table = PlatformTable::new().with(Arc::new(MockClient::success(Platform::Instagram)));
        assert!(format!("{:?}", table).contains("Instagram"));
    }
}
