//! Platform dispatch layer
//!
//! One implementation per destination network translates a canonical publish
//! request into that platform's wire format and returns the provider-assigned
//! external ID. Implementations own their base URL, API version, and app
//! secret; per-call credentials travel in the request.

use async_trait::async_trait;

use crate::error::Result;

pub mod external_id;
pub mod facebook;
pub mod instagram;
pub mod linkedin;

// Mock platform is available for all builds to support integration tests
pub mod mock;

/// A canonical post resolved down to what one outbound publish needs.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub title: String,
    pub message: String,
    pub link_url: Option<String>,
    /// Externally fetchable image URLs, in display order.
    pub image_urls: Vec<String>,
    /// Publishing token: Facebook page token, Instagram token, or LinkedIn
    /// member token.
    pub access_token: String,
    /// Facebook page ID or Instagram business account ID.
    pub target_id: Option<String>,
    /// LinkedIn author URN (`urn:li:person:<sub>` or
    /// `urn:li:organization:<id>`).
    pub author_urn: Option<String>,
}

/// Unified interface over the destination platforms.
///
/// `publish` returns the platform-local external ID on success. Failures use
/// the platform error taxonomy: `Authentication` for token problems,
/// `Protocol` when a response lacks an expected field, `Network` for
/// transport trouble.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Lowercase platform identifier ("facebook", "instagram", "linkedin").
    fn name(&self) -> &str;

    /// Check the request against platform requirements before any network
    /// call is made.
    fn validate(&self, request: &PublishRequest) -> Result<()>;

    /// Deliver the post and return the provider-assigned external ID.
    async fn publish(&self, request: &PublishRequest) -> Result<String>;
}
