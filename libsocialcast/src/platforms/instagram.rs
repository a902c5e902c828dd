//! Instagram platform implementation
//!
//! Creates a media container through the Graph API. The follow-up publish
//! step of the container is a documented non-goal here; the container ID is
//! returned as the external ID.

use async_trait::async_trait;

use crate::config::InstagramConfig;
use crate::error::{PlatformError, Result};
use crate::httpclient::{parse_json, HttpClient};
use crate::platforms::{Platform, PublishRequest};

pub struct InstagramPlatform {
    http: HttpClient,
    base_url: String,
    api_version: String,
}

impl InstagramPlatform {
    pub fn new(http: HttpClient, config: &InstagramConfig, api_version: &str) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_version: api_version.to_string(),
        }
    }

    fn media_endpoint(&self, account_id: &str) -> String {
        format!("{}/{}/{}/media", self.base_url, self.api_version, account_id)
    }
}

#[async_trait]
impl Platform for InstagramPlatform {
    fn name(&self) -> &str {
        "instagram"
    }

    fn validate(&self, request: &PublishRequest) -> Result<()> {
        if request.target_id.as_deref().unwrap_or("").is_empty() {
            return Err(PlatformError::Validation(
                "Instagram business account ID is required".to_string(),
            )
            .into());
        }
        if request.access_token.is_empty() {
            return Err(PlatformError::Authentication(
                "Instagram access token is required".to_string(),
            )
            .into());
        }
        Ok(())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        self.validate(request)?;

        let account_id = request.target_id.as_deref().unwrap_or_default();
        let payload = media_container_payload(&request.message, request.image_urls.first());
        let auth = format!("Bearer {}", request.access_token);

        let response = self
            .http
            .post_json(
                &self.media_endpoint(account_id),
                &[("Authorization", auth.as_str())],
                &payload,
            )
            .await?;

        let json = parse_json(&response.body)?;
        json["id"].as_str().map(|s| s.to_string()).ok_or_else(|| {
            PlatformError::Protocol(format!(
                "Instagram response missing container id: {}",
                response.body
            ))
            .into()
        })
    }
}

fn media_container_payload(caption: &str, image_url: Option<&String>) -> serde_json::Value {
    let mut payload = serde_json::json!({ "caption": caption });
    if let Some(url) = image_url.filter(|u| !u.is_empty()) {
        payload["image_url"] = serde_json::Value::String(url.clone());
    }
    payload
}
