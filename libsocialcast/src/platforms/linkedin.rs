//! LinkedIn platform implementation
//!
//! Publishes through the UGC share API. Every request carries the
//! `X-Restli-Protocol-Version: 2.0.0` header. The returned `id` is a full
//! URN (`urn:li:share:...`) and is stored verbatim.

use async_trait::async_trait;

use crate::config::LinkedInConfig;
use crate::error::{PlatformError, Result};
use crate::httpclient::{parse_json, HttpClient};
use crate::platforms::{Platform, PublishRequest};

const RESTLI_HEADER: (&str, &str) = ("X-Restli-Protocol-Version", "2.0.0");

pub struct LinkedInPlatform {
    http: HttpClient,
    base_url: String,
    api_version: String,
}

impl LinkedInPlatform {
    pub fn new(http: HttpClient, config: &LinkedInConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_version: config.api_version.clone(),
        }
    }

    fn ugc_endpoint(&self) -> String {
        format!("{}/{}/ugcPosts", self.base_url, self.api_version)
    }
}

#[async_trait]
impl Platform for LinkedInPlatform {
    fn name(&self) -> &str {
        "linkedin"
    }

    fn validate(&self, request: &PublishRequest) -> Result<()> {
        if request.author_urn.as_deref().unwrap_or("").is_empty() {
            return Err(PlatformError::Validation(
                "LinkedIn author URN is required (person account or organization fallback)"
                    .to_string(),
            )
            .into());
        }
        if request.access_token.is_empty() {
            return Err(PlatformError::Authentication(
                "LinkedIn access token is required".to_string(),
            )
            .into());
        }
        Ok(())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        self.validate(request)?;

        let author = request.author_urn.as_deref().unwrap_or_default();
        let payload = ugc_post_payload(author, &request.message, request.link_url.as_deref());
        let auth = format!("Bearer {}", request.access_token);

        let response = self
            .http
            .post_json(
                &self.ugc_endpoint(),
                &[("Authorization", auth.as_str()), RESTLI_HEADER],
                &payload,
            )
            .await?;

        let json = parse_json(&response.body)?;
        json["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PlatformError::Protocol(format!(
                    "LinkedIn response missing id: {}",
                    response.body
                ))
                .into()
            })
    }
}

/// UGC share payload. A link turns the share into an ARTICLE with one READY
/// media entry; otherwise the media category is NONE. Visibility is always
/// PUBLIC.
pub fn ugc_post_payload(
    author_urn: &str,
    message: &str,
    link_url: Option<&str>,
) -> serde_json::Value {
    let share_content = match link_url.filter(|l| !l.is_empty()) {
        Some(link) => serde_json::json!({
            "shareCommentary": { "text": message },
            "shareMediaCategory": "ARTICLE",
            "media": [{
                "status": "READY",
                "originalUrl": link,
            }],
        }),
        None => serde_json::json!({
            "shareCommentary": { "text": message },
            "shareMediaCategory": "NONE",
        }),
    };

    serde_json::json!({
        "author": author_urn,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": share_content,
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ugc_payload_without_link() {
        let payload = ugc_post_payload("urn:li:person:u1", "Hello world", None);

        assert_eq!(payload["author"], "urn:li:person:u1");
        assert_eq!(payload["lifecycleState"], "PUBLISHED");

        let content = &payload["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(content["shareCommentary"]["text"], "Hello world");
        assert_eq!(content["shareMediaCategory"], "NONE");
        assert!(content.get("media").is_none());

        assert_eq!(
            payload["visibility"]["com.linkedin.ugc.MemberNetworkVisibility"],
            "PUBLIC"
        );
    }

    #[test]
    fn test_ugc_payload_with_link_is_article() {
        let payload = ugc_post_payload(
            "urn:li:organization:42",
            "Read this",
            Some("https://example.com/post"),
        );

        let content = &payload["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(content["shareMediaCategory"], "ARTICLE");
        assert_eq!(content["media"][0]["status"], "READY");
        assert_eq!(content["media"][0]["originalUrl"], "https://example.com/post");
    }

    #[test]
    fn test_ugc_payload_empty_link_is_none_category() {
        let payload = ugc_post_payload("urn:li:person:u1", "Hello", Some(""));
        let content = &payload["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(content["shareMediaCategory"], "NONE");
    }

    #[test]
    fn test_validate_requires_author_and_token() {
        let http = HttpClient::new();
        let config = LinkedInConfig {
            client_id: "CID".to_string(),
            client_secret: "CS".to_string(),
            redirect_uri: None,
            scopes: String::new(),
            api_version: "v2".to_string(),
            base_url: "https://api.linkedin.com".to_string(),
            organization_id: None,
            access_token: None,
        };
        let platform = LinkedInPlatform::new(http, &config);

        let request = PublishRequest {
            title: "t".to_string(),
            message: "m".to_string(),
            link_url: None,
            image_urls: vec![],
            access_token: "tok".to_string(),
            target_id: None,
            author_urn: None,
        };
        assert!(platform.validate(&request).is_err());

        let request = PublishRequest {
            author_urn: Some("urn:li:person:u1".to_string()),
            access_token: String::new(),
            ..request
        };
        assert!(platform.validate(&request).is_err());

        let request = PublishRequest {
            access_token: "tok".to_string(),
            ..request
        };
        assert!(platform.validate(&request).is_ok());
    }
}
