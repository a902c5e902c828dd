//! Facebook platform implementation
//!
//! Three publish shapes against the Graph API:
//!
//! - no images: JSON post to `/<version>/<pageId>/feed`
//! - one image: form post to `/<version>/<pageId>/photos`
//! - two or more images: each image uploaded to `/photos` with
//!   `published=false`, then one `/feed` post referencing the returned media
//!   fbids via `attached_media[i]`, in input order
//!
//! When an app secret is configured, every call carries an
//! `appsecret_proof` (hex HMAC-SHA256 of the access token under the secret).

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, info};

use crate::config::FacebookConfig;
use crate::error::{PlatformError, Result};
use crate::httpclient::{parse_json, HttpClient};
use crate::platforms::external_id::{extract_post_id, strip_page_prefix};
use crate::platforms::{Platform, PublishRequest};

type HmacSha256 = Hmac<Sha256>;

pub struct FacebookPlatform {
    http: HttpClient,
    base_url: String,
    api_version: String,
    app_secret: Option<String>,
}

impl FacebookPlatform {
    pub fn new(http: HttpClient, config: &FacebookConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_version: config.api_version.clone(),
            app_secret: config.app_secret.clone(),
        }
    }

    fn feed_endpoint(&self, page_id: &str) -> String {
        format!("{}/{}/{}/feed", self.base_url, self.api_version, page_id)
    }

    fn photos_endpoint(&self, page_id: &str) -> String {
        format!("{}/{}/{}/photos", self.base_url, self.api_version, page_id)
    }

    fn proof_for(&self, access_token: &str) -> Option<String> {
        self.app_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .map(|secret| appsecret_proof(access_token, secret))
    }

    /// Text-only post through `/feed` as JSON.
    async fn publish_text(&self, page_id: &str, request: &PublishRequest) -> Result<String> {
        let mut endpoint = self.feed_endpoint(page_id);
        if let Some(proof) = self.proof_for(&request.access_token) {
            endpoint = format!("{}?appsecret_proof={}", endpoint, proof);
        }

        let payload = feed_json_payload(request);
        let auth = format!("Bearer {}", request.access_token);

        let response = self
            .http
            .post_json(&endpoint, &[("Authorization", auth.as_str())], &payload)
            .await?;

        self.external_id_from(&response.body)
    }

    /// Single-image post through `/photos` as a form.
    async fn publish_single_image(
        &self,
        page_id: &str,
        request: &PublishRequest,
        image_url: &str,
    ) -> Result<String> {
        let form = photo_form(
            image_url,
            Some(&full_message(request)),
            &request.access_token,
            self.proof_for(&request.access_token).as_deref(),
            true,
        );

        let response = self
            .http
            .post_form(&self.photos_endpoint(page_id), &form)
            .await?;

        self.external_id_from(&response.body)
    }

    /// Multi-image post: unpublished uploads first, then one feed post
    /// attaching the media fbids in input order. A failed upload aborts the
    /// whole post.
    async fn publish_multi_image(&self, page_id: &str, request: &PublishRequest) -> Result<String> {
        let mut media_fbids = Vec::with_capacity(request.image_urls.len());

        for (index, image_url) in request.image_urls.iter().enumerate() {
            info!(
                "Uploading image {}/{} as unpublished media",
                index + 1,
                request.image_urls.len()
            );

            let form = photo_form(
                image_url,
                None,
                &request.access_token,
                self.proof_for(&request.access_token).as_deref(),
                false,
            );

            let response = self
                .http
                .post_form(&self.photos_endpoint(page_id), &form)
                .await?;

            let json = parse_json(&response.body)?;
            let fbid = json["id"].as_str().ok_or_else(|| {
                PlatformError::Protocol(format!(
                    "photo upload response missing id: {}",
                    response.body
                ))
            })?;

            debug!("Uploaded media fbid {}", fbid);
            media_fbids.push(fbid.to_string());
        }

        let form = feed_form_with_media(
            &full_message(request),
            &media_fbids,
            &request.access_token,
            self.proof_for(&request.access_token).as_deref(),
        );

        let response = self
            .http
            .post_form(&self.feed_endpoint(page_id), &form)
            .await?;

        self.external_id_from(&response.body)
    }

    fn external_id_from(&self, body: &str) -> Result<String> {
        let json = parse_json(body)?;
        let raw = extract_post_id(&json).ok_or_else(|| {
            PlatformError::Protocol(format!("Facebook response missing id: {}", body))
        })?;

        Ok(strip_page_prefix(&raw).to_string())
    }
}

#[async_trait]
impl Platform for FacebookPlatform {
    fn name(&self) -> &str {
        "facebook"
    }

    fn validate(&self, request: &PublishRequest) -> Result<()> {
        if request.target_id.as_deref().unwrap_or("").is_empty() {
            return Err(
                PlatformError::Validation("Facebook page ID is required".to_string()).into(),
            );
        }
        if request.access_token.is_empty() {
            return Err(PlatformError::Authentication(
                "Facebook page access token is required".to_string(),
            )
            .into());
        }
        Ok(())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        self.validate(request)?;
        let page_id = request.target_id.as_deref().unwrap_or_default();

        match request.image_urls.len() {
            0 => self.publish_text(page_id, request).await,
            1 => {
                self.publish_single_image(page_id, request, &request.image_urls[0])
                    .await
            }
            _ => self.publish_multi_image(page_id, request).await,
        }
    }
}

/// Hex-encoded HMAC-SHA256 of the access token under the app-secret key.
/// Required by Facebook on server-side Graph calls when the app has
/// "Require App Secret" enabled.
pub fn appsecret_proof(access_token: &str, app_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(access_token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Message body sent to Facebook: title and message joined by a blank line,
/// with the link appended for the photo endpoints (which have no `link`
/// field).
fn full_message(request: &PublishRequest) -> String {
    let mut message = format!("{}\n\n{}", request.title, request.message);
    if let Some(link) = request.link_url.as_deref().filter(|l| !l.is_empty()) {
        message.push_str("\n\n");
        message.push_str(link);
    }
    message
}

/// JSON payload for the text-only `/feed` post.
fn feed_json_payload(request: &PublishRequest) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "message": format!("{}\n\n{}", request.title, request.message),
    });

    if let Some(link) = request.link_url.as_deref().filter(|l| !l.is_empty()) {
        payload["link"] = serde_json::Value::String(link.to_string());
    }

    payload
}

/// Form fields for one `/photos` call. Field order is preserved on the wire.
fn photo_form(
    image_url: &str,
    message: Option<&str>,
    access_token: &str,
    proof: Option<&str>,
    published: bool,
) -> Vec<(String, String)> {
    let mut form = vec![("url".to_string(), image_url.to_string())];

    if let Some(message) = message {
        form.push(("message".to_string(), message.to_string()));
    }
    if !published {
        form.push(("published".to_string(), "false".to_string()));
    }
    form.push(("access_token".to_string(), access_token.to_string()));
    if let Some(proof) = proof {
        form.push(("appsecret_proof".to_string(), proof.to_string()));
    }

    form
}

/// Form fields for the `/feed` post that attaches previously uploaded media,
/// in the same order as the uploads.
fn feed_form_with_media(
    message: &str,
    media_fbids: &[String],
    access_token: &str,
    proof: Option<&str>,
) -> Vec<(String, String)> {
    let mut form = vec![("message".to_string(), message.to_string())];

    for (index, fbid) in media_fbids.iter().enumerate() {
        form.push((
            format!("attached_media[{}]", index),
            format!(r#"{{"media_fbid":"{}"}}"#, fbid),
        ));
    }

    form.push(("access_token".to_string(), access_token.to_string()));
    if let Some(proof) = proof {
        form.push(("appsecret_proof".to_string(), proof.to_string()));
    }

    form
}
