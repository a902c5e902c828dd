//! Core types for Socialcast

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One unit of editorial content to be delivered to one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub site_key: String,
    pub title: String,
    pub message: String,
    pub link_url: Option<String>,
    pub platform: TargetPlatform,
    /// Content-store paths of attached images, in display order.
    pub image_refs: Vec<String>,
    pub scheduled_at: Option<i64>,
    pub status: PostStatus,
    /// Provider-assigned identifiers, one entry per platform publish,
    /// each of the form `"<platform>:<externalId>"`.
    pub external_ids: Vec<String>,
    pub created_at: i64,
}

impl Post {
    pub fn new(site_key: String, title: String, message: String, platform: TargetPlatform) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            site_key,
            title,
            message,
            link_url: None,
            platform,
            image_refs: Vec::new(),
            scheduled_at: None,
            status: PostStatus::Draft,
            external_ids: Vec::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// True when this post already carries an external ID for the given platform.
    pub fn has_external_id_for(&self, platform: TargetPlatform) -> bool {
        let prefix = format!("{}:", platform.as_str());
        self.external_ids.iter().any(|id| id.starts_with(&prefix))
    }
}

/// Post lifecycle. `Published` is terminal for a given platform target;
/// failed publishes stay `Scheduled` so the next scheduler tick retries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three supported destination platforms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    Facebook,
    Instagram,
    LinkedIn,
}

impl TargetPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::LinkedIn => "linkedin",
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TargetPlatform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            "linkedin" => Ok(Self::LinkedIn),
            _ => Err(format!(
                "Unknown platform: '{}'. Valid platforms: facebook, instagram, linkedin",
                s
            )),
        }
    }
}

/// A persisted binding between a site and one external identity on one
/// platform. For Facebook, `access_token` is the user token (used to refresh
/// the page list) and `page_token` the per-page publishing token. Legacy
/// records may lack `page_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub site_key: String,
    pub platform: TargetPlatform,
    /// Provider-side identity: Facebook page ID or LinkedIn person `sub`.
    pub account_id: String,
    pub label: String,
    pub handle: String,
    pub page_id: Option<String>,
    pub access_token: String,
    pub page_token: Option<String>,
    pub email: Option<String>,
    pub token_expiry: i64,
    pub is_active: bool,
    pub created_at: i64,
}

/// Action kinds recorded in the per-site activity trail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    PublishAttempt,
    PublishSuccess,
    PublishFailure,
    Schedule,
    RuleFired,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublishAttempt => "publish_attempt",
            Self::PublishSuccess => "publish_success",
            Self::PublishFailure => "publish_failure",
            Self::Schedule => "schedule",
            Self::RuleFired => "rule_fired",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One append-only activity trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Option<i64>,
    pub site_key: String,
    pub created_at: i64,
    pub action: ActivityAction,
    pub post_id: Option<String>,
    pub post_title: Option<String>,
    pub platform: Option<TargetPlatform>,
    pub status: Option<String>,
    pub message: String,
    pub error_message: Option<String>,
    pub user_id: Option<String>,
}

/// Point-in-time engagement numbers stored for a published post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub id: Option<i64>,
    pub post_id: String,
    pub platform: TargetPlatform,
    pub external_id: String,
    pub captured_at: i64,
    pub impressions: i64,
    pub reach: i64,
    pub clicks: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

/// Insights payload served by the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsSummary {
    #[serde(rename = "postId")]
    pub post_id: String,
    pub platform: TargetPlatform,
    pub impressions: i64,
    pub reach: i64,
    pub clicks: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub engagement: EngagementSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub rate: f64,
}

impl InsightsSummary {
    /// Zero-filled summary, used for platforms without an insights backend.
    pub fn empty(post_id: &str, platform: TargetPlatform) -> Self {
        Self {
            post_id: post_id.to_string(),
            platform,
            impressions: 0,
            reach: 0,
            clicks: 0,
            likes: 0,
            comments: 0,
            shares: 0,
            engagement: EngagementSummary { rate: 0.0 },
        }
    }
}

/// Redact a token for logging: at most 10 leading and 10 trailing characters.
pub fn redact_token(token: &str) -> String {
    if token.len() > 20 {
        format!("{}...{}", &token[..10], &token[token.len() - 10..])
    } else {
        "***".to_string()
    }
}
