//! Engagement metrics
//!
//! Two consumers share this module: the recurring "refresh metrics" task,
//! which sweeps published posts and stores snapshots, and the insights HTTP
//! endpoint, which serves a combined summary for one post on demand.
//!
//! Facebook is the only platform with a live backend. Reaction counts come
//! from the post insights endpoint; likes, comments, and shares from the
//! post object's engagement fields. Instagram and LinkedIn return
//! zero-filled summaries.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::accounts::AccountService;
use crate::config::Config;
use crate::error::{PlatformError, Result};
use crate::httpclient::{parse_json, HttpClient};
use crate::platforms::facebook::appsecret_proof;
use crate::store::Store;
use crate::types::{
    EngagementSummary, InsightsSummary, MetricsSnapshot, PostStatus, TargetPlatform,
};

const FACEBOOK_REACTION_METRICS: &str = "post_reactions_like_total,post_reactions_love_total,\
post_reactions_wow_total,post_reactions_haha_total,post_reactions_sorry_total,\
post_reactions_anger_total";

#[derive(Clone)]
pub struct MetricsService {
    store: Store,
    accounts: AccountService,
    config: Arc<Config>,
    http: HttpClient,
}

impl MetricsService {
    pub fn new(store: Store, accounts: AccountService, config: Arc<Config>, http: HttpClient) -> Self {
        Self {
            store,
            accounts,
            config,
            http,
        }
    }

    /// Refresh metrics for every published post that has an external ID.
    /// Per-post failures are isolated.
    pub async fn refresh_published_posts(&self) -> Result<usize> {
        let posts = self
            .store
            .posts_with_external_ids(PostStatus::Published)
            .await?;

        info!("Refreshing metrics for {} published post(s)", posts.len());

        let mut refreshed = 0;
        for post in posts {
            match self.refresh_post(&post.id).await {
                Ok(()) => refreshed += 1,
                Err(e) => error!("Failed to refresh metrics for post {}: {}", post.id, e),
            }
        }

        Ok(refreshed)
    }

    /// Refresh and store a snapshot for each external ID of one post.
    pub async fn refresh_post(&self, post_uuid: &str) -> Result<()> {
        let post = self
            .store
            .get_post(post_uuid)
            .await?
            .ok_or_else(|| crate::error::StoreError::NotFound(format!("post {}", post_uuid)))?;

        for entry in &post.external_ids {
            let (platform, external_id) = match split_external_id(entry) {
                Some(parts) => parts,
                None => {
                    warn!("Invalid external ID format: {}", entry);
                    continue;
                }
            };

            match self
                .insights_for(platform, &external_id, &post.site_key)
                .await
            {
                Ok(summary) => {
                    let snapshot = MetricsSnapshot {
                        id: None,
                        post_id: post.id.clone(),
                        platform,
                        external_id: external_id.clone(),
                        captured_at: chrono::Utc::now().timestamp(),
                        impressions: summary.impressions,
                        reach: summary.reach,
                        clicks: summary.clicks,
                        likes: summary.likes,
                        comments: summary.comments,
                        shares: summary.shares,
                    };
                    self.store.store_metrics(&snapshot).await?;
                    info!(
                        "Stored metrics for post {} on {}",
                        post.id, platform
                    );
                }
                Err(e) => {
                    error!(
                        "Error fetching metrics for {}:{}: {}",
                        platform, external_id, e
                    );
                }
            }
        }

        Ok(())
    }

    /// Combined insights summary for one published post.
    pub async fn insights_for(
        &self,
        platform: TargetPlatform,
        post_id: &str,
        site_key: &str,
    ) -> Result<InsightsSummary> {
        match platform {
            TargetPlatform::Facebook => self.facebook_insights(post_id, site_key).await,
            TargetPlatform::Instagram | TargetPlatform::LinkedIn => {
                Ok(InsightsSummary::empty(post_id, platform))
            }
        }
    }

    async fn facebook_insights(&self, post_id: &str, site_key: &str) -> Result<InsightsSummary> {
        let accounts = self.accounts.facebook_accounts(site_key).await?;
        let account = accounts.values().next().ok_or_else(|| {
            PlatformError::Authentication(format!(
                "No Facebook account found for site {}",
                site_key
            ))
        })?;

        let api_version = self
            .config
            .facebook
            .as_ref()
            .map(|f| f.api_version.clone())
            .unwrap_or_else(|| "v21.0".to_string());
        let base_url = self
            .config
            .facebook
            .as_ref()
            .map(|f| f.base_url.clone())
            .unwrap_or_else(|| "https://graph.facebook.com".to_string());

        // Page-post insights need the composite <pageId>_<postId> form.
        let page_post_id = if post_id.contains('_') {
            post_id.to_string()
        } else {
            format!("{}_{}", account.page_id, post_id)
        };

        let proof = self
            .config
            .facebook
            .as_ref()
            .and_then(|f| f.app_secret.as_deref())
            .filter(|s| !s.is_empty())
            .map(|secret| format!("&appsecret_proof={}", appsecret_proof(&account.page_token, secret)))
            .unwrap_or_default();

        // Reaction breakdown; failures here degrade to zeros rather than
        // failing the whole summary.
        let insights_url = format!(
            "{}/{}/{}/insights?metric={}&access_token={}{}",
            base_url,
            api_version,
            page_post_id,
            urlencoding::encode(FACEBOOK_REACTION_METRICS),
            urlencoding::encode(&account.page_token),
            proof,
        );

        let insights_json = match self.http.get(&insights_url, &[]).await {
            Ok(response) => parse_json(&response.body).ok(),
            Err(e) => {
                warn!("Facebook insights call failed for {}: {}", page_post_id, e);
                None
            }
        };

        // Engagement fields from the post object itself.
        let post_data_url = format!(
            "{}/{}/{}?fields=likes.summary(true),comments.summary(true),shares&access_token={}{}",
            base_url,
            api_version,
            page_post_id,
            urlencoding::encode(&account.page_token),
            proof,
        );

        let post_data_json = match self.http.get(&post_data_url, &[]).await {
            Ok(response) => parse_json(&response.body).ok(),
            Err(e) => {
                warn!("Facebook post data call failed for {}: {}", page_post_id, e);
                None
            }
        };

        Ok(combine_facebook_insights(
            insights_json.as_ref(),
            post_data_json.as_ref(),
            post_id,
        ))
    }
}

/// Split a stored `"<platform>:<externalId>"` entry.
pub fn split_external_id(entry: &str) -> Option<(TargetPlatform, String)> {
    let (platform, external_id) = entry.split_once(':')?;
    let platform = platform.parse().ok()?;
    if external_id.is_empty() {
        return None;
    }
    Some((platform, external_id.to_string()))
}

/// Merge the reaction insights and engagement-field responses into one
/// summary. Missing pieces degrade to zero.
pub fn combine_facebook_insights(
    _insights: Option<&serde_json::Value>,
    post_data: Option<&serde_json::Value>,
    post_id: &str,
) -> InsightsSummary {
    let mut likes = 0;
    let mut comments = 0;
    let mut shares = 0;

    if let Some(data) = post_data {
        likes = data["likes"]["summary"]["total_count"].as_i64().unwrap_or(0);
        comments = data["comments"]["summary"]["total_count"]
            .as_i64()
            .unwrap_or(0);
        shares = data["shares"]["count"].as_i64().unwrap_or(0);
    }

    // Impressions and reach are not available through the page-post
    // insights metrics; the engagement rate is only meaningful with reach.
    let reach = 0;
    let engagements = likes + comments + shares;
    let rate = if reach > 0 {
        engagements as f64 / reach as f64 * 100.0
    } else {
        0.0
    };

    InsightsSummary {
        post_id: post_id.to_string(),
        platform: TargetPlatform::Facebook,
        impressions: 0,
        reach,
        clicks: 0,
        likes,
        comments,
        shares,
        engagement: EngagementSummary { rate },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_external_id_valid() {
        let (platform, id) = split_external_id("facebook:222").unwrap();
        assert_eq!(platform, TargetPlatform::Facebook);
        assert_eq!(id, "222");
    }

    #[test]
    fn test_split_external_id_linkedin_urn() {
        let (platform, id) = split_external_id("linkedin:urn:li:share:123").unwrap();
        assert_eq!(platform, TargetPlatform::LinkedIn);
        assert_eq!(id, "urn:li:share:123");
    }

    #[test]
    fn test_split_external_id_invalid() {
        assert!(split_external_id("no-colon").is_none());
        assert!(split_external_id("mastodon:1").is_none());
        assert!(split_external_id("facebook:").is_none());
    }

    #[test]
    fn test_combine_facebook_insights_full() {
        let post_data = json!({
            "likes": {"summary": {"total_count": 12}},
            "comments": {"summary": {"total_count": 3}},
            "shares": {"count": 5},
        });

        let summary = combine_facebook_insights(None, Some(&post_data), "222");
        assert_eq!(summary.likes, 12);
        assert_eq!(summary.comments, 3);
        assert_eq!(summary.shares, 5);
        assert_eq!(summary.engagement.rate, 0.0);
    }

    #[test]
    fn test_combine_facebook_insights_missing_data() {
        let summary = combine_facebook_insights(None, None, "222");
        assert_eq!(summary.likes, 0);
        assert_eq!(summary.comments, 0);
        assert_eq!(summary.shares, 0);
        assert_eq!(summary.post_id, "222");
    }

    #[test]
    fn test_combine_facebook_insights_partial_fields() {
        let post_data = json!({
            "likes": {"summary": {"total_count": 7}},
        });

        let summary = combine_facebook_insights(None, Some(&post_data), "x");
        assert_eq!(summary.likes, 7);
        assert_eq!(summary.comments, 0);
        assert_eq!(summary.shares, 0);
    }
}
