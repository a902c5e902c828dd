//! Per-site activity trail
//!
//! Every write path of the hub appends here. Logging must never become a
//! reason a publish flow fails: store errors are logged at warn level and
//! swallowed.

use tracing::warn;

use crate::store::Store;
use crate::types::{ActivityAction, ActivityEntry, Post, TargetPlatform};

#[derive(Clone)]
pub struct ActivityLog {
    store: Store,
}

impl ActivityLog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn log_publish_attempt(&self, post: &Post) {
        let message = format!("Attempting to publish to {}", post.platform);
        self.append(
            &post.site_key,
            ActivityAction::PublishAttempt,
            Some(&post.id),
            Some(&post.title),
            Some(post.platform),
            Some("scheduled"),
            message,
            None,
        )
        .await;
    }

    pub async fn log_publish_success(&self, post: &Post, external_id: &str) {
        let message = format!(
            "Successfully published to {} (ID: {})",
            post.platform, external_id
        );
        self.append(
            &post.site_key,
            ActivityAction::PublishSuccess,
            Some(&post.id),
            Some(&post.title),
            Some(post.platform),
            Some("published"),
            message,
            None,
        )
        .await;
    }

    pub async fn log_publish_failure(&self, post: &Post, error: &str) {
        let message = format!("Failed to publish to {}", post.platform);
        self.append(
            &post.site_key,
            ActivityAction::PublishFailure,
            Some(&post.id),
            Some(&post.title),
            Some(post.platform),
            Some("scheduled"),
            message,
            Some(error.to_string()),
        )
        .await;
    }

    pub async fn log_status_change(
        &self,
        post: &Post,
        old_status: &str,
        new_status: &str,
        reason: &str,
    ) {
        let message = format!(
            "Status changed: {} -> {}. Reason: {}",
            old_status, new_status, reason
        );
        self.append(
            &post.site_key,
            ActivityAction::Schedule,
            Some(&post.id),
            Some(&post.title),
            None,
            Some(new_status),
            message,
            None,
        )
        .await;
    }

    pub async fn log_rule_fired(&self, site_key: &str, rule_name: &str, post: &Post, action: &str) {
        let message = format!("Rule '{}' executed: {}", rule_name, action);
        self.append(
            site_key,
            ActivityAction::RuleFired,
            Some(&post.id),
            Some(&post.title),
            None,
            None,
            message,
            None,
        )
        .await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn append(
        &self,
        site_key: &str,
        action: ActivityAction,
        post_id: Option<&str>,
        post_title: Option<&str>,
        platform: Option<TargetPlatform>,
        status: Option<&str>,
        message: String,
        error_message: Option<String>,
    ) {
        let entry = ActivityEntry {
            id: None,
            site_key: site_key.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            action,
            post_id: post_id.map(|s| s.to_string()),
            post_title: post_title.map(|s| s.to_string()),
            platform,
            status: status.map(|s| s.to_string()),
            message,
            error_message,
            user_id: None,
        };

        if let Err(e) = self.store.append_activity(&entry).await {
            warn!("Failed to append activity log entry ({}): {}", action, e);
        }
    }
}
