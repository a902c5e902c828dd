//! Publish/unpublish hooks
//!
//! The content host fires these when editorial content is published or
//! unpublished. They are plain methods on a handler struct; the event
//! source decides when to call them.

use tracing::{info, warn};

use crate::activity::ActivityLog;
use crate::error::{Result, StoreError};
use crate::store::Store;
use crate::types::PostStatus;

#[derive(Clone)]
pub struct RulesHandler {
    store: Store,
    activity: ActivityLog,
}

impl RulesHandler {
    pub fn new(store: Store, activity: ActivityLog) -> Self {
        Self { store, activity }
    }

    /// Content was published: a post with a scheduled time moves to
    /// `scheduled` so the publish sweep picks it up.
    pub async fn mark_as_scheduled(&self, post_uuid: &str) -> Result<()> {
        let post = self
            .store
            .get_post(post_uuid)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("post {}", post_uuid)))?;

        let scheduled_at = match post.scheduled_at {
            Some(at) => at,
            None => {
                info!("Post {} has no scheduled time, skipping", post.id);
                return Ok(());
            }
        };

        let old_status = post.status.as_str().to_string();
        self.store.schedule_post(&post.id, scheduled_at).await?;
        info!("Post '{}' marked as scheduled", post.title);

        self.activity
            .log_status_change(&post, &old_status, "scheduled", "post published")
            .await;

        Ok(())
    }

    /// Content was unpublished: the post drops back to `draft` and leaves
    /// the publish queue.
    pub async fn mark_as_draft(&self, post_uuid: &str) -> Result<()> {
        let post = self
            .store
            .get_post(post_uuid)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("post {}", post_uuid)))?;

        let old_status = post.status.as_str().to_string();
        self.store
            .update_post_status(&post.id, PostStatus::Draft, &post.external_ids)
            .await?;
        info!("Post '{}' marked as draft", post.title);

        self.activity
            .log_status_change(&post, &old_status, "draft", "post unpublished")
            .await;

        Ok(())
    }

    /// A post published without an explicit schedule time is set to publish
    /// immediately.
    pub async fn auto_schedule(&self, post_uuid: &str) -> Result<()> {
        let post = self
            .store
            .get_post(post_uuid)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("post {}", post_uuid)))?;

        if post.scheduled_at.is_some() {
            return Ok(());
        }

        let now = chrono::Utc::now().timestamp();
        if let Err(e) = self.store.schedule_post(&post.id, now).await {
            warn!("Failed to auto-schedule post {}: {}", post.id, e);
            return Err(e);
        }

        info!(
            "Post '{}' published without a schedule time, set to publish immediately",
            post.title
        );

        self.activity
            .log_rule_fired(
                &post.site_key,
                "auto-schedule",
                &post,
                "scheduled for immediate publishing",
            )
            .await;

        Ok(())
    }
}
