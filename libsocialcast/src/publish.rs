//! Publish service
//!
//! Drives one post from `scheduled` to `published`: validate, resolve image
//! URLs and credentials, dispatch to the platform, persist the terminal
//! transition, and record the activity trail. A failed publish leaves the
//! post `scheduled`; the next scheduler tick retries it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::accounts::AccountService;
use crate::activity::ActivityLog;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::httpclient::HttpClient;
use crate::platforms::facebook::FacebookPlatform;
use crate::platforms::instagram::InstagramPlatform;
use crate::platforms::linkedin::LinkedInPlatform;
use crate::platforms::{Platform, PublishRequest};
use crate::store::Store;
use crate::types::{Post, PostStatus, TargetPlatform};

/// Result of one publish attempt. Dispatch failures are recorded, not
/// propagated: the post stays `scheduled` for the next tick.
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    Published { external_id: String },
    AlreadyPublished,
    Failed { error: String },
}

/// Build the real platform dispatchers from configuration.
pub fn create_platforms(
    config: &Config,
    http: &HttpClient,
) -> HashMap<TargetPlatform, Arc<dyn Platform>> {
    let mut platforms: HashMap<TargetPlatform, Arc<dyn Platform>> = HashMap::new();

    if let Some(facebook) = &config.facebook {
        platforms.insert(
            TargetPlatform::Facebook,
            Arc::new(FacebookPlatform::new(http.clone(), facebook)),
        );
    }
    if let Some(instagram) = &config.instagram {
        let api_version = config
            .facebook
            .as_ref()
            .map(|f| f.api_version.as_str())
            .unwrap_or("v21.0");
        platforms.insert(
            TargetPlatform::Instagram,
            Arc::new(InstagramPlatform::new(http.clone(), instagram, api_version)),
        );
    }
    if let Some(linkedin) = &config.linkedin {
        platforms.insert(
            TargetPlatform::LinkedIn,
            Arc::new(LinkedInPlatform::new(http.clone(), linkedin)),
        );
    }

    platforms
}

#[derive(Clone)]
pub struct PublishService {
    store: Store,
    accounts: AccountService,
    activity: ActivityLog,
    config: Arc<Config>,
    platforms: Arc<HashMap<TargetPlatform, Arc<dyn Platform>>>,
}

impl PublishService {
    pub fn new(
        store: Store,
        accounts: AccountService,
        activity: ActivityLog,
        config: Arc<Config>,
        platforms: HashMap<TargetPlatform, Arc<dyn Platform>>,
    ) -> Self {
        Self {
            store,
            accounts,
            activity,
            config,
            platforms: Arc::new(platforms),
        }
    }

    /// Publish a single post now, regardless of its scheduled time.
    pub async fn publish_now(&self, post_uuid: &str) -> Result<PublishOutcome> {
        let post = self
            .store
            .get_post(post_uuid)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("post {}", post_uuid)))?;

        info!(
            "Publishing post '{}' ({}) to {}",
            post.title, post.id, post.platform
        );

        self.activity.log_publish_attempt(&post).await;

        // `published` is terminal per platform target; a post that already
        // carries an external ID for its platform is never re-dispatched.
        if post.status == PostStatus::Published && post.has_external_id_for(post.platform) {
            info!("Post {} is already published, skipping", post.id);
            return Ok(PublishOutcome::AlreadyPublished);
        }

        let external_id = match self.dispatch(&post).await {
            Ok(id) => id,
            Err(e) => {
                // Leave the status at `scheduled`; the next tick retries.
                error!("Failed to publish post {} to {}: {}", post.id, post.platform, e);
                self.activity.log_publish_failure(&post, &e.to_string()).await;
                return Ok(PublishOutcome::Failed {
                    error: e.to_string(),
                });
            }
        };

        info!(
            "Successfully published to {}: {}",
            post.platform, external_id
        );

        let mut external_ids = post.external_ids.clone();
        let entry = format!("{}:{}", post.platform.as_str(), external_id);
        if !external_ids.contains(&entry) {
            external_ids.push(entry);
        }

        self.store
            .update_post_status(&post.id, PostStatus::Published, &external_ids)
            .await?;

        self.activity.log_publish_success(&post, &external_id).await;

        // Re-read and verify the terminal transition actually persisted.
        match self.store.get_post(&post.id).await? {
            Some(saved) if saved.status == PostStatus::Published => {
                info!("Post {} status verified as published", post.id);
            }
            Some(saved) => {
                error!(
                    "Post {} status verification failed: expected published, found {}",
                    post.id, saved.status
                );
            }
            None => {
                error!("Post {} disappeared after publish", post.id);
            }
        }

        Ok(PublishOutcome::Published { external_id })
    }

    /// Publish every scheduled post whose time has come. One post's failure
    /// never stops the sweep.
    pub async fn publish_due_scheduled(&self) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let due = self.store.due_posts(PostStatus::Scheduled, now).await?;

        if due.is_empty() {
            return Ok(0);
        }

        info!("Found {} post(s) due for publishing", due.len());

        let mut published = 0;
        for post in due {
            match self.publish_now(&post.id).await {
                Ok(PublishOutcome::Published { .. }) => published += 1,
                Ok(PublishOutcome::AlreadyPublished) => {}
                Ok(PublishOutcome::Failed { error }) => {
                    warn!("Post '{}' stays scheduled: {}", post.title, error);
                }
                Err(e) => {
                    error!("Failed to process scheduled post {}: {}", post.id, e);
                }
            }
        }

        info!("Published {} scheduled post(s)", published);
        Ok(published)
    }

    /// Resolve credentials, build the wire request, and call the dispatcher.
    async fn dispatch(&self, post: &Post) -> Result<String> {
        let platform = self.platforms.get(&post.platform).ok_or_else(|| {
            crate::error::PlatformError::Validation(format!(
                "No dispatcher configured for platform {}",
                post.platform
            ))
        })?;

        let image_urls = self.resolve_image_urls(post);
        let mut request = PublishRequest {
            title: post.title.clone(),
            message: post.message.clone(),
            link_url: post.link_url.clone(),
            image_urls,
            access_token: String::new(),
            target_id: None,
            author_urn: None,
        };

        self.resolve_credentials(post, &mut request).await?;

        platform.publish(&request).await
    }

    /// Externally fetchable URL for each image reference, following the
    /// content store's file-URL convention.
    fn resolve_image_urls(&self, post: &Post) -> Vec<String> {
        post.image_refs
            .iter()
            .map(|path| file_url(&self.config.server.base_url, path))
            .collect()
    }

    async fn resolve_credentials(&self, post: &Post, request: &mut PublishRequest) -> Result<()> {
        match post.platform {
            TargetPlatform::Facebook => {
                let stored = self.accounts.facebook_accounts(&post.site_key).await?;

                if let Some(account) = stored.values().next() {
                    request.target_id = Some(account.page_id.clone());
                    request.access_token = account.page_token.clone();
                    return Ok(());
                }

                // No stored account: fall back to the configured page.
                let facebook = self.config.facebook.as_ref();
                let page_id = facebook.and_then(|f| f.page_id.clone());
                let page_token = facebook.and_then(|f| f.page_access_token.clone());

                match (page_id, page_token) {
                    (Some(page_id), Some(token)) => {
                        warn!(
                            "No stored Facebook account for site {}, using configured page {}",
                            post.site_key, page_id
                        );
                        request.target_id = Some(page_id);
                        request.access_token = token;
                        Ok(())
                    }
                    _ => Err(crate::error::PlatformError::Authentication(format!(
                        "No Facebook page credentials for site {}",
                        post.site_key
                    ))
                    .into()),
                }
            }
            TargetPlatform::Instagram => {
                let instagram = self.config.instagram.as_ref().ok_or_else(|| {
                    crate::error::PlatformError::Validation(
                        "Instagram is not configured".to_string(),
                    )
                })?;

                request.target_id = instagram.account_id.clone();
                request.access_token = instagram.access_token.clone().ok_or_else(|| {
                    crate::error::PlatformError::Authentication(
                        "No Instagram access token configured".to_string(),
                    )
                })?;
                Ok(())
            }
            TargetPlatform::LinkedIn => {
                let stored = self.accounts.linkedin_accounts(&post.site_key).await?;

                if let Some(account) = stored.values().next() {
                    request.author_urn = Some(format!("urn:li:person:{}", account.person_id));
                    request.access_token = account.access_token.clone();
                    return Ok(());
                }

                // Organization fallback, only when configured.
                let linkedin = self.config.linkedin.as_ref();
                let org_id = linkedin.and_then(|l| l.organization_id.clone());
                let token = linkedin.and_then(|l| l.access_token.clone());

                match (org_id, token) {
                    (Some(org_id), Some(token)) => {
                        warn!(
                            "No LinkedIn account for site {}, using organization {}",
                            post.site_key, org_id
                        );
                        request.author_urn = Some(format!("urn:li:organization:{}", org_id));
                        request.access_token = token;
                        Ok(())
                    }
                    _ => Err(crate::error::PlatformError::Authentication(format!(
                        "No LinkedIn account for site {}",
                        post.site_key
                    ))
                    .into()),
                }
            }
        }
    }
}

/// File-servlet URL for a stored image path:
/// `<serverBaseUrl>/files/live<path>`.
pub fn file_url(server_base_url: &str, image_path: &str) -> String {
    let base = server_base_url.trim_end_matches('/');
    if image_path.starts_with('/') {
        format!("{}/files/live{}", base, image_path)
    } else {
        format!("{}/files/live/{}", base, image_path)
    }
}
