//! Content store adapter
//!
//! Narrow interface over SQLite, keyed by entity: posts, accounts, the
//! per-site activity log, metrics snapshots, and the fleet-wide scheduler
//! task registry. Each call is one transaction; callers never hold a store
//! transaction across an outbound HTTP request.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::types::{
    Account, ActivityEntry, MetricsSnapshot, Post, PostStatus, TargetPlatform,
};

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if necessary) the store at the given path and run
    /// pending migrations.
    pub async fn open(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // mode=rwc creates the database file when absent
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    pub async fn create_post(&self, post: &Post) -> Result<()> {
        let image_refs =
            serde_json::to_string(&post.image_refs).unwrap_or_else(|_| "[]".to_string());
        let external_ids =
            serde_json::to_string(&post.external_ids).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO posts (id, site_key, title, message, link_url, platform,
                               image_refs, scheduled_at, status, external_ids, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.site_key)
        .bind(&post.title)
        .bind(&post.message)
        .bind(&post.link_url)
        .bind(post.platform.as_str())
        .bind(image_refs)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(external_ids)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Get a post by UUID.
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, site_key, title, message, link_url, platform,
                   image_refs, scheduled_at, status, external_ids, created_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(row_to_post).transpose()
    }

    /// Posts with the given status whose scheduled time is at or before
    /// `cutoff`.
    pub async fn due_posts(&self, status: PostStatus, cutoff: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, site_key, title, message, link_url, platform,
                   image_refs, scheduled_at, status, external_ids, created_at
            FROM posts
            WHERE status = ? AND scheduled_at IS NOT NULL AND scheduled_at <= ?
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(status.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_post).collect()
    }

    /// Posts with the given status that carry at least one external ID.
    pub async fn posts_with_external_ids(&self, status: PostStatus) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, site_key, title, message, link_url, platform,
                   image_refs, scheduled_at, status, external_ids, created_at
            FROM posts
            WHERE status = ? AND external_ids != '[]'
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_post).collect()
    }

    /// Posts scheduled within the inclusive `[start, end]` window, any status.
    pub async fn scheduled_posts_between(&self, start: i64, end: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, site_key, title, message, link_url, platform,
                   image_refs, scheduled_at, status, external_ids, created_at
            FROM posts
            WHERE scheduled_at IS NOT NULL AND scheduled_at >= ? AND scheduled_at <= ?
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_post).collect()
    }

    /// Update a post's status and external-ID list in one transaction.
    pub async fn update_post_status(
        &self,
        post_id: &str,
        status: PostStatus,
        external_ids: &[String],
    ) -> Result<()> {
        let external_ids_json =
            serde_json::to_string(external_ids).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r#"
            UPDATE posts SET status = ?, external_ids = ? WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(external_ids_json)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("post {}", post_id)).into());
        }

        Ok(())
    }

    /// Set the scheduled time (and move to `scheduled`) for a post.
    pub async fn schedule_post(&self, post_id: &str, scheduled_at: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET scheduled_at = ?, status = 'scheduled' WHERE id = ?
            "#,
        )
        .bind(scheduled_at)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("post {}", post_id)).into());
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Insert or update the account identified by
    /// `(site_key, platform, account_id)`.
    pub async fn put_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (site_key, platform, account_id, label, handle, page_id,
                                  access_token, page_token, email, token_expiry, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (site_key, platform, account_id) DO UPDATE SET
                label = excluded.label,
                handle = excluded.handle,
                page_id = excluded.page_id,
                access_token = excluded.access_token,
                page_token = excluded.page_token,
                email = excluded.email,
                token_expiry = excluded.token_expiry,
                is_active = excluded.is_active
            "#,
        )
        .bind(&account.site_key)
        .bind(account.platform.as_str())
        .bind(&account.account_id)
        .bind(&account.label)
        .bind(&account.handle)
        .bind(&account.page_id)
        .bind(&account.access_token)
        .bind(&account.page_token)
        .bind(&account.email)
        .bind(account.token_expiry)
        .bind(account.is_active as i32)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_account(
        &self,
        site_key: &str,
        platform: TargetPlatform,
        account_id: &str,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT site_key, platform, account_id, label, handle, page_id,
                   access_token, page_token, email, token_expiry, is_active, created_at
            FROM accounts
            WHERE site_key = ? AND platform = ? AND account_id = ?
            "#,
        )
        .bind(site_key)
        .bind(platform.as_str())
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(row_to_account).transpose()
    }

    /// Active accounts for a site and platform, oldest first.
    pub async fn list_accounts(
        &self,
        site_key: &str,
        platform: TargetPlatform,
    ) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT site_key, platform, account_id, label, handle, page_id,
                   access_token, page_token, email, token_expiry, is_active, created_at
            FROM accounts
            WHERE site_key = ? AND platform = ? AND is_active = 1
            ORDER BY created_at ASC
            "#,
        )
        .bind(site_key)
        .bind(platform.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_account).collect()
    }

    /// Active accounts of one platform across every site. Used by the OAuth
    /// uninstall/delete callbacks, which identify a provider user but not a
    /// site.
    pub async fn list_accounts_by_platform(&self, platform: TargetPlatform) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT site_key, platform, account_id, label, handle, page_id,
                   access_token, page_token, email, token_expiry, is_active, created_at
            FROM accounts
            WHERE platform = ? AND is_active = 1
            ORDER BY site_key ASC, created_at ASC
            "#,
        )
        .bind(platform.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_account).collect()
    }

    /// Remove one account record. Returns the number of removed rows.
    pub async fn remove_account(
        &self,
        site_key: &str,
        platform: TargetPlatform,
        account_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM accounts WHERE site_key = ? AND platform = ? AND account_id = ?
            "#,
        )
        .bind(site_key)
        .bind(platform.as_str())
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected())
    }

    // ------------------------------------------------------------------
    // Activity log
    // ------------------------------------------------------------------

    /// Append one entry to a site's activity trail. Entries are never
    /// mutated afterwards.
    pub async fn append_activity(&self, entry: &ActivityEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_log (site_key, created_at, action, post_id, post_title,
                                      platform, status, message, error_message, user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.site_key)
        .bind(entry.created_at)
        .bind(entry.action.as_str())
        .bind(&entry.post_id)
        .bind(&entry.post_title)
        .bind(entry.platform.map(|p| p.as_str()))
        .bind(&entry.status)
        .bind(&entry.message)
        .bind(&entry.error_message)
        .bind(&entry.user_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// A site's activity trail in append order.
    pub async fn list_activity(&self, site_key: &str, limit: i64) -> Result<Vec<ActivityEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, site_key, created_at, action, post_id, post_title,
                   platform, status, message, error_message, user_id
            FROM activity_log
            WHERE site_key = ?
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(site_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_activity).collect()
    }

    // ------------------------------------------------------------------
    // Metrics snapshots
    // ------------------------------------------------------------------

    pub async fn store_metrics(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metrics_snapshots (post_id, platform, external_id, captured_at,
                                           impressions, reach, clicks, likes, comments, shares)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.post_id)
        .bind(snapshot.platform.as_str())
        .bind(&snapshot.external_id)
        .bind(snapshot.captured_at)
        .bind(snapshot.impressions)
        .bind(snapshot.reach)
        .bind(snapshot.clicks)
        .bind(snapshot.likes)
        .bind(snapshot.comments)
        .bind(snapshot.shares)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Scheduler task registry
    // ------------------------------------------------------------------

    /// Whether a recurring task group is already registered fleet-wide.
    pub async fn task_registered(&self, group_name: &str) -> Result<bool> {
        let row = sqlx::query("SELECT group_name FROM scheduled_tasks WHERE group_name = ?")
            .bind(group_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(row.is_some())
    }

    /// Register a task group. Returns false if it was already present.
    pub async fn register_task(&self, group_name: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO scheduled_tasks (group_name, registered_at) VALUES (?, ?)
            "#,
        )
        .bind(group_name)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_task(&self, group_name: &str) -> Result<()> {
        sqlx::query("DELETE FROM scheduled_tasks WHERE group_name = ?")
            .bind(group_name)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }
}

fn row_to_post(row: sqlx::sqlite::SqliteRow) -> Result<Post> {
    let platform: String = row.get("platform");
    let platform = platform
        .parse::<TargetPlatform>()
        .map_err(StoreError::InvalidValue)?;

    let status: String = row.get("status");
    let status = match status.as_str() {
        "scheduled" => PostStatus::Scheduled,
        "published" => PostStatus::Published,
        _ => PostStatus::Draft,
    };

    let image_refs: String = row.get("image_refs");
    let external_ids: String = row.get("external_ids");

    Ok(Post {
        id: row.get("id"),
        site_key: row.get("site_key"),
        title: row.get("title"),
        message: row.get("message"),
        link_url: row.get("link_url"),
        platform,
        image_refs: serde_json::from_str(&image_refs).unwrap_or_default(),
        scheduled_at: row.get("scheduled_at"),
        status,
        external_ids: serde_json::from_str(&external_ids).unwrap_or_default(),
        created_at: row.get("created_at"),
    })
}

fn row_to_account(row: sqlx::sqlite::SqliteRow) -> Result<Account> {
    let platform: String = row.get("platform");
    let platform = platform
        .parse::<TargetPlatform>()
        .map_err(StoreError::InvalidValue)?;

    Ok(Account {
        site_key: row.get("site_key"),
        platform,
        account_id: row.get("account_id"),
        label: row.get("label"),
        handle: row.get("handle"),
        page_id: row.get("page_id"),
        access_token: row.get("access_token"),
        page_token: row.get("page_token"),
        email: row.get("email"),
        token_expiry: row.get("token_expiry"),
        is_active: row.get::<i32, _>("is_active") != 0,
        created_at: row.get("created_at"),
    })
}

fn row_to_activity(row: sqlx::sqlite::SqliteRow) -> Result<ActivityEntry> {
    use crate::types::ActivityAction;

    let action: String = row.get("action");
    let action = match action.as_str() {
        "publish_attempt" => ActivityAction::PublishAttempt,
        "publish_success" => ActivityAction::PublishSuccess,
        "publish_failure" => ActivityAction::PublishFailure,
        "rule_fired" => ActivityAction::RuleFired,
        _ => ActivityAction::Schedule,
    };

    let platform: Option<String> = row.get("platform");
    let platform = platform.and_then(|p| p.parse::<TargetPlatform>().ok());

    Ok(ActivityEntry {
        id: row.get("id"),
        site_key: row.get("site_key"),
        created_at: row.get("created_at"),
        action,
        post_id: row.get("post_id"),
        post_title: row.get("post_title"),
        platform,
        status: row.get("status"),
        message: row.get("message"),
        error_message: row.get("error_message"),
        user_id: row.get("user_id"),
    })
}
