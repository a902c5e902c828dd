//! Content store integration tests

use libsocialcast::store::Store;
use libsocialcast::types::{
    Account, ActivityAction, ActivityEntry, Post, PostStatus, TargetPlatform,
};
use tempfile::TempDir;

async fn open_store() -> (Store, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let store = Store::open(db_path.to_str().unwrap()).await.unwrap();
    (store, temp_dir)
}

fn scheduled_post(site: &str, title: &str, scheduled_at: i64) -> Post {
    let mut post = Post::new(
        site.to_string(),
        title.to_string(),
        "body".to_string(),
        TargetPlatform::Facebook,
    );
    post.scheduled_at = Some(scheduled_at);
    post.status = PostStatus::Scheduled;
    post
}

fn account(site: &str, platform: TargetPlatform, id: &str) -> Account {
    let now = chrono::Utc::now().timestamp();
    Account {
        site_key: site.to_string(),
        platform,
        account_id: id.to_string(),
        label: format!("Account {}", id),
        handle: format!("handle-{}", id),
        page_id: Some(id.to_string()),
        access_token: "user-token".to_string(),
        page_token: Some("page-token".to_string()),
        email: None,
        token_expiry: now + 3600,
        is_active: true,
        created_at: now,
    }
}

#[tokio::test]
async fn test_post_round_trip() {
    let (store, _dir) = open_store().await;

    let mut post = scheduled_post("jsmod", "Hello", 1_700_000_000);
    post.link_url = Some("https://example.com".to_string());
    post.image_refs = vec!["/sites/jsmod/files/a.jpg".to_string()];

    store.create_post(&post).await.unwrap();
    let loaded = store.get_post(&post.id).await.unwrap().unwrap();

    assert_eq!(loaded.title, "Hello");
    assert_eq!(loaded.site_key, "jsmod");
    assert_eq!(loaded.platform, TargetPlatform::Facebook);
    assert_eq!(loaded.status, PostStatus::Scheduled);
    assert_eq!(loaded.scheduled_at, Some(1_700_000_000));
    assert_eq!(loaded.link_url.as_deref(), Some("https://example.com"));
    assert_eq!(loaded.image_refs, vec!["/sites/jsmod/files/a.jpg"]);
    assert!(loaded.external_ids.is_empty());
}

#[tokio::test]
async fn test_get_post_missing_returns_none() {
    let (store, _dir) = open_store().await;
    assert!(store.get_post("no-such-post").await.unwrap().is_none());
}

#[tokio::test]
async fn test_due_posts_respects_cutoff_and_status() {
    let (store, _dir) = open_store().await;

    let due = scheduled_post("s", "due", 100);
    let future = scheduled_post("s", "future", 10_000);
    let mut draft = scheduled_post("s", "draft", 100);
    draft.status = PostStatus::Draft;

    store.create_post(&due).await.unwrap();
    store.create_post(&future).await.unwrap();
    store.create_post(&draft).await.unwrap();

    let found = store.due_posts(PostStatus::Scheduled, 500).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "due");
}

#[tokio::test]
async fn test_due_posts_boundary_is_inclusive() {
    let (store, _dir) = open_store().await;

    let post = scheduled_post("s", "exact", 500);
    store.create_post(&post).await.unwrap();

    let found = store.due_posts(PostStatus::Scheduled, 500).await.unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_update_post_status_sets_external_ids() {
    let (store, _dir) = open_store().await;

    let post = scheduled_post("s", "p", 100);
    store.create_post(&post).await.unwrap();

    store
        .update_post_status(
            &post.id,
            PostStatus::Published,
            &["facebook:222".to_string()],
        )
        .await
        .unwrap();

    let loaded = store.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, PostStatus::Published);
    assert_eq!(loaded.external_ids, vec!["facebook:222"]);

    // Published posts with an external ID show up in the metrics sweep.
    let published = store
        .posts_with_external_ids(PostStatus::Published)
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
}

#[tokio::test]
async fn test_update_post_status_unknown_post_errors() {
    let (store, _dir) = open_store().await;
    let result = store
        .update_post_status("missing", PostStatus::Published, &[])
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_scheduled_posts_between() {
    let (store, _dir) = open_store().await;

    store
        .create_post(&scheduled_post("s", "early", 100))
        .await
        .unwrap();
    store
        .create_post(&scheduled_post("s", "mid", 200))
        .await
        .unwrap();
    store
        .create_post(&scheduled_post("s", "late", 300))
        .await
        .unwrap();

    let window = store.scheduled_posts_between(150, 250).await.unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].title, "mid");

    let all = store.scheduled_posts_between(0, i64::MAX).await.unwrap();
    assert_eq!(all.len(), 3);
    // Ordered by scheduled time
    assert_eq!(all[0].title, "early");
    assert_eq!(all[2].title, "late");
}

#[tokio::test]
async fn test_account_upsert_is_idempotent() {
    let (store, _dir) = open_store().await;

    let mut record = account("site", TargetPlatform::Facebook, "111");
    store.put_account(&record).await.unwrap();

    record.page_token = Some("rotated-token".to_string());
    store.put_account(&record).await.unwrap();

    let accounts = store
        .list_accounts("site", TargetPlatform::Facebook)
        .await
        .unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].page_token.as_deref(), Some("rotated-token"));
}

#[tokio::test]
async fn test_get_account_by_key() {
    let (store, _dir) = open_store().await;

    store
        .put_account(&account("site", TargetPlatform::LinkedIn, "u1"))
        .await
        .unwrap();

    let found = store
        .get_account("site", TargetPlatform::LinkedIn, "u1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.account_id, "u1");
    assert_eq!(found.access_token, "user-token");

    let missing = store
        .get_account("site", TargetPlatform::Facebook, "u1")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_accounts_scoped_by_site_and_platform() {
    let (store, _dir) = open_store().await;

    store
        .put_account(&account("a", TargetPlatform::Facebook, "1"))
        .await
        .unwrap();
    store
        .put_account(&account("a", TargetPlatform::LinkedIn, "u1"))
        .await
        .unwrap();
    store
        .put_account(&account("b", TargetPlatform::Facebook, "2"))
        .await
        .unwrap();

    let site_a_facebook = store
        .list_accounts("a", TargetPlatform::Facebook)
        .await
        .unwrap();
    assert_eq!(site_a_facebook.len(), 1);
    assert_eq!(site_a_facebook[0].account_id, "1");

    let all_facebook = store
        .list_accounts_by_platform(TargetPlatform::Facebook)
        .await
        .unwrap();
    assert_eq!(all_facebook.len(), 2);
}

#[tokio::test]
async fn test_remove_account_removes_exactly_one() {
    let (store, _dir) = open_store().await;

    store
        .put_account(&account("site", TargetPlatform::Facebook, "1"))
        .await
        .unwrap();
    store
        .put_account(&account("site", TargetPlatform::Facebook, "2"))
        .await
        .unwrap();

    let removed = store
        .remove_account("site", TargetPlatform::Facebook, "1")
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let remaining = store
        .list_accounts("site", TargetPlatform::Facebook)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].account_id, "2");

    // Removing again is a no-op
    let removed = store
        .remove_account("site", TargetPlatform::Facebook, "1")
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn test_activity_log_is_append_only_and_ordered() {
    let (store, _dir) = open_store().await;

    for (i, action) in [
        ActivityAction::PublishAttempt,
        ActivityAction::PublishSuccess,
        ActivityAction::Schedule,
    ]
    .iter()
    .enumerate()
    {
        let entry = ActivityEntry {
            id: None,
            site_key: "site".to_string(),
            created_at: 1000 + i as i64,
            action: *action,
            post_id: Some("p1".to_string()),
            post_title: Some("Title".to_string()),
            platform: Some(TargetPlatform::Facebook),
            status: None,
            message: format!("entry {}", i),
            error_message: None,
            user_id: None,
        };
        store.append_activity(&entry).await.unwrap();
    }

    let entries = store.list_activity("site", 100).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].action, ActivityAction::PublishAttempt);
    assert_eq!(entries[1].action, ActivityAction::PublishSuccess);
    assert_eq!(entries[2].action, ActivityAction::Schedule);

    // Timestamps are non-decreasing in append order
    assert!(entries.windows(2).all(|w| w[0].created_at <= w[1].created_at));

    // Entries are scoped per site
    assert!(store.list_activity("other", 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_task_registry_guard() {
    let (store, _dir) = open_store().await;

    assert!(!store.task_registered("publish-due").await.unwrap());
    assert!(store.register_task("publish-due").await.unwrap());
    assert!(store.task_registered("publish-due").await.unwrap());

    // Second registration is refused
    assert!(!store.register_task("publish-due").await.unwrap());

    store.remove_task("publish-due").await.unwrap();
    assert!(!store.task_registered("publish-due").await.unwrap());
}
