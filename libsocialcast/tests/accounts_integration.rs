//! Credential store integration tests

use libsocialcast::accounts::AccountService;
use libsocialcast::httpclient::HttpClient;
use libsocialcast::store::Store;
use libsocialcast::types::{Account, TargetPlatform};
use tempfile::TempDir;

async fn service() -> (AccountService, Store, TempDir) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test.db");
    let store = Store::open(db_path.to_str().unwrap()).await.unwrap();
    let service = AccountService::new(store.clone(), HttpClient::new());
    (service, store, dir)
}

fn facebook_account(site: &str, page_id: &str, page_token: Option<&str>) -> Account {
    let now = chrono::Utc::now().timestamp();
    Account {
        site_key: site.to_string(),
        platform: TargetPlatform::Facebook,
        account_id: page_id.to_string(),
        label: format!("Page {}", page_id),
        handle: format!("Page {}", page_id),
        page_id: Some(page_id.to_string()),
        access_token: "user-token".to_string(),
        page_token: page_token.map(|s| s.to_string()),
        email: None,
        token_expiry: now + 3600,
        is_active: true,
        created_at: now,
    }
}

#[tokio::test]
async fn test_facebook_accounts_view() {
    let (service, store, _dir) = service().await;
    store
        .put_account(&facebook_account("site", "111", Some("pt-111")))
        .await
        .unwrap();

    let accounts = service.facebook_accounts("site").await.unwrap();
    assert_eq!(accounts.len(), 1);

    let account = &accounts["111"];
    assert_eq!(account.page_id, "111");
    assert_eq!(account.page_name, "Page 111");
    assert_eq!(account.page_token, "pt-111");
    assert_eq!(account.user_token, "user-token");
}

#[tokio::test]
async fn test_legacy_facebook_account_falls_back_to_user_token() {
    let (service, store, _dir) = service().await;
    store
        .put_account(&facebook_account("site", "111", None))
        .await
        .unwrap();

    let accounts = service.facebook_accounts("site").await.unwrap();
    assert_eq!(accounts["111"].page_token, "user-token");

    let token = service.page_access_token("site", None).await.unwrap();
    assert_eq!(token.as_deref(), Some("user-token"));
}

#[tokio::test]
async fn test_page_access_token_prefers_requested_page() {
    let (service, store, _dir) = service().await;
    store
        .put_account(&facebook_account("site", "111", Some("pt-111")))
        .await
        .unwrap();
    store
        .put_account(&facebook_account("site", "222", Some("pt-222")))
        .await
        .unwrap();

    let token = service
        .page_access_token("site", Some("222"))
        .await
        .unwrap();
    assert_eq!(token.as_deref(), Some("pt-222"));

    let missing = service
        .page_access_token("site", Some("999"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_connect_linkedin_account_is_idempotent() {
    let (service, store, _dir) = service().await;

    service
        .connect_linkedin_account("site", "u1", "Name", "e@x.com", "T1", Some(5_184_000))
        .await
        .unwrap();
    service
        .connect_linkedin_account("site", "u1", "Name", "e@x.com", "T2", Some(5_184_000))
        .await
        .unwrap();

    // Repeating the exchange updates the record instead of inserting
    let records = store
        .list_accounts("site", TargetPlatform::LinkedIn)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].access_token, "T2");

    let accounts = service.linkedin_accounts("site").await.unwrap();
    assert_eq!(accounts["u1"].name, "Name");
    assert_eq!(accounts["u1"].email, "e@x.com");
}

#[tokio::test]
async fn test_linkedin_expiry_is_after_creation() {
    let (service, store, _dir) = service().await;

    let before = chrono::Utc::now().timestamp();
    service
        .connect_linkedin_account("site", "u1", "N", "", "T", Some(5_184_000))
        .await
        .unwrap();

    let records = store
        .list_accounts("site", TargetPlatform::LinkedIn)
        .await
        .unwrap();
    let record = &records[0];

    assert!(record.token_expiry > record.created_at);
    assert!(record.token_expiry >= before + 5_184_000);
    // Empty email is not stored
    assert!(record.email.is_none());
}

#[tokio::test]
async fn test_primary_token_returns_first_active_account() {
    let (service, _store, _dir) = service().await;

    service
        .connect_linkedin_account("site", "u1", "First", "", "T-first", None)
        .await
        .unwrap();
    service
        .connect_linkedin_account("site", "u2", "Second", "", "T-second", None)
        .await
        .unwrap();

    let token = service
        .primary_token("site", TargetPlatform::LinkedIn, None)
        .await
        .unwrap();
    assert_eq!(token.as_deref(), Some("T-first"));

    let preferred = service
        .primary_token("site", TargetPlatform::LinkedIn, Some("u2"))
        .await
        .unwrap();
    assert_eq!(preferred.as_deref(), Some("T-second"));
}

#[tokio::test]
async fn test_disconnect_removes_exactly_one() {
    let (service, _store, _dir) = service().await;

    service
        .connect_linkedin_account("site", "u1", "A", "", "T1", None)
        .await
        .unwrap();
    service
        .connect_linkedin_account("site", "u2", "B", "", "T2", None)
        .await
        .unwrap();

    let removed = service
        .disconnect("site", TargetPlatform::LinkedIn, "u1")
        .await
        .unwrap();
    assert!(removed);

    let remaining = service.linkedin_accounts("site").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains_key("u2"));

    // Disconnecting an unknown account reports nothing removed
    let removed = service
        .disconnect("site", TargetPlatform::LinkedIn, "u1")
        .await
        .unwrap();
    assert!(!removed);
}

#[tokio::test]
async fn test_disconnect_all_for_platform() {
    let (service, _store, _dir) = service().await;

    service
        .connect_linkedin_account("a", "u1", "A", "", "T1", None)
        .await
        .unwrap();
    service
        .connect_linkedin_account("b", "u2", "B", "", "T2", None)
        .await
        .unwrap();

    let all = service
        .accounts_by_platform(TargetPlatform::LinkedIn)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let removed = service.disconnect_all("a", TargetPlatform::LinkedIn).await.unwrap();
    assert_eq!(removed, 1);
    assert!(service.linkedin_accounts("a").await.unwrap().is_empty());
    assert_eq!(service.linkedin_accounts("b").await.unwrap().len(), 1);
}
