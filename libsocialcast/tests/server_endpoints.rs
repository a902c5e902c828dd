//! HTTP endpoint tests
//!
//! Drive the router directly with tower's `oneshot`; no network, no live
//! providers. Covers the OAuth start/callback edge behavior, the insights
//! parameter validation, and the proxy's auth and method gates.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use libsocialcast::config::{
    Config, DatabaseConfig, FacebookConfig, ProxyConfig, SchedulerConfig, ServerConfig,
};
use libsocialcast::server::{build_router, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

fn test_config(db_path: &str) -> Config {
    Config {
        database: DatabaseConfig {
            path: db_path.to_string(),
        },
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
            base_url: "https://hub.example.com".to_string(),
            mount: "/modules".to_string(),
            api_token: Some("proxy-caller-token".to_string()),
        },
        scheduler: SchedulerConfig::default(),
        facebook: Some(FacebookConfig {
            app_id: "fb-app".to_string(),
            app_secret: Some("fb-secret".to_string()),
            redirect_uri: Some("/modules/SocialHub/oauth/facebook/callback".to_string()),
            scopes: "pages_show_list,pages_manage_posts,pages_read_engagement".to_string(),
            api_version: "v21.0".to_string(),
            base_url: "https://graph.facebook.com".to_string(),
            page_id: None,
            page_access_token: None,
        }),
        instagram: None,
        linkedin: None,
        proxy: ProxyConfig::default(),
    }
}

async fn router() -> (axum::Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test.db");
    let state = AppState::new(test_config(db_path.to_str().unwrap()))
        .await
        .unwrap();
    (build_router(state), dir)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
async fn test_oauth_start_redirects_to_facebook() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .uri("/modules/SocialHub/oauth/facebook/start?site=jsmod")
        .header(header::HOST, "hub.example.com")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_redirection());

    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    assert!(location.starts_with("https://www.facebook.com/v20.0/dialog/oauth"));
    assert!(location.contains("client_id=fb-app"));
    assert!(location.contains("state=site%3Ajsmod"));
    assert!(location.contains(
        "redirect_uri=https%3A%2F%2Fhub.example.com%2Fmodules%2FSocialHub%2Foauth%2Ffacebook%2Fcallback"
    ));
    assert!(location.contains("scope=pages_show_list"));
}

#[tokio::test]
async fn test_oauth_start_unconfigured_platform_renders_error_page() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .uri("/modules/SocialHub/oauth/linkedin/start")
        .header(header::HOST, "hub.example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    // Error pages are served with 200
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("Missing configuration"));
    assert!(body.contains("linkedin.client_id"));
}

#[tokio::test]
async fn test_oauth_callback_provider_error_is_200_page() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .uri("/modules/SocialHub/oauth/facebook/callback?error=access_denied&error_description=User+denied")
        .header(header::HOST, "hub.example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("Authentication Failed"));
    assert!(body.contains("access_denied"));
}

#[tokio::test]
async fn test_oauth_callback_missing_code_is_200_page() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .uri("/modules/SocialHub/oauth/facebook/callback?state=site%3Ajsmod")
        .header(header::HOST, "hub.example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("Missing authorization code"));
}

#[tokio::test]
async fn test_oauth_unknown_action_is_200_page() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .uri("/modules/SocialHub/oauth/facebook/bogus")
        .header(header::HOST, "hub.example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("Unsupported action"));
}

#[tokio::test]
async fn test_oauth_uninstall_rejects_unsigned_request() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .method("POST")
        .uri("/modules/SocialHub/oauth/facebook/uninstall")
        .header(header::HOST, "hub.example.com")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("signed_request=not.valid"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("Invalid signed_request"));
}

#[tokio::test]
async fn test_insights_unknown_platform_is_400() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .uri("/modules/api/social/insights/mastodon/123?site=jsmod")
        .header(header::HOST, "hub.example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_string(response).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], 400);
    assert_eq!(json["error"], "Unsupported platform");
}

#[tokio::test]
async fn test_insights_without_account_is_500_envelope() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .uri("/modules/api/social/insights/facebook/222?site=jsmod")
        .header(header::HOST, "hub.example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_string(response).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(json["details"]
        .as_str()
        .unwrap()
        .contains("No Facebook account"));
}

#[tokio::test]
async fn test_proxy_unauthenticated_is_401_envelope() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .uri("/modules/social-proxy/v21.0/me")
        .header(header::HOST, "hub.example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_string(response).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "Authentication required");
    assert_eq!(json["status"], 401);
}

#[tokio::test]
async fn test_proxy_wrong_token_is_401() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .uri("/modules/social-proxy/v21.0/me")
        .header(header::HOST, "hub.example.com")
        .header(header::AUTHORIZATION, "Bearer wrong-token")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_proxy_unsupported_method_is_405_envelope() {
    let (app, _dir) = router().await;

    let request = Request::builder()
        .method("PUT")
        .uri("/modules/social-proxy/v21.0/me")
        .header(header::HOST, "hub.example.com")
        .header(header::AUTHORIZATION, "Bearer proxy-caller-token")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let body = body_string(response).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "Method not supported");
}
