//! HTTP server layer
//!
//! Axum router serving three surfaces under the configurable mount prefix
//! (default `/modules`): the OAuth coordinator, the insights API, and the
//! authenticated social proxy.

use std::sync::Arc;

use axum::routing::{any, get};
use axum::Router;

use crate::accounts::AccountService;
use crate::activity::ActivityLog;
use crate::config::Config;
use crate::error::Result;
use crate::httpclient::HttpClient;
use crate::metrics::MetricsService;
use crate::oauth::OAuthService;
use crate::publish::{create_platforms, PublishService};
use crate::rules::RulesHandler;
use crate::store::Store;

pub mod insights;
pub mod oauth;
pub mod proxy;

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub accounts: AccountService,
    pub oauth: OAuthService,
    pub metrics: MetricsService,
    pub publish: PublishService,
    pub rules: RulesHandler,
    pub http: HttpClient,
}

impl AppState {
    /// Open the store and wire all services.
    pub async fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let store = Store::open(&crate::config::resolve_db_path(&config.database.path)).await?;
        let http = HttpClient::new();

        let accounts = AccountService::new(store.clone(), http.clone());
        let activity = ActivityLog::new(store.clone());
        let oauth = OAuthService::new(Arc::clone(&config), accounts.clone(), http.clone());
        let metrics = MetricsService::new(
            store.clone(),
            accounts.clone(),
            Arc::clone(&config),
            http.clone(),
        );
        let platforms = create_platforms(&config, &http);
        let publish = PublishService::new(
            store.clone(),
            accounts.clone(),
            activity.clone(),
            Arc::clone(&config),
            platforms,
        );
        let rules = RulesHandler::new(store.clone(), activity);

        Ok(Self {
            config,
            store,
            accounts,
            oauth,
            metrics,
            publish,
            rules,
            http,
        })
    }
}

/// Build the full router, nested under the configured mount prefix.
pub fn build_router(state: AppState) -> Router {
    let mount = state.config.server.mount.clone();

    let inner = Router::new()
        .route(
            "/SocialHub/oauth/:platform/:action",
            any(oauth::handle_oauth),
        )
        .route(
            "/api/social/insights/:platform/:post_id",
            get(insights::handle_insights),
        )
        .route("/social-proxy", any(proxy::handle_proxy_root))
        .route("/social-proxy/*path", any(proxy::handle_proxy))
        .with_state(state);

    Router::new().nest(&mount, inner)
}
