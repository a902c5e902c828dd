//! OAuth coordinator
//!
//! Runs the authorization-code flow for the three providers under
//! `/SocialHub/oauth/<platform>/<action>`. Every human-facing outcome,
//! success or failure, is an HTML page served with HTTP 200: Facebook's
//! callback validation requires a 200 even on error.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::accounts::AccountService;
use crate::config::Config;
use crate::error::CastError;
use crate::httpclient::{parse_json, HttpClient};
use crate::types::redact_token;

pub mod signed_request;
pub mod state;

const FACEBOOK_DIALOG_URL: &str = "https://www.facebook.com/v20.0/dialog/oauth";
const FACEBOOK_OAUTH_VERSION: &str = "v20.0";
const INSTAGRAM_AUTHORIZE_URL: &str = "https://api.instagram.com/oauth/authorize";
const LINKEDIN_AUTHORIZE_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
const LINKEDIN_TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const LINKEDIN_DEFAULT_EXPIRES_IN: i64 = 5_184_000;

/// Fallback tenant when neither state nor query names a site.
const DEFAULT_SITE: &str = "default";

/// What the caller's HTTP request looked like; used to synthesize redirect
/// URIs from relative configuration.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

impl RequestContext {
    /// `<scheme>://<host>[:port]`, omitting the port when it matches the
    /// scheme default.
    pub fn base(&self) -> String {
        match self.port {
            Some(port)
                if !(self.scheme == "http" && port == 80)
                    && !(self.scheme == "https" && port == 443) =>
            {
                format!("{}://{}:{}", self.scheme, self.host, port)
            }
            _ => format!("{}://{}", self.scheme, self.host),
        }
    }

    pub fn full_url(&self) -> String {
        format!("{}{}", self.base(), self.path)
    }
}

/// Query parameters a provider may send to the callback.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub site: Option<String>,
}

/// Outcome of an OAuth action, rendered by the HTTP layer.
#[derive(Debug, Clone)]
pub enum OAuthResponse {
    /// 302 to the provider's authorization URL.
    Redirect(String),
    /// HTML page, always served with status 200.
    Html(String),
    /// JSON body with status 200.
    Json(serde_json::Value),
}

#[derive(Clone)]
pub struct OAuthService {
    config: Arc<Config>,
    accounts: AccountService,
    http: HttpClient,
}

impl OAuthService {
    pub fn new(config: Arc<Config>, accounts: AccountService, http: HttpClient) -> Self {
        Self {
            config,
            accounts,
            http,
        }
    }

    // ------------------------------------------------------------------
    // start
    // ------------------------------------------------------------------

    /// Redirect the client to the provider's authorization URL.
    pub fn start(
        &self,
        platform: &str,
        site: Option<&str>,
        ctx: &RequestContext,
    ) -> OAuthResponse {
        let state = state::encode_state(site);

        match platform {
            "facebook" => {
                let facebook = match &self.config.facebook {
                    Some(cfg) if !cfg.app_id.is_empty() => cfg,
                    _ => {
                        return config_error_page(
                            "Facebook",
                            "facebook.app_id is not configured for Socialcast.",
                        )
                    }
                };

                let redirect_uri =
                    resolve_redirect_uri(facebook.redirect_uri.as_deref(), ctx, "facebook");
                let url = format!(
                    "{}?client_id={}&redirect_uri={}&state={}&scope={}",
                    FACEBOOK_DIALOG_URL,
                    urlencoding::encode(&facebook.app_id),
                    urlencoding::encode(&redirect_uri),
                    urlencoding::encode(&state),
                    urlencoding::encode(&facebook.scopes),
                );

                info!("Redirecting to Facebook OAuth");
                OAuthResponse::Redirect(url)
            }
            "instagram" => {
                let instagram = match &self.config.instagram {
                    Some(cfg) if !cfg.app_id.is_empty() => cfg,
                    _ => {
                        return config_error_page(
                            "Instagram",
                            "instagram.app_id is not configured for Socialcast.",
                        )
                    }
                };

                let redirect_uri =
                    resolve_redirect_uri(instagram.redirect_uri.as_deref(), ctx, "instagram");
                let url = format!(
                    "{}?client_id={}&redirect_uri={}&state={}&scope={}&response_type=code",
                    INSTAGRAM_AUTHORIZE_URL,
                    urlencoding::encode(&instagram.app_id),
                    urlencoding::encode(&redirect_uri),
                    urlencoding::encode(&state),
                    urlencoding::encode(&instagram.scopes),
                );

                info!("Redirecting to Instagram OAuth");
                OAuthResponse::Redirect(url)
            }
            "linkedin" => {
                let linkedin = match &self.config.linkedin {
                    Some(cfg) if !cfg.client_id.is_empty() => cfg,
                    _ => {
                        return config_error_page(
                            "LinkedIn",
                            "linkedin.client_id is not configured for Socialcast.",
                        )
                    }
                };

                let redirect_uri =
                    resolve_redirect_uri(linkedin.redirect_uri.as_deref(), ctx, "linkedin");
                // The token endpoint needs the byte-identical redirect URI,
                // so carry it through the provider round-trip in the state.
                let state = state::with_redirect(&state, &redirect_uri);
                let url = format!(
                    "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
                    LINKEDIN_AUTHORIZE_URL,
                    urlencoding::encode(&linkedin.client_id),
                    urlencoding::encode(&redirect_uri),
                    urlencoding::encode(&linkedin.scopes),
                    urlencoding::encode(&state),
                );

                info!("Redirecting to LinkedIn OAuth");
                OAuthResponse::Redirect(url)
            }
            other => error_page(
                other,
                &format!("Unsupported platform: {}", other),
                "Valid platforms are: facebook, instagram, linkedin",
            ),
        }
    }

    // ------------------------------------------------------------------
    // callback
    // ------------------------------------------------------------------

    pub async fn callback(
        &self,
        platform: &str,
        params: &CallbackParams,
        ctx: &RequestContext,
    ) -> OAuthResponse {
        if let Some(provider_error) = &params.error {
            error!(
                "OAuth error from {}: {} - {:?}",
                platform, provider_error, params.error_description
            );
            return error_page(
                platform,
                provider_error,
                params.error_description.as_deref().unwrap_or(""),
            );
        }

        let code = match params.code.as_deref().filter(|c| !c.is_empty()) {
            Some(code) => code,
            None => {
                return error_page(
                    platform,
                    "Missing authorization code",
                    "The OAuth provider did not return an authorization code.",
                )
            }
        };

        info!(
            "Received OAuth callback for {} with code {}",
            platform,
            redact_token(code)
        );

        match platform {
            "facebook" => self.facebook_callback(code, params, ctx).await,
            "instagram" => {
                // Token exchange for Instagram Basic Display is a documented
                // placeholder; the account connection happens via Facebook.
                success_page("Instagram", "Instagram account connected successfully!")
            }
            "linkedin" => self.linkedin_callback(code, params, ctx).await,
            other => error_page(
                other,
                &format!("Unsupported platform: {}", other),
                "Valid platforms are: facebook, instagram, linkedin",
            ),
        }
    }

    async fn facebook_callback(
        &self,
        code: &str,
        params: &CallbackParams,
        ctx: &RequestContext,
    ) -> OAuthResponse {
        let facebook = match &self.config.facebook {
            Some(cfg) if !cfg.app_id.is_empty() && cfg.app_secret.is_some() => cfg.clone(),
            _ => {
                return config_error_page(
                    "Facebook",
                    "facebook.app_id or facebook.app_secret is not configured.",
                )
            }
        };
        let app_secret = facebook.app_secret.clone().unwrap_or_default();

        // 1. Exchange the code for a short-lived user token.
        let redirect_uri = resolve_redirect_uri(facebook.redirect_uri.as_deref(), ctx, "facebook");
        let short_token_url = format!(
            "{}/{}/oauth/access_token?client_id={}&redirect_uri={}&client_secret={}&code={}",
            facebook.base_url,
            FACEBOOK_OAUTH_VERSION,
            urlencoding::encode(&facebook.app_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(&app_secret),
            urlencoding::encode(code),
        );

        let short_token = match self.fetch_access_token(&short_token_url).await {
            Ok(token) => token,
            Err(e) => {
                error!("Facebook short-lived token exchange failed: {}", e);
                return error_page(
                    "Facebook",
                    "Token exchange failed",
                    "Could not retrieve short-lived token.",
                );
            }
        };

        // 2. Exchange for the long-lived user token. The short token still
        // works if this step fails.
        let long_token_url = format!(
            "{}/{}/oauth/access_token?grant_type=fb_exchange_token&client_id={}&client_secret={}&fb_exchange_token={}",
            facebook.base_url,
            FACEBOOK_OAUTH_VERSION,
            urlencoding::encode(&facebook.app_id),
            urlencoding::encode(&app_secret),
            urlencoding::encode(&short_token),
        );

        let user_token = match self.fetch_access_token(&long_token_url).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Long-lived token exchange failed, using short-lived token: {}", e);
                short_token
            }
        };

        // 3. Enumerate pages and persist an account per accepted page.
        let site_key = site_from(params);

        match self
            .accounts
            .connect_facebook_account(&facebook, &user_token, &site_key)
            .await
        {
            Ok(pages) => {
                info!(
                    "Connected {} Facebook page(s) for site {}",
                    pages.len(),
                    site_key
                );
                success_page(
                    "Facebook",
                    "Facebook account(s) connected successfully! You can now close this window.",
                )
            }
            Err(e) => {
                error!("Failed to connect Facebook account: {}", e);
                error_page(
                    "Facebook",
                    "Storage error",
                    &format!("Failed to store account: {}", e),
                )
            }
        }
    }

    async fn linkedin_callback(
        &self,
        code: &str,
        params: &CallbackParams,
        ctx: &RequestContext,
    ) -> OAuthResponse {
        let linkedin = match &self.config.linkedin {
            Some(cfg) if !cfg.client_id.is_empty() => cfg.clone(),
            _ => {
                return config_error_page(
                    "LinkedIn",
                    "linkedin.client_id or linkedin.client_secret is not configured.",
                )
            }
        };

        // The redirect URI must match the authorization request byte for
        // byte; prefer the copy carried through state.
        let parsed_state = state::parse_state(params.state.as_deref());
        let redirect_uri = match parsed_state.redirect_uri {
            Some(uri) if uri.starts_with('/') => RequestContext {
                path: uri,
                ..ctx.clone()
            }
            .full_url(),
            Some(uri) => uri,
            None => resolve_redirect_uri(linkedin.redirect_uri.as_deref(), ctx, "linkedin"),
        };

        // 1. Exchange the authorization code for an access token.
        let form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("client_id".to_string(), linkedin.client_id.clone()),
            ("client_secret".to_string(), linkedin.client_secret.clone()),
            ("redirect_uri".to_string(), redirect_uri),
        ];

        let token_response = match self.http.post_form(LINKEDIN_TOKEN_URL, &form).await {
            Ok(response) => response,
            Err(e) => {
                error!("LinkedIn token exchange failed: {}", e);
                return error_page(
                    "LinkedIn",
                    "Token Exchange Failed",
                    "Failed to exchange authorization code for access token",
                );
            }
        };

        let token_json = match parse_json(&token_response.body) {
            Ok(json) => json,
            Err(e) => {
                error!("LinkedIn token response was not JSON: {}", e);
                return error_page(
                    "LinkedIn",
                    "Token Exchange Failed",
                    "Unexpected token endpoint response",
                );
            }
        };

        let access_token = match token_json["access_token"].as_str() {
            Some(token) => token.to_string(),
            None => {
                error!("LinkedIn token response missing access_token");
                return error_page(
                    "LinkedIn",
                    "Token Exchange Failed",
                    "The token endpoint did not return an access_token",
                );
            }
        };
        let expires_in = token_json["expires_in"]
            .as_i64()
            .unwrap_or(LINKEDIN_DEFAULT_EXPIRES_IN);

        info!(
            "LinkedIn access token obtained ({}), expires in {} seconds",
            redact_token(&access_token),
            expires_in
        );

        // 2. Fetch the member identity.
        let userinfo_url = format!("{}/v2/userinfo", linkedin.base_url);
        let profile = match self.http.get_bearer(&userinfo_url, &access_token).await {
            Ok(response) => match parse_json(&response.body) {
                Ok(json) => json,
                Err(e) => {
                    error!("LinkedIn userinfo response was not JSON: {}", e);
                    return error_page(
                        "LinkedIn",
                        "Profile Fetch Failed",
                        "Unexpected userinfo response",
                    );
                }
            },
            Err(e) => {
                error!("LinkedIn userinfo fetch failed: {}", e);
                return error_page(
                    "LinkedIn",
                    "Profile Fetch Failed",
                    "Failed to fetch user profile information",
                );
            }
        };

        let person_id = profile["sub"].as_str().unwrap_or("unknown");
        let name = profile["name"].as_str().unwrap_or("LinkedIn User");
        let email = profile["email"].as_str().unwrap_or("");

        info!("LinkedIn profile: personId={}, name={}", person_id, name);

        // 3. Persist the account, keyed by the OIDC sub.
        let site_key = match parsed_state.site_key {
            Some(site) => site,
            None => site_from(params),
        };

        match self
            .accounts
            .connect_linkedin_account(
                &site_key,
                person_id,
                name,
                email,
                &access_token,
                Some(expires_in),
            )
            .await
        {
            Ok(()) => success_page(
                "LinkedIn",
                &format!("LinkedIn account ({}) connected successfully!", name),
            ),
            Err(e) => {
                error!("Failed to store LinkedIn account: {}", e);
                error_page(
                    "LinkedIn",
                    "Storage Error",
                    &format!("Failed to save LinkedIn account: {}", e),
                )
            }
        }
    }

    // ------------------------------------------------------------------
    // uninstall / delete
    // ------------------------------------------------------------------

    /// Provider-initiated uninstall: verify the signed request and remove
    /// the user's tokens.
    pub async fn uninstall(&self, platform: &str, signed: Option<&str>) -> OAuthResponse {
        match self.verify_signed_request(platform, signed) {
            Ok(payload) => {
                let user = signed_request::user_id(&payload).unwrap_or("unknown");
                info!("Verified uninstall callback for {} user {}", platform, user);

                if let Ok(parsed) = platform.parse() {
                    match self.remove_platform_accounts(parsed).await {
                        Ok(count) => info!("Removed {} {} account(s)", count, platform),
                        Err(e) => warn!("Failed to remove {} accounts: {}", platform, e),
                    }
                }

                OAuthResponse::Json(serde_json::json!({ "success": true }))
            }
            Err(response) => response,
        }
    }

    /// Provider-initiated data deletion (GDPR). Responds with a status URL
    /// and a confirmation code the provider can query later.
    pub async fn delete(
        &self,
        platform: &str,
        signed: Option<&str>,
        ctx: &RequestContext,
    ) -> OAuthResponse {
        match self.verify_signed_request(platform, signed) {
            Ok(payload) => {
                let user = signed_request::user_id(&payload).unwrap_or("unknown");
                info!("Verified deletion callback for {} user {}", platform, user);

                if let Ok(parsed) = platform.parse() {
                    if let Err(e) = self.remove_platform_accounts(parsed).await {
                        warn!("Failed to remove {} accounts: {}", platform, e);
                    }
                }

                let confirmation_code =
                    format!("deletion-{}", chrono::Utc::now().timestamp_millis());
                let status_url = ctx
                    .full_url()
                    .replace("/delete", &format!("/status/{}", confirmation_code));

                OAuthResponse::Json(serde_json::json!({
                    "url": status_url,
                    "confirmation_code": confirmation_code,
                }))
            }
            Err(response) => response,
        }
    }

    fn verify_signed_request(
        &self,
        platform: &str,
        signed: Option<&str>,
    ) -> std::result::Result<serde_json::Value, OAuthResponse> {
        let app_secret = match platform {
            "facebook" => self
                .config
                .facebook
                .as_ref()
                .and_then(|f| f.app_secret.clone()),
            "instagram" => self
                .config
                .instagram
                .as_ref()
                .and_then(|i| i.app_secret.clone()),
            _ => None,
        };

        let app_secret = match app_secret.filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                return Err(config_error_page(
                    platform,
                    "No app secret configured; cannot verify signed_request.",
                ))
            }
        };

        let raw = match signed.filter(|s| !s.is_empty()) {
            Some(raw) => raw,
            None => {
                return Err(error_page(
                    platform,
                    "Missing signed_request",
                    "The provider did not send a signed_request parameter.",
                ))
            }
        };

        signed_request::parse_signed_request(raw, &app_secret).map_err(|e: CastError| {
            warn!("signed_request verification failed: {}", e);
            error_page(
                platform,
                "Invalid signed_request",
                "Signature verification failed.",
            )
        })
    }

    async fn remove_platform_accounts(
        &self,
        platform: crate::types::TargetPlatform,
    ) -> crate::error::Result<usize> {
        // The signed request identifies the provider user, not a site; the
        // account records do not store the provider user ID, so removal
        // covers every site that connected through this app.
        let mut removed = 0;
        for account in self.accounts.accounts_by_platform(platform).await? {
            removed += self
                .accounts
                .disconnect(&account.site_key, platform, &account.account_id)
                .await? as usize;
        }
        Ok(removed)
    }

    async fn fetch_access_token(&self, url: &str) -> crate::error::Result<String> {
        let response = self.http.get(url, &[]).await?;
        let json = parse_json(&response.body)?;

        json["access_token"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                crate::error::PlatformError::Protocol(
                    "token response missing access_token".to_string(),
                )
                .into()
            })
    }
}

fn site_from(params: &CallbackParams) -> String {
    let parsed = state::parse_state(params.state.as_deref());
    parsed
        .site_key
        .or_else(|| params.site.clone().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| DEFAULT_SITE.to_string())
}

/// Compute the effective redirect URI: absolute config values pass through,
/// a leading-slash value is resolved against the current request's origin,
/// and with no configuration the current URL with `/start` swapped for
/// `/callback` is used.
pub fn resolve_redirect_uri(
    configured: Option<&str>,
    ctx: &RequestContext,
    platform: &str,
) -> String {
    match configured.filter(|c| !c.is_empty()) {
        Some(uri) if uri.starts_with('/') => {
            let resolved = format!("{}{}", ctx.base(), uri);
            info!("Resolved {} redirect URI: {}", platform, resolved);
            resolved
        }
        Some(uri) => uri.to_string(),
        None => ctx.full_url().replace("/start", "/callback"),
    }
}

fn success_page(platform: &str, message: &str) -> OAuthResponse {
    OAuthResponse::Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>{platform} OAuth - Success</title>
  <style>
    body {{ font-family: Arial, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #f5f5f5; }}
    .container {{ text-align: center; padding: 40px; background: white; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }}
    .success {{ color: #2e7d32; font-size: 24px; margin-bottom: 20px; }}
    .message {{ color: #666; margin-bottom: 30px; }}
    .close-btn {{ padding: 10px 20px; background: #007cb0; color: white; border: none; border-radius: 4px; cursor: pointer; font-size: 16px; }}
  </style>
</head>
<body>
  <div class="container">
    <div class="success">&#10003; Success!</div>
    <div class="message">{message}</div>
    <button class="close-btn" onclick="window.close()">Close Window</button>
  </div>
</body>
</html>"#,
    ))
}

fn error_page(platform: &str, error: &str, description: &str) -> OAuthResponse {
    OAuthResponse::Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>{platform} OAuth - Error</title>
  <style>
    body {{ font-family: Arial, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #f5f5f5; }}
    .container {{ text-align: center; padding: 40px; background: white; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); max-width: 500px; }}
    .error {{ color: #c62828; font-size: 24px; margin-bottom: 20px; }}
    .message {{ color: #666; margin-bottom: 10px; }}
    .details {{ color: #999; font-size: 14px; margin-bottom: 30px; }}
    .close-btn {{ padding: 10px 20px; background: #c62828; color: white; border: none; border-radius: 4px; cursor: pointer; font-size: 16px; }}
  </style>
</head>
<body>
  <div class="container">
    <div class="error">&#10007; Authentication Failed</div>
    <div class="message">Error: {error}</div>
    <div class="details">{description}</div>
    <button class="close-btn" onclick="window.close()">Close Window</button>
  </div>
</body>
</html>"#,
    ))
}

fn config_error_page(platform: &str, detail: &str) -> OAuthResponse {
    error_page(platform, "Missing configuration", detail)
}
