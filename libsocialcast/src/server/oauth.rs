//! OAuth endpoints
//!
//! `GET/POST /SocialHub/oauth/{platform}/{start|callback|uninstall|delete}`.
//! The coordinator returns a typed outcome; this layer only translates it
//! into an axum response. Error pages keep HTTP 200 (Facebook validates the
//! callback URL by expecting a 200).

use std::collections::HashMap;

use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};

use crate::oauth::{CallbackParams, OAuthResponse, RequestContext};
use crate::server::AppState;

pub async fn handle_oauth(
    State(state): State<AppState>,
    Path((platform, action)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Option<Form<HashMap<String, String>>>,
) -> Response {
    let ctx = request_context(&headers, uri.path());

    // Providers send parameters in the query on redirects and in the form
    // body on server-to-server callbacks; accept both.
    let mut params = query;
    if let Some(Form(form)) = body {
        for (key, value) in form {
            params.entry(key).or_insert(value);
        }
    }

    let outcome = match action.as_str() {
        "start" => state
            .oauth
            .start(&platform, params.get("site").map(|s| s.as_str()), &ctx),
        "callback" => {
            let callback = CallbackParams {
                code: params.get("code").cloned(),
                state: params.get("state").cloned(),
                error: params.get("error").cloned(),
                error_description: params.get("error_description").cloned(),
                site: params.get("site").cloned(),
            };
            state.oauth.callback(&platform, &callback, &ctx).await
        }
        "uninstall" => {
            state
                .oauth
                .uninstall(&platform, params.get("signed_request").map(|s| s.as_str()))
                .await
        }
        "delete" => {
            state
                .oauth
                .delete(
                    &platform,
                    params.get("signed_request").map(|s| s.as_str()),
                    &ctx,
                )
                .await
        }
        other => OAuthResponse::Html(unsupported_action_page(&platform, other)),
    };

    render(outcome)
}

fn render(outcome: OAuthResponse) -> Response {
    match outcome {
        OAuthResponse::Redirect(url) => Redirect::to(&url).into_response(),
        OAuthResponse::Html(html) => Html(html).into_response(),
        OAuthResponse::Json(value) => Json(value).into_response(),
    }
}

/// Reconstruct the caller-visible origin from proxy-aware headers.
fn request_context(headers: &HeaderMap, path: &str) -> RequestContext {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http")
        .to_string();

    let host_header = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let (host, port) = match host_header.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (host_header.to_string(), None),
        },
        None => (host_header.to_string(), None),
    };

    RequestContext {
        scheme,
        host,
        port,
        path: path.to_string(),
    }
}

fn unsupported_action_page(platform: &str, action: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body><h1>OAuth error</h1>\
         <p>Unsupported action '{}' for platform '{}'.</p>\
         <p>Valid actions are: start, callback, uninstall, delete</p></body></html>",
        action, platform
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        headers.insert(
            axum::http::header::HOST,
            "hub.example.com:8443".parse().unwrap(),
        );

        let ctx = request_context(&headers, "/modules/SocialHub/oauth/facebook/start");
        assert_eq!(ctx.scheme, "https");
        assert_eq!(ctx.host, "hub.example.com");
        assert_eq!(ctx.port, Some(8443));
        assert_eq!(ctx.base(), "https://hub.example.com:8443");
    }

    #[test]
    fn test_request_context_defaults() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::HOST, "localhost".parse().unwrap());

        let ctx = request_context(&headers, "/x");
        assert_eq!(ctx.scheme, "http");
        assert_eq!(ctx.host, "localhost");
        assert_eq!(ctx.port, None);
        assert_eq!(ctx.base(), "http://localhost");
    }
}
