//! Social proxy
//!
//! Authenticated pass-through from trusted UI callers to the provider APIs.
//! The upstream is picked from a provider hint (`provider` query parameter,
//! then the `X-Proxy-Provider` header, then the configured default). For
//! Facebook Graph upstreams, a computed `appsecret_proof` is appended
//! whenever an `access_token` travels in the query.

use axum::body::Bytes;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use tracing::{error, info};

use crate::error::CastError;
use crate::platforms::facebook::appsecret_proof;
use crate::server::AppState;

pub async fn handle_proxy_root(
    state: State<AppState>,
    method: Method,
    headers: HeaderMap,
    query: Query<HashMap<String, String>>,
    raw_query: RawQuery,
    body: Bytes,
) -> Response {
    proxy_request(state, method, headers, query, raw_query, String::new(), body).await
}

pub async fn handle_proxy(
    state: State<AppState>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    query: Query<HashMap<String, String>>,
    raw_query: RawQuery,
    body: Bytes,
) -> Response {
    proxy_request(state, method, headers, query, raw_query, path, body).await
}

async fn proxy_request(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    RawQuery(raw_query): RawQuery,
    path: String,
    body: Bytes,
) -> Response {
    if !caller_authenticated(&state, &headers) {
        return error_json(
            StatusCode::UNAUTHORIZED,
            "Authentication required",
            "Caller must present a valid bearer token to access the proxy",
        );
    }

    if method != Method::GET && method != Method::POST {
        return error_json(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not supported",
            "Only GET and POST methods are allowed",
        );
    }

    let relative_path = if path.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", path)
    };

    let base = resolve_base_url(&state, &query, &headers);
    let final_query = build_final_query(&state, &base, raw_query.as_deref());

    let target_url = match &final_query {
        Some(qs) if !qs.is_empty() => format!("{}{}?{}", base, relative_path, qs),
        _ => format!("{}{}", base, relative_path),
    };

    info!("Proxying {} request to {}", method, target_url);

    let mut upstream_headers = Vec::new();
    if let Some(token) = &state.config.proxy.auth_token {
        upstream_headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
    }
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");
    upstream_headers.push(("Content-Type".to_string(), content_type.to_string()));
    let accept = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");
    upstream_headers.push(("Accept".to_string(), accept.to_string()));

    let request_body = if method == Method::POST && !body.is_empty() {
        Some(body.to_vec())
    } else {
        None
    };

    match state
        .http
        .forward(method, &target_url, &upstream_headers, request_body)
        .await
    {
        Ok((status, content_type, body)) => {
            let mut response = Response::builder().status(status);
            response = response.header(
                axum::http::header::CONTENT_TYPE,
                content_type.unwrap_or_else(|| "application/json".to_string()),
            );
            response
                .body(axum::body::Body::from(body))
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(e) => {
            error!("Proxy request failed: {}", e);
            error_json(
                StatusCode::BAD_GATEWAY,
                "Proxy error",
                &format!("Failed to connect to external API: {}", summarize(&e)),
            )
        }
    }
}

/// Callers authenticate with the static API bearer token.
fn caller_authenticated(state: &AppState, headers: &HeaderMap) -> bool {
    let expected = match &state.config.server.api_token {
        Some(token) if !token.is_empty() => token,
        _ => return false,
    };

    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|presented| presented == expected)
        .unwrap_or(false)
}

/// Provider hint resolution: query parameter, then header, then the
/// configured default target.
fn resolve_base_url(
    state: &AppState,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> String {
    let provider = query
        .get("provider")
        .map(|s| s.to_string())
        .or_else(|| {
            headers
                .get("x-proxy-provider")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_default()
        .to_lowercase();

    let config = &state.config;
    match provider.as_str() {
        "facebook" => config
            .facebook
            .as_ref()
            .map(|f| f.base_url.clone())
            .unwrap_or_else(|| config.proxy.target_base_url.clone()),
        "instagram" => config
            .instagram
            .as_ref()
            .map(|i| i.base_url.clone())
            .unwrap_or_else(|| config.proxy.target_base_url.clone()),
        "linkedin" => config
            .linkedin
            .as_ref()
            .map(|l| l.base_url.clone())
            .unwrap_or_else(|| config.proxy.target_base_url.clone()),
        _ => config.proxy.target_base_url.clone(),
    }
}

/// Append a computed `appsecret_proof` when the target is the Facebook
/// Graph, a secret is configured, and an access token is in the query. Any
/// caller-supplied proof is replaced.
fn build_final_query(state: &AppState, base: &str, raw_query: Option<&str>) -> Option<String> {
    let raw_query = raw_query.map(|s| s.to_string());

    let app_secret = state
        .config
        .facebook
        .as_ref()
        .and_then(|f| f.app_secret.as_deref())
        .filter(|s| !s.is_empty());

    let secret = match app_secret {
        Some(secret) if base.to_lowercase().contains("graph.facebook.com") => secret,
        _ => return raw_query,
    };

    let raw = raw_query?;
    let access_token = match extract_query_param(&raw, "access_token") {
        Some(token) => token,
        None => return Some(raw),
    };

    let cleaned = strip_query_param(&raw, "appsecret_proof");
    let proof = appsecret_proof(&access_token, secret);

    Some(if cleaned.is_empty() {
        format!("appsecret_proof={}", proof)
    } else {
        format!("{}&appsecret_proof={}", cleaned, proof)
    })
}

/// First value of a query parameter, URL-decoded.
fn extract_query_param(query: &str, key: &str) -> Option<String> {
    for pair in query.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            let decoded_key = urlencoding::decode(k).ok()?;
            if decoded_key == key {
                return urlencoding::decode(v).ok().map(|s| s.into_owned());
            }
        }
    }
    None
}

/// Remove every instance of a parameter from a raw query string.
fn strip_query_param(query: &str, key: &str) -> String {
    query
        .split('&')
        .filter(|pair| {
            let param_key = pair.split_once('=').map(|(k, _)| k).unwrap_or(pair);
            urlencoding::decode(param_key)
                .map(|decoded| decoded != key)
                .unwrap_or(true)
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn summarize(error: &CastError) -> String {
    error.to_string()
}

fn error_json(status: StatusCode, error: &str, details: &str) -> Response {
    let body = serde_json::json!({
        "error": error,
        "details": details,
        "status": status.as_u16(),
    });
    (status, Json(body)).into_response()
}
