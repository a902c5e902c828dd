//! Outbound HTTP client
//!
//! Shared wrapper over a single `reqwest::Client` with the timeouts all
//! provider calls use: 10 s to connect, 30 s to read. Redirects are never
//! followed; OAuth providers depend on the exact redirect URI reaching them.
//!
//! Transport failures (DNS, connect, timeout) surface as
//! `HttpError::Transport`; any non-2xx response as `HttpError::Status` with
//! the body preserved for the caller's diagnostics.

use std::time::Duration;

use crate::error::{HttpError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(CONNECT_TIMEOUT + READ_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("Socialcast/0.2")
            .build()
            .expect("HTTP client construction");

        Self { client }
    }

    /// GET, expecting a 2xx response.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        Self::execute(request).await
    }

    /// GET with a bearer token.
    pub async fn get_bearer(&self, url: &str, token: &str) -> Result<HttpResponse> {
        let auth = format!("Bearer {}", token);
        self.get(url, &[("Authorization", auth.as_str())]).await
    }

    /// POST a JSON body, expecting a 2xx response.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        Self::execute(request).await
    }

    /// POST an `application/x-www-form-urlencoded` body, expecting a 2xx
    /// response. Pairs are sent in the given order.
    pub async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<HttpResponse> {
        let request = self.client.post(url).form(form);
        Self::execute(request).await
    }

    /// Forward a request verbatim (used by the proxy): arbitrary method,
    /// headers, and raw body. Non-2xx responses are returned, not errors;
    /// only transport failures error out.
    pub async fn forward(
        &self,
        method: reqwest::Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<(u16, Option<String>, Vec<u8>)> {
        let mut request = self.client.request(method, url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();

        Ok((status, content_type, body))
    }

    async fn execute(request: reqwest::RequestBuilder) -> Result<HttpResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(HttpError::Status { status, body }.into());
        }

        Ok(HttpResponse { status, body })
    }
}

/// Parse a JSON response body, mapping parse failures to a transport-level
/// protocol error message.
pub fn parse_json(body: &str) -> Result<serde_json::Value> {
    serde_json::from_str(body)
        .map_err(|e| HttpError::Transport(format!("invalid JSON response: {}", e)).into())
}
