//! OAuth `state` parameter encoding
//!
//! The state carries the site key through the provider round-trip as
//! `site:<siteKey>`. For LinkedIn it additionally carries the effective
//! redirect URI (`...|redirect:<urlEncoded>`), because LinkedIn's token
//! endpoint requires the redirect URI bytes to match the authorization
//! request exactly.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedState {
    pub site_key: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Build the state value for an authorization redirect.
pub fn encode_state(site_key: Option<&str>) -> String {
    match site_key.filter(|s| !s.is_empty()) {
        Some(site) => format!("site:{}", site),
        None => Uuid::new_v4().to_string(),
    }
}

/// Append the redirect URI to a state value (LinkedIn only).
pub fn with_redirect(state: &str, redirect_uri: &str) -> String {
    format!("{}|redirect:{}", state, urlencoding::encode(redirect_uri))
}

/// Parse a state value received on callback.
pub fn parse_state(raw: Option<&str>) -> ParsedState {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            return ParsedState {
                site_key: None,
                redirect_uri: None,
            }
        }
    };

    let (state_part, redirect_uri) = match raw.split_once("|redirect:") {
        Some((state, encoded)) => {
            let decoded = urlencoding::decode(encoded)
                .map(|s| s.into_owned())
                .ok();
            (state, decoded)
        }
        None => (raw, None),
    };

    let site_key = state_part
        .strip_prefix("site:")
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    ParsedState {
        site_key,
        redirect_uri,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_state_with_site() {
        assert_eq!(encode_state(Some("digitall")), "site:digitall");
    }

    #[test]
    fn test_encode_state_without_site_is_nonce() {
        let state = encode_state(None);
        assert!(uuid::Uuid::parse_str(&state).is_ok());
    }

    #[test]
    fn test_parse_state_site_only() {
        let parsed = parse_state(Some("site:jsmod"));
        assert_eq!(parsed.site_key.as_deref(), Some("jsmod"));
        assert_eq!(parsed.redirect_uri, None);
    }

    #[test]
    fn test_round_trip_with_redirect() {
        let state = with_redirect(&encode_state(Some("jsmod")), "https://h/cb?x=1");
        let parsed = parse_state(Some(&state));

        assert_eq!(parsed.site_key.as_deref(), Some("jsmod"));
        assert_eq!(parsed.redirect_uri.as_deref(), Some("https://h/cb?x=1"));
    }

    #[test]
    fn test_redirect_encoding_is_url_safe() {
        let state = with_redirect("site:a", "https://h/cb");
        assert_eq!(state, "site:a|redirect:https%3A%2F%2Fh%2Fcb");
    }

    #[test]
    fn test_parse_state_nonce_keeps_no_site() {
        let parsed = parse_state(Some("3f1c0c1e-aaaa-bbbb-cccc-000000000000"));
        assert_eq!(parsed.site_key, None);
    }

    #[test]
    fn test_parse_state_missing() {
        let parsed = parse_state(None);
        assert_eq!(parsed.site_key, None);
        assert_eq!(parsed.redirect_uri, None);
    }
}
