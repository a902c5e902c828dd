//! Facebook `signed_request` parsing
//!
//! Uninstall and data-deletion callbacks arrive as
//! `<base64url(signature)>.<base64url(payload)>` where the signature is
//! HMAC-SHA256 over the *encoded* payload string using the app secret.
//! Verification happens in constant time via `Mac::verify_slice`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PlatformError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Parse and verify a signed request, returning the decoded payload.
pub fn parse_signed_request(raw: &str, app_secret: &str) -> Result<serde_json::Value> {
    let (sig_b64, payload_b64) = raw.split_once('.').ok_or_else(|| {
        PlatformError::Protocol("signed_request is not of the form <sig>.<payload>".to_string())
    })?;

    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64.trim_end_matches('='))
        .map_err(|e| PlatformError::Protocol(format!("signed_request signature: {}", e)))?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature).map_err(|_| {
        PlatformError::Authentication("signed_request signature mismatch".to_string())
    })?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .map_err(|e| PlatformError::Protocol(format!("signed_request payload: {}", e)))?;

    serde_json::from_slice(&payload)
        .map_err(|e| PlatformError::Protocol(format!("signed_request payload JSON: {}", e)).into())
}

/// The `user_id` field of a verified payload.
pub fn user_id(payload: &serde_json::Value) -> Option<&str> {
    payload["user_id"].as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_signed_request(payload: &serde_json::Value, secret: &str) -> String {
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", sig_b64, payload_b64)
    }

    #[test]
    fn test_parse_valid_signed_request() {
        let payload = serde_json::json!({
            "algorithm": "HMAC-SHA256",
            "user_id": "10210",
            "issued_at": 1700000000u64,
        });
        let raw = make_signed_request(&payload, "app-secret");

        let parsed = parse_signed_request(&raw, "app-secret").unwrap();
        assert_eq!(user_id(&parsed), Some("10210"));
        assert_eq!(parsed["algorithm"], "HMAC-SHA256");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = serde_json::json!({"user_id": "10210"});
        let raw = make_signed_request(&payload, "right-secret");

        let result = parse_signed_request(&raw, "wrong-secret");
        assert!(matches!(
            result,
            Err(crate::error::CastError::Platform(
                PlatformError::Authentication(_)
            ))
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let payload = serde_json::json!({"user_id": "10210"});
        let raw = make_signed_request(&payload, "secret");

        let forged_payload = URL_SAFE_NO_PAD.encode(r#"{"user_id":"evil"}"#);
        let sig = raw.split('.').next().unwrap();
        let forged = format!("{}.{}", sig, forged_payload);

        assert!(parse_signed_request(&forged, "secret").is_err());
    }

    #[test]
    fn test_malformed_request_rejected() {
        assert!(parse_signed_request("no-dot-here", "secret").is_err());
        assert!(parse_signed_request("!!!.###", "secret").is_err());
    }
}
