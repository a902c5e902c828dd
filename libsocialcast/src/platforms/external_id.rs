//! External-ID extraction from provider responses
//!
//! Facebook returns composite IDs of the form `<pageId>_<postId>` from both
//! `/feed` (`id`) and `/photos` (`post_id`). Only the post-local part is
//! stored. IDs without an underscore pass through unchanged, which also
//! covers LinkedIn URNs and Instagram container IDs.

use serde_json::Value;

/// Keep only the portion after the first underscore, if any.
pub fn strip_page_prefix(raw: &str) -> &str {
    match raw.find('_') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    }
}

/// Extract the external ID from a provider response body, preferring `id`
/// and falling back to `post_id`.
pub fn extract_post_id(response: &Value) -> Option<String> {
    response["id"]
        .as_str()
        .or_else(|| response["post_id"].as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_page_prefix_composite() {
        assert_eq!(strip_page_prefix("111_222"), "222");
        assert_eq!(strip_page_prefix("101281515074354_1216046853914613"), "1216046853914613");
    }

    #[test]
    fn test_strip_page_prefix_keeps_later_underscores() {
        assert_eq!(strip_page_prefix("a_b_c"), "b_c");
    }

    #[test]
    fn test_strip_page_prefix_plain_id() {
        assert_eq!(strip_page_prefix("1216046853914613"), "1216046853914613");
    }

    #[test]
    fn test_strip_page_prefix_urn_verbatim() {
        assert_eq!(strip_page_prefix("urn:li:share:123"), "urn:li:share:123");
    }

    #[test]
    fn test_extract_post_id_prefers_id() {
        let response = json!({"id": "111_222", "post_id": "111_333"});
        assert_eq!(extract_post_id(&response), Some("111_222".to_string()));
    }

    #[test]
    fn test_extract_post_id_falls_back_to_post_id() {
        let response = json!({"post_id": "111_333"});
        assert_eq!(extract_post_id(&response), Some("111_333".to_string()));
    }

    #[test]
    fn test_extract_post_id_missing() {
        let response = json!({"error": {"message": "boom"}});
        assert_eq!(extract_post_id(&response), None);
    }
}
