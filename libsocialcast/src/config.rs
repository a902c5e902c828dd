//! Configuration management for Socialcast
//!
//! Configuration is an immutable snapshot loaded once at startup. Platform
//! sections are optional; a missing section disables the corresponding OAuth
//! flow and publishing fallback for that platform.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub facebook: Option<FacebookConfig>,
    pub instagram: Option<InstagramConfig>,
    pub linkedin: Option<LinkedInConfig>,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for cast-serve, e.g. "127.0.0.1:8090".
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Externally visible base URL, used to build image URLs for outbound
    /// publishing (`<base_url>/files/live<path>`).
    pub base_url: String,
    /// Mount prefix for all served endpoints.
    #[serde(default = "default_mount")]
    pub mount: String,
    /// Static bearer token callers must present to use the proxy.
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval of the "publish due" task, in seconds.
    #[serde(default = "default_publish_interval")]
    pub publish_interval_secs: u64,
    /// Interval of the "refresh metrics" task, in seconds.
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
    /// Whether this instance is the fleet's processing node. Recurring tasks
    /// are registered only when true.
    #[serde(default = "default_true")]
    pub processing_node: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            publish_interval_secs: default_publish_interval(),
            metrics_interval_secs: default_metrics_interval(),
            processing_node: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub app_id: String,
    pub app_secret: Option<String>,
    pub redirect_uri: Option<String>,
    #[serde(default = "default_facebook_scopes")]
    pub scopes: String,
    #[serde(default = "default_facebook_api_version")]
    pub api_version: String,
    #[serde(default = "default_facebook_base_url")]
    pub base_url: String,
    /// Fallback page when no account is stored for a site.
    pub page_id: Option<String>,
    pub page_access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    pub app_id: String,
    pub app_secret: Option<String>,
    pub redirect_uri: Option<String>,
    #[serde(default = "default_instagram_scopes")]
    pub scopes: String,
    #[serde(default = "default_facebook_base_url")]
    pub base_url: String,
    pub account_id: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Option<String>,
    #[serde(default = "default_linkedin_scopes")]
    pub scopes: String,
    #[serde(default = "default_linkedin_api_version")]
    pub api_version: String,
    #[serde(default = "default_linkedin_base_url")]
    pub base_url: String,
    /// Fallback author when no person account is stored.
    pub organization_id: Option<String>,
    /// Fallback token used with the organization author.
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Default upstream when no provider hint is present.
    #[serde(default = "default_proxy_target")]
    pub target_base_url: String,
    /// Bearer token sent to the upstream.
    pub auth_token: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target_base_url: default_proxy_target(),
            auth_token: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_mount() -> String {
    "/modules".to_string()
}

fn default_publish_interval() -> u64 {
    300
}

fn default_metrics_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_facebook_scopes() -> String {
    "pages_show_list,pages_manage_posts,pages_read_engagement".to_string()
}

fn default_facebook_api_version() -> String {
    "v21.0".to_string()
}

fn default_facebook_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_instagram_scopes() -> String {
    "instagram_basic,instagram_content_publish,pages_show_list".to_string()
}

fn default_linkedin_scopes() -> String {
    "openid,profile,email,w_member_social,offline_access".to_string()
}

fn default_linkedin_api_version() -> String {
    "v2".to_string()
}

fn default_linkedin_base_url() -> String {
    "https://api.linkedin.com".to_string()
}

fn default_proxy_target() -> String {
    "https://graph.facebook.com".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SOCIALCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("socialcast").join("config.toml"))
}

/// Resolve the database path, honoring the SOCIALCAST_DB_PATH override.
pub fn resolve_db_path(configured: &str) -> String {
    let raw = std::env::var("SOCIALCAST_DB_PATH").unwrap_or_else(|_| configured.to_string());
    shellexpand::tilde(&raw).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[database]
path = "/tmp/socialcast-test.db"

[server]
base_url = "https://hub.example.com"
"#
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();

        assert_eq!(config.server.mount, "/modules");
        assert_eq!(config.scheduler.publish_interval_secs, 300);
        assert_eq!(config.scheduler.metrics_interval_secs, 3600);
        assert!(config.scheduler.processing_node);
        assert!(config.facebook.is_none());
        assert_eq!(config.proxy.target_base_url, "https://graph.facebook.com");
    }

    #[test]
    fn test_facebook_section_defaults() {
        let toml_str = format!(
            "{}\n[facebook]\napp_id = \"123\"\napp_secret = \"shh\"\n",
            minimal_toml()
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        let facebook = config.facebook.unwrap();

        assert_eq!(facebook.api_version, "v21.0");
        assert_eq!(facebook.base_url, "https://graph.facebook.com");
        assert_eq!(
            facebook.scopes,
            "pages_show_list,pages_manage_posts,pages_read_engagement"
        );
    }

    #[test]
    fn test_linkedin_section_defaults() {
        let toml_str = format!(
            "{}\n[linkedin]\nclient_id = \"CID\"\nclient_secret = \"CS\"\n",
            minimal_toml()
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        let linkedin = config.linkedin.unwrap();

        assert_eq!(linkedin.api_version, "v2");
        assert_eq!(linkedin.base_url, "https://api.linkedin.com");
        assert!(linkedin.scopes.contains("w_member_social"));
        assert!(linkedin.scopes.contains("offline_access"));
        assert!(linkedin.organization_id.is_none());
    }

    #[test]
    fn test_scheduler_overrides() {
        let toml_str = format!(
            "{}\n[scheduler]\npublish_interval_secs = 60\nprocessing_node = false\n",
            minimal_toml()
        );
        let config: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.scheduler.publish_interval_secs, 60);
        assert_eq!(config.scheduler.metrics_interval_secs, 3600);
        assert!(!config.scheduler.processing_node);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result: std::result::Result<Config, _> = toml::from_str("not valid = [");
        assert!(result.is_err());
    }
}
