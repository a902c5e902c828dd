//! Credential store
//!
//! Semantic wrapper over the content store for per-site, per-platform
//! account records. Facebook accounts carry two tokens: the user token,
//! kept so the page list can be refreshed through `/me/accounts`, and the
//! per-page token used for publishing. Older records may predate the page
//! token; those fall back to the user token with a warning.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::FacebookConfig;
use crate::error::Result;
use crate::httpclient::{parse_json, HttpClient};
use crate::store::Store;
use crate::types::{redact_token, Account, TargetPlatform};

const FACEBOOK_TOKEN_LIFETIME_DAYS: i64 = 60;
const LINKEDIN_DEFAULT_EXPIRES_IN: i64 = 5_184_000; // 60 days

/// Facebook account view used by the publish and insights paths.
#[derive(Debug, Clone)]
pub struct FacebookAccount {
    pub page_id: String,
    pub page_name: String,
    pub page_token: String,
    pub user_token: String,
    pub token_expiry: i64,
}

/// LinkedIn account view keyed by the OIDC `sub`.
#[derive(Debug, Clone)]
pub struct LinkedInAccount {
    pub person_id: String,
    pub name: String,
    pub email: String,
    pub access_token: String,
    pub token_expiry: i64,
}

#[derive(Clone)]
pub struct AccountService {
    store: Store,
    http: HttpClient,
}

impl AccountService {
    pub fn new(store: Store, http: HttpClient) -> Self {
        Self { store, http }
    }

    /// Active Facebook accounts for a site, keyed by page ID.
    pub async fn facebook_accounts(
        &self,
        site_key: &str,
    ) -> Result<HashMap<String, FacebookAccount>> {
        let mut accounts = HashMap::new();

        for record in self
            .store
            .list_accounts(site_key, TargetPlatform::Facebook)
            .await?
        {
            let page_id = match &record.page_id {
                Some(id) => id.clone(),
                None => record.account_id.clone(),
            };

            // Legacy records lack a page token; publishing falls back to the
            // user token for those.
            let page_token = match &record.page_token {
                Some(token) => token.clone(),
                None => {
                    warn!(
                        "Facebook account {} has no page token, falling back to user token",
                        record.account_id
                    );
                    record.access_token.clone()
                }
            };

            accounts.insert(
                page_id.clone(),
                FacebookAccount {
                    page_id,
                    page_name: record.handle.clone(),
                    page_token,
                    user_token: record.access_token.clone(),
                    token_expiry: record.token_expiry,
                },
            );
        }

        Ok(accounts)
    }

    /// Active LinkedIn accounts for a site, keyed by person ID.
    pub async fn linkedin_accounts(
        &self,
        site_key: &str,
    ) -> Result<HashMap<String, LinkedInAccount>> {
        let mut accounts = HashMap::new();

        for record in self
            .store
            .list_accounts(site_key, TargetPlatform::LinkedIn)
            .await?
        {
            accounts.insert(
                record.account_id.clone(),
                LinkedInAccount {
                    person_id: record.account_id.clone(),
                    name: record.label.clone(),
                    email: record.email.clone().unwrap_or_default(),
                    access_token: record.access_token.clone(),
                    token_expiry: record.token_expiry,
                },
            );
        }

        Ok(accounts)
    }

    /// Publishing token for a Facebook page. With no page preference, the
    /// first active account's token is returned.
    pub async fn page_access_token(
        &self,
        site_key: &str,
        page_id: Option<&str>,
    ) -> Result<Option<String>> {
        let records = self
            .store
            .list_accounts(site_key, TargetPlatform::Facebook)
            .await?;

        let record = match page_id {
            Some(wanted) => records.into_iter().find(|r| {
                r.page_id.as_deref() == Some(wanted) || r.account_id == wanted
            }),
            None => records.into_iter().next(),
        };

        Ok(record.map(|r| match r.page_token {
            Some(token) => token,
            None => {
                warn!(
                    "Facebook account {} has no page token, using user token for publishing",
                    r.account_id
                );
                r.access_token
            }
        }))
    }

    /// First active account's access token for any platform, or the token of
    /// `preferred_id` when given.
    pub async fn primary_token(
        &self,
        site_key: &str,
        platform: TargetPlatform,
        preferred_id: Option<&str>,
    ) -> Result<Option<String>> {
        if platform == TargetPlatform::Facebook {
            return self.page_access_token(site_key, preferred_id).await;
        }

        let records = self.store.list_accounts(site_key, platform).await?;
        let record = match preferred_id {
            Some(wanted) => records.into_iter().find(|r| r.account_id == wanted),
            None => records.into_iter().next(),
        };

        Ok(record.map(|r| r.access_token))
    }

    /// Enumerate the pages the given user token can manage and persist one
    /// account per page that grants `CREATE_CONTENT` or `MANAGE`. Both the
    /// user token and the per-page token are stored. Returns the connected
    /// page names.
    pub async fn connect_facebook_account(
        &self,
        facebook: &FacebookConfig,
        user_token: &str,
        site_key: &str,
    ) -> Result<Vec<String>> {
        let url = format!(
            "{}/{}/me/accounts?access_token={}",
            facebook.base_url,
            facebook.api_version,
            urlencoding::encode(user_token)
        );

        info!(
            "Fetching Facebook pages for site {} with user token {}",
            site_key,
            redact_token(user_token)
        );

        let response = self.http.get(&url, &[]).await?;
        let json = parse_json(&response.body)?;

        let pages = json["data"].as_array().cloned().unwrap_or_default();
        let mut connected = Vec::new();
        let now = chrono::Utc::now().timestamp();
        let expiry = now + FACEBOOK_TOKEN_LIFETIME_DAYS * 24 * 3600;

        for page in pages {
            let page_id = match page["id"].as_str() {
                Some(id) => id.to_string(),
                None => continue,
            };
            let page_name = page["name"].as_str().unwrap_or("(unnamed page)").to_string();
            let page_token = match page["access_token"].as_str() {
                Some(token) => token.to_string(),
                None => {
                    warn!("Page {} returned no access token, skipping", page_id);
                    continue;
                }
            };

            if !page_grants_publishing(&page) {
                warn!(
                    "Page '{}' ({}) lacks CREATE_CONTENT and MANAGE tasks, skipping",
                    page_name, page_id
                );
                continue;
            }

            let account = Account {
                site_key: site_key.to_string(),
                platform: TargetPlatform::Facebook,
                account_id: page_id.clone(),
                label: page_name.clone(),
                handle: page_name.clone(),
                page_id: Some(page_id.clone()),
                access_token: user_token.to_string(),
                page_token: Some(page_token),
                email: None,
                token_expiry: expiry,
                is_active: true,
                created_at: now,
            };

            self.store.put_account(&account).await?;
            info!("Connected Facebook page '{}' ({})", page_name, page_id);
            connected.push(page_name);
        }

        Ok(connected)
    }

    /// Persist a LinkedIn account keyed by the OIDC `sub`. Repeating the
    /// exchange updates the existing record.
    pub async fn connect_linkedin_account(
        &self,
        site_key: &str,
        person_id: &str,
        name: &str,
        email: &str,
        access_token: &str,
        expires_in: Option<i64>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let expires_in = expires_in.unwrap_or(LINKEDIN_DEFAULT_EXPIRES_IN);

        let account = Account {
            site_key: site_key.to_string(),
            platform: TargetPlatform::LinkedIn,
            account_id: person_id.to_string(),
            label: name.to_string(),
            handle: name.to_string(),
            page_id: None,
            access_token: access_token.to_string(),
            page_token: None,
            email: if email.is_empty() {
                None
            } else {
                Some(email.to_string())
            },
            token_expiry: now + expires_in,
            is_active: true,
            created_at: now,
        };

        self.store.put_account(&account).await?;
        info!(
            "Stored LinkedIn account '{}' ({}) for site {}",
            name, person_id, site_key
        );

        Ok(())
    }

    /// Active accounts of one platform across all sites.
    pub async fn accounts_by_platform(&self, platform: TargetPlatform) -> Result<Vec<Account>> {
        self.store.list_accounts_by_platform(platform).await
    }

    /// Remove one account. Returns true when a record was removed.
    pub async fn disconnect(
        &self,
        site_key: &str,
        platform: TargetPlatform,
        account_id: &str,
    ) -> Result<bool> {
        let removed = self
            .store
            .remove_account(site_key, platform, account_id)
            .await?;

        if removed > 0 {
            info!(
                "Disconnected {} account {} for site {}",
                platform, account_id, site_key
            );
        } else {
            warn!(
                "No {} account {} found for site {}",
                platform, account_id, site_key
            );
        }

        Ok(removed > 0)
    }

    /// Remove every account of a platform for a site. Used by the OAuth
    /// uninstall callback, which identifies the user but not a single page.
    pub async fn disconnect_all(&self, site_key: &str, platform: TargetPlatform) -> Result<usize> {
        let records = self.store.list_accounts(site_key, platform).await?;
        let mut removed = 0;

        for record in records {
            removed += self
                .store
                .remove_account(site_key, platform, &record.account_id)
                .await? as usize;
        }

        Ok(removed)
    }
}

/// A page is usable for publishing when its `tasks` list the
/// `CREATE_CONTENT` or `MANAGE` capability.
fn page_grants_publishing(page: &serde_json::Value) -> bool {
    page["tasks"]
        .as_array()
        .map(|tasks| {
            tasks
                .iter()
                .filter_map(|t| t.as_str())
                .any(|t| t == "CREATE_CONTENT" || t == "MANAGE")
        })
        .unwrap_or(false)
}
