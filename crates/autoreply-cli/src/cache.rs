//! Token cache persistence: a local file or an Azure Key Vault secret.
//!
//! The cache is a small JSON document. An unreadable or corrupt cache is never
//! fatal; it is replaced by an empty one and a fresh sign-in follows.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const KEY_VAULT_API_VERSION: &str = "7.4";
const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const KEY_VAULT_TOKEN_ENV: &str = "AZURE_KEYVAULT_TOKEN";

/// Access tokens closer than this to expiry are treated as expired.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key vault request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("key vault returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to serialize token cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Tokens obtained from the Microsoft identity platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCache {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenCache {
    /// Parse a serialized cache, falling back to an empty cache on any error.
    pub fn deserialize_or_empty(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str(raw) {
            Ok(cache) => cache,
            Err(error) => {
                tracing::warn!(%error, "failed to deserialize token cache, creating new token cache");
                Self::default()
            }
        }
    }

    pub fn serialize(&self) -> Result<String, CacheError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The cached access token, if it stays valid for at least a minute.
    pub fn valid_access_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let expires_at = self.expires_at?;
        if expires_at - Duration::seconds(EXPIRY_MARGIN_SECONDS) <= now {
            return None;
        }
        self.access_token.as_deref()
    }
}

/// Where the token cache lives, selected by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheSettings {
    Local(LocalCache),
    KeyVault(KeyVaultCache),
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings::Local(LocalCache::default())
    }
}

impl CacheSettings {
    pub fn load(&self, http: &Client) -> Result<TokenCache, CacheError> {
        match self {
            CacheSettings::Local(local) => local.load(),
            CacheSettings::KeyVault(vault) => vault.load(http),
        }
    }

    pub fn store(&self, http: &Client, cache: &TokenCache) -> Result<(), CacheError> {
        match self {
            CacheSettings::Local(local) => local.store(cache),
            CacheSettings::KeyVault(vault) => vault.store(http, cache),
        }
    }
}

/// Token cache kept in a local JSON file readable only by its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalCache {
    #[serde(default = "default_token_cache_file")]
    pub token_cache_file: PathBuf,
}

impl Default for LocalCache {
    fn default() -> Self {
        Self {
            token_cache_file: default_token_cache_file(),
        }
    }
}

fn default_token_cache_file() -> PathBuf {
    PathBuf::from("token_cache.json")
}

impl LocalCache {
    pub fn load(&self) -> Result<TokenCache, CacheError> {
        match fs::read_to_string(&self.token_cache_file) {
            Ok(raw) => Ok(TokenCache::deserialize_or_empty(&raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.token_cache_file.display(), "no token cache yet");
                Ok(TokenCache::default())
            }
            Err(source) => Err(CacheError::Io {
                path: self.token_cache_file.clone(),
                source,
            }),
        }
    }

    pub fn store(&self, cache: &TokenCache) -> Result<(), CacheError> {
        let path = &self.token_cache_file;
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, cache.serialize()?).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
                tracing::warn!("failed to chmod 0600 {}: {e}", path.display());
            }
        }
        Ok(())
    }
}

/// Token cache kept as a secret in Azure Key Vault.
///
/// Key Vault itself is reached with a bearer token from `AZURE_KEYVAULT_TOKEN`
/// or, when unset, from the managed identity endpoint of the Azure host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyVaultCache {
    pub key_vault_url: String,
    #[serde(default = "default_token_cache_secret_name")]
    pub token_cache_secret_name: String,
}

fn default_token_cache_secret_name() -> String {
    "token-cache".to_string()
}

#[derive(Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct ManagedIdentityToken {
    access_token: String,
}

impl KeyVaultCache {
    fn secret_url(&self) -> String {
        format!(
            "{}/secrets/{}?api-version={}",
            self.key_vault_url.trim_end_matches('/'),
            self.token_cache_secret_name,
            KEY_VAULT_API_VERSION
        )
    }

    pub fn load(&self, http: &Client) -> Result<TokenCache, CacheError> {
        let response = http
            .get(self.secret_url())
            .bearer_auth(vault_token(http)?)
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!(secret = %self.token_cache_secret_name, "token cache secret does not exist yet");
            return Ok(TokenCache::default());
        }
        let bundle: SecretBundle = check(response)?.json()?;
        Ok(TokenCache::deserialize_or_empty(&bundle.value))
    }

    pub fn store(&self, http: &Client, cache: &TokenCache) -> Result<(), CacheError> {
        let response = http
            .put(self.secret_url())
            .bearer_auth(vault_token(http)?)
            .json(&serde_json::json!({ "value": cache.serialize()? }))
            .send()?;
        check(response)?;
        Ok(())
    }
}

fn vault_token(http: &Client) -> Result<String, CacheError> {
    if let Ok(token) = std::env::var(KEY_VAULT_TOKEN_ENV) {
        if !token.is_empty() {
            return Ok(token);
        }
    }

    let response = http
        .get(IMDS_TOKEN_URL)
        .header("Metadata", "true")
        .query(&[("api-version", "2018-02-01"), ("resource", KEY_VAULT_RESOURCE)])
        .send()?;
    let token: ManagedIdentityToken = check(response)?.json()?;
    Ok(token.access_token)
}

fn check(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, CacheError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(CacheError::Status { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 30, 6, 0, 0).unwrap()
    }

    #[test]
    fn corrupt_cache_falls_back_to_empty() {
        assert_eq!(TokenCache::deserialize_or_empty("{not json"), TokenCache::default());
        assert_eq!(TokenCache::deserialize_or_empty(""), TokenCache::default());
    }

    #[test]
    fn access_token_near_expiry_is_not_reused() {
        let cache = TokenCache {
            access_token: Some("at".into()),
            refresh_token: Some("rt".into()),
            expires_at: Some(now() + Duration::seconds(30)),
        };
        assert_eq!(cache.valid_access_token(now()), None);

        let fresh = TokenCache {
            expires_at: Some(now() + Duration::minutes(30)),
            ..cache
        };
        assert_eq!(fresh.valid_access_token(now()), Some("at"));
    }

    #[test]
    fn local_cache_roundtrips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalCache {
            token_cache_file: dir.path().join("nested").join("token_cache.json"),
        };
        let cache = TokenCache {
            access_token: Some("at".into()),
            refresh_token: Some("rt".into()),
            expires_at: Some(now()),
        };

        local.store(&cache).unwrap();

        assert_eq!(local.load().unwrap(), cache);
    }

    #[test]
    fn missing_local_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalCache {
            token_cache_file: dir.path().join("absent.json"),
        };
        assert_eq!(local.load().unwrap(), TokenCache::default());
    }

    #[cfg(unix)]
    #[test]
    fn local_cache_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let local = LocalCache {
            token_cache_file: dir.path().join("token_cache.json"),
        };
        local.store(&TokenCache::default()).unwrap();

        let mode = fs::metadata(&local.token_cache_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn key_vault_secret_url_is_normalized() {
        let vault = KeyVaultCache {
            key_vault_url: "https://ooo.vault.azure.net/".into(),
            token_cache_secret_name: default_token_cache_secret_name(),
        };
        assert_eq!(
            vault.secret_url(),
            "https://ooo.vault.azure.net/secrets/token-cache?api-version=7.4"
        );
    }
}
