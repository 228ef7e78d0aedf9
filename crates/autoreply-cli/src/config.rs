//! Layered configuration loading using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`AUTOREPLY_*` prefix, `__` as separator)
//! 2. The TOML file given with `--config`, or `./autoreply.toml` if present
//! 3. Built-in defaults
//!
//! Figment maps `AUTOREPLY_APP__TENANT_ID` -> `app.tenant_id`,
//! `AUTOREPLY_ABSENCE__KEYWORD` -> `absence.keyword`, and so on.

use std::path::{Path, PathBuf};

use autoreply_core::{RunOptions, TemplateSource};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheSettings;

const DEFAULT_CONFIG_FILE: &str = "autoreply.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Configuration file not found: {0}")]
    MissingFile(PathBuf),

    /// A required field is empty.
    #[error("Configuration value '{field}' is not set")]
    NotConfigured { field: String },

    #[error("Unsupported auth flow '{0}': only 'device_code' is available")]
    UnsupportedAuthFlow(AuthFlow),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Figment(Box::new(e))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub app: AppRegistration,
    #[serde(default)]
    pub absence: AbsenceSettings,
    #[serde(default)]
    pub dry_run: bool,
}

/// Sign-in flow used when no cached or refreshable token exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlow {
    /// Browser redirect sign-in. Accepted in config files, rejected at validation.
    Interactive,
    #[default]
    DeviceCode,
}

impl std::fmt::Display for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFlow::Interactive => write!(f, "interactive"),
            AuthFlow::DeviceCode => write!(f, "device_code"),
        }
    }
}

/// Azure AD application used to sign in to Microsoft Graph.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppRegistration {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    #[serde(default)]
    pub auth_flow: AuthFlow,
}

impl Default for AppRegistration {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            scopes: default_scopes(),
            base_url: default_base_url(),
            authority_host: default_authority_host(),
            auth_flow: AuthFlow::default(),
        }
    }
}

impl AppRegistration {
    /// Ensure the fields without defaults are present and the flow is supported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("app.tenant_id", &self.tenant_id), ("app.client_id", &self.client_id)] {
            if value.trim().is_empty() {
                return Err(ConfigError::NotConfigured {
                    field: field.to_string(),
                });
            }
        }
        if self.auth_flow != AuthFlow::DeviceCode {
            return Err(ConfigError::UnsupportedAuthFlow(self.auth_flow));
        }
        Ok(())
    }
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://graph.microsoft.com/Calendars.ReadWrite".to_string(),
        "https://graph.microsoft.com/MailboxSettings.ReadWrite".to_string(),
        "offline_access".to_string(),
    ]
}

fn default_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

/// How absences are detected and how replies are scheduled.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AbsenceSettings {
    #[serde(default = "default_future_period_days")]
    pub future_period_days: i64,
    #[serde(default = "default_keyword")]
    pub keyword: String,
    #[serde(default = "default_max_delta_hours")]
    pub max_delta_hours: i64,
    #[serde(default = "default_max_chain_queries")]
    pub max_chain_queries: usize,
    #[serde(default = "default_internal_template")]
    pub internal_reply_template: TemplateSource,
    #[serde(default = "default_external_template")]
    pub external_reply_template: TemplateSource,
}

impl Default for AbsenceSettings {
    fn default() -> Self {
        Self {
            future_period_days: default_future_period_days(),
            keyword: default_keyword(),
            max_delta_hours: default_max_delta_hours(),
            max_chain_queries: default_max_chain_queries(),
            internal_reply_template: default_internal_template(),
            external_reply_template: default_external_template(),
        }
    }
}

impl AbsenceSettings {
    pub fn run_options(&self, dry_run: bool) -> RunOptions {
        RunOptions {
            subject: self.keyword.clone(),
            future_period_days: self.future_period_days,
            max_delta_hours: self.max_delta_hours,
            max_chain_queries: self.max_chain_queries,
            dry_run,
        }
    }
}

fn default_future_period_days() -> i64 {
    3
}

fn default_keyword() -> String {
    "Urlaub".to_string()
}

fn default_max_delta_hours() -> i64 {
    12
}

fn default_max_chain_queries() -> usize {
    100
}

fn default_internal_template() -> TemplateSource {
    TemplateSource::local("internal_reply_template.html.in")
}

fn default_external_template() -> TemplateSource {
    TemplateSource::local("external_reply_template.html.in")
}

impl Settings {
    /// Load settings from defaults, the TOML file and the environment.
    ///
    /// An explicit `config_path` must exist; the implicit `./autoreply.toml` is
    /// optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(config_path)?
            .extract()
            .map_err(ConfigError::from)
    }

    /// Build the figment provider chain.
    pub fn figment(config_path: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    figment = figment.merge(Toml::file(local));
                }
            }
        }

        Ok(figment.merge(Env::prefixed("AUTOREPLY_").split("__")))
    }
}
