//! Engine settings, loaded from YAML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::email::gmail::{OAuthClient, DEFAULT_API_BASE_URL, DEFAULT_TOKEN_URL};
use crate::email::imap::DEFAULT_PARSE_CONCURRENCY;
use crate::error::SettingsError;
use crate::secrets::{expand_home, SecretError, SecretSource};

/// Default content directory, relative to the working directory.
pub const DEFAULT_STORAGE_DIR: &str = "pdfs";

pub const DEFAULT_CLIENT_ID_ENV_VAR: &str = "GMAIL_CLIENT_ID";
pub const DEFAULT_CLIENT_SECRET_ENV_VAR: &str = "GMAIL_CLIENT_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub storage_dir: PathBuf,
    /// Falls back to [`db::default_database_path`] when unset.
    pub database_path: Option<PathBuf>,
    pub imap: ImapSettings,
    pub gmail: GmailSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            database_path: None,
            imap: ImapSettings::default(),
            gmail: GmailSettings::default(),
        }
    }
}

impl Settings {
    /// The configured database path with `~` expanded, or the default.
    pub fn database_path(&self) -> Result<PathBuf, SettingsError> {
        self.database_path
            .as_deref()
            .map(|p| expand_home(&p.to_string_lossy()))
            .or_else(db::default_database_path)
            .ok_or_else(|| SettingsError::Validation {
                message: "databasePath is not set and no home directory was found".to_string(),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImapSettings {
    pub connect_timeout_secs: u64,
    /// Accept self-signed certificates and mismatched hostnames.
    pub accept_invalid_certs: bool,
    pub parse_concurrency: usize,
}

impl Default for ImapSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            accept_invalid_certs: true,
            parse_concurrency: DEFAULT_PARSE_CONCURRENCY,
        }
    }
}

impl ImapSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GmailSettings {
    pub api_base_url: String,
    pub token_url: String,

    pub client_id: Option<String>,
    pub client_id_file: Option<String>,
    pub client_id_env_var: Option<String>,

    pub client_secret: Option<String>,
    pub client_secret_file: Option<String>,
    pub client_secret_env_var: Option<String>,
}

impl Default for GmailSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: None,
            client_id_file: None,
            client_id_env_var: Some(DEFAULT_CLIENT_ID_ENV_VAR.to_string()),
            client_secret: None,
            client_secret_file: None,
            client_secret_env_var: Some(DEFAULT_CLIENT_SECRET_ENV_VAR.to_string()),
        }
    }
}

impl GmailSettings {
    fn client_id_source(&self) -> SecretSource<'_> {
        SecretSource {
            value: self.client_id.as_deref(),
            file: self.client_id_file.as_deref(),
            env_var: self.client_id_env_var.as_deref(),
        }
    }

    fn client_secret_source(&self) -> SecretSource<'_> {
        SecretSource {
            value: self.client_secret.as_deref(),
            file: self.client_secret_file.as_deref(),
            env_var: self.client_secret_env_var.as_deref(),
        }
    }

    /// Resolves the OAuth client used for token refresh.
    ///
    /// Returns `Ok(None)` unless both the id and the secret resolve. An unset
    /// environment variable counts as not configured.
    pub fn oauth_client(&self) -> Result<Option<OAuthClient>, SecretError> {
        let client_id = resolve_optional(self.client_id_source())?;
        let client_secret = resolve_optional(self.client_secret_source())?;

        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Some(OAuthClient {
                client_id,
                client_secret,
            })),
            _ => {
                debug!("No OAuth client configured; expired Gmail tokens will not be refreshed");
                Ok(None)
            }
        }
    }
}

fn resolve_optional(
    source: SecretSource<'_>,
) -> Result<Option<secrecy::SecretString>, SecretError> {
    match source.resolve() {
        Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
        other => other,
    }
}

/// Loads settings from `path`. A missing file yields the defaults.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, SettingsError> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("Settings file {} not found, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| SettingsError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, SettingsError> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings = serde_yaml::from_str(content)?;
    validate_settings(&settings)?;
    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.storage_dir.as_os_str().is_empty() {
        return Err(SettingsError::Validation {
            message: "storageDir must not be empty".to_string(),
        });
    }

    if settings.imap.connect_timeout_secs == 0 {
        return Err(SettingsError::Validation {
            message: "imap.connectTimeoutSecs must be greater than 0".to_string(),
        });
    }

    if settings.imap.parse_concurrency == 0 {
        return Err(SettingsError::Validation {
            message: "imap.parseConcurrency must be greater than 0".to_string(),
        });
    }

    for (name, url) in [
        ("gmail.apiBaseUrl", &settings.gmail.api_base_url),
        ("gmail.tokenUrl", &settings.gmail.token_url),
    ] {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(SettingsError::Validation {
                message: format!("{} must be an http(s) URL, got '{}'", name, url),
            });
        }
    }

    Ok(())
}
