//! Secret resolution for settings values.
//!
//! A secret may be given inline, in a file (for mounted secrets), or in an
//! environment variable. The first non-empty source wins in that order.

use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// The three places one secret can come from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub value: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn is_configured(&self) -> bool {
        [self.value, self.file, self.env_var]
            .iter()
            .any(|s| s.is_some_and(|s| !s.is_empty()))
    }

    /// Returns `Ok(None)` when no source is configured. A configured file or
    /// variable that cannot be read is an error.
    pub fn resolve(&self) -> Result<Option<SecretString>, SecretError> {
        if let Some(value) = self.value.filter(|v| !v.is_empty()) {
            return Ok(Some(SecretString::from(value.to_string())));
        }

        if let Some(path) = self.file.filter(|p| !p.is_empty()) {
            let path = expand_home(path);
            let content = std::fs::read_to_string(&path)
                .map_err(|source| SecretError::FileReadError { path, source })?;
            return Ok(Some(SecretString::from(content.trim().to_string())));
        }

        if let Some(name) = self.env_var.filter(|n| !n.is_empty()) {
            return match std::env::var(name) {
                Ok(value) => Ok(Some(SecretString::from(value.trim().to_string()))),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Ok(None)
    }
}

/// Expands a leading `~` to the home directory. `~user` is not supported.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return match path.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => home,
            };
        }
    }
    PathBuf::from(path)
}
