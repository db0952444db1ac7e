//! Configuration - JSON で読み込む façade の設定
//!
//! ```json
//! {
//!   "connection_string": "memory://shop",
//!   "log_filter": "dbgate_core=debug",
//!   "zero_change_removal": "fail"
//! }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What a removal that committed zero records reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroChangePolicy {
    /// `StorageRemoveFailure`: the preceding lookup proved there was something to remove.
    #[default]
    Fail,
    /// Success with a count of `0` (stores with soft-delete semantics).
    Succeed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataAccessConfig {
    pub connection_string: Option<String>,
    pub log_filter: String,
    pub zero_change_removal: ZeroChangePolicy,
}

impl Default for DataAccessConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            log_filter: "info".to_string(),
            zero_change_removal: ZeroChangePolicy::Fail,
        }
    }
}

impl DataAccessConfig {
    pub const DEFAULT_CONNECTION: &'static str = "memory://default";

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Configured connection string, or `memory://default`.
    pub fn connection(&self) -> Result<ConnectionString, ConfigError> {
        ConnectionString::parse(
            self.connection_string
                .as_deref()
                .unwrap_or(Self::DEFAULT_CONNECTION),
        )
    }
}

/// `<scheme>://<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    scheme: String,
    name: String,
}

impl ConnectionString {
    pub const MEMORY_SCHEME: &'static str = "memory";

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidConnectionString(raw.to_string());
        let (scheme, name) = raw.trim().split_once("://").ok_or_else(invalid)?;
        let scheme_ok = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok || name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            name: name.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.name)
    }
}
