use std::path::Path;

use serde::{Deserialize, Serialize};
use vcg_cache::{CacheConfig, RefreshMode};
use vcg_query::QueryPolicy;

use crate::error::{SessionError, SessionResult};

/// Per-session preferences.
///
/// Every field has a default, so a TOML file only names what it changes:
///
/// ```toml
/// auto_checkout_on_edit = true
/// initial_refresh = "foreground"
///
/// [backend]
/// server = "depot.example.com:1666"
/// user = "ada"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Check out a read-only controlled file on query-edit without asking.
    pub auto_checkout_on_edit: bool,
    /// Check out a read-only controlled file on query-save without asking.
    pub auto_checkout_on_save: bool,
    /// Open files for add when the host reports them added.
    pub auto_add: bool,
    /// Open files for delete when the host reports them removed.
    pub auto_delete: bool,
    /// Move files in the depot when the host reports them renamed.
    pub auto_rename: bool,
    pub refresh_unknown_on_lookup: bool,
    pub notification_capacity: usize,
    pub max_coalesced_requests: usize,
    pub initial_refresh: RefreshMode,
    pub backend: BackendSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            auto_checkout_on_edit: false,
            auto_checkout_on_save: false,
            auto_add: false,
            auto_delete: false,
            auto_rename: false,
            refresh_unknown_on_lookup: cache.refresh_unknown_on_lookup,
            notification_capacity: cache.notification_capacity,
            max_coalesced_requests: cache.max_coalesced_requests,
            initial_refresh: RefreshMode::Background,
            backend: BackendSettings::default(),
        }
    }
}

/// Where the backend lives. Only used for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSettings {
    pub server: Option<String>,
    pub user: Option<String>,
    pub client: Option<String>,
}

impl SessionConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> SessionResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SessionError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SessionResult<String> {
        toml::to_string_pretty(self).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.notification_capacity == 0 {
            return Err(SessionError::Config(
                "notification_capacity must be greater than zero".into(),
            ));
        }
        if self.max_coalesced_requests == 0 {
            return Err(SessionError::Config(
                "max_coalesced_requests must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            refresh_unknown_on_lookup: self.refresh_unknown_on_lookup,
            notification_capacity: self.notification_capacity,
            max_coalesced_requests: self.max_coalesced_requests,
        }
    }

    pub fn query_policy(&self) -> QueryPolicy {
        QueryPolicy {
            auto_checkout_on_edit: self.auto_checkout_on_edit,
            auto_checkout_on_save: self.auto_checkout_on_save,
        }
    }
}
