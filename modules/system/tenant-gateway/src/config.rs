//! Tenancy configuration.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment prefix; `TENANCY__HEADER_NAME=x-tenant` overrides `header_name`.
pub const ENV_PREFIX: &str = "TENANCY__";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load tenancy config: {0}")]
    Load(#[source] Box<figment::Error>),

    #[error("invalid tenant header name `{0}`")]
    InvalidHeaderName(String),

    #[error("tenant query parameter name must not be empty")]
    EmptyQueryParam,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenancyConfig {
    /// Master switch for query rewriting. Single-tenant deployments turn it off.
    pub enabled: bool,

    /// Request header carrying the tenant id.
    pub header_name: String,

    /// Query parameter consulted when the header is absent.
    pub query_param: String,

    /// Resolve the tenant from the request host. Not implemented; enabling it
    /// only logs and falls through to the super tenant.
    pub resolve_subdomain: bool,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: "tenant-id".to_owned(),
            query_param: "tenantId".to_owned(),
            resolve_subdomain: false,
        }
    }
}

impl TenancyConfig {
    /// Defaults, then `source`, then `TENANCY__*` env vars.
    #[must_use]
    pub fn figment(source: Figment) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(source)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load from an optional standalone YAML file.
    ///
    /// # Errors
    /// Malformed sources, unknown keys, or names that cannot be used on the wire.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let source = file.map_or_else(Figment::new, |f| Figment::from(Yaml::file(f)));
        Self::from_figment(source)
    }

    /// Load from a section of a larger document, e.g. `app.focus("tenancy")`.
    ///
    /// # Errors
    /// Same as [`TenancyConfig::load`].
    pub fn from_figment(source: Figment) -> Result<Self, ConfigError> {
        let cfg: Self = Self::figment(source)
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// See [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if http::HeaderName::from_bytes(self.header_name.as_bytes()).is_err() {
            return Err(ConfigError::InvalidHeaderName(self.header_name.clone()));
        }
        if self.query_param.trim().is_empty() {
            return Err(ConfigError::EmptyQueryParam);
        }
        Ok(())
    }
}
