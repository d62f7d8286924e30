use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved tenant id of the platform operator.
///
/// Rows owned by this tenant, and any call chain running as this tenant,
/// are exempt from tenant filtering.
pub const SUPER_TENANT_ID: &str = "000000";

/// Longest tenant id accepted from the outside world.
pub const MAX_TENANT_ID_LEN: usize = 64;

/// Reasons a raw string is not a usable tenant id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenantIdError {
    #[error("tenant id is empty")]
    Empty,

    #[error("tenant id exceeds {MAX_TENANT_ID_LEN} characters")]
    TooLong,

    #[error("tenant id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Opaque tenant identifier as stored in the `tenantId` column.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wrap an already trusted value without validation.
    ///
    /// Use [`TenantId::parse`] for anything arriving from a request.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The platform operator tenant ([`SUPER_TENANT_ID`]).
    #[must_use]
    pub fn super_tenant() -> Self {
        Self(SUPER_TENANT_ID.to_owned())
    }

    /// Validate an untrusted value (header, query string, job argument).
    ///
    /// Surrounding whitespace is trimmed. Only ASCII alphanumerics, `-` and
    /// `_` are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`TenantIdError`] when the trimmed value is empty, too long or
    /// contains a character outside the accepted set.
    pub fn parse(raw: &str) -> Result<Self, TenantIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TenantIdError::Empty);
        }
        if trimmed.len() > MAX_TENANT_ID_LEN {
            return Err(TenantIdError::TooLong);
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(TenantIdError::InvalidChar(bad));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the platform operator tenant.
    #[inline]
    #[must_use]
    pub fn is_super(&self) -> bool {
        self.0 == SUPER_TENANT_ID
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
