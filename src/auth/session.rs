//! Credentials, session state, and service location types

use std::fmt;

use url::Url;

use crate::error::{CloudDbError, Result};

/// Deployment regions for Cloud Databases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Dallas/Ft. Worth datacenter
    Dfw,
    /// Chicago datacenter
    Ord,
    /// London datacenter
    Lon,
}

impl Region {
    /// Region name as it appears in the management URL
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dfw => "dfw",
            Self::Ord => "ord",
            Self::Lon => "lon",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static credentials for a connection. Immutable for the connection's
/// lifetime.
#[derive(Clone)]
pub struct Credentials {
    /// Rackspace Cloud username
    pub username: String,
    /// Rackspace Cloud API key
    pub api_key: String,
    /// Region in which to manage database instances
    pub region: Region,
    /// Authentication endpoint URL
    pub auth_url: String,
    /// Override for the management-endpoint base URL. When set, the
    /// account id is appended to this instead of the canonical
    /// region-derived endpoint.
    pub service_url: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("region", &self.region)
            .field("auth_url", &self.auth_url)
            .field("service_url", &self.service_url)
            .finish()
    }
}

/// Resolved host/path/port/scheme of the account-specific management API.
///
/// A single canonical value object shared by every resource operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLocation {
    /// Hostname of the management API
    pub host: String,
    /// Account-scoped base path, first segment forced to `v1.0`
    pub path: String,
    /// Port number
    pub port: u16,
    /// URL scheme (`https` in production)
    pub scheme: String,
}

impl ServiceLocation {
    /// Parse a management URL into its location parts, normalizing the
    /// path into the `v1.0` namespace.
    pub(crate) fn from_url(raw: &str) -> Result<Self> {
        let parsed = Url::parse(raw)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| CloudDbError::authentication("management URL has no host"))?
            .to_string();
        let port = parsed.port_or_known_default().unwrap_or(443);
        let scheme = parsed.scheme().to_string();
        let path = force_v1_namespace(parsed.path());
        Ok(Self {
            host,
            path,
            port,
            scheme,
        })
    }

    /// Base URL string for this location, without a path
    #[must_use]
    pub fn base(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Authenticated state for one connection: the bearer token and the
/// resolved service location. Always fully populated; a connection that
/// is not authenticated holds no `Session` at all.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token returned by the auth endpoint
    pub token: String,
    /// Account-specific service location
    pub location: ServiceLocation,
}

/// Replace the first `/`-delimited path segment with `v1.0`, forcing the
/// URL into the `v1.0` namespace regardless of what version segment
/// appears first. Paths without a second segment are left untouched.
fn force_v1_namespace(path: &str) -> String {
    let trimmed = path.trim_end();
    if !trimmed.starts_with('/') {
        return trimmed.to_string();
    }
    match trimmed[1..].find('/') {
        Some(end) => format!("/v1.0{}", &trimmed[end + 1..]),
        None => trimmed.to_string(),
    }
}
