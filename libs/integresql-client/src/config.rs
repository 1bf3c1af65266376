//! Client configuration.
//!
//! The base URL and API version may be given explicitly or read from the
//! environment.

use std::env;

/// Env var holding the service base URL.
pub const ENV_BASE_URL: &str = "INTEGRESQL_CLIENT_BASE_URL";
/// Env var holding the API version path segment.
pub const ENV_API_VERSION: &str = "INTEGRESQL_CLIENT_API_VERSION";
/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "http://integresql:5000/api";
/// Default API version.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Where to find the IntegreSQL API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_API_VERSION)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: api_version.into(),
        }
    }

    /// Read [`ENV_BASE_URL`] and [`ENV_API_VERSION`], using the defaults for
    /// unset or empty variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_owned())
        };
        Self {
            base_url: var(ENV_BASE_URL, DEFAULT_BASE_URL),
            api_version: var(ENV_API_VERSION, DEFAULT_API_VERSION),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// `{base_url}/{api_version}` with stray slashes removed.
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}
