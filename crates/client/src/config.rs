//! Client configuration from environment variables, plus endpoint address
//! resolution for the API and the push channel.

use std::time::Duration;

use inventory_shared::{http_scheme_for, ws_scheme_for, DEFAULT_API_BASE, DEFAULT_WS_PATH, TOKEN_QUERY_PARAM};
use thiserror::Error;
use url::Url;

use crate::auth_session::Credential;
use crate::ws::ReconnectConfig;

/// Endpoint configuration problems. Never fatal for the channel: the manager
/// logs them and stays disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("endpoint address is empty")]
    Empty,
    #[error("'{base}' is a path but no page origin is configured")]
    MissingOrigin { base: String },
    #[error("'{base}' is neither an absolute URL nor an absolute path on the page origin")]
    NotAbsolute { base: String },
    #[error("invalid URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme in '{value}'")]
    UnsupportedScheme { value: String },
    #[error("'{value}' has no host")]
    MissingHost { value: String },
}

/// Console client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the hosting page; absolute paths resolve against it.
    pub origin: Option<Url>,
    /// REST API base, an absolute URL or an absolute path.
    pub api_base: String,
    /// Push channel base, an absolute URL or an absolute path.
    pub channel_base: String,
    pub reconnect: ReconnectConfig,
    pub connect_timeout: Duration,
    /// How long a credential change waits for the old session's close handshake.
    pub close_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: None,
            api_base: DEFAULT_API_BASE.to_string(),
            channel_base: DEFAULT_WS_PATH.to_string(),
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(10),
            close_grace: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Read configuration from the environment.
    ///
    /// Environment variables:
    /// - `INVENTORY_ORIGIN`: page origin, e.g. "https://console.example.com"
    /// - `INVENTORY_API_BASE_URL`: API base (default: "/api")
    /// - `INVENTORY_WS_URL`: channel base (default: "/api/ws")
    /// - `INVENTORY_RECONNECT_ATTEMPTS`: retry bound, 0 = unlimited (default: 10)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(origin) = std::env::var("INVENTORY_ORIGIN") {
            match Url::parse(origin.trim()) {
                Ok(url) => config.origin = Some(url),
                Err(e) => tracing::warn!(origin = %origin, error = %e, "ignoring invalid INVENTORY_ORIGIN"),
            }
        }
        if let Ok(base) = std::env::var("INVENTORY_API_BASE_URL") {
            config.api_base = base;
        }
        if let Ok(base) = std::env::var("INVENTORY_WS_URL") {
            config.channel_base = base;
        }
        if let Ok(raw) = std::env::var("INVENTORY_RECONNECT_ATTEMPTS") {
            match raw.trim().parse() {
                Ok(attempts) => config.reconnect.max_attempts = attempts,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid INVENTORY_RECONNECT_ATTEMPTS"),
            }
        }

        config
    }

    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_channel_base(mut self, base: impl Into<String>) -> Self {
        self.channel_base = base.into();
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolved push channel address, without credentials.
    pub fn channel_url(&self) -> Result<Url, ConfigError> {
        resolve_endpoint(&self.channel_base, self.origin.as_ref(), ws_scheme_for)
    }

    /// Resolved REST API base address.
    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        resolve_endpoint(&self.api_base, self.origin.as_ref(), http_scheme_for)
    }
}

/// Resolve a configured base that is either a full locator or an absolute
/// path against the page origin, then normalize its scheme with `scheme_for`.
pub fn resolve_endpoint(
    base: &str,
    origin: Option<&Url>,
    scheme_for: fn(&str) -> Option<&'static str>,
) -> Result<Url, ConfigError> {
    let base = base.trim();
    if base.is_empty() {
        return Err(ConfigError::Empty);
    }

    // Protocol-relative bases are not paths on the origin.
    if base.starts_with("//") {
        return Err(ConfigError::NotAbsolute {
            base: base.to_string(),
        });
    }

    let mut url = if base.starts_with('/') {
        let origin = origin.ok_or_else(|| ConfigError::MissingOrigin {
            base: base.to_string(),
        })?;
        origin.join(base).map_err(|source| ConfigError::InvalidUrl {
            value: base.to_string(),
            source,
        })?
    } else {
        match Url::parse(base) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Err(ConfigError::NotAbsolute {
                    base: base.to_string(),
                })
            }
            Err(source) => {
                return Err(ConfigError::InvalidUrl {
                    value: base.to_string(),
                    source,
                })
            }
        }
    };

    let scheme = scheme_for(url.scheme()).ok_or_else(|| ConfigError::UnsupportedScheme {
        value: base.to_string(),
    })?;
    if url.set_scheme(scheme).is_err() {
        return Err(ConfigError::UnsupportedScheme {
            value: base.to_string(),
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::MissingHost {
            value: base.to_string(),
        });
    }

    Ok(url)
}

/// Attach the credential as the `token` query parameter, replacing any
/// `token` already present.
pub fn with_token(mut url: Url, credential: &Credential) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != TOKEN_QUERY_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(TOKEN_QUERY_PARAM, credential.expose());
    url
}

/// Render a URL for logs with the query string (and so the token) removed.
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
