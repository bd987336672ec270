//! Authentication session: the credential source the rest of the client
//! observes.

use std::fmt;

use tokio::sync::watch;

use crate::api_client::ApiClient;
use crate::config::{ClientConfig, ConfigError};

/// Opaque bearer token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for placing on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Holds the current credential and publishes every change to subscribers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    credential: watch::Sender<Option<Credential>>,
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthContext {
    pub fn new() -> Self {
        let (credential, _) = watch::channel(None);
        Self { credential }
    }

    /// Bind a token. Re-sending the current value notifies nobody.
    pub fn login(&self, token: impl Into<String>) {
        let next = Credential::new(token);
        self.credential.send_if_modified(|current| {
            if current.as_ref() == Some(&next) {
                return false;
            }
            *current = Some(next);
            true
        });
    }

    /// Drop the credential.
    pub fn logout(&self) {
        self.credential.send_if_modified(|current| current.take().is_some());
    }

    pub fn credential(&self) -> Option<Credential> {
        self.credential.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.borrow().is_some()
    }

    /// Observe credential changes. This is what the event channel manager is
    /// built from.
    pub fn watch(&self) -> watch::Receiver<Option<Credential>> {
        self.credential.subscribe()
    }

    /// Create an API client carrying the current credential.
    pub fn client(&self, config: &ClientConfig) -> Result<ApiClient, ConfigError> {
        Ok(ApiClient::new(config.api_base_url()?).with_credential(self.credential()))
    }
}
