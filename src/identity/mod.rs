//! Local identity: who this installation is registered as, and where its
//! API key lives.
//!
//! The identity file holds `username`, `user_id` and `registered_at`. The
//! API key goes to the OS keychain when one is usable, and into the same
//! file (mode 0600) otherwise.

mod store;
mod vault;

pub use store::{CredentialStore, SecretLocation, StoreError};
pub use vault::{
    Availability, FileOnlyVault, KEYCHAIN_SERVICE, KeyringVault, SecretVault, VaultAvailability,
    VaultError,
};

#[cfg(test)]
pub use vault::{MemoryVault, MockSecretVault};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The registered account this gateway acts for.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub user_id: String,
    /// Bearer credential for the backend. Never logged.
    #[serde(alias = "api_key")]
    pub secret: String,
    pub registered_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(username: String, user_id: String, secret: String) -> Self {
        Self {
            username,
            user_id,
            secret,
            registered_at: Utc::now(),
        }
    }

    /// Same account with a replacement key.
    pub fn with_secret(&self, secret: String) -> Self {
        Self {
            secret,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("secret", &"[REDACTED]")
            .field("registered_at", &self.registered_at)
            .finish()
    }
}
