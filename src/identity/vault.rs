//! OS secret store abstraction.
//!
//! Calls are blocking (they may talk to a keychain daemon), so the store
//! runs them on the blocking pool.

use keyring::credential::CredentialPersistence;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;
use tracing::debug;

/// Keychain service name all entries are filed under.
pub const KEYCHAIN_SERVICE: &str = "tradegate";

/// Account used only to check whether the keychain answers at all.
const PROBE_ACCOUNT: &str = "__tradegate_probe__";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
    #[error("secret store error: {0}")]
    Backend(String),
}

#[cfg_attr(test, mockall::automock)]
pub trait SecretVault: Send + Sync {
    /// Whether the store can be used in this session and keeps secrets
    /// across restarts.
    fn probe(&self) -> bool;
    fn get(&self, account: &str) -> Result<Option<String>, VaultError>;
    fn set(&self, account: &str, secret: &str) -> Result<(), VaultError>;
    /// Deleting a missing entry succeeds.
    fn delete(&self, account: &str) -> Result<(), VaultError>;
}

/// Vault backed by the platform keychain via `keyring`.
#[derive(Debug, Clone)]
pub struct KeyringVault {
    service: String,
}

impl KeyringVault {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, account: &str) -> Result<keyring::Entry, VaultError> {
        keyring::Entry::new(&self.service, account)
            .map_err(|e| VaultError::Unavailable(e.to_string()))
    }
}

impl Default for KeyringVault {
    fn default() -> Self {
        Self::new(KEYCHAIN_SERVICE)
    }
}

/// Only stores that keep entries until deleted may hold the only copy of a secret.
fn survives_restart(persistence: &CredentialPersistence) -> bool {
    matches!(persistence, CredentialPersistence::UntilDelete)
}

impl SecretVault for KeyringVault {
    fn probe(&self) -> bool {
        if !survives_restart(&keyring::default::default_credential_builder().persistence()) {
            debug!("Keychain store does not survive a restart");
            return false;
        }

        let entry = match self.entry(PROBE_ACCOUNT) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Keychain probe failed: {}", e);
                return false;
            }
        };
        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => true,
            Err(e) => {
                debug!("Keychain probe failed: {}", e);
                false
            }
        }
    }

    fn get(&self, account: &str) -> Result<Option<String>, VaultError> {
        match self.entry(account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::Backend(e.to_string())),
        }
    }

    fn set(&self, account: &str, secret: &str) -> Result<(), VaultError> {
        self.entry(account)?
            .set_password(secret)
            .map_err(|e| VaultError::Backend(e.to_string()))
    }

    fn delete(&self, account: &str) -> Result<(), VaultError> {
        match self.entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::Backend(e.to_string())),
        }
    }
}

/// Vault used when the keychain is disabled in config. Always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOnlyVault;

impl SecretVault for FileOnlyVault {
    fn probe(&self) -> bool {
        false
    }

    fn get(&self, _account: &str) -> Result<Option<String>, VaultError> {
        Ok(None)
    }

    fn set(&self, _account: &str, _secret: &str) -> Result<(), VaultError> {
        Err(VaultError::Unavailable("keychain disabled".to_string()))
    }

    fn delete(&self, _account: &str) -> Result<(), VaultError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unknown,
    Available,
    Unavailable,
}

/// Probe result, determined once per process and shared by all requests.
#[derive(Debug, Default)]
pub struct VaultAvailability(AtomicU8);

impl VaultAvailability {
    const UNKNOWN: u8 = 0;
    const AVAILABLE: u8 = 1;
    const UNAVAILABLE: u8 = 2;

    pub const fn new() -> Self {
        Self(AtomicU8::new(Self::UNKNOWN))
    }

    pub fn get(&self) -> Availability {
        match self.0.load(Ordering::Acquire) {
            Self::AVAILABLE => Availability::Available,
            Self::UNAVAILABLE => Availability::Unavailable,
            _ => Availability::Unknown,
        }
    }

    /// Record the probe outcome. The first recorded outcome wins.
    pub fn record(&self, available: bool) -> Availability {
        let value = if available {
            Self::AVAILABLE
        } else {
            Self::UNAVAILABLE
        };
        let _ = self
            .0
            .compare_exchange(Self::UNKNOWN, value, Ordering::AcqRel, Ordering::Acquire);
        self.get()
    }
}

/// In-memory vault for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: std::sync::Mutex<std::collections::HashMap<String, String>>,
    pub fail_writes: bool,
    /// Stands in for a store that forgets its entries on reboot.
    pub volatile: bool,
}

#[cfg(test)]
impl MemoryVault {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn volatile() -> Self {
        Self {
            volatile: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, account: &str, secret: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(account.to_string(), secret.to_string());
    }

    pub fn contains(&self, account: &str) -> bool {
        self.entries.lock().unwrap().contains_key(account)
    }
}

#[cfg(test)]
impl SecretVault for MemoryVault {
    fn probe(&self) -> bool {
        !self.volatile
    }

    fn get(&self, account: &str) -> Result<Option<String>, VaultError> {
        Ok(self.entries.lock().unwrap().get(account).cloned())
    }

    fn set(&self, account: &str, secret: &str) -> Result<(), VaultError> {
        if self.fail_writes {
            return Err(VaultError::Backend("write rejected".to_string()));
        }
        self.insert(account, secret);
        Ok(())
    }

    fn delete(&self, account: &str) -> Result<(), VaultError> {
        self.entries.lock().unwrap().remove(account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_first_outcome_wins() {
        let availability = VaultAvailability::new();
        assert_eq!(availability.get(), Availability::Unknown);
        assert_eq!(availability.record(false), Availability::Unavailable);
        assert_eq!(availability.record(true), Availability::Unavailable);
    }

    #[test]
    fn only_persistent_stores_qualify() {
        assert!(survives_restart(&CredentialPersistence::UntilDelete));
        assert!(!survives_restart(&CredentialPersistence::UntilReboot));
        assert!(!survives_restart(&CredentialPersistence::ProcessOnly));
        assert!(!survives_restart(&CredentialPersistence::EntryOnly));
    }

    #[test]
    fn file_only_vault_refuses_writes() {
        let vault = FileOnlyVault;
        assert!(!vault.probe());
        assert!(vault.set("u1", "secret").is_err());
        assert!(vault.get("u1").unwrap().is_none());
        vault.delete("u1").unwrap();
    }

    #[test]
    fn memory_vault_round_trip() {
        let vault = MemoryVault::default();
        vault.set("u1", "secret").unwrap();
        assert_eq!(vault.get("u1").unwrap().as_deref(), Some("secret"));
        vault.delete("u1").unwrap();
        vault.delete("u1").unwrap();
        assert!(!vault.contains("u1"));
    }
}
