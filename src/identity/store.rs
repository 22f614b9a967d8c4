//! Persistence of the local identity.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::Identity;
use super::vault::{Availability, FileOnlyVault, KeyringVault, SecretVault, VaultAvailability};
use chrono::{DateTime, Utc};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode identity: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where the secret of a saved identity ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretLocation {
    Vault,
    File,
}

impl SecretLocation {
    pub fn describe(self) -> &'static str {
        match self {
            SecretLocation::Vault => "the system keychain",
            SecretLocation::File => "the local identity file (owner-only permissions)",
        }
    }
}

/// On-disk shape. `secret` is present only when the vault did not take it.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityRecord {
    username: String,
    user_id: String,
    #[serde(default, alias = "api_key", skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
    registered_at: DateTime<Utc>,
}

impl IdentityRecord {
    fn into_identity(self, secret: String) -> Identity {
        Identity {
            username: self.username,
            user_id: self.user_id,
            secret,
            registered_at: self.registered_at,
        }
    }
}

/// Loads, saves and clears the identity. Shared by all in-flight requests.
pub struct CredentialStore {
    file: PathBuf,
    vault: Arc<dyn SecretVault>,
    availability: VaultAvailability,
}

impl CredentialStore {
    pub fn new(file: impl Into<PathBuf>, vault: Arc<dyn SecretVault>) -> Self {
        Self {
            file: file.into(),
            vault,
            availability: VaultAvailability::new(),
        }
    }

    /// Store that keeps secrets in the platform keychain when possible.
    pub fn with_keyring(file: impl Into<PathBuf>) -> Self {
        Self::new(file, Arc::new(KeyringVault::default()))
    }

    /// Store that never touches a keychain.
    pub fn file_only(file: impl Into<PathBuf>) -> Self {
        Self::new(file, Arc::new(FileOnlyVault))
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Probe the vault on first use; later calls reuse the answer.
    pub async fn vault_available(&self) -> bool {
        let state = match self.availability.get() {
            Availability::Unknown => {
                let vault = Arc::clone(&self.vault);
                let ok = tokio::task::spawn_blocking(move || vault.probe())
                    .await
                    .unwrap_or(false);
                if !ok {
                    debug!("System keychain not available, API key will be kept in the identity file");
                }
                self.availability.record(ok)
            }
            known => known,
        };
        state == Availability::Available
    }

    /// Load the identity. Missing or unreadable data yields `None`.
    pub async fn load(&self) -> Result<Option<Identity>, StoreError> {
        Ok(self.load_located().await?.map(|(identity, _)| identity))
    }

    /// Load the identity along with where its secret came from.
    pub async fn load_located(&self) -> Result<Option<(Identity, SecretLocation)>, StoreError> {
        let Some(record) = self.read_record().await? else {
            return Ok(None);
        };

        if record.username.is_empty() || record.user_id.is_empty() {
            warn!(
                "Identity file {} is missing username or user_id, ignoring it",
                self.file.display()
            );
            return Ok(None);
        }

        if self.vault_available().await {
            match self.vault_get(&record.user_id).await {
                Ok(Some(secret)) => {
                    return Ok(Some((record.into_identity(secret), SecretLocation::Vault)));
                }
                Ok(None) => debug!("No keychain entry for {}", record.username),
                Err(e) => warn!("Keychain read failed, falling back to identity file: {}", e),
            }
        }

        match record.secret.clone().filter(|s| !s.is_empty()) {
            Some(secret) => Ok(Some((record.into_identity(secret), SecretLocation::File))),
            None => {
                warn!("API key not found in keychain or identity file");
                Ok(None)
            }
        }
    }

    /// Persist the identity, replacing any previous one.
    pub async fn save(&self, identity: &Identity) -> Result<SecretLocation, StoreError> {
        let mut in_vault = false;
        if self.vault_available().await {
            match self.vault_set(&identity.user_id, &identity.secret).await {
                Ok(()) => in_vault = true,
                Err(e) => {
                    warn!("Failed to save API key to keychain, falling back to identity file: {}", e);
                    // A stale vault entry would shadow the file on the next load.
                    if let Err(e) = self.vault_delete(&identity.user_id).await {
                        warn!("Failed to remove stale keychain entry: {}", e);
                    }
                }
            }
        }

        let record = IdentityRecord {
            username: identity.username.clone(),
            user_id: identity.user_id.clone(),
            secret: (!in_vault).then(|| identity.secret.clone()),
            registered_at: identity.registered_at,
        };
        let json = serde_json::to_string_pretty(&record)?;
        write_owner_only(&self.file, json.as_bytes()).await?;

        let location = if in_vault {
            info!("Identity saved for {} (API key in system keychain)", identity.username);
            SecretLocation::Vault
        } else {
            warn!(
                "API key stored in {} with owner-only permissions. A system keychain is more secure.",
                self.file.display()
            );
            SecretLocation::File
        };
        Ok(location)
    }

    /// Remove the identity from the vault and the file. Clearing nothing succeeds.
    pub async fn clear(&self) -> Result<(), StoreError> {
        if let Some(record) = self.read_record().await?
            && !record.user_id.is_empty()
            && self.vault_available().await
            && let Err(e) = self.vault_delete(&record.user_id).await
        {
            warn!("Failed to remove API key from keychain: {}", e);
        }

        match tokio::fs::remove_file(&self.file).await {
            Ok(()) => {
                info!("Identity cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.file, e)),
        }
    }

    async fn read_record(&self) -> Result<Option<IdentityRecord>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.file, e)),
        };

        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Identity file {} is corrupt, ignoring it: {}", self.file.display(), e);
                Ok(None)
            }
        }
    }

    async fn vault_get(&self, account: &str) -> Result<Option<String>, String> {
        let vault = Arc::clone(&self.vault);
        let account = account.to_string();
        tokio::task::spawn_blocking(move || vault.get(&account))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())
    }

    async fn vault_set(&self, account: &str, secret: &str) -> Result<(), String> {
        let vault = Arc::clone(&self.vault);
        let account = account.to_string();
        let secret = secret.to_string();
        tokio::task::spawn_blocking(move || vault.set(&account, &secret))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())
    }

    async fn vault_delete(&self, account: &str) -> Result<(), String> {
        let vault = Arc::clone(&self.vault);
        let account = account.to_string();
        tokio::task::spawn_blocking(move || vault.delete(&account))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())
    }
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
async fn write_owner_only(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp = path.with_extension("json.tmp");
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&tmp).await.map_err(|e| StoreError::io(&tmp, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    file.sync_all().await.map_err(|e| StoreError::io(&tmp, e))?;
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
    }

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemoryVault, MockSecretVault};

    const KEY: &str = "ci_u12345678_abcdefABCDEF0123456789abcdefABCDEF01";

    fn identity() -> Identity {
        Identity::new("alice".into(), "u-1".into(), KEY.into())
    }

    fn raw_file(store: &CredentialStore) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn file_only_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::file_only(tmp.path().join("agent_identity.json"));

        let saved = identity();
        let location = store.save(&saved).await.unwrap();
        assert_eq!(location, SecretLocation::File);
        assert_eq!(raw_file(&store)["secret"], KEY);

        let (loaded, location) = store.load_located().await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(location, SecretLocation::File);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn identity_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::file_only(tmp.path().join("nested").join("id.json"));
        store.save(&identity()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!tmp.path().join("nested").join("id.json.tmp").exists());
    }

    #[tokio::test]
    async fn vault_keeps_secret_out_of_file() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = Arc::new(MemoryVault::default());
        let store = CredentialStore::new(tmp.path().join("id.json"), vault.clone());

        let saved = identity();
        assert_eq!(store.save(&saved).await.unwrap(), SecretLocation::Vault);
        assert!(raw_file(&store).get("secret").is_none());
        assert!(vault.contains("u-1"));

        let (loaded, location) = store.load_located().await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(location, SecretLocation::Vault);
    }

    #[tokio::test]
    async fn non_persistent_vault_leaves_secret_in_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("id.json");
        let volatile = Arc::new(MemoryVault::volatile());
        let store = CredentialStore::new(&path, volatile.clone());

        let saved = identity();
        assert_eq!(store.save(&saved).await.unwrap(), SecretLocation::File);
        assert_eq!(raw_file(&store)["secret"], KEY);
        assert!(!volatile.contains("u-1"));

        // After a reboot the vault is empty; the identity must still load.
        let rebooted = CredentialStore::new(&path, Arc::new(MemoryVault::default()));
        let (loaded, location) = rebooted.load_located().await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(location, SecretLocation::File);
    }

    #[tokio::test]
    async fn vault_write_failure_falls_back_to_file() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = Arc::new(MemoryVault::failing_writes());
        vault.insert("u-1", "ci_stale_value");
        let store = CredentialStore::new(tmp.path().join("id.json"), vault.clone());

        assert_eq!(store.save(&identity()).await.unwrap(), SecretLocation::File);
        assert_eq!(raw_file(&store)["secret"], KEY);
        assert!(!vault.contains("u-1"), "stale keychain entry must be removed");
        assert_eq!(store.load().await.unwrap().unwrap().secret, KEY);
    }

    #[tokio::test]
    async fn vault_secret_wins_over_file_secret() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = Arc::new(MemoryVault::default());
        vault.insert("u-1", "from-vault");
        std::fs::write(
            tmp.path().join("id.json"),
            r#"{"username":"alice","user_id":"u-1","secret":"from-file","registered_at":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let store = CredentialStore::new(tmp.path().join("id.json"), vault);

        assert_eq!(store.load().await.unwrap().unwrap().secret, "from-vault");
    }

    #[tokio::test]
    async fn legacy_api_key_field_is_read() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("id.json"),
            format!(
                r#"{{"username":"bob","user_id":"u-9","api_key":"{}","registered_at":"2024-06-01T12:00:00.000Z"}}"#,
                KEY
            ),
        )
        .unwrap();
        let store = CredentialStore::new(tmp.path().join("id.json"), Arc::new(MemoryVault::default()));

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.username, "bob");
        assert_eq!(loaded.secret, KEY);
    }

    #[tokio::test]
    async fn missing_corrupt_or_secretless_files_load_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::file_only(tmp.path().join("id.json"));
        assert!(store.load().await.unwrap().is_none());

        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().await.unwrap().is_none());

        std::fs::write(
            store.path(),
            r#"{"username":"alice","user_id":"u-1","registered_at":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent_and_removes_vault_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = Arc::new(MemoryVault::default());
        let store = CredentialStore::new(tmp.path().join("id.json"), vault.clone());
        store.save(&identity()).await.unwrap();

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        assert!(!vault.contains("u-1"));
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn vault_is_probed_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut vault = MockSecretVault::new();
        vault.expect_probe().times(1).return_const(false);
        vault.expect_set().never();
        let store = CredentialStore::new(tmp.path().join("id.json"), Arc::new(vault));

        store.save(&identity()).await.unwrap();
        store.load().await.unwrap().unwrap();
        store.save(&identity()).await.unwrap();
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn vault_read_error_falls_back_to_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("id.json"),
            format!(
                r#"{{"username":"alice","user_id":"u-1","secret":"{}","registered_at":"2025-01-01T00:00:00Z"}}"#,
                KEY
            ),
        )
        .unwrap();

        let mut vault = MockSecretVault::new();
        vault.expect_probe().return_const(true);
        vault
            .expect_get()
            .returning(|_| Err(crate::identity::VaultError::Backend("locked".into())));
        let store = CredentialStore::new(tmp.path().join("id.json"), Arc::new(vault));

        assert_eq!(store.load().await.unwrap().unwrap().secret, KEY);
    }
}
