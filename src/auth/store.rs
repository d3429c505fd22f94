//! Credential storage
//!
//! The token store is the only owner of the access/refresh pair. Readers
//! go to the store immediately before each use instead of caching, so a
//! refresh done by one request is visible to the next.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::auth::token::{CredentialPair, TokenKey};
use crate::error::StoreError;

/// Synchronous key-value store for the credential pair
pub trait TokenStore: Send + Sync + Debug {
    /// Read a value; empty strings count as absent
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError>;

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: TokenKey) -> Result<(), StoreError>;

    /// Both tokens, if both are present
    fn credentials(&self) -> Result<Option<CredentialPair>, StoreError> {
        match (self.get(TokenKey::Access)?, self.get(TokenKey::Refresh)?) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair { access, refresh })),
            _ => Ok(None),
        }
    }

    /// Replace both tokens (login, registration)
    fn store_pair(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.set(TokenKey::Access, &pair.access)?;
        self.set(TokenKey::Refresh, &pair.refresh)
    }

    /// Replace only the access token (refresh)
    fn store_access(&self, access: &str) -> Result<(), StoreError> {
        self.set(TokenKey::Access, access)
    }

    /// Remove both tokens (logout, unrecoverable refresh failure)
    fn clear(&self) -> Result<(), StoreError> {
        self.remove(TokenKey::Access)?;
        self.remove(TokenKey::Refresh)
    }

    fn has_tokens(&self) -> Result<bool, StoreError> {
        Ok(self.credentials()?.is_some())
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<TokenKey, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pair already present
    pub fn with_pair(pair: &CredentialPair) -> Self {
        let store = Self::new();
        {
            let mut tokens = store.tokens.write();
            tokens.insert(TokenKey::Access, pair.access.clone());
            tokens.insert(TokenKey::Refresh, pair.refresh.clone());
        }
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        Ok(non_empty(self.tokens.read().get(&key)))
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        self.tokens.write().insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: TokenKey) -> Result<(), StoreError> {
        self.tokens.write().remove(&key);
        Ok(())
    }
}

/// On-disk layout of the file store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl StoredTokens {
    fn from_map(tokens: &HashMap<TokenKey, String>) -> Self {
        Self {
            access_token: tokens.get(&TokenKey::Access).cloned(),
            refresh_token: tokens.get(&TokenKey::Refresh).cloned(),
            updated_at: Some(Utc::now()),
        }
    }

    fn into_map(self) -> HashMap<TokenKey, String> {
        let mut tokens = HashMap::new();
        if let Some(access) = self.access_token {
            tokens.insert(TokenKey::Access, access);
        }
        if let Some(refresh) = self.refresh_token {
            tokens.insert(TokenKey::Refresh, refresh);
        }
        tokens
    }
}

/// Durable store backed by a JSON file
///
/// The file is read once at open. Every mutation rewrites it through a
/// temporary file and a rename, so a crash never leaves a torn file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    tokens: RwLock<HashMap<TokenKey, String>>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any persisted tokens
    ///
    /// An unreadable file opens as an empty store rather than failing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let tokens = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                match serde_json::from_str::<StoredTokens>(&raw) {
                    Ok(stored) => {
                        debug!(path = %path.display(), "Loaded tokens from disk");
                        stored.into_map()
                    }
                    Err(e) => {
                        // Signed out until the next write replaces the file
                        warn!(path = %path.display(), error = %e, "Ignoring unreadable token file");
                        HashMap::new()
                    }
                }
            }
        } else {
            debug!(path = %path.display(), "No token file yet");
            HashMap::new()
        };

        Ok(Self {
            path,
            tokens: RwLock::new(tokens),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, tokens: &HashMap<TokenKey, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&StoredTokens::from_map(tokens))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        Ok(non_empty(self.tokens.read().get(&key)))
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write();
        let mut next = tokens.clone();
        next.insert(key, value.to_string());
        self.persist(&next)?;
        *tokens = next;
        debug!(key = %key, "Token stored");
        Ok(())
    }

    fn remove(&self, key: TokenKey) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write();
        if !tokens.contains_key(&key) {
            return Ok(());
        }
        let mut next = tokens.clone();
        next.remove(&key);
        self.persist(&next)?;
        *tokens = next;
        debug!(key = %key, "Token removed");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write();
        self.persist(&HashMap::new())?;
        tokens.clear();
        info!(path = %self.path.display(), "Tokens cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("herdline-store-{}", uuid::Uuid::new_v4()))
            .join("tokens.json")
    }

    #[test]
    fn test_memory_store_pair_lifecycle() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.credentials().unwrap(), None);
        assert!(!store.has_tokens().unwrap());

        store.store_pair(&CredentialPair::new("a1", "r1")).unwrap();
        assert!(store.has_tokens().unwrap());

        store.store_access("a2").unwrap();
        assert_eq!(
            store.credentials().unwrap(),
            Some(CredentialPair::new("a2", "r1"))
        );

        store.clear().unwrap();
        assert_eq!(store.get(TokenKey::Access).unwrap(), None);
        assert_eq!(store.get(TokenKey::Refresh).unwrap(), None);
    }

    #[test]
    fn test_empty_value_is_absent() {
        let store = MemoryTokenStore::new();
        store.set(TokenKey::Access, "").unwrap();
        assert_eq!(store.get(TokenKey::Access).unwrap(), None);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let path = temp_path();
        {
            let store = FileTokenStore::open(&path).unwrap();
            store.store_pair(&CredentialPair::new("a1", "r1")).unwrap();
            store.store_access("a2").unwrap();
        }

        let reopened = FileTokenStore::open(&path).unwrap();
        assert_eq!(
            reopened.credentials().unwrap(),
            Some(CredentialPair::new("a2", "r1"))
        );

        reopened.clear().unwrap();
        let again = FileTokenStore::open(&path).unwrap();
        assert_eq!(again.credentials().unwrap(), None);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_opens_garbage_as_empty() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        let store = FileTokenStore::open(&path).unwrap();
        assert_eq!(store.credentials().unwrap(), None);

        store.store_pair(&CredentialPair::new("a1", "r1")).unwrap();
        let reopened = FileTokenStore::open(&path).unwrap();
        assert_eq!(
            reopened.credentials().unwrap(),
            Some(CredentialPair::new("a1", "r1"))
        );

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let path = temp_path();
        let dir = path.parent().unwrap().to_path_buf();
        fs::create_dir_all(&dir).unwrap();
        // A regular file where the store expects its directory
        let blocker = dir.join("blocker");
        fs::write(&blocker, "").unwrap();

        let store = FileTokenStore::open(blocker.join("tokens.json")).unwrap();
        assert!(matches!(
            store.set(TokenKey::Access, "a1"),
            Err(StoreError::Io(_))
        ));
        assert_eq!(store.get(TokenKey::Access).unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }
}
