// Credential persistence
// Key-value stores with per-entry expiry, plus the pair-level facade used by the session

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::types::CredentialPair;
use crate::error::{ApiError, Result};

/// Store key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Store key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Default access token lifetime (client-side policy)
pub const DEFAULT_ACCESS_TOKEN_TTL_DAYS: i64 = 1;

/// Default refresh token lifetime (client-side policy)
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// A single mutation applied as part of a batch
#[derive(Debug, Clone)]
pub enum StoreWrite {
    Set {
        key: String,
        value: String,
        ttl: Duration,
    },
    Remove {
        key: String,
    },
}

impl StoreWrite {
    pub fn set(key: &str, value: &str, ttl: Duration) -> Self {
        StoreWrite::Set {
            key: key.to_string(),
            value: value.to_string(),
            ttl,
        }
    }

    pub fn remove(key: &str) -> Self {
        StoreWrite::Remove {
            key: key.to_string(),
        }
    }
}

/// Pluggable key-value credential storage.
///
/// `write_batch` is the unit of atomicity: a batch is either applied whole or
/// not at all, which is what keeps the access/refresh pair consistent.
pub trait CredentialStore: Send + Sync {
    /// Read a value; expired entries read as absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Apply all writes atomically
    fn write_batch(&self, writes: Vec<StoreWrite>) -> Result<()>;

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.write_batch(vec![StoreWrite::set(key, value, ttl)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.write_batch(vec![StoreWrite::remove(key)])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Apply a batch. Expiries are computed up front so a bad lifetime leaves
/// `entries` untouched.
fn apply_writes(entries: &mut HashMap<String, StoredEntry>, writes: Vec<StoreWrite>) -> Result<()> {
    let now = Utc::now();
    let mut resolved = Vec::with_capacity(writes.len());
    for write in writes {
        match write {
            StoreWrite::Set { key, value, ttl } => {
                let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
                    ApiError::Store(format!("Lifetime of {} is out of range", key))
                })?;
                resolved.push((key, Some(StoredEntry { value, expires_at })));
            }
            StoreWrite::Remove { key } => resolved.push((key, None)),
        }
    }

    for (key, entry) in resolved {
        match entry {
            Some(entry) => {
                entries.insert(key, entry);
            }
            None => {
                entries.remove(&key);
            }
        }
    }
    entries.retain(|_, entry| !entry.is_expired());
    Ok(())
}

fn poisoned<T>(_: T) -> ApiError {
    ApiError::Store("credential store lock poisoned".to_string())
}

/// In-process store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    fn write_batch(&self, writes: Vec<StoreWrite>) -> Result<()> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        apply_writes(&mut entries, writes)
    }
}

/// JSON file store. Each batch rewrites the whole file via a temp file and rename.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, StoredEntry>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            ApiError::Store(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            ApiError::Store(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, entries: &HashMap<String, StoredEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::Store(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| ApiError::Store(format!("Failed to serialize credentials: {}", e)))?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents)
            .map_err(|e| ApiError::Store(format!("Failed to write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| ApiError::Store(format!("Failed to replace {}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let entries = self.load()?;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    fn write_batch(&self, writes: Vec<StoreWrite>) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut entries = self.load()?;
        apply_writes(&mut entries, writes)?;
        self.save(&entries)
    }
}

/// Pair-level view over a credential store.
///
/// Cheap to clone; every clone shares the same backend.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn CredentialStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn CredentialStore>) -> Self {
        Self {
            backend,
            access_ttl: Duration::days(DEFAULT_ACCESS_TOKEN_TTL_DAYS),
            refresh_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
        }
    }

    /// Override the client-side token lifetimes
    pub fn with_lifetimes(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn backend(&self) -> &Arc<dyn CredentialStore> {
        &self.backend
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self
            .backend
            .get(ACCESS_TOKEN_KEY)?
            .filter(|token| !token.is_empty()))
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self
            .backend
            .get(REFRESH_TOKEN_KEY)?
            .filter(|token| !token.is_empty()))
    }

    /// Both tokens, or `None` if either is missing
    pub fn pair(&self) -> Result<Option<CredentialPair>> {
        match (self.access_token()?, self.refresh_token()?) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair::new(access, refresh))),
            _ => Ok(None),
        }
    }

    /// Replace the stored pair wholesale
    pub fn save_pair(&self, pair: &CredentialPair) -> Result<()> {
        self.backend.write_batch(vec![
            StoreWrite::set(ACCESS_TOKEN_KEY, &pair.access_token, self.access_ttl),
            StoreWrite::set(REFRESH_TOKEN_KEY, &pair.refresh_token, self.refresh_ttl),
        ])
    }

    /// Remove both tokens
    pub fn clear(&self) -> Result<()> {
        self.backend.write_batch(vec![
            StoreWrite::remove(ACCESS_TOKEN_KEY),
            StoreWrite::remove(REFRESH_TOKEN_KEY),
        ])
    }

    /// Authenticated iff a non-empty access token is stored
    pub fn is_authenticated(&self) -> bool {
        match self.access_token() {
            Ok(token) => token.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read access token");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("habit-tracker-test-{}", uuid::Uuid::new_v4()))
            .join("session.json")
    }

    #[test]
    fn test_memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v", Duration::minutes(5)).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_expired_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::seconds(-1)).unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_token_store_pair_roundtrip_and_clear() {
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
        assert!(!tokens.is_authenticated());
        assert_eq!(tokens.pair().unwrap(), None);

        tokens.save_pair(&CredentialPair::new("A1", "R1")).unwrap();
        assert!(tokens.is_authenticated());
        assert_eq!(tokens.pair().unwrap(), Some(CredentialPair::new("A1", "R1")));

        tokens.save_pair(&CredentialPair::new("A2", "R2")).unwrap();
        assert_eq!(tokens.access_token().unwrap().as_deref(), Some("A2"));
        assert_eq!(tokens.refresh_token().unwrap().as_deref(), Some("R2"));

        tokens.clear().unwrap();
        assert_eq!(tokens.access_token().unwrap(), None);
        assert_eq!(tokens.refresh_token().unwrap(), None);
    }

    #[test]
    fn test_empty_access_token_is_not_authenticated() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(ACCESS_TOKEN_KEY, "", Duration::days(1)).unwrap();
        let tokens = TokenStore::new(backend);
        assert!(!tokens.is_authenticated());
    }

    #[test]
    fn test_access_token_expires_before_refresh_token() {
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()))
            .with_lifetimes(Duration::seconds(-1), Duration::days(30));
        tokens.save_pair(&CredentialPair::new("A1", "R1")).unwrap();

        assert_eq!(tokens.access_token().unwrap(), None);
        assert_eq!(tokens.refresh_token().unwrap().as_deref(), Some("R1"));
        assert_eq!(tokens.pair().unwrap(), None);
    }

    #[test]
    fn test_out_of_range_lifetime_is_error_and_keeps_pair() {
        let backend = Arc::new(MemoryStore::new());
        TokenStore::new(backend.clone())
            .save_pair(&CredentialPair::new("A1", "R1"))
            .unwrap();

        // Far past the last representable date
        let tokens = TokenStore::new(backend)
            .with_lifetimes(Duration::days(1), Duration::days(100_000_000));
        let result = tokens.save_pair(&CredentialPair::new("A2", "R2"));

        assert!(matches!(result, Err(ApiError::Store(_))));
        assert_eq!(tokens.pair().unwrap(), Some(CredentialPair::new("A1", "R1")));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let path = temp_store_path();

        let tokens = TokenStore::new(Arc::new(FileStore::new(&path)));
        tokens.save_pair(&CredentialPair::new("A1", "R1")).unwrap();

        let reopened = TokenStore::new(Arc::new(FileStore::new(&path)));
        assert_eq!(reopened.pair().unwrap(), Some(CredentialPair::new("A1", "R1")));

        reopened.clear().unwrap();
        assert_eq!(tokens.pair().unwrap(), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let store = FileStore::new(temp_store_path());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let path = temp_store_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get(ACCESS_TOKEN_KEY), Err(ApiError::Store(_))));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
