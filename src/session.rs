//! Session and client-side persistence.
//!
//! Stores never read ambient storage directly: they get a [`SessionProvider`]
//! and a [`KeyValueStore`] at construction, so tests can hand them in-memory
//! versions.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

pub const SESSION_KEY: &str = "session";
pub const CART_KEY: &str = "cart";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub token: String,
}

/// Generic string key/value persistence (the browser's local storage, a
/// file, memory).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> ClientResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> ClientResult<()>;
    fn remove(&self, key: &str) -> ClientResult<()>;
}

pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> ClientResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn write_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> ClientResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// All keys in one JSON object file. The whole file is rewritten on every
/// change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> ClientResult<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(ClientError::Storage(format!("{}: {e}", self.path.display()))),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> ClientResult<()> {
        let raw = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, raw).map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let _guard = lock(&self.write_lock);
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        let _guard = lock(&self.write_lock);
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

pub trait SessionProvider: Send + Sync {
    /// `None` means "not logged in".
    fn current(&self) -> Option<Session>;
}

/// Session read from the `session` key of a [`KeyValueStore`].
#[derive(Clone)]
pub struct StoredSession {
    store: Arc<dyn KeyValueStore>,
}

impl StoredSession {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn login(&self, session: &Session) -> ClientResult<()> {
        write_json(self.store.as_ref(), SESSION_KEY, session)
    }

    pub fn logout(&self) -> ClientResult<()> {
        self.store.remove(SESSION_KEY)
    }
}

impl SessionProvider for StoredSession {
    fn current(&self) -> Option<Session> {
        match read_json::<Session>(self.store.as_ref(), SESSION_KEY) {
            Ok(Some(s)) if !s.token.is_empty() => Some(s),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable session, treating as logged out");
                None
            }
        }
    }
}

/// Fixed session, for the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSession(pub Option<Session>);

impl StaticSession {
    pub fn logged_in(user_id: &str, token: &str) -> Self {
        StaticSession(Some(Session {
            user_id: user_id.to_string(),
            token: token.to_string(),
        }))
    }
}

impl SessionProvider for StaticSession {
    fn current(&self) -> Option<Session> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_session_round_trip_and_logout() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let provider = StoredSession::new(store.clone());
        assert_eq!(provider.current(), None);

        let s = Session {
            user_id: "U1".into(),
            token: "tok".into(),
        };
        provider.login(&s).unwrap();
        assert_eq!(provider.current(), Some(s));
        assert!(store.get(SESSION_KEY).unwrap().unwrap().contains("\"userId\""));

        provider.logout().unwrap();
        assert_eq!(provider.current(), None);
    }

    #[test]
    fn empty_token_or_garbage_means_logged_out() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        store.set(SESSION_KEY, r#"{"userId":"U1","token":""}"#).unwrap();
        assert_eq!(StoredSession::new(store.clone()).current(), None);

        store.set(SESSION_KEY, "{not json").unwrap();
        assert_eq!(StoredSession::new(store).current(), None);
    }

    #[test]
    fn json_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let a = JsonFileStore::new(&path);
        assert_eq!(a.get("cart").unwrap(), None);
        a.set("cart", "[]").unwrap();
        a.set("session", r#"{"userId":"U1","token":"t"}"#).unwrap();

        let b = JsonFileStore::new(&path);
        assert_eq!(b.get("cart").unwrap().as_deref(), Some("[]"));
        b.remove("cart").unwrap();
        assert_eq!(a.get("cart").unwrap(), None);
        assert!(a.get("session").unwrap().is_some());
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1,2").unwrap();
        let err = JsonFileStore::new(&path).get("cart").unwrap_err();
        assert_eq!(err.code(), "STORAGE_ERROR");
    }
}
