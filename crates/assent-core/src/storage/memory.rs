//! In-memory backends. Clones share state, so a test can keep a handle to
//! inspect or sabotage what a component writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{StorageError, StorageResult};

use super::{Cookie, CookieJar, KeyValueStore};

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, String>,
    disabled: bool,
    quota_bytes: Option<usize>,
}

/// In-memory key-value store with optional quota and a "disabled" switch.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quota over the summed byte length of all keys and values.
    pub fn with_quota(quota_bytes: usize) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.quota_bytes = Some(quota_bytes);
        }
        store
    }

    /// Make every operation fail as if storage were blocked.
    pub fn set_disabled(&self, disabled: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.disabled = disabled;
        }
    }

    /// Raw value as stored, bypassing the disabled switch.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.entries.get(key).cloned())
    }

    /// Store a raw value, bypassing quota and the disabled switch.
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| StorageError::unavailable("memory store lock poisoned"))?;
        if state.disabled {
            return Err(StorageError::unavailable("storage disabled"));
        }
        Ok(state)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut state = self.lock()?;
        if let Some(quota) = state.quota_bytes {
            let others: usize = state
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::quota(needed, quota));
            }
        }
        state.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.lock()?.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct JarState {
    cookies: Vec<Cookie>,
    disabled: bool,
}

/// In-memory cookie jar keyed by (name, path).
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    state: Arc<Mutex<JarState>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_disabled(&self, disabled: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.disabled = disabled;
        }
    }

    /// All held cookies, expired or not.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.state
            .lock()
            .map(|s| s.cookies.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, JarState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| StorageError::unavailable("cookie jar lock poisoned"))?;
        if state.disabled {
            return Err(StorageError::unavailable("cookies disabled"));
        }
        Ok(state)
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str, path: &str) -> StorageResult<Option<Cookie>> {
        Ok(self
            .lock()?
            .cookies
            .iter()
            .find(|c| c.name == name && c.path == path)
            .cloned())
    }

    fn set(&self, cookie: Cookie) -> StorageResult<()> {
        let mut state = self.lock()?;
        state
            .cookies
            .retain(|c| !(c.name == cookie.name && c.path == cookie.path));
        state.cookies.push(cookie);
        Ok(())
    }

    fn remove(&self, name: &str, path: &str) -> StorageResult<()> {
        self.lock()?
            .cookies
            .retain(|c| !(c.name == name && c.path == path));
        Ok(())
    }
}
