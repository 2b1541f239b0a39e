//! File-backed backends for a state directory.
//!
//! ```text
//! {state_dir}/
//!   kv/{key}.value   # one file per key, raw value
//!   cookies.json     # cookie jar
//! ```
//!
//! Every write goes to a temp file first and is renamed into place, so a
//! reader never observes a partial value.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{StorageError, StorageResult};

use super::{Cookie, CookieJar, KeyValueStore};

const VALUE_EXT: &str = "value";
const COOKIES_FILE: &str = "cookies.json";
const TEMP_PREFIX: &str = ".assent-";

/// Key-value store with one file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: Option<usize>,
}

impl FileStore {
    /// Store rooted at `{state_dir}/kv`. The directory is created lazily on
    /// first write.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: state_dir.as_ref().join("kv"),
            quota_bytes: None,
        }
    }

    /// Cap the summed size of all stored values.
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::unavailable(format!(
                "key '{key}' cannot be mapped to a file name"
            )));
        }
        Ok(self.dir.join(format!("{key}.{VALUE_EXT}")))
    }

    fn used_bytes_excluding(&self, exclude: &Path) -> StorageResult<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut total = 0usize;
        for entry in entries {
            let path = entry?.path();
            if path == exclude || path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXT) {
                continue;
            }
            total += fs::metadata(&path)?.len() as usize;
        }
        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.value_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(StorageError::malformed(
                key,
                format!("value is not valid UTF-8: {e}"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        if let Some(quota) = self.quota_bytes {
            let needed = self.used_bytes_excluding(&path)? + value.len();
            if needed > quota {
                return Err(StorageError::quota(needed, quota));
            }
        }
        fs::create_dir_all(&self.dir)?;
        write_atomic(&path, value)?;
        debug!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "removed value");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Cookie jar persisted as a JSON array.
#[derive(Debug, Clone)]
pub struct FileCookieJar {
    path: PathBuf,
}

impl FileCookieJar {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(COOKIES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StorageResult<Vec<Cookie>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| StorageError::malformed(COOKIES_FILE, e.to_string()))
    }

    /// Load for a read-modify-write. A corrupt jar is replaced, as a browser
    /// would discard an unreadable cookie database.
    fn load_for_write(&self) -> StorageResult<Vec<Cookie>> {
        match self.load() {
            Err(err @ StorageError::Malformed { .. }) => {
                warn!(path = %self.path.display(), error = %err, "discarding corrupt cookie jar");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    fn save(&self, cookies: &[Cookie]) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(cookies)
            .map_err(|e| StorageError::malformed(COOKIES_FILE, e.to_string()))?;
        write_atomic(&self.path, &json)
    }
}

impl CookieJar for FileCookieJar {
    fn get(&self, name: &str, path: &str) -> StorageResult<Option<Cookie>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|c| c.name == name && c.path == path))
    }

    fn set(&self, cookie: Cookie) -> StorageResult<()> {
        let mut cookies = self.load_for_write()?;
        cookies.retain(|c| !(c.name == cookie.name && c.path == cookie.path));
        debug!(name = %cookie.name, path = %cookie.path, expires = %cookie.expires, "set cookie");
        cookies.push(cookie);
        self.save(&cookies)
    }

    fn remove(&self, name: &str, path: &str) -> StorageResult<()> {
        let mut cookies = self.load_for_write()?;
        let before = cookies.len();
        cookies.retain(|c| !(c.name == name && c.path == path));
        if cookies.len() == before {
            return Ok(());
        }
        debug!(name, path, "removed cookie");
        self.save(&cookies)
    }
}

/// Each call writes its own uniquely named temp file next to `path`, so
/// concurrent writers race only on the final rename (last write wins).
fn write_atomic(path: &Path, content: &str) -> StorageResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    // The temp file is removed on drop if persisting fails.
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
