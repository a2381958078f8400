//! Token storage
//!
//! `TokenStore` is the key-value persistence the session keeps its credential
//! pair and cached profile in. `FileTokenStore` manages a JSON object on disk;
//! all writes use atomic temp-file + rename to prevent corruption on crash and
//! a tokio Mutex serializes concurrent writes from login, refresh and logout.
//! `MemoryTokenStore` keeps the same map in memory for tests and embedders
//! that do not want persistence.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// One entry of a batched update: `Some` sets the key, `None` removes it.
pub type Change = (String, Option<String>);

/// Scoped key-value persistence for session credentials.
///
/// `update` applies a batch of changes as one write, so a refreshed pair never
/// reaches disk half-replaced. `set` and `remove` are single-entry batches.
pub trait TokenStore: Send + Sync {
    /// Read a value.
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

    /// Apply all changes and persist them together.
    fn update(&self, changes: Vec<Change>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        self.update(vec![(key.to_string(), Some(value))])
    }

    fn remove<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        self.update(vec![(key.to_string(), None)])
    }
}

fn apply(state: &mut BTreeMap<String, String>, changes: Vec<Change>) {
    for (key, value) in changes {
        match value {
            Some(value) => {
                state.insert(key, value);
            }
            None => {
                state.remove(&key);
            }
        }
    }
}

/// In-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    state: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored entries.
    pub async fn entries(&self) -> BTreeMap<String, String> {
        self.state.lock().await.clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move { self.state.lock().await.get(key).cloned() })
    }

    fn update(&self, changes: Vec<Change>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            apply(&mut *self.state.lock().await, changes);
            Ok(())
        })
    }
}

/// Thread-safe token file manager.
///
/// The Mutex serializes all writes. Reads acquire the lock briefly to clone
/// a single value, so request-time reads don't block on disk writes for long.
pub struct FileTokenStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, String>>,
}

impl FileTokenStore {
    /// Load tokens from the given file path.
    ///
    /// If the file doesn't exist, creates it (and its parent directory) as
    /// `{}`: a cold start with nobody signed in.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let entries: BTreeMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::StoreParse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded token store");
            entries
        } else {
            info!(path = %path.display(), "token file not found, starting signed out");
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| Error::Io(format!("creating token directory: {e}")))?;
            }
            let entries = BTreeMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move { self.state.lock().await.get(key).cloned() })
    }

    fn update(&self, changes: Vec<Change>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let keys: Vec<String> = changes.iter().map(|(k, _)| k.clone()).collect();
            apply(&mut state, changes);
            debug!(?keys, "updated token store");
            write_atomic(&self.path, &state).await
        })
    }
}

/// Write the token map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains bearer and refresh tokens.
async fn write_atomic(path: &Path, data: &BTreeMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::StoreParse(format!("serializing tokens: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted tokens");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};

    #[tokio::test]
    async fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileTokenStore::load(path.clone()).await.unwrap();
        store
            .update(vec![
                (ACCESS_TOKEN_KEY.into(), Some("A1".into())),
                (REFRESH_TOKEN_KEY.into(), Some("R1".into())),
            ])
            .await
            .unwrap();

        let reloaded = FileTokenStore::load(path).await.unwrap();
        assert_eq!(reloaded.get(ACCESS_TOKEN_KEY).await.as_deref(), Some("A1"));
        assert_eq!(reloaded.get(REFRESH_TOKEN_KEY).await.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn cold_start_creates_empty_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        assert!(!path.exists());
        let store = FileTokenStore::load(path.clone()).await.unwrap();
        assert!(store.get(ACCESS_TOKEN_KEY).await.is_none());
        assert!(path.exists());

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = FileTokenStore::load(path).await.err().unwrap();
        assert!(matches!(err, Error::StoreParse(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn set_and_remove_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileTokenStore::load(path.clone()).await.unwrap();
        store.set(USER_KEY, r#"{"id":1}"#.into()).await.unwrap();
        store.set(ACCESS_TOKEN_KEY, "A1".into()).await.unwrap();
        store.remove(USER_KEY).await.unwrap();

        let reloaded = FileTokenStore::load(path).await.unwrap();
        assert!(reloaded.get(USER_KEY).await.is_none());
        assert_eq!(reloaded.get(ACCESS_TOKEN_KEY).await.as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn removing_missing_key_is_ok() {
        let store = MemoryTokenStore::new();
        store.remove(REFRESH_TOKEN_KEY).await.unwrap();
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test]
    async fn batched_update_mixes_sets_and_removes() {
        let store = MemoryTokenStore::new();
        store.set(USER_KEY, "{}".into()).await.unwrap();
        store
            .update(vec![
                (ACCESS_TOKEN_KEY.into(), Some("A2".into())),
                (USER_KEY.into(), None),
            ])
            .await
            .unwrap();

        let entries = store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[ACCESS_TOKEN_KEY], "A2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileTokenStore::load(path.clone()).await.unwrap();
        store.set(ACCESS_TOKEN_KEY, "A1".into()).await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "token file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn concurrent_writes_dont_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = std::sync::Arc::new(FileTokenStore::load(path.clone()).await.unwrap());

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(vec![(format!("key-{i}"), Some(i.to_string()))])
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 10);
    }
}
