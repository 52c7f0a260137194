//! Secure key/value storage backends for session material. The credential store
//! persists tokens and remembered logins through the `SecretStore` trait so the
//! platform keychain, a file, or memory can sit behind it. Values are handled as
//! `SecretString` and must never be logged.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("secure store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("secure store is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Named secret storage, the keychain abstraction the session persists into.
pub trait SecretStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<SecretString>, StoreError>;

    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &SecretString) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Writes several entries. Backends that can commit them in one write
    /// should override this.
    /// # Errors
    /// Returns an error if any entry cannot be written.
    fn set_all(&self, entries: &[(&str, &SecretString)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error if any entry cannot be removed.
    fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Process-local store, used for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, SecretString>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<SecretString>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &SecretString) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[derive(Default, Serialize, Deserialize)]
struct FileContents {
    entries: BTreeMap<String, String>,
}

/// JSON file backend. Every mutation rewrites the file through a temporary
/// sibling and a rename so readers never see a half-written file. On Unix the
/// file is created with 0600 permissions.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<FileContents, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(FileContents::default()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(FileContents::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, contents: &FileContents) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        let written = write_private(&tmp, &serde_json::to_vec_pretty(contents)?)
            .and_then(|()| fs::rename(&tmp, &self.path).map_err(StoreError::from));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written?;

        debug!("secure store written: {}", self.path.display());

        Ok(())
    }

    /// Unique sibling of the store file, so concurrent writers never share one.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "store".to_string(), |name| name.to_string_lossy().into_owned());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
    }

    fn update(&self, apply: impl FnOnce(&mut FileContents)) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut contents = self.load()?;
        apply(&mut contents);
        self.save(&contents)
    }
}

impl SecretStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<SecretString>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .load()?
            .entries
            .get(key)
            .map(|value| SecretString::from(value.clone())))
    }

    fn set(&self, key: &str, value: &SecretString) -> Result<(), StoreError> {
        self.set_all(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.remove_all(&[key])
    }

    fn set_all(&self, entries: &[(&str, &SecretString)]) -> Result<(), StoreError> {
        self.update(|contents| {
            for (key, value) in entries {
                contents
                    .entries
                    .insert((*key).to_string(), value.expose_secret().to_string());
            }
        })
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(|contents| {
            for key in keys {
                contents.entries.remove(*key);
            }
        })
    }
}

/// Creates `path` readable by the owner only from the first byte on.
#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = open_private(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
