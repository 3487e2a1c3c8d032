//! Credential cache
//!
//! Persists the username/password pair used for automatic login, plus a JSON
//! snapshot of the session's executable list, for the lifetime of a client
//! "session". The in-memory store lives as long as the process; the file
//! store survives separate CLI invocations the way browser session storage
//! survives page reloads.
//!
//! # Security Model
//!
//! Passwords are stored in cleartext. The file store restricts the file to
//! mode 0600 on Unix, which limits exposure to the owning user but is no
//! substitute for a short-lived token.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;
use crate::types::{Credentials, Session};

/// Key/value storage for cached login state
pub trait CredentialStore: Send + Sync {
    /// Remember credentials for automatic login
    fn save(&self, credentials: &Credentials) -> Result<(), CredentialError>;

    /// Cached credentials, if any
    fn load(&self) -> Result<Option<Credentials>, CredentialError>;

    /// Forget cached credentials and the session snapshot
    fn clear(&self) -> Result<(), CredentialError>;

    /// Store a snapshot of the session's executable list
    fn save_snapshot(&self, session: &Session) -> Result<(), CredentialError>;

    /// Last stored session snapshot
    fn load_snapshot(&self) -> Result<Option<Session>, CredentialError>;
}

/// Everything a store keeps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session: Option<Session>,
}

/// Process-lifetime store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: Mutex<StoredState>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with credentials
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            state: Mutex::new(StoredState {
                credentials: Some(credentials),
                session: None,
            }),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        self.state.lock().credentials = Some(credentials.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        Ok(self.state.lock().credentials.clone())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *self.state.lock() = StoredState::default();
        Ok(())
    }

    fn save_snapshot(&self, session: &Session) -> Result<(), CredentialError> {
        self.state.lock().session = Some(session.clone());
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<Session>, CredentialError> {
        Ok(self.state.lock().session.clone())
    }
}

/// JSON file store
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredState, CredentialError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(StoredState::default()),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| CredentialError::Corrupt {
                    path: self.path.clone(),
                    source,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StoredState::default()),
            Err(source) => Err(CredentialError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Write the state, creating the parent directory if needed.
    ///
    /// Sets file permissions to 0600 (owner read/write only) on Unix.
    fn write(&self, state: &StoredState) -> Result<(), CredentialError> {
        let io_err = |source| CredentialError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(state).map_err(|source| {
            CredentialError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, json).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, permissions).map_err(io_err)?;
        }

        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut StoredState)) -> Result<(), CredentialError> {
        let _guard = self.lock.lock();
        let mut state = self.read()?;
        f(&mut state);
        self.write(&state)
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        self.update(|state| state.credentials = Some(credentials.clone()))
    }

    fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        let _guard = self.lock.lock();
        Ok(self.read()?.credentials)
    }

    fn clear(&self) -> Result<(), CredentialError> {
        let _guard = self.lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CredentialError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save_snapshot(&self, session: &Session) -> Result<(), CredentialError> {
        self.update(|state| state.session = Some(session.clone()))
    }

    fn load_snapshot(&self) -> Result<Option<Session>, CredentialError> {
        let _guard = self.lock.lock();
        Ok(self.read()?.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_protocol::Executable;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&Credentials::new("a", "p")).unwrap();
        assert_eq!(store.load().unwrap(), Some(Credentials::new("a", "p")));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_memory_store_clear_drops_snapshot() {
        let store = MemoryCredentialStore::with_credentials(Credentials::new("a", "p"));
        store
            .save_snapshot(&Session::from_listing(vec![Executable::new("e1", "f")]))
            .unwrap();
        assert!(store.load_snapshot().unwrap().is_some());

        store.clear().unwrap();
        assert!(store.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = FileCredentialStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.load().unwrap().is_none());
        assert!(store.load_snapshot().unwrap().is_none());
        store.clear().expect("Clearing a missing file should succeed");
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("session.json");

        {
            let store = FileCredentialStore::new(&path);
            store.save(&Credentials::new("alice", "secret")).unwrap();
            store
                .save_snapshot(&Session::from_listing(vec![Executable::new("e1", "job")]))
                .unwrap();
        }

        let store = FileCredentialStore::new(&path);
        assert_eq!(
            store.load().unwrap(),
            Some(Credentials::new("alice", "secret"))
        );
        let snapshot = store.load_snapshot().unwrap().expect("snapshot");
        assert_eq!(snapshot.executables, vec![Executable::new("e1", "job")]);
    }

    #[test]
    fn test_file_store_clear_removes_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = FileCredentialStore::new(dir.path().join("session.json"));

        store.save(&Credentials::new("a", "p")).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_reports_corruption() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("session.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(CredentialError::Corrupt { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("Failed to create temp dir");
        let store = FileCredentialStore::new(dir.path().join("session.json"));
        store.save(&Credentials::new("a", "p")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
