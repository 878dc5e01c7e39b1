pub mod models;
pub mod queries;
mod snapshot;

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::info;

use crate::models::Snapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} is no longer current")]
    Stale(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for faults of the backing file rather than of the request.
    pub fn is_persistence(&self) -> bool {
        matches!(self, StoreError::Io { .. } | StoreError::Corrupt { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// File-backed store for users and posts.
///
/// The in-memory snapshot mirrors the file and is guarded by a reader/writer
/// lock. Readers share the lock. A mutation holds it exclusively across the
/// whole copy, modify, persist sequence and only publishes the new snapshot
/// once it is on disk, so concurrent mutations are totally ordered and never
/// compute the same next id.
pub struct Datastore {
    path: PathBuf,
    state: RwLock<Snapshot>,
}

impl Datastore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }

        let snapshot = match snapshot::load(path)? {
            Some(snapshot) => snapshot,
            None => {
                let empty = Snapshot::default();
                snapshot::persist(path, &empty)?;
                info!("Created empty datastore at {}", path.display());
                empty
            }
        };

        info!(
            "Datastore opened at {} ({} users, {} posts)",
            path.display(),
            snapshot.users.len(),
            snapshot.posts.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            state: RwLock::new(snapshot),
        })
    }

    /// Run a read-only closure against a consistent snapshot.
    pub fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Snapshot) -> Result<T>,
    {
        // Mutations only touch a working copy, so a poisoned lock still
        // guards a fully published snapshot.
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Run a mutation as one exclusive load, modify, persist step.
    ///
    /// The closure edits a working copy. If it returns an error, or the new
    /// snapshot cannot be written, neither the file nor the in-memory state
    /// changes.
    pub fn transact<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Snapshot) -> Result<T>,
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = state.clone();
        let out = f(&mut next)?;
        snapshot::persist(&self.path, &next)?;
        *state = next;
        Ok(out)
    }
}
