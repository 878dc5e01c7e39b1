//! Snapshot file I/O.
//!
//! The snapshot is written to `<file>.tmp` next to the target, flushed to
//! disk, then renamed over the target. A reader therefore sees either the
//! previous complete snapshot or the new one, never a truncated mix.
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::models::Snapshot;
use crate::{Result, StoreError};

/// Load the snapshot at `path`. Returns `Ok(None)` if the file does not exist.
pub(crate) fn load(path: &Path) -> Result<Option<Snapshot>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut snapshot: Snapshot =
        serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            source: e,
        })?;
    snapshot.normalize();
    Ok(Some(snapshot))
}

/// Serialize the whole snapshot and atomically replace the file at `path`.
pub(crate) fn persist(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let encoded = serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tmp = tmp_path(path);
    let written = write_synced(&tmp, &encoded).and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!("Could not remove {}: {}", tmp.display(), cleanup);
            }
        }
        return Err(StoreError::io(path, e));
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        // Best-effort flush of the rename itself
        if let Ok(d) = File::open(dir) {
            let _ = d.sync_all();
        }
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Post, User};
    use roost_types::models::Tier;

    fn sample() -> Snapshot {
        let mut s = Snapshot::default();
        s.users.insert(
            1,
            User {
                id: 1,
                email: "a@x.com".into(),
                password_digest: "digest".into(),
                access_token: Some("acc".into()),
                refresh_token: None,
                refresh_revoked_at: Some(chrono::Utc::now()),
                access_revoked_at: None,
                tier: Tier::Upgraded,
            },
        );
        s.posts.insert(
            3,
            Post {
                id: 3,
                body: "hello".into(),
                author_id: 1,
            },
        );
        s.next_ids.users = 1;
        s.next_ids.posts = 3;
        s
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load(&tmp.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn test_persist_replaces_and_leaves_no_tmp() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("database.json");
        fs::write(&path, b"{\"users\":{},\"posts\":{}}").unwrap();

        let snapshot = sample();
        persist(&path, &snapshot).unwrap();

        assert_eq!(load(&path).unwrap().unwrap(), snapshot);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_legacy_file_without_counters() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("database.json");
        fs::write(
            &path,
            br#"{"users":{},"posts":{"7":{"id":7,"body":"x","author_id":1}}}"#,
        )
        .unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.next_ids.posts, 7);
        assert_eq!(loaded.next_ids.users, 0);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("database.json");
        fs::write(&path, b"{\"users\": {").unwrap();

        assert!(matches!(load(&path), Err(StoreError::Corrupt { .. })));
    }
}
