//! Process-wide registry of shared embedded-KV handles.
//!
//! The disk provider and disk worker legitimately target the same on-disk
//! file. `open`/`close` here mirror a refcounted singleton: the first
//! `open(path)` opens the database, every subsequent call with the same
//! path returns the existing handle and bumps a refcount, and `close`
//! decrements it, closing the underlying database only once no callers
//! remain. Both operations serialize on a single mutex.

pub mod timekey;

use once_cell::sync::Lazy;
use sled::Db;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },
    #[error("failed to open bucket {bucket}: {source}")]
    Bucket {
        bucket: String,
        #[source]
        source: sled::Error,
    },
    #[error(transparent)]
    Sled(#[from] sled::Error),
}

struct Holder {
    db: Arc<Db>,
    users: usize,
}

static CONTAINER: Lazy<Mutex<HashMap<PathBuf, Holder>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// A refcounted handle to a shared database. Each call to [`open`] must be
/// paired with exactly one call to [`close`]; dropping the handle's `Arc`
/// alone does not release it from the registry.
#[derive(Clone)]
pub struct Handle {
    pub path: PathBuf,
    pub db: Arc<Db>,
}

/// Open (or attach to an already-open) database at `path`, incrementing its
/// refcount.
pub fn open(path: impl AsRef<Path>) -> Result<Handle, DatabaseError> {
    let path = path.as_ref().to_path_buf();
    let mut dbs = CONTAINER.lock().unwrap();

    if let Some(holder) = dbs.get_mut(&path) {
        holder.users += 1;
        return Ok(Handle {
            path,
            db: holder.db.clone(),
        });
    }

    let db = sled::open(&path).map_err(|source| DatabaseError::Open {
        path: path.clone(),
        source,
    })?;
    let db = Arc::new(db);
    dbs.insert(
        path.clone(),
        Holder {
            db: db.clone(),
            users: 1,
        },
    );
    tracing::debug!(path = %path.display(), "opened database");
    Ok(Handle { path, db })
}

/// Decrement the refcount for `handle`'s path; closes and removes the
/// shared database once no users remain.
pub fn close(handle: &Handle) -> Result<(), DatabaseError> {
    let mut dbs = CONTAINER.lock().unwrap();
    if let Some(holder) = dbs.get_mut(&handle.path) {
        holder.users = holder.users.saturating_sub(1);
        if holder.users == 0 {
            dbs.remove(&handle.path);
            tracing::debug!(path = %handle.path.display(), "closed database");
        }
    }
    Ok(())
}

/// Number of live handles outstanding for `path`. Exposed for tests.
pub fn refcount(path: impl AsRef<Path>) -> usize {
    CONTAINER
        .lock()
        .unwrap()
        .get(path.as_ref())
        .map(|h| h.users)
        .unwrap_or(0)
}

/// Write raw job bytes into `bucket` under `key`, creating the bucket (a
/// sled tree, playing the role of a bolt bucket) if it does not exist.
pub fn write_job(db: &Db, bucket: &str, key: &[u8], data: &[u8]) -> Result<(), DatabaseError> {
    let tree = db.open_tree(bucket).map_err(|source| DatabaseError::Bucket {
        bucket: bucket.to_string(),
        source,
    })?;
    tree.insert(key, data)?;
    tree.flush()?;
    Ok(())
}

/// Read raw job bytes from `bucket` at `key`.
pub fn read_job(db: &Db, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, DatabaseError> {
    let tree = db.open_tree(bucket).map_err(|source| DatabaseError::Bucket {
        bucket: bucket.to_string(),
        source,
    })?;
    Ok(tree.get(key)?.map(|ivec| ivec.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refcounted_open_close_leaves_registry_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");

        let a = open(&path).unwrap();
        let b = open(&path).unwrap();
        assert_eq!(refcount(&path), 2);
        assert!(Arc::ptr_eq(&a.db, &b.db));

        close(&a).unwrap();
        assert_eq!(refcount(&path), 1);
        close(&b).unwrap();
        assert_eq!(refcount(&path), 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let handle = open(dir.path().join("jobs.db")).unwrap();

        write_job(&handle.db, "job_list", b"2026-01-01T00:00:00Z#abc", b"hello").unwrap();
        let got = read_job(&handle.db, "job_list", b"2026-01-01T00:00:00Z#abc").unwrap();

        assert_eq!(got, Some(b"hello".to_vec()));
        close(&handle).unwrap();
    }
}
