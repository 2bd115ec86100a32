//! Persistent store of minimized failing `Case`s, keyed by
//! `(operation, canonical-fingerprint)`, replayed before fresh Fuzzing
//! generation on the next run.
//!
//! Entries are written atomically (temp file + rename, see [`crate::atomic`])
//! under one directory per operation, guarded by a [`crate::atomic::DirLock`]
//! so concurrent workers don't corrupt the store. Staleness is decided by
//! [`crate::cache::fingerprint`]: an entry whose source schema file has
//! since changed (by content hash, not just mtime) is dropped rather than
//! replayed against a now-different contract.

use crate::atomic::{atomic_write_sync, DirLock};
use crate::cache::fingerprint::compute_content_hash;
use crate::case::Case;
use crate::error::Error;
use std::fs;
use std::path::PathBuf;

const ENTRY_EXTENSION: &str = "json";

pub struct Database {
    root: PathBuf,
    schema_fingerprint: String,
}

impl Database {
    /// Open (creating if absent) the database rooted at `root`, scoped to
    /// one loaded schema document's content hash.
    ///
    /// # Errors
    /// Returns [`Error::io_error`] if `root` cannot be created.
    pub fn open(root: impl Into<PathBuf>, schema_bytes: &[u8]) -> Result<Self, Error> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| Error::io_error(format!("failed to create database directory: {e}")))?;
        Ok(Self { root, schema_fingerprint: compute_content_hash(schema_bytes) })
    }

    fn operation_dir(&self, operation: &str) -> PathBuf {
        self.root.join(sanitize(operation))
    }

    /// Persist one failing `case`, overwriting any prior entry with the
    /// same fingerprint (a re-minimized, smaller reproduction of the same
    /// failure replaces the larger one it shrank from).
    ///
    /// # Errors
    /// Returns [`Error::io_error`] on any filesystem failure.
    pub fn store_failure(&self, case: &Case) -> Result<(), Error> {
        let dir = self.operation_dir(&case.operation);
        fs::create_dir_all(&dir).map_err(|e| Error::io_error(e.to_string()))?;
        let _lock = DirLock::acquire(&dir).map_err(|e| Error::io_error(e.to_string()))?;

        let entry = DatabaseEntry {
            schema_fingerprint: self.schema_fingerprint.clone(),
            case: case.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&entry)?;
        let path = dir.join(format!("{}.{ENTRY_EXTENSION}", case.fingerprint()));
        atomic_write_sync(&path, &bytes).map_err(|e| Error::io_error(e.to_string()))
    }

    /// Load every still-fresh stored failure for `operation`, dropping (and
    /// removing from disk) entries recorded against a different schema
    /// fingerprint.
    #[must_use]
    pub fn replay_candidates(&self, operation: &str) -> Vec<Case> {
        let dir = self.operation_dir(operation);
        let Ok(entries) = fs::read_dir(&dir) else { return Vec::new() };

        let mut cases = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Ok(bytes) = fs::read(&path) else { continue };
            let Ok(parsed) = serde_json::from_slice::<DatabaseEntry>(&bytes) else { continue };
            if parsed.schema_fingerprint != self.schema_fingerprint {
                let _ = fs::remove_file(&path);
                continue;
            }
            cases.push(parsed.case);
        }
        cases
    }

    /// Remove a stored failure once it's confirmed fixed (no longer
    /// reproduces), so it stops being replayed.
    ///
    /// # Errors
    /// Returns [`Error::io_error`] if the file exists but can't be removed.
    pub fn forget(&self, case: &Case) -> Result<(), Error> {
        let path = self.operation_dir(&case.operation).join(format!("{}.{ENTRY_EXTENSION}", case.fingerprint()));
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io_error(e.to_string())),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct DatabaseEntry {
    schema_fingerprint: String,
    case: Case,
}

fn sanitize(operation: &str) -> String {
    operation
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[must_use]
pub fn default_database_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("apitest")
        .join("examples")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{GenerationMeta, Mode, Phase};
    use indexmap::IndexMap;
    use serde_json::json;

    fn sample_case(operation: &str) -> Case {
        Case {
            operation: operation.to_string(),
            path_params: IndexMap::new(),
            query: IndexMap::new(),
            headers: IndexMap::new(),
            cookies: IndexMap::new(),
            body: Some(json!({"x": 1})),
            media_type: Some("application/json".into()),
            meta: GenerationMeta {
                phase: Phase::Fuzzing,
                mode: Mode::Negative,
                seed: Some(1),
                description: "test".into(),
                mutation: None,
            },
        }
    }

    #[test]
    fn stored_failure_is_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path(), b"schema-v1").unwrap();
        let case = sample_case("GET /items");
        db.store_failure(&case).unwrap();

        let replayed = db.replay_candidates("GET /items");
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].fingerprint(), case.fingerprint());
    }

    #[test]
    fn stale_schema_fingerprint_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let db_v1 = Database::open(dir.path(), b"schema-v1").unwrap();
        db_v1.store_failure(&sample_case("GET /items")).unwrap();

        let db_v2 = Database::open(dir.path(), b"schema-v2").unwrap();
        assert!(db_v2.replay_candidates("GET /items").is_empty());
    }

    #[test]
    fn forget_removes_stored_entry() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path(), b"schema-v1").unwrap();
        let case = sample_case("GET /items");
        db.store_failure(&case).unwrap();
        db.forget(&case).unwrap();
        assert!(db.replay_candidates("GET /items").is_empty());
    }
}
