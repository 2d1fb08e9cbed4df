//! SQLite-backed persistence: the audit log, the decision cache, and the
//! schema version gate.
//!
//! One database file holds everything. Concurrent Tyr processes share it
//! through WAL mode and a generous busy timeout; within a process the
//! [`Store`] handle is passed explicitly so the hot path stays testable.

mod cache;
mod logs;
mod schema;
mod stats;
mod suggest;

pub use cache::CacheKey;
pub use logs::{LogFilter, NewLogEntry};
pub use schema::CURRENT_SCHEMA_VERSION;
pub use stats::Stats;
pub use suggest::Suggestion;

use std::path::Path;

use rusqlite::Connection;

/// Milliseconds SQLite waits on a locked database before giving up.
const BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(
        "database schema version {found} is older than {current}; run `tyr db migrate`"
    )]
    SchemaTooOld { found: i64, current: i64 },
    #[error(
        "database schema version {found} is newer than this tyr understands ({current}); upgrade tyr"
    )]
    SchemaTooNew { found: i64, current: i64 },
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Open handle to the Tyr database.
pub struct Store {
    db: Connection,
}

impl Store {
    /// Open (or create) the database at `path`, enforcing the schema
    /// version gate.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        let db = Connection::open(path)?;
        tighten_permissions(path);
        Self::initialize(db)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch(&format!(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout={BUSY_TIMEOUT_MS}; PRAGMA foreign_keys=ON;"
        ))?;
        schema::ensure_current(&db)?;
        Ok(Self { db })
    }

    /// Apply any pending migrations (`tyr db migrate`). Returns the number
    /// applied; zero means the database was already current.
    pub fn migrate(path: impl AsRef<Path>) -> Result<usize> {
        let db = Connection::open(path.as_ref())?;
        db.execute_batch(&format!(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout={BUSY_TIMEOUT_MS}; PRAGMA foreign_keys=ON;"
        ))?;
        schema::migrate(&db)
    }

    /// Rewrite a project path prefix across logs and cache rows
    /// (`tyr db rename`). Prefix-safe: `/a` never rewrites `/abc`.
    pub fn rename_cwd(&mut self, old: &str, new: &str) -> Result<usize> {
        let tx = self.db.transaction()?;
        let mut changed = 0;
        changed += tx.execute(
            "UPDATE logs
             SET cwd = ?2 || substr(cwd, length(?1) + 1)
             WHERE cwd = ?1 OR substr(cwd, 1, length(?1) + 1) = ?1 || '/'",
            rusqlite::params![old, new],
        )?;
        changed += tx.execute(
            "UPDATE OR REPLACE cache
             SET cwd = ?2 || substr(cwd, length(?1) + 1)
             WHERE cwd = ?1 OR substr(cwd, 1, length(?1) + 1) = ?1 || '/'",
            rusqlite::params![old, new],
        )?;
        tx.commit()?;
        Ok(changed)
    }

    /// The schema version currently recorded in `_meta`.
    pub fn schema_version(&self) -> Result<i64> {
        schema::read_version(&self.db)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.db
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.db
    }
}

/// Owner-only permissions on the database file, matching the sensitivity
/// of what lands in it (full command lines).
fn tighten_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
            tracing::debug!(path = %path.display(), "Failed to tighten db permissions: {e}");
        }
        for suffix in ["-wal", "-shm"] {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
                continue;
            };
            let sidecar = path.with_file_name(format!("{name}{suffix}"));
            if sidecar.exists() {
                let _ = std::fs::set_permissions(
                    &sidecar,
                    std::fs::Permissions::from_mode(0o600),
                );
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

#[cfg(test)]
mod tests {
    use super::Store;
    use tyr_types::Verdict;
    use tyr_types::record::CachedDecision;

    #[test]
    fn open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("tyr.db");
        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.schema_version().unwrap(), super::CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn rename_rewrites_prefix_safely() {
        let mut store = Store::open_in_memory().unwrap();
        for cwd in ["/old", "/old/sub", "/older/project"] {
            let entry = crate::logs::test_entry(cwd);
            store.append_log(&entry).unwrap();
        }
        store
            .cache_store(
                &crate::CacheKey {
                    tool_name: "Bash".into(),
                    tool_input: "ls".into(),
                    cwd: "/old/sub".into(),
                },
                &CachedDecision {
                    decision: Verdict::Allow,
                    provider: "chained-commands".into(),
                    reason: None,
                    config_hash: "h1".into(),
                    created_at: 1,
                },
            )
            .unwrap();

        let changed = store.rename_cwd("/old", "/new").unwrap();
        assert_eq!(changed, 3);

        let cwds: Vec<String> = store
            .query_logs(&crate::LogFilter::default())
            .unwrap()
            .into_iter()
            .map(|e| e.cwd)
            .collect();
        assert!(cwds.contains(&"/new".to_string()));
        assert!(cwds.contains(&"/new/sub".to_string()));
        // Sibling directory sharing the character prefix is untouched.
        assert!(cwds.contains(&"/older/project".to_string()));

        let hit = store
            .cache_lookup(
                &crate::CacheKey {
                    tool_name: "Bash".into(),
                    tool_input: "ls".into(),
                    cwd: "/new/sub".into(),
                },
                "h1",
            )
            .unwrap();
        assert!(hit.is_some());
    }
}
