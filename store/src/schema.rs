//! Schema bootstrap, version gate, and the migration ladder.
//!
//! `_meta.schema_version` gates every open. Historical tables (`logs`,
//! `llm_logs`) may only ever be extended by a migration; the `cache`
//! table holds nothing durable and may be dropped and recreated freely.

use rusqlite::{Connection, OptionalExtension};

use crate::{Result, StoreError};

/// Version written by a fresh install and expected by this build.
pub const CURRENT_SCHEMA_VERSION: i64 = 3;

/// Full current schema, used for first-time installs.
const SCHEMA: &str = r"
    CREATE TABLE _meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE logs (
        id INTEGER PRIMARY KEY,
        timestamp INTEGER NOT NULL,
        session_id TEXT NOT NULL,
        cwd TEXT NOT NULL,
        tool_name TEXT NOT NULL,
        tool_input TEXT NOT NULL,
        input TEXT NOT NULL,
        decision TEXT NOT NULL CHECK (decision IN ('allow', 'deny', 'abstain', 'error')),
        provider TEXT,
        reason TEXT,
        duration_ms INTEGER NOT NULL DEFAULT 0,
        cached INTEGER NOT NULL DEFAULT 0,
        mode TEXT CHECK (mode IN ('shadow', 'audit'))
    );

    CREATE INDEX idx_logs_timestamp ON logs(timestamp);
    CREATE INDEX idx_logs_session ON logs(session_id);
    CREATE INDEX idx_logs_suggest ON logs(decision, mode, tool_input);

    CREATE TABLE llm_logs (
        id INTEGER PRIMARY KEY,
        log_id INTEGER NOT NULL REFERENCES logs(id) ON DELETE CASCADE,
        prompt TEXT NOT NULL,
        model TEXT NOT NULL
    );

    CREATE INDEX idx_llm_logs_log_id ON llm_logs(log_id);

    CREATE TABLE cache (
        tool_name TEXT NOT NULL,
        tool_input TEXT NOT NULL,
        cwd TEXT NOT NULL,
        decision TEXT NOT NULL CHECK (decision IN ('allow', 'deny')),
        provider TEXT NOT NULL,
        reason TEXT,
        config_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (tool_name, tool_input, cwd)
    );
";

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

/// Ordered unit migrations. Entry `version` is the schema version the
/// database holds after the entry runs.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 2,
        description: "record LLM prompt and model next to verbose log rows",
        sql: r"
            CREATE TABLE llm_logs (
                id INTEGER PRIMARY KEY,
                log_id INTEGER NOT NULL REFERENCES logs(id) ON DELETE CASCADE,
                prompt TEXT NOT NULL,
                model TEXT NOT NULL
            );
            CREATE INDEX idx_llm_logs_log_id ON llm_logs(log_id);
        ",
    },
    Migration {
        version: 3,
        description: "add run modes and the suggestion index; key the cache by config hash",
        sql: r"
            ALTER TABLE logs ADD COLUMN mode TEXT CHECK (mode IN ('shadow', 'audit'));
            CREATE INDEX idx_logs_suggest ON logs(decision, mode, tool_input);
            DROP TABLE IF EXISTS cache;
            CREATE TABLE cache (
                tool_name TEXT NOT NULL,
                tool_input TEXT NOT NULL,
                cwd TEXT NOT NULL,
                decision TEXT NOT NULL CHECK (decision IN ('allow', 'deny')),
                provider TEXT NOT NULL,
                reason TEXT,
                config_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (tool_name, tool_input, cwd)
            );
        ",
    },
];

/// Enforce the version gate on an open connection.
///
/// A database without a `_meta` table is a first-time install and gets
/// the full current schema in one transaction. Anything older than
/// [`CURRENT_SCHEMA_VERSION`] is rejected toward `tyr db migrate`;
/// anything newer is rejected toward upgrading tyr.
pub(crate) fn ensure_current(db: &Connection) -> Result<()> {
    if !meta_table_exists(db)? {
        bootstrap(db)?;
        return Ok(());
    }
    let found = read_version(db)?;
    if found < CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooOld {
            found,
            current: CURRENT_SCHEMA_VERSION,
        });
    }
    if found > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            current: CURRENT_SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// Run pending migrations, newest last, each inside the one shared
/// transaction so a failure leaves the database untouched.
pub(crate) fn migrate(db: &Connection) -> Result<usize> {
    if !meta_table_exists(db)? {
        bootstrap(db)?;
        return Ok(0);
    }
    let found = read_version(db)?;
    if found > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            current: CURRENT_SCHEMA_VERSION,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > found).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    db.execute_batch("BEGIN")?;
    let result = (|| -> Result<()> {
        for migration in &pending {
            tracing::info!(
                version = migration.version,
                "Applying migration: {}",
                migration.description
            );
            db.execute_batch(migration.sql)?;
            write_version(db, migration.version)?;
        }
        Ok(())
    })();
    match result {
        Ok(()) => {
            db.execute_batch("COMMIT")?;
            Ok(pending.len())
        }
        Err(e) => {
            let _ = db.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

pub(crate) fn read_version(db: &Connection) -> Result<i64> {
    let value: Option<String> = db
        .query_row(
            "SELECT value FROM _meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn write_version(db: &Connection, version: i64) -> Result<()> {
    db.execute(
        "INSERT INTO _meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [version.to_string()],
    )?;
    Ok(())
}

fn meta_table_exists(db: &Connection) -> Result<bool> {
    let found: Option<String> = db
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_meta'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn bootstrap(db: &Connection) -> Result<()> {
    db.execute_batch("BEGIN")?;
    let result = (|| -> Result<()> {
        db.execute_batch(SCHEMA)?;
        write_version(db, CURRENT_SCHEMA_VERSION)?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            db.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            let _ = db.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}
