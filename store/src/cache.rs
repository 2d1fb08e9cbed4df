//! The decision cache: memoised terminal verdicts partitioned by the
//! config fingerprint.

use rusqlite::{OptionalExtension, params};

use tyr_types::Verdict;
use tyr_types::record::CachedDecision;

use crate::{Result, Store};

/// Identity of one cached decision: which tool was asked to do what,
/// where. The config hash partitions matches on top of this key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub tool_name: String,
    pub tool_input: String,
    pub cwd: String,
}

impl Store {
    /// Look up a memoised verdict. Rows written under a different config
    /// hash are inert: they never match, and a later write replaces them.
    pub fn cache_lookup(&self, key: &CacheKey, config_hash: &str) -> Result<Option<CachedDecision>> {
        let row = self
            .conn()
            .query_row(
                "SELECT decision, provider, reason, config_hash, created_at
                 FROM cache
                 WHERE tool_name = ?1 AND tool_input = ?2 AND cwd = ?3 AND config_hash = ?4",
                params![key.tool_name, key.tool_input, key.cwd, config_hash],
                |row| {
                    let decision: String = row.get(0)?;
                    Ok(CachedDecision {
                        decision: Verdict::from_str_opt(&decision).unwrap_or(Verdict::Abstain),
                        provider: row.get(1)?,
                        reason: row.get(2)?,
                        config_hash: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        // A decode failure would surface as Abstain; the CHECK constraint
        // makes that unreachable, but filter defensively anyway.
        Ok(row.filter(|d| d.decision.is_terminal()))
    }

    /// Upsert a terminal decision. Abstains must never reach this point;
    /// they are filtered at the engine boundary and rejected here.
    pub fn cache_store(&mut self, key: &CacheKey, decision: &CachedDecision) -> Result<()> {
        debug_assert!(decision.decision.is_terminal());
        if !decision.decision.is_terminal() {
            return Ok(());
        }
        self.conn().execute(
            "INSERT INTO cache
                 (tool_name, tool_input, cwd, decision, provider, reason, config_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(tool_name, tool_input, cwd) DO UPDATE SET
                 decision = excluded.decision,
                 provider = excluded.provider,
                 reason = excluded.reason,
                 config_hash = excluded.config_hash,
                 created_at = excluded.created_at",
            params![
                key.tool_name,
                key.tool_input,
                key.cwd,
                decision.decision.as_str(),
                decision.provider,
                decision.reason,
                decision.config_hash,
                decision.created_at,
            ],
        )?;
        Ok(())
    }

    /// Garbage-collect rows stranded under superseded config hashes.
    pub fn cache_gc(&mut self, live_hash: &str) -> Result<usize> {
        Ok(self
            .conn()
            .execute("DELETE FROM cache WHERE config_hash != ?1", [live_hash])?)
    }

    /// Total cache rows, for `stats`.
    pub fn cache_size(&self) -> Result<i64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?)
    }
}
