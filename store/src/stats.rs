//! Aggregate views over the audit log for `tyr stats`.

use std::collections::BTreeMap;

use rusqlite::params;

use crate::{Result, Store};

/// Decision totals for an optional time window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub total: i64,
    pub allow: i64,
    pub deny: i64,
    pub abstain: i64,
    pub error: i64,
    pub cached: i64,
    /// Cache hits over total, 0.0 when the window is empty.
    pub cache_hit_rate: f64,
    /// Rows per provider, name-sorted. Rows with no provider are absent.
    pub per_provider: BTreeMap<String, i64>,
}

impl Stats {
    /// Allows are exactly the auto-approvals the hook granted.
    #[must_use]
    pub fn auto_approvals(&self) -> i64 {
        self.allow
    }
}

impl Store {
    /// Compute decision totals, optionally restricted to `since_ms`.
    pub fn stats(&self, since_ms: Option<i64>) -> Result<Stats> {
        let since = since_ms.unwrap_or(i64::MIN);

        let mut stats = self.conn().query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(decision = 'allow'), 0),
                    COALESCE(SUM(decision = 'deny'), 0),
                    COALESCE(SUM(decision = 'abstain'), 0),
                    COALESCE(SUM(decision = 'error'), 0),
                    COALESCE(SUM(cached), 0)
             FROM logs WHERE timestamp >= ?1",
            params![since],
            |row| {
                Ok(Stats {
                    total: row.get(0)?,
                    allow: row.get(1)?,
                    deny: row.get(2)?,
                    abstain: row.get(3)?,
                    error: row.get(4)?,
                    cached: row.get(5)?,
                    cache_hit_rate: 0.0,
                    per_provider: BTreeMap::new(),
                })
            },
        )?;

        if stats.total > 0 {
            stats.cache_hit_rate = stats.cached as f64 / stats.total as f64;
        }

        let mut stmt = self.conn().prepare(
            "SELECT provider, COUNT(*)
             FROM logs
             WHERE timestamp >= ?1 AND provider IS NOT NULL
             GROUP BY provider",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (provider, count) = row?;
            stats.per_provider.insert(provider, count);
        }

        Ok(stats)
    }
}
