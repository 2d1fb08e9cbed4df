//! The append-only audit log and its verbose LLM side rows.

use rusqlite::{OptionalExtension, Row, params};

use tyr_types::record::{LlmLogEntry, LogDecision, LogEntry, RunMode};

use crate::{Result, Store};

/// Fields for one new audit row. `id` is assigned by the database.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub timestamp: i64,
    pub session_id: String,
    pub cwd: String,
    pub tool_name: String,
    pub tool_input: String,
    pub input: String,
    pub decision: LogDecision,
    pub provider: Option<String>,
    pub reason: Option<String>,
    pub duration_ms: i64,
    pub cached: bool,
    pub mode: Option<RunMode>,
}

/// Read-side filters. All default to "no constraint".
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Inclusive lower bound, milliseconds since epoch.
    pub since: Option<i64>,
    /// Inclusive upper bound.
    pub until: Option<i64>,
    pub decision: Option<LogDecision>,
    pub provider: Option<String>,
    /// Prefix match against the request cwd.
    pub cwd_prefix: Option<String>,
    /// Return only the newest N rows (still in ascending id order).
    pub last: Option<u32>,
}

impl Store {
    /// Append one audit row, returning its id.
    pub fn append_log(&mut self, entry: &NewLogEntry) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO logs
                 (timestamp, session_id, cwd, tool_name, tool_input, input,
                  decision, provider, reason, duration_ms, cached, mode)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                entry.timestamp,
                entry.session_id,
                entry.cwd,
                entry.tool_name,
                entry.tool_input,
                entry.input,
                entry.decision.as_str(),
                entry.provider,
                entry.reason,
                entry.duration_ms,
                i64::from(entry.cached),
                entry.mode.map(RunMode::as_str),
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Persist the LLM prompt and model for a verbose-logged decision.
    pub fn append_llm_log(&mut self, log_id: i64, prompt: &str, model: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO llm_logs (log_id, prompt, model) VALUES (?1, ?2, ?3)",
            params![log_id, prompt, model],
        )?;
        Ok(())
    }

    /// The verbose side row for a log entry, if one was written.
    pub fn llm_detail(&self, log_id: i64) -> Result<Option<LlmLogEntry>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT log_id, prompt, model FROM llm_logs WHERE log_id = ?1",
                [log_id],
                |row| {
                    Ok(LlmLogEntry {
                        log_id: row.get(0)?,
                        prompt: row.get(1)?,
                        model: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Query audit rows, oldest first.
    ///
    /// `filter.last` is fetched newest-first with a LIMIT and flipped
    /// back, so the caller always sees ascending ids.
    pub fn query_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let mut sql = String::from(
            "SELECT id, timestamp, session_id, cwd, tool_name, tool_input, input,
                    decision, provider, reason, duration_ms, cached, mode
             FROM logs",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(since) = filter.since {
            params.push(Box::new(since));
            clauses.push(format!("timestamp >= ?{}", params.len()));
        }
        if let Some(until) = filter.until {
            params.push(Box::new(until));
            clauses.push(format!("timestamp <= ?{}", params.len()));
        }
        if let Some(decision) = filter.decision {
            params.push(Box::new(decision.as_str().to_string()));
            clauses.push(format!("decision = ?{}", params.len()));
        }
        if let Some(provider) = &filter.provider {
            params.push(Box::new(provider.clone()));
            clauses.push(format!("provider = ?{}", params.len()));
        }
        if let Some(prefix) = &filter.cwd_prefix {
            params.push(Box::new(prefix.clone()));
            let n = params.len();
            clauses.push(format!("substr(cwd, 1, length(?{n})) = ?{n}"));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some(last) = filter.last {
            sql.push_str(" ORDER BY id DESC LIMIT ");
            sql.push_str(&last.to_string());
        } else {
            sql.push_str(" ORDER BY id ASC");
        }

        let mut stmt = self.conn().prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(AsRef::as_ref).collect();
        let mut rows: Vec<LogEntry> = stmt
            .query_map(refs.as_slice(), row_to_entry)?
            .collect::<std::result::Result<_, _>>()?;

        if filter.last.is_some() {
            rows.reverse();
        }
        Ok(rows)
    }

    /// Best-effort retention prune: delete rows older than `cutoff_ms`.
    /// LLM side rows follow their log row via the cascade.
    pub fn prune_logs(&mut self, cutoff_ms: i64) -> Result<usize> {
        Ok(self
            .conn()
            .execute("DELETE FROM logs WHERE timestamp < ?1", [cutoff_ms])?)
    }

    /// `tyr log clear`: drop every audit row.
    pub fn clear_logs(&mut self) -> Result<usize> {
        Ok(self.conn().execute("DELETE FROM logs", [])?)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    let decision: String = row.get(7)?;
    let mode: Option<String> = row.get(12)?;
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        session_id: row.get(2)?,
        cwd: row.get(3)?,
        tool_name: row.get(4)?,
        tool_input: row.get(5)?,
        input: row.get(6)?,
        decision: LogDecision::from_str_opt(&decision).unwrap_or(LogDecision::Error),
        provider: row.get(8)?,
        reason: row.get(9)?,
        duration_ms: row.get(10)?,
        cached: row.get::<_, i64>(11)? != 0,
        mode: mode.as_deref().and_then(RunMode::from_str_opt),
    })
}

/// Minimal valid entry for other modules' tests.
#[cfg(test)]
pub(crate) fn test_entry(cwd: &str) -> NewLogEntry {
    NewLogEntry {
        timestamp: 1_000,
        session_id: "session".to_string(),
        cwd: cwd.to_string(),
        tool_name: "Bash".to_string(),
        tool_input: "ls".to_string(),
        input: r#"{"command":"ls"}"#.to_string(),
        decision: LogDecision::Allow,
        provider: Some("chained-commands".to_string()),
        reason: None,
        duration_ms: 3,
        cached: false,
        mode: None,
    }
}
