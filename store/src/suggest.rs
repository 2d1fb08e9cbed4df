//! Mining the audit log for allow-rule candidates (`tyr suggest`).
//!
//! Only real steering decisions count: shadow and audit rows are
//! excluded. Filtering candidates against the currently-configured allow
//! patterns happens in the caller, which owns the rule store.

use rusqlite::params;

use crate::{Result, Store};

/// One frequently-allowed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// The canonical Bash command text.
    pub command: String,
    /// How many allow rows carried it.
    pub count: i64,
}

impl Store {
    /// Bash commands allowed at least `min_count` times in normal-mode
    /// runs, most frequent first. `cwd` narrows to one project
    /// (path-prefix safe).
    pub fn suggest(&self, min_count: i64, cwd: Option<&str>) -> Result<Vec<Suggestion>> {
        let mut sql = String::from(
            "SELECT tool_input, COUNT(*) AS uses
             FROM logs
             WHERE tool_name = 'Bash' AND decision = 'allow' AND mode IS NULL",
        );
        if cwd.is_some() {
            sql.push_str(" AND (cwd = ?2 OR substr(cwd, 1, length(?2) + 1) = ?2 || '/')");
        }
        sql.push_str(
            " GROUP BY tool_input
              HAVING uses >= ?1
              ORDER BY uses DESC, tool_input ASC",
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(Suggestion {
                command: row.get(0)?,
                count: row.get(1)?,
            })
        };
        let rows = match cwd {
            Some(cwd) => stmt.query_map(params![min_count, cwd], map_row)?,
            None => stmt.query_map(params![min_count], map_row)?,
        };
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }
}
