//! Chunked disk-to-memory replication.
//!
//! The disk database is attached to the destination connection and the
//! source table is scanned in contiguous row-id windows `[low, up)` of a fixed
//! stride. Each window is copied in its own transaction, so a failure rolls
//! back only the window in flight; windows already committed stay in place.
//! The attached database is detached afterwards whether or not the copy
//! succeeded.

use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::sqlite::{positional_insert, read_row};

/// When the replication loop stops scanning.
///
/// Every mode is bounded by the configured ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Scan every window below the ceiling, even past the last row.
    Ceiling,
    /// Stop after the first window that copies nothing. A gap in row-ids as
    /// wide as the stride ends the scan early.
    EmptyWindow,
    /// Read `max(rowid)` up front and stop once a window starts past it.
    #[default]
    MaxRowid,
}

/// Row-id range `low <= rowid < up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub low: i64,
    pub up: i64,
}

/// Contiguous windows from 0 up to `ceiling`, the last one clamped.
#[derive(Debug, Clone)]
pub struct Windows {
    next_low: Option<i64>,
    stride: i64,
    ceiling: i64,
}

impl Windows {
    pub fn new(stride: i64, ceiling: i64) -> Self {
        Self {
            next_low: (stride > 0).then_some(0),
            stride,
            ceiling,
        }
    }
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let low = self.next_low?;
        if low >= self.ceiling {
            self.next_low = None;
            return None;
        }
        let up = low.saturating_add(self.stride).min(self.ceiling);
        self.next_low = Some(up);
        Some(Window { low, up })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplicationReport {
    pub windows_scanned: u64,
    pub non_empty_windows: u64,
    pub rows_copied: u64,
}

struct Plan<'a> {
    source_table: &'a str,
    target_table: &'a str,
    select_sql: String,
    insert_sql: String,
    max_rowid_sql: String,
}

impl Plan<'_> {
    fn fail(&self, source: rusqlite::Error) -> MirrorError {
        MirrorError::Replication {
            source_table: self.source_table.to_string(),
            target: self.target_table.to_string(),
            source,
        }
    }
}

/// Copy every row of `source_table` in the database at `disk_path` into
/// `target_table` on `conn`.
///
/// The target table must already exist and take `config.arity` values per row.
pub fn replicate(
    conn: &mut Connection,
    disk_path: &Path,
    source_table: &str,
    target_table: &str,
    config: &MirrorConfig,
) -> Result<ReplicationReport> {
    config.validate()?;
    // Validated as a plain identifier by `MirrorConfig::validate`.
    let alias = config.attach_alias.as_str();
    let source = format!("{}.{}", alias, config.identifiers.render(source_table)?);
    let target = config.identifiers.render(target_table)?;
    let plan = Plan {
        source_table,
        target_table,
        select_sql: format!("SELECT * FROM {source} WHERE rowid >= ?1 AND rowid < ?2"),
        insert_sql: positional_insert(&target, config.arity),
        max_rowid_sql: format!("SELECT max(rowid) FROM {source}"),
    };

    info!(
        disk = %disk_path.display(),
        source = source_table,
        target = target_table,
        "reading db into ram"
    );
    // Resolve the target before attaching: once the disk is attached, an
    // unqualified name missing from this connection would bind to the disk copy.
    conn.prepare(&plan.insert_sql).map_err(|e| plan.fail(e))?;
    conn.execute(
        &format!("ATTACH DATABASE ?1 AS {alias}"),
        params![disk_path.to_string_lossy()],
    )
    .map_err(|e| plan.fail(e))?;

    let outcome = copy_windows(conn, &plan, config);
    let detached = conn.execute_batch(&format!("DETACH DATABASE {alias}"));
    let report = outcome?;
    detached.map_err(|e| plan.fail(e))?;

    info!(
        rows = report.rows_copied,
        windows = report.windows_scanned,
        "replication complete"
    );
    Ok(report)
}

fn copy_windows(
    conn: &mut Connection,
    plan: &Plan<'_>,
    config: &MirrorConfig,
) -> Result<ReplicationReport> {
    let mut report = ReplicationReport::default();

    let last_rowid = match config.termination {
        Termination::MaxRowid => {
            let max: Option<i64> = conn
                .query_row(&plan.max_rowid_sql, [], |row| row.get(0))
                .map_err(|e| plan.fail(e))?;
            match max {
                Some(max) => Some(max),
                None => {
                    debug!(source = plan.source_table, "source table is empty");
                    return Ok(report);
                }
            }
        }
        Termination::Ceiling | Termination::EmptyWindow => None,
    };

    for window in Windows::new(config.stride, config.ceiling) {
        if last_rowid.is_some_and(|last| window.low > last) {
            break;
        }
        let copied = copy_window(conn, plan, window, config.arity)?;
        report.windows_scanned += 1;
        if copied > 0 {
            report.non_empty_windows += 1;
            report.rows_copied += copied;
        }
        debug!(low = window.low, up = window.up, copied, "window committed");
        if copied == 0 && config.termination == Termination::EmptyWindow {
            break;
        }
    }
    Ok(report)
}

fn copy_window(
    conn: &mut Connection,
    plan: &Plan<'_>,
    window: Window,
    arity: usize,
) -> Result<u64> {
    let tx = conn.transaction().map_err(|e| plan.fail(e))?;
    let copied = {
        let mut select = tx.prepare(&plan.select_sql).map_err(|e| plan.fail(e))?;
        let width = select.column_count();
        if width != arity {
            return Err(MirrorError::Arity {
                table: plan.source_table.to_string(),
                expected: arity,
                actual: width,
            });
        }
        let mut insert = tx.prepare(&plan.insert_sql).map_err(|e| plan.fail(e))?;
        let mut rows = select
            .query(params![window.low, window.up])
            .map_err(|e| plan.fail(e))?;
        let mut copied = 0u64;
        while let Some(row) = rows.next().map_err(|e| plan.fail(e))? {
            let values = read_row(row, width).map_err(|e| plan.fail(e))?;
            insert
                .execute(params_from_iter(values.iter()))
                .map_err(|e| plan.fail(e))?;
            copied += 1;
        }
        copied
    };
    tx.commit().map_err(|e| plan.fail(e))?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_cover_the_ceiling() {
        let windows: Vec<Window> = Windows::new(50_000, 20_000_000).collect();
        assert_eq!(windows.len(), 400);
        assert_eq!(windows[0], Window { low: 0, up: 50_000 });
        assert_eq!(
            windows.last(),
            Some(&Window {
                low: 19_950_000,
                up: 20_000_000
            })
        );
    }

    #[test]
    fn windows_are_contiguous_and_clamped() {
        let windows: Vec<Window> = Windows::new(30, 100).collect();
        assert_eq!(
            windows,
            vec![
                Window { low: 0, up: 30 },
                Window { low: 30, up: 60 },
                Window { low: 60, up: 90 },
                Window { low: 90, up: 100 },
            ]
        );
        for pair in windows.windows(2) {
            assert!(pair[0].low < pair[0].up);
            assert_eq!(pair[0].up, pair[1].low);
        }
    }

    #[test]
    fn non_positive_stride_yields_nothing() {
        assert_eq!(Windows::new(0, 100).count(), 0);
        assert_eq!(Windows::new(-5, 100).count(), 0);
    }

    #[test]
    fn ceiling_below_stride_is_one_window() {
        let windows: Vec<Window> = Windows::new(50_000, 10).collect();
        assert_eq!(windows, vec![Window { low: 0, up: 10 }]);
    }
}
