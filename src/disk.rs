use async_trait::async_trait;
use rusqlite::types::ToSql;
use rusqlite::{params_from_iter, Connection};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::DEFAULT_ARITY;
use crate::error::{MirrorError, Result};
use crate::ident::IdentifierPolicy;
use crate::query::PatternQuery;
use crate::sqlite::{open_disk, positional_insert, read_row, Row, SqlQuery, Value};

/// A database file on disk.
///
/// Holds no connection: every operation opens the file, does its work and
/// closes it again before returning.
#[derive(Debug, Clone)]
pub struct DiskStore {
    path: PathBuf,
    identifiers: IdentifierPolicy,
    arity: usize,
}

impl DiskStore {
    pub fn new(path: impl Into<PathBuf>, identifiers: IdentifierPolicy) -> Self {
        Self {
            path: path.into(),
            identifiers,
            arity: DEFAULT_ARITY,
        }
    }

    /// Values per row expected by [`DiskStore::write_rows`].
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    /// `CREATE INDEX IF NOT EXISTS <index> ON <table>(<column>)`.
    pub async fn create_index(&self, index: &str, table: &str, column: &str) -> Result<()> {
        let sql = self.index_statement(index, table, column)?;
        let conn = open_disk(&self.path)?;
        execute_index(&conn, &sql, index, table, column)
    }

    /// Insert every `(key, value)` pair as a two-column row, all or nothing.
    pub async fn write_pairs(&self, table: &str, pairs: &[(Value, Value)]) -> Result<usize> {
        let rows: Vec<[&Value; 2]> = pairs.iter().map(|(k, v)| [k, v]).collect();
        self.insert_batch(table, 2, &rows)
    }

    /// Insert rows of the configured arity, all or nothing.
    pub async fn write_rows(&self, table: &str, rows: &[Row]) -> Result<usize> {
        self.insert_batch(table, self.arity, rows)
    }

    pub async fn row_count(&self, table: &str) -> Result<u64> {
        let rendered = self.identifiers.render(table)?;
        let conn = open_disk(&self.path)?;
        let count: i64 = conn
            .query_row(&format!("SELECT count(*) FROM {rendered}"), [], |row| {
                row.get(0)
            })
            .map_err(|source| MirrorError::Query {
                table: table.to_string(),
                column: "count(*)".to_string(),
                source,
            })?;
        Ok(count.unsigned_abs())
    }

    fn index_statement(&self, index: &str, table: &str, column: &str) -> Result<String> {
        Ok(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({})",
            self.identifiers.render(index)?,
            self.identifiers.render(table)?,
            self.identifiers.render(column)?
        ))
    }

    fn insert_batch<R, T>(&self, table: &str, arity: usize, rows: &[R]) -> Result<usize>
    where
        R: AsRef<[T]>,
        T: ToSql,
    {
        let target = self.identifiers.render(table)?;
        if let Some(actual) = rows
            .iter()
            .map(|row| row.as_ref().len())
            .find(|&len| len != arity)
        {
            return Err(MirrorError::Arity {
                table: table.to_string(),
                expected: arity,
                actual,
            });
        }
        if rows.is_empty() {
            return Ok(0);
        }

        info!(db = %self.path.display(), table, rows = rows.len(), "writing to database");
        let fail = |source: rusqlite::Error| MirrorError::Write {
            table: table.to_string(),
            source,
        };
        let mut conn = open_disk(&self.path)?;
        let tx = conn.transaction().map_err(fail)?;
        {
            let mut insert = tx
                .prepare(&positional_insert(&target, arity))
                .map_err(fail)?;
            for row in rows {
                insert
                    .execute(params_from_iter(row.as_ref().iter()))
                    .map_err(fail)?;
            }
        }
        tx.commit().map_err(fail)?;
        info!(table, "write complete");
        Ok(rows.len())
    }
}

#[async_trait]
impl PatternQuery for DiskStore {
    type Match = Value;

    /// Indexes `column` first, then returns only that column's matching values.
    async fn select_like(&self, table: &str, column: &str, pattern: &str) -> Result<Vec<Value>> {
        let index = derived_index_name(table, column);
        let index_sql = self.index_statement(&index, table, column)?;
        let column_sql = self.identifiers.render(column)?;
        let query = SqlQuery::new(format!(
            "SELECT {column_sql} FROM {} WHERE {column_sql} LIKE ?",
            self.identifiers.render(table)?
        ))
        .with_param(pattern);

        let conn = open_disk(&self.path)?;
        execute_index(&conn, &index_sql, &index, table, column)?;
        debug!(statement = %query.rendered(), "disk query");

        let fail = |source: rusqlite::Error| MirrorError::Query {
            table: table.to_string(),
            column: column.to_string(),
            source,
        };
        let mut stmt = conn.prepare(&query.statement).map_err(fail)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(query.params.iter()), |row| {
                read_row(row, width)
            })
            .map_err(fail)?
            .collect::<rusqlite::Result<Vec<Row>>>()
            .map_err(fail)?;
        Ok(rows.into_iter().flatten().collect())
    }
}

/// `idx_<table length>_<table>_<column>`. The length prefix keeps names
/// distinct when table or column contain underscores.
pub fn derived_index_name(table: &str, column: &str) -> String {
    format!("idx_{}_{table}_{column}", table.len())
}

fn execute_index(conn: &Connection, sql: &str, index: &str, table: &str, column: &str) -> Result<()> {
    info!(index, table, column, "indexing");
    conn.execute(sql, []).map_err(|source| MirrorError::Index {
        index: index.to_string(),
        table: table.to_string(),
        column: column.to_string(),
        source,
    })?;
    info!(index, "index complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_index_names_do_not_collide() {
        assert_eq!(derived_index_name("pairs", "a"), "idx_5_pairs_a");
        assert_ne!(derived_index_name("a", "b_c"), derived_index_name("a_b", "c"));
    }
}
