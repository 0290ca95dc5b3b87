use async_trait::async_trait;
use futures::lock::Mutex;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::{debug, info};

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::ident::IdentifierPolicy;
use crate::query::PatternQuery;
use crate::replicate::{replicate, ReplicationReport};
use crate::sqlite::{read_row, Row, SqlQuery};

/// Owned handle to one in-memory database.
///
/// The database lives as long as the handle. Operations take the connection
/// lock for their whole duration, so tasks sharing a handle run one at a time.
pub struct MemoryStore {
    conn: Mutex<Connection>,
    identifiers: IdentifierPolicy,
}

impl MemoryStore {
    pub fn open(identifiers: IdentifierPolicy) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| MirrorError::Open {
            target: ":memory:".to_string(),
            source,
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
            identifiers,
        })
    }

    /// `CREATE TABLE <name>(<attributes>)`.
    ///
    /// `attributes` is column-definition SQL and is spliced in unchecked.
    pub async fn create_table(&self, name: &str, attributes: &str) -> Result<()> {
        let table = self.identifiers.render(name)?;
        let conn = self.conn.lock().await;
        conn.execute(&format!("CREATE TABLE {table}({attributes})"), [])
            .map_err(|source| MirrorError::CreateTable {
                table: name.to_string(),
                source,
            })?;
        info!(table = name, "created in-memory table");
        Ok(())
    }

    /// Copy `source_table` from the disk database into `target_table` here.
    pub async fn replicate_from(
        &self,
        disk_path: &Path,
        source_table: &str,
        target_table: &str,
        config: &MirrorConfig,
    ) -> Result<ReplicationReport> {
        let mut conn = self.conn.lock().await;
        replicate(&mut conn, disk_path, source_table, target_table, config)
    }

    pub async fn row_count(&self, table: &str) -> Result<u64> {
        let rendered = self.identifiers.render(table)?;
        let conn = self.conn.lock().await;
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
}

#[async_trait]
impl PatternQuery for MemoryStore {
    type Match = Row;

    async fn select_like(&self, table: &str, column: &str, pattern: &str) -> Result<Vec<Row>> {
        let query = SqlQuery::new(format!(
            "SELECT * FROM {} WHERE {} LIKE ?",
            self.identifiers.render(table)?,
            self.identifiers.render(column)?
        ))
        .with_param(pattern);
        debug!(statement = %query.rendered(), "memory query");

        let fail = |source: rusqlite::Error| MirrorError::Query {
            table: table.to_string(),
            column: column.to_string(),
            source,
        };
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&query.statement).map_err(fail)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(query.params.iter()), |row| {
                read_row(row, width)
            })
            .map_err(fail)?
            .collect::<rusqlite::Result<Vec<Row>>>()
            .map_err(fail)?;
        debug!(matches = rows.len(), "memory query complete");
        Ok(rows)
    }
}
