use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::MirrorConfig;
use crate::disk::DiskStore;
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::query::PatternQuery;
use crate::replicate::ReplicationReport;
use crate::sqlite::{Row, Value};

/// Mirrors disk tables into one in-memory database.
///
/// The memory store is created with the mirror and dropped with it. Disk
/// databases are addressed by path and opened per call.
pub struct Mirror {
    memory: MemoryStore,
    config: MirrorConfig,
}

impl Mirror {
    pub fn new(config: MirrorConfig) -> Result<Self> {
        config.validate()?;
        let memory = MemoryStore::open(config.identifiers)?;
        info!(
            stride = config.stride,
            ceiling = config.ceiling,
            termination = ?config.termination,
            "in-memory database ready"
        );
        Ok(Self { memory, config })
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Handle for the database file at `path`, sharing this mirror's settings.
    pub fn disk(&self, path: impl Into<PathBuf>) -> DiskStore {
        DiskStore::new(path, self.config.identifiers).with_arity(self.config.arity)
    }

    pub async fn create_memory_table(&self, name: &str, attributes: &str) -> Result<()> {
        self.memory.create_table(name, attributes).await
    }

    /// Replicate `source_table` of `disk_path` into the memory table `target_table`.
    pub async fn load_from_disk(
        &self,
        disk_path: impl AsRef<Path>,
        source_table: &str,
        target_table: &str,
    ) -> Result<ReplicationReport> {
        self.memory
            .replicate_from(disk_path.as_ref(), source_table, target_table, &self.config)
            .await
    }

    pub async fn create_disk_index(
        &self,
        disk_path: impl AsRef<Path>,
        index: &str,
        table: &str,
        column: &str,
    ) -> Result<()> {
        self.disk(disk_path.as_ref())
            .create_index(index, table, column)
            .await
    }

    pub async fn select_from_memory(
        &self,
        table: &str,
        column: &str,
        pattern: &str,
    ) -> Result<Vec<Row>> {
        self.memory.select_like(table, column, pattern).await
    }

    pub async fn select_from_disk(
        &self,
        disk_path: impl AsRef<Path>,
        table: &str,
        column: &str,
        pattern: &str,
    ) -> Result<Vec<Value>> {
        self.disk(disk_path.as_ref())
            .select_like(table, column, pattern)
            .await
    }

    pub async fn write_to_disk(
        &self,
        disk_path: impl AsRef<Path>,
        table: &str,
        pairs: &[(Value, Value)],
    ) -> Result<usize> {
        self.disk(disk_path.as_ref()).write_pairs(table, pairs).await
    }
}
