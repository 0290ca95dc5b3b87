use thiserror::Error;

/// Errors raised by the mirror, one variant per kind of call site.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("failed to open {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create table {table}: {source}")]
    CreateTable {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("replicating {source_table} into {target} failed: {source}")]
    Replication {
        source_table: String,
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create index {index} on {table}({column}): {source}")]
    Index {
        index: String,
        table: String,
        column: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("query on {table}.{column} failed: {source}")]
    Query {
        table: String,
        column: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot shape {len} values into key/value pairs: length is odd")]
    Shape { len: usize },

    #[error("write to {table} failed: {source}")]
    Write {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("{table} expects {expected} values per row, got {actual}")]
    Arity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MirrorError {
    /// Short label of the operation that failed.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::CreateTable { .. } => "create_table",
            Self::Replication { .. } => "replication",
            Self::Index { .. } => "create_index",
            Self::Query { .. } => "query",
            Self::Shape { .. } => "shape",
            Self::Write { .. } => "write",
            Self::InvalidIdentifier(_) => "identifier",
            Self::Arity { .. } => "arity",
            Self::Config(_) | Self::Io(_) | Self::Json(_) => "config",
        }
    }
}

pub type Result<T, E = MirrorError> = std::result::Result<T, E>;
