use async_trait::async_trait;

use crate::error::Result;

/// A single `column LIKE ?` select against one store.
///
/// The match type differs per store: the memory store returns whole rows,
/// the disk store returns the queried column's values flattened into one list.
#[async_trait]
pub trait PatternQuery: Send + Sync {
    type Match: Send;

    async fn select_like(
        &self,
        table: &str,
        column: &str,
        pattern: &str,
    ) -> Result<Vec<Self::Match>>;
}
