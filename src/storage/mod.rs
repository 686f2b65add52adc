pub mod in_memory;
pub mod sqlite;

use crate::domain::{PriceCategory, RestaurantRecord, RestaurantSummary};
use crate::error::Result;
use async_trait::async_trait;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Destination for canonical restaurant records plus the read queries the
/// HTTP layer needs.
#[async_trait]
pub trait RestaurantStore: Send + Sync {
    /// Create the table if absent. Never touches existing rows.
    async fn ensure_schema(&self) -> Result<()>;

    /// Delete every row.
    async fn clear(&self) -> Result<()>;

    /// Insert all records in one transaction; either all land or none do.
    async fn insert_all(&self, records: &[RestaurantRecord]) -> Result<usize>;

    /// Full replace. The default clears and then inserts, so a failed insert
    /// leaves the table empty; stores with transactions override this to make
    /// the swap atomic.
    async fn replace_all(&self, records: &[RestaurantRecord]) -> Result<usize> {
        self.clear().await?;
        self.insert_all(records).await
    }

    async fn count(&self) -> Result<usize>;

    /// True when the table is empty or does not exist yet.
    async fn is_empty(&self) -> Result<bool>;

    /// Distinct cities, sorted.
    async fn list_cities(&self) -> Result<Vec<String>>;

    /// Restaurants in `city` and `price_category`, best rated first, unrated last.
    async fn find_restaurants(
        &self,
        city: &str,
        price_category: PriceCategory,
        limit: usize,
    ) -> Result<Vec<RestaurantSummary>>;
}
