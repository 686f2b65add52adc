use super::RestaurantStore;
use crate::domain::{PriceCategory, RestaurantRecord, RestaurantSummary};
use crate::error::{RecommenderError, Result};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredRestaurant {
    id: u64,
    record: RestaurantRecord,
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<StoredRestaurant>,
    next_id: u64,
}

/// In-memory restaurant table for development and testing.
///
/// `None` models a table that has not been created yet.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    table: Mutex<Option<Table>>,
    fail_inserts: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `insert_all` fail without writing anything.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, AtomicOrdering::SeqCst);
    }

    /// Snapshot of stored records in insertion order.
    pub fn records(&self) -> Result<Vec<RestaurantRecord>> {
        let table = self.lock()?;
        Ok(table
            .as_ref()
            .map(|t| t.rows.iter().map(|r| r.record.clone()).collect())
            .unwrap_or_default())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Table>>> {
        self.table.lock().map_err(|_| RecommenderError::Database {
            message: "in-memory store lock poisoned".to_string(),
        })
    }

    fn missing_table() -> RecommenderError {
        RecommenderError::Database {
            message: "no such table: restaurants".to_string(),
        }
    }
}

fn rating_desc_nulls_last(a: &StoredRestaurant, b: &StoredRestaurant) -> Ordering {
    let by_rating = match (a.record.rating, b.record.rating) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_rating.then(a.id.cmp(&b.id))
}

#[async_trait]
impl RestaurantStore for InMemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        let mut table = self.lock()?;
        if table.is_none() {
            *table = Some(Table::default());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.lock()?;
        let table = guard.as_mut().ok_or_else(Self::missing_table)?;
        debug!("Cleared {} restaurant rows", table.rows.len());
        table.rows.clear();
        Ok(())
    }

    async fn insert_all(&self, records: &[RestaurantRecord]) -> Result<usize> {
        let mut guard = self.lock()?;
        let table = guard.as_mut().ok_or_else(Self::missing_table)?;
        if self.fail_inserts.load(AtomicOrdering::SeqCst) {
            return Err(RecommenderError::Database {
                message: "injected insert failure".to_string(),
            });
        }
        for record in records {
            table.next_id += 1;
            let id = table.next_id;
            table.rows.push(StoredRestaurant {
                id,
                record: record.clone(),
            });
        }
        Ok(records.len())
    }

    async fn count(&self) -> Result<usize> {
        let guard = self.lock()?;
        let table = guard.as_ref().ok_or_else(Self::missing_table)?;
        Ok(table.rows.len())
    }

    async fn is_empty(&self) -> Result<bool> {
        let guard = self.lock()?;
        Ok(guard.as_ref().map_or(true, |t| t.rows.is_empty()))
    }

    async fn list_cities(&self) -> Result<Vec<String>> {
        let guard = self.lock()?;
        let table = guard.as_ref().ok_or_else(Self::missing_table)?;
        let cities: BTreeSet<String> = table.rows.iter().map(|r| r.record.city.clone()).collect();
        Ok(cities.into_iter().collect())
    }

    async fn find_restaurants(
        &self,
        city: &str,
        price_category: PriceCategory,
        limit: usize,
    ) -> Result<Vec<RestaurantSummary>> {
        let guard = self.lock()?;
        let table = guard.as_ref().ok_or_else(Self::missing_table)?;
        let mut matches: Vec<&StoredRestaurant> = table
            .rows
            .iter()
            .filter(|r| r.record.city == city && r.record.price_category == price_category)
            .collect();
        matches.sort_by(|a, b| rating_desc_nulls_last(a, b));
        Ok(matches
            .into_iter()
            .take(limit)
            .map(|r| RestaurantSummary::from(&r.record))
            .collect())
    }
}
