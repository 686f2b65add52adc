use crate::domain::{IngestReport, RestaurantRecord};
use crate::error::Result;
use crate::metrics as m;
use crate::source::SourceProvider;
use crate::storage::RestaurantStore;
use crate::transform::transform_all;
use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Full-replace ingest: fetch, transform, then swap the destination contents.
///
/// The source is fully fetched and transformed before the destination is
/// touched, so an unreachable dataset leaves previously loaded rows in place.
/// Runs through the same workflow are serialized.
pub struct IngestWorkflow {
    source: Arc<dyn SourceProvider>,
    store: Arc<dyn RestaurantStore>,
    run_lock: Mutex<()>,
}

impl std::fmt::Debug for IngestWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestWorkflow")
            .field("source", &self.source.source_id())
            .field("store", &"<Arc<dyn RestaurantStore>>")
            .finish()
    }
}

impl IngestWorkflow {
    pub fn new(source: Arc<dyn SourceProvider>, store: Arc<dyn RestaurantStore>) -> Self {
        Self {
            source,
            store,
            run_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RestaurantStore> {
        &self.store
    }

    /// Run one ingest and report `(processed, skipped, inserted)` counts.
    #[instrument(skip(self), fields(source_id = %self.source.source_id()))]
    pub async fn run(&self) -> Result<IngestReport> {
        let _guard = self.run_lock.lock().await;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let t_run = std::time::Instant::now();
        let source_id = self.source.source_id().to_string();
        counter!(m::INGEST_RUNS, "source" => source_id.clone()).increment(1);
        info!(%run_id, "Starting ingest");

        // Schema creation is non-destructive, so it may precede the fetch.
        self.store.ensure_schema().await?;

        let rows = self.source.fetch_records().await?;
        info!("Fetched {} raw rows", rows.len());

        let outcome = transform_all(&rows);
        drop(rows);
        let content_digest = content_digest(&outcome.records)?;

        if outcome.records.is_empty() {
            warn!("No records to insert.");
        }
        let inserted = self.store.replace_all(&outcome.records).await?;

        counter!(m::ROWS_PROCESSED, "source" => source_id.clone()).increment(outcome.processed as u64);
        counter!(m::ROWS_SKIPPED, "source" => source_id.clone()).increment(outcome.skipped as u64);
        counter!(m::ROWS_INSERTED, "source" => source_id.clone()).increment(inserted as u64);
        histogram!(m::INGEST_DURATION, "source" => source_id.clone())
            .record(t_run.elapsed().as_secs_f64());

        info!(
            "Rows processed: {}, skipped: {}, inserted: {}",
            outcome.processed, outcome.skipped, inserted
        );

        Ok(IngestReport {
            run_id,
            source_id,
            processed: outcome.processed,
            skipped: outcome.skipped,
            inserted,
            content_digest,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// True when nothing has been ingested yet (missing table included).
    pub async fn is_destination_empty(&self) -> Result<bool> {
        self.store.is_empty().await
    }

    /// Ingest only when the destination is empty. Returns `None` when data was
    /// already present.
    pub async fn run_if_empty(&self) -> Result<Option<IngestReport>> {
        if !self.is_destination_empty().await? {
            info!("Destination already populated; skipping ingest");
            return Ok(None);
        }
        self.run().await.map(Some)
    }
}

/// Fields that define a record's content; identity values are not part of it.
#[derive(Serialize)]
struct DigestEntry<'a> {
    name: &'a str,
    city: &'a str,
    location: Option<&'a str>,
    rating: Option<f64>,
    cost_for_two: u64,
    price_category: &'a str,
    has_online_delivery: bool,
    cuisines: Option<&'a str>,
    raw_data: &'a serde_json::Value,
}

/// SHA-256 (hex) over the canonical records, one JSON line each, in order.
pub fn content_digest(records: &[RestaurantRecord]) -> Result<String> {
    let mut hasher = Sha256::new();
    for r in records {
        let entry = DigestEntry {
            name: &r.name,
            city: &r.city,
            location: r.location.as_deref(),
            rating: r.rating,
            cost_for_two: r.cost_for_two,
            price_category: r.price_category.as_str(),
            has_online_delivery: r.has_online_delivery,
            cuisines: r.cuisines.as_deref(),
            raw_data: &r.raw_data,
        };
        hasher.update(serde_json::to_vec(&entry)?);
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceCategory;
    use serde_json::json;

    fn record(name: &str) -> RestaurantRecord {
        RestaurantRecord {
            name: name.to_string(),
            city: "Bangalore".to_string(),
            location: None,
            rating: Some(4.0),
            cost_for_two: 800,
            price_category: PriceCategory::Moderate,
            has_online_delivery: true,
            cuisines: None,
            raw_data: json!({"name": name}),
        }
    }

    #[test]
    fn test_content_digest_is_stable_and_order_sensitive() {
        let a = content_digest(&[record("A"), record("B")]).unwrap();
        let again = content_digest(&[record("A"), record("B")]).unwrap();
        let swapped = content_digest(&[record("B"), record("A")]).unwrap();
        assert_eq!(a, again);
        assert_ne!(a, swapped);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_content_digest_of_empty_set() {
        // SHA-256 of the empty input
        assert_eq!(
            content_digest(&[]).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
