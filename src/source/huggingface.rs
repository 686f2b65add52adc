use super::{RawSourceRecord, SourceProvider};
use crate::config::DatasetConfig;
use crate::error::{RecommenderError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DATASETS_SERVER_URL: &str = "https://datasets-server.huggingface.co/rows";
/// The rows endpoint refuses pages larger than this.
pub const MAX_PAGE_SIZE: usize = 100;
const MAX_ATTEMPTS: u32 = 3;

/// One page of the datasets-server `/rows` response.
#[derive(Debug, Deserialize)]
pub struct RowsPage {
    pub rows: Vec<RowEntry>,
    #[serde(default)]
    pub num_rows_total: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RowEntry {
    #[serde(default)]
    pub row_idx: Option<usize>,
    pub row: RawSourceRecord,
}

/// Fetches a dataset split page by page from the Hugging Face datasets server.
pub struct HuggingFaceSource {
    client: reqwest::Client,
    base_url: String,
    dataset: String,
    config: String,
    split: String,
    page_size: usize,
}

impl HuggingFaceSource {
    pub fn new(dataset: &DatasetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(dataset.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: DATASETS_SERVER_URL.to_string(),
            dataset: dataset.id.clone(),
            config: dataset.config.clone(),
            split: dataset.split.clone(),
            page_size: dataset.page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }

    /// Point at a different rows endpoint (mirrors, local fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn unavailable(&self, reason: impl Into<String>) -> RecommenderError {
        RecommenderError::SourceUnavailable {
            source_id: self.dataset.clone(),
            reason: reason.into(),
        }
    }

    pub fn page_url(&self, offset: usize) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("dataset", self.dataset.as_str()),
                ("config", self.config.as_str()),
                ("split", self.split.as_str()),
                ("offset", offset.to_string().as_str()),
                ("length", self.page_size.to_string().as_str()),
            ],
        )
        .map_err(|e| self.unavailable(format!("invalid rows URL: {e}")))
    }

    async fn fetch_page(&self, offset: usize) -> Result<RowsPage> {
        let url = self.page_url(offset)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| self.unavailable(format!("request at offset {offset} failed: {e}")))?;

            let status = response.status();
            if status.is_success() {
                let body = response
                    .text()
                    .await
                    .map_err(|e| self.unavailable(format!("reading page at offset {offset}: {e}")))?;
                return parse_rows_page(&body)
                    .map_err(|e| self.unavailable(format!("malformed page at offset {offset}: {e}")));
            }

            let retryable = status.as_u16() == 429 || status.is_server_error();
            if !retryable || attempt >= MAX_ATTEMPTS {
                return Err(self.unavailable(format!(
                    "rows endpoint returned {} at offset {offset}",
                    status.as_u16()
                )));
            }
            let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
            warn!(
                "Rows endpoint returned {} at offset {}, retrying in {:?}",
                status.as_u16(),
                offset,
                backoff
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

pub fn parse_rows_page(body: &str) -> serde_json::Result<RowsPage> {
    serde_json::from_str(body)
}

#[async_trait]
impl SourceProvider for HuggingFaceSource {
    fn source_id(&self) -> &str {
        &self.dataset
    }

    #[instrument(skip(self), fields(dataset = %self.dataset, split = %self.split))]
    async fn fetch_records(&self) -> Result<Vec<RawSourceRecord>> {
        info!("Loading dataset from Hugging Face...");
        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.fetch_page(offset).await?;
            let fetched = page.rows.len();
            records.extend(page.rows.into_iter().map(|entry| entry.row));
            offset += fetched;
            debug!("Fetched {} rows (offset now {})", fetched, offset);

            let reached_total = page.num_rows_total.is_some_and(|total| offset >= total);
            if fetched == 0 || fetched < self.page_size || reached_total {
                break;
            }
        }
        info!("Fetched {} rows from {}", records.len(), self.dataset);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> DatasetConfig {
        DatasetConfig {
            page_size: 500,
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn test_page_url_clamps_length_and_encodes_params() {
        let source = HuggingFaceSource::new(&dataset()).unwrap();
        let url = source.page_url(200).unwrap();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&(
            "dataset".to_string(),
            "ManikaSaini/zomato-restaurant-recommendation".to_string()
        )));
        assert!(query.contains(&("offset".to_string(), "200".to_string())));
        assert!(query.contains(&("length".to_string(), "100".to_string())));
        assert!(url.as_str().starts_with(DATASETS_SERVER_URL));
    }

    #[test]
    fn test_parse_rows_page() {
        let body = r#"{
            "features": [{"feature_idx": 0, "name": "name", "type": {"dtype": "string"}}],
            "rows": [
                {"row_idx": 0, "row": {"name": "Jalsa", "rate": "4.1/5", "votes": 775}, "truncated_cells": []},
                {"row_idx": 1, "row": {"name": "Spice Elephant", "rate": null}, "truncated_cells": []}
            ],
            "num_rows_total": 51717,
            "num_rows_per_page": 100,
            "partial": false
        }"#;
        let page = parse_rows_page(body).unwrap();
        assert_eq!(page.num_rows_total, Some(51717));
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[1].row_idx, Some(1));
        assert_eq!(page.rows[0].row["name"], "Jalsa");
        assert!(page.rows[1].row["rate"].is_null());
    }

    #[test]
    fn test_parse_rows_page_rejects_error_payload() {
        assert!(parse_rows_page(r#"{"error": "The dataset does not exist."}"#).is_err());
    }
}
