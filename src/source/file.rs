use super::{RawSourceRecord, SourceProvider};
use crate::error::{RecommenderError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    JsonLines,
    JsonArray,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            "json" => Some(Self::JsonArray),
            _ => None,
        }
    }
}

/// Reads a dataset export from disk: CSV with a header row, NDJSON, or a JSON
/// array of objects.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    id: String,
    format: FileFormat,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = FileFormat::from_path(&path).ok_or_else(|| {
            RecommenderError::Config(format!(
                "unsupported dataset file '{}' (expected .csv, .jsonl, .ndjson or .json)",
                path.display()
            ))
        })?;
        let id = format!("file:{}", path.display());
        Ok(Self { path, id, format })
    }

    fn unavailable(&self, reason: impl Into<String>) -> RecommenderError {
        RecommenderError::SourceUnavailable {
            source_id: self.id.clone(),
            reason: reason.into(),
        }
    }
}

/// Every CSV cell becomes a JSON string; header names are the column names.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<RawSourceRecord>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let record: RawSourceRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(column, cell)| (column.to_string(), Value::String(cell.to_string())))
            .collect();
        records.push(record);
    }
    Ok(records)
}

pub fn parse_json_lines(text: &str) -> Result<Vec<RawSourceRecord>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<RawSourceRecord>(line).map_err(RecommenderError::from))
        .collect()
}

pub fn parse_json_array(text: &str) -> Result<Vec<RawSourceRecord>> {
    Ok(serde_json::from_str::<Vec<RawSourceRecord>>(text)?)
}

#[async_trait]
impl SourceProvider for FileSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_records(&self) -> Result<Vec<RawSourceRecord>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let parsed = match self.format {
            FileFormat::Csv => parse_csv(&bytes),
            FileFormat::JsonLines | FileFormat::JsonArray => {
                let text = String::from_utf8(bytes)
                    .map_err(|e| self.unavailable(format!("not UTF-8: {e}")))?;
                if self.format == FileFormat::JsonLines {
                    parse_json_lines(&text)
                } else {
                    parse_json_array(&text)
                }
            }
        };
        let records = parsed.map_err(|e| self.unavailable(e.to_string()))?;
        info!("Read {} rows from {}", records.len(), self.path.display());
        Ok(records)
    }
}
