use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecommenderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source '{source_id}' unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("LLM error: {0}")]
    Llm(String),
}

impl From<rusqlite::Error> for RecommenderError {
    fn from(err: rusqlite::Error) -> Self {
        RecommenderError::Database {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecommenderError>;
