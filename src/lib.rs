pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod recommend;
pub mod server;
pub mod source;
pub mod storage;
pub mod transform;
