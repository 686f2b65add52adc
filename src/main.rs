use anyhow::Context;
use clap::{Parser, Subcommand};
use restaurant_recommender::config::Config;
use restaurant_recommender::ingest::IngestWorkflow;
use restaurant_recommender::llm::LlmClient;
use restaurant_recommender::recommend::{RecommendationRequest, Recommender};
use restaurant_recommender::server::{self, AppState};
use restaurant_recommender::source::{FileSource, HuggingFaceSource, SourceProvider};
use restaurant_recommender::storage::sqlite::SqliteStore;
use restaurant_recommender::storage::RestaurantStore;
use restaurant_recommender::{logging, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "restaurant_recommender")]
#[command(about = "Restaurant dataset ingest and recommendation service")]
#[command(version = "0.1.0")]
struct Cli {
    /// Optional TOML config file; environment variables still override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the restaurant table with a fresh copy of the dataset
    Ingest {
        /// Read a local CSV / JSON Lines / JSON export instead of the rows API
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show how many restaurants are stored
    Status,
    /// Run the HTTP API, ingesting first if the table is empty
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ask for recommendations from the command line
    Recommend {
        #[arg(long)]
        city: String,
        /// One of $, $$, $$$
        #[arg(long)]
        price_category: String,
        #[arg(long, default_value_t = 3)]
        limit: i64,
    },
}

fn build_source(config: &Config) -> anyhow::Result<Arc<dyn SourceProvider>> {
    Ok(match &config.dataset.file {
        Some(path) => Arc::new(FileSource::new(path.clone())?),
        None => Arc::new(HuggingFaceSource::new(&config.dataset)?),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    }
    .context("Failed to load configuration")?;

    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    let store: Arc<dyn RestaurantStore> = store;

    match cli.command {
        Commands::Ingest { file } => {
            if file.is_some() {
                config.dataset.file = file;
            }
            println!("🔄 Ingesting restaurants into {}...", config.database_path.display());
            let workflow = IngestWorkflow::new(build_source(&config)?, store);
            match workflow.run().await {
                Ok(report) => {
                    println!("\n📊 Ingest results ({}):", report.source_id);
                    println!("   Processed: {}", report.processed);
                    println!("   Skipped: {}", report.skipped);
                    println!("   Inserted: {}", report.inserted);
                    println!("   Digest: {}", report.content_digest);
                }
                Err(e) => {
                    error!("Ingest failed: {}", e);
                    println!("❌ Ingest failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Status => {
            if store.is_empty().await? {
                println!("📭 No restaurants stored yet. Run `restaurant_recommender ingest`.");
            } else {
                let count = store.count().await?;
                let cities = store.list_cities().await?;
                println!("📦 {} restaurants across {} cities", count, cities.len());
            }
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            metrics::init_metrics(config.server.metrics_port);

            let workflow = IngestWorkflow::new(build_source(&config)?, store.clone());
            server::ingest_if_empty(&workflow).await;

            let ranker = Arc::new(LlmClient::new(config.llm.clone())?);
            let state = AppState {
                store: store.clone(),
                recommender: Arc::new(Recommender::new(store, ranker)),
            };
            info!("Starting server on port {}", port);
            server::start_server(state, port).await?;
        }
        Commands::Recommend {
            city,
            price_category,
            limit,
        } => {
            let ranker = Arc::new(LlmClient::new(config.llm.clone())?);
            let recommender = Recommender::new(store, ranker);
            let request = RecommendationRequest {
                city,
                price_category,
                limit,
            };
            let response = recommender.recommend(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
