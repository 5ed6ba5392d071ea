use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use likes_archiver::api::XApiClient;
use likes_archiver::config::Config;
use likes_archiver::crawler::{CrawlMode, Crawler, LikesCrawler};
use likes_archiver::db::{get_store_stats, Database};
use likes_archiver::media::HttpMediaFetcher;
use likes_archiver::reconciler::ImageReconciler;

#[derive(Debug, Parser)]
#[command(name = "likes-archiver", version, about = "Archive liked posts and their images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl the whole like history
    Batch,
    /// Crawl until reaching posts that are already stored
    Incremental,
    /// Download images that are still pending
    Images,
    /// Print row counts
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    match cli.command {
        Command::Batch => crawl(&load_config()?, CrawlMode::Batch).await,
        Command::Incremental => crawl(&load_config()?, CrawlMode::Incremental).await,
        Command::Images => download_images(&load_config()?).await,
        // Reporting only touches the local database, so it needs no API credentials
        Command::Status => status(&Config::database_path_from_env()).await,
    }
}

fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        target_user = %config.target_username,
        database = %config.database_path.display(),
        "Starting likes-archiver"
    );
    Ok(config)
}

async fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    Database::new(path)
        .await
        .context("Failed to initialize database")
}

async fn crawl(config: &Config, mode: CrawlMode) -> Result<()> {
    let db = open_database(&config.database_path).await?;
    let api = XApiClient::new(config).context("Failed to create API client")?;
    let strategy = LikesCrawler::connect(api, db, &config.target_username).await?;
    let crawler = Crawler::new(strategy, config.request_interval);

    match mode {
        CrawlMode::Batch => crawler.run_batch().await?,
        CrawlMode::Incremental => crawler.run_incremental().await?,
    };
    Ok(())
}

async fn download_images(config: &Config) -> Result<()> {
    let db = open_database(&config.database_path).await?;
    let fetcher = HttpMediaFetcher::new(config.http_timeout)?;
    let reconciler = ImageReconciler::new(fetcher, db, config.media_dir.clone(), config.request_interval);
    reconciler.run().await?;
    Ok(())
}

async fn status(database_path: &Path) -> Result<()> {
    let db = open_database(database_path).await?;
    let stats = get_store_stats(db.pool()).await?;
    println!(
        "posts: {}\nauthors: {}\nmedia: {}\npending media: {}",
        stats.posts, stats.authors, stats.media, stats.pending_media
    );
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,likes_archiver=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
