//! Fotoladu ingest main entry point
//!
//! This is the command-line interface for mirroring the Maa-amet aerial-photo
//! archive into a local folder tree and SQLite catalog.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use fotoladu_ingest::archive::ArchiveClient;
use fotoladu_ingest::catalog::{load_statistics, print_statistics, random_images, UrlLayout};
use fotoladu_ingest::config::{default_config_with_hash, load_config_with_hash, Config};
use fotoladu_ingest::{
    BBoxQuery, CancelFlag, IngestError, IngestReport, Ingestor, NearestQuery, QuerySpec,
    SqliteStore,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Fotoladu ingest: a resumable mirror of the Maa-amet aerial-photo archive
///
/// Queries the archive, downloads the primary and thumbnail variant of every
/// frame and records each frame in a SQLite catalog. Reruns only fetch what
/// is missing.
#[derive(Parser, Debug)]
#[command(name = "fotoladu-ingest")]
#[command(version)]
#[command(about = "Mirror the Maa-amet aerial-photo archive", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest the results of a search
    Search(SearchArgs),

    /// Ingest every frame of an archive directory
    Directory {
        /// Archive directory id (sailiku number)
        id: String,

        /// Maximum result pages to walk
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Ingest the frames inside a bounding box
    #[command(allow_negative_numbers = true)]
    Bbox {
        /// South-west corner latitude
        #[arg(long)]
        a_lat: f64,
        /// South-west corner longitude
        #[arg(long)]
        a_lng: f64,
        /// North-east corner latitude
        #[arg(long)]
        u_lat: f64,
        /// North-east corner longitude
        #[arg(long)]
        u_lng: f64,
        #[arg(long)]
        year: Option<String>,
        /// Map zoom level the service clusters for
        #[arg(long, default_value_t = 9)]
        zoom: u8,
    },

    /// Print the frames nearest to a point as JSON
    #[command(allow_negative_numbers = true)]
    Nearest {
        latitude: f64,
        longitude: f64,
        #[arg(long)]
        year: Option<String>,
        /// Survey epoch
        #[arg(long)]
        epoch: Option<String>,
    },

    /// Re-ingest every folder already present under the download root
    Sweep {
        /// Maximum result pages per folder
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Print random catalog records with their URLs as JSON
    Random {
        #[arg(short = 'n', long, default_value_t = 1, allow_negative_numbers = true)]
        count: i64,
    },

    /// Show statistics from the database and exit
    Stats,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Photo sequence number
    #[arg(long)]
    photo_number: Option<u64>,
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    map_sheet: Option<String>,
    #[arg(long)]
    flight: Option<String>,
    #[arg(long)]
    photo_type: Option<String>,
    #[arg(long)]
    source: Option<String>,
    /// Archive directory id
    #[arg(long)]
    directory: Option<String>,
    /// Results per page (capped at 60)
    #[arg(long)]
    page_size: Option<u32>,
    /// Result offset of the first page
    #[arg(long, default_value_t = 0)]
    offset: u64,
    /// Maximum result pages to walk
    #[arg(long)]
    max_pages: Option<u32>,
}

impl SearchArgs {
    fn to_query_spec(&self) -> QuerySpec {
        let mut spec = QuerySpec::new().with_offset(self.offset);
        if let Some(n) = self.photo_number {
            spec = spec.with_photo_number(n);
        }
        if let Some(year) = &self.year {
            spec = spec.with_year(year.as_str());
        }
        if let Some(sheet) = &self.map_sheet {
            spec = spec.with_map_sheet(sheet.as_str());
        }
        if let Some(flight) = &self.flight {
            spec = spec.with_flight(flight.as_str());
        }
        if let Some(photo_type) = &self.photo_type {
            spec = spec.with_photo_type(photo_type.as_str());
        }
        if let Some(source) = &self.source {
            spec = spec.with_source(source.as_str());
        }
        if let Some(directory) = &self.directory {
            spec = spec.with_directory(directory.as_str());
        }
        if let Some(size) = self.page_size {
            spec = spec.with_page_size(size);
        }
        spec
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            default_config_with_hash()
        }
    };

    match cli.command {
        Command::Search(args) => {
            let mut ingestor = start_ingestor(&config, &config_hash)?;
            report_outcome(
                ingestor
                    .ingest_search(&args.to_query_spec(), args.max_pages)
                    .await,
            )
        }
        Command::Directory { id, max_pages } => {
            let mut ingestor = start_ingestor(&config, &config_hash)?;
            report_outcome(ingestor.ingest_directory(&id, max_pages).await)
        }
        Command::Bbox {
            a_lat,
            a_lng,
            u_lat,
            u_lng,
            year,
            zoom,
        } => {
            let mut query = BBoxQuery::new(a_lat, a_lng, u_lat, u_lng);
            query.year = year;
            query.zoom = zoom;

            let mut ingestor = start_ingestor(&config, &config_hash)?;
            report_outcome(ingestor.ingest_bbox(&query).await)
        }
        Command::Sweep { max_pages } => {
            let mut ingestor = start_ingestor(&config, &config_hash)?;
            report_outcome(ingestor.sweep_existing_directories(max_pages).await)
        }
        Command::Nearest {
            latitude,
            longitude,
            year,
            epoch,
        } => {
            let mut query = NearestQuery::new(latitude, longitude);
            query.year = year;
            if let Some(epoch) = epoch {
                query.epoch = epoch;
            }
            handle_nearest(&config, &query).await
        }
        Command::Random { count } => handle_random(&config, count),
        Command::Stats => handle_stats(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fotoladu_ingest=info,warn"),
            1 => EnvFilter::new("fotoladu_ingest=debug,info"),
            2 => EnvFilter::new("fotoladu_ingest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Sets the cancel flag on the first Ctrl-C and exits on the second
fn install_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Could not listen for Ctrl-C; interrupts will not be graceful");
            return;
        }
        tracing::warn!("Interrupt received, stopping after the current entry (Ctrl-C again to abort)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Aborting");
            std::process::exit(130);
        }
    });
}

/// Opens the catalog and wires Ctrl-C to the ingestor's cancel flag
fn start_ingestor(config: &Config, config_hash: &str) -> anyhow::Result<Ingestor> {
    let cancel = CancelFlag::new();
    install_interrupt_handler(cancel.clone());

    let ingestor = Ingestor::from_config(config, config_hash, cancel)
        .context("Failed to initialize ingestion")?;

    tracing::info!(
        "Database: {}, download root: {}",
        config.storage.database_path,
        config.storage.download_root
    );
    Ok(ingestor)
}

fn report_outcome(result: fotoladu_ingest::Result<IngestReport>) -> anyhow::Result<()> {
    match result {
        Ok(report) => {
            println!("✓ Ingestion complete: {}", report);
            Ok(())
        }
        Err(IngestError::Interrupted) => {
            println!("Ingestion interrupted; committed work is kept and a rerun resumes it");
            std::process::exit(130);
        }
        Err(e) => {
            tracing::error!("Ingestion failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the nearest command: prints the service's JSON unchanged
async fn handle_nearest(config: &Config, query: &NearestQuery) -> anyhow::Result<()> {
    let client = ArchiveClient::new(&config.service)?;

    let value = client.nearest(query).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Handles the random command: prints catalog records as a JSON array
fn handle_random(config: &Config, count: i64) -> anyhow::Result<()> {
    let store = SqliteStore::open(Path::new(&config.storage.database_path))?;
    let layout = UrlLayout::from_config(&config.storage);

    let images = random_images(&store, &layout, count)?;
    println!("{}", serde_json::to_string_pretty(&images)?);
    Ok(())
}

/// Handles the stats command: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let store = SqliteStore::open(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}
