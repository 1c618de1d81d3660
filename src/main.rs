//! CLI entry point for transit_relay.
//!
//! `serve` runs the HTTP endpoints; `vehicles` and `stops` run a single
//! pipeline pass and print the result.

use std::ffi::OsStr;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_relay::config::{
    DEFAULT_FEED_URL, DEFAULT_STOPS_FILE, DEFAULT_TIMEOUT_SECS, RouteMerge, Settings,
};
use transit_relay::fetch::{BasicClient, fetch_text};
use transit_relay::output::{write_csv, write_json};
use transit_relay::server::{self, AppState};
use transit_relay::stops::load_bus_stops;
use transit_relay::vehicles::{filter_by_line, parse_feed};

#[derive(Parser)]
#[command(name = "transit_relay")]
#[command(about = "Serves live vehicle positions and bus stops as JSON", long_about = None)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// URL of the live GPS feed
    #[arg(long, global = true, env = "TRANSIT_FEED_URL", default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// Path to the stop directory XML
    #[arg(long, global = true, env = "TRANSIT_STOPS_FILE", default_value = DEFAULT_STOPS_FILE)]
    stops_file: PathBuf,

    /// Timeout for the upstream feed request, in seconds
    #[arg(long, global = true, env = "TRANSIT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// How stops with several routes are flattened
    #[arg(long, global = true, env = "TRANSIT_ROUTE_MERGE", value_enum, default_value_t = RouteMerge::LastWins)]
    route_merge: RouteMerge,
}

impl SourceArgs {
    fn settings(&self) -> Settings {
        Settings {
            feed_url: self.feed_url.clone(),
            stops_path: self.stops_file.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            route_merge: self.route_merge,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve GET /1 (vehicles by line) and GET /2 (bus stops)
    Serve {
        /// Address to listen on
        #[arg(long, env = "TRANSIT_LISTEN", default_value = "127.0.0.1:5000")]
        listen: SocketAddr,
    },
    /// Print the vehicles currently serving a line
    Vehicles {
        /// Line number to select, compared as a string
        #[arg(short, long)]
        line: String,

        /// Feed file or URL to read instead of the configured feed
        #[arg(short, long, value_name = "FILE_OR_URL")]
        source: Option<String>,

        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Print every complete bus stop from the stop directory
    Stops {
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let settings = cli.sources.settings();

    match cli.command {
        Commands::Serve { listen } => {
            let client = BasicClient::new(settings.timeout)?;
            info!(feed_url = %settings.feed_url, stops = %settings.stops_path.display(), "Starting server");
            server::serve(listen, AppState::new(settings, client)).await?;
        }
        Commands::Vehicles { line, source, format } => {
            let client = BasicClient::new(settings.timeout)?;
            let source = source.unwrap_or(settings.feed_url);
            let text = fetcher(&client, &source).await?;
            let vehicles = filter_by_line(parse_feed(&text), Some(&line));
            info!(line = %line, count = vehicles.len(), "Vehicles selected");
            print(format, &vehicles)?;
        }
        Commands::Stops { format } => {
            let stops = load_bus_stops(&settings.stops_path, settings.route_merge)
                .await
                .with_context(|| format!("loading {}", settings.stops_path.display()))?;
            print(format, &stops)?;
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/transit_relay.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_relay.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

/// Loads feed text from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(client))]
async fn fetcher(client: &BasicClient, source: &str) -> Result<String> {
    let text = if source.starts_with("http") {
        fetch_text(client, source).await?
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {source}"))?
    };
    Ok(text)
}

fn print<T: serde::Serialize>(format: Format, records: &[T]) -> Result<()> {
    let stdout = io::stdout().lock();
    match format {
        Format::Json => write_json(stdout, records),
        Format::Csv => write_csv(stdout, records),
    }
}
