//! Runtime settings shared by the CLI and the HTTP server.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FEED_URL: &str = "https://transport.tallinn.ee/gps.txt";
pub const DEFAULT_STOPS_FILE: &str = "stops.xml";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// How a stop with several nested `route` elements is flattened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RouteMerge {
    /// Each route overwrites the previous one; the last route wins.
    #[default]
    LastWins,
    /// One record per route element.
    PerRoute,
}

/// Immutable settings, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub feed_url: String,
    pub stops_path: PathBuf,
    pub timeout: Duration,
    pub route_merge: RouteMerge,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            stops_path: PathBuf::from(DEFAULT_STOPS_FILE),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            route_merge: RouteMerge::default(),
        }
    }
}
