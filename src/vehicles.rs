//! Live vehicle positions from the plain-text GPS feed.
//!
//! The feed is comma-delimited, one vehicle per line, ten positional columns
//! and no header row:
//!
//! ```text
//! transport_type,line_number,latitude,longitude,speed,heading,vehicle_number,vehicle_type,some1,some2
//! 2,17,59440000,24750000,0,90,123,1,,
//! ```
//!
//! Coordinates are integers in millionths of a degree. Numeric columns may
//! carry surrounding whitespace; text columns are taken verbatim.

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::fetch::{HttpClient, fetch_text};
use crate::{Error, Result};

const FIELD_COUNT: usize = 10;
const COORDINATE_SCALE: f64 = 1_000_000.0;

/// Kind of vehicle, decoded from the feed's numeric transport code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportType {
    #[serde(rename = "trolleybus")]
    Trolleybus,
    #[serde(rename = "bus")]
    Bus,
    #[serde(rename = "tram")]
    Tram,
    #[serde(rename = "night bus")]
    NightBus,
}

impl TransportType {
    /// Maps a feed code to a transport type. Unknown or non-numeric codes
    /// yield `None`.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().parse::<u32>().ok()? {
            1 => Some(Self::Trolleybus),
            2 => Some(Self::Bus),
            3 => Some(Self::Tram),
            7 => Some(Self::NightBus),
            _ => None,
        }
    }
}

/// One vehicle position, as served by `GET /1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRecord {
    pub transport_type: Option<TransportType>,
    pub line_number: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub vehicle_number: Option<String>,
    pub vehicle_type: Option<String>,
    pub some1: Option<String>,
    pub some2: Option<String>,
}

impl TryFrom<&StringRecord> for VehicleRecord {
    type Error = Error;

    fn try_from(record: &StringRecord) -> Result<Self> {
        let line = record.position().map_or(0, csv::Position::line);
        let invalid = |reason: String| Error::InvalidRecord { line, reason };

        if record.len() != FIELD_COUNT {
            return Err(invalid(format!("expected {FIELD_COUNT} fields, found {}", record.len())));
        }

        let field = |i: usize| present(&record[i]);
        let coordinate = |i: usize, name: &str| {
            record[i]
                .trim()
                .parse::<i64>()
                .map(|raw| raw as f64 / COORDINATE_SCALE)
                .map_err(|_| invalid(format!("non-numeric {name} {:?}", &record[i])))
        };

        Ok(Self {
            transport_type: TransportType::from_code(&record[0]),
            line_number: field(1),
            latitude: coordinate(2, "latitude")?,
            longitude: coordinate(3, "longitude")?,
            speed: number(&record[4]),
            heading: number(&record[5]),
            vehicle_number: field(6),
            vehicle_type: field(7),
            some1: field(8),
            some2: field(9),
        })
    }
}

fn present(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses the raw feed text, skipping records that cannot be decoded.
///
/// Skipped records are logged; they never abort the batch.
#[tracing::instrument(skip(text), fields(bytes = text.len()))]
pub fn parse_feed(text: &str) -> Vec<VehicleRecord> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut vehicles = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let parsed = result
            .map_err(|e| Error::InvalidRecord {
                line: e.position().map_or(0, csv::Position::line),
                reason: e.to_string(),
            })
            .and_then(|record| VehicleRecord::try_from(&record));

        match parsed {
            Ok(vehicle) => vehicles.push(vehicle),
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "Skipping malformed feed record");
            }
        }
    }

    debug!(parsed = vehicles.len(), skipped, "Feed parsed");
    vehicles
}

/// Keeps the vehicles whose line number equals `line` exactly, in feed order,
/// and defaults their missing speed to `0`.
///
/// With no `line` the result is empty.
pub fn filter_by_line(vehicles: Vec<VehicleRecord>, line: Option<&str>) -> Vec<VehicleRecord> {
    let Some(line) = line else {
        return Vec::new();
    };

    vehicles
        .into_iter()
        .filter(|v| v.line_number.as_deref() == Some(line))
        .map(|mut v| {
            v.speed.get_or_insert(0.0);
            v
        })
        .collect()
}

/// Fetches the live feed and returns the vehicles currently serving `line`.
///
/// # Errors
///
/// Propagates upstream failures from [`fetch_text`].
#[tracing::instrument(skip(client))]
pub async fn fetch_vehicles<C: HttpClient + ?Sized>(
    client: &C,
    feed_url: &str,
    line: Option<&str>,
) -> Result<Vec<VehicleRecord>> {
    let text = fetch_text(client, feed_url).await?;
    let vehicles = filter_by_line(parse_feed(&text), line);
    info!(count = vehicles.len(), "Vehicles selected");
    Ok(vehicles)
}
