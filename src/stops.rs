//! Static stop directory.
//!
//! The directory is an XML document whose root holds `stop` elements, each
//! with nested `route` elements:
//!
//! ```xml
//! <stops>
//!   <stop id="101" id0="1" name="Balti jaam" lat="59.4397" lon="24.7373">
//!     <route transport="bus" num="17" direction="a-b" directionName="Väike-Õismäe" stopNum="3"/>
//!   </stop>
//! </stops>
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RouteMerge;
use crate::{Error, Result};

const BUS: &str = "bus";

#[derive(Debug, Default, Deserialize)]
struct StopDocument {
    #[serde(rename = "stop", default)]
    stops: Vec<StopElement>,
}

#[derive(Debug, Deserialize)]
struct StopElement {
    #[serde(rename = "@id", default, deserialize_with = "attribute")]
    id: Option<String>,
    #[serde(rename = "@id0", default, deserialize_with = "attribute")]
    id0: Option<String>,
    #[serde(rename = "@name", default, deserialize_with = "attribute")]
    name: Option<String>,
    #[serde(rename = "@lat", default, deserialize_with = "attribute")]
    lat: Option<String>,
    #[serde(rename = "@lon", default, deserialize_with = "attribute")]
    lon: Option<String>,
    #[serde(rename = "route", default)]
    routes: Vec<RouteElement>,
}

#[derive(Debug, Deserialize)]
struct RouteElement {
    #[serde(rename = "@transport", default, deserialize_with = "attribute")]
    transport: Option<String>,
    #[serde(rename = "@num", default, deserialize_with = "attribute")]
    num: Option<String>,
    #[serde(rename = "@direction", default, deserialize_with = "attribute")]
    direction: Option<String>,
    #[serde(rename = "@directionName", default, deserialize_with = "attribute")]
    direction_name: Option<String>,
    #[serde(rename = "@stopNum", default, deserialize_with = "attribute")]
    stop_num: Option<String>,
}

/// A present attribute is kept verbatim, even when empty; only a missing
/// attribute is `None`.
fn attribute<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(Some)
}

/// A stop flattened with (at most) one of its routes. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopRow {
    pub id: Option<String>,
    pub id0: Option<String>,
    pub name: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub transport: Option<String>,
    pub num: Option<String>,
    pub direction: Option<String>,
    pub direction_name: Option<String>,
    pub stop_num: Option<String>,
}

impl StopRow {
    fn from_stop(stop: &StopElement) -> Self {
        Self {
            id: stop.id.clone(),
            id0: stop.id0.clone(),
            name: stop.name.clone(),
            lat: stop.lat.clone(),
            lon: stop.lon.clone(),
            ..Self::default()
        }
    }

    /// Overwrites every route field, including with absent values.
    fn apply(&mut self, route: &RouteElement) {
        self.transport = route.transport.clone();
        self.num = route.num.clone();
        self.direction = route.direction.clone();
        self.direction_name = route.direction_name.clone();
        self.stop_num = route.stop_num.clone();
    }
}

/// A complete bus stop, as served by `GET /2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRecord {
    pub id: String,
    pub id0: String,
    pub name: String,
    pub lat: String,
    pub lon: String,
    pub transport: String,
    pub num: String,
    pub direction: String,
    pub direction_name: String,
    pub stop_num: String,
}

impl TryFrom<StopRow> for StopRecord {
    type Error = Error;

    fn try_from(row: StopRow) -> Result<Self> {
        let id = row.id.clone();
        let require = |value: Option<String>, field: &'static str| {
            value.ok_or_else(|| Error::IncompleteRecord { id: id.clone(), field })
        };

        Ok(Self {
            id: require(row.id, "id")?,
            id0: require(row.id0, "id0")?,
            name: require(row.name, "name")?,
            lat: require(row.lat, "lat")?,
            lon: require(row.lon, "lon")?,
            transport: require(row.transport, "transport")?,
            num: require(row.num, "num")?,
            direction: require(row.direction, "direction")?,
            direction_name: require(row.direction_name, "directionName")?,
            stop_num: require(row.stop_num, "stopNum")?,
        })
    }
}

/// Parses the stop directory and flattens each top-level `stop` element.
///
/// With [`RouteMerge::LastWins`] every stop yields one row carrying its last
/// route. With [`RouteMerge::PerRoute`] a stop yields one row per route.
/// A stop without routes yields one row with no route fields in both modes.
///
/// # Errors
///
/// Returns [`Error::StaticSource`] if the document is not valid XML.
pub fn parse_document(xml: &str, merge: RouteMerge) -> Result<Vec<StopRow>> {
    let document: StopDocument = quick_xml::de::from_str(xml)?;

    let mut rows = Vec::with_capacity(document.stops.len());
    for stop in &document.stops {
        let base = StopRow::from_stop(stop);
        match merge {
            RouteMerge::LastWins => {
                let mut row = base;
                if let Some(route) = stop.routes.last() {
                    row.apply(route);
                }
                rows.push(row);
            }
            RouteMerge::PerRoute if stop.routes.is_empty() => rows.push(base),
            RouteMerge::PerRoute => {
                rows.extend(stop.routes.iter().map(|route| {
                    let mut row = base.clone();
                    row.apply(route);
                    row
                }));
            }
        }
    }

    debug!(stops = document.stops.len(), rows = rows.len(), "Stop directory parsed");
    Ok(rows)
}

/// Keeps bus rows that carry every field, in document order.
pub fn bus_stops(rows: Vec<StopRow>) -> Vec<StopRecord> {
    rows.into_iter()
        .filter(|row| row.transport.as_deref() == Some(BUS))
        .filter_map(|row| match StopRecord::try_from(row) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "Dropping incomplete stop");
                None
            }
        })
        .collect()
}

/// Reads the stop directory at `path` and returns its complete bus stops.
///
/// # Errors
///
/// Returns [`Error::StaticSource`] if the file is missing or unparsable.
#[tracing::instrument]
pub async fn load_bus_stops(path: &Path, merge: RouteMerge) -> Result<Vec<StopRecord>> {
    let xml = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::StaticSource(format!("{}: {e}", path.display())))?;

    let stops = bus_stops(parse_document(&xml, merge)?);
    info!(count = stops.len(), "Bus stops selected");
    Ok(stops)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<stops>
  <stop id="1" id0="10" name="Balti jaam" lat="59.4397" lon="24.7373">
    <route transport="tram" num="1" direction="a-b" directionName="Kopli" stopNum="4"/>
    <route transport="bus" num="17" direction="b-a" directionName="Väike-Õismäe" stopNum="3"/>
  </stop>
  <stop id="2" id0="20" name="Vabaduse väljak" lat="59.4339" lon="24.7449">
    <route transport="bus" num="5" direction="a-b" directionName="Metsakooli" stopNum="1"/>
    <route transport="trolleybus" num="4" direction="a-b" directionName="Ülemiste" stopNum="2"/>
  </stop>
  <stop id="3" id0="30" name="Kaubamaja" lat="59.4322" lon="24.7553">
    <route transport="bus" num="2" direction="a-b" stopNum="7"/>
  </stop>
  <stop id="4" id0="40" name="Hobujaama" lat="59.4373" lon="24.7541"/>
  <stop id="5" id0="50" name="Kadriorg" lat="59.4381" lon="24.7905">
    <route transport="bus" num="1A" direction="a-b" directionName="Viimsi" stopNum="9"/>
  </stop>
</stops>
"#;

    #[test]
    fn test_last_route_wins() {
        let rows = parse_document(DIRECTORY, RouteMerge::LastWins).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].transport.as_deref(), Some("bus"));
        assert_eq!(rows[0].num.as_deref(), Some("17"));
        assert_eq!(rows[0].direction_name.as_deref(), Some("Väike-Õismäe"));
        assert_eq!(rows[1].transport.as_deref(), Some("trolleybus"));
        assert_eq!(rows[3].transport, None);
    }

    #[test]
    fn test_per_route_rows() {
        let rows = parse_document(DIRECTORY, RouteMerge::PerRoute).unwrap();
        // 2 + 2 + 1 + 1 (route-less) + 1
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].transport.as_deref(), Some("tram"));
        assert_eq!(rows[1].transport.as_deref(), Some("bus"));
        assert_eq!(rows[0].id, rows[1].id);
    }

    #[test]
    fn test_bus_stops_last_wins() {
        let stops = bus_stops(parse_document(DIRECTORY, RouteMerge::LastWins).unwrap());
        let ids: Vec<_> = stops.iter().map(|s| s.id.as_str()).collect();
        // stop 2 ends on a trolleybus route, stop 3 lacks directionName
        assert_eq!(ids, ["1", "5"]);
        assert_eq!(stops[0].num, "17");
        assert_eq!(stops[0].stop_num, "3");
    }

    #[test]
    fn test_bus_stops_per_route() {
        let stops = bus_stops(parse_document(DIRECTORY, RouteMerge::PerRoute).unwrap());
        let ids: Vec<_> = stops.iter().map(|s| (s.id.as_str(), s.num.as_str())).collect();
        assert_eq!(ids, [("1", "17"), ("2", "5"), ("5", "1A")]);
    }

    #[test]
    fn test_incomplete_record_names_field() {
        let row = StopRow {
            id: Some("3".to_string()),
            id0: Some("30".to_string()),
            name: Some("Kaubamaja".to_string()),
            lat: Some("59.4322".to_string()),
            lon: Some("24.7553".to_string()),
            transport: Some("bus".to_string()),
            num: Some("2".to_string()),
            direction: Some("a-b".to_string()),
            direction_name: None,
            stop_num: Some("7".to_string()),
        };
        let err = StopRecord::try_from(row).unwrap_err();
        assert_eq!(
            err,
            Error::IncompleteRecord { id: Some("3".to_string()), field: "directionName" }
        );
    }

    #[test]
    fn test_each_missing_stop_attribute_excludes_stop() {
        for attr in ["id", "id0", "name", "lat", "lon"] {
            let full = [
                ("id", "9"),
                ("id0", "90"),
                ("name", "Tondi"),
                ("lat", "59.41"),
                ("lon", "24.72"),
            ];
            let attrs: String = full
                .iter()
                .filter(|(k, _)| *k != attr)
                .map(|(k, v)| format!(r#" {k}="{v}""#))
                .collect();
            let xml = format!(
                r#"<stops><stop{attrs}><route transport="bus" num="1" direction="a-b" directionName="X" stopNum="1"/></stop></stops>"#
            );
            let stops = bus_stops(parse_document(&xml, RouteMerge::LastWins).unwrap());
            assert!(stops.is_empty(), "stop without {attr} should be dropped");
        }
    }

    #[test]
    fn test_empty_attribute_is_kept() {
        let xml = r#"<stops><stop id="9" id0="" name="" lat="59.41" lon="24.72"><route transport="bus" num="1" direction="a-b" directionName="X" stopNum="1"/></stop></stops>"#;
        let rows = parse_document(xml, RouteMerge::LastWins).unwrap();
        assert_eq!(rows[0].id0.as_deref(), Some(""));
        assert_eq!(rows[0].name.as_deref(), Some(""));

        let stops = bus_stops(rows);
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].id0, "");
        assert_eq!(stops[0].name, "");
    }

    #[test]
    fn test_nested_stops_are_ignored() {
        let xml = r#"<stops><group><stop id="9" id0="90" name="Tondi" lat="59.41" lon="24.72"/></group></stops>"#;
        assert!(parse_document(xml, RouteMerge::LastWins).unwrap().is_empty());
    }

    #[test]
    fn test_serialized_keys() {
        let stops = bus_stops(parse_document(DIRECTORY, RouteMerge::LastWins).unwrap());
        let json = serde_json::to_value(&stops[0]).unwrap();
        assert_eq!(json["directionName"], "Väike-Õismäe");
        assert_eq!(json["stopNum"], "3");
        assert_eq!(json["id0"], "10");
        assert_eq!(json.as_object().unwrap().len(), 10);
    }

    #[test]
    fn test_unparsable_document() {
        let err = parse_document("<stops><stop id=\"1\">", RouteMerge::LastWins).unwrap_err();
        assert!(matches!(err, Error::StaticSource(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = load_bus_stops(Path::new("does/not/exist.xml"), RouteMerge::LastWins)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StaticSource(_)));
    }
}
