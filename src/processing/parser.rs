//! JSON input documents
//!
//! Two layouts are accepted. A measurement document carries full receiver
//! records, `{"measurements": [{"<station>": [x, y, t], ...}, ...]}`. A
//! geometry document carries static station positions plus timestamp rounds,
//! `{"receivers": {"<station>": [x, y]}, "measurements": [{"<station>": t}, ...]}`.
//! Stations are ordered by key.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::core::Receiver;
use crate::utils::config::InputConfig;
use crate::validation::data::DataValidator;
use crate::validation::error::{LocatorError, LocatorResult};

/// Document-level input failures
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field '{0}'")]
    MissingField(String),

    #[error("Invalid '{field}': {reason}")]
    InvalidDocument { field: String, reason: String },

    #[error("Window size {window} is invalid for {rounds} measurement rounds")]
    InvalidWindow { window: usize, rounds: usize },
}

impl InputError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        InputError::InvalidDocument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A parsed receiver record, or the reason it was rejected
pub type ParsedRecord = LocatorResult<Vec<Receiver>>;

/// Named static station
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub name: String,
    pub receiver: Receiver,
}

/// Static geometry plus per-round timestamps aligned with `stations`
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDocument {
    pub stations: Vec<Station>,
    pub rounds: Vec<LocatorResult<Vec<f64>>>,
}

impl GeometryDocument {
    /// Geometry-only receiver array
    pub fn receivers(&self) -> Vec<Receiver> {
        self.stations.iter().map(|s| s.receiver).collect()
    }
}

/// Parser for both document layouts
#[derive(Debug, Clone)]
pub struct MeasurementParser {
    timestamp_scale: f64,
}

impl Default for MeasurementParser {
    fn default() -> Self {
        Self { timestamp_scale: 1.0 }
    }
}

impl MeasurementParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multiply every timestamp by `scale` while parsing
    pub fn with_timestamp_scale(scale: f64) -> Self {
        Self { timestamp_scale: scale }
    }

    pub fn from_config(config: &InputConfig) -> Self {
        Self::with_timestamp_scale(config.timestamp_scale)
    }

    pub fn load_measurements<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ParsedRecord>, InputError> {
        let text = read_document(path.as_ref())?;
        self.parse_measurements_str(&text)
    }

    pub fn parse_measurements_str(&self, text: &str) -> Result<Vec<ParsedRecord>, InputError> {
        let document: Value = serde_json::from_str(text)?;
        self.parse_measurements(&document)
    }

    /// One entry per record, in document order; a bad record never fails the document
    pub fn parse_measurements(&self, document: &Value) -> Result<Vec<ParsedRecord>, InputError> {
        let records = document
            .get("measurements")
            .ok_or_else(|| InputError::MissingField("measurements".to_string()))?
            .as_array()
            .ok_or_else(|| InputError::invalid("measurements", "expected an array"))?;

        let parsed: Vec<ParsedRecord> = records.iter().map(|r| self.parse_record(r)).collect();
        debug!(
            records = parsed.len(),
            rejected = parsed.iter().filter(|r| r.is_err()).count(),
            "parsed measurement document"
        );
        Ok(parsed)
    }

    /// Parse `{"<station>": [x, y, t], ...}`
    pub fn parse_record(&self, record: &Value) -> ParsedRecord {
        let entries = record
            .as_object()
            .ok_or_else(|| LocatorError::malformed("measurement", "expected an object of stations"))?;

        entries
            .iter()
            .map(|(station, value)| -> LocatorResult<Receiver> {
                let [x, y, t] = numeric_array::<3>(station, value)?;
                Ok(Receiver::new(x, y, self.scale(station, t)?))
            })
            .collect()
    }

    pub fn load_geometry<P: AsRef<Path>>(&self, path: P) -> Result<GeometryDocument, InputError> {
        let text = read_document(path.as_ref())?;
        self.parse_geometry_str(&text)
    }

    pub fn parse_geometry_str(&self, text: &str) -> Result<GeometryDocument, InputError> {
        let document: Value = serde_json::from_str(text)?;
        self.parse_geometry(&document)
    }

    /// Geometry must be valid as a whole; each round is checked on its own
    pub fn parse_geometry(&self, document: &Value) -> Result<GeometryDocument, InputError> {
        let receivers = document
            .get("receivers")
            .ok_or_else(|| InputError::MissingField("receivers".to_string()))?
            .as_object()
            .ok_or_else(|| InputError::invalid("receivers", "expected an object of stations"))?;

        let stations = receivers
            .iter()
            .map(|(name, value)| -> Result<Station, InputError> {
                let [x, y] = numeric_array::<2>(name, value)
                    .map_err(|e| InputError::invalid(format!("receivers.{}", name), e.to_string()))?;
                Ok(Station {
                    name: name.clone(),
                    receiver: Receiver::at(x, y),
                })
            })
            .collect::<Result<Vec<_>, InputError>>()?;

        let rounds = document
            .get("measurements")
            .ok_or_else(|| InputError::MissingField("measurements".to_string()))?
            .as_array()
            .ok_or_else(|| InputError::invalid("measurements", "expected an array"))?
            .iter()
            .map(|round| self.parse_round(&stations, round))
            .collect::<Vec<_>>();

        debug!(stations = stations.len(), rounds = rounds.len(), "parsed geometry document");
        Ok(GeometryDocument { stations, rounds })
    }

    /// Timestamps of one round, in station order
    fn parse_round(&self, stations: &[Station], round: &Value) -> LocatorResult<Vec<f64>> {
        let entries: &Map<String, Value> = round
            .as_object()
            .ok_or_else(|| LocatorError::malformed("measurement", "expected an object of timestamps"))?;

        if let Some(extra) = entries.keys().find(|k| !stations.iter().any(|s| &s.name == *k)) {
            return Err(LocatorError::malformed(extra.as_str(), "station has no known position"));
        }

        stations
            .iter()
            .map(|station| {
                let value = entries
                    .get(&station.name)
                    .ok_or_else(|| LocatorError::malformed(station.name.as_str(), "missing timestamp"))?;
                let t = value
                    .as_f64()
                    .ok_or_else(|| LocatorError::malformed(station.name.as_str(), "timestamp is not a number"))?;
                self.scale(&station.name, t)
            })
            .collect()
    }

    fn scale(&self, station: &str, timestamp: f64) -> LocatorResult<f64> {
        DataValidator::validate_value(station, "timestamp", timestamp * self.timestamp_scale)
    }
}

fn read_document(path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// `[v0, .., v{N-1}]` of finite numbers
fn numeric_array<const N: usize>(station: &str, value: &Value) -> LocatorResult<[f64; N]> {
    let items = value
        .as_array()
        .ok_or_else(|| LocatorError::malformed(station, format!("expected a {}-element array", N)))?;
    if items.len() != N {
        return Err(LocatorError::malformed(
            station,
            format!("expected {} values, got {}", N, items.len()),
        ));
    }

    let mut out = [0.0; N];
    for (i, item) in items.iter().enumerate() {
        let v = item
            .as_f64()
            .ok_or_else(|| LocatorError::malformed(station, format!("element {} is not a number", i)))?;
        out[i] = DataValidator::validate_value(station, &format!("element {}", i), v)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_measurement_document() {
        let text = r#"{"measurements": [
            {"gnb1": [0.0, 0.0, 5.0], "gnb2": [3.0, 1.0, 3.0], "gnb3": [0.0, 3.0, 3.1622776602]},
            {"gnb1": [1.0, 1.0, 4.0], "gnb2": [2.0, 4.0, 8.0], "gnb3": [5.0, 0.0, 1.0], "gnb4": [6.0, 6.0, 2.0]}
        ]}"#;
        let records = MeasurementParser::new().parse_measurements_str(text).unwrap();

        assert_eq!(records.len(), 2);
        let first = records[0].as_ref().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[1], Receiver::new(3.0, 1.0, 3.0));
        assert_eq!(records[1].as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_station_order_follows_keys() {
        let record = json!({"b": [2.0, 0.0, 0.0], "a": [1.0, 0.0, 0.0], "c": [3.0, 0.0, 0.0]});
        let receivers = MeasurementParser::new().parse_record(&record).unwrap();
        let xs: Vec<f64> = receivers.iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_bad_record_is_isolated() {
        let document = json!({"measurements": [
            {"gnb1": [0.0, 0.0], "gnb2": [3.0, 1.0, 3.0]},
            {"gnb1": [0.0, 0.0, "late"]},
            {"gnb1": [0.0, 0.0, 5.0]}
        ]});
        let records = MeasurementParser::new().parse_measurements(&document).unwrap();

        assert_eq!(
            records[0],
            Err(LocatorError::malformed("gnb1", "expected 3 values, got 2"))
        );
        assert!(matches!(
            &records[1],
            Err(LocatorError::MalformedMeasurement { field, .. }) if field == "gnb1"
        ));
        assert!(records[2].is_ok());
    }

    #[test]
    fn test_missing_measurements_field() {
        let err = MeasurementParser::new().parse_measurements_str(r#"{"records": []}"#).unwrap_err();
        assert!(matches!(err, InputError::MissingField(ref f) if f == "measurements"));

        let err = MeasurementParser::new().parse_measurements_str("not json").unwrap_err();
        assert!(matches!(err, InputError::Json(_)));
    }

    #[test]
    fn test_timestamp_scale() {
        let parser = MeasurementParser::with_timestamp_scale(2.0);
        let receivers = parser.parse_record(&json!({"a": [0.0, 0.0, 1.5]})).unwrap();
        assert_eq!(receivers[0].timestamp, 3.0);
    }

    #[test]
    fn test_parse_geometry_document() {
        let text = r#"{
            "receivers": {"r1": [0.0, 0.0], "r2": [3.0, 1.0], "r3": [0.0, 3.0]},
            "measurements": [
                {"r1": 5.0, "r2": 3.0, "r3": 3.2},
                {"r1": 5.0, "r3": 3.2},
                {"r1": 5.0, "r2": 3.0, "r3": 3.2, "r9": 1.0}
            ]
        }"#;
        let document = MeasurementParser::new().parse_geometry_str(text).unwrap();

        assert_eq!(document.stations.len(), 3);
        assert_eq!(document.stations[1].name, "r2");
        assert_eq!(document.receivers()[1], Receiver::at(3.0, 1.0));
        assert_eq!(document.rounds[0], Ok(vec![5.0, 3.0, 3.2]));
        assert_eq!(document.rounds[1], Err(LocatorError::malformed("r2", "missing timestamp")));
        assert!(matches!(
            &document.rounds[2],
            Err(LocatorError::MalformedMeasurement { field, .. }) if field == "r9"
        ));
    }

    #[test]
    fn test_invalid_geometry_rejects_document() {
        let text = r#"{"receivers": {"r1": [0.0]}, "measurements": []}"#;
        let err = MeasurementParser::new().parse_geometry_str(text).unwrap_err();
        assert!(matches!(err, InputError::InvalidDocument { ref field, .. } if field == "receivers.r1"));

        let err = MeasurementParser::new()
            .parse_geometry_str(r#"{"measurements": []}"#)
            .unwrap_err();
        assert!(matches!(err, InputError::MissingField(ref f) if f == "receivers"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = MeasurementParser::new()
            .load_measurements("/nonexistent/measurements.json")
            .unwrap_err();
        assert!(matches!(err, InputError::Io { .. }));
    }
}
