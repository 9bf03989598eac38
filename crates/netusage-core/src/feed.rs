//! Typed boundary for the raw usage feed.
//!
//! The collector writes a JSON object keyed by stringified unix timestamps.
//! Every entry carries per-device byte counter arrays (`"Us Bytes"`,
//! `"Ds Bytes"`); the most recent entry additionally carries the device table
//! columns. This module validates that shape once and hands the rest of the
//! pipeline an ordered sequence of [`Sample`] records.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FeedError;

/// Bytes per gigabyte, used for the usage trace.
pub const BYTES_PER_GIGABYTE: f64 = 1e9;

const US_BYTES: &str = "Us Bytes";
const DS_BYTES: &str = "Ds Bytes";
const USAGE: &str = "Usage";
const USAGE_TX: &str = "CurrentTx(kbps)";
const USAGE_RX: &str = "CurrentRx(kbps)";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One cumulative counter reading, summed over all devices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    pub upstream_bytes: f64,
    pub downstream_bytes: f64,
}

impl Sample {
    pub fn new(timestamp: i64, upstream_bytes: f64, downstream_bytes: f64) -> Self {
        Self {
            timestamp,
            upstream_bytes,
            downstream_bytes,
        }
    }

    /// Total transferred volume in gigabytes.
    pub fn usage_gb(&self) -> f64 {
        (self.upstream_bytes + self.downstream_bytes) / BYTES_PER_GIGABYTE
    }
}

/// Device table columns, only present on the most recent feed entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceColumns {
    pub room: Vec<String>,
    pub mac: Vec<String>,
    pub number: Vec<String>,
    pub us_power: Vec<Option<f64>>,
    pub ds_power: Vec<Option<f64>>,
    pub us_snr: Vec<Option<f64>>,
    pub ds_snr: Vec<Option<f64>>,
}

impl DeviceColumns {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let text = |key: &str| obj.get(key).map(text_array).unwrap_or_default();
        let numbers = |key: &str| obj.get(key).map(optional_number_array).unwrap_or_default();
        Self {
            room: text("Room"),
            mac: text("MAC"),
            number: text("Number"),
            us_power: numbers("US_Pwr"),
            ds_power: numbers("DS_Pwr"),
            us_snr: numbers("US_SNR"),
            ds_snr: numbers("DS_SNR"),
        }
    }

    fn is_empty(&self) -> bool {
        self.room.is_empty() && self.mac.is_empty() && self.number.is_empty()
    }
}

/// Per-device counters for a single timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub us_bytes: Vec<f64>,
    pub ds_bytes: Vec<f64>,
    pub devices: DeviceColumns,
}

impl FeedEntry {
    pub fn new(us_bytes: Vec<f64>, ds_bytes: Vec<f64>) -> Self {
        Self {
            us_bytes,
            ds_bytes,
            devices: DeviceColumns::default(),
        }
    }

    /// Parse one entry. Returns `None` when neither counter array is present.
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let usage = obj.get(USAGE).and_then(Value::as_object);
        let up = obj
            .get(US_BYTES)
            .or_else(|| usage.and_then(|u| u.get(USAGE_TX)));
        let down = obj
            .get(DS_BYTES)
            .or_else(|| usage.and_then(|u| u.get(USAGE_RX)));
        if up.is_none() && down.is_none() {
            return None;
        }
        Some(Self {
            us_bytes: up.map(counter_array).unwrap_or_default(),
            ds_bytes: down.map(counter_array).unwrap_or_default(),
            devices: DeviceColumns::from_object(obj),
        })
    }

    /// Sum the strictly positive per-device readings of both channels.
    pub fn totals(&self) -> (f64, f64) {
        (positive_sum(&self.us_bytes), positive_sum(&self.ds_bytes))
    }
}

/// One row of the device table of the latest entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReading {
    pub room: String,
    pub mac: String,
    pub number: String,
    pub us_power: Option<f64>,
    pub ds_power: Option<f64>,
    pub us_snr: Option<f64>,
    pub ds_snr: Option<f64>,
    pub usage_gb: f64,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A validated feed payload, ordered by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<i64, FeedEntry>,
    skipped: usize,
}

impl Snapshot {
    /// Build a snapshot directly from samples (one device per timestamp).
    pub fn from_samples(samples: &[Sample]) -> Self {
        let entries = samples
            .iter()
            .map(|s| {
                (
                    s.timestamp,
                    FeedEntry::new(vec![s.upstream_bytes], vec![s.downstream_bytes]),
                )
            })
            .collect();
        Self {
            entries,
            skipped: 0,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, FeedError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Validate a parsed payload.
    ///
    /// An empty array is accepted as an empty snapshot; the history server
    /// uses it as the terminator payload.
    pub fn from_value(value: &Value) -> Result<Self, FeedError> {
        let obj = match value {
            Value::Object(obj) => obj,
            Value::Array(items) if items.is_empty() => return Ok(Self::default()),
            other => {
                return Err(FeedError::NotAnObject {
                    found: json_kind(other),
                });
            }
        };

        let mut snapshot = Self::default();
        for (key, raw) in obj {
            let Ok(timestamp) = key.trim().parse::<i64>() else {
                log::warn!("skipping feed entry with non-integer timestamp {key:?}");
                snapshot.skipped += 1;
                continue;
            };
            match FeedEntry::from_value(raw) {
                Some(entry) => {
                    snapshot.entries.insert(timestamp, entry);
                }
                None => {
                    log::warn!("skipping feed entry {timestamp}: no counter arrays");
                    snapshot.skipped += 1;
                }
            }
        }
        Ok(snapshot)
    }

    /// Load a snapshot file, transparently decompressing `*.gz`.
    pub fn load(path: &Path) -> Result<Self, FeedError> {
        let text = read_feed_file(path)?;
        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries rejected at the boundary.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.entries.keys().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.entries.keys().next_back().copied()
    }

    pub fn latest(&self) -> Option<(i64, &FeedEntry)> {
        self.entries.iter().next_back().map(|(ts, e)| (*ts, e))
    }

    /// Per-timestamp counter totals in chronological order.
    pub fn samples(&self) -> Vec<Sample> {
        self.entries
            .iter()
            .map(|(ts, entry)| {
                let (up, down) = entry.totals();
                Sample::new(*ts, up, down)
            })
            .collect()
    }

    /// Device table of the latest entry.
    pub fn devices(&self) -> Vec<DeviceReading> {
        let Some((_, entry)) = self.latest() else {
            return Vec::new();
        };
        let cols = &entry.devices;
        if cols.is_empty() {
            return Vec::new();
        }
        let rows = cols.room.len().max(cols.mac.len()).max(cols.number.len());
        (0..rows)
            .map(|i| {
                let us = entry.us_bytes.get(i).copied().unwrap_or(0.0).max(0.0);
                let ds = entry.ds_bytes.get(i).copied().unwrap_or(0.0).max(0.0);
                DeviceReading {
                    room: cols.room.get(i).cloned().unwrap_or_default(),
                    mac: cols.mac.get(i).cloned().unwrap_or_default(),
                    number: cols.number.get(i).cloned().unwrap_or_default(),
                    us_power: cols.us_power.get(i).copied().flatten(),
                    ds_power: cols.ds_power.get(i).copied().flatten(),
                    us_snr: cols.us_snr.get(i).copied().flatten(),
                    ds_snr: cols.ds_snr.get(i).copied().flatten(),
                    usage_gb: (us + ds) / BYTES_PER_GIGABYTE,
                }
            })
            .collect()
    }

    /// Usage of the latest entry in gigabytes, summed over all devices.
    pub fn latest_usage_gb(&self) -> f64 {
        self.latest()
            .map(|(_, e)| {
                let (up, down) = e.totals();
                (up + down) / BYTES_PER_GIGABYTE
            })
            .unwrap_or(0.0)
    }

    /// Re-encode as a counters-only payload (device columns dropped).
    pub fn to_counter_value(&self) -> Value {
        let mut out = Map::new();
        for (ts, entry) in &self.entries {
            let mut obj = Map::new();
            obj.insert(US_BYTES.to_string(), counters_json(&entry.us_bytes));
            obj.insert(DS_BYTES.to_string(), counters_json(&entry.ds_bytes));
            out.insert(ts.to_string(), Value::Object(obj));
        }
        Value::Object(out)
    }
}

/// Read a feed file as text; `*.gz` files are gunzipped.
pub fn read_feed_file(path: &Path) -> Result<String, FeedError> {
    let file = std::fs::File::open(path).map_err(|e| FeedError::io(path, e))?;
    let mut text = String::new();
    let gzipped = path.extension().is_some_and(|ext| ext == "gz");
    let result = if gzipped {
        GzDecoder::new(file).read_to_string(&mut text)
    } else {
        std::io::BufReader::new(file).read_to_string(&mut text)
    };
    result.map_err(|e| FeedError::io(path, e))?;
    Ok(text)
}

// ---------------------------------------------------------------------------
// Lenient value helpers
// ---------------------------------------------------------------------------

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Numbers and numeric strings both count; the collector emits either.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|x| x.is_finite())
}

fn counter_array(value: &Value) -> Vec<f64> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| as_number(v).unwrap_or(0.0))
            .collect(),
        scalar => as_number(scalar).into_iter().collect(),
    }
}

fn optional_number_array(value: &Value) -> Vec<Option<f64>> {
    match value {
        Value::Array(items) => items.iter().map(as_number).collect(),
        scalar => vec![as_number(scalar)],
    }
}

fn text_array(value: &Value) -> Vec<String> {
    let text = |v: &Value| match v {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    match value {
        Value::Array(items) => items.iter().map(text).collect(),
        scalar => vec![text(scalar)],
    }
}

fn positive_sum(values: &[f64]) -> f64 {
    values.iter().filter(|v| **v > 0.0).sum()
}

fn counters_json(values: &[f64]) -> Value {
    Value::Array(
        values
            .iter()
            .map(|&v| {
                if v.fract() == 0.0 && (0.0..9.007_199_254_740_992e15).contains(&v) {
                    Value::from(v as u64)
                } else {
                    Value::from(v)
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_counter_arrays_in_timestamp_order() {
        let snap = Snapshot::from_json_str(
            r#"{"1200": {"Us Bytes": [5, 5], "Ds Bytes": [10]},
                "1100": {"Us Bytes": [1, 2], "Ds Bytes": [3]}}"#,
        )
        .unwrap();
        let samples = snap.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], Sample::new(1100, 3.0, 3.0));
        assert_eq!(samples[1], Sample::new(1200, 10.0, 10.0));
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let snap =
            Snapshot::from_json_str(r#"{"10": {"Us Bytes": ["7", " 3 "], "Ds Bytes": ["1"]}}"#)
                .unwrap();
        assert_eq!(snap.samples()[0], Sample::new(10, 10.0, 1.0));
    }

    #[test]
    fn non_positive_readings_are_excluded_from_totals() {
        let entry = FeedEntry::new(vec![100.0, -5.0, 0.0], vec![-1.0, 20.0]);
        assert_eq!(entry.totals(), (100.0, 20.0));
    }

    #[test]
    fn usage_block_is_an_alias_for_counter_arrays() {
        let value = json!({
            "5": {"Usage": {"CurrentTx(kbps)": [4, 4], "CurrentRx(kbps)": [8]}}
        });
        let snap = Snapshot::from_value(&value).unwrap();
        assert_eq!(snap.samples(), vec![Sample::new(5, 8.0, 8.0)]);
    }

    #[test]
    fn malformed_entries_are_skipped_and_counted() {
        let value = json!({
            "abc": {"Us Bytes": [1], "Ds Bytes": [1]},
            "20": {"Room": ["a"]},
            "30": {"Us Bytes": [1], "Ds Bytes": [2]},
        });
        let snap = Snapshot::from_value(&value).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.skipped(), 2);
    }

    #[test]
    fn empty_array_is_an_empty_snapshot() {
        let snap = Snapshot::from_value(&json!([])).unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn scalar_top_level_is_rejected() {
        let err = Snapshot::from_value(&json!(42)).unwrap_err();
        assert!(matches!(err, FeedError::NotAnObject { found: "a number" }));
        assert!(Snapshot::from_json_str("{not json").is_err());
    }

    #[test]
    fn devices_come_from_the_latest_entry_only() {
        let value = json!({
            "100": {"Us Bytes": [1], "Ds Bytes": [1], "Room": ["old"], "MAC": ["x"]},
            "200": {
                "Us Bytes": [1_000_000_000u64, 500_000_000u64],
                "Ds Bytes": [1_000_000_000u64, -3],
                "Room": ["101", "102"],
                "MAC": ["aa:bb", "cc:dd"],
                "Number": [1, 2],
                "US_Pwr": ["40.5", null],
                "DS_SNR": [35.1, 36.0]
            }
        });
        let snap = Snapshot::from_value(&value).unwrap();
        let devices = snap.devices();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].room, "101");
        assert_eq!(devices[1].number, "2");
        assert_eq!(devices[0].us_power, Some(40.5));
        assert_eq!(devices[1].us_power, None);
        assert_eq!(devices[1].ds_power, None);
        assert!((devices[0].usage_gb - 2.0).abs() < 1e-12);
        assert!((devices[1].usage_gb - 0.5).abs() < 1e-12);
        assert!((snap.latest_usage_gb() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn counter_value_round_trips_totals() {
        let snap = Snapshot::from_samples(&[Sample::new(1, 10.0, 20.0), Sample::new(2, 15.0, 30.0)]);
        let value = snap.to_counter_value();
        assert_eq!(value["1"]["Us Bytes"], json!([10]));
        let back = Snapshot::from_value(&value).unwrap();
        assert_eq!(back.samples(), snap.samples());
    }

    #[test]
    fn load_reads_plain_and_gzip_files() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"1": {"Us Bytes": [1], "Ds Bytes": [2]}}"#;

        let plain = dir.path().join("1.json");
        std::fs::write(&plain, body).unwrap();
        assert_eq!(Snapshot::load(&plain).unwrap().len(), 1);

        let gz = dir.path().join("2.json.gz");
        let mut enc = GzEncoder::new(std::fs::File::create(&gz).unwrap(), Compression::default());
        enc.write_all(body.as_bytes()).unwrap();
        enc.finish().unwrap();
        assert_eq!(Snapshot::load(&gz).unwrap().samples()[0], Sample::new(1, 1.0, 2.0));

        let missing = Snapshot::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, FeedError::Io { .. }));
    }
}
