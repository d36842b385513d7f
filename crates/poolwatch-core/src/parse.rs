//! Turns `zpool list -j` / `zpool status -j` JSON trees into [`PoolStatus`]
//! values and merges the two views. Parsing is deliberately defensive: a
//! malformed pool is logged and skipped so its siblings still come through,
//! and field-name drift between ZFS releases is absorbed here.

use crate::error::{PoolwatchError, PoolwatchResult};
use crate::model::{PoolHealth, PoolStatus};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Size strings with binary suffixes, e.g. "1.5T" or "500G".
static SIZE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9.]+)\s*([KMGTP])$").expect("size pattern compiles"));

/// Unix-epoch candidates for the scrub completion time, probed in order.
const SCRUB_EPOCH_FIELDS: &[&str] = &[
    "pass_start",
    "end_time",
    "scrub_end",
    "func_e",
    "finish_time",
];

/// Human-readable datetime candidates, probed after the epoch fields.
const SCRUB_DATETIME_FIELDS: &[&str] = &["end_time", "start_time"];

/// Bound on the memoized size-string cache. The same handful of size values
/// recurs across pools, so a small cache removes the repeated conversions.
const SIZE_CACHE_CAPACITY: usize = 32;

#[derive(Debug, Default, Clone, Copy)]
struct ErrorCounts {
    read: u64,
    write: u64,
    checksum: u64,
}

#[derive(Debug, Default)]
struct ScrubInfo {
    last_scrub: Option<DateTime<Utc>>,
    scrub_errors: u64,
    scrub_in_progress: bool,
}

/// Parser for ZFS JSON output.
#[derive(Debug, Default)]
pub struct ZfsParser {
    size_cache: Mutex<HashMap<String, u64>>,
}

impl ZfsParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `zpool list -j` output. Populates capacity fields; error and
    /// scrub fields stay at their defaults.
    pub fn parse_pool_list(&self, json: &Value) -> PoolwatchResult<BTreeMap<String, PoolStatus>> {
        let mut pools = BTreeMap::new();
        let pools_data = match Self::pools_object(json, "zpool list")? {
            Some(map) => map,
            None => return Ok(pools),
        };

        for (pool_name, pool_data) in pools_data {
            match self.parse_pool_from_list(pool_name, pool_data) {
                Ok(status) => {
                    debug!("parsed pool from list: {pool_name}");
                    pools.insert(pool_name.clone(), status);
                }
                Err(err) => {
                    error!("failed to parse pool {pool_name} from list: {err}");
                }
            }
        }

        Ok(pools)
    }

    /// Parse `zpool status -j` output. Populates health, error counters, and
    /// scrub fields; capacity fields stay at their defaults.
    pub fn parse_pool_status(&self, json: &Value) -> PoolwatchResult<BTreeMap<String, PoolStatus>> {
        let mut pools = BTreeMap::new();
        let pools_data = match Self::pools_object(json, "zpool status")? {
            Some(map) => map,
            None => return Ok(pools),
        };

        for (pool_name, pool_data) in pools_data {
            match Self::parse_pool_from_status(pool_name, pool_data) {
                Ok(status) => {
                    debug!("parsed pool from status: {pool_name}");
                    pools.insert(pool_name.clone(), status);
                }
                Err(err) => {
                    error!("failed to parse pool {pool_name} from status: {err}");
                }
            }
        }

        Ok(pools)
    }

    /// Combine the two command views: capacity from `list`, health, errors,
    /// and scrub data from `status`. Status health wins when both sources
    /// report a pool. Pools seen by only one command pass through with the
    /// other side's defaults.
    pub fn merge_pool_data(
        &self,
        list_data: BTreeMap<String, PoolStatus>,
        status_data: BTreeMap<String, PoolStatus>,
    ) -> BTreeMap<String, PoolStatus> {
        let mut merged = BTreeMap::new();

        for (pool_name, list_pool) in list_data {
            if let Some(status_pool) = status_data.get(&pool_name) {
                merged.insert(
                    pool_name.clone(),
                    PoolStatus {
                        name: pool_name,
                        health: status_pool.health,
                        capacity_percent: list_pool.capacity_percent,
                        size_bytes: list_pool.size_bytes,
                        allocated_bytes: list_pool.allocated_bytes,
                        free_bytes: list_pool.free_bytes,
                        read_errors: status_pool.read_errors,
                        write_errors: status_pool.write_errors,
                        checksum_errors: status_pool.checksum_errors,
                        last_scrub: status_pool.last_scrub,
                        scrub_errors: status_pool.scrub_errors,
                        scrub_in_progress: status_pool.scrub_in_progress,
                    },
                );
            } else {
                merged.insert(pool_name, list_pool);
            }
        }

        for (pool_name, status_pool) in status_data {
            if !merged.contains_key(&pool_name) {
                warn!("pool {pool_name} in status but not in list");
                merged.insert(pool_name, status_pool);
            }
        }

        merged
    }

    /// Pull out the `pools` object, distinguishing "nothing reported" from a
    /// malformed document.
    fn pools_object<'a>(
        json: &'a Value,
        source: &str,
    ) -> PoolwatchResult<Option<&'a Map<String, Value>>> {
        match json.get("pools") {
            None => {
                warn!("no pools found in {source} output");
                Ok(None)
            }
            Some(Value::Object(map)) if map.is_empty() => {
                warn!("no pools found in {source} output");
                Ok(None)
            }
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(PoolwatchError::Parse(format!(
                "{source}: pools entry is {} rather than an object",
                json_type_name(other)
            ))),
        }
    }

    fn parse_pool_from_list(&self, pool_name: &str, pool_data: &Value) -> PoolwatchResult<PoolStatus> {
        let pool_data = pool_data.as_object().ok_or_else(|| {
            PoolwatchError::Parse(format!("pool {pool_name} entry is not an object"))
        })?;
        let empty = Map::new();
        let props = pool_data
            .get("properties")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let health_value = property_value(props, "health", "UNKNOWN");
        let health = PoolHealth::from_zfs(&health_value, pool_name);

        let mut status = PoolStatus::empty(pool_name, health);
        self.extract_capacity_metrics(props, &mut status);
        Ok(status)
    }

    fn parse_pool_from_status(pool_name: &str, pool_data: &Value) -> PoolwatchResult<PoolStatus> {
        let pool_data = pool_data.as_object().ok_or_else(|| {
            PoolwatchError::Parse(format!("pool {pool_name} entry is not an object"))
        })?;

        let state = pool_data
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");
        let health = PoolHealth::from_zfs(state, pool_name);

        let errors = extract_error_counts(pool_data);
        let scrub = extract_scrub_info(pool_data)?;

        let mut status = PoolStatus::empty(pool_name, health);
        status.read_errors = errors.read;
        status.write_errors = errors.write;
        status.checksum_errors = errors.checksum;
        status.last_scrub = scrub.last_scrub;
        status.scrub_errors = scrub.scrub_errors;
        status.scrub_in_progress = scrub.scrub_in_progress;
        Ok(status)
    }

    fn extract_capacity_metrics(&self, props: &Map<String, Value>, status: &mut PoolStatus) {
        let capacity_raw = property_value(props, "capacity", "0");
        let capacity_str = capacity_raw.trim_end_matches('%');
        status.capacity_percent = match capacity_str.parse::<f64>() {
            Ok(percent) => percent,
            Err(_) => {
                warn!("invalid capacity value '{capacity_str}', using 0.0 as fallback");
                0.0
            }
        };

        status.size_bytes = self.size_or_zero(&property_value(props, "size", "0"));
        status.allocated_bytes = self.size_or_zero(&property_value(props, "allocated", "0"));
        status.free_bytes = self.size_or_zero(&property_value(props, "free", "0"));
    }

    fn size_or_zero(&self, size_str: &str) -> u64 {
        match self.parse_size_to_bytes(size_str) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("{err}; using 0");
                0
            }
        }
    }

    /// Convert a size string to bytes. Accepts plain numerics ("1000000",
    /// "1.5") and binary suffixes K/M/G/T/P with 1024-based multipliers.
    /// Successful conversions are memoized.
    pub fn parse_size_to_bytes(&self, size_str: &str) -> PoolwatchResult<u64> {
        if let Some(cached) = self.size_cache.lock().unwrap().get(size_str) {
            return Ok(*cached);
        }

        let bytes = Self::convert_size(size_str)?;

        let mut cache = self.size_cache.lock().unwrap();
        if cache.len() >= SIZE_CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(size_str.to_string(), bytes);
        Ok(bytes)
    }

    fn convert_size(size_str: &str) -> PoolwatchResult<u64> {
        if let Ok(plain) = size_str.parse::<f64>() {
            if plain.is_finite() && plain >= 0.0 {
                return Ok(plain as u64);
            }
        }

        let normalized = size_str.trim().to_uppercase();
        let captures = SIZE_PATTERN.captures(&normalized).ok_or_else(|| {
            PoolwatchError::Parse(format!(
                "cannot parse size string '{size_str}' - expected number or number+suffix (K/M/G/T/P)"
            ))
        })?;

        let value: f64 = captures[1].parse().map_err(|_| {
            PoolwatchError::Parse(format!("invalid numeric value in size string '{size_str}'"))
        })?;

        let multiplier: u64 = match &captures[2] {
            "K" => 1u64 << 10,
            "M" => 1u64 << 20,
            "G" => 1u64 << 30,
            "T" => 1u64 << 40,
            "P" => 1u64 << 50,
            _ => unreachable!("pattern restricts suffixes"),
        };

        Ok((value * multiplier as f64) as u64)
    }
}

/// Read a `{"value": ...}` property envelope, stringifying scalars the way
/// the CLI emits them.
fn property_value(props: &Map<String, Value>, key: &str, default: &str) -> String {
    match props.get(key) {
        Some(Value::Object(envelope)) => match envelope.get("value") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => default.to_string(),
        },
        _ => default.to_string(),
    }
}

/// Total error counts for the pool's root vdev. Two schema eras exist:
/// newer releases nest them under `vdevs.<pool-name>`, older ones under
/// `vdev_tree.stats`. Unparseable or absent blocks fall back to zeros.
fn extract_error_counts(pool_data: &Map<String, Value>) -> ErrorCounts {
    if let Some(vdevs) = pool_data.get("vdevs").and_then(Value::as_object) {
        let pool_name = pool_data.get("name").and_then(Value::as_str).unwrap_or("");
        let root_vdev = vdevs
            .get(pool_name)
            .and_then(Value::as_object)
            .filter(|map| !map.is_empty());
        if let Some(root_vdev) = root_vdev {
            if let Some(counts) = error_counts_from(root_vdev) {
                return counts;
            }
        }
    }

    if let Some(stats) = pool_data
        .get("vdev_tree")
        .and_then(Value::as_object)
        .and_then(|tree| tree.get("stats"))
        .and_then(Value::as_object)
    {
        if let Some(counts) = error_counts_from(stats) {
            return counts;
        }
    }

    ErrorCounts::default()
}

/// Read the three counters from one stats block. A field that is present but
/// not coercible disqualifies the whole block so the caller can try the
/// other schema era.
fn error_counts_from(stats: &Map<String, Value>) -> Option<ErrorCounts> {
    let field = |name: &str| -> Option<u64> {
        match stats.get(name) {
            None => Some(0),
            Some(value) => coerce_u64(value),
        }
    };

    Some(ErrorCounts {
        read: field("read_errors")?,
        write: field("write_errors")?,
        checksum: field("checksum_errors")?,
    })
}

fn extract_scrub_info(pool_data: &Map<String, Value>) -> PoolwatchResult<ScrubInfo> {
    let scan_value = pool_data.get("scan_stats").or_else(|| pool_data.get("scan"));
    let scan_info = match scan_value {
        None => return Ok(ScrubInfo::default()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(PoolwatchError::Parse(format!(
                "scan block is {} rather than an object",
                json_type_name(other)
            )))
        }
    };

    let scrub_errors = match scan_info.get("errors") {
        None => 0,
        Some(value) => coerce_u64(value).unwrap_or_else(|| {
            warn!("invalid scrub errors value {value}, using 0");
            0
        }),
    };

    let state = scan_info
        .get("state")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_uppercase();

    Ok(ScrubInfo {
        last_scrub: parse_scrub_time(scan_info),
        scrub_errors,
        scrub_in_progress: state == "SCANNING",
    })
}

/// Resolve the last-scrub timestamp. ZFS releases disagree on both the field
/// name and the representation, so epoch fields are probed first and
/// human-readable strings second. Everything normalizes to UTC.
fn parse_scrub_time(scan_info: &Map<String, Value>) -> Option<DateTime<Utc>> {
    for field in SCRUB_EPOCH_FIELDS {
        if let Some(value) = scan_info.get(*field) {
            let epoch = match value {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            if let Some(epoch) = epoch {
                if let Some(ts) = Utc.timestamp_opt(epoch, 0).single() {
                    return Some(ts);
                }
                debug!("epoch value {epoch} in field '{field}' is out of range");
            }
        }
    }

    for field in SCRUB_DATETIME_FIELDS {
        if let Some(text) = scan_info.get(*field).and_then(Value::as_str) {
            if let Some(ts) = parse_datetime_string(text) {
                return Some(ts);
            }
            debug!("failed to parse datetime string '{text}' in field '{field}'");
        }
    }

    debug!(
        "no valid scrub timestamp found, available fields: {:?}",
        scan_info.keys().collect::<Vec<_>>()
    );
    None
}

/// Best-effort datetime parsing across the formats seen in the wild. Naive
/// timestamps are assumed UTC.
fn parse_datetime_string(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%a %b %e %H:%M:%S %Y") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    // ctime with a timezone abbreviation, e.g. "Sun Nov 16 08:00:21 CET 2025".
    // chrono cannot resolve abbreviations, so the zone token is dropped and
    // the remainder is treated as UTC.
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() == 6 && tokens[4].chars().all(|c| c.is_ascii_alphabetic()) {
        let stripped = format!(
            "{} {} {} {} {}",
            tokens[0], tokens[1], tokens[2], tokens[3], tokens[5]
        );
        if let Ok(naive) = NaiveDateTime::parse_from_str(&stripped, "%a %b %e %H:%M:%S %Y") {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    None
}

fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u)
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }
        }
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list_payload(capacity: &str, size: &str, allocated: &str, free: &str) -> Value {
        json!({
            "output_version": {"command": "zpool list"},
            "pools": {
                "rpool": {
                    "name": "rpool",
                    "properties": {
                        "health": {"value": "ONLINE"},
                        "capacity": {"value": capacity},
                        "size": {"value": size},
                        "allocated": {"value": allocated},
                        "free": {"value": free},
                    }
                }
            }
        })
    }

    #[test]
    fn parse_pool_list_extracts_capacity_fields() {
        let parser = ZfsParser::new();
        let pools = parser
            .parse_pool_list(&list_payload("45%", "1000000000", "450000000", "550000000"))
            .unwrap();

        let pool = &pools["rpool"];
        assert_eq!(pool.health, PoolHealth::Online);
        assert_eq!(pool.capacity_percent, 45.0);
        assert_eq!(pool.size_bytes, 1_000_000_000);
        assert_eq!(pool.allocated_bytes, 450_000_000);
        assert_eq!(pool.free_bytes, 550_000_000);
        assert_eq!(pool.read_errors, 0, "list output carries no error counts");
        assert!(pool.last_scrub.is_none());
    }

    #[test]
    fn parse_pool_list_handles_binary_suffixes() {
        let parser = ZfsParser::new();
        let pools = parser
            .parse_pool_list(&list_payload("45", "1.5T", "500G", "10M"))
            .unwrap();

        let pool = &pools["rpool"];
        assert_eq!(pool.size_bytes, 1_649_267_441_664);
        assert_eq!(pool.allocated_bytes, 536_870_912_000);
        assert_eq!(pool.free_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn size_suffixes_use_binary_multipliers() {
        let parser = ZfsParser::new();
        for (text, expected) in [
            ("1K", 1u64 << 10),
            ("1M", 1u64 << 20),
            ("1G", 1u64 << 30),
            ("1T", 1u64 << 40),
            ("1P", 1u64 << 50),
            ("2.5K", 2560),
        ] {
            assert_eq!(parser.parse_size_to_bytes(text).unwrap(), expected, "{text}");
        }
    }

    #[test]
    fn unparseable_size_defaults_to_zero_without_dropping_pool() {
        let parser = ZfsParser::new();
        let pools = parser
            .parse_pool_list(&list_payload("45", "weird", "450000000", "550000000"))
            .unwrap();

        let pool = &pools["rpool"];
        assert_eq!(pool.size_bytes, 0);
        assert_eq!(pool.allocated_bytes, 450_000_000);
    }

    #[test]
    fn invalid_capacity_falls_back_to_zero() {
        let parser = ZfsParser::new();
        let pools = parser
            .parse_pool_list(&list_payload("n/a", "100", "50", "50"))
            .unwrap();
        assert_eq!(pools["rpool"].capacity_percent, 0.0);
    }

    #[test]
    fn missing_pools_key_yields_empty_map() {
        let parser = ZfsParser::new();
        assert!(parser.parse_pool_list(&json!({})).unwrap().is_empty());
        assert!(parser
            .parse_pool_list(&json!({"pools": {}}))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn non_object_pools_entry_is_a_parse_error() {
        let parser = ZfsParser::new();
        assert!(matches!(
            parser.parse_pool_list(&json!({"pools": [1, 2]})),
            Err(PoolwatchError::Parse(_))
        ));
    }

    fn status_payload_new_era() -> Value {
        json!({
            "pools": {
                "tank": {
                    "name": "tank",
                    "state": "DEGRADED",
                    "vdevs": {
                        "tank": {
                            "read_errors": 3,
                            "write_errors": "1",
                            "checksum_errors": 0,
                        }
                    },
                    "scan_stats": {
                        "function": "SCRUB",
                        "state": "FINISHED",
                        "end_time": 1736899200,
                        "errors": 0,
                    }
                }
            }
        })
    }

    fn status_payload_old_era() -> Value {
        json!({
            "pools": {
                "tank": {
                    "name": "tank",
                    "state": "DEGRADED",
                    "vdev_tree": {
                        "stats": {
                            "read_errors": 3,
                            "write_errors": 1,
                            "checksum_errors": "0",
                        }
                    },
                    "scan": {
                        "function": "SCRUB",
                        "state": "finished",
                        "scrub_end": "1736899200",
                        "errors": "0",
                    }
                }
            }
        })
    }

    #[test]
    fn both_schema_eras_yield_identical_status() {
        let parser = ZfsParser::new();
        let newer = parser.parse_pool_status(&status_payload_new_era()).unwrap();
        let older = parser.parse_pool_status(&status_payload_old_era()).unwrap();
        assert_eq!(newer["tank"], older["tank"]);

        let pool = &newer["tank"];
        assert_eq!(pool.health, PoolHealth::Degraded);
        assert_eq!(pool.read_errors, 3);
        assert_eq!(pool.write_errors, 1);
        assert_eq!(pool.checksum_errors, 0);
        assert!(!pool.scrub_in_progress);
        assert_eq!(
            pool.last_scrub,
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn malformed_scan_block_skips_pool_but_keeps_siblings() {
        let parser = ZfsParser::new();
        let payload = json!({
            "pools": {
                "good": {
                    "name": "good",
                    "state": "ONLINE",
                    "scan_stats": {"state": "FINISHED", "end_time": 1736899200, "errors": 0},
                },
                "broken": {
                    "name": "broken",
                    "state": "ONLINE",
                    "scan": "resilver in progress",
                },
            }
        });

        let pools = parser.parse_pool_status(&payload).unwrap();
        assert_eq!(pools.len(), 1);
        assert!(pools.contains_key("good"));
    }

    #[test]
    fn scrub_in_progress_is_case_insensitive() {
        let parser = ZfsParser::new();
        let payload = json!({
            "pools": {
                "tank": {
                    "name": "tank",
                    "state": "ONLINE",
                    "scan_stats": {"state": "scanning", "errors": 0},
                }
            }
        });
        assert!(parser.parse_pool_status(&payload).unwrap()["tank"].scrub_in_progress);
    }

    #[test]
    fn scrub_datetime_strings_are_parsed_and_normalized() {
        let mut scan = Map::new();
        scan.insert(
            "end_time".to_string(),
            Value::String("Sun Nov 16 08:00:21 CET 2025".to_string()),
        );
        let parsed = parse_scrub_time(&scan).unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2025, 11, 16, 8, 0, 21).unwrap()
        );

        let mut scan = Map::new();
        scan.insert(
            "start_time".to_string(),
            Value::String("2025-01-14 06:30:00".to_string()),
        );
        assert_eq!(
            parse_scrub_time(&scan).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 14, 6, 30, 0).unwrap()
        );
    }

    #[test]
    fn missing_scan_block_means_never_scrubbed() {
        let parser = ZfsParser::new();
        let payload = json!({
            "pools": {"tank": {"name": "tank", "state": "ONLINE"}}
        });
        let pool = &parser.parse_pool_status(&payload).unwrap()["tank"];
        assert!(pool.last_scrub.is_none());
        assert_eq!(pool.scrub_errors, 0);
        assert!(!pool.scrub_in_progress);
    }

    #[test]
    fn unknown_health_state_becomes_offline() {
        let parser = ZfsParser::new();
        let payload = json!({
            "pools": {"tank": {"name": "tank", "state": "SPLIT"}}
        });
        assert_eq!(
            parser.parse_pool_status(&payload).unwrap()["tank"].health,
            PoolHealth::Offline
        );
    }

    #[test]
    fn merge_prefers_status_health_and_combines_fields() {
        let parser = ZfsParser::new();

        let mut list_pool = PoolStatus::empty("tank", PoolHealth::Online);
        list_pool.capacity_percent = 85.0;
        list_pool.size_bytes = 1000;
        list_pool.allocated_bytes = 850;
        list_pool.free_bytes = 150;

        let mut status_pool = PoolStatus::empty("tank", PoolHealth::Degraded);
        status_pool.read_errors = 2;
        status_pool.scrub_errors = 1;
        status_pool.scrub_in_progress = true;

        let merged = parser.merge_pool_data(
            BTreeMap::from([("tank".to_string(), list_pool)]),
            BTreeMap::from([("tank".to_string(), status_pool)]),
        );

        let pool = &merged["tank"];
        assert_eq!(pool.health, PoolHealth::Degraded);
        assert_eq!(pool.capacity_percent, 85.0);
        assert_eq!(pool.size_bytes, 1000);
        assert_eq!(pool.read_errors, 2);
        assert_eq!(pool.scrub_errors, 1);
        assert!(pool.scrub_in_progress);
    }

    #[test]
    fn merge_passes_through_one_sided_pools() {
        let parser = ZfsParser::new();
        let list_only = PoolStatus::empty("listy", PoolHealth::Online);
        let status_only = PoolStatus::empty("statusy", PoolHealth::Degraded);

        let merged = parser.merge_pool_data(
            BTreeMap::from([("listy".to_string(), list_only)]),
            BTreeMap::from([("statusy".to_string(), status_only)]),
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged["listy"].health, PoolHealth::Online);
        assert_eq!(merged["statusy"].health, PoolHealth::Degraded);
    }

    #[test]
    fn error_block_with_garbage_falls_back_to_other_era() {
        // The newer block is present but unparseable, so the older block wins.
        let parser = ZfsParser::new();
        let payload = json!({
            "pools": {
                "tank": {
                    "name": "tank",
                    "state": "ONLINE",
                    "vdevs": {"tank": {"read_errors": "lots"}},
                    "vdev_tree": {"stats": {"read_errors": 7}},
                }
            }
        });
        assert_eq!(parser.parse_pool_status(&payload).unwrap()["tank"].read_errors, 7);
    }

    #[test]
    fn size_cache_returns_consistent_values() {
        let parser = ZfsParser::new();
        assert_eq!(parser.parse_size_to_bytes("500G").unwrap(), 536_870_912_000);
        assert_eq!(parser.parse_size_to_bytes("500G").unwrap(), 536_870_912_000);
    }
}
