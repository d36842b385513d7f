//! Domain types shared across the poolwatch stack: pool health, severities,
//! per-pool status snapshots, and the issues the threshold engine derives
//! from them.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Health states reported by `zpool` for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PoolHealth {
    Online,
    Degraded,
    Faulted,
    Offline,
    Unavail,
    Removed,
}

impl PoolHealth {
    /// Translate the raw state string from ZFS output.
    ///
    /// Unknown strings fall back to `Offline` with a warning so one odd pool
    /// never takes down a whole parse.
    pub fn from_zfs(value: &str, pool_name: &str) -> Self {
        match value {
            "ONLINE" => PoolHealth::Online,
            "DEGRADED" => PoolHealth::Degraded,
            "FAULTED" => PoolHealth::Faulted,
            "OFFLINE" => PoolHealth::Offline,
            "UNAVAIL" => PoolHealth::Unavail,
            "REMOVED" => PoolHealth::Removed,
            other => {
                warn!("unknown health state '{other}' for pool {pool_name}, using OFFLINE");
                PoolHealth::Offline
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolHealth::Online => "ONLINE",
            PoolHealth::Degraded => "DEGRADED",
            PoolHealth::Faulted => "FAULTED",
            PoolHealth::Offline => "OFFLINE",
            PoolHealth::Unavail => "UNAVAIL",
            PoolHealth::Removed => "REMOVED",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, PoolHealth::Online)
    }

    /// States that require immediate attention rather than investigation.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            PoolHealth::Faulted | PoolHealth::Unavail | PoolHealth::Removed
        )
    }
}

impl fmt::Display for PoolHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity, totally ordered from benign to urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of issue categories the threshold engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Health,
    Capacity,
    Errors,
    Scrub,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Health => "health",
            IssueCategory::Capacity => "capacity",
            IssueCategory::Errors => "errors",
            IssueCategory::Scrub => "scrub",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of a single pool, merged from `zpool list` and
/// `zpool status` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub name: String,
    pub health: PoolHealth,
    pub capacity_percent: f64,
    pub size_bytes: u64,
    pub allocated_bytes: u64,
    pub free_bytes: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub checksum_errors: u64,
    pub last_scrub: Option<DateTime<Utc>>,
    pub scrub_errors: u64,
    pub scrub_in_progress: bool,
}

impl PoolStatus {
    /// Snapshot with everything zeroed except name and health. The parsers
    /// fill in whichever side of the data they own.
    pub fn empty(name: impl Into<String>, health: PoolHealth) -> Self {
        Self {
            name: name.into(),
            health,
            capacity_percent: 0.0,
            size_bytes: 0,
            allocated_bytes: 0,
            free_bytes: 0,
            read_errors: 0,
            write_errors: 0,
            checksum_errors: 0,
            last_scrub: None,
            scrub_errors: 0,
            scrub_in_progress: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.read_errors > 0 || self.write_errors > 0 || self.checksum_errors > 0
    }

    pub fn total_errors(&self) -> u64 {
        self.read_errors + self.write_errors + self.checksum_errors
    }
}

/// A classified finding about one pool in one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolIssue {
    pub pool_name: String,
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
    /// Structured context for logs and e-mail bodies. Scalar values only.
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Outcome of checking every monitored pool once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub timestamp: DateTime<Utc>,
    pub pools: Vec<PoolStatus>,
    pub issues: Vec<PoolIssue>,
    pub overall_severity: Severity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_total() {
        assert!(Severity::Ok < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!(
            [Severity::Warning, Severity::Info, Severity::Critical]
                .iter()
                .max(),
            Some(&Severity::Critical)
        );
    }

    #[test]
    fn health_predicates_partition_states() {
        assert!(PoolHealth::Online.is_healthy());
        assert!(!PoolHealth::Degraded.is_healthy());
        for critical in [PoolHealth::Faulted, PoolHealth::Unavail, PoolHealth::Removed] {
            assert!(critical.is_critical(), "{critical} should be critical");
        }
        assert!(!PoolHealth::Degraded.is_critical());
        assert!(!PoolHealth::Offline.is_critical());
    }

    #[test]
    fn unknown_health_falls_back_to_offline() {
        assert_eq!(PoolHealth::from_zfs("SPLIT", "tank"), PoolHealth::Offline);
        assert_eq!(PoolHealth::from_zfs("ONLINE", "tank"), PoolHealth::Online);
    }

    #[test]
    fn issue_category_round_trips_through_serde() {
        let json = serde_json::to_string(&IssueCategory::Capacity).unwrap();
        assert_eq!(json, "\"capacity\"");
        let back: IssueCategory = serde_json::from_str("\"scrub\"").unwrap();
        assert_eq!(back, IssueCategory::Scrub);
    }
}
