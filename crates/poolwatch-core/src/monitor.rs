//! Threshold engine: maps raw pool state to classified issues. All rules are
//! independent, so one pool can emit anything from zero to six issues in a
//! single pass.

use crate::config::MonitorCfg;
use crate::model::{CheckResult, IssueCategory, PoolIssue, PoolStatus, Severity};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::json;
use std::collections::BTreeMap;

/// Applies the configured thresholds to pool snapshots.
#[derive(Debug, Clone)]
pub struct PoolMonitor {
    config: MonitorCfg,
}

impl PoolMonitor {
    pub fn new(config: MonitorCfg) -> Self {
        info!(
            "pool monitor initialized (capacity {}%/{}%, scrub max age {} days)",
            config.capacity_warning_percent,
            config.capacity_critical_percent,
            config.scrub_max_age_days
        );
        Self { config }
    }

    /// Check a single pool against every rule.
    pub fn check_pool(&self, pool: &PoolStatus) -> Vec<PoolIssue> {
        self.check_pool_at(pool, Utc::now())
    }

    /// Rule evaluation against an explicit "now", so age checks stay
    /// deterministic under test.
    pub fn check_pool_at(&self, pool: &PoolStatus, now: DateTime<Utc>) -> Vec<PoolIssue> {
        let mut issues = Vec::new();

        debug!("checking pool: {}", pool.name);

        if let Some(issue) = self.check_health(pool) {
            issues.push(issue);
        }
        if let Some(issue) = self.check_capacity(pool) {
            issues.push(issue);
        }
        issues.extend(self.check_errors(pool));
        if let Some(issue) = self.check_scrub(pool, now) {
            issues.push(issue);
        }

        debug!("pool check complete: {} ({} issues)", pool.name, issues.len());
        issues
    }

    /// Check every pool and aggregate into one result. Overall severity is
    /// the maximum across all issues, or `OK` when there are none.
    pub fn check_all_pools(&self, pools: &BTreeMap<String, PoolStatus>) -> CheckResult {
        self.check_all_pools_at(pools, Utc::now())
    }

    pub fn check_all_pools_at(
        &self,
        pools: &BTreeMap<String, PoolStatus>,
        now: DateTime<Utc>,
    ) -> CheckResult {
        info!("checking {} pools", pools.len());

        let mut all_issues = Vec::new();
        let mut pool_list = Vec::with_capacity(pools.len());

        for pool in pools.values() {
            pool_list.push(pool.clone());
            all_issues.extend(self.check_pool_at(pool, now));
        }

        let overall_severity = all_issues
            .iter()
            .map(|issue| issue.severity)
            .max()
            .unwrap_or(Severity::Ok);

        info!(
            "pool check completed: {} pools, {} issues, severity {}",
            pools.len(),
            all_issues.len(),
            overall_severity
        );

        CheckResult {
            timestamp: now,
            pools: pool_list,
            issues: all_issues,
            overall_severity,
        }
    }

    fn check_health(&self, pool: &PoolStatus) -> Option<PoolIssue> {
        if pool.health.is_healthy() {
            return None;
        }

        let severity = if pool.health.is_critical() {
            Severity::Critical
        } else {
            Severity::Warning
        };

        Some(PoolIssue {
            pool_name: pool.name.clone(),
            severity,
            category: IssueCategory::Health,
            message: format!("Pool is {} (expected: ONLINE)", pool.health),
            details: BTreeMap::from([
                ("current_state".to_string(), json!(pool.health.as_str())),
                ("expected_state".to_string(), json!("ONLINE")),
            ]),
        })
    }

    fn check_capacity(&self, pool: &PoolStatus) -> Option<PoolIssue> {
        let (severity, threshold, label) =
            if pool.capacity_percent >= self.config.capacity_critical_percent {
                (
                    Severity::Critical,
                    self.config.capacity_critical_percent,
                    "critical",
                )
            } else if pool.capacity_percent >= self.config.capacity_warning_percent {
                (
                    Severity::Warning,
                    self.config.capacity_warning_percent,
                    "warning",
                )
            } else {
                return None;
            };

        Some(PoolIssue {
            pool_name: pool.name.clone(),
            severity,
            category: IssueCategory::Capacity,
            message: format!(
                "Pool at {:.1}% capacity ({label} threshold: {}%)",
                pool.capacity_percent, threshold
            ),
            details: BTreeMap::from([
                ("capacity_percent".to_string(), json!(pool.capacity_percent)),
                ("threshold".to_string(), json!(threshold)),
                ("size_bytes".to_string(), json!(pool.size_bytes)),
                ("allocated_bytes".to_string(), json!(pool.allocated_bytes)),
                ("free_bytes".to_string(), json!(pool.free_bytes)),
            ]),
        })
    }

    /// Read, write, and checksum counters are judged independently: a counter
    /// fires only when it is both strictly positive and at or above its
    /// threshold.
    fn check_errors(&self, pool: &PoolStatus) -> Vec<PoolIssue> {
        let mut issues = Vec::new();

        if pool.read_errors > 0 && pool.read_errors >= self.config.read_errors_warning {
            issues.push(PoolIssue {
                pool_name: pool.name.clone(),
                severity: Severity::Warning,
                category: IssueCategory::Errors,
                message: format!("Pool has {} read errors", pool.read_errors),
                details: BTreeMap::from([
                    ("read_errors".to_string(), json!(pool.read_errors)),
                    ("threshold".to_string(), json!(self.config.read_errors_warning)),
                ]),
            });
        }

        if pool.write_errors > 0 && pool.write_errors >= self.config.write_errors_warning {
            issues.push(PoolIssue {
                pool_name: pool.name.clone(),
                severity: Severity::Warning,
                category: IssueCategory::Errors,
                message: format!("Pool has {} write errors", pool.write_errors),
                details: BTreeMap::from([
                    ("write_errors".to_string(), json!(pool.write_errors)),
                    ("threshold".to_string(), json!(self.config.write_errors_warning)),
                ]),
            });
        }

        if pool.checksum_errors > 0 && pool.checksum_errors >= self.config.checksum_errors_warning {
            issues.push(PoolIssue {
                pool_name: pool.name.clone(),
                severity: Severity::Warning,
                category: IssueCategory::Errors,
                message: format!(
                    "Pool has {} checksum errors (possible data corruption)",
                    pool.checksum_errors
                ),
                details: BTreeMap::from([
                    ("checksum_errors".to_string(), json!(pool.checksum_errors)),
                    (
                        "threshold".to_string(),
                        json!(self.config.checksum_errors_warning),
                    ),
                ]),
            });
        }

        issues
    }

    fn check_scrub(&self, pool: &PoolStatus, now: DateTime<Utc>) -> Option<PoolIssue> {
        if pool.scrub_errors > 0 {
            return Some(PoolIssue {
                pool_name: pool.name.clone(),
                severity: Severity::Warning,
                category: IssueCategory::Scrub,
                message: format!("Last scrub found {} errors", pool.scrub_errors),
                details: BTreeMap::from([
                    ("scrub_errors".to_string(), json!(pool.scrub_errors)),
                    (
                        "last_scrub".to_string(),
                        json!(pool.last_scrub.map(|ts| ts.to_rfc3339())),
                    ),
                ]),
            });
        }

        if self.config.scrub_max_age_days == 0 {
            return None;
        }

        let last_scrub = match pool.last_scrub {
            Some(ts) => ts,
            None => {
                return Some(PoolIssue {
                    pool_name: pool.name.clone(),
                    severity: Severity::Info,
                    category: IssueCategory::Scrub,
                    message: "Pool has never been scrubbed".to_string(),
                    details: BTreeMap::from([("last_scrub".to_string(), json!(null))]),
                })
            }
        };

        let age_days = (now - last_scrub).num_days();
        if age_days > self.config.scrub_max_age_days {
            return Some(PoolIssue {
                pool_name: pool.name.clone(),
                severity: Severity::Info,
                category: IssueCategory::Scrub,
                message: format!(
                    "Pool scrub is {age_days} days old (max age: {} days)",
                    self.config.scrub_max_age_days
                ),
                details: BTreeMap::from([
                    ("last_scrub".to_string(), json!(last_scrub.to_rfc3339())),
                    ("age_days".to_string(), json!(age_days)),
                    (
                        "max_age_days".to_string(),
                        json!(self.config.scrub_max_age_days),
                    ),
                ]),
            });
        }

        None
    }
}
