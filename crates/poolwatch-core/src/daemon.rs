//! Check-cycle orchestration for the monitoring daemon: acquisition, parsing,
//! classification, alert dispatch, and recovery detection. The surrounding
//! run loop (scheduling, signals) lives in the binary; everything here is
//! synchronous and testable with mock collaborators.

use crate::alert_state::AlertStateStore;
use crate::alerting::EmailAlerter;
use crate::config::{AlertCfg, DaemonCfg};
use crate::mail::MailTransport;
use crate::model::{CheckResult, IssueCategory, PoolStatus, Severity};
use crate::monitor::PoolMonitor;
use crate::parse::ZfsParser;
use crate::source::PoolSource;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Issue categories seen this cycle, per pool. The previous cycle's map is
/// what recovery detection diffs against.
pub type IssueSet = HashMap<String, HashSet<IssueCategory>>;

/// Drives one monitoring pipeline per cycle and owns the two pieces of
/// cross-cycle state: the persisted alert ledger and the previous cycle's
/// issue set.
pub struct PoolDaemon<S: PoolSource, M: MailTransport> {
    source: S,
    parser: ZfsParser,
    monitor: PoolMonitor,
    alerter: EmailAlerter<M>,
    state_store: AlertStateStore,
    pools_to_monitor: Vec<String>,
    send_ok_emails: bool,
    send_recovery_emails: bool,
    previous_issues: IssueSet,
}

impl<S: PoolSource, M: MailTransport> PoolDaemon<S, M> {
    pub fn new(
        source: S,
        monitor: PoolMonitor,
        alerter: EmailAlerter<M>,
        state_store: AlertStateStore,
        daemon_cfg: &DaemonCfg,
        alert_cfg: &AlertCfg,
    ) -> Self {
        Self {
            source,
            parser: ZfsParser::new(),
            monitor,
            alerter,
            state_store,
            pools_to_monitor: daemon_cfg.pools_to_monitor.clone(),
            send_ok_emails: alert_cfg.send_ok_emails,
            send_recovery_emails: alert_cfg.send_recovery_emails,
            previous_issues: IssueSet::new(),
        }
    }

    /// Execute one complete check cycle. This is the error firewall: every
    /// failure is logged and absorbed here so the run loop never dies.
    pub fn run_cycle(&mut self) {
        debug!("starting check cycle");

        let (list_data, status_data) = match self.fetch() {
            Ok(data) => data,
            Err(err) => {
                error!("failed to fetch ZFS data, skipping cycle: {err}");
                return;
            }
        };

        let mut pools = match self.parse_and_merge(&list_data, &status_data) {
            Ok(pools) => pools,
            Err(err) => {
                error!("failed to parse ZFS data, skipping cycle: {err}");
                return;
            }
        };

        if !self.pools_to_monitor.is_empty() {
            pools.retain(|name, _| self.pools_to_monitor.iter().any(|p| p == name));
            debug!(
                "filtered to monitored pools: {:?}",
                pools.keys().collect::<Vec<_>>()
            );
        }

        if pools.is_empty() {
            warn!("no pools found to monitor");
            return;
        }

        let result = self.monitor.check_all_pools(&pools);
        info!(
            "check cycle completed: {} pools, {} issues, severity {}",
            pools.len(),
            result.issues.len(),
            result.overall_severity
        );

        let current_issues = self.handle_check_result(&result, &pools);
        self.detect_recoveries(&current_issues, &pools);
        self.previous_issues = current_issues;
    }

    fn fetch(&self) -> crate::error::PoolwatchResult<(serde_json::Value, serde_json::Value)> {
        let list_data = self.source.pool_list()?;
        let status_data = self.source.pool_status()?;
        Ok((list_data, status_data))
    }

    fn parse_and_merge(
        &self,
        list_data: &serde_json::Value,
        status_data: &serde_json::Value,
    ) -> crate::error::PoolwatchResult<BTreeMap<String, PoolStatus>> {
        let pools_from_list = self.parser.parse_pool_list(list_data)?;
        let pools_from_status = self.parser.parse_pool_status(status_data)?;
        Ok(self.parser.merge_pool_data(pools_from_list, pools_from_status))
    }

    /// Dispatch alerts for actionable issues and return this cycle's issue
    /// set. An alert is recorded in the ledger only after delivery succeeds,
    /// so a failed send retries on the next cycle.
    fn handle_check_result(
        &mut self,
        result: &CheckResult,
        pools: &BTreeMap<String, PoolStatus>,
    ) -> IssueSet {
        let mut current_issues = IssueSet::new();

        for issue in &result.issues {
            current_issues
                .entry(issue.pool_name.clone())
                .or_default()
                .insert(issue.category);

            if issue.severity == Severity::Ok && !self.send_ok_emails {
                debug!(
                    "skipping OK issue for {} ({}): send_ok_emails disabled",
                    issue.pool_name, issue.category
                );
                continue;
            }

            if !self.state_store.should_alert(issue) {
                debug!(
                    "suppressing duplicate alert for {} ({})",
                    issue.pool_name, issue.category
                );
                continue;
            }

            let pool = match pools.get(&issue.pool_name) {
                Some(pool) => pool,
                None => {
                    warn!(
                        "cannot send alert - pool status not found for {}",
                        issue.pool_name
                    );
                    continue;
                }
            };

            if self.alerter.send_alert(issue, pool) {
                self.state_store.record_alert(issue);
                info!(
                    "alert sent and recorded for {} ({} / {})",
                    issue.pool_name, issue.category, issue.severity
                );
            } else {
                warn!(
                    "failed to send alert for {} ({})",
                    issue.pool_name, issue.category
                );
            }
        }

        current_issues
    }

    /// Every (pool, category) present last cycle but absent now has
    /// recovered. Recovery is per category: a pool still carrying other
    /// issues still gets a notice for the category that cleared.
    fn detect_recoveries(&mut self, current_issues: &IssueSet, pools: &BTreeMap<String, PoolStatus>) {
        if !self.send_recovery_emails {
            return;
        }

        let mut recovered = Vec::new();
        for (pool_name, prev_categories) in &self.previous_issues {
            let current_categories = current_issues.get(pool_name);
            for category in prev_categories {
                if current_categories.is_some_and(|set| set.contains(category)) {
                    continue;
                }

                info!("detected issue recovery: {pool_name} ({category})");
                if self.alerter.send_recovery(pool_name, *category, pools.get(pool_name)) {
                    recovered.push((pool_name.clone(), *category));
                }
            }
        }

        for (pool_name, category) in recovered {
            self.state_store.clear_issue(&pool_name, category);
            info!("recovery notification sent for {pool_name} ({category})");
        }
    }
}
