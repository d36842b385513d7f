//! Alert deduplication state, persisted across daemon restarts so a restart
//! never replays the whole alert backlog.

use crate::model::{IssueCategory, PoolIssue};
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const STATE_VERSION: u32 = 1;

/// Tracking record for one (pool, category) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub pool_name: String,
    pub issue_category: IssueCategory,
    pub first_seen: DateTime<Utc>,
    pub last_alerted: Option<DateTime<Utc>>,
    pub alert_count: u64,
}

#[derive(Debug, Deserialize)]
struct StateDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    alerts: HashMap<String, Value>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

#[derive(Serialize)]
struct StateDocumentOut<'a> {
    version: u32,
    alerts: &'a HashMap<String, AlertState>,
}

/// Decides whether an issue warrants a fresh alert, and remembers what was
/// already sent. Every mutation persists immediately; persistence failures
/// are logged and absorbed so the in-memory ledger stays authoritative.
#[derive(Debug)]
pub struct AlertStateStore {
    state_file: PathBuf,
    resend_interval: Duration,
    pub(crate) states: HashMap<String, AlertState>,
}

impl AlertStateStore {
    /// Open (or create) a store backed by `state_file`. The parent directory
    /// is created on first use; a missing file simply means empty state.
    pub fn new(state_file: PathBuf, resend_interval_hours: u64) -> Self {
        let mut store = Self {
            state_file,
            resend_interval: Duration::hours(resend_interval_hours as i64),
            states: HashMap::new(),
        };
        store.ensure_state_dir();
        store.load_state();
        store
    }

    fn ensure_state_dir(&self) {
        if let Some(parent) = self.state_file.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                error!("failed to create state directory {}: {err}", parent.display());
            }
        }
    }

    fn make_key(pool_name: &str, category: IssueCategory) -> String {
        format!("{pool_name}:{category}")
    }

    /// True when the issue is new, or when the resend interval has elapsed
    /// since the last alert for its (pool, category).
    pub fn should_alert(&self, issue: &PoolIssue) -> bool {
        let key = Self::make_key(&issue.pool_name, issue.category);
        let state = match self.states.get(&key) {
            None => {
                debug!("new issue detected: {key}");
                return true;
            }
            Some(state) => state,
        };

        let last_alerted = match state.last_alerted {
            None => {
                // State without a timestamp breaks the ledger invariant.
                warn!("issue {key} has state but no alert timestamp");
                return true;
            }
            Some(ts) => ts,
        };

        let elapsed = Utc::now() - last_alerted;
        let should_resend = elapsed >= self.resend_interval;

        if should_resend {
            info!(
                "resending alert for {key} after {:.1} hours",
                elapsed.num_minutes() as f64 / 60.0
            );
        } else {
            debug!("suppressing duplicate alert for {key}");
        }

        should_resend
    }

    /// Record a successful delivery: create or refresh the state row and
    /// persist.
    pub fn record_alert(&mut self, issue: &PoolIssue) {
        let key = Self::make_key(&issue.pool_name, issue.category);
        let now = Utc::now();

        match self.states.get_mut(&key) {
            Some(state) => {
                state.last_alerted = Some(now);
                state.alert_count += 1;
                debug!("updated alert state for {key} (count {})", state.alert_count);
            }
            None => {
                self.states.insert(
                    key.clone(),
                    AlertState {
                        pool_name: issue.pool_name.clone(),
                        issue_category: issue.category,
                        first_seen: now,
                        last_alerted: Some(now),
                        alert_count: 1,
                    },
                );
                debug!("created alert state for {key}");
            }
        }

        self.save_state();
    }

    /// Drop the state row for a recovered issue so a future recurrence alerts
    /// immediately. Returns whether a row existed.
    pub fn clear_issue(&mut self, pool_name: &str, category: IssueCategory) -> bool {
        let key = Self::make_key(pool_name, category);
        if self.states.remove(&key).is_some() {
            self.save_state();
            info!("cleared resolved issue {key}");
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, pool_name: &str, category: IssueCategory) -> Option<&AlertState> {
        self.states.get(&Self::make_key(pool_name, category))
    }

    /// Load persisted state. Missing files mean empty state; corrupt files or
    /// unknown versions log and start fresh; individually malformed entries
    /// are skipped so their siblings survive.
    fn load_state(&mut self) {
        if !self.state_file.exists() {
            info!("no state file found, starting with empty state");
            return;
        }

        let contents = match fs::read_to_string(&self.state_file) {
            Ok(contents) => contents,
            Err(err) => {
                error!(
                    "failed to read state file {}: {err}",
                    self.state_file.display()
                );
                return;
            }
        };

        let document: StateDocument = match serde_json::from_str(&contents) {
            Ok(document) => document,
            Err(err) => {
                error!(
                    "corrupt state file {}, starting fresh: {err}",
                    self.state_file.display()
                );
                return;
            }
        };

        if document.version != STATE_VERSION {
            warn!(
                "unknown state file version {}, starting fresh",
                document.version
            );
            return;
        }

        for (key, entry) in document.alerts {
            match serde_json::from_value::<AlertState>(entry) {
                Ok(state) => {
                    self.states.insert(key, state);
                }
                Err(err) => {
                    warn!("skipping corrupt state entry {key}: {err}");
                }
            }
        }

        info!(
            "loaded alert state ({} entries from {})",
            self.states.len(),
            self.state_file.display()
        );
    }

    /// Persist the ledger atomically: serialize to a sibling temp file and
    /// rename over the target. Failures are logged, never raised.
    fn save_state(&self) {
        let document = StateDocumentOut {
            version: STATE_VERSION,
            alerts: &self.states,
        };

        let temp_file = self.state_file.with_extension("tmp");
        let payload = match serde_json::to_string_pretty(&document) {
            Ok(payload) => payload,
            Err(err) => {
                error!("failed to serialize alert state: {err}");
                return;
            }
        };

        if let Err(err) = fs::write(&temp_file, payload) {
            error!(
                "failed to write state file {}: {err}",
                temp_file.display()
            );
            return;
        }
        if let Err(err) = fs::rename(&temp_file, &self.state_file) {
            error!(
                "failed to replace state file {}: {err}",
                self.state_file.display()
            );
        } else {
            debug!(
                "saved alert state ({} entries to {})",
                self.states.len(),
                self.state_file.display()
            );
        }
    }
}
