use crate::error::{PoolwatchError, PoolwatchResult};
use crate::logging::LogFormat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const STATE_FILE_ENV: &str = "POOLWATCH_STATE_FILE";

/// Settings for locating and invoking the `zpool` binary.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ZfsCfg {
    /// Explicit path to `zpool`; discovered from PATH when unset.
    #[serde(default)]
    pub zpool_path: Option<String>,

    #[serde(default = "default_zfs_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_zfs_timeout_secs() -> u64 {
    30
}

impl Default for ZfsCfg {
    fn default() -> Self {
        Self {
            zpool_path: None,
            timeout_secs: default_zfs_timeout_secs(),
        }
    }
}

/// Threshold configuration for the monitoring rules.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MonitorCfg {
    #[serde(default = "default_capacity_warning")]
    pub capacity_warning_percent: f64,

    #[serde(default = "default_capacity_critical")]
    pub capacity_critical_percent: f64,

    /// Days since last scrub before an INFO issue. `0` disables the age check.
    #[serde(default = "default_scrub_max_age_days")]
    pub scrub_max_age_days: i64,

    #[serde(default = "default_error_threshold")]
    pub read_errors_warning: u64,

    #[serde(default = "default_error_threshold")]
    pub write_errors_warning: u64,

    #[serde(default = "default_error_threshold")]
    pub checksum_errors_warning: u64,
}

fn default_capacity_warning() -> f64 {
    80.0
}

fn default_capacity_critical() -> f64 {
    90.0
}

fn default_scrub_max_age_days() -> i64 {
    30
}

fn default_error_threshold() -> u64 {
    1
}

impl Default for MonitorCfg {
    fn default() -> Self {
        Self {
            capacity_warning_percent: default_capacity_warning(),
            capacity_critical_percent: default_capacity_critical(),
            scrub_max_age_days: default_scrub_max_age_days(),
            read_errors_warning: default_error_threshold(),
            write_errors_warning: default_error_threshold(),
            checksum_errors_warning: default_error_threshold(),
        }
    }
}

impl MonitorCfg {
    /// Reject threshold combinations that can never classify sensibly.
    pub fn validate(&self) -> PoolwatchResult<()> {
        if !(0.0..=100.0).contains(&self.capacity_warning_percent)
            || !(0.0..=100.0).contains(&self.capacity_critical_percent)
        {
            return Err(PoolwatchError::InvalidConfig(
                "capacity percentages must be between 0 and 100".to_string(),
            ));
        }
        if self.capacity_warning_percent >= self.capacity_critical_percent {
            return Err(PoolwatchError::InvalidConfig(
                "capacity_warning_percent must be less than capacity_critical_percent".to_string(),
            ));
        }
        if self.scrub_max_age_days < 0 {
            return Err(PoolwatchError::InvalidConfig(
                "scrub_max_age_days must be zero or positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Daemon scheduling and scoping settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DaemonCfg {
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,

    /// Whitelist of pool names to monitor; empty means all pools.
    #[serde(default)]
    pub pools_to_monitor: Vec<String>,

    /// Alert-state persistence path; platform state directory when unset.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

fn default_check_interval_seconds() -> u64 {
    300
}

impl Default for DaemonCfg {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval_seconds(),
            pools_to_monitor: Vec::new(),
            state_file: None,
        }
    }
}

/// SMTP transport settings. `hosts` is tried in order until one accepts the
/// message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SmtpCfg {
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub from_address: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_starttls")]
    pub starttls: bool,

    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

fn default_smtp_timeout_secs() -> u64 {
    30
}

impl Default for SmtpCfg {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            port: default_smtp_port(),
            from_address: String::new(),
            username: None,
            password: None,
            starttls: default_starttls(),
            timeout_secs: default_smtp_timeout_secs(),
        }
    }
}

/// Alert policy: recipients, subject shape, and resend throttling.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AlertCfg {
    #[serde(default)]
    pub recipients: Vec<String>,

    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Minimum gap between repeat alerts for one (pool, category).
    #[serde(default = "default_resend_interval_hours")]
    pub resend_interval_hours: u64,

    #[serde(default)]
    pub send_ok_emails: bool,

    #[serde(default = "default_send_recovery")]
    pub send_recovery_emails: bool,
}

fn default_subject_prefix() -> String {
    "[ZFS Alert]".to_string()
}

fn default_resend_interval_hours() -> u64 {
    24
}

fn default_send_recovery() -> bool {
    true
}

impl Default for AlertCfg {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            subject_prefix: default_subject_prefix(),
            resend_interval_hours: default_resend_interval_hours(),
            send_ok_emails: false,
            send_recovery_emails: default_send_recovery(),
        }
    }
}

/// Daemon log output settings. `POOLWATCH_LOG_LEVEL` and
/// `POOLWATCH_LOG_FORMAT` override these at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LogCfg {
    /// env_logger filter string, e.g. "info" or "info,poolwatch_core=debug".
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogCfg {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Root configuration document, loaded from TOML or YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PoolwatchConfig {
    #[serde(default)]
    pub zfs: ZfsCfg,

    #[serde(default)]
    pub monitor: MonitorCfg,

    #[serde(default)]
    pub daemon: DaemonCfg,

    #[serde(default)]
    pub smtp: SmtpCfg,

    #[serde(default)]
    pub alert: AlertCfg,

    #[serde(default)]
    pub log: LogCfg,

    #[serde(skip)]
    #[schemars(skip)]
    pub path: PathBuf,
}

impl PoolwatchConfig {
    /// Load and validate a configuration file. The format is chosen by
    /// extension: `.toml` parses as TOML, anything else as YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> PoolwatchResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut cfg = if matches!(path.extension().and_then(|ext| ext.to_str()), Some(ext) if ext.eq_ignore_ascii_case("toml"))
        {
            toml::from_str::<Self>(&contents)?
        } else {
            serde_yaml::from_str::<Self>(&contents)?
        };

        cfg.path = path.to_path_buf();
        cfg.monitor.validate()?;
        Ok(cfg)
    }

    /// Load `path` when it exists, otherwise fall back to built-in defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> PoolwatchResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Non-fatal configuration smells, reported by the `validate` command.
    pub fn lint(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.alert.recipients.is_empty() {
            issues.push("alert.recipients is empty; no e-mail will ever be sent".to_string());
        }
        if !self.alert.recipients.is_empty() && self.smtp.hosts.is_empty() {
            issues.push("alert.recipients is set but smtp.hosts is empty".to_string());
        }
        if !self.alert.recipients.is_empty() && self.smtp.from_address.is_empty() {
            issues.push("smtp.from_address is empty".to_string());
        }
        if self.alert.resend_interval_hours == 0 {
            issues.push(
                "alert.resend_interval_hours is 0; every cycle will resend every alert".to_string(),
            );
        }
        if self.daemon.check_interval_seconds == 0 {
            issues.push("daemon.check_interval_seconds must be greater than 0".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for pool in &self.daemon.pools_to_monitor {
            if pool.trim().is_empty() {
                issues.push("daemon.pools_to_monitor contains an empty pool name".to_string());
            }
            if !seen.insert(pool) {
                issues.push(format!("duplicate pool entry detected: {pool}"));
            }
        }

        issues
    }

    pub fn zfs_timeout(&self) -> Duration {
        Duration::from_secs(self.zfs.timeout_secs)
    }

    pub fn zpool_binary_path(&self) -> Option<PathBuf> {
        self.zfs.zpool_path.as_ref().map(PathBuf::from)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.daemon.check_interval_seconds)
    }

    /// Resolve the alert-state file: explicit config first, then the
    /// `POOLWATCH_STATE_FILE` env override, then the platform state
    /// directory.
    pub fn state_file_path(&self) -> PathBuf {
        if let Some(path) = &self.daemon.state_file {
            return path.clone();
        }
        if let Ok(override_path) = env::var(STATE_FILE_ENV) {
            if !override_path.is_empty() {
                return PathBuf::from(override_path);
            }
        }
        default_state_file()
    }
}

fn default_state_file() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("poolwatch")
        .join("alert_state.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PoolwatchConfig::default();
        assert_eq!(cfg.monitor.capacity_warning_percent, 80.0);
        assert_eq!(cfg.monitor.capacity_critical_percent, 90.0);
        assert_eq!(cfg.monitor.scrub_max_age_days, 30);
        assert_eq!(cfg.daemon.check_interval_seconds, 300);
        assert_eq!(cfg.alert.resend_interval_hours, 24);
        assert_eq!(cfg.alert.subject_prefix, "[ZFS Alert]");
        assert!(!cfg.alert.send_ok_emails);
        assert!(cfg.alert.send_recovery_emails);
        assert_eq!(cfg.log.level, "info");
        assert_eq!(cfg.log.format, LogFormat::Json);
    }

    #[test]
    fn monitor_validation_rejects_inverted_thresholds() {
        let mut monitor = MonitorCfg::default();
        monitor.capacity_warning_percent = 95.0;
        assert!(monitor.validate().is_err());

        monitor.capacity_warning_percent = 90.0;
        assert!(monitor.validate().is_err(), "equal thresholds are invalid");

        monitor.capacity_warning_percent = 80.0;
        assert!(monitor.validate().is_ok());
    }

    #[test]
    fn monitor_validation_rejects_out_of_range_percentages() {
        let mut monitor = MonitorCfg::default();
        monitor.capacity_critical_percent = 120.0;
        assert!(monitor.validate().is_err());

        let mut monitor = MonitorCfg::default();
        monitor.capacity_warning_percent = -5.0;
        assert!(monitor.validate().is_err());
    }

    #[test]
    fn load_parses_toml_and_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poolwatch.toml");
        fs::write(
            &path,
            r#"
[monitor]
capacity_warning_percent = 70
capacity_critical_percent = 85

[alert]
recipients = ["ops@example.com"]

[smtp]
hosts = ["mail.example.com"]
from_address = "zfs@example.com"
"#,
        )
        .unwrap();

        let cfg = PoolwatchConfig::load(&path).unwrap();
        assert_eq!(cfg.monitor.capacity_warning_percent, 70.0);
        assert_eq!(cfg.monitor.capacity_critical_percent, 85.0);
        assert_eq!(cfg.monitor.scrub_max_age_days, 30);
        assert_eq!(cfg.alert.recipients, vec!["ops@example.com"]);
        assert_eq!(cfg.smtp.port, 587);
        assert!(cfg.lint().is_empty());
    }

    #[test]
    fn load_rejects_invalid_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poolwatch.toml");
        fs::write(
            &path,
            "[monitor]\ncapacity_warning_percent = 95\ncapacity_critical_percent = 90\n",
        )
        .unwrap();
        assert!(matches!(
            PoolwatchConfig::load(&path),
            Err(PoolwatchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn lint_flags_missing_smtp_settings() {
        let mut cfg = PoolwatchConfig::default();
        cfg.alert.recipients = vec!["ops@example.com".to_string()];
        let issues = cfg.lint();
        assert!(issues.iter().any(|line| line.contains("smtp.hosts")));
        assert!(issues.iter().any(|line| line.contains("from_address")));
    }

    #[test]
    fn state_file_prefers_explicit_config() {
        let mut cfg = PoolwatchConfig::default();
        cfg.daemon.state_file = Some(PathBuf::from("/tmp/poolwatch-state.json"));
        assert_eq!(
            cfg.state_file_path(),
            PathBuf::from("/tmp/poolwatch-state.json")
        );
    }
}
