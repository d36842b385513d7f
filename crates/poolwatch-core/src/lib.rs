//! Core building blocks shared by the poolwatch binaries. Domain models,
//! configuration, the ZFS output parser, the threshold engine, alert state
//! and delivery, and the per-cycle daemon orchestration all live here so the
//! binary crates can focus on wiring and user experience.

pub mod alert_state;
pub mod alerting;
pub mod config;
pub mod daemon;
pub mod error;
pub mod format;
pub mod logging;
pub mod mail;
pub mod model;
pub mod monitor;
pub mod parse;
pub mod source;

pub use alert_state::{AlertState, AlertStateStore};
pub use alerting::EmailAlerter;
pub use config::{AlertCfg, DaemonCfg, LogCfg, MonitorCfg, PoolwatchConfig, SmtpCfg, ZfsCfg};
pub use daemon::PoolDaemon;
pub use error::{PoolwatchError, PoolwatchResult};
pub use logging::LogFormat;
pub use mail::{MailTransport, SmtpMailer};
pub use model::{CheckResult, IssueCategory, PoolHealth, PoolIssue, PoolStatus, Severity};
pub use monitor::PoolMonitor;
pub use parse::ZfsParser;
pub use source::PoolSource;
