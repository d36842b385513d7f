//! Logging setup shared by the poolwatch binaries.
//!
//! Service mode emits one JSON object per line so journald and log shippers
//! can index records without extra parsing; each record carries the host
//! name and an RFC 3339 UTC timestamp, the same conventions the alerter and
//! the state file use. One-shot commands log plain lines at warn level so
//! check reports stay clean.

use crate::config::LogCfg;
use chrono::{SecondsFormat, Utc};
use env_logger::Env;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

const FORMAT_ENV: &str = "POOLWATCH_LOG_FORMAT";
const LEVEL_ENV: &str = "POOLWATCH_LOG_LEVEL";

/// Output layout for log records, configurable via the `[log]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, for service mode.
    #[default]
    Json,
    /// Conventional single-line records for terminals.
    Plain,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "plain" | "text" => Ok(LogFormat::Plain),
            _ => Err(()),
        }
    }
}

/// Initialize logging for the daemon from its `[log]` configuration.
/// `foreground` forces plain output for a terminal session regardless of the
/// configured format. `POOLWATCH_LOG_LEVEL` and `POOLWATCH_LOG_FORMAT`
/// override both.
pub fn init_daemon(cfg: &LogCfg, foreground: bool) {
    let format = if foreground { LogFormat::Plain } else { cfg.format };
    init_with(&cfg.level, format);
}

/// Terminal defaults for the one-shot commands: plain lines, warn level, so
/// reports and tables are not interleaved with routine log output.
pub fn init_terminal() {
    init_with("warn", LogFormat::Plain);
}

/// The first caller wins; later calls are no-ops.
fn init_with(default_level: &str, default_format: LogFormat) {
    let _ = INIT.get_or_init(|| {
        let level = env::var(LEVEL_ENV).unwrap_or_else(|_| default_level.to_string());
        let format = env::var(FORMAT_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(default_format);

        // RUST_LOG still takes precedence when set; `level` only fills the
        // gap, so per-module filter strings keep working.
        let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(&level));
        match format {
            LogFormat::Json => {
                builder.format(write_json_record);
            }
            LogFormat::Plain => {
                builder.format(write_plain_record);
            }
        }

        if let Err(err) = builder.try_init() {
            eprintln!("failed to initialize logger: {err}");
        }
    });
}

fn write_json_record(
    buf: &mut env_logger::fmt::Formatter,
    record: &log::Record<'_>,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "{}",
        json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "host": local_host(),
            "level": record.level().as_str(),
            "target": record.target(),
            "message": record.args().to_string(),
        })
    )
}

fn write_plain_record(
    buf: &mut env_logger::fmt::Formatter,
    record: &log::Record<'_>,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "{} {:<5} {}: {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.target(),
        record.args()
    )
}

/// Hostname resolved once per process. Daemon logs from several hosts often
/// land in one aggregator, and the alert e-mails name the same host.
pub(crate) fn local_host() -> &'static str {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string())
    })
}
