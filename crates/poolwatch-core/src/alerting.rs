//! E-mail alert rendering and dispatch. Bodies carry enough context that an
//! administrator can act without shelling into the host first.

use crate::config::AlertCfg;
use crate::logging::local_host;
use crate::mail::MailTransport;
use crate::model::{IssueCategory, PoolIssue, PoolStatus, Severity};
use chrono::{Local, Utc};
use log::{error, info, warn};
use serde_json::Value;

const SECTION_RULE: &str =
    "======================================================================";

/// Formats and sends alert and recovery e-mails. Delivery failures are logged
/// and reported as `false`; nothing propagates through this interface.
pub struct EmailAlerter<T: MailTransport> {
    transport: T,
    config: AlertCfg,
}

impl<T: MailTransport> EmailAlerter<T> {
    pub fn new(transport: T, config: AlertCfg) -> Self {
        Self { transport, config }
    }

    /// Send an alert for one issue. Returns whether delivery succeeded.
    pub fn send_alert(&self, issue: &PoolIssue, pool: &PoolStatus) -> bool {
        if self.config.recipients.is_empty() {
            warn!("no alert recipients configured, skipping email");
            return false;
        }

        let subject = self.format_subject(issue.severity, &pool.name, &issue.message);
        let body = self.format_body(issue, pool);

        info!(
            "sending alert email for {} ({} / {})",
            pool.name, issue.category, issue.severity
        );

        match self.transport.send(&self.config.recipients, &subject, &body) {
            Ok(()) => true,
            Err(err) => {
                error!("failed to send alert email for {}: {err}", pool.name);
                false
            }
        }
    }

    /// Send a recovery notice for a resolved (pool, category). The full pool
    /// status section is appended when the current snapshot is available.
    pub fn send_recovery(
        &self,
        pool_name: &str,
        category: IssueCategory,
        pool: Option<&PoolStatus>,
    ) -> bool {
        if !self.config.send_recovery_emails {
            return false;
        }
        if self.config.recipients.is_empty() {
            warn!("no alert recipients configured, skipping email");
            return false;
        }

        let subject = format!(
            "{} RECOVERY - {pool_name}: {category} issue resolved",
            self.config.subject_prefix
        );
        let body = self.format_recovery_body(pool_name, category, pool);

        info!("sending recovery email for {pool_name} ({category})");

        match self.transport.send(&self.config.recipients, &subject, &body) {
            Ok(()) => true,
            Err(err) => {
                error!("failed to send recovery email for {pool_name}: {err}");
                false
            }
        }
    }

    fn format_subject(&self, severity: Severity, pool_name: &str, message: &str) -> String {
        format!(
            "{} {severity} - {pool_name}: {message}",
            self.config.subject_prefix
        )
    }

    fn format_body(&self, issue: &PoolIssue, pool: &PoolStatus) -> String {
        let hostname = local_host();
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S %z");

        let used_tb = pool.allocated_bytes as f64 / TIB;
        let total_tb = pool.size_bytes as f64 / TIB;
        let free_tb = pool.free_bytes as f64 / TIB;

        let mut scrub_info = match pool.last_scrub {
            Some(ts) => {
                let age_days = (Utc::now() - ts).num_days();
                format!(
                    "{} ({age_days} days ago, {} errors)",
                    ts.format("%Y-%m-%d %H:%M:%S"),
                    pool.scrub_errors
                )
            }
            None => "Never".to_string(),
        };
        if pool.scrub_in_progress {
            scrub_info.push_str(" [SCRUB IN PROGRESS]");
        }

        let mut lines = vec![
            format!("ZFS Pool Alert - {}", issue.severity),
            String::new(),
            format!("Pool: {}", pool.name),
            format!("Status: {}", pool.health),
            format!("Timestamp: {timestamp}"),
            format!("Host: {hostname}"),
            String::new(),
            "ISSUE DETECTED:".to_string(),
            format!("  Category: {}", issue.category),
            format!("  Severity: {}", issue.severity),
            format!("  Message: {}", issue.message),
        ];

        if !issue.details.is_empty() {
            lines.push(String::new());
            lines.push("Details:".to_string());
            for (key, value) in &issue.details {
                lines.push(format!("  {key}: {}", scalar_to_string(value)));
            }
        }

        lines.extend([
            String::new(),
            "POOL DETAILS:".to_string(),
            format!(
                "  Capacity: {:.1}% used ({used_tb:.2} TB / {total_tb:.2} TB)",
                pool.capacity_percent
            ),
            format!("  Free Space: {free_tb:.2} TB"),
            format!(
                "  Errors: {} read, {} write, {} checksum",
                pool.read_errors, pool.write_errors, pool.checksum_errors
            ),
            format!("  Last Scrub: {scrub_info}"),
        ]);

        lines.extend([
            String::new(),
            "RECOMMENDED ACTIONS:".to_string(),
            format!("  1. Run 'zpool status {}' to investigate", pool.name),
        ]);
        match issue.category {
            IssueCategory::Capacity => lines.extend([
                "  2. Identify and remove unnecessary files".to_string(),
                "  3. Consider adding more storage capacity".to_string(),
            ]),
            IssueCategory::Errors => lines.extend([
                "  2. Check system logs for hardware issues".to_string(),
                "  3. Consider running 'zpool scrub' if not in progress".to_string(),
            ]),
            IssueCategory::Scrub => lines.extend([
                format!("  2. Run 'zpool scrub {}' to start scrub", pool.name),
                "  3. Schedule regular scrubs via cron or systemd timer".to_string(),
            ]),
            IssueCategory::Health => lines.extend([
                "  2. Check for failed or degraded devices".to_string(),
                "  3. Replace failed drives if necessary".to_string(),
            ]),
        }

        lines.extend(self.footer(hostname));

        lines.extend([
            String::new(),
            SECTION_RULE.to_string(),
            "COMPLETE POOL STATUS".to_string(),
            SECTION_RULE.to_string(),
        ]);
        lines.push(format_complete_pool_status(pool));

        lines.join("\n")
    }

    fn format_recovery_body(
        &self,
        pool_name: &str,
        category: IssueCategory,
        pool: Option<&PoolStatus>,
    ) -> String {
        let hostname = local_host();
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S %z");

        let mut lines = vec![
            "ZFS Pool Recovery Notification".to_string(),
            String::new(),
            format!("Pool: {pool_name}"),
            format!("Category: {category}"),
            format!("Timestamp: {timestamp}"),
            format!("Host: {hostname}"),
            String::new(),
            format!("The {category} issue for pool '{pool_name}' has been resolved."),
            String::new(),
            "No further action is required at this time.".to_string(),
        ];

        lines.extend(self.footer(hostname));

        if let Some(pool) = pool {
            lines.extend([
                String::new(),
                SECTION_RULE.to_string(),
                "CURRENT POOL STATUS".to_string(),
                SECTION_RULE.to_string(),
            ]);
            lines.push(format_complete_pool_status(pool));
        }

        lines.join("\n")
    }

    fn footer(&self, hostname: &str) -> Vec<String> {
        vec![
            String::new(),
            "---".to_string(),
            format!("Generated by poolwatch v{}", env!("CARGO_PKG_VERSION")),
            format!("Hostname: {hostname}"),
        ]
    }
}

const TIB: f64 = (1u64 << 40) as f64;
const GIB: f64 = (1u64 << 30) as f64;

/// Verbose pool report appended to every alert: capacity in TB, GB, and raw
/// bytes, error statistics, scrub state, a health assessment, and a notes
/// block flagging anything worth a second look.
fn format_complete_pool_status(pool: &PoolStatus) -> String {
    let mut lines = vec![
        format!("Pool: {}", pool.name),
        format!("State: {}", pool.health),
        String::new(),
    ];

    let total_tb = pool.size_bytes as f64 / TIB;
    let used_tb = pool.allocated_bytes as f64 / TIB;
    let free_tb = pool.free_bytes as f64 / TIB;
    let total_gb = pool.size_bytes as f64 / GIB;
    let used_gb = pool.allocated_bytes as f64 / GIB;
    let free_gb = pool.free_bytes as f64 / GIB;

    lines.extend([
        "Capacity:".to_string(),
        format!(
            "  Total:     {total_tb:.2} TB ({total_gb:.2} GB) [{} bytes]",
            group_digits(pool.size_bytes)
        ),
        format!(
            "  Used:      {used_tb:.2} TB ({used_gb:.2} GB) [{} bytes]",
            group_digits(pool.allocated_bytes)
        ),
        format!(
            "  Free:      {free_tb:.2} TB ({free_gb:.2} GB) [{} bytes]",
            group_digits(pool.free_bytes)
        ),
        format!("  Usage:     {:.2}%", pool.capacity_percent),
        String::new(),
    ]);

    let total_errors = pool.total_errors();
    let error_status = if total_errors > 0 {
        "ERRORS DETECTED"
    } else {
        "No errors"
    };
    lines.extend([
        format!("Error Statistics: {error_status}"),
        format!("  Read Errors:      {}", group_digits(pool.read_errors)),
        format!("  Write Errors:     {}", group_digits(pool.write_errors)),
        format!("  Checksum Errors:  {}", group_digits(pool.checksum_errors)),
        format!("  Total Errors:     {}", group_digits(total_errors)),
        String::new(),
    ]);

    match pool.last_scrub {
        Some(ts) => {
            let age_days = (Utc::now() - ts).num_days();
            let scrub_status = if pool.scrub_in_progress {
                "IN PROGRESS"
            } else {
                "Completed"
            };
            let errors_status = if pool.scrub_errors > 0 {
                format!("{} errors found", pool.scrub_errors)
            } else {
                "No errors found".to_string()
            };
            lines.extend([
                format!("Scrub Status: {scrub_status}"),
                format!("  Last Scrub:   {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
                format!("  Age:          {age_days} days"),
                format!("  Errors:       {errors_status}"),
            ]);
        }
        None => {
            lines.extend([
                "Scrub Status: Never scrubbed".to_string(),
                "  WARNING: No scrub has been performed on this pool".to_string(),
            ]);
        }
    }
    if pool.scrub_in_progress {
        lines.push("  NOTE: A scrub is currently in progress".to_string());
    }
    lines.push(String::new());

    let health_msg = if pool.health.is_healthy() {
        "✓ Pool is healthy and operating normally"
    } else if pool.health.is_critical() {
        "✗ CRITICAL: Pool is in a critical state requiring immediate attention"
    } else {
        "⚠ WARNING: Pool is degraded and should be investigated"
    };
    lines.extend([
        "Health Assessment:".to_string(),
        format!("  {health_msg}"),
        String::new(),
    ]);

    let mut notes = Vec::new();
    if pool.capacity_percent >= 90.0 {
        notes.push("⚠ Capacity critically high (≥90%)".to_string());
    } else if pool.capacity_percent >= 80.0 {
        notes.push("⚠ Capacity high (≥80%)".to_string());
    }
    if total_errors > 0 {
        notes.push(format!("⚠ {total_errors} I/O or checksum errors detected"));
    }
    match pool.last_scrub {
        Some(ts) => {
            let age_days = (Utc::now() - ts).num_days();
            if age_days > 30 {
                notes.push(format!(
                    "⚠ Scrub is {age_days} days old (recommended: <30 days)"
                ));
            }
        }
        None => notes.push("⚠ Pool has never been scrubbed".to_string()),
    }

    if !notes.is_empty() {
        lines.push("Notes:".to_string());
        for note in notes {
            lines.push(format!("  {note}"));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Render a details scalar without JSON quoting noise.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Group digits in threes, e.g. 1234567 -> "1,234,567".
fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
