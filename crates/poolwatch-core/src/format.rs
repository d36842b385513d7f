//! Rendering for the one-shot `check` command: a JSON document for machines,
//! an aligned table for humans, and the Nagios-style exit-code mapping.

use crate::model::{CheckResult, PoolStatus, Severity};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Map aggregate severity to the conventional monitoring exit code.
pub fn exit_code_for_severity(severity: Severity) -> i32 {
    match severity {
        Severity::Critical => 2,
        Severity::Warning => 1,
        Severity::Ok | Severity::Info => 0,
    }
}

/// Render a check result as an indented JSON document.
pub fn format_check_result_json(result: &CheckResult) -> String {
    let data = json!({
        "timestamp": result.timestamp.to_rfc3339(),
        "pools": result.pools.iter().map(|pool| json!({
            "name": pool.name,
            "health": pool.health.as_str(),
            "capacity_percent": pool.capacity_percent,
        })).collect::<Vec<_>>(),
        "issues": result.issues.iter().map(|issue| json!({
            "pool_name": issue.pool_name,
            "severity": issue.severity.as_str(),
            "category": issue.category.as_str(),
            "message": issue.message,
            "details": issue.details,
        })).collect::<Vec<_>>(),
        "overall_severity": result.overall_severity.as_str(),
    });
    serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
}

/// Render a check result as human-readable text: header, pool table, issue
/// list, and a trailing pool count.
pub fn format_check_result_text(result: &CheckResult) -> String {
    let mut lines = Vec::new();

    lines.push(String::new());
    lines.push(format!(
        "ZFS Pool Check - {}",
        result.timestamp.format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(format!("Overall Status: {}", result.overall_severity));
    lines.push(String::new());

    lines.extend(render_pool_table(&result.pools, result.timestamp));

    if result.issues.is_empty() {
        lines.push(String::new());
        lines.push("No issues detected".to_string());
    } else {
        lines.push(String::new());
        lines.push("Issues Found:".to_string());
        for issue in &result.issues {
            lines.push(format!(
                "  {} {}: {}",
                issue.severity, issue.pool_name, issue.message
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!("Pools Checked: {}", result.pools.len()));

    lines.join("\n")
}

const TABLE_HEADERS: [&str; 6] = [
    "Pool",
    "Health",
    "Capacity",
    "Size",
    "Errors (R/W/C)",
    "Last Scrub",
];

fn render_pool_table(pools: &[PoolStatus], now: DateTime<Utc>) -> Vec<String> {
    let rows: Vec<[String; 6]> = pools.iter().map(|pool| pool_row(pool, now)).collect();

    let mut widths: Vec<usize> = TABLE_HEADERS.iter().map(|header| header.len()).collect();
    for row in &rows {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.len());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(
        &TABLE_HEADERS.map(|header| header.to_string()),
        &widths,
    ));
    lines.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in &rows {
        lines.push(format_row(row, &widths));
    }
    lines
}

fn format_row(cells: &[String; 6], widths: &[usize]) -> String {
    // First two columns left-aligned, the rest right-aligned.
    let mut parts = Vec::with_capacity(6);
    for (index, cell) in cells.iter().enumerate() {
        if index < 2 {
            parts.push(format!("{cell:<width$}", width = widths[index]));
        } else {
            parts.push(format!("{cell:>width$}", width = widths[index]));
        }
    }
    parts.join("  ").trim_end().to_string()
}

fn pool_row(pool: &PoolStatus, now: DateTime<Utc>) -> [String; 6] {
    let size_gb = pool.size_bytes as f64 / (1u64 << 30) as f64;
    let size = if size_gb >= 1024.0 {
        format!("{:.2} TB", size_gb / 1024.0)
    } else {
        format!("{size_gb:.2} GB")
    };

    [
        pool.name.clone(),
        pool.health.to_string(),
        format!("{:.1}%", pool.capacity_percent),
        size,
        format!(
            "{}/{}/{}",
            pool.read_errors, pool.write_errors, pool.checksum_errors
        ),
        format_last_scrub(pool.last_scrub, now),
    ]
}

/// Relative scrub age, coarse on purpose: day resolution close up, weeks and
/// months further out.
fn format_last_scrub(last_scrub: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let last_scrub = match last_scrub {
        Some(ts) => ts,
        None => return "Never".to_string(),
    };

    let days = (now - last_scrub).num_days();
    match days {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => format!("{days}d ago"),
        7..=29 => format!("{}w ago", days / 7),
        30..=59 => format!("{days}d ago"),
        _ => format!("{}mo ago", days / 30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueCategory, PoolHealth, PoolIssue};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn sample_result() -> CheckResult {
        let mut pool = PoolStatus::empty("rpool", PoolHealth::Online);
        pool.capacity_percent = 85.0;
        pool.size_bytes = 2 * (1u64 << 40);
        pool.last_scrub = Some(now() - Duration::days(1));

        let issue = PoolIssue {
            pool_name: "rpool".to_string(),
            severity: Severity::Warning,
            category: IssueCategory::Capacity,
            message: "Pool at 85.0% capacity (warning threshold: 80%)".to_string(),
            details: BTreeMap::new(),
        };

        CheckResult {
            timestamp: now(),
            pools: vec![pool],
            issues: vec![issue],
            overall_severity: Severity::Warning,
        }
    }

    #[test]
    fn exit_codes_follow_severity() {
        assert_eq!(exit_code_for_severity(Severity::Ok), 0);
        assert_eq!(exit_code_for_severity(Severity::Info), 0);
        assert_eq!(exit_code_for_severity(Severity::Warning), 1);
        assert_eq!(exit_code_for_severity(Severity::Critical), 2);
    }

    #[test]
    fn json_output_carries_the_full_result() {
        let rendered = format_check_result_json(&sample_result());
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed["overall_severity"], "WARNING");
        assert_eq!(parsed["pools"][0]["name"], "rpool");
        assert_eq!(parsed["pools"][0]["health"], "ONLINE");
        assert_eq!(parsed["issues"][0]["category"], "capacity");
        assert!(parsed["timestamp"].as_str().unwrap().starts_with("2025-01-15T12:00:00"));
    }

    #[test]
    fn text_output_has_header_table_issues_and_count() {
        let rendered = format_check_result_text(&sample_result());

        assert!(rendered.contains("ZFS Pool Check - 2025-01-15 12:00:00"));
        assert!(rendered.contains("Overall Status: WARNING"));
        assert!(rendered.contains("Pool"));
        assert!(rendered.contains("Errors (R/W/C)"));
        assert!(rendered.contains("rpool"));
        assert!(rendered.contains("2.00 TB"));
        assert!(rendered.contains("Yesterday"));
        assert!(rendered.contains("Issues Found:"));
        assert!(rendered.contains("  WARNING rpool: Pool at 85.0%"));
        assert!(rendered.ends_with("Pools Checked: 1"));
    }

    #[test]
    fn clean_result_reports_no_issues() {
        let mut result = sample_result();
        result.issues.clear();
        result.overall_severity = Severity::Ok;
        let rendered = format_check_result_text(&result);
        assert!(rendered.contains("No issues detected"));
    }

    #[test]
    fn relative_scrub_ages_bucket_sensibly() {
        let now = now();
        assert_eq!(format_last_scrub(None, now), "Never");
        assert_eq!(format_last_scrub(Some(now - Duration::hours(3)), now), "Today");
        assert_eq!(format_last_scrub(Some(now - Duration::days(1)), now), "Yesterday");
        assert_eq!(format_last_scrub(Some(now - Duration::days(4)), now), "4d ago");
        assert_eq!(format_last_scrub(Some(now - Duration::days(21)), now), "3w ago");
        assert_eq!(format_last_scrub(Some(now - Duration::days(45)), now), "45d ago");
        assert_eq!(format_last_scrub(Some(now - Duration::days(120)), now), "4mo ago");
    }

    #[test]
    fn small_pools_render_in_gigabytes() {
        let mut result = sample_result();
        result.pools[0].size_bytes = 500 * (1u64 << 30);
        let rendered = format_check_result_text(&result);
        assert!(rendered.contains("500.00 GB"));
    }
}
