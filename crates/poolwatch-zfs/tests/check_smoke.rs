//! End-to-end smoke test: a fake `zpool` binary feeds real JSON through the
//! client, parser, and threshold engine.

use poolwatch_core::config::MonitorCfg;
use poolwatch_core::format::exit_code_for_severity;
use poolwatch_core::model::{IssueCategory, PoolHealth, Severity};
use poolwatch_core::{PoolMonitor, PoolSource, PoolwatchResult, ZfsParser};
use poolwatch_zfs::SystemZfsClient;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

const FAKE_ZPOOL_SCRIPT: &str = r#"#!/bin/sh
case "$1" in
  list)
    cat <<'EOF'
{
  "output_version": {"command": "zpool list"},
  "pools": {
    "rpool": {
      "name": "rpool",
      "properties": {
        "health": {"value": "ONLINE"},
        "capacity": {"value": "45%"},
        "size": {"value": "1.5T"},
        "allocated": {"value": "690G"},
        "free": {"value": "846G"}
      }
    },
    "tank": {
      "name": "tank",
      "properties": {
        "health": {"value": "ONLINE"},
        "capacity": {"value": "85%"},
        "size": {"value": "4T"},
        "allocated": {"value": "3.4T"},
        "free": {"value": "614G"}
      }
    }
  }
}
EOF
    ;;
  status)
    cat <<'EOF'
{
  "pools": {
    "rpool": {
      "name": "rpool",
      "state": "ONLINE",
      "vdevs": {
        "rpool": {"read_errors": 0, "write_errors": 0, "checksum_errors": 0}
      },
      "scan_stats": {"state": "FINISHED", "end_time": 1767182400, "errors": 0}
    },
    "tank": {
      "name": "tank",
      "state": "DEGRADED",
      "vdevs": {
        "tank": {"read_errors": 2, "write_errors": 0, "checksum_errors": 0}
      },
      "scan_stats": {"state": "FINISHED", "end_time": 1767182400, "errors": 0}
    }
  }
}
EOF
    ;;
  *)
    echo "unexpected args: $*" >&2
    exit 2
    ;;
esac
"#;

fn make_executable(path: &Path) -> std::io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

#[test]
fn check_smoke_classifies_fake_pools() -> PoolwatchResult<()> {
    let tmp = tempdir().unwrap();
    let zpool_path = tmp.path().join("zpool");
    fs::write(&zpool_path, FAKE_ZPOOL_SCRIPT)?;
    make_executable(&zpool_path)?;

    let client = SystemZfsClient::with_path(zpool_path, Duration::from_secs(5))?;
    let parser = ZfsParser::new();

    let pools_from_list = parser.parse_pool_list(&client.pool_list()?)?;
    let pools_from_status = parser.parse_pool_status(&client.pool_status()?)?;
    let pools = parser.merge_pool_data(pools_from_list, pools_from_status);

    assert_eq!(pools.len(), 2);
    assert_eq!(pools["rpool"].health, PoolHealth::Online);
    assert_eq!(pools["rpool"].size_bytes, 1_649_267_441_664);
    assert_eq!(pools["tank"].health, PoolHealth::Degraded, "status health wins");
    assert_eq!(pools["tank"].capacity_percent, 85.0);
    assert_eq!(pools["tank"].read_errors, 2);

    // Note: the scrub timestamp above (2025-12-31) goes stale as wall-clock
    // time advances; only categories that do not depend on "now" are
    // asserted exactly.
    let monitor = PoolMonitor::new(MonitorCfg {
        scrub_max_age_days: 0,
        ..MonitorCfg::default()
    });
    let result = monitor.check_all_pools(&pools);

    let categories: Vec<(&str, IssueCategory, Severity)> = result
        .issues
        .iter()
        .map(|issue| (issue.pool_name.as_str(), issue.category, issue.severity))
        .collect();

    assert!(categories.contains(&("tank", IssueCategory::Health, Severity::Warning)));
    assert!(categories.contains(&("tank", IssueCategory::Capacity, Severity::Warning)));
    assert!(categories.contains(&("tank", IssueCategory::Errors, Severity::Warning)));
    assert!(!categories.iter().any(|(pool, _, _)| *pool == "rpool"));

    assert_eq!(result.overall_severity, Severity::Warning);
    assert_eq!(exit_code_for_severity(result.overall_severity), 1);
    Ok(())
}
