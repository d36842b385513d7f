//! systemd unit management for the daemon: render the unit file, install and
//! enable it, and query its status through `systemctl`.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;

const UNIT_NAME: &str = "poolwatch.service";
const UNIT_PATH: &str = "/etc/systemd/system/poolwatch.service";

/// Render the service unit. `TimeoutStopSec` matches the daemon's shutdown
/// contract: an in-flight subprocess or SMTP call is allowed to finish or
/// time out before the process exits.
pub fn render_unit(binary: &Path, config: &Path) -> String {
    format!(
        "[Unit]\n\
         Description=ZFS pool monitoring and alerting daemon\n\
         After=network-online.target zfs.target\n\
         Wants=network-online.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         ExecStart={} --config {} daemon\n\
         Restart=on-failure\n\
         RestartSec=10\n\
         TimeoutStopSec=30\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        binary.display(),
        config.display()
    )
}

/// Write the unit file and enable the service.
pub fn install(config_path: &Path) -> Result<()> {
    let binary = std::env::current_exe().context("resolve poolwatch binary path")?;
    let unit = render_unit(&binary, config_path);

    fs::write(UNIT_PATH, unit).with_context(|| format!("write {UNIT_PATH}"))?;
    println!("wrote {UNIT_PATH}");

    systemctl(&["daemon-reload"])?;
    systemctl(&["enable", "--now", UNIT_NAME])?;
    println!("service {UNIT_NAME} enabled and started");
    Ok(())
}

/// Stop and disable the service, then remove the unit file.
pub fn uninstall() -> Result<()> {
    // Disabling may fail if the unit was never installed; removal still
    // proceeds.
    if let Err(err) = systemctl(&["disable", "--now", UNIT_NAME]) {
        println!("disable {UNIT_NAME}: {err}");
    }

    if Path::new(UNIT_PATH).exists() {
        fs::remove_file(UNIT_PATH).with_context(|| format!("remove {UNIT_PATH}"))?;
        println!("removed {UNIT_PATH}");
    }

    systemctl(&["daemon-reload"])?;
    Ok(())
}

/// Run `systemctl status` attached to the terminal and pass its exit code
/// through.
pub fn status() -> Result<i32> {
    let status = Command::new("systemctl")
        .args(["status", UNIT_NAME])
        .status()
        .context("invoke systemctl")?;
    Ok(status.code().unwrap_or(1))
}

fn systemctl(args: &[&str]) -> Result<()> {
    let output = Command::new("systemctl")
        .args(args)
        .output()
        .context("invoke systemctl")?;

    if !output.status.success() {
        bail!(
            "systemctl {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unit_file_carries_the_shutdown_contract() {
        let unit = render_unit(
            &PathBuf::from("/usr/local/bin/poolwatch"),
            &PathBuf::from("/etc/poolwatch.toml"),
        );

        assert!(unit.contains("ExecStart=/usr/local/bin/poolwatch --config /etc/poolwatch.toml daemon"));
        assert!(unit.contains("TimeoutStopSec=30"));
        assert!(unit.contains("Restart=on-failure"));
        assert!(unit.contains("WantedBy=multi-user.target"));
        assert!(unit.contains("After=network-online.target zfs.target"));
    }
}
