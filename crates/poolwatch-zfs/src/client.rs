//! Zpool-facing client: binary discovery, argv construction, and JSON
//! decoding for `zpool list -j` / `zpool status -j`.

use crate::command::CommandRunner;
use log::debug;
use poolwatch_core::config::PoolwatchConfig;
use poolwatch_core::error::{PoolwatchError, PoolwatchResult};
use poolwatch_core::source::PoolSource;
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Well-known locations probed when `zpool` is not on the search path.
pub const DEFAULT_ZPOOL_PATHS: &[&str] = &[
    "/sbin/zpool",
    "/usr/sbin/zpool",
    "/usr/local/sbin/zpool",
    "/bin/zpool",
];

const INSTALL_HINT: &str = "zpool command not found. Please install ZFS utilities.\n\
                            On Debian/Ubuntu: apt install zfsutils-linux\n\
                            On RHEL/CentOS: yum install zfs";

/// Executes `zpool` subcommands and returns their decoded JSON output.
#[derive(Debug, Clone)]
pub struct SystemZfsClient {
    runner: CommandRunner,
}

impl SystemZfsClient {
    /// Build a client from the user configuration, falling back to discovery
    /// when no explicit binary path is set.
    pub fn from_config(config: &PoolwatchConfig) -> PoolwatchResult<Self> {
        let timeout = config.zfs_timeout();
        match config.zpool_binary_path() {
            Some(path) => Self::with_path(path, timeout),
            None => Self::discover(timeout),
        }
    }

    /// Construct a client with an explicit `zpool` path. Fails fast when the
    /// binary does not exist.
    pub fn with_path(path: PathBuf, timeout: Duration) -> PoolwatchResult<Self> {
        if !path.exists() {
            return Err(PoolwatchError::ZfsNotAvailable(format!(
                "binary not found at {}\n{INSTALL_HINT}",
                path.display()
            )));
        }
        debug!("zpool client using {}", path.display());
        Ok(Self {
            runner: CommandRunner::new(path, timeout),
        })
    }

    /// Locate `zpool` via the process search path, then the built-in
    /// locations.
    pub fn discover(timeout: Duration) -> PoolwatchResult<Self> {
        if let Some(path) = search_path_lookup("zpool") {
            return Self::with_path(path, timeout);
        }
        for candidate in DEFAULT_ZPOOL_PATHS {
            let p = Path::new(candidate);
            if p.exists() {
                return Self::with_path(p.to_path_buf(), timeout);
            }
        }
        Err(PoolwatchError::ZfsNotAvailable(INSTALL_HINT.to_string()))
    }

    /// Path of the resolved `zpool` binary.
    pub fn zpool_path(&self) -> &Path {
        self.runner.binary()
    }

    /// Execute `zpool list -j` and return parsed JSON. Optional arguments
    /// restrict the property set (`-o a,b,c`) or target one pool.
    pub fn get_pool_list(
        &self,
        pool_name: Option<&str>,
        properties: Option<&[String]>,
        timeout: Option<Duration>,
    ) -> PoolwatchResult<Value> {
        let mut args: Vec<&str> = vec!["list", "-j"];
        let joined;
        if let Some(properties) = properties {
            joined = properties.join(",");
            args.push("-o");
            args.push(&joined);
        }
        if let Some(pool_name) = pool_name {
            args.push(pool_name);
        }
        self.execute_json(&args, timeout)
    }

    /// Execute `zpool status -j` and return parsed JSON.
    pub fn get_pool_status(
        &self,
        pool_name: Option<&str>,
        timeout: Option<Duration>,
    ) -> PoolwatchResult<Value> {
        let mut args: Vec<&str> = vec!["status", "-j"];
        if let Some(pool_name) = pool_name {
            args.push(pool_name);
        }
        self.execute_json(&args, timeout)
    }

    fn execute_json(&self, args: &[&str], timeout: Option<Duration>) -> PoolwatchResult<Value> {
        debug!("executing: {}", self.runner.describe(args));
        let output = self.runner.run(args, timeout)?;

        if output.status != 0 {
            return Err(PoolwatchError::CommandFailed {
                command: self.runner.describe(args),
                exit_code: output.status,
                stderr: output.stderr,
            });
        }

        let data: Value = serde_json::from_str(&output.stdout)?;
        debug!(
            "parsed JSON successfully, top-level keys: {:?}",
            data.as_object()
                .map(|map| map.keys().collect::<Vec<_>>())
                .unwrap_or_default()
        );
        Ok(data)
    }
}

impl PoolSource for SystemZfsClient {
    fn pool_list(&self) -> PoolwatchResult<Value> {
        self.get_pool_list(None, None, None)
    }

    fn pool_status(&self) -> PoolwatchResult<Value> {
        self.get_pool_status(None, None)
    }
}

fn search_path_lookup(binary: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(binary);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
