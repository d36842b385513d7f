use std::time::Duration;
use thiserror::Error;

/// Result alias for core operations.
pub type PoolwatchResult<T> = Result<T, PoolwatchError>;

#[derive(Error, Debug)]
pub enum PoolwatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    #[error("zpool command not found: {0}")]
    ZfsNotAvailable(String),

    #[error("ZFS command failed (exit {exit_code}): {command}\n{stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("ZFS command timed out after {timeout:?}: {command}")]
    Timeout { command: String, timeout: Duration },

    #[error("failed to parse ZFS output: {0}")]
    Parse(String),

    #[error("mail delivery error: {0}")]
    Mail(String),
}
