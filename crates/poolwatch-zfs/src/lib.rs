//! System-backed ZFS data acquisition: spawns the real `zpool` binary and
//! hands decoded JSON to the rest of the poolwatch stack. `command` covers
//! the subprocess plumbing, `client` the zpool-specific surface.

mod client;
mod command;

pub use client::{SystemZfsClient, DEFAULT_ZPOOL_PATHS};
