use crate::error::PoolwatchResult;
use serde_json::Value;

/// Abstraction over ZFS pool data acquisition.
///
/// Implementations return already-decoded JSON trees from `zpool list -j`
/// and `zpool status -j`, so higher-level logic can be exercised without
/// invoking real ZFS binaries.
pub trait PoolSource {
    /// Fetch the `zpool list -j` document for all pools.
    fn pool_list(&self) -> PoolwatchResult<Value>;

    /// Fetch the `zpool status -j` document for all pools.
    fn pool_status(&self) -> PoolwatchResult<Value>;
}
