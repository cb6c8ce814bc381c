//! shardgrid-core — cluster model shared by the shardgrid crates.
//!
//! Holds the point-in-time view an allocation explain is computed over:
//! node descriptors and their disk/recovery stats, shard routing entries,
//! known on-disk shard copies, and the allocation settings that tune the
//! decider chain.
//!
//! Snapshots and settings are plain serde types. Snapshots load from JSON
//! or TOML, settings from TOML.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AllocationSettings, BalanceWeights, DiskWatermarks};
pub use error::{CoreError, CoreResult};
pub use types::*;
