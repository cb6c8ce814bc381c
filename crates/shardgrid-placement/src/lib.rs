//! shardgrid-placement — decider chain and allocation explain driver.
//!
//! Evaluates a shard copy against every node in a [`ClusterSnapshot`] and
//! produces the explain record from `shardgrid-decision`. Nothing here
//! mutates the snapshot; an explain is a pure function of the snapshot and
//! the allocation settings.
//!
//! # Components
//!
//! - **`deciders`** — per-concern YES/NO/THROTTLE verdicts and their chain
//! - **`weight`** — balance weighting and node rankings
//! - **`convert`** — snapshot nodes to weighting input
//! - **`explain`** — allocate and move explain for one shard copy
//!
//! [`ClusterSnapshot`]: shardgrid_core::ClusterSnapshot

pub mod convert;
pub mod deciders;
pub mod error;
pub mod explain;
pub mod weight;

pub use convert::{node_load, node_loads};
pub use deciders::{AllocationContext, AllocationDecider, Deciders};
pub use error::{PlacementError, PlacementResult};
pub use explain::{explain_move, explain_shard, explain_shard_with, explain_unassigned};
pub use weight::{ClusterAverages, NodeLoad, NodeWeight, WeightFunction, rank_nodes};
