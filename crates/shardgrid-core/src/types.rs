//! Domain types for the cluster model.
//!
//! These types describe one snapshot of the cluster as seen by the
//! coordinating node: which nodes exist, how full their disks are, where
//! every shard copy currently lives, and which on-disk copies are known.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

// ── Node ──────────────────────────────────────────────────────────

/// Identity of a cluster node as it appears in explain output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveryNode {
    pub id: NodeId,
    pub name: String,
    /// Transport address (`host:port`).
    pub address: String,
    /// Arbitrary attributes used by allocation filters.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl DiscoveryNode {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Per-node resource usage sampled into the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    pub node: DiscoveryNode,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    /// Node is being shut down and must shed its shards.
    #[serde(default)]
    pub draining: bool,
    /// Recoveries currently streaming data onto this node.
    #[serde(default)]
    pub incoming_recoveries: u32,
}

impl NodeStats {
    pub fn free_disk(&self) -> u64 {
        self.disk_total_bytes.saturating_sub(self.disk_used_bytes)
    }

    /// Fraction of the disk in use, `0.0..=1.0`. A node reporting no disk
    /// is treated as full.
    pub fn disk_usage_ratio(&self) -> f64 {
        if self.disk_total_bytes == 0 {
            return 1.0;
        }
        (self.disk_used_bytes as f64 / self.disk_total_bytes as f64).min(1.0)
    }

    /// Disk usage ratio once `extra_bytes` more have been written.
    pub fn projected_usage_ratio(&self, extra_bytes: u64) -> f64 {
        if self.disk_total_bytes == 0 {
            return 1.0;
        }
        let used = self.disk_used_bytes.saturating_add(extra_bytes);
        (used as f64 / self.disk_total_bytes as f64).min(1.0)
    }
}

// ── Shard ─────────────────────────────────────────────────────────

/// Identifies one shard of one index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId {
    pub index: String,
    pub shard: u32,
}

impl ShardId {
    pub fn new(index: impl Into<String>, shard: u32) -> Self {
        Self {
            index: index.into(),
            shard,
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.index, self.shard)
    }
}

/// Routing state of a shard copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardState {
    Unassigned,
    Initializing,
    Started,
    Relocating,
}

/// Why a shard copy became unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    IndexCreated,
    ClusterRecovered,
    ReplicaAdded,
    AllocationFailed,
    NodeLeft,
    Reinitialized,
    ManualAllocation,
}

/// Bookkeeping carried by an unassigned shard copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnassignedInfo {
    pub reason: UnassignedReason,
    #[serde(default)]
    pub message: Option<String>,
    /// Consecutive failed allocation attempts.
    #[serde(default)]
    pub failed_allocations: u32,
    /// Allocation of this copy is postponed (node-left delay).
    #[serde(default)]
    pub delayed: bool,
    /// Cluster clock (ms) when the copy became unassigned.
    #[serde(default)]
    pub unassigned_at_ms: u64,
}

/// One copy (primary or replica) of a shard and where it lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRouting {
    pub shard_id: ShardId,
    pub primary: bool,
    pub state: ShardState,
    #[serde(default)]
    pub current_node: Option<NodeId>,
    #[serde(default)]
    pub relocating_node: Option<NodeId>,
    #[serde(default)]
    pub unassigned_info: Option<UnassignedInfo>,
    /// Expected on-disk size, used by disk-based deciders.
    #[serde(default)]
    pub size_bytes: u64,
}

impl ShardRouting {
    pub fn is_assigned(&self) -> bool {
        self.current_node.is_some()
    }

    /// Human-readable copy name, e.g. `[logs][0], primary`.
    pub fn describe(&self) -> String {
        let role = if self.primary { "primary" } else { "replica" };
        format!("{}, {role}", self.shard_id)
    }
}

/// An on-disk copy of a shard that some node still holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardCopy {
    pub shard_id: ShardId,
    pub node_id: NodeId,
    pub allocation_id: String,
    /// Copy is in the in-sync set and may be promoted to primary.
    #[serde(default = "default_true")]
    pub in_sync: bool,
    #[serde(default)]
    pub corrupted: bool,
}

fn default_true() -> bool {
    true
}

impl ShardCopy {
    pub fn is_usable(&self) -> bool {
        self.in_sync && !self.corrupted
    }
}

// ── Snapshot ──────────────────────────────────────────────────────

/// Point-in-time view of the cluster that an explain is computed over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Cluster clock in milliseconds.
    #[serde(default)]
    pub now_ms: u64,
    #[serde(default)]
    pub nodes: Vec<NodeStats>,
    #[serde(default)]
    pub shards: Vec<ShardRouting>,
    #[serde(default)]
    pub copies: Vec<ShardCopy>,
    /// Shards whose on-disk copy listing is still being fetched.
    #[serde(default)]
    pub pending_fetches: Vec<ShardId>,
}

impl ClusterSnapshot {
    /// Load a snapshot from a `.json` or `.toml` file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let snapshot = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            other => {
                return Err(CoreError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ));
            }
        };
        debug!(?path, nodes = snapshot.nodes.len(), shards = snapshot.shards.len(), "snapshot loaded");
        Ok(snapshot)
    }

    pub fn from_json_str(s: &str) -> CoreResult<Self> {
        let snapshot: Self = serde_json::from_str(s).map_err(|e| CoreError::Json(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        let snapshot: Self = toml::from_str(s).map_err(|e| CoreError::Toml(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Reject snapshots with duplicate node ids or routing entries that
    /// point at unknown nodes.
    pub fn validate(&self) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for stats in &self.nodes {
            if !seen.insert(stats.node.id.as_str()) {
                return Err(CoreError::InvalidSnapshot(format!(
                    "duplicate node id '{}'",
                    stats.node.id
                )));
            }
        }
        for shard in &self.shards {
            for node_id in shard.current_node.iter().chain(shard.relocating_node.iter()) {
                if !seen.contains(node_id.as_str()) {
                    return Err(CoreError::InvalidSnapshot(format!(
                        "shard {} references unknown node '{node_id}'",
                        shard.describe()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeStats> {
        self.nodes.iter().find(|n| n.node.id == node_id)
    }

    /// Find a shard copy. For replicas, unassigned copies are preferred so
    /// that explaining "the replica" of a half-allocated shard answers the
    /// interesting question.
    pub fn shard(&self, shard_id: &ShardId, primary: bool) -> Option<&ShardRouting> {
        let mut candidates = self
            .shards
            .iter()
            .filter(|s| &s.shard_id == shard_id && s.primary == primary);
        if primary {
            return candidates.next();
        }
        let all: Vec<&ShardRouting> = candidates.collect();
        all.iter()
            .find(|s| !s.is_assigned())
            .or_else(|| all.first())
            .copied()
    }

    /// Every copy of `shard_id` that is assigned, with its node.
    pub fn assigned_copies<'a>(&'a self, shard_id: &'a ShardId) -> impl Iterator<Item = &'a ShardRouting> + 'a {
        self.shards
            .iter()
            .filter(move |s| &s.shard_id == shard_id && s.is_assigned())
    }

    /// Shards currently placed on (or relocating to) a node.
    pub fn shards_on_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a ShardRouting> + 'a {
        self.shards.iter().filter(move |s| {
            s.current_node.as_deref() == Some(node_id) || s.relocating_node.as_deref() == Some(node_id)
        })
    }

    /// Known on-disk copies of a shard.
    pub fn copies_of<'a>(&'a self, shard_id: &'a ShardId) -> impl Iterator<Item = &'a ShardCopy> + 'a {
        self.copies.iter().filter(move |c| &c.shard_id == shard_id)
    }

    pub fn is_fetching(&self, shard_id: &ShardId) -> bool {
        self.pending_fetches.contains(shard_id)
    }
}
