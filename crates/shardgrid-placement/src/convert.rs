//! Conversions from snapshot types to balancer input.
//!
//! Bridges `shardgrid_core::{ClusterSnapshot, NodeStats}` to the
//! weighting's [`NodeLoad`].

use shardgrid_core::{ClusterSnapshot, NodeStats};

use crate::weight::NodeLoad;

/// Load of one node, counting every shard placed on or relocating to it.
pub fn node_load(snapshot: &ClusterSnapshot, stats: &NodeStats) -> NodeLoad {
    let shard_count = snapshot.shards_on_node(&stats.node.id).count();
    NodeLoad {
        node_id: stats.node.id.clone(),
        shard_count: u32::try_from(shard_count).unwrap_or(u32::MAX),
        disk_used_bytes: stats.disk_used_bytes,
        disk_total_bytes: stats.disk_total_bytes,
    }
}

/// Loads of every node in snapshot order.
pub fn node_loads(snapshot: &ClusterSnapshot) -> Vec<NodeLoad> {
    snapshot.nodes.iter().map(|n| node_load(snapshot, n)).collect()
}
