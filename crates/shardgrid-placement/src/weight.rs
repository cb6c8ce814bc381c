//! Balance weighting for node rankings.
//!
//! A node's weight is how far it sits above the cluster average, combining:
//! - **Shard count**: copies placed on (or relocating to) the node
//! - **Disk usage**: fraction of the node's disk in use
//!
//! Lower weight means a less loaded node and a better allocation target.

use std::cmp::Ordering;

use shardgrid_core::BalanceWeights;

/// One tenth of a disk counts as much as one shard.
const DISK_UNITS: f64 = 10.0;

/// Load of a single node as seen by the balancer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeLoad {
    pub node_id: String,
    pub shard_count: u32,
    pub disk_used_bytes: u64,
    pub disk_total_bytes: u64,
}

impl NodeLoad {
    pub fn disk_usage(&self) -> f64 {
        if self.disk_total_bytes == 0 {
            return 1.0;
        }
        (self.disk_used_bytes as f64 / self.disk_total_bytes as f64).min(1.0)
    }

    /// The load after one more shard of `shard_bytes` lands here.
    pub fn with_shard(&self, shard_bytes: u64) -> Self {
        Self {
            shard_count: self.shard_count + 1,
            disk_used_bytes: self.disk_used_bytes.saturating_add(shard_bytes),
            ..self.clone()
        }
    }

    /// The load after one shard of `shard_bytes` leaves.
    pub fn without_shard(&self, shard_bytes: u64) -> Self {
        Self {
            shard_count: self.shard_count.saturating_sub(1),
            disk_used_bytes: self.disk_used_bytes.saturating_sub(shard_bytes),
            ..self.clone()
        }
    }
}

/// Cluster-wide averages the weights are measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterAverages {
    pub shards: f64,
    pub disk_usage: f64,
}

impl ClusterAverages {
    pub fn from_loads(loads: &[NodeLoad]) -> Self {
        if loads.is_empty() {
            return Self {
                shards: 0.0,
                disk_usage: 0.0,
            };
        }
        let n = loads.len() as f64;
        Self {
            shards: loads.iter().map(|l| f64::from(l.shard_count)).sum::<f64>() / n,
            disk_usage: loads.iter().map(NodeLoad::disk_usage).sum::<f64>() / n,
        }
    }
}

/// Weighted node position relative to the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeWeight {
    pub node_id: String,
    pub weight: f64,
    /// 1-based position in ascending weight order.
    pub ranking: u32,
}

/// Normalized balance factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightFunction {
    shard_factor: f64,
    disk_factor: f64,
}

impl WeightFunction {
    pub fn new(weights: &BalanceWeights) -> Self {
        let sum = weights.shard + weights.disk;
        if sum <= 0.0 {
            return Self {
                shard_factor: 1.0,
                disk_factor: 0.0,
            };
        }
        Self {
            shard_factor: weights.shard / sum,
            disk_factor: weights.disk / sum,
        }
    }

    pub fn weight(&self, load: &NodeLoad, avg: &ClusterAverages) -> f64 {
        let shards = f64::from(load.shard_count) - avg.shards;
        let disk = (load.disk_usage() - avg.disk_usage) * DISK_UNITS;
        self.shard_factor * shards + self.disk_factor * disk
    }

    /// Whether moving a shard of `shard_bytes` from `from` to `to` narrows
    /// the weight gap between them by more than `threshold`.
    pub fn improves_balance(
        &self,
        from: &NodeLoad,
        to: &NodeLoad,
        shard_bytes: u64,
        avg: &ClusterAverages,
        threshold: f64,
    ) -> bool {
        let before = self.weight(from, avg) - self.weight(to, avg);
        if before <= threshold {
            return false;
        }
        let after =
            self.weight(&from.without_shard(shard_bytes), avg) - self.weight(&to.with_shard(shard_bytes), avg);
        after.abs() < before
    }
}

/// Weigh all nodes and rank them, least loaded first. Ties go to the
/// lexicographically smaller node id.
pub fn rank_nodes(loads: &[NodeLoad], weights: &WeightFunction) -> Vec<NodeWeight> {
    let avg = ClusterAverages::from_loads(loads);

    let mut ranked: Vec<NodeWeight> = loads
        .iter()
        .map(|load| NodeWeight {
            node_id: load.node_id.clone(),
            weight: weights.weight(load, &avg),
            ranking: 0,
        })
        .collect();

    ranked.sort_by(|a, b| match a.weight.total_cmp(&b.weight) {
        Ordering::Equal => a.node_id.cmp(&b.node_id),
        other => other,
    });
    for (i, w) in ranked.iter_mut().enumerate() {
        w.ranking = i as u32 + 1;
    }
    ranked
}
