//! Allocation deciders.
//!
//! Each decider looks at one concern (disk, filters, shutdown, ...) and
//! answers YES, NO or THROTTLE for a shard on a node. [`Deciders`] runs
//! all of them and collects every verdict into one multi decision, so an
//! explain shows exactly which decider said what.

use shardgrid_core::{
    AllocationSettings, ClusterSnapshot, DiskWatermarks, NodeStats, ShardRouting, ShardState,
};
use shardgrid_decision::{Decision, DecisionType};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// What a decider can see besides the shard and node under test.
#[derive(Debug, Clone, Copy)]
pub struct AllocationContext<'a> {
    pub snapshot: &'a ClusterSnapshot,
}

impl<'a> AllocationContext<'a> {
    pub fn new(snapshot: &'a ClusterSnapshot) -> Self {
        Self { snapshot }
    }
}

/// One allocation concern.
pub trait AllocationDecider: Send + Sync {
    /// Label attached to every decision this decider returns.
    fn name(&self) -> &'static str;

    /// Can `shard` be allocated to `node`?
    fn can_allocate(&self, shard: &ShardRouting, node: &NodeStats, ctx: &AllocationContext<'_>) -> Decision;

    /// Can `shard` stay on `node`, where it currently lives?
    fn can_remain(&self, _shard: &ShardRouting, _node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        Decision::yes(self.name(), "this decider does not restrict where shards remain")
    }

    /// Can `shard` take part in rebalancing at all?
    fn can_rebalance(&self, _shard: &ShardRouting, _ctx: &AllocationContext<'_>) -> Decision {
        Decision::yes(self.name(), "this decider does not restrict rebalancing")
    }
}

// ── Chain ─────────────────────────────────────────────────────────

/// Ordered set of deciders evaluated together.
pub struct Deciders {
    deciders: Vec<Box<dyn AllocationDecider>>,
}

impl Deciders {
    pub fn new(deciders: Vec<Box<dyn AllocationDecider>>) -> Self {
        Self { deciders }
    }

    /// The built-in deciders configured from `settings`.
    pub fn standard(settings: &AllocationSettings) -> Self {
        Self::new(vec![
            Box::new(MaxRetryDecider {
                max_retries: settings.max_retries,
            }),
            Box::new(ReplicaAfterPrimaryActiveDecider),
            Box::new(SameShardDecider),
            Box::new(FilterDecider {
                require: settings.require.clone(),
                exclude: settings.exclude.clone(),
            }),
            Box::new(NodeShutdownDecider),
            Box::new(DiskThresholdDecider {
                watermarks: settings.disk.clone(),
            }),
            Box::new(ThrottlingDecider {
                node_concurrent_recoveries: settings.node_concurrent_recoveries,
                cluster_concurrent_rebalance: settings.cluster_concurrent_rebalance,
            }),
            Box::new(ClusterRebalanceDecider),
        ])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.deciders.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.deciders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deciders.is_empty()
    }

    pub fn can_allocate(&self, shard: &ShardRouting, node: &NodeStats, ctx: &AllocationContext<'_>) -> Decision {
        let decision = Decision::multi(self.deciders.iter().map(|d| {
            let verdict = d.can_allocate(shard, node, ctx);
            trace!(decider = d.name(), node = %node.node.id, verdict = %verdict.decision_type(), "can_allocate");
            verdict
        }));
        log_verdict("can_allocate", shard, Some(node), &decision);
        decision
    }

    pub fn can_remain(&self, shard: &ShardRouting, node: &NodeStats, ctx: &AllocationContext<'_>) -> Decision {
        let decision = Decision::multi(self.deciders.iter().map(|d| d.can_remain(shard, node, ctx)));
        log_verdict("can_remain", shard, Some(node), &decision);
        decision
    }

    pub fn can_rebalance(&self, shard: &ShardRouting, ctx: &AllocationContext<'_>) -> Decision {
        let decision = Decision::multi(self.deciders.iter().map(|d| d.can_rebalance(shard, ctx)));
        log_verdict("can_rebalance", shard, None, &decision);
        decision
    }
}

impl std::fmt::Debug for Deciders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn log_verdict(check: &str, shard: &ShardRouting, node: Option<&NodeStats>, decision: &Decision) {
    if decision.decision_type() == DecisionType::Yes {
        return;
    }
    let vetoes: Vec<&str> = decision
        .leaves()
        .into_iter()
        .filter(|s| s.decision_type() != DecisionType::Yes)
        .filter_map(|s| s.label())
        .collect();
    debug!(
        check,
        shard = %shard.describe(),
        node = node.map(|n| n.node.id.as_str()).unwrap_or("-"),
        verdict = %decision.decision_type(),
        ?vetoes,
        "deciders did not say yes"
    );
}

// ── Built-in deciders ─────────────────────────────────────────────

/// Two copies of one shard never share a node.
#[derive(Debug, Default)]
pub struct SameShardDecider;

impl AllocationDecider for SameShardDecider {
    fn name(&self) -> &'static str {
        "same_shard"
    }

    fn can_allocate(&self, shard: &ShardRouting, node: &NodeStats, ctx: &AllocationContext<'_>) -> Decision {
        let node_id = node.node.id.as_str();
        let existing = ctx.snapshot.assigned_copies(&shard.shard_id).find(|copy| {
            copy.current_node.as_deref() == Some(node_id) || copy.relocating_node.as_deref() == Some(node_id)
        });
        match existing {
            Some(copy) => Decision::no(
                self.name(),
                format!("a copy of this shard is already allocated to this node [{}]", copy.describe()),
            ),
            None => Decision::yes(self.name(), "this node does not hold a copy of this shard"),
        }
    }
}

/// Replicas are only allocated once their primary is started.
#[derive(Debug, Default)]
pub struct ReplicaAfterPrimaryActiveDecider;

impl AllocationDecider for ReplicaAfterPrimaryActiveDecider {
    fn name(&self) -> &'static str {
        "replica_after_primary_active"
    }

    fn can_allocate(&self, shard: &ShardRouting, _node: &NodeStats, ctx: &AllocationContext<'_>) -> Decision {
        if shard.primary {
            return Decision::yes(self.name(), "shard is a primary and can be allocated");
        }
        let primary_active = ctx
            .snapshot
            .assigned_copies(&shard.shard_id)
            .any(|s| s.primary && matches!(s.state, ShardState::Started | ShardState::Relocating));
        if primary_active {
            Decision::yes(self.name(), "primary shard for this replica is already active")
        } else {
            Decision::no(self.name(), "primary shard for this replica is not yet active")
        }
    }
}

/// Attribute based require/exclude filters.
#[derive(Debug, Default)]
pub struct FilterDecider {
    pub require: BTreeMap<String, String>,
    pub exclude: BTreeMap<String, String>,
}

impl FilterDecider {
    fn check(&self, node: &NodeStats) -> Decision {
        let attrs = &node.node.attributes;
        let missing: Vec<String> = self
            .require
            .iter()
            .filter(|(k, v)| attrs.get(*k) != Some(*v))
            .map(|(k, v)| format!("{k}:{v}"))
            .collect();
        if !missing.is_empty() {
            return Decision::no(
                self.name(),
                format!("node does not match [require] filters [{}]", missing.join(",")),
            );
        }
        let matched: Vec<String> = self
            .exclude
            .iter()
            .filter(|(k, v)| attrs.get(*k) == Some(*v))
            .map(|(k, v)| format!("{k}:{v}"))
            .collect();
        if !matched.is_empty() {
            return Decision::no(
                self.name(),
                format!("node matches [exclude] filters [{}]", matched.join(",")),
            );
        }
        Decision::yes(self.name(), "node passes require/exclude filters")
    }
}

impl AllocationDecider for FilterDecider {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn can_allocate(&self, _shard: &ShardRouting, node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        self.check(node)
    }

    fn can_remain(&self, _shard: &ShardRouting, node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        self.check(node)
    }
}

/// Draining nodes accept nothing and hold nothing.
#[derive(Debug, Default)]
pub struct NodeShutdownDecider;

impl AllocationDecider for NodeShutdownDecider {
    fn name(&self) -> &'static str {
        "node_shutdown"
    }

    fn can_allocate(&self, _shard: &ShardRouting, node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        if node.draining {
            Decision::no(self.name(), "node is draining for shutdown and accepts no new shards")
        } else {
            Decision::yes(self.name(), "node is not shutting down")
        }
    }

    fn can_remain(&self, _shard: &ShardRouting, node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        if node.draining {
            Decision::no(self.name(), "node is draining for shutdown and must move its shards away")
        } else {
            Decision::yes(self.name(), "node is not shutting down")
        }
    }
}

/// Disk usage against the low (allocate) and high (remain) watermarks.
#[derive(Debug, Default)]
pub struct DiskThresholdDecider {
    pub watermarks: DiskWatermarks,
}

impl AllocationDecider for DiskThresholdDecider {
    fn name(&self) -> &'static str {
        "disk_threshold"
    }

    fn can_allocate(&self, shard: &ShardRouting, node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        if !self.watermarks.enabled {
            return Decision::yes(self.name(), "the disk threshold decider is disabled");
        }
        let usage = node.disk_usage_ratio();
        if usage > self.watermarks.low {
            return Decision::no(
                self.name(),
                format!(
                    "the node is above the low watermark [{:.1}%], having [{:.1}%] disk used",
                    self.watermarks.low * 100.0,
                    usage * 100.0
                ),
            );
        }
        let projected = node.projected_usage_ratio(shard.size_bytes);
        if projected > self.watermarks.high {
            return Decision::no(
                self.name(),
                format!(
                    "allocating the shard [{}b] would put the node above the high watermark [{:.1}%]",
                    shard.size_bytes,
                    self.watermarks.high * 100.0
                ),
            );
        }
        Decision::yes(
            self.name(),
            format!("enough disk for shard on node, free: [{}b]", node.free_disk()),
        )
    }

    fn can_remain(&self, _shard: &ShardRouting, node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        if !self.watermarks.enabled {
            return Decision::yes(self.name(), "the disk threshold decider is disabled");
        }
        let usage = node.disk_usage_ratio();
        if usage > self.watermarks.high {
            return Decision::no(
                self.name(),
                format!(
                    "the shard cannot remain on this node because it is above the high watermark [{:.1}%], having [{:.1}%] disk used",
                    self.watermarks.high * 100.0,
                    usage * 100.0
                ),
            );
        }
        Decision::yes(self.name(), "the node is below the high watermark")
    }
}

/// Caps on concurrent recoveries per node and relocations per cluster.
#[derive(Debug)]
pub struct ThrottlingDecider {
    pub node_concurrent_recoveries: u32,
    pub cluster_concurrent_rebalance: u32,
}

impl AllocationDecider for ThrottlingDecider {
    fn name(&self) -> &'static str {
        "throttling"
    }

    fn can_allocate(&self, _shard: &ShardRouting, node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        let incoming = node.incoming_recoveries;
        let limit = self.node_concurrent_recoveries;
        if incoming >= limit {
            Decision::throttle(
                self.name(),
                format!(
                    "reached the limit of incoming shard recoveries [{incoming}], setting [node_concurrent_recoveries={limit}]"
                ),
            )
        } else {
            Decision::yes(
                self.name(),
                format!("below shard recovery limit of incoming [{incoming}/{limit}]"),
            )
        }
    }

    fn can_rebalance(&self, _shard: &ShardRouting, ctx: &AllocationContext<'_>) -> Decision {
        let relocating = ctx
            .snapshot
            .shards
            .iter()
            .filter(|s| s.state == ShardState::Relocating)
            .count();
        let limit = self.cluster_concurrent_rebalance as usize;
        if relocating >= limit {
            Decision::throttle(
                self.name(),
                format!(
                    "reached the limit of concurrently rebalancing shards [{relocating}], setting [cluster_concurrent_rebalance={limit}]"
                ),
            )
        } else {
            Decision::yes(
                self.name(),
                format!("below the limit of concurrently rebalancing shards [{relocating}/{limit}]"),
            )
        }
    }
}

/// Shards that keep failing to allocate are parked.
#[derive(Debug)]
pub struct MaxRetryDecider {
    pub max_retries: u32,
}

impl AllocationDecider for MaxRetryDecider {
    fn name(&self) -> &'static str {
        "max_retry"
    }

    fn can_allocate(&self, shard: &ShardRouting, _node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        let Some(info) = &shard.unassigned_info else {
            return Decision::yes(self.name(), "shard has no previous failures");
        };
        if info.failed_allocations >= self.max_retries {
            let last = info.message.as_deref().unwrap_or("unknown");
            return Decision::no(
                self.name(),
                format!(
                    "shard has exceeded the maximum number of retries [{}] on failed allocation attempts, last failure [{last}]",
                    self.max_retries
                ),
            );
        }
        Decision::yes(
            self.name(),
            format!(
                "shard has failed allocating [{}] times but [{}] retries are allowed",
                info.failed_allocations, self.max_retries
            ),
        )
    }
}

/// Rebalancing waits until every shard in the cluster is active.
#[derive(Debug, Default)]
pub struct ClusterRebalanceDecider;

impl AllocationDecider for ClusterRebalanceDecider {
    fn name(&self) -> &'static str {
        "cluster_rebalance"
    }

    fn can_allocate(&self, _shard: &ShardRouting, _node: &NodeStats, _ctx: &AllocationContext<'_>) -> Decision {
        Decision::yes(self.name(), "rebalancing rules do not restrict allocation")
    }

    fn can_rebalance(&self, shard: &ShardRouting, ctx: &AllocationContext<'_>) -> Decision {
        if shard.state != ShardState::Started {
            return Decision::no(
                self.name(),
                format!("the shard is not started [{:?}]", shard.state),
            );
        }
        let inactive = ctx
            .snapshot
            .shards
            .iter()
            .filter(|s| matches!(s.state, ShardState::Unassigned | ShardState::Initializing))
            .count();
        if inactive > 0 {
            return Decision::no(
                self.name(),
                format!("rebalancing is not allowed until all shards are active, [{inactive}] are not"),
            );
        }
        Decision::yes(self.name(), "all shards are active")
    }
}
