//! Allocation explain driver.
//!
//! Given a snapshot and one shard copy, decides:
//! 1. Unassigned copies: where the copy would be allocated, or why it
//!    cannot be (fetching, delayed, no valid copy, deciders)
//! 2. Assigned copies: whether the copy must leave its node, and if not,
//!    whether moving it would improve the cluster balance

use shardgrid_core::{
    AllocationSettings, BalanceWeights, ClusterSnapshot, DiscoveryNode, NodeStats, ShardCopy, ShardId,
    ShardRouting, UnassignedReason,
};
use shardgrid_decision::{
    AllocateUnassignedDecision, AllocationDecision, AllocationStatus, DecisionType, MoveDecision,
    NodeAllocationResult, ShardAllocationDecision,
};
use tracing::{debug, info, warn};

use crate::convert::node_loads;
use crate::deciders::{AllocationContext, Deciders};
use crate::error::{PlacementError, PlacementResult};
use crate::weight::{ClusterAverages, NodeLoad, NodeWeight, WeightFunction, rank_nodes};

/// Explain the allocation of one shard copy with the standard deciders.
pub fn explain_shard(
    snapshot: &ClusterSnapshot,
    shard_id: &ShardId,
    primary: bool,
    settings: &AllocationSettings,
) -> PlacementResult<ShardAllocationDecision> {
    let deciders = Deciders::standard(settings);
    explain_shard_with(snapshot, shard_id, primary, settings, &deciders)
}

/// Explain the allocation of one shard copy with a custom decider chain.
pub fn explain_shard_with(
    snapshot: &ClusterSnapshot,
    shard_id: &ShardId,
    primary: bool,
    settings: &AllocationSettings,
    deciders: &Deciders,
) -> PlacementResult<ShardAllocationDecision> {
    let shard = snapshot
        .shard(shard_id, primary)
        .ok_or_else(|| PlacementError::UnknownShard {
            shard_id: shard_id.clone(),
            primary,
        })?;

    info!(shard = %shard.describe(), assigned = shard.is_assigned(), "explaining shard allocation");

    if shard.is_assigned() {
        let decision = explain_move(snapshot, shard, settings, deciders)?;
        Ok(ShardAllocationDecision::assigned(decision))
    } else {
        let decision = explain_unassigned(snapshot, shard, settings, deciders);
        Ok(ShardAllocationDecision::unassigned(decision))
    }
}

// ── Unassigned ────────────────────────────────────────────────────

/// Explain where an unassigned copy would go.
pub fn explain_unassigned(
    snapshot: &ClusterSnapshot,
    shard: &ShardRouting,
    settings: &AllocationSettings,
    deciders: &Deciders,
) -> AllocateUnassignedDecision {
    let ctx = AllocationContext::new(snapshot);
    let balancer = Balancer::new(snapshot, &settings.balance);

    if shard.primary && snapshot.is_fetching(&shard.shard_id) {
        debug!(shard = %shard.describe(), "still fetching shard copies");
        return AllocateUnassignedDecision::fetching_shard_data();
    }

    if let Some(remaining) = remaining_delay(snapshot, shard, settings) {
        let results = evaluate_nodes(&ctx, deciders, shard, snapshot.nodes.iter(), &balancer);
        info!(
            shard = %shard.describe(),
            remaining_ms = remaining,
            "allocation delayed until the departed node returns"
        );
        return AllocateUnassignedDecision::delayed(remaining, settings.delayed_timeout_ms, results);
    }

    let recovering = shard.primary
        && shard
            .unassigned_info
            .as_ref()
            .is_some_and(|info| info.reason != UnassignedReason::IndexCreated);

    let (results, reuse_store) = if recovering {
        let copies: Vec<&ShardCopy> = snapshot.copies_of(&shard.shard_id).collect();
        let holders: Vec<&NodeStats> = copies
            .iter()
            .filter(|c| c.is_usable())
            .filter_map(|c| snapshot.node(&c.node_id))
            .collect();
        if holders.is_empty() {
            let results: Vec<NodeAllocationResult> = copies
                .iter()
                .filter_map(|c| snapshot.node(&c.node_id))
                .map(|n| {
                    NodeAllocationResult::with_node_decision(
                        n.node.clone(),
                        AllocationDecision::NoValidShardCopy,
                        None,
                        balancer.rank_of(&n.node.id),
                    )
                })
                .collect();
            warn!(
                shard = %shard.describe(),
                copies = copies.len(),
                "no valid shard copy found for primary"
            );
            return AllocateUnassignedDecision::no_valid_shard_copy(results);
        }
        (
            evaluate_nodes(&ctx, deciders, shard, holders.into_iter(), &balancer),
            true,
        )
    } else {
        (
            evaluate_nodes(&ctx, deciders, shard, snapshot.nodes.iter(), &balancer),
            false,
        )
    };

    match pick_target(&results) {
        Pick::Target(target) => {
            let allocation_id = reusable_copy(snapshot, &shard.shard_id, &target.id)
                .map(|c| c.allocation_id.clone());
            let reuse_store = reuse_store || allocation_id.is_some();
            info!(shard = %shard.describe(), node = %target.id, reuse_store, "shard can be allocated");
            AllocateUnassignedDecision::yes(target, allocation_id, results, reuse_store)
        }
        Pick::Throttled => {
            debug!(shard = %shard.describe(), "allocation throttled on every allowed node");
            AllocateUnassignedDecision::throttle(results)
        }
        Pick::None => {
            warn!(shard = %shard.describe(), nodes = results.len(), "no node can accept the shard");
            AllocateUnassignedDecision::no(AllocationStatus::DecidersNo, results, reuse_store)
        }
    }
}

/// Remaining delay for a replica whose node left, or `None` if the copy
/// may be allocated now.
fn remaining_delay(
    snapshot: &ClusterSnapshot,
    shard: &ShardRouting,
    settings: &AllocationSettings,
) -> Option<u64> {
    if shard.primary {
        return None;
    }
    let info = shard.unassigned_info.as_ref()?;
    if !info.delayed || info.reason != UnassignedReason::NodeLeft {
        return None;
    }
    let waited = snapshot.now_ms.saturating_sub(info.unassigned_at_ms);
    let remaining = settings.delayed_timeout_ms.saturating_sub(waited);
    (remaining > 0).then_some(remaining)
}

fn reusable_copy<'a>(snapshot: &'a ClusterSnapshot, shard_id: &'a ShardId, node_id: &str) -> Option<&'a ShardCopy> {
    snapshot
        .copies_of(shard_id)
        .find(|c| c.node_id == node_id && c.is_usable())
}

// ── Assigned ──────────────────────────────────────────────────────

/// Explain whether an assigned copy stays, must move, or would be
/// rebalanced.
pub fn explain_move(
    snapshot: &ClusterSnapshot,
    shard: &ShardRouting,
    settings: &AllocationSettings,
    deciders: &Deciders,
) -> PlacementResult<MoveDecision> {
    let node_id = shard.current_node.as_deref().unwrap_or_default();
    let current = snapshot.node(node_id).ok_or_else(|| PlacementError::UnknownNode {
        shard: shard.describe(),
        node_id: node_id.to_string(),
    })?;

    let ctx = AllocationContext::new(snapshot);
    let balancer = Balancer::new(snapshot, &settings.balance);
    let others: Vec<&NodeStats> = snapshot
        .nodes
        .iter()
        .filter(|n| n.node.id != current.node.id)
        .collect();

    let can_remain = deciders.can_remain(shard, current, &ctx);
    if can_remain.decision_type() != DecisionType::Yes {
        let results = evaluate_nodes(&ctx, deciders, shard, others.iter().copied(), &balancer);
        let (summary, target) = match pick_target(&results) {
            Pick::Target(node) => (AllocationDecision::Yes, Some(node)),
            Pick::Throttled => (AllocationDecision::Throttled, None),
            Pick::None => (AllocationDecision::No, None),
        };
        if target.is_some() {
            info!(shard = %shard.describe(), from = %current.node.id, "shard cannot remain and will move");
        } else {
            warn!(shard = %shard.describe(), node = %current.node.id, %summary, "shard cannot remain and cannot move");
        }
        return Ok(MoveDecision::cannot_remain(can_remain, summary, target, results));
    }

    if others.is_empty() {
        debug!(shard = %shard.describe(), "single node cluster, nothing to rebalance to");
        return Ok(MoveDecision::stay(can_remain));
    }

    let current_ranking = balancer.rank_of(&current.node.id);
    let cluster_rebalance = deciders.can_rebalance(shard, &ctx);
    if cluster_rebalance.decision_type() != DecisionType::Yes {
        let summary = AllocationDecision::from_decision_type(cluster_rebalance.decision_type());
        debug!(shard = %shard.describe(), %summary, "rebalancing not allowed");
        return Ok(MoveDecision::rebalance(
            can_remain,
            cluster_rebalance,
            summary,
            None,
            Vec::new(),
            current_ranking,
        ));
    }

    let results: Vec<NodeAllocationResult> = others
        .iter()
        .map(|node| {
            let decision = deciders.can_allocate(shard, node, &ctx);
            let ranking = balancer.rank_of(&node.node.id);
            let allowed = decision.decision_type() == DecisionType::Yes;
            if allowed && !balancer.improves(&current.node.id, &node.node.id, shard.size_bytes) {
                NodeAllocationResult::with_node_decision(
                    node.node.clone(),
                    AllocationDecision::WorseBalance,
                    Some(decision),
                    ranking,
                )
            } else {
                NodeAllocationResult::new(node.node.clone(), decision, ranking)
            }
        })
        .collect();

    let (summary, target) = match pick_target(&results) {
        Pick::Target(node) => (AllocationDecision::Yes, Some(node)),
        Pick::Throttled => (AllocationDecision::Throttled, None),
        Pick::None => (AllocationDecision::No, None),
    };
    debug!(
        shard = %shard.describe(),
        current_ranking,
        %summary,
        to_node = target.as_ref().map(|n| n.id.as_str()).unwrap_or("-"),
        "rebalance evaluated"
    );
    Ok(MoveDecision::rebalance(
        can_remain,
        cluster_rebalance,
        summary,
        target,
        results,
        current_ranking,
    ))
}

// ── Shared ────────────────────────────────────────────────────────

fn evaluate_nodes<'a>(
    ctx: &AllocationContext<'_>,
    deciders: &Deciders,
    shard: &ShardRouting,
    nodes: impl Iterator<Item = &'a NodeStats>,
    balancer: &Balancer,
) -> Vec<NodeAllocationResult> {
    nodes
        .map(|node| {
            let decision = deciders.can_allocate(shard, node, ctx);
            NodeAllocationResult::new(node.node.clone(), decision, balancer.rank_of(&node.node.id))
        })
        .collect()
}

enum Pick {
    Target(DiscoveryNode),
    Throttled,
    None,
}

/// Best YES node by ranking, else whether any node was throttled.
fn pick_target(results: &[NodeAllocationResult]) -> Pick {
    let best = results
        .iter()
        .filter(|r| r.node_decision() == AllocationDecision::Yes)
        .min_by(|a, b| a.explain_order(b));
    if let Some(best) = best {
        return Pick::Target(best.node().clone());
    }
    if results.iter().any(|r| r.node_decision() == AllocationDecision::Throttled) {
        Pick::Throttled
    } else {
        Pick::None
    }
}

/// Node weights for one snapshot.
struct Balancer {
    loads: Vec<NodeLoad>,
    ranked: Vec<NodeWeight>,
    avg: ClusterAverages,
    weights: WeightFunction,
    threshold: f64,
}

impl Balancer {
    fn new(snapshot: &ClusterSnapshot, balance: &BalanceWeights) -> Self {
        let loads = node_loads(snapshot);
        let weights = WeightFunction::new(balance);
        let ranked = rank_nodes(&loads, &weights);
        let avg = ClusterAverages::from_loads(&loads);
        Self {
            loads,
            ranked,
            avg,
            weights,
            threshold: balance.threshold,
        }
    }

    /// 1-based ranking, or 0 for a node outside the snapshot.
    fn rank_of(&self, node_id: &str) -> u32 {
        self.ranked
            .iter()
            .find(|w| w.node_id == node_id)
            .map_or(0, |w| w.ranking)
    }

    fn load(&self, node_id: &str) -> Option<&NodeLoad> {
        self.loads.iter().find(|l| l.node_id == node_id)
    }

    fn improves(&self, from: &str, to: &str, shard_bytes: u64) -> bool {
        match (self.load(from), self.load(to)) {
            (Some(from), Some(to)) => {
                self.weights
                    .improves_balance(from, to, shard_bytes, &self.avg, self.threshold)
            }
            _ => false,
        }
    }
}
