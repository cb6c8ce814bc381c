//! Explain record for a shard that is already on a node: may it stay,
//! must it move, and would moving it improve balance.

use shardgrid_core::DiscoveryNode;

use crate::allocation::AllocationDecision;
use crate::codec::{Readable, StreamInput, StreamOutput, Writeable};
use crate::decision::{Decision, DecisionType};
use crate::error::DecisionResult;
use crate::node_result::{NodeAllocationResult, sort_node_results};

static NOT_TAKEN: MoveDecision = MoveDecision::NOT_TAKEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveDecision {
    taken: bool,
    /// Verdict on keeping the shard where it is.
    can_remain: Option<Decision>,
    /// Verdict on rebalancing the cluster at all; present only when the
    /// rebalance path was evaluated.
    cluster_rebalance: Option<Decision>,
    move_decision: AllocationDecision,
    target_node: Option<DiscoveryNode>,
    node_results: Vec<NodeAllocationResult>,
    current_node_ranking: u32,
}

impl MoveDecision {
    pub const NOT_TAKEN: MoveDecision = MoveDecision {
        taken: false,
        can_remain: None,
        cluster_rebalance: None,
        move_decision: AllocationDecision::NoAttempt,
        target_node: None,
        node_results: Vec::new(),
        current_node_ranking: 0,
    };

    pub fn not_taken() -> &'static Self {
        &NOT_TAKEN
    }

    /// The shard may not stay on its node. `move_decision` says whether a
    /// destination was found (`Yes`, with `target_node`), is throttled, or
    /// does not exist (`No`).
    pub fn cannot_remain(
        can_remain: Decision,
        move_decision: AllocationDecision,
        target_node: Option<DiscoveryNode>,
        mut node_results: Vec<NodeAllocationResult>,
    ) -> Self {
        debug_assert!(
            can_remain.decision_type() != DecisionType::Yes,
            "cannot_remain requires a non-YES remain decision"
        );
        sort_node_results(&mut node_results);
        Self {
            taken: true,
            can_remain: Some(can_remain),
            cluster_rebalance: None,
            move_decision,
            target_node,
            node_results,
            current_node_ranking: 0,
        }
    }

    /// The shard may stay and no rebalance was considered.
    pub fn stay(can_remain: Decision) -> Self {
        Self {
            taken: true,
            can_remain: Some(can_remain),
            cluster_rebalance: None,
            move_decision: AllocationDecision::NoAttempt,
            target_node: None,
            node_results: Vec::new(),
            current_node_ranking: 0,
        }
    }

    /// The shard may stay; the rebalance path was evaluated.
    pub fn rebalance(
        can_remain: Decision,
        cluster_rebalance: Decision,
        move_decision: AllocationDecision,
        target_node: Option<DiscoveryNode>,
        mut node_results: Vec<NodeAllocationResult>,
        current_node_ranking: u32,
    ) -> Self {
        sort_node_results(&mut node_results);
        Self {
            taken: true,
            can_remain: Some(can_remain),
            cluster_rebalance: Some(cluster_rebalance),
            move_decision,
            target_node,
            node_results,
            current_node_ranking,
        }
    }

    pub fn is_decision_taken(&self) -> bool {
        self.taken
    }

    pub fn can_remain_decision(&self) -> Option<&Decision> {
        self.can_remain.as_ref()
    }

    pub fn cluster_rebalance_decision(&self) -> Option<&Decision> {
        self.cluster_rebalance.as_ref()
    }

    pub fn move_decision(&self) -> AllocationDecision {
        self.move_decision
    }

    pub fn target_node(&self) -> Option<&DiscoveryNode> {
        self.target_node.as_ref()
    }

    pub fn node_results(&self) -> &[NodeAllocationResult] {
        &self.node_results
    }

    pub fn current_node_ranking(&self) -> u32 {
        self.current_node_ranking
    }

    /// Whether the shard may stay. Absent remain verdicts count as YES.
    pub fn can_remain(&self) -> bool {
        self.can_remain
            .as_ref()
            .is_none_or(|d| d.decision_type() == DecisionType::Yes)
    }

    /// The shard must leave and a destination was found.
    pub fn force_move(&self) -> bool {
        !self.can_remain() && self.move_decision == AllocationDecision::Yes
    }

    pub fn can_rebalance_cluster(&self) -> bool {
        self.cluster_rebalance
            .as_ref()
            .is_some_and(|d| d.decision_type() == DecisionType::Yes)
    }

    /// One-sentence reason for the verdict.
    pub fn explanation(&self) -> String {
        if !self.taken {
            return "no move or rebalance evaluation was made for the shard".to_string();
        }
        if !self.can_remain() {
            return match self.move_decision {
                AllocationDecision::Yes => {
                    "the shard cannot remain on its node and is moved to another node"
                }
                AllocationDecision::Throttled => {
                    "the shard cannot remain on its node, but moving it to another node is throttled"
                }
                _ => "the shard cannot remain on its node and no other node accepts it",
            }
            .to_string();
        }
        let Some(rebalance) = &self.cluster_rebalance else {
            return "the shard can remain on its current node".to_string();
        };
        match rebalance.decision_type() {
            DecisionType::No => {
                return "rebalancing is not allowed, so the shard stays on its current node".to_string();
            }
            DecisionType::Throttle => {
                return "rebalancing is throttled, so the shard stays on its current node".to_string();
            }
            DecisionType::Yes => {}
        }
        let text = match self.move_decision {
            AllocationDecision::Yes => "the shard can be rebalanced to another node",
            AllocationDecision::Throttled => "rebalancing the shard to another node is throttled",
            AllocationDecision::WorseBalance => {
                "the shard stays: no node that accepts it would improve the cluster balance"
            }
            AllocationDecision::AwaitingInfo => {
                "the shard stays: waiting for information about existing shard copies"
            }
            _ => "the shard stays: no other node accepts it",
        };
        text.to_string()
    }
}

impl Default for MoveDecision {
    fn default() -> Self {
        Self::NOT_TAKEN
    }
}

impl Writeable for MoveDecision {
    fn write_to(&self, out: &mut StreamOutput) {
        out.write_bool(self.taken);
        if !self.taken {
            return;
        }
        out.write_optional(self.can_remain.as_ref());
        out.write_optional(self.cluster_rebalance.as_ref());
        out.write_enum(self.move_decision);
        out.write_optional(self.target_node.as_ref());
        out.write_list(&self.node_results);
        out.write_vint(self.current_node_ranking);
    }
}

impl Readable for MoveDecision {
    fn read_from(input: &mut StreamInput<'_>) -> DecisionResult<Self> {
        if !input.read_bool()? {
            return Ok(Self::NOT_TAKEN);
        }
        Ok(Self {
            taken: true,
            can_remain: input.read_optional()?,
            cluster_rebalance: input.read_optional()?,
            move_decision: input.read_enum()?,
            target_node: input.read_optional()?,
            node_results: input.read_list()?,
            current_node_ranking: input.read_vint()?,
        })
    }
}
