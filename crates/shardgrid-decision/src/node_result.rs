//! Per-node outcome of an allocation or move evaluation.

use std::cmp::Ordering;

use shardgrid_core::DiscoveryNode;

use crate::allocation::AllocationDecision;
use crate::codec::{Readable, StreamInput, StreamOutput, Writeable};
use crate::decision::Decision;
use crate::error::DecisionResult;

/// What the deciders said about one candidate node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAllocationResult {
    node: DiscoveryNode,
    can_allocate: Option<Decision>,
    node_decision: AllocationDecision,
    /// Position in the balance ordering; lower is a better fit.
    weight_ranking: u32,
}

impl NodeAllocationResult {
    /// A result whose summary follows the decider verdict.
    pub fn new(node: DiscoveryNode, can_allocate: Decision, weight_ranking: u32) -> Self {
        let node_decision = AllocationDecision::from_decision_type(can_allocate.decision_type());
        Self {
            node,
            can_allocate: Some(can_allocate),
            node_decision,
            weight_ranking,
        }
    }

    /// A result with an explicit summary, e.g. `WorseBalance` for a node
    /// the deciders allow but the balancer rejects.
    pub fn with_node_decision(
        node: DiscoveryNode,
        node_decision: AllocationDecision,
        can_allocate: Option<Decision>,
        weight_ranking: u32,
    ) -> Self {
        Self {
            node,
            can_allocate,
            node_decision,
            weight_ranking,
        }
    }

    pub fn node(&self) -> &DiscoveryNode {
        &self.node
    }

    pub fn can_allocate(&self) -> Option<&Decision> {
        self.can_allocate.as_ref()
    }

    pub fn node_decision(&self) -> AllocationDecision {
        self.node_decision
    }

    pub fn weight_ranking(&self) -> u32 {
        self.weight_ranking
    }

    /// Explain output order: weight ranking ascending, then node id.
    pub fn explain_order(&self, other: &Self) -> Ordering {
        self.weight_ranking
            .cmp(&other.weight_ranking)
            .then_with(|| self.node.id.cmp(&other.node.id))
    }
}

/// Sort results into explain output order.
pub fn sort_node_results(results: &mut [NodeAllocationResult]) {
    results.sort_by(NodeAllocationResult::explain_order);
}

impl Writeable for NodeAllocationResult {
    fn write_to(&self, out: &mut StreamOutput) {
        self.node.write_to(out);
        out.write_optional(self.can_allocate.as_ref());
        out.write_enum(self.node_decision);
        out.write_vint(self.weight_ranking);
    }
}

impl Readable for NodeAllocationResult {
    fn read_from(input: &mut StreamInput<'_>) -> DecisionResult<Self> {
        Ok(Self {
            node: DiscoveryNode::read_from(input)?,
            can_allocate: input.read_optional()?,
            node_decision: input.read_enum()?,
            weight_ranking: input.read_vint()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, rank: u32) -> NodeAllocationResult {
        NodeAllocationResult::new(
            DiscoveryNode::new(id, id, "127.0.0.1:9300"),
            Decision::ALWAYS,
            rank,
        )
    }

    #[test]
    fn sorts_by_weight_then_node_id() {
        let mut results = vec![result("n3", 2), result("n2", 1), result("n1", 2), result("n0", 3)];
        sort_node_results(&mut results);
        let ids: Vec<&str> = results.iter().map(|r| r.node().id.as_str()).collect();
        assert_eq!(ids, ["n2", "n1", "n3", "n0"]);
    }

    #[test]
    fn summary_follows_decision_type() {
        let r = NodeAllocationResult::new(
            DiscoveryNode::new("n1", "n1", "addr"),
            Decision::multi([Decision::yes("a", ""), Decision::throttle("b", "busy")]),
            1,
        );
        assert_eq!(r.node_decision(), AllocationDecision::Throttled);
    }

    #[test]
    fn explicit_summary_without_decision_survives_the_wire() {
        let r = NodeAllocationResult::with_node_decision(
            DiscoveryNode::new("n1", "n1", "addr"),
            AllocationDecision::WorseBalance,
            None,
            4,
        );
        let mut out = StreamOutput::new();
        r.write_to(&mut out);
        let bytes = out.into_bytes();
        let back = NodeAllocationResult::read_from(&mut StreamInput::new(&bytes)).unwrap();
        assert_eq!(back, r);
    }
}
