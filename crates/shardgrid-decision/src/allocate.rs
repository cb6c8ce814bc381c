//! Explain record for a shard that currently has no node.

use std::time::Duration;

use shardgrid_core::DiscoveryNode;

use crate::allocation::{AllocationDecision, AllocationStatus};
use crate::codec::{Readable, StreamInput, StreamOutput, Writeable};
use crate::error::DecisionResult;
use crate::node_result::{NodeAllocationResult, sort_node_results};

static NOT_TAKEN: AllocateUnassignedDecision = AllocateUnassignedDecision::NOT_TAKEN;

/// Why an unassigned shard was (or was not) given a node.
///
/// Built through the factories below; the only other value is
/// [`AllocateUnassignedDecision::NOT_TAKEN`], which stands in for "this
/// question was not asked" on assigned shards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocateUnassignedDecision {
    taken: bool,
    allocation_status: Option<AllocationStatus>,
    target_node: Option<DiscoveryNode>,
    /// Id of the existing on-disk copy being reused, if any.
    allocation_id: Option<String>,
    node_results: Vec<NodeAllocationResult>,
    reuse_store: bool,
    remaining_delay_ms: u64,
    configured_delay_ms: u64,
}

impl AllocateUnassignedDecision {
    pub const NOT_TAKEN: AllocateUnassignedDecision = AllocateUnassignedDecision {
        taken: false,
        allocation_status: None,
        target_node: None,
        allocation_id: None,
        node_results: Vec::new(),
        reuse_store: false,
        remaining_delay_ms: 0,
        configured_delay_ms: 0,
    };

    /// Shared sentinel instance.
    pub fn not_taken() -> &'static Self {
        &NOT_TAKEN
    }

    fn build(
        allocation_status: Option<AllocationStatus>,
        target_node: Option<DiscoveryNode>,
        allocation_id: Option<String>,
        mut node_results: Vec<NodeAllocationResult>,
        reuse_store: bool,
        remaining_delay_ms: u64,
        configured_delay_ms: u64,
    ) -> Self {
        sort_node_results(&mut node_results);
        Self {
            taken: true,
            allocation_status,
            target_node,
            allocation_id,
            node_results,
            reuse_store,
            remaining_delay_ms,
            configured_delay_ms,
        }
    }

    /// The shard could not be allocated. Use [`Self::delayed`] for
    /// [`AllocationStatus::DelayedAllocation`] so the delays are recorded;
    /// passing it here yields `delayed(0, 0, node_results)` and drops
    /// `reuse_store`.
    pub fn no(
        allocation_status: AllocationStatus,
        node_results: Vec<NodeAllocationResult>,
        reuse_store: bool,
    ) -> Self {
        if allocation_status == AllocationStatus::DelayedAllocation {
            return Self::delayed(0, 0, node_results);
        }
        Self::build(Some(allocation_status), None, None, node_results, reuse_store, 0, 0)
    }

    /// Deciders allow the shard somewhere but asked to wait.
    pub fn throttle(node_results: Vec<NodeAllocationResult>) -> Self {
        Self::build(
            Some(AllocationStatus::DecidersThrottled),
            None,
            None,
            node_results,
            false,
            0,
            0,
        )
    }

    /// The shard is allocated to `target_node`.
    pub fn yes(
        target_node: DiscoveryNode,
        allocation_id: Option<String>,
        node_results: Vec<NodeAllocationResult>,
        reuse_store: bool,
    ) -> Self {
        Self::build(None, Some(target_node), allocation_id, node_results, reuse_store, 0, 0)
    }

    /// Allocation waits for a departed node to come back.
    pub fn delayed(
        remaining_delay_ms: u64,
        configured_delay_ms: u64,
        node_results: Vec<NodeAllocationResult>,
    ) -> Self {
        Self::build(
            Some(AllocationStatus::DelayedAllocation),
            None,
            None,
            node_results,
            false,
            remaining_delay_ms,
            configured_delay_ms,
        )
    }

    pub fn fetching_shard_data() -> Self {
        Self::no(AllocationStatus::FetchingShardData, Vec::new(), false)
    }

    pub fn no_valid_shard_copy(node_results: Vec<NodeAllocationResult>) -> Self {
        Self::no(AllocationStatus::NoValidShardCopy, node_results, true)
    }

    pub fn no_attempt() -> Self {
        Self::no(AllocationStatus::NoAttempt, Vec::new(), false)
    }

    pub fn is_decision_taken(&self) -> bool {
        self.taken
    }

    /// `None` on a taken decision means the shard was allocated.
    pub fn allocation_status(&self) -> Option<AllocationStatus> {
        self.allocation_status
    }

    pub fn target_node(&self) -> Option<&DiscoveryNode> {
        self.target_node.as_ref()
    }

    pub fn allocation_id(&self) -> Option<&str> {
        self.allocation_id.as_deref()
    }

    pub fn node_results(&self) -> &[NodeAllocationResult] {
        &self.node_results
    }

    pub fn reuse_store(&self) -> bool {
        self.reuse_store
    }

    pub fn is_delayed(&self) -> bool {
        self.allocation_status == Some(AllocationStatus::DelayedAllocation)
    }

    pub fn remaining_delay(&self) -> Duration {
        Duration::from_millis(self.remaining_delay_ms)
    }

    pub fn configured_delay(&self) -> Duration {
        Duration::from_millis(self.configured_delay_ms)
    }

    pub fn remaining_delay_ms(&self) -> u64 {
        self.remaining_delay_ms
    }

    pub fn configured_delay_ms(&self) -> u64 {
        self.configured_delay_ms
    }

    /// Summary verdict. The sentinel reports `NoAttempt`.
    pub fn allocation_decision(&self) -> AllocationDecision {
        if !self.taken {
            return AllocationDecision::NoAttempt;
        }
        AllocationDecision::from_allocation_status(self.allocation_status)
    }

    /// One-sentence reason for the summary verdict.
    pub fn explanation(&self) -> String {
        match self.allocation_decision() {
            AllocationDecision::Yes => {
                if self.reuse_store {
                    "can allocate the shard and reuse its existing on-disk copy".to_string()
                } else {
                    "can allocate the shard".to_string()
                }
            }
            AllocationDecision::Throttled => {
                "allocation is temporarily throttled on the nodes that can take the shard".to_string()
            }
            AllocationDecision::AwaitingInfo => {
                "cannot allocate yet: still collecting information about existing shard copies from the nodes"
                    .to_string()
            }
            AllocationDecision::NoValidShardCopy => {
                if self.node_results.is_empty() {
                    "cannot allocate: a previous copy of the primary existed but no node in the cluster holds it any more"
                        .to_string()
                } else {
                    "cannot allocate: every copy of the shard that was found is stale or corrupt".to_string()
                }
            }
            AllocationDecision::AllocationDelayed => {
                let mut text = format!(
                    "cannot allocate yet: waiting {}ms (of {}ms) for the departed node holding a replica to rejoin",
                    self.remaining_delay_ms, self.configured_delay_ms
                );
                if self
                    .node_results
                    .iter()
                    .any(|r| r.node_decision() == AllocationDecision::Yes)
                {
                    text.push_str(", although at least one other node would accept the shard");
                }
                text
            }
            AllocationDecision::No => {
                if self.reuse_store {
                    "cannot allocate: no node holding an in-sync copy of the shard permits allocation"
                        .to_string()
                } else {
                    "cannot allocate: no node permits allocation of the shard".to_string()
                }
            }
            AllocationDecision::NoAttempt => {
                "no allocation attempt has been made for the shard yet".to_string()
            }
            AllocationDecision::WorseBalance => {
                "cannot allocate without making the cluster balance worse".to_string()
            }
        }
    }
}

impl Default for AllocateUnassignedDecision {
    fn default() -> Self {
        Self::NOT_TAKEN
    }
}

impl Writeable for AllocateUnassignedDecision {
    fn write_to(&self, out: &mut StreamOutput) {
        out.write_bool(self.taken);
        if !self.taken {
            return;
        }
        out.write_optional_enum(self.allocation_status);
        out.write_optional(self.target_node.as_ref());
        out.write_optional_string(self.allocation_id.as_deref());
        out.write_list(&self.node_results);
        out.write_bool(self.reuse_store);
        out.write_vlong(self.remaining_delay_ms);
        out.write_vlong(self.configured_delay_ms);
    }
}

impl Readable for AllocateUnassignedDecision {
    fn read_from(input: &mut StreamInput<'_>) -> DecisionResult<Self> {
        if !input.read_bool()? {
            return Ok(Self::NOT_TAKEN);
        }
        // Node results are stored in explain order already; keep the
        // received order rather than re-sorting.
        Ok(Self {
            taken: true,
            allocation_status: input.read_optional_enum()?,
            target_node: input.read_optional()?,
            allocation_id: input.read_optional_string()?,
            node_results: input.read_list()?,
            reuse_store: input.read_bool()?,
            remaining_delay_ms: input.read_vlong()?,
            configured_delay_ms: input.read_vlong()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Decision;

    fn node(id: &str) -> DiscoveryNode {
        DiscoveryNode::new(id, format!("node-{id}"), "10.0.0.1:9300")
    }

    fn round_trip(d: &AllocateUnassignedDecision) -> AllocateUnassignedDecision {
        let mut out = StreamOutput::new();
        d.write_to(&mut out);
        let bytes = out.into_bytes();
        let mut input = StreamInput::new(&bytes);
        let back = AllocateUnassignedDecision::read_from(&mut input).unwrap();
        assert_eq!(input.remaining(), 0);
        back
    }

    #[test]
    fn sentinel_is_not_taken() {
        assert!(!AllocateUnassignedDecision::not_taken().is_decision_taken());
        assert!(!AllocateUnassignedDecision::default().is_decision_taken());
        assert_eq!(
            AllocateUnassignedDecision::NOT_TAKEN.allocation_decision(),
            AllocationDecision::NoAttempt
        );
    }

    #[test]
    fn no_decision_is_taken() {
        let d = AllocateUnassignedDecision::no(AllocationStatus::DecidersNo, Vec::new(), false);
        assert!(d.is_decision_taken());
        assert_eq!(d.allocation_decision(), AllocationDecision::No);
        assert_eq!(d.explanation(), "cannot allocate: no node permits allocation of the shard");
    }

    #[test]
    fn factories_sort_node_results() {
        let results = vec![
            NodeAllocationResult::new(node("b"), Decision::NO, 2),
            NodeAllocationResult::new(node("a"), Decision::NO, 2),
            NodeAllocationResult::new(node("c"), Decision::NO, 1),
        ];
        let d = AllocateUnassignedDecision::no(AllocationStatus::DecidersNo, results, false);
        let ids: Vec<&str> = d.node_results().iter().map(|r| r.node().id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn yes_records_target_and_reuse() {
        let d = AllocateUnassignedDecision::yes(node("n1"), Some("alloc-1".to_string()), Vec::new(), true);
        assert_eq!(d.allocation_status(), None);
        assert_eq!(d.target_node().map(|n| n.id.as_str()), Some("n1"));
        assert_eq!(d.allocation_id(), Some("alloc-1"));
        assert!(d.explanation().contains("reuse"));
        assert_eq!(round_trip(&d), d);
    }

    #[test]
    fn delayed_mentions_other_yes_nodes() {
        let d = AllocateUnassignedDecision::delayed(
            1_500,
            60_000,
            vec![NodeAllocationResult::new(node("n2"), Decision::ALWAYS, 1)],
        );
        assert!(d.is_delayed());
        assert_eq!(d.remaining_delay(), Duration::from_millis(1_500));
        assert_eq!(d.allocation_decision(), AllocationDecision::AllocationDelayed);
        assert!(d.explanation().contains("1500ms"));
        assert!(d.explanation().contains("at least one other node"));
        assert_eq!(round_trip(&d), d);
    }

    #[test]
    fn no_with_delayed_status_becomes_delayed() {
        let results = vec![NodeAllocationResult::new(node("n2"), Decision::ALWAYS, 1)];
        let d = AllocateUnassignedDecision::no(
            AllocationStatus::DelayedAllocation,
            results.clone(),
            true,
        );
        assert_eq!(d, AllocateUnassignedDecision::delayed(0, 0, results));
        assert!(d.is_delayed());
        assert!(!d.reuse_store());
        assert_eq!(d.remaining_delay_ms(), 0);
        assert_eq!(d.allocation_decision(), AllocationDecision::AllocationDelayed);
    }

    #[test]
    fn no_valid_copy_wording_depends_on_found_copies() {
        let none_found = AllocateUnassignedDecision::no_valid_shard_copy(Vec::new());
        assert!(none_found.explanation().contains("no node in the cluster holds it"));

        let stale = AllocateUnassignedDecision::no_valid_shard_copy(vec![
            NodeAllocationResult::with_node_decision(node("n1"), AllocationDecision::NoValidShardCopy, None, 0),
        ]);
        assert!(stale.explanation().contains("stale or corrupt"));
    }

    #[test]
    fn sentinel_writes_one_byte() {
        let mut out = StreamOutput::new();
        AllocateUnassignedDecision::NOT_TAKEN.write_to(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(round_trip(&AllocateUnassignedDecision::NOT_TAKEN), AllocateUnassignedDecision::NOT_TAKEN);
    }

    #[test]
    fn every_status_round_trips() {
        for status in AllocationStatus::ALL {
            let d = if status == AllocationStatus::DelayedAllocation {
                AllocateUnassignedDecision::delayed(10, 20, Vec::new())
            } else {
                AllocateUnassignedDecision::no(status, Vec::new(), false)
            };
            assert_eq!(round_trip(&d).allocation_status(), Some(status));
        }
    }
}
