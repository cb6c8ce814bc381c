//! Structured (JSON) and plain-text rendering of explain records.
//!
//! Only the active branch of a [`ShardAllocationDecision`] is rendered:
//! the JSON object has exactly one of `allocate_decision` or
//! `move_decision`.

use std::fmt::Write as _;

use serde_json::{Map, Value, json};
use shardgrid_core::DiscoveryNode;

use crate::allocate::AllocateUnassignedDecision;
use crate::decision::{Decision, DecisionType, Single};
use crate::moves::MoveDecision;
use crate::node_result::NodeAllocationResult;
use crate::shard::ShardAllocationDecision;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Also list deciders that said YES.
    pub include_yes_decisions: bool,
}

fn visible_leaves<'a>(decision: &'a Decision, opts: &RenderOptions) -> Vec<&'a Single> {
    decision
        .leaves()
        .into_iter()
        .filter(|s| opts.include_yes_decisions || s.decision_type() != DecisionType::Yes)
        .collect()
}

fn node_json(node: &DiscoveryNode) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("node_id".into(), json!(node.id));
    obj.insert("node_name".into(), json!(node.name));
    obj.insert("transport_address".into(), json!(node.address));
    if !node.attributes.is_empty() {
        obj.insert("node_attributes".into(), json!(node.attributes));
    }
    obj
}

/// Decider entries of a decision, or `None` when nothing is visible.
pub fn deciders_json(decision: &Decision, opts: &RenderOptions) -> Option<Value> {
    let leaves = visible_leaves(decision, opts);
    if leaves.is_empty() {
        return None;
    }
    let entries: Vec<Value> = leaves
        .iter()
        .map(|s| {
            json!({
                "decider": s.label(),
                "decision": s.decision_type().as_str(),
                "explanation": s.explanation(),
            })
        })
        .collect();
    Some(Value::Array(entries))
}

impl NodeAllocationResult {
    pub fn to_json(&self, opts: &RenderOptions) -> Value {
        let mut obj = node_json(self.node());
        obj.insert("node_decision".into(), json!(self.node_decision().as_str()));
        obj.insert("weight_ranking".into(), json!(self.weight_ranking()));
        if let Some(deciders) = self.can_allocate().and_then(|d| deciders_json(d, opts)) {
            obj.insert("deciders".into(), deciders);
        }
        Value::Object(obj)
    }
}

fn node_results_json(results: &[NodeAllocationResult], opts: &RenderOptions) -> Value {
    Value::Array(results.iter().map(|r| r.to_json(opts)).collect())
}

impl AllocateUnassignedDecision {
    /// JSON body of the decision; empty for the sentinel.
    pub fn to_json(&self, opts: &RenderOptions) -> Value {
        let mut obj = Map::new();
        if !self.is_decision_taken() {
            return Value::Object(obj);
        }
        obj.insert("can_allocate".into(), json!(self.allocation_decision().as_str()));
        obj.insert("allocate_explanation".into(), json!(self.explanation()));
        if let Some(status) = self.allocation_status() {
            obj.insert("allocation_status".into(), json!(status.as_str()));
        }
        if let Some(node) = self.target_node() {
            obj.insert("target_node".into(), Value::Object(node_json(node)));
        }
        if let Some(id) = self.allocation_id() {
            obj.insert("allocation_id".into(), json!(id));
        }
        if self.is_delayed() {
            obj.insert("configured_delay_in_millis".into(), json!(self.configured_delay_ms()));
            obj.insert("remaining_delay_in_millis".into(), json!(self.remaining_delay_ms()));
        }
        obj.insert("reuse_store".into(), json!(self.reuse_store()));
        if !self.node_results().is_empty() {
            obj.insert(
                "node_allocation_decisions".into(),
                node_results_json(self.node_results(), opts),
            );
        }
        Value::Object(obj)
    }
}

impl MoveDecision {
    /// JSON body of the decision; empty for the sentinel.
    pub fn to_json(&self, opts: &RenderOptions) -> Value {
        let mut obj = Map::new();
        if !self.is_decision_taken() {
            return Value::Object(obj);
        }
        let can_remain = self.can_remain();
        if let Some(remain) = self.can_remain_decision() {
            obj.insert(
                "can_remain_on_current_node".into(),
                json!(if can_remain { "yes" } else { "no" }),
            );
            if !can_remain {
                if let Some(deciders) = deciders_json(remain, opts) {
                    obj.insert("can_remain_decisions".into(), deciders);
                }
            }
        }
        if !can_remain {
            obj.insert("can_move_to_other_node".into(), json!(self.move_decision().as_str()));
            obj.insert("move_explanation".into(), json!(self.explanation()));
        } else if let Some(rebalance) = self.cluster_rebalance_decision() {
            let allowed = self.can_rebalance_cluster();
            obj.insert(
                "can_rebalance_cluster".into(),
                json!(if allowed { "yes" } else { "no" }),
            );
            if !allowed {
                if let Some(deciders) = deciders_json(rebalance, opts) {
                    obj.insert("can_rebalance_cluster_decisions".into(), deciders);
                }
            }
            obj.insert(
                "can_rebalance_to_other_node".into(),
                json!(self.move_decision().as_str()),
            );
            obj.insert("rebalance_explanation".into(), json!(self.explanation()));
            obj.insert("current_node_ranking".into(), json!(self.current_node_ranking()));
        } else {
            obj.insert("move_explanation".into(), json!(self.explanation()));
        }
        if let Some(node) = self.target_node() {
            obj.insert("target_node".into(), Value::Object(node_json(node)));
        }
        if !self.node_results().is_empty() {
            obj.insert(
                "node_allocation_decisions".into(),
                node_results_json(self.node_results(), opts),
            );
        }
        Value::Object(obj)
    }
}

impl ShardAllocationDecision {
    pub fn to_json(&self, opts: &RenderOptions) -> Value {
        match self {
            Self::Unassigned(d) => json!({ "allocate_decision": d.to_json(opts) }),
            Self::Assigned(d) => json!({ "move_decision": d.to_json(opts) }),
        }
    }
}

// ── Text ──────────────────────────────────────────────────────────

fn write_deciders(out: &mut String, indent: &str, decision: &Decision, opts: &RenderOptions) {
    for leaf in visible_leaves(decision, opts) {
        let _ = writeln!(
            out,
            "{indent}- [{}] {}: {}",
            leaf.decision_type(),
            leaf.label().unwrap_or("-"),
            leaf.explanation().unwrap_or(""),
        );
    }
}

fn write_node_results(out: &mut String, results: &[NodeAllocationResult], opts: &RenderOptions) {
    if results.is_empty() {
        return;
    }
    out.push_str("Nodes:\n");
    for r in results {
        let node = r.node();
        let _ = writeln!(
            out,
            "  #{:<3} {} ({}, {}): {}",
            r.weight_ranking(),
            node.name,
            node.id,
            node.address,
            r.node_decision(),
        );
        if let Some(d) = r.can_allocate() {
            write_deciders(out, "        ", d, opts);
        }
    }
}

/// Multi-line human-readable rendering.
pub fn render_text(decision: &ShardAllocationDecision, opts: &RenderOptions) -> String {
    let mut out = String::new();
    match decision {
        ShardAllocationDecision::Unassigned(d) => {
            out.push_str("Allocate decision\n");
            let _ = writeln!(out, "  Can allocate: {}", d.allocation_decision());
            let _ = writeln!(out, "  Explanation:  {}", d.explanation());
            if let Some(status) = d.allocation_status() {
                let _ = writeln!(out, "  Status:       {status}");
            }
            if let Some(node) = d.target_node() {
                let _ = writeln!(out, "  Target node:  {} ({})", node.name, node.id);
            }
            if let Some(id) = d.allocation_id() {
                let _ = writeln!(out, "  Reused copy:  {id}");
            }
            write_node_results(&mut out, d.node_results(), opts);
        }
        ShardAllocationDecision::Assigned(d) => {
            out.push_str("Move decision\n");
            let _ = writeln!(
                out,
                "  Can remain:   {}",
                if d.can_remain() { "yes" } else { "no" }
            );
            if let Some(remain) = d.can_remain_decision().filter(|_| !d.can_remain()) {
                write_deciders(&mut out, "    ", remain, opts);
            }
            if d.cluster_rebalance_decision().is_some() {
                let _ = writeln!(
                    out,
                    "  Rebalance:    {}",
                    if d.can_rebalance_cluster() { "allowed" } else { "not allowed" }
                );
            }
            let _ = writeln!(out, "  Move:         {}", d.move_decision());
            let _ = writeln!(out, "  Explanation:  {}", d.explanation());
            if let Some(node) = d.target_node() {
                let _ = writeln!(out, "  Target node:  {} ({})", node.name, node.id);
            }
            write_node_results(&mut out, d.node_results(), opts);
        }
    }
    out
}
