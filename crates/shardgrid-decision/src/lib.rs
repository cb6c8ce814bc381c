//! shardgrid-decision — the shard allocation explain model.
//!
//! Answers "why is this shard copy where it is?" as an immutable record:
//! per-decider verdicts, per-node results, and one top-level decision
//! that is either an allocate decision (the copy is unassigned) or a move
//! decision (the copy is on a node).
//!
//! # Components
//!
//! - **`decision`** — YES/NO/THROTTLE verdicts and their composition
//! - **`allocation`** — summary verdicts and unassigned status codes
//! - **`node_result`** — per-node outcome with weight ranking
//! - **`allocate`** / **`moves`** — the two branch records
//! - **`shard`** — the top-level record
//! - **`codec`** — binary wire format
//! - **`render`** — JSON and text output

pub mod allocate;
pub mod allocation;
pub mod codec;
pub mod decision;
pub mod error;
pub mod moves;
pub mod node_result;
pub mod render;
pub mod shard;

pub use allocate::AllocateUnassignedDecision;
pub use allocation::{AllocationDecision, AllocationStatus};
pub use codec::{
    MAX_NESTING_DEPTH, Readable, StreamInput, StreamOutput, Writeable, decode_frame, encode_frame,
};
pub use decision::{Decision, DecisionType, Multi, Single};
pub use error::{DecisionError, DecisionResult};
pub use moves::MoveDecision;
pub use node_result::{NodeAllocationResult, sort_node_results};
pub use render::{RenderOptions, render_text};
pub use shard::ShardAllocationDecision;
