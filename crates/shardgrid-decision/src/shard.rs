//! Top-level explain record for one shard copy.

use crate::allocate::AllocateUnassignedDecision;
use crate::codec::{Readable, StreamInput, StreamOutput, Writeable};
use crate::error::{DecisionError, DecisionResult};
use crate::moves::MoveDecision;

/// The explain answer for one shard copy. An unassigned copy carries an
/// allocate decision; an assigned copy carries a move decision. The two
/// never coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardAllocationDecision {
    Unassigned(AllocateUnassignedDecision),
    Assigned(MoveDecision),
}

impl ShardAllocationDecision {
    /// Build from one taken decision and one sentinel.
    ///
    /// # Panics
    ///
    /// If both or neither decision is taken. That is a bug in whatever
    /// produced the decisions.
    pub fn new(allocate: AllocateUnassignedDecision, move_decision: MoveDecision) -> Self {
        assert!(
            allocate.is_decision_taken() != move_decision.is_decision_taken(),
            "exactly one of the allocate and move decisions must be taken"
        );
        if allocate.is_decision_taken() {
            Self::Unassigned(allocate)
        } else {
            Self::Assigned(move_decision)
        }
    }

    /// Like [`Self::new`], but reports the violation instead of panicking.
    pub fn try_new(
        allocate: AllocateUnassignedDecision,
        move_decision: MoveDecision,
    ) -> DecisionResult<Self> {
        match (allocate.is_decision_taken(), move_decision.is_decision_taken()) {
            (true, false) => Ok(Self::Unassigned(allocate)),
            (false, true) => Ok(Self::Assigned(move_decision)),
            (true, true) => Err(DecisionError::InvalidState(
                "both allocate and move decisions are taken".to_string(),
            )),
            (false, false) => Err(DecisionError::InvalidState(
                "neither allocate nor move decision is taken".to_string(),
            )),
        }
    }

    /// # Panics
    ///
    /// If `allocate` is the sentinel.
    pub fn unassigned(allocate: AllocateUnassignedDecision) -> Self {
        Self::new(allocate, MoveDecision::NOT_TAKEN)
    }

    /// # Panics
    ///
    /// If `move_decision` is the sentinel.
    pub fn assigned(move_decision: MoveDecision) -> Self {
        Self::new(AllocateUnassignedDecision::NOT_TAKEN, move_decision)
    }

    /// The allocate decision, or the not-taken sentinel for assigned shards.
    pub fn allocate_decision(&self) -> &AllocateUnassignedDecision {
        match self {
            Self::Unassigned(d) => d,
            Self::Assigned(_) => AllocateUnassignedDecision::not_taken(),
        }
    }

    /// The move decision, or the not-taken sentinel for unassigned shards.
    pub fn move_decision(&self) -> &MoveDecision {
        match self {
            Self::Unassigned(_) => MoveDecision::not_taken(),
            Self::Assigned(d) => d,
        }
    }
}

impl Writeable for ShardAllocationDecision {
    fn write_to(&self, out: &mut StreamOutput) {
        self.allocate_decision().write_to(out);
        self.move_decision().write_to(out);
    }
}

impl Readable for ShardAllocationDecision {
    fn read_from(input: &mut StreamInput<'_>) -> DecisionResult<Self> {
        let allocate = AllocateUnassignedDecision::read_from(input)?;
        let move_decision = MoveDecision::read_from(input)?;
        Self::try_new(allocate, move_decision)
    }
}
