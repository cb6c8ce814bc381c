//! Summary verdicts and unassigned-shard status codes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::WireEnum;
use crate::decision::DecisionType;

/// Reason an unassigned shard has not been placed. A shard that was
/// placed carries no status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Every candidate node was vetoed by at least one decider.
    DecidersNo,
    /// A primary existed before but no usable on-disk copy was found.
    NoValidShardCopy,
    /// Allocation is possible but deciders asked to wait.
    DecidersThrottled,
    /// Still collecting on-disk copy information from nodes.
    FetchingShardData,
    /// Waiting for a departed node to rejoin.
    DelayedAllocation,
    /// No allocation attempt has been made yet.
    NoAttempt,
}

impl AllocationStatus {
    pub const ALL: [AllocationStatus; 6] = [
        Self::DecidersNo,
        Self::NoValidShardCopy,
        Self::DecidersThrottled,
        Self::FetchingShardData,
        Self::DelayedAllocation,
        Self::NoAttempt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DecidersNo => "deciders_no",
            Self::NoValidShardCopy => "no_valid_shard_copy",
            Self::DecidersThrottled => "deciders_throttled",
            Self::FetchingShardData => "fetching_shard_data",
            Self::DelayedAllocation => "delayed_allocation",
            Self::NoAttempt => "no_attempt",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WireEnum for AllocationStatus {
    const KIND: &'static str = "allocation status";

    fn ordinal(self) -> u8 {
        self as u8
    }

    fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }
}

/// Summary verdict for one node or for the shard as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationDecision {
    Yes,
    Throttled,
    No,
    /// Allowed, but moving would not improve cluster balance.
    WorseBalance,
    AwaitingInfo,
    AllocationDelayed,
    NoValidShardCopy,
    NoAttempt,
}

impl AllocationDecision {
    pub const ALL: [AllocationDecision; 8] = [
        Self::Yes,
        Self::Throttled,
        Self::No,
        Self::WorseBalance,
        Self::AwaitingInfo,
        Self::AllocationDelayed,
        Self::NoValidShardCopy,
        Self::NoAttempt,
    ];

    pub fn from_decision_type(decision_type: DecisionType) -> Self {
        match decision_type {
            DecisionType::Yes => Self::Yes,
            DecisionType::Throttle => Self::Throttled,
            DecisionType::No => Self::No,
        }
    }

    /// `None` means the shard was allocated.
    pub fn from_allocation_status(status: Option<AllocationStatus>) -> Self {
        match status {
            None => Self::Yes,
            Some(AllocationStatus::DecidersNo) => Self::No,
            Some(AllocationStatus::NoValidShardCopy) => Self::NoValidShardCopy,
            Some(AllocationStatus::DecidersThrottled) => Self::Throttled,
            Some(AllocationStatus::FetchingShardData) => Self::AwaitingInfo,
            Some(AllocationStatus::DelayedAllocation) => Self::AllocationDelayed,
            Some(AllocationStatus::NoAttempt) => Self::NoAttempt,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::Throttled => "throttled",
            Self::No => "no",
            Self::WorseBalance => "worse_balance",
            Self::AwaitingInfo => "awaiting_info",
            Self::AllocationDelayed => "allocation_delayed",
            Self::NoValidShardCopy => "no_valid_shard_copy",
            Self::NoAttempt => "no_attempt",
        }
    }
}

impl fmt::Display for AllocationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WireEnum for AllocationDecision {
    const KIND: &'static str = "allocation decision";

    fn ordinal(self) -> u8 {
        self as u8
    }

    fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }
}
