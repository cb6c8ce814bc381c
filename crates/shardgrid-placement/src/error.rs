use shardgrid_core::ShardId;

/// Errors raised while explaining an allocation.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("shard {shard_id} (primary: {primary}) is not in the snapshot")]
    UnknownShard { shard_id: ShardId, primary: bool },

    #[error("shard {shard} is assigned to unknown node '{node_id}'")]
    UnknownNode { shard: String, node_id: String },
}

pub type PlacementResult<T> = Result<T, PlacementError>;
