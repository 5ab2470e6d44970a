use powchain_core::LedgerError;
use thiserror::Error;

use crate::broadcast::NodeId;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("unknown broadcast type: {0:?}")]
    UnknownBroadcastType(String),

    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("peer {0} is unreachable")]
    PeerUnreachable(NodeId),

    #[error("node {0} has stopped")]
    NodeStopped(String),
}

pub type Result<T> = std::result::Result<T, GossipError>;
