//! Gossip layer and node orchestration for powchain.
//!
//! [`Node`] is the single-threaded protocol state machine; [`NodeHandle`]
//! runs one as an actor with its own mailbox, and [`LocalNetwork`] wires a
//! group of actors together in-process.

pub mod broadcast;
pub mod config;
pub mod envelope;
pub mod error;
pub mod network;
pub mod node;
pub mod runtime;

pub use broadcast::{BroadcastSink, ChannelSink, NodeId, Traffic};
pub use config::NodeConfig;
pub use envelope::{Envelope, Payload};
pub use error::{GossipError, Result};
pub use network::LocalNetwork;
pub use node::{MiningJob, Node, NodeStatus, Receipt};
pub use runtime::NodeHandle;
