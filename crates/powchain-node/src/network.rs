use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::broadcast::{NodeId, Traffic};
use crate::error::{GossipError, Result};
use crate::node::Node;
use crate::runtime::NodeHandle;

/// A set of node actors in one process, wired through [`ChannelSink`]s.
///
/// [`ChannelSink`]: crate::broadcast::ChannelSink
#[derive(Default)]
pub struct LocalNetwork {
    handles: Vec<NodeHandle>,
    tasks: Vec<JoinHandle<Node>>,
    traffic: Traffic,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, node: Node) -> NodeHandle {
        let id = NodeId(self.handles.len() as u64);
        let (handle, task) = NodeHandle::spawn(id, node);
        debug!("spawned {} as {}", handle.name(), id);
        self.handles.push(handle.clone());
        self.tasks.push(task);
        handle
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeHandle> {
        self.handles.get(id.0 as usize)
    }

    pub fn nodes(&self) -> &[NodeHandle] {
        &self.handles
    }

    pub fn traffic(&self) -> &Traffic {
        &self.traffic
    }

    /// Makes `from` relay everything it broadcasts to `to`.
    pub fn connect(&self, from: NodeId, to: NodeId) -> Result<()> {
        let source = self.node(from).ok_or(GossipError::PeerUnreachable(from))?;
        let target = self.node(to).ok_or(GossipError::PeerUnreachable(to))?;
        source.connect(Box::new(target.sink(self.traffic.clone())))
    }

    pub fn connect_pair(&self, a: NodeId, b: NodeId) -> Result<()> {
        self.connect(a, b)?;
        self.connect(b, a)
    }

    /// Connects every node to every other node.
    pub fn full_mesh(&self) -> Result<()> {
        for from in &self.handles {
            for to in &self.handles {
                if from.id() != to.id() {
                    self.connect(from.id(), to.id())?;
                }
            }
        }
        Ok(())
    }

    /// Waits until every relayed envelope has been handled.
    pub async fn settle(&self) {
        self.traffic.settle().await;
    }

    /// Stops every actor and returns the nodes in spawn order.
    pub async fn shutdown(self) -> Vec<Node> {
        for handle in &self.handles {
            if let Err(e) = handle.shutdown() {
                warn!("{e}");
            }
        }
        let mut nodes = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            match task.await {
                Ok(node) => nodes.push(node),
                Err(e) => warn!("node task failed: {e}"),
            }
        }
        nodes
    }
}
