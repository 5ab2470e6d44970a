//! Runs a [`Node`] as an actor. Every inbound envelope and every command goes
//! through one mailbox, so the node's state is only touched by its own task.
//! Mining runs on the blocking pool and reports back through the same mailbox.

use powchain_core::{Amount, MineOutcome, Transaction};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastSink, ChannelSink, NodeId, Ticket, Traffic};
use crate::error::{GossipError, Result};
use crate::node::{MiningJob, Node, NodeStatus, Receipt};

pub(crate) enum Message {
    Deliver {
        data: String,
        ticket: Option<Ticket>,
        reply: Option<oneshot::Sender<Result<Receipt>>>,
    },
    Connect(Box<dyn BroadcastSink>),
    Submit {
        tx: Transaction,
        reply: oneshot::Sender<Result<usize>>,
    },
    Mine {
        reply: oneshot::Sender<MineOutcome>,
    },
    MiningDone {
        job: MiningJob,
        outcome: MineOutcome,
    },
    TotalValue {
        addresses: Option<Vec<String>>,
        reply: oneshot::Sender<Amount>,
    },
    Status {
        reply: oneshot::Sender<NodeStatus>,
    },
    Shutdown,
}

/// Cheap, cloneable address of a running node.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    id: NodeId,
    name: String,
    mailbox: mpsc::UnboundedSender<Message>,
}

impl NodeHandle {
    /// Starts `node` on the current tokio runtime. The join handle yields the
    /// node back after [`NodeHandle::shutdown`].
    pub fn spawn(id: NodeId, node: Node) -> (Self, JoinHandle<Node>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id,
            name: node.name().to_string(),
            mailbox: tx.clone(),
        };
        let task = tokio::spawn(run(node, rx, tx.downgrade()));
        (handle, task)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A sink that delivers into this node's mailbox.
    pub fn sink(&self, traffic: Traffic) -> ChannelSink {
        ChannelSink::new(self.id, self.mailbox.clone(), traffic)
    }

    fn send(&self, message: Message) -> Result<()> {
        self.mailbox
            .send(message)
            .map_err(|_| GossipError::NodeStopped(self.name.clone()))
    }

    async fn ask<T>(&self, message: impl FnOnce(oneshot::Sender<T>) -> Message) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(message(tx))?;
        rx.await
            .map_err(|_| GossipError::NodeStopped(self.name.clone()))
    }

    /// Hands `data` to the receive path and waits for its verdict.
    pub async fn deliver(&self, data: impl Into<String>) -> Result<Receipt> {
        let data = data.into();
        self.ask(|reply| Message::Deliver {
            data,
            ticket: None,
            reply: Some(reply),
        })
        .await?
    }

    pub fn connect(&self, peer: Box<dyn BroadcastSink>) -> Result<()> {
        self.send(Message::Connect(peer))
    }

    /// Signs and floods `tx`; returns how many peers accepted it.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<usize> {
        self.ask(|reply| Message::Submit { tx, reply }).await?
    }

    /// Mines the pending pool. Concurrent calls share one attempt.
    pub async fn mine(&self) -> Result<MineOutcome> {
        self.ask(|reply| Message::Mine { reply }).await
    }

    pub async fn total_value(&self) -> Result<Amount> {
        self.ask(|reply| Message::TotalValue {
            addresses: None,
            reply,
        })
        .await
    }

    pub async fn total_value_for(&self, addresses: Vec<String>) -> Result<Amount> {
        self.ask(|reply| Message::TotalValue {
            addresses: Some(addresses),
            reply,
        })
        .await
    }

    pub async fn status(&self) -> Result<NodeStatus> {
        self.ask(|reply| Message::Status { reply }).await
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Message::Shutdown)
    }
}

async fn run(
    mut node: Node,
    mut inbox: mpsc::UnboundedReceiver<Message>,
    me: mpsc::WeakUnboundedSender<Message>,
) -> Node {
    let mut waiting: Vec<oneshot::Sender<MineOutcome>> = Vec::new();
    let mut mining = false;
    debug!("{} started", node.name());

    while let Some(message) = inbox.recv().await {
        match message {
            Message::Deliver {
                data,
                ticket,
                reply,
            } => {
                let received = node.receive_broadcast(&data);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(received);
                    }
                    None => {
                        if let Err(e) = received {
                            warn!("{} dropped envelope: {}", node.name(), e);
                        }
                    }
                }
                drop(ticket);
            }
            Message::Connect(peer) => node.connect(peer),
            Message::Submit { tx, reply } => {
                let sent = node
                    .broadcast_transaction(tx)
                    .map(|results| results.iter().filter(|r| r.is_ok()).count());
                let _ = reply.send(sent);
            }
            Message::Mine { reply } => {
                waiting.push(reply);
                if mining {
                    continue;
                }
                let Some(me) = me.upgrade() else {
                    break;
                };
                mining = true;
                let job = node.start_mining();
                tokio::task::spawn_blocking(move || {
                    let outcome = job.run();
                    let _ = me.send(Message::MiningDone { job, outcome });
                });
            }
            Message::MiningDone { job, outcome } => {
                mining = false;
                let outcome = node.finish_mining(job, outcome);
                for reply in waiting.drain(..) {
                    let _ = reply.send(outcome.clone());
                }
            }
            Message::TotalValue { addresses, reply } => {
                let value = match addresses {
                    Some(addresses) => node.total_value_for(&addresses),
                    None => node.total_value(),
                };
                let _ = reply.send(value);
            }
            Message::Status { reply } => {
                let _ = reply.send(node.status());
            }
            Message::Shutdown => break,
        }
    }

    node.cancel_mining();
    info!("{} stopped", node.name());
    node
}
