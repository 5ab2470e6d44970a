//! Fan-out side of gossip. A node never holds a handle into another node;
//! it only knows sinks that accept serialized envelopes for a peer id.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{GossipError, Result};
use crate::runtime::Message;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Somewhere envelopes for one peer can be dropped off. Delivery is fire and
/// forget: `Ok` means accepted for delivery, not processed.
pub trait BroadcastSink: Send + Sync {
    fn peer(&self) -> NodeId;
    fn broadcast(&self, data: &str) -> Result<()>;
}

/// Counts envelopes that are queued or being handled anywhere on a network.
#[derive(Clone, Debug, Default)]
pub struct Traffic(Arc<AtomicUsize>);

impl Traffic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> Ticket {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ticket(Arc::clone(&self.0))
    }

    pub fn in_flight(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Waits until no envelope is queued or in a handler.
    pub async fn settle(&self) {
        while !self.is_idle() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

/// Held by an envelope until its receiver is done with it. Relays take their
/// own tickets before this one drops, so the count never dips early.
#[derive(Debug)]
pub struct Ticket(Arc<AtomicUsize>);

impl Drop for Ticket {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process sink that enqueues onto a peer actor's mailbox.
pub struct ChannelSink {
    peer: NodeId,
    mailbox: mpsc::UnboundedSender<Message>,
    traffic: Traffic,
}

impl ChannelSink {
    pub(crate) fn new(peer: NodeId, mailbox: mpsc::UnboundedSender<Message>, traffic: Traffic) -> Self {
        Self {
            peer,
            mailbox,
            traffic,
        }
    }
}

impl BroadcastSink for ChannelSink {
    fn peer(&self) -> NodeId {
        self.peer
    }

    fn broadcast(&self, data: &str) -> Result<()> {
        let message = Message::Deliver {
            data: data.to_string(),
            ticket: Some(self.traffic.ticket()),
            reply: None,
        };
        self.mailbox.send(message).map_err(|_| {
            warn!("dropping envelope for {}: mailbox closed", self.peer);
            GossipError::PeerUnreachable(self.peer)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_track_in_flight() {
        let traffic = Traffic::new();
        let a = traffic.ticket();
        let b = traffic.ticket();
        assert_eq!(traffic.in_flight(), 2);
        drop(a);
        assert!(!traffic.is_idle());
        drop(b);
        assert!(traffic.is_idle());
    }

    #[test]
    fn closed_mailbox_reports_unreachable_and_releases_ticket() {
        let traffic = Traffic::new();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = ChannelSink::new(NodeId(3), tx, traffic.clone());
        assert!(matches!(
            sink.broadcast("{}"),
            Err(GossipError::PeerUnreachable(NodeId(3)))
        ));
        assert!(traffic.is_idle());
    }

    #[test]
    fn open_mailbox_receives_envelope() {
        let traffic = Traffic::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(NodeId(1), tx, traffic.clone());
        sink.broadcast("hello").unwrap();
        assert_eq!(traffic.in_flight(), 1);
        match rx.try_recv().unwrap() {
            Message::Deliver { data, .. } => assert_eq!(data, "hello"),
            _ => panic!("expected a delivery"),
        }
        assert!(traffic.is_idle());
    }
}
