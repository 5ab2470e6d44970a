use crate::block::Block;
use crate::hash::pretty_hash;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared flag that stops a running search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// True if both tokens control the same search.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MineOutcome {
    Found(String),
    Exhausted,
    Cancelled,
}

impl MineOutcome {
    pub fn solution(&self) -> Option<&str> {
        match self {
            MineOutcome::Found(nonce) => Some(nonce.as_str()),
            _ => None,
        }
    }
}

pub struct Miner;

impl Miner {
    /// Smallest nonce in `[start, end)` that solves `block`, if any.
    pub fn search(block: &Block, start: u64, end: u64) -> Option<String> {
        match Self::search_cancellable(block, start, end, &CancelToken::new()) {
            MineOutcome::Found(nonce) => Some(nonce),
            _ => None,
        }
    }

    /// Searches `[start, end)` in parallel. Rayon splits the range across
    /// threads but `find_first` still yields the smallest satisfying nonce.
    /// Once `cancel` fires every worker stops at its next candidate.
    pub fn search_cancellable(
        block: &Block,
        start: u64,
        end: u64,
        cancel: &CancelToken,
    ) -> MineOutcome {
        if cancel.is_cancelled() {
            return MineOutcome::Cancelled;
        }
        if start >= end {
            return MineOutcome::Exhausted;
        }
        debug!(
            "mining block {} over [{}, {}) at target {}",
            pretty_hash(block.hash()),
            start,
            end,
            block.target()
        );

        let found = (start..end)
            .into_par_iter()
            .find_first(|x| cancel.is_cancelled() || block.verify(Some(&x.to_string())));

        // The flag only ever goes up, so if it is still down every candidate
        // above was judged on proof-of-work alone.
        if cancel.is_cancelled() {
            debug!("mining block {} cancelled", pretty_hash(block.hash()));
            return MineOutcome::Cancelled;
        }

        match found {
            Some(nonce) => {
                info!(
                    "found nonce {} for block {} at target {}",
                    nonce,
                    pretty_hash(block.hash()),
                    block.target()
                );
                MineOutcome::Found(nonce.to_string())
            }
            None => MineOutcome::Exhausted,
        }
    }
}
