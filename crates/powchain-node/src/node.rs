use std::sync::Arc;

use powchain_core::hash::{pretty_hash, random_hash};
use powchain_core::{
    Amount, Block, BlockDoc, CancelToken, KeyPair, MineOutcome, Miner, PublicKey, Transaction,
    TransactionDoc,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::broadcast::BroadcastSink;
use crate::config::NodeConfig;
use crate::envelope::{Envelope, Payload};
use crate::error::Result;

/// What a node did with an inbound envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Receipt {
    TransactionAdded(String),
    TransactionSeen(String),
    SolutionAccepted(String),
    SolutionSeen(String),
    SolutionRejected(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub name: String,
    pub addresses: Vec<String>,
    pub tip: String,
    pub height: usize,
    pub pending: usize,
    pub peers: usize,
    pub mining: bool,
}

/// A snapshot of the pending pool taken for one mining attempt.
pub struct MiningJob {
    draft: Block,
    mined_on: String,
    cancel: CancelToken,
    start: u64,
    end: u64,
}

impl MiningJob {
    pub fn draft(&self) -> &Block {
        &self.draft
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Blocks the calling thread until the range is searched or the job is cancelled.
    pub fn run(&self) -> MineOutcome {
        Miner::search_cancellable(&self.draft, self.start, self.end, &self.cancel)
    }
}

/// One participant's view of the ledger.
///
/// `pending` is both the mempool and the block under construction: gossiped
/// transactions land in it and the next mining attempt seals exactly its
/// contents. All methods take `&mut self`, so whoever owns the node
/// serializes receive, mine and broadcast.
pub struct Node {
    config: NodeConfig,
    keys: KeyPair,
    addresses: Vec<String>,
    chain_tip: Arc<Block>,
    pending: Block,
    peers: Vec<Box<dyn BroadcastSink>>,
    mining: Option<CancelToken>,
}

impl Node {
    /// A node on a fresh genesis block with one generated address.
    pub fn new(config: NodeConfig) -> Self {
        Self::with_chain(config, Arc::new(Block::genesis()))
    }

    pub fn with_chain(config: NodeConfig, chain_tip: Arc<Block>) -> Self {
        let pending = Block::new().with_target(config.target);
        Self {
            config,
            keys: KeyPair::generate(),
            addresses: vec![random_hash()],
            chain_tip,
            pending,
            peers: Vec::new(),
            mining: None,
        }
    }

    /// Replaces the generated address. An empty list keeps the current one.
    pub fn with_addresses(mut self, addresses: Vec<String>) -> Self {
        if !addresses.is_empty() {
            self.addresses = addresses;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    pub fn chain_tip(&self) -> &Arc<Block> {
        &self.chain_tip
    }

    pub fn pending(&self) -> &Block {
        &self.pending
    }

    pub fn is_mining(&self) -> bool {
        self.mining.is_some()
    }

    pub fn connect(&mut self, peer: Box<dyn BroadcastSink>) {
        debug!("{} now relays to {}", self.name(), peer.peer());
        self.peers.push(peer);
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            name: self.config.name.clone(),
            addresses: self.addresses.clone(),
            tip: self.chain_tip.hash().to_string(),
            height: self.chain_tip.height(),
            pending: self.pending.len(),
            peers: self.peers.len(),
            mining: self.is_mining(),
        }
    }

    /// Balance of this node's own addresses as seen from its chain tip.
    pub fn total_value(&self) -> Amount {
        self.total_value_for(&self.addresses)
    }

    pub fn total_value_for(&self, addresses: &[String]) -> Amount {
        addresses
            .iter()
            .map(|a| self.chain_tip.value_for_address(a))
            .sum()
    }

    /// Sends `data` to every peer. Failures are logged and reported, never retried.
    pub fn broadcast(&self, data: &str) -> Vec<Result<()>> {
        self.peers
            .iter()
            .map(|peer| {
                let sent = peer.broadcast(data);
                if let Err(e) = &sent {
                    warn!("{} could not reach {}: {}", self.name(), peer.peer(), e);
                }
                sent
            })
            .collect()
    }

    /// Signs `tx` and floods it. The node itself picks it up when a peer relays it back.
    pub fn broadcast_transaction(&self, mut tx: Transaction) -> Result<Vec<Result<()>>> {
        tx.sign(&self.keys);
        debug!("{} broadcasting transaction {}", self.name(), pretty_hash(&tx.hash));
        let data = Envelope::transaction(&tx)?.to_json()?;
        Ok(self.broadcast(&data))
    }

    /// Handles one inbound envelope. Only a malformed or unknown envelope is
    /// an error; duplicates and bad solutions are reported in the receipt.
    pub fn receive_broadcast(&mut self, data: &str) -> Result<Receipt> {
        match Envelope::from_json(data)?.into_payload()? {
            Payload::Transaction(doc) => self.receive_transaction(doc, data),
            Payload::Solution(doc) => self.receive_solution(doc, data),
        }
    }

    fn receive_transaction(&mut self, doc: TransactionDoc, data: &str) -> Result<Receipt> {
        let tx = Transaction::from_wire(doc)?;
        debug!("{} received transaction {}", self.name(), pretty_hash(&tx.hash));

        if self.pending.has_transaction(&tx.hash) || self.chain_tip.transaction_in_past(&tx.hash) {
            return Ok(Receipt::TransactionSeen(tx.hash));
        }

        let hash = tx.hash.clone();
        self.pending.add_transaction(Arc::new(tx));
        debug!("{} relaying transaction {}", self.name(), pretty_hash(&hash));
        self.broadcast(data);
        Ok(Receipt::TransactionAdded(hash))
    }

    fn receive_solution(&mut self, doc: BlockDoc, data: &str) -> Result<Receipt> {
        let block = Block::from_wire(doc, self.pending.transactions())?.with_target(self.config.target);
        let hash = block.hash().to_string();
        debug!("{} received solution for block {}", self.name(), pretty_hash(&hash));

        if self.chain_tip.block_in_past(&hash) {
            return Ok(Receipt::SolutionSeen(hash));
        }
        if !block.verify(None) {
            warn!(
                "{} rejected block {}: solution {:?} misses target {}",
                self.name(),
                pretty_hash(&hash),
                block.solution(),
                block.target()
            );
            return Ok(Receipt::SolutionRejected(hash));
        }

        self.extend_chain(block);
        info!(
            "{} accepted block {} at height {}",
            self.name(),
            pretty_hash(&hash),
            self.chain_tip.height()
        );
        self.broadcast(data);
        Ok(Receipt::SolutionAccepted(hash))
    }

    /// Links a solved block onto the tip, drops what it confirmed from the
    /// pending pool and stops any mining on the now stale tip.
    fn extend_chain(&mut self, block: Block) {
        self.chain_tip = self.chain_tip.add_next(block);
        let pruned = self.pending.remove_confirmed(&self.chain_tip);
        if pruned > 0 {
            debug!("{} pruned {} confirmed transaction(s)", self.name(), pruned);
        }
        if let Some(cancel) = self.mining.take() {
            debug!("{} abandoning stale mining attempt", self.name());
            cancel.cancel();
        }
    }

    /// Snapshots the pending pool for mining over the configured range.
    pub fn start_mining(&mut self) -> MiningJob {
        if let Some(previous) = self.mining.take() {
            previous.cancel();
        }
        let cancel = CancelToken::new();
        self.mining = Some(cancel.clone());
        MiningJob {
            draft: self.pending.clone(),
            mined_on: self.chain_tip.hash().to_string(),
            cancel,
            start: self.config.mine_start,
            end: self.config.mine_end,
        }
    }

    pub fn cancel_mining(&mut self) {
        if let Some(cancel) = self.mining.take() {
            cancel.cancel();
        }
    }

    /// Applies the result of `job`. A solution is kept only if the chain tip
    /// has not moved since the snapshot; transactions that arrived meanwhile
    /// stay pending.
    pub fn finish_mining(&mut self, job: MiningJob, outcome: MineOutcome) -> MineOutcome {
        if self.mining.as_ref().is_some_and(|c| c.same_as(&job.cancel)) {
            self.mining = None;
        }

        let nonce = match outcome {
            MineOutcome::Found(nonce) => nonce,
            other => {
                debug!("{} mining ended without a solution: {:?}", self.name(), other);
                return other;
            }
        };
        if job.cancel.is_cancelled() || self.chain_tip.hash() != job.mined_on {
            debug!(
                "{} discarding nonce {} for stale block {}",
                self.name(),
                nonce,
                pretty_hash(job.draft.hash())
            );
            return MineOutcome::Cancelled;
        }

        self.seal(job.draft, nonce.clone());
        MineOutcome::Found(nonce)
    }

    /// Mines the pending pool on the current thread. On success the block is
    /// linked, a fresh pending pool started and the solution broadcast.
    pub fn mine_pending(&mut self) -> Option<String> {
        let job = self.start_mining();
        let outcome = job.run();
        self.finish_mining(job, outcome).solution().map(str::to_string)
    }

    fn seal(&mut self, draft: Block, nonce: String) {
        let reward = Transaction::new([(self.addresses[0].clone(), self.config.reward)]);
        debug!(
            "{} solved block {} with nonce {}, reward {}",
            self.name(),
            pretty_hash(draft.hash()),
            nonce,
            pretty_hash(&reward.hash)
        );

        let carried: Vec<Arc<Transaction>> = self
            .pending
            .transactions()
            .iter()
            .filter(|t| !draft.has_transaction(&t.hash))
            .cloned()
            .collect();

        self.chain_tip = self.chain_tip.add_next(draft.seal(nonce, reward));
        self.pending = Block::with_transactions(carried).with_target(self.config.target);
        info!(
            "{} mined block {} at height {}",
            self.name(),
            pretty_hash(self.chain_tip.hash()),
            self.chain_tip.height()
        );

        match Envelope::solution(&self.chain_tip).and_then(|env| env.to_json()) {
            Ok(data) => {
                self.broadcast(&data);
            }
            Err(e) => warn!("{} could not encode its solution: {}", self.name(), e),
        }
    }
}
