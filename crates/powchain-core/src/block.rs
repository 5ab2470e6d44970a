use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{DEFAULT_TARGET, VERSION};
use crate::error::Result;
use crate::hash::{pretty_hash, random_hash};
use crate::pow;
use crate::transaction::{Amount, Transaction, TransactionDoc};

/// A set of confirmed transactions linked to its predecessor.
///
/// An unsolved `Block` is a node's pending pool: it accumulates transactions
/// and is the next mining candidate. Once solved it is moved behind an `Arc`
/// by [`Block::add_next`] and never changes again.
pub struct Block {
    pub version: String,
    hash: String,
    transactions: Vec<Arc<Transaction>>,
    gen_transaction: Option<Transaction>,
    puzzle: String,
    target: u32,
    solution: Option<String>,
    prev: Option<Arc<Block>>,
    // Forward cache only; traversal always walks `prev`.
    next: Mutex<Weak<Block>>,
}

/// Wire form of a solved [`Block`]. Confirmed transactions travel by hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockDoc {
    pub version: String,
    pub hash: String,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub gen_transaction: Option<TransactionDoc>,
    #[serde(default)]
    pub transactions: Vec<String>,
}

impl Block {
    /// An empty block with a fresh hash and the default target.
    pub fn new() -> Self {
        Self::with_transactions(Vec::new())
    }

    /// A root block: no predecessor, no reward, no transactions.
    pub fn genesis() -> Self {
        Self::new()
    }

    pub fn with_transactions(transactions: Vec<Arc<Transaction>>) -> Self {
        let mut block = Self {
            version: VERSION.to_string(),
            hash: random_hash(),
            transactions: Vec::with_capacity(transactions.len()),
            gen_transaction: None,
            puzzle: String::new(),
            target: DEFAULT_TARGET,
            solution: None,
            prev: None,
            next: Mutex::new(Weak::new()),
        };
        for tx in transactions {
            block.add_transaction(tx);
        }
        block
    }

    pub fn with_target(mut self, target: u32) -> Self {
        self.target = target;
        self
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn transactions(&self) -> &[Arc<Transaction>] {
        &self.transactions
    }

    pub fn gen_transaction(&self) -> Option<&Transaction> {
        self.gen_transaction.as_ref()
    }

    pub fn puzzle(&self) -> &str {
        &self.puzzle
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn solution(&self) -> Option<&str> {
        self.solution.as_deref()
    }

    pub fn prev(&self) -> Option<&Arc<Block>> {
        self.prev.as_ref()
    }

    pub fn next(&self) -> Option<Arc<Block>> {
        self.next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Appends `tx` unless a transaction with the same hash is already
    /// present. Returns whether it was added.
    pub fn add_transaction(&mut self, tx: Arc<Transaction>) -> bool {
        if self.has_transaction(&tx.hash) {
            return false;
        }
        self.transactions.push(tx);
        self.update_puzzle();
        true
    }

    pub fn has_transaction(&self, hash: &str) -> bool {
        self.transactions.iter().any(|t| t.hash == hash)
    }

    /// Drops every transaction that `confirmed` already carries.
    pub fn remove_confirmed(&mut self, confirmed: &Block) -> usize {
        let before = self.transactions.len();
        self.transactions
            .retain(|t| !confirmed.has_transaction(&t.hash));
        let removed = before - self.transactions.len();
        if removed > 0 {
            self.update_puzzle();
        }
        removed
    }

    fn update_puzzle(&mut self) {
        self.puzzle = self.transactions.iter().map(|t| t.hash.as_str()).collect();
    }

    /// Checks `nonce` (or the stored solution) against the target. False when
    /// there is nothing to check.
    pub fn verify(&self, nonce: Option<&str>) -> bool {
        match nonce.or(self.solution.as_deref()) {
            Some(nonce) => pow::meets_target(&self.puzzle, nonce, self.target),
            None => false,
        }
    }

    /// Records the winning nonce and the miner's reward on an unlinked block.
    pub fn seal(mut self, solution: String, gen_transaction: Transaction) -> Self {
        self.solution = Some(solution);
        self.gen_transaction = Some(gen_transaction);
        self
    }

    /// Links `block` after `self` and returns the shared handle to it.
    pub fn add_next(self: &Arc<Self>, mut block: Block) -> Arc<Block> {
        block.prev = Some(Arc::clone(self));
        let block = Arc::new(block);
        *self.next.lock().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(&block);
        block
    }

    /// `self` followed by each predecessor down to genesis.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            current: Some(self),
        }
    }

    /// Number of predecessors; genesis is height 0.
    pub fn height(&self) -> usize {
        self.ancestors().count() - 1
    }

    pub fn block_in_past(&self, hash: &str) -> bool {
        self.ancestors().any(|b| b.hash == hash)
    }

    pub fn transaction_in_past(&self, hash: &str) -> bool {
        self.ancestors().any(|b| b.has_transaction(hash))
    }

    /// Everything paid to `address` from `self` back to genesis, rewards included.
    pub fn value_for_address(&self, address: &str) -> Amount {
        self.ancestors()
            .map(|b| {
                let reward = b
                    .gen_transaction
                    .as_ref()
                    .map_or(0.0, |g| g.value_for_address(address));
                reward
                    + b.transactions
                        .iter()
                        .map(|t| t.value_for_address(address))
                        .sum::<Amount>()
            })
            .sum()
    }

    pub fn to_wire(&self) -> BlockDoc {
        BlockDoc {
            version: self.version.clone(),
            hash: self.hash.clone(),
            solution: self.solution.clone(),
            gen_transaction: self.gen_transaction.as_ref().map(Transaction::to_wire),
            transactions: self.transactions.iter().map(|t| t.hash.clone()).collect(),
        }
    }

    /// Rebuilds a block from its wire form, attaching only the transactions
    /// found in `known`. Hashes with no match are dropped.
    pub fn from_wire(doc: BlockDoc, known: &[Arc<Transaction>]) -> Result<Self> {
        let gen_transaction = doc.gen_transaction.map(Transaction::from_wire).transpose()?;

        let mut transactions = Vec::with_capacity(doc.transactions.len());
        let mut unresolved = 0usize;
        for hash in &doc.transactions {
            match known.iter().find(|t| &t.hash == hash) {
                Some(tx) => transactions.push(Arc::clone(tx)),
                None => unresolved += 1,
            }
        }
        if unresolved > 0 {
            debug!(
                "block {} references {} unknown transaction(s)",
                pretty_hash(&doc.hash),
                unresolved
            );
        }

        let mut block = Self::with_transactions(transactions);
        block.version = doc.version;
        block.hash = doc.hash;
        block.solution = doc.solution;
        block.gen_transaction = gen_transaction;
        Ok(block)
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies an unlinked block, e.g. to mine a snapshot of the pending pool.
/// The forward cache is not copied.
impl Clone for Block {
    fn clone(&self) -> Self {
        Self {
            version: self.version.clone(),
            hash: self.hash.clone(),
            transactions: self.transactions.clone(),
            gen_transaction: self.gen_transaction.clone(),
            puzzle: self.puzzle.clone(),
            target: self.target,
            solution: self.solution.clone(),
            prev: self.prev.clone(),
            next: Mutex::new(Weak::new()),
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("hash", &pretty_hash(&self.hash))
            .field("transactions", &self.transactions.len())
            .field("target", &self.target)
            .field("solution", &self.solution)
            .field("prev", &self.prev.as_ref().map(|p| pretty_hash(&p.hash)))
            .finish()
    }
}

// Unlink long chains iteratively so dropping a tip does not recurse once per block.
impl Drop for Block {
    fn drop(&mut self) {
        let mut prev = self.prev.take();
        while let Some(block) = prev {
            match Arc::try_unwrap(block) {
                Ok(mut inner) => prev = inner.prev.take(),
                Err(_) => break,
            }
        }
    }
}

pub struct Ancestors<'a> {
    current: Option<&'a Block>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;
        self.current = block.prev.as_deref();
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::Miner;
    use crate::transaction::Transaction;

    fn tx(address: &str, amount: Amount) -> Arc<Transaction> {
        Arc::new(Transaction::new([(address, amount)]))
    }

    fn solved(block: Block) -> Block {
        let nonce = Miner::search(&block, 0, 5000).expect("target 1 is solvable");
        block.seal(nonce, Transaction::new([("miner", 1.0)]))
    }

    #[test]
    fn puzzle_is_concatenated_hashes() {
        let (a, b) = (tx("alice", 1.0), tx("bob", 2.0));
        let block = Block::with_transactions(vec![a.clone(), b.clone()]);
        assert_eq!(block.puzzle(), format!("{}{}", a.hash, b.hash));
        assert_eq!(Block::new().puzzle(), "");
    }

    #[test]
    fn add_transaction_is_idempotent_by_hash() {
        let a = tx("alice", 1.0);
        let mut block = Block::new();
        assert!(block.add_transaction(a.clone()));
        let puzzle = block.puzzle().to_string();

        let mut twin = Transaction::new([("mallory", 99.0)]);
        twin.hash = a.hash.clone();
        assert!(!block.add_transaction(a.clone()));
        assert!(!block.add_transaction(Arc::new(twin)));
        assert_eq!(block.len(), 1);
        assert_eq!(block.puzzle(), puzzle);
        assert!(block.has_transaction(&a.hash));
    }

    #[test]
    fn verify_is_deterministic() {
        let block = Block::with_transactions(vec![tx("alice", 1.0)]).with_target(1);
        for nonce in 0..200 {
            let nonce = nonce.to_string();
            let first = block.verify(Some(&nonce));
            assert_eq!(first, block.verify(Some(&nonce)));
            assert_eq!(first, pow::meets_target(block.puzzle(), &nonce, 1));
        }
    }

    #[test]
    fn verify_without_solution_is_false() {
        assert!(!Block::new().verify(None));
    }

    #[test]
    fn verify_uses_stored_solution() {
        let block = solved(Block::with_transactions(vec![tx("alice", 1.0)]));
        assert!(block.verify(None));
    }

    #[test]
    fn ancestor_lookup() {
        let genesis = Arc::new(Block::genesis());
        let genesis_hash = genesis.hash().to_string();
        let b1 = genesis.add_next(solved(Block::new()));
        let b2 = b1.add_next(solved(Block::new()));
        let tip = b2.add_next(solved(Block::new()));

        assert!(tip.block_in_past(&genesis_hash));
        assert!(tip.block_in_past(b1.hash()));
        assert!(tip.block_in_past(tip.hash()));
        assert!(!tip.block_in_past("nonexistent"));
        assert!(!b1.block_in_past(tip.hash()));
        assert_eq!(tip.height(), 3);
    }

    #[test]
    fn add_next_links_both_ways() {
        let genesis = Arc::new(Block::genesis());
        let child = genesis.add_next(Block::new());
        assert_eq!(child.prev().map(|p| p.hash()), Some(genesis.hash()));
        assert_eq!(genesis.next().map(|n| n.hash().to_string()), Some(child.hash().to_string()));
    }

    #[test]
    fn value_for_address_walks_chain() {
        let genesis = Arc::new(Block::genesis());
        let b1 = genesis.add_next(
            Block::with_transactions(vec![tx("alice", 20.5)])
                .seal("0".into(), Transaction::new([("bob", 1.0)])),
        );
        let b2 = b1.add_next(
            Block::with_transactions(vec![tx("alice", 2.0), tx("bob", 4.0)])
                .seal("0".into(), Transaction::new([("alice", 1.0)])),
        );
        assert_eq!(b2.value_for_address("alice"), 23.5);
        assert_eq!(b2.value_for_address("bob"), 5.0);
        assert_eq!(b1.value_for_address("alice"), 20.5);
        assert_eq!(genesis.value_for_address("alice"), 0.0);
    }

    #[test]
    fn transaction_in_past_example() {
        let a = tx("alice", 1.0);
        let genesis = Arc::new(Block::genesis());
        let tip = genesis.add_next(solved(Block::with_transactions(vec![a.clone()])));
        assert!(tip.transaction_in_past(&a.hash));
        assert!(!genesis.transaction_in_past(&a.hash));
    }

    #[test]
    fn remove_confirmed_prunes_and_updates_puzzle() {
        let (a, b) = (tx("alice", 1.0), tx("bob", 1.0));
        let mut pending = Block::with_transactions(vec![a.clone(), b.clone()]);
        let confirmed = Block::with_transactions(vec![a.clone()]);
        assert_eq!(pending.remove_confirmed(&confirmed), 1);
        assert_eq!(pending.puzzle(), b.hash);
        assert_eq!(pending.remove_confirmed(&confirmed), 0);
    }

    #[test]
    fn wire_doc_shape() {
        let block = Block::new();
        let json = serde_json::to_value(block.to_wire()).unwrap();
        assert_eq!(json["solution"], serde_json::Value::Null);
        assert_eq!(json["gen_transaction"], serde_json::Value::Null);
        assert_eq!(json["transactions"], serde_json::json!([]));
        assert_eq!(json["version"], VERSION);
    }

    #[test]
    fn from_wire_resolves_known_transactions() {
        let (a, b) = (tx("alice", 1.0), tx("bob", 2.0));
        let block = solved(Block::with_transactions(vec![a.clone(), b.clone()]));
        let doc = block.to_wire();

        let full = Block::from_wire(doc.clone(), &[b.clone(), a.clone()]).unwrap();
        assert_eq!(full.hash(), block.hash());
        assert_eq!(full.puzzle(), block.puzzle());
        assert_eq!(full.solution(), block.solution());
        assert!(full.verify(None));
        assert_eq!(
            full.gen_transaction().map(|g| g.hash.clone()),
            block.gen_transaction().map(|g| g.hash.clone())
        );

        let partial = Block::from_wire(doc, &[a.clone()]).unwrap();
        assert_eq!(partial.len(), 1);
        assert_eq!(partial.puzzle(), a.hash);
    }

    #[test]
    fn dropping_a_long_chain_does_not_overflow() {
        let mut tip = Arc::new(Block::genesis());
        for _ in 0..100_000 {
            tip = tip.add_next(Block::new());
        }
        assert_eq!(tip.height(), 100_000);
        drop(tip);
    }
}
