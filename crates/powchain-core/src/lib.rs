//! Core data model for a small proof-of-work gossip ledger: transactions,
//! blocks linked into a chain, and the nonce search that seals them.

pub mod block;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod miner;
pub mod pow;
pub mod transaction;

pub use block::{Ancestors, Block, BlockDoc};
pub use crypto::{KeyPair, PublicKey, Signature};
pub use error::{LedgerError, Result};
pub use miner::{CancelToken, MineOutcome, Miner};
pub use transaction::{Amount, Transaction, TransactionDoc, TxInput};
