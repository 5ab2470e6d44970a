//! The `{type, package}` wrapper every gossip message travels in.

use powchain_core::{Block, BlockDoc, Transaction, TransactionDoc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GossipError, Result};

pub const TRANSACTION: &str = "transaction";
pub const SOLUTION: &str = "solution";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub package: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Transaction(TransactionDoc),
    Solution(BlockDoc),
}

impl Envelope {
    pub fn new(kind: impl Into<String>, package: Value) -> Self {
        Self {
            kind: kind.into(),
            package,
        }
    }

    pub fn transaction(tx: &Transaction) -> Result<Self> {
        Ok(Self::new(TRANSACTION, serde_json::to_value(tx.to_wire())?))
    }

    pub fn solution(block: &Block) -> Result<Self> {
        Ok(Self::new(SOLUTION, serde_json::to_value(block.to_wire())?))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Decodes the package according to `type`.
    pub fn into_payload(self) -> Result<Payload> {
        match self.kind.as_str() {
            TRANSACTION => Ok(Payload::Transaction(serde_json::from_value(self.package)?)),
            SOLUTION => Ok(Payload::Solution(serde_json::from_value(self.package)?)),
            _ => Err(GossipError::UnknownBroadcastType(self.kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_envelope_shape() {
        let tx = Transaction::new([("bob", 20.5)]);
        let json: Value = serde_json::from_str(&Envelope::transaction(&tx).unwrap().to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "transaction");
        assert_eq!(json["package"]["hash"], tx.hash.as_str());
        assert_eq!(json["package"]["outputs"]["bob"], 20.5);
    }

    #[test]
    fn solution_envelope_decodes_to_block_doc() {
        let block = Block::new();
        let env = Envelope::solution(&block).unwrap();
        let back = Envelope::from_json(&env.to_json().unwrap()).unwrap();
        assert_eq!(back.into_payload().unwrap(), Payload::Solution(block.to_wire()));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let env = Envelope::new("DUMMY", Value::Null);
        assert!(matches!(
            env.into_payload(),
            Err(GossipError::UnknownBroadcastType(kind)) if kind == "DUMMY"
        ));
    }

    #[test]
    fn missing_type_is_unknown() {
        let env = Envelope::from_json(r#"{"package":{}}"#).unwrap();
        assert!(matches!(
            env.into_payload(),
            Err(GossipError::UnknownBroadcastType(kind)) if kind.is_empty()
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            Envelope::from_json("not json"),
            Err(GossipError::Malformed(_))
        ));
    }
}
