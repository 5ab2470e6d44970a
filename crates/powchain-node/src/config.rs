use powchain_core::constants::{DEFAULT_MINE_END, DEFAULT_MINE_START, DEFAULT_TARGET, SOLUTION_REWARD};
use powchain_core::Amount;
use serde::{Deserialize, Serialize};

/// Per-node settings. Every node on a network must agree on `target`, since
/// solution documents do not carry it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub name: String,
    pub target: u32,
    pub mine_start: u64,
    pub mine_end: u64,
    pub reward: Amount,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "node".to_string(),
            target: DEFAULT_TARGET,
            mine_start: DEFAULT_MINE_START,
            mine_end: DEFAULT_MINE_END,
            reward: SOLUTION_REWARD,
        }
    }
}

impl NodeConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: u32) -> Self {
        self.target = target;
        self
    }

    pub fn with_mine_range(mut self, start: u64, end: u64) -> Self {
        self.mine_start = start;
        self.mine_end = end;
        self
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}
