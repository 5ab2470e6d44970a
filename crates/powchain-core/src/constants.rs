pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Protocol version stamped on every wire document.
pub const VERSION: &str = "0.1.0";
/// Amount paid to the first address of a node that solves a block.
pub const SOLUTION_REWARD: f64 = 1.0;
pub const DEFAULT_TARGET: u32 = 1;
pub const DEFAULT_MINE_START: u64 = 0;
pub const DEFAULT_MINE_END: u64 = 2000;
pub(crate) const RANDOM_ID_MIN: u32 = 2;
pub(crate) const RANDOM_ID_MAX: u32 = 20_000_000;
