use anyhow::{bail, Context, Result};
use clap::Parser;
use powchain_core::hash::pretty_hash;
use powchain_core::{MineOutcome, Transaction};
use powchain_node::{LocalNetwork, Node, NodeConfig, NodeId};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs an in-process network: node 0 pays node 1, node 1 mines the block,
/// and every node reports the balances it believes in.
#[derive(Parser, Debug)]
struct Args {
    /// Number of nodes, connected as a full mesh
    #[arg(long, default_value_t = 2)]
    nodes: usize,

    /// Amount node 0 sends to node 1
    #[arg(long, default_value_t = 20.5)]
    amount: f64,

    /// Leading hex zeros a solution needs
    #[arg(long)]
    target: Option<u32>,

    /// Exclusive upper bound of the nonce search
    #[arg(long)]
    mine_end: Option<u64>,

    /// JSON file with node defaults (target, mine_start, mine_end, reward)
    #[arg(long)]
    config: Option<String>,
}

impl Args {
    fn node_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {path}"))?;
                NodeConfig::from_json(&raw).with_context(|| format!("parsing config {path}"))?
            }
            None => NodeConfig::default(),
        };
        if let Some(target) = self.target {
            config.target = target;
        }
        if let Some(end) = self.mine_end {
            config.mine_end = end;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.nodes < 2 {
        bail!("need at least two nodes, got {}", args.nodes);
    }
    let base = args.node_config()?;

    let mut network = LocalNetwork::new();
    for i in 0..args.nodes {
        let config = NodeConfig {
            name: format!("client{}", i + 1),
            ..base.clone()
        };
        network.spawn(Node::new(config));
    }
    network.full_mesh()?;

    let sender = network.node(NodeId(0)).context("missing node 0")?;
    let miner = network.node(NodeId(1)).context("missing node 1")?;
    let recipient = miner.status().await?.addresses[0].clone();

    let tx = Transaction::new([(recipient, args.amount)]);
    info!("created transaction {}, broadcasting it", pretty_hash(&tx.hash));
    sender.submit_transaction(tx).await?;
    network.settle().await;

    info!("mining the block");
    match miner.mine().await? {
        MineOutcome::Found(nonce) => info!("block mined, puzzle solution: {nonce}"),
        other => bail!("mining did not succeed: {other:?}"),
    }
    network.settle().await;

    let everyone: Vec<_> = network.nodes().to_vec();
    for viewer in &everyone {
        for subject in &everyone {
            let addresses = subject.status().await?.addresses;
            let value = viewer.total_value_for(addresses).await?;
            if viewer.id() == subject.id() {
                println!("{} has {} coins", viewer.name(), value);
            } else {
                println!("{} thinks {} has {} coins", viewer.name(), subject.name(), value);
            }
        }
    }

    network.shutdown().await;
    Ok(())
}
