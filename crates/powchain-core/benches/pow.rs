use criterion::{criterion_group, criterion_main, Criterion};
use powchain_core::{Block, Miner, Transaction};
use std::sync::Arc;

fn bench_pow(c: &mut Criterion) {
    c.bench_function("search_target_3", |b| {
        let txs: Vec<Arc<Transaction>> = (0..10)
            .map(|i| Arc::new(Transaction::new([(format!("alice-{i}"), i as f64)])))
            .collect();
        let block = Block::with_transactions(txs).with_target(3);

        b.iter(|| {
            let _nonce = Miner::search(&block, 0, 1_000_000);
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
