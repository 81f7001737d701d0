use fixtures::*;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use alloy::consensus::Transaction as _;
use alloy::primitives::{Address, U256};
use spotter_core::error::ProtocolError;
use spotter_executors::faucet::{
    FAUCET_POOL_SIZE, FaucetFunder, FaucetOptions, IndexSource, RandomIndexSource,
    derive_faucet_key,
};
use tokio::time::Instant;

const WORKER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

/// Replays a fixed sequence of indices
struct FixedIndices(Mutex<Vec<u32>>);

impl FixedIndices {
    fn new(indices: impl IntoIterator<Item = u32>) -> Self {
        let mut indices: Vec<u32> = indices.into_iter().collect();
        indices.reverse();
        Self(Mutex::new(indices))
    }
}

impl IndexSource for FixedIndices {
    fn pick(&self, _pool_size: u32) -> u32 {
        self.0.lock().unwrap().pop().unwrap()
    }
}

fn options() -> FaucetOptions {
    FaucetOptions {
        base_secret: FAUCET_BASE.to_string(),
        ..FaucetOptions::default()
    }
}

fn funder<S: IndexSource>(ledger: &Arc<MockLedger>, source: S) -> FaucetFunder<MockLedger, S> {
    FaucetFunder::new(ledger.clone(), broadcaster(ledger), source, options())
}

#[tokio::test]
async fn test_invalid_address_makes_no_remote_call() {
    let ledger = Arc::new(MockLedger::new());
    let funder = funder(&ledger, FixedIndices::new([1]));

    for address in [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeA",
        "not an address",
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD",
    ] {
        let err = funder.fund(address).await.unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidAddress {
                address: address.to_string()
            }
        );
    }

    assert_eq!(ledger.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fund_sends_a_fixed_transfer_from_the_selected_faucet() {
    setup_tracing();
    let faucet = derive_faucet_key(FAUCET_BASE, 42).unwrap().address();
    let ledger = Arc::new(
        MockLedger::new()
            .with_nonce(faucet, 11)
            .tracking(faucet)
            .with_auto_mine(true),
    );
    let funder = funder(&ledger, FixedIndices::new([42]));

    let started = Instant::now();
    let receipt = funder.fund(WORKER).await.unwrap();

    // settle delay plus the first nonce poll
    assert_eq!(started.elapsed(), Duration::from_secs(4));
    assert!(receipt.success);

    let sent = ledger.sent_envelopes();
    assert_eq!(sent.len(), 1);
    let tx = &sent[0];
    assert_eq!(tx.nonce(), 11);
    assert_eq!(tx.gas_limit(), 100_000);
    assert_eq!(tx.gas_price(), Some(500_000));
    assert_eq!(tx.value(), U256::from(500_000_000_000_000u64));
    assert_eq!(tx.to(), Some(WORKER.parse::<Address>().unwrap()));
    assert_eq!(tx.input().as_ref(), b"Hi Exorde!");
    assert_eq!(ledger.calls_to("estimate_gas"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_funded_worker_is_left_alone() {
    let worker: Address = WORKER.parse().unwrap();
    let ledger = Arc::new(MockLedger::new().with_balance(worker, U256::from(10u64)));
    let funder = funder(&ledger, FixedIndices::new([]));

    let funded = funder.ensure_funded(worker, U256::from(1u64)).await.unwrap();
    assert!(funded.is_none());
    assert_eq!(ledger.calls_to("send_raw_transaction"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_balance_counts_as_empty() {
    let worker: Address = WORKER.parse().unwrap();
    let faucet = derive_faucet_key(FAUCET_BASE, 0).unwrap().address();
    let ledger = Arc::new(MockLedger::new().tracking(faucet).with_auto_mine(true));
    *ledger.balance_error.lock().unwrap() = Some(ProtocolError::network("timeout"));
    let funder = funder(&ledger, FixedIndices::new([0]));

    let funded = funder.ensure_funded(worker, U256::from(1u64)).await.unwrap();
    assert!(funded.is_some());
    assert_eq!(ledger.calls_to("send_raw_transaction"), 1);
}

#[test]
fn test_faucet_selection_is_roughly_uniform() {
    let source = RandomIndexSource::from_seed(0x5eed);
    let draws = 10_000;
    let mut counts = vec![0u32; FAUCET_POOL_SIZE as usize];

    for _ in 0..draws {
        let index = source.pick(FAUCET_POOL_SIZE);
        assert!(index < FAUCET_POOL_SIZE);
        counts[index as usize] += 1;
    }

    let expected = draws as f64 / FAUCET_POOL_SIZE as f64;
    let chi_square: f64 = counts
        .iter()
        .map(|&observed| (observed as f64 - expected).powi(2) / expected)
        .sum();

    // 499 degrees of freedom; the 0.1% critical value is about 603
    assert!(chi_square < 620.0, "chi-square {chi_square}");
    assert!(counts.iter().all(|&count| count > 0));
}
