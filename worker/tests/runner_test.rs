use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::sol_types::SolCall;
use spotter_core::error::ProtocolError;
use spotter_core::gateway::{DEFAULT_GATEWAYS, GatewayRotator};
use spotter_core::keystore::Identity;
use spotter_core::ledger::Ledger;
use spotter_core::transaction::{Receipt, Transaction};
use spotter_executors::broadcast::{BroadcastOptions, TransactionBroadcaster};
use spotter_executors::confirm::{ConfirmationOptions, ConfirmationWaiter};
use spotter_executors::faucet::{FaucetFunder, FaucetOptions, RandomIndexSource};
use spotter_executors::gas_cache::GasEstimationCache;
use spotter_executors::master::MasterClaimer;
use spotter_executors::nonce::NonceTracker;
use spotter_executors::work::{DataSpotting, WorkAvailabilityPoller};
use spotter_worker::runner::{MasterClaim, PollOutcome, Worker};

/// Answers contract reads from a queue and reports a healthy balance
#[derive(Default)]
struct StubLedger {
    call_results: Mutex<VecDeque<Result<Bytes, ProtocolError>>>,
    sends: Mutex<usize>,
}

impl Ledger for StubLedger {
    async fn get_transaction_count(&self, _address: Address) -> Result<u64, ProtocolError> {
        Ok(0)
    }

    async fn estimate_gas(&self, _transaction: &Transaction) -> Result<u64, ProtocolError> {
        Ok(21_000)
    }

    async fn send_raw_transaction(&self, _raw: &Bytes) -> Result<B256, ProtocolError> {
        *self.sends.lock().unwrap() += 1;
        Err(ProtocolError::network("not expected in these tests"))
    }

    async fn get_transaction_receipt(&self, _hash: B256) -> Result<Option<Receipt>, ProtocolError> {
        Ok(None)
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, ProtocolError> {
        Ok(U256::from(10u64).pow(U256::from(18u64)))
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, ProtocolError> {
        self.call_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProtocolError::network("no scripted call result")))
    }
}

fn broadcaster(ledger: &Arc<StubLedger>) -> TransactionBroadcaster<StubLedger> {
    let nonces = NonceTracker::new(ledger.clone());
    let confirmations =
        ConfirmationWaiter::new(ledger.clone(), nonces.clone(), ConfirmationOptions::default());
    TransactionBroadcaster::new(
        ledger.clone(),
        GasEstimationCache::default(),
        nonces,
        confirmations,
        BroadcastOptions::default(),
    )
}

fn worker(ledger: &Arc<StubLedger>) -> Worker<StubLedger, RandomIndexSource> {
    let broadcaster = broadcaster(ledger);

    Worker {
        identity: Identity::random(),
        master: None,
        faucet: FaucetFunder::new(
            ledger.clone(),
            broadcaster,
            RandomIndexSource::from_seed(1),
            FaucetOptions::default(),
        ),
        poller: WorkAvailabilityPoller::new(ledger.clone(), Address::repeat_byte(0xd5)),
        gateways: GatewayRotator::default(),
        reputation: None,
        poll_interval: Duration::from_secs(30),
    }
}

#[tokio::test]
async fn test_idle_when_no_work_is_available() {
    let ledger = Arc::new(StubLedger::default());
    ledger.call_results.lock().unwrap().push_back(Ok(
        DataSpotting::IsNewWorkAvailableCall::abi_encode_returns(&false).into(),
    ));

    assert_eq!(worker(&ledger).poll_once().await.unwrap(), PollOutcome::Idle);
}

#[tokio::test]
async fn test_batch_content_is_returned() {
    let ledger = Arc::new(StubLedger::default());
    let content = vec!["QmA".to_string(), "QmB".to_string()];
    {
        let mut results = ledger.call_results.lock().unwrap();
        results.push_back(Ok(
            DataSpotting::IsNewWorkAvailableCall::abi_encode_returns(&true).into(),
        ));
        results.push_back(Ok(
            DataSpotting::GetCurrentWorkCall::abi_encode_returns(&U256::from(3)).into(),
        ));
        results.push_back(Ok(
            DataSpotting::getIPFShashesForBatchCall::abi_encode_returns(&content).into(),
        ));
    }

    let outcome = worker(&ledger).poll_once().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Batch {
            batch_id: U256::from(3),
            content,
            urls: vec![
                format!("{}QmA", DEFAULT_GATEWAYS[0]),
                format!("{}QmB", DEFAULT_GATEWAYS[1]),
            ],
        }
    );
}

fn push_batch(ledger: &StubLedger, batch_id: u64, content: &[&str]) {
    let content: Vec<String> = content.iter().map(|cid| cid.to_string()).collect();
    let mut results = ledger.call_results.lock().unwrap();
    results.push_back(Ok(
        DataSpotting::IsNewWorkAvailableCall::abi_encode_returns(&true).into(),
    ));
    results.push_back(Ok(
        DataSpotting::GetCurrentWorkCall::abi_encode_returns(&U256::from(batch_id)).into(),
    ));
    results.push_back(Ok(
        DataSpotting::getIPFShashesForBatchCall::abi_encode_returns(&content).into(),
    ));
}

fn urls(outcome: PollOutcome) -> Vec<String> {
    match outcome {
        PollOutcome::Batch { urls, .. } => urls,
        PollOutcome::Idle => panic!("expected a batch"),
    }
}

#[tokio::test]
async fn test_gateway_rotation_continues_across_polls() {
    let ledger = Arc::new(StubLedger::default());
    let worker = worker(&ledger);
    for batch_id in 0..DEFAULT_GATEWAYS.len() as u64 + 1 {
        push_batch(&ledger, batch_id, &["QmOnly"]);
    }

    let mut seen = Vec::new();
    for _ in 0..=DEFAULT_GATEWAYS.len() {
        seen.extend(urls(worker.poll_once().await.unwrap()));
    }

    let expected: Vec<String> = DEFAULT_GATEWAYS
        .iter()
        .chain(DEFAULT_GATEWAYS.iter().take(1))
        .map(|gateway| format!("{gateway}QmOnly"))
        .collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_invalid_master_address_stops_bootstrap() {
    let ledger = Arc::new(StubLedger::default());
    let mut worker = worker(&ledger);
    worker.master = Some(MasterClaim {
        claimer: MasterClaimer::new(broadcaster(&ledger), Address::repeat_byte(0xa4)),
        address: "0x1234".to_string(),
    });

    let err = worker.bootstrap().await.unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidAddress { .. }));
    assert_eq!(*ledger.sends.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_failed_master_claim_is_not_fatal() {
    let ledger = Arc::new(StubLedger::default());
    let mut worker = worker(&ledger);
    worker.master = Some(MasterClaim {
        claimer: MasterClaimer::new(broadcaster(&ledger), Address::repeat_byte(0xa4)),
        address: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
    });

    worker.bootstrap().await.unwrap();
    assert_eq!(*ledger.sends.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_funded_worker_bootstraps_without_faucet() {
    let ledger = Arc::new(StubLedger::default());

    worker(&ledger).bootstrap().await.unwrap();
    assert_eq!(*ledger.sends.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown() {
    let ledger = Arc::new(StubLedger::default());
    let worker = worker(&ledger);

    // every poll fails; the loop must keep going until shutdown
    worker
        .run(tokio::time::sleep(Duration::from_secs(95)))
        .await;
}
