use std::{sync::Arc, time::Duration};

use spotter_core::{
    error::ProtocolError,
    gateway::GatewayRotator,
    keystore::KeyStore,
};
use spotter_executors::{
    broadcast::{BroadcastOptions, TransactionBroadcaster},
    confirm::ConfirmationWaiter,
    faucet::{FaucetFunder, RandomIndexSource},
    gas_cache::GasEstimationCache,
    master::MasterClaimer,
    metrics::{ExecutorMetrics, initialize_metrics},
    nonce::NonceTracker,
    reputation::ReputationReader,
    work::WorkAvailabilityPoller,
};
use spotter_worker::{
    config, metrics,
    runner::{MasterClaim, Worker},
};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::get_config()?;

    let subscriber = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "spotter_worker=debug,spotter_executors=debug,spotter_core=debug".into()
        }),
    );

    match config.server.log_format {
        config::LogFormat::Json => subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        config::LogFormat::Pretty => subscriber.with(tracing_subscriber::fmt::layer()).init(),
    }

    let registry = Arc::new(prometheus::Registry::new());
    initialize_metrics(ExecutorMetrics::new(&registry)?);
    if let Some(port) = config.monitoring.metrics_port {
        metrics::serve(&config.monitoring.host, port, registry.clone()).await?;
    }

    let key_path = match &config.keys.path {
        Some(path) => path.clone(),
        None => KeyStore::default_path()?,
    };
    let identity = KeyStore::new(key_path).load_or_create()?;
    tracing::info!(worker = %identity.address(), "Worker identity loaded");

    let ledger = Arc::new(config.chain.to_chain()?);
    tracing::info!("Ledger endpoints initialized");

    let nonces = NonceTracker::new(ledger.clone());
    let confirmations =
        ConfirmationWaiter::new(ledger.clone(), nonces.clone(), config.confirmation.clone());
    let broadcaster = TransactionBroadcaster::new(
        ledger.clone(),
        GasEstimationCache::default(),
        nonces,
        confirmations,
        BroadcastOptions {
            gas_price: config.gas.price as u128,
            chain_id: config.chain.chain_id,
        },
    );

    let master = match (&config.keys.master_address, config.contracts.address_manager) {
        (Some(address), Some(contract)) => Some(MasterClaim {
            claimer: MasterClaimer::new(broadcaster.clone(), contract),
            address: address.clone(),
        }),
        (Some(_), None) => {
            tracing::warn!(
                "Master address configured without contracts.address_manager, skipping claim"
            );
            None
        }
        (None, _) => None,
    };

    let reputation = if config.reputation.enabled {
        Some(ReputationReader::new(&config.reputation.leaderboard_url)?)
    } else {
        None
    };

    let worker = Worker {
        faucet: FaucetFunder::new(
            ledger.clone(),
            broadcaster,
            RandomIndexSource::default(),
            config.faucet.clone(),
        ),
        master,
        poller: WorkAvailabilityPoller::new(ledger, config.contracts.data_spotting),
        gateways: GatewayRotator::new(config.gateways.clone()),
        reputation,
        poll_interval: Duration::from_secs(config.work.poll_interval_secs.max(1)),
        identity,
    };

    if let Err(e @ ProtocolError::InvalidAddress { .. }) = worker.bootstrap().await {
        tracing::error!(error = %e, "Invalid worker or master address, exiting");
        std::process::exit(1);
    }

    tracing::info!("Worker started, polling for work");
    worker
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await;

    tracing::info!("Worker shut down");
    Ok(())
}
