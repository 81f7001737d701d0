use std::time::Duration;

use alloy::primitives::U256;
use spotter_core::{
    error::ProtocolError, gateway::GatewayRotator, keystore::Identity, ledger::Ledger,
};
use spotter_executors::{
    faucet::{FaucetFunder, IndexSource},
    master::MasterClaimer,
    reputation::ReputationReader,
    work::WorkAvailabilityPoller,
};

/// What one poll of the work contract found
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Idle,
    Batch {
        batch_id: U256,
        content: Vec<String>,
        /// One gateway URL per content identifier, continuing the rotation across polls
        urls: Vec<String>,
    },
}

/// The user address to claim and the contract to claim it on
pub struct MasterClaim<L> {
    pub claimer: MasterClaimer<L>,
    pub address: String,
}

/// The worker's long-running flow: funding, reputation, then polling for work
pub struct Worker<L, S> {
    pub identity: Identity,
    pub faucet: FaucetFunder<L, S>,
    /// Present when a master address is configured
    pub master: Option<MasterClaim<L>>,
    pub poller: WorkAvailabilityPoller<L>,
    pub gateways: GatewayRotator,
    pub reputation: Option<ReputationReader>,
    pub poll_interval: Duration,
}

impl<L: Ledger, S: IndexSource> Worker<L, S> {
    /// Makes sure the worker can pay for gas, claims its master and logs its standing.
    /// Only an invalid worker or master address is fatal.
    #[tracing::instrument(skip_all, fields(worker = %self.identity.address()))]
    pub async fn bootstrap(&self) -> Result<(), ProtocolError> {
        let min_balance = self.faucet.options().min_balance_wei;
        match self
            .faucet
            .ensure_funded(self.identity.address(), min_balance)
            .await
        {
            Ok(Some(receipt)) => tracing::info!(
                transaction_hash = ?receipt.transaction_hash,
                "Worker funded"
            ),
            Ok(None) => {}
            Err(e @ ProtocolError::InvalidAddress { .. }) => return Err(e),
            Err(e) => tracing::error!(error = %e, "Faucet funding failed, continuing unfunded"),
        }

        if let Some(master) = &self.master {
            match master
                .claimer
                .claim_master(&master.address, &self.identity)
                .await
            {
                Ok(_) => {}
                Err(e @ ProtocolError::InvalidAddress { .. }) => return Err(e),
                Err(e) => tracing::error!(error = %e, "Master claim failed, continuing"),
            }
        }

        if let Some(reputation) = &self.reputation {
            reputation.log_current(self.identity.address()).await;
        }

        Ok(())
    }

    pub async fn poll_once(&self) -> Result<PollOutcome, ProtocolError> {
        let worker = self.identity.address();
        if !self.poller.has_new_work(worker).await? {
            tracing::debug!("No new work available");
            return Ok(PollOutcome::Idle);
        }

        let batch_id = self.poller.current_work(worker).await?;
        let content = self.poller.ipfs_hashes_for_batch(batch_id).await?;
        tracing::info!(batch_id = %batch_id, items = content.len(), "New work batch");

        let urls: Vec<String> = content
            .iter()
            .map(|cid| self.gateways.next_content_url(cid))
            .collect();
        for (cid, url) in content.iter().zip(&urls) {
            tracing::debug!(cid = %cid, url = %url, "Batch content");
        }

        Ok(PollOutcome::Batch {
            batch_id,
            content,
            urls,
        })
    }

    /// Polls until `shutdown` resolves. Poll failures are logged and the next tick retries.
    pub async fn run(&self, shutdown: impl std::future::Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received, stopping work poller");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        if e.is_retryable() {
                            tracing::warn!(error = %e, "Work poll failed, retrying next tick");
                        } else {
                            tracing::error!(error = %e, "Work poll failed");
                        }
                    }
                }
            }
        }
    }
}
