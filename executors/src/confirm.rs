use std::{sync::Arc, time::Duration};

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use spotter_core::{error::ProtocolError, ledger::Ledger, transaction::Receipt};
use tokio::time::Instant;

use crate::{metrics::record_confirmation, nonce::NonceTracker};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long and how often to look for a receipt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationOptions {
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub nonce_attempts: u32,
    /// Pause before the first nonce read
    pub settle_delay_secs: u64,
}

impl Default for ConfirmationOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            poll_interval_secs: 20,
            nonce_attempts: 10,
            settle_delay_secs: 0,
        }
    }
}

impl ConfirmationOptions {
    /// Faucet transfers give the pool a few seconds before the first nonce read
    pub fn faucet() -> Self {
        Self {
            settle_delay_secs: 3,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Waits for a submitted transaction: first a cheap nonce-increment heuristic, then a
/// bounded receipt poll. Neither step is ever retried on its own.
pub struct ConfirmationWaiter<L> {
    ledger: Arc<L>,
    nonces: NonceTracker<L>,
    options: ConfirmationOptions,
}

impl<L> Clone for ConfirmationWaiter<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            nonces: self.nonces.clone(),
            options: self.options.clone(),
        }
    }
}

impl<L: Ledger> ConfirmationWaiter<L> {
    pub fn new(ledger: Arc<L>, nonces: NonceTracker<L>, options: ConfirmationOptions) -> Self {
        Self {
            ledger,
            nonces,
            options,
        }
    }

    pub fn options(&self) -> &ConfirmationOptions {
        &self.options
    }

    pub fn with_options(&self, options: ConfirmationOptions) -> Self {
        Self {
            options,
            ..self.clone()
        }
    }

    #[tracing::instrument(skip_all, fields(transaction_hash = ?transaction_hash, address = %address, baseline = baseline))]
    pub async fn await_confirmation(
        &self,
        transaction_hash: B256,
        address: Address,
        baseline: u64,
    ) -> Result<Receipt, ProtocolError> {
        let started = Instant::now();
        let result = self.wait(transaction_hash, address, baseline).await;

        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(ProtocolError::Reverted { .. }) => "reverted",
            Err(ProtocolError::TimedOut { .. }) => "timed_out",
            Err(_) => "failed",
        };
        record_confirmation(outcome, started.elapsed().as_secs_f64());

        result
    }

    async fn wait(
        &self,
        transaction_hash: B256,
        address: Address,
        baseline: u64,
    ) -> Result<Receipt, ProtocolError> {
        if self.options.settle_delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(self.options.settle_delay_secs)).await;
        }

        match self
            .nonces
            .wait_for_increment(address, baseline, self.options.nonce_attempts)
            .await
        {
            Ok(true) => tracing::debug!("Nonce incremented, fetching receipt"),
            Ok(false) => tracing::warn!(
                attempts = self.options.nonce_attempts,
                "Nonce did not increment, falling back to receipt polling"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Nonce check failed, falling back to receipt polling"
            ),
        }

        let receipt = self.poll_receipt(transaction_hash).await?;
        if !receipt.success {
            tracing::error!(block_number = ?receipt.block_number, "Transaction reverted");
            return Err(ProtocolError::Reverted { transaction_hash });
        }

        tracing::info!(
            block_number = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "Transaction confirmed"
        );
        Ok(receipt)
    }

    async fn poll_receipt(&self, transaction_hash: B256) -> Result<Receipt, ProtocolError> {
        let deadline = Instant::now() + self.options.timeout();

        loop {
            match self.ledger.get_transaction_receipt(transaction_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => tracing::trace!("Receipt not available yet"),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(error = %e, "Receipt read failed, will poll again")
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ProtocolError::TimedOut {
                    transaction_hash,
                    waited_secs: self.options.timeout_secs,
                });
            }
            let interval = self.options.poll_interval().max(MIN_POLL_INTERVAL);
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }
}
