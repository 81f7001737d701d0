use std::sync::Arc;

use alloy::primitives::Address;
use spotter_core::{error::ProtocolError, ledger::Ledger};

use crate::backoff::LinearBackoff;

/// Reads the account transaction counter. Nothing is cached; every call is a fresh read.
pub struct NonceTracker<L> {
    ledger: Arc<L>,
    backoff: LinearBackoff,
}

impl<L> Clone for NonceTracker<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            backoff: self.backoff.clone(),
        }
    }
}

impl<L: Ledger> NonceTracker<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self::with_backoff(ledger, LinearBackoff::default())
    }

    pub fn with_backoff(ledger: Arc<L>, backoff: LinearBackoff) -> Self {
        Self { ledger, backoff }
    }

    pub async fn current(&self, address: Address) -> Result<u64, ProtocolError> {
        self.ledger
            .get_transaction_count(address)
            .await
            .inspect_err(|e| tracing::error!(address = %address, error = %e, "Failed to read nonce"))
    }

    /// Sleeps then polls, up to `max_attempts` times, until the counter exceeds `baseline`.
    /// Returns `false` when it never did.
    #[tracing::instrument(skip(self), fields(address = %address))]
    pub async fn wait_for_increment(
        &self,
        address: Address,
        baseline: u64,
        max_attempts: u32,
    ) -> Result<bool, ProtocolError> {
        for attempt in 0..max_attempts {
            tokio::time::sleep(self.backoff.delay(attempt)).await;

            let count = self.current(address).await?;
            if count > baseline {
                tracing::debug!(attempt, count, "Nonce moved past baseline");
                return Ok(true);
            }
            tracing::trace!(attempt, count, "Nonce not yet incremented");
        }

        Ok(false)
    }
}
