use std::sync::Arc;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use spotter_core::{
    error::ProtocolError,
    ledger::Ledger,
    signer::TransactionSigner,
    transaction::{Receipt, SignedTransaction, Transaction, TransactionSpec},
};

use crate::{
    confirm::ConfirmationWaiter,
    error_classifier::SendErrorClassifier,
    gas_cache::GasEstimationCache,
    metrics::{record_broadcast, record_rejection},
    nonce::NonceTracker,
};

pub const DEFAULT_GAS_PRICE: u128 = 100_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastOptions {
    /// Legacy gas price in wei
    pub gas_price: u128,
    pub chain_id: Option<u64>,
}

impl Default for BroadcastOptions {
    fn default() -> Self {
        Self {
            gas_price: DEFAULT_GAS_PRICE,
            chain_id: None,
        }
    }
}

/// Builds, signs and submits legacy transactions, then hands them to the confirmation waiter.
///
/// A transaction moves `TransactionSpec -> Transaction -> SignedTransaction -> Receipt`;
/// each step consumes or borrows the previous shape so a transaction cannot be signed
/// before it has gas, or confirmed before it was submitted.
pub struct TransactionBroadcaster<L> {
    ledger: Arc<L>,
    gas_cache: GasEstimationCache,
    nonces: NonceTracker<L>,
    confirmations: ConfirmationWaiter<L>,
    options: BroadcastOptions,
    flow: &'static str,
}

impl<L> Clone for TransactionBroadcaster<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            gas_cache: self.gas_cache.clone(),
            nonces: self.nonces.clone(),
            confirmations: self.confirmations.clone(),
            options: self.options.clone(),
            flow: self.flow,
        }
    }
}

impl<L: Ledger> TransactionBroadcaster<L> {
    pub fn new(
        ledger: Arc<L>,
        gas_cache: GasEstimationCache,
        nonces: NonceTracker<L>,
        confirmations: ConfirmationWaiter<L>,
        options: BroadcastOptions,
    ) -> Self {
        Self {
            ledger,
            gas_cache,
            nonces,
            confirmations,
            options,
            flow: "work",
        }
    }

    /// Label under which submissions are counted in metrics
    pub fn for_flow(mut self, flow: &'static str) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.options.gas_price = gas_price;
        self
    }

    pub fn nonces(&self) -> &NonceTracker<L> {
        &self.nonces
    }

    pub fn confirmations(&self) -> &ConfirmationWaiter<L> {
        &self.confirmations
    }

    pub fn options(&self) -> &BroadcastOptions {
        &self.options
    }

    pub fn build(
        &self,
        spec: TransactionSpec,
        from: Address,
        nonce: u64,
    ) -> Result<Transaction, ProtocolError> {
        let to = spec.to.ok_or_else(|| ProtocolError::Build {
            message: "transaction has no recipient".to_string(),
        })?;

        Ok(Transaction {
            from,
            to,
            data: spec.data,
            value: spec.value,
            gas: None,
            gas_price: self.options.gas_price,
            nonce,
            chain_id: self.options.chain_id,
        })
    }

    /// Fills in `transaction.gas` from the shared cache, estimating on a miss
    pub async fn estimate_gas(&self, transaction: &mut Transaction) -> Result<(), ProtocolError> {
        let gas = self
            .gas_cache
            .estimate(&*transaction, self.ledger.estimate_gas(&*transaction))
            .await
            .inspect_err(|e| {
                tracing::error!(from = %transaction.from, error = %e, "Gas estimation failed")
            })?;

        transaction.gas = Some(gas);
        Ok(())
    }

    /// Signs and sends exactly once. Any failure of the send is terminal for this transaction.
    #[tracing::instrument(skip_all, fields(from = %transaction.from, nonce = transaction.nonce, flow = self.flow))]
    pub async fn submit(
        &self,
        transaction: Transaction,
        signer: &impl TransactionSigner,
    ) -> Result<SignedTransaction, ProtocolError> {
        let signed = signer.sign_transaction(&transaction)?;

        match self.ledger.send_raw_transaction(&signed.raw).await {
            Ok(hash) => {
                if hash != signed.hash {
                    tracing::warn!(
                        local_hash = ?signed.hash,
                        node_hash = ?hash,
                        "Node reported a different transaction hash"
                    );
                }
                record_broadcast(self.flow);
                tracing::info!(transaction_hash = ?signed.hash, "Transaction broadcast");
                Ok(signed)
            }
            Err(e) => {
                let error = SendErrorClassifier::into_broadcast_error(e);
                if let ProtocolError::Broadcast { rejection, .. } = &error {
                    record_rejection(self.flow, *rejection);
                    tracing::error!(
                        transaction_hash = ?signed.hash,
                        rejection = ?rejection,
                        may_have_landed = SendErrorClassifier::may_have_landed(*rejection),
                        error = %error,
                        "Transaction rejected"
                    );
                }
                Err(error)
            }
        }
    }

    /// Full flow: read nonce, build, estimate, submit, wait for confirmation
    #[tracing::instrument(skip_all, fields(from = %signer.address(), flow = self.flow))]
    pub async fn send(
        &self,
        spec: TransactionSpec,
        signer: &impl TransactionSigner,
    ) -> Result<Receipt, ProtocolError> {
        let from = signer.address();
        let nonce = self.nonces.current(from).await?;

        let mut transaction = self.build(spec, from, nonce)?;
        self.estimate_gas(&mut transaction).await?;

        let signed = self.submit(transaction, signer).await?;
        self.confirmations
            .await_confirmation(signed.hash, from, signed.nonce)
            .await
    }
}
