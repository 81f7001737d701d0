use std::future::Future;

use alloy::{
    primitives::{Address, B256, Bytes, U256},
    providers::Provider,
    rpc::types::TransactionRequest,
};

use crate::{
    chain::{Chain, SpotterChain},
    error::{AlloyRpcErrorToProtocolError, ProtocolError},
    transaction::{Receipt, Transaction},
};

/// Remote ledger capability consumed by the executors.
///
/// Every method is a single round trip. Retry and wait policies live in the callers.
pub trait Ledger: Send + Sync {
    fn get_transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, ProtocolError>> + Send;

    fn estimate_gas(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<u64, ProtocolError>> + Send;

    /// Returns the transaction hash reported by the node
    fn send_raw_transaction(
        &self,
        raw: &Bytes,
    ) -> impl Future<Output = Result<B256, ProtocolError>> + Send;

    /// `None` while the transaction is not yet mined
    fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<Receipt>, ProtocolError>> + Send;

    fn get_balance(&self, address: Address)
    -> impl Future<Output = Result<U256, ProtocolError>> + Send;

    /// `eth_call` against the latest block
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = Result<Bytes, ProtocolError>> + Send;
}

impl Ledger for SpotterChain {
    async fn get_transaction_count(&self, address: Address) -> Result<u64, ProtocolError> {
        self.read_provider()
            .get_transaction_count(address)
            .await
            .map_err(|e| e.to_network_error(self))
    }

    async fn estimate_gas(&self, transaction: &Transaction) -> Result<u64, ProtocolError> {
        self.read_provider()
            .estimate_gas(transaction.to_request())
            .await
            .map_err(|e| ProtocolError::Estimation {
                message: e.to_network_error(self).to_string(),
            })
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ProtocolError> {
        let pending = self
            .write_provider()
            .send_raw_transaction(raw)
            .await
            .map_err(|e| {
                let mut error = e.to_network_error(self);
                if let ProtocolError::Network { rpc_url, .. } = &mut error {
                    *rpc_url = self.write_url().to_string();
                }
                error
            })?;

        Ok(*pending.tx_hash())
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, ProtocolError> {
        self.read_provider()
            .get_transaction_receipt(hash)
            .await
            .map(|receipt| receipt.map(Receipt::from))
            .map_err(|e| e.to_network_error(self))
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ProtocolError> {
        self.read_provider()
            .get_balance(address)
            .await
            .map_err(|e| e.to_network_error(self))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProtocolError> {
        let request = TransactionRequest::default().to(to).input(data.into());
        self.read_provider()
            .call(request)
            .await
            .map_err(|e| e.to_network_error(self))
    }
}
