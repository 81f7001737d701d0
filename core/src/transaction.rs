use alloy::{
    consensus::TxLegacy,
    network::ReceiptResponse,
    primitives::{Address, B256, Bytes, TxKind, U256},
    rpc::types::TransactionRequest,
};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// What the caller wants to happen on chain, before nonce and gas are known
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSpec {
    pub to: Option<Address>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
}

impl TransactionSpec {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
            value: U256::ZERO,
        }
    }

    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to: Some(to),
            data: Bytes::new(),
            value,
        }
    }
}

/// A legacy transaction being built. `gas` stays unset until estimation fills it in.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
    pub gas_price: u128,
    pub nonce: u64,
    pub chain_id: Option<u64>,
}

impl Transaction {
    /// Request shape used for `eth_estimateGas`
    pub fn to_request(&self) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .from(self.from)
            .to(self.to)
            .value(self.value)
            .input(self.data.clone().into())
            .nonce(self.nonce)
            .gas_price(self.gas_price);
        if let Some(gas) = self.gas {
            request = request.gas_limit(gas);
        }
        request
    }

    /// Converts into the consensus type that gets signed. Fails if gas was never filled in.
    pub fn to_legacy(&self) -> Result<TxLegacy, ProtocolError> {
        let gas_limit = self.gas.ok_or_else(|| ProtocolError::Build {
            message: format!(
                "transaction from {} with nonce {} has no gas limit",
                self.from, self.nonce
            ),
        })?;

        Ok(TxLegacy {
            chain_id: self.chain_id,
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit,
            to: TxKind::Call(self.to),
            value: self.value,
            input: self.data.clone(),
        })
    }
}

/// Raw signed bytes ready for `eth_sendRawTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
    pub nonce: u64,
}

/// The part of a transaction receipt the worker cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

impl From<alloy::rpc::types::TransactionReceipt> for Receipt {
    fn from(receipt: alloy::rpc::types::TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            success: receipt.status(),
        }
    }
}
