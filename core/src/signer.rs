use alloy::{
    consensus::{SignableTransaction, TxEnvelope},
    eips::eip2718::Encodable2718,
    network::TxSignerSync,
    primitives::Address,
    signers::local::PrivateKeySigner,
};

use crate::{
    error::ProtocolError,
    transaction::{SignedTransaction, Transaction},
};

/// Opaque signing capability: turns a fully built transaction into raw bytes
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    fn sign_transaction(&self, transaction: &Transaction)
    -> Result<SignedTransaction, ProtocolError>;
}

impl TransactionSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        alloy::signers::Signer::address(self)
    }

    fn sign_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SignedTransaction, ProtocolError> {
        let signer_address = TransactionSigner::address(self);
        if transaction.from != signer_address {
            return Err(ProtocolError::Signing {
                message: format!(
                    "transaction is from {} but the key belongs to {}",
                    transaction.from, signer_address
                ),
            });
        }

        let mut legacy = transaction.to_legacy()?;
        let signature =
            self.sign_transaction_sync(&mut legacy)
                .map_err(|e| ProtocolError::Signing {
                    message: e.to_string(),
                })?;

        let envelope = TxEnvelope::from(legacy.into_signed(signature));
        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
            nonce: transaction.nonce,
        })
    }
}
