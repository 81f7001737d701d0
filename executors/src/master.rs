use std::str::FromStr;

use alloy::{primitives::Address, sol, sol_types::SolCall};
use spotter_core::{
    error::ProtocolError,
    keystore::validate_address,
    ledger::Ledger,
    signer::TransactionSigner,
    transaction::{Receipt, TransactionSpec},
};

use crate::broadcast::TransactionBroadcaster;

sol! {
    interface AddressManager {
        function ClaimMaster() external;
    }
}

/// Gas price the address manager claim is sent with
pub const CLAIM_MASTER_GAS_PRICE: u128 = 500_000;

/// Links the worker identity to the user's master address through the address manager
pub struct MasterClaimer<L> {
    broadcaster: TransactionBroadcaster<L>,
    contract: Address,
}

impl<L: Ledger> MasterClaimer<L> {
    pub fn new(broadcaster: TransactionBroadcaster<L>, contract: Address) -> Self {
        Self {
            broadcaster: broadcaster
                .for_flow("claim_master")
                .with_gas_price(CLAIM_MASTER_GAS_PRICE),
            contract,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn claim_spec(&self) -> TransactionSpec {
        TransactionSpec::call(self.contract, AddressManager::ClaimMasterCall {}.abi_encode())
    }

    /// Sends `ClaimMaster()` from `signer` and waits for it to be mined.
    /// An invalid master address fails before anything is sent to the ledger.
    #[tracing::instrument(skip(self, signer), fields(worker = %signer.address()))]
    pub async fn claim_master(
        &self,
        master: &str,
        signer: &impl TransactionSigner,
    ) -> Result<Receipt, ProtocolError> {
        if !validate_address(master) {
            tracing::error!("Invalid master address");
            return Err(ProtocolError::InvalidAddress {
                address: master.to_string(),
            });
        }
        let master_address =
            Address::from_str(master).map_err(|_| ProtocolError::InvalidAddress {
                address: master.to_string(),
            })?;
        tracing::info!(master = %master_address, "Master address is valid");

        let receipt = self.broadcaster.send(self.claim_spec(), signer).await?;
        tracing::info!(
            transaction_hash = ?receipt.transaction_hash,
            master = %master_address,
            "Master address claimed"
        );
        Ok(receipt)
    }
}
