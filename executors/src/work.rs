use std::sync::Arc;

use alloy::{
    primitives::{Address, U256},
    sol,
    sol_types::SolCall,
};
use spotter_core::{error::ProtocolError, ledger::Ledger, transaction::TransactionSpec};

sol! {
    interface DataSpotting {
        function IsNewWorkAvailable(address user_) external view returns (bool);
        function GetCurrentWork(address user_) external view returns (uint256);
        function getIPFShashesForBatch(uint256 batch_id_) external view returns (string[] memory);
        function SpotData(
            string[] memory file_hashs_,
            string[] memory URL_domains_,
            uint256[] memory item_counts_,
            string memory extra_
        ) external returns (bool);
    }
}

/// Source domain tag attached to spotted content
pub const DEFAULT_SOURCE_DOMAIN: &str = "1";
pub const DEFAULT_ITEM_COUNT: u64 = 100;

/// Read-only view of the work assigned to a worker. Every read is one `eth_call`;
/// polling cadence belongs to the caller.
pub struct WorkAvailabilityPoller<L> {
    ledger: Arc<L>,
    contract: Address,
}

impl<L> Clone for WorkAvailabilityPoller<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            contract: self.contract,
        }
    }
}

impl<L: Ledger> WorkAvailabilityPoller<L> {
    pub fn new(ledger: Arc<L>, contract: Address) -> Self {
        Self { ledger, contract }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    async fn call<C: SolCall>(&self, call: C) -> Result<C::Return, ProtocolError> {
        let output = self
            .ledger
            .call(self.contract, call.abi_encode().into())
            .await?;

        C::abi_decode_returns(&output).map_err(|e| ProtocolError::Decode {
            function: C::SIGNATURE.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn has_new_work(&self, worker: Address) -> Result<bool, ProtocolError> {
        self.call(DataSpotting::IsNewWorkAvailableCall { user_: worker })
            .await
    }

    pub async fn current_work(&self, worker: Address) -> Result<U256, ProtocolError> {
        self.call(DataSpotting::GetCurrentWorkCall { user_: worker })
            .await
    }

    pub async fn ipfs_hashes_for_batch(&self, batch_id: U256) -> Result<Vec<String>, ProtocolError> {
        self.call(DataSpotting::getIPFShashesForBatchCall { batch_id_: batch_id })
            .await
    }

    /// Submission payload for a single spotted content identifier
    pub fn spot_data(&self, cid: &str) -> TransactionSpec {
        let call = DataSpotting::SpotDataCall {
            file_hashs_: vec![cid.to_string()],
            URL_domains_: vec![DEFAULT_SOURCE_DOMAIN.to_string()],
            item_counts_: vec![U256::from(DEFAULT_ITEM_COUNT)],
            extra_: String::new(),
        };
        TransactionSpec::call(self.contract, call.abi_encode())
    }
}
