use std::{
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
};

use alloy::primitives::{Address, Bytes, U256};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use spotter_core::{
    error::ProtocolError,
    keystore::{Identity, validate_address},
    ledger::Ledger,
    transaction::{Receipt, TransactionSpec},
};

use crate::{
    broadcast::TransactionBroadcaster,
    confirm::{ConfirmationOptions, ConfirmationWaiter},
};

/// Number of faucet accounts sharing the base secret
pub const FAUCET_POOL_SIZE: u32 = 500;
/// Hex characters of the base secret; the last two key bytes are the account index
pub const FAUCET_BASE_SECRET_LEN: usize = 60;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetOptions {
    pub base_secret: String,
    pub amount_wei: U256,
    pub gas: u64,
    pub gas_price: u64,
    pub memo: String,
    /// Below this balance the worker asks the faucet for funds
    pub min_balance_wei: U256,
}

impl Default for FaucetOptions {
    fn default() -> Self {
        Self {
            base_secret: String::new(),
            amount_wei: U256::from(500_000_000_000_000u64),
            gas: 100_000,
            gas_price: 500_000,
            memo: "Hi Exorde!".to_string(),
            min_balance_wei: U256::from(1u64),
        }
    }
}

/// The faucet account at `index`: private key is the base secret followed by the
/// index as four hex digits.
pub fn derive_faucet_key(base_secret: &str, index: u32) -> Result<Identity, ProtocolError> {
    let base = base_secret.strip_prefix("0x").unwrap_or(base_secret);
    if base.len() != FAUCET_BASE_SECRET_LEN || !base.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProtocolError::Config {
            message: format!(
                "faucet base secret must be {FAUCET_BASE_SECRET_LEN} hex characters, got {}",
                base.len()
            ),
        });
    }
    if index >= FAUCET_POOL_SIZE {
        return Err(ProtocolError::Config {
            message: format!("faucet index {index} is outside the pool of {FAUCET_POOL_SIZE}"),
        });
    }

    Identity::from_str(&format!("{base}{index:04x}"))
}

/// Chooses which faucet account serves a request
pub trait IndexSource: Send + Sync {
    /// An index in `[0, pool_size)`
    fn pick(&self, pool_size: u32) -> u32;
}

/// Uniform choice, seeded from OS entropy unless a seed is given
pub struct RandomIndexSource {
    rng: Mutex<StdRng>,
}

impl Default for RandomIndexSource {
    fn default() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }
}

impl RandomIndexSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IndexSource for RandomIndexSource {
    fn pick(&self, pool_size: u32) -> u32 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..pool_size)
    }
}

/// Funds a worker address from one of the sharded faucet accounts
pub struct FaucetFunder<L, S = RandomIndexSource> {
    ledger: Arc<L>,
    broadcaster: TransactionBroadcaster<L>,
    confirmations: ConfirmationWaiter<L>,
    index_source: S,
    options: FaucetOptions,
}

impl<L: Ledger, S: IndexSource> FaucetFunder<L, S> {
    pub fn new(
        ledger: Arc<L>,
        broadcaster: TransactionBroadcaster<L>,
        index_source: S,
        options: FaucetOptions,
    ) -> Self {
        let confirmations = broadcaster.confirmations().with_options(ConfirmationOptions {
            settle_delay_secs: ConfirmationOptions::faucet().settle_delay_secs,
            ..broadcaster.confirmations().options().clone()
        });

        Self {
            ledger,
            broadcaster: broadcaster.for_flow("faucet"),
            confirmations,
            index_source,
            options,
        }
    }

    /// Sends one faucet transfer to `worker_address` and waits for it.
    /// An invalid address fails before anything is sent to the ledger.
    #[tracing::instrument(skip(self))]
    pub async fn fund(&self, worker_address: &str) -> Result<Receipt, ProtocolError> {
        if !validate_address(worker_address) {
            tracing::error!("Invalid worker address");
            return Err(ProtocolError::InvalidAddress {
                address: worker_address.to_string(),
            });
        }
        let worker = Address::from_str(worker_address).map_err(|_| ProtocolError::InvalidAddress {
            address: worker_address.to_string(),
        })?;

        let index = self.index_source.pick(FAUCET_POOL_SIZE);
        let faucet = derive_faucet_key(&self.options.base_secret, index)?;
        tracing::info!(faucet_index = index, faucet = %faucet.address(), "Selected faucet");

        let nonce = self.broadcaster.nonces().current(faucet.address()).await?;
        let mut transaction = self.broadcaster.build(
            TransactionSpec {
                to: Some(worker),
                data: Bytes::from(self.options.memo.clone().into_bytes()),
                value: self.options.amount_wei,
            },
            faucet.address(),
            nonce,
        )?;
        transaction.gas = Some(self.options.gas);
        transaction.gas_price = self.options.gas_price as u128;

        let signed = self.broadcaster.submit(transaction, &faucet).await?;
        let receipt = self
            .confirmations
            .await_confirmation(signed.hash, faucet.address(), nonce)
            .await?;

        tracing::info!(
            transaction_hash = ?receipt.transaction_hash,
            "SFUEL funding transaction confirmed"
        );
        Ok(receipt)
    }

    /// Funds `worker` only if its balance is under `min_balance`. An unreadable balance
    /// counts as zero.
    pub async fn ensure_funded(
        &self,
        worker: Address,
        min_balance: U256,
    ) -> Result<Option<Receipt>, ProtocolError> {
        let balance = self.ledger.get_balance(worker).await.unwrap_or_else(|e| {
            tracing::warn!(worker = %worker, error = %e, "Failed to read balance, assuming zero");
            U256::ZERO
        });

        if balance >= min_balance {
            tracing::debug!(worker = %worker, balance = %balance, "Worker balance is sufficient");
            return Ok(None);
        }

        tracing::info!(worker = %worker, balance = %balance, "Worker balance is low, requesting faucet funds");
        self.fund(&worker.to_checksum(None)).await.map(Some)
    }

    pub fn options(&self) -> &FaucetOptions {
        &self.options
    }
}
