use std::{
    future::Future,
    ops::Deref,
    sync::atomic::{AtomicBool, Ordering},
};

use alloy::primitives::Bytes;
use moka::future::Cache;
use spotter_core::{error::ProtocolError, transaction::Transaction};

use crate::metrics::record_gas_cache_lookup;

/// Gas below this (after scaling) gets a flat bonus added
pub const SMALL_GAS_THRESHOLD: u64 = 100_000;
pub const SMALL_GAS_BONUS: u64 = 500_000;
/// No transaction is sent with a lower gas limit than this
pub const GAS_LIMIT_FLOOR: u64 = 10_000_000;

/// Transactions calling the same function with the same payload size share an estimate
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct GasCacheKey {
    pub selector: [u8; 4],
    pub payload_len: usize,
}

impl GasCacheKey {
    pub fn for_data(data: &Bytes) -> Self {
        let mut selector = [0u8; 4];
        let prefix = data.len().min(4);
        selector[..prefix].copy_from_slice(&data[..prefix]);
        Self {
            selector,
            payload_len: data.len(),
        }
    }
}

/// Turns a raw node estimate into the gas limit actually used
pub fn gas_limit_for(raw: u64) -> u64 {
    let scaled = raw.saturating_mul(3) / 2;
    let gas = if scaled < SMALL_GAS_THRESHOLD {
        scaled + SMALL_GAS_BONUS
    } else {
        scaled
    };
    gas.max(GAS_LIMIT_FLOOR)
}

/// Memoized gas limits, shared by every broadcaster that is handed a clone.
/// Entries only ever come from [`gas_limit_for`], so every cached limit respects the floor.
#[derive(Clone)]
pub struct GasEstimationCache {
    inner: Cache<GasCacheKey, u64>,
}

impl Default for GasEstimationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GasEstimationCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().build(),
        }
    }

    pub async fn get(&self, key: &GasCacheKey) -> Option<u64> {
        self.inner.get(key).await
    }

    /// Returns the cached gas limit for `transaction`'s shape, running `estimate` on a miss.
    /// Failed estimates are not cached.
    pub async fn estimate<F>(&self, transaction: &Transaction, estimate: F) -> Result<u64, ProtocolError>
    where
        F: Future<Output = Result<u64, ProtocolError>>,
    {
        let key = GasCacheKey::for_data(&transaction.data);
        let missed = AtomicBool::new(false);

        let gas = self
            .inner
            .try_get_with(key, async {
                missed.store(true, Ordering::Relaxed);
                let raw = estimate.await?;
                let limit = gas_limit_for(raw);
                tracing::debug!(
                    selector = ?key.selector,
                    payload_len = key.payload_len,
                    raw_estimate = raw,
                    gas_limit = limit,
                    "Cached new gas estimate"
                );
                Ok::<_, ProtocolError>(limit)
            })
            .await
            .map_err(|e| e.deref().clone())?;

        record_gas_cache_lookup(!missed.load(Ordering::Relaxed));
        Ok(gas)
    }
}
