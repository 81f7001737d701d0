pub mod backoff;
pub mod broadcast;
pub mod confirm;
pub mod error_classifier;
pub mod faucet;
pub mod gas_cache;
pub mod master;
pub mod metrics;
pub mod nonce;
pub mod reputation;
pub mod work;
