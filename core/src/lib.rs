pub mod chain;
pub mod error;
pub mod gateway;
pub mod keystore;
pub mod ledger;
pub mod signer;
pub mod transaction;
