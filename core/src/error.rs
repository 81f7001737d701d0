use alloy::{
    primitives::B256,
    transports::{RpcError as AlloyRpcError, TransportErrorKind},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::Chain;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcErrorKind {
    /// Server returned an error response.
    #[error("server returned an error response: {}", .0.as_display())]
    ErrorResp(RpcErrorResponse),

    /// Server returned a null response when a non-null response was expected.
    #[error("server returned a null response when a non-null response was expected")]
    NullResp,

    /// Rpc server returned an unsupported feature.
    #[error("unsupported feature: {message}")]
    UnsupportedFeature { message: String },

    /// Returned when a local pre-processing step fails.
    #[error("local usage error: {message}")]
    InternalError { message: String },

    /// JSON serialization error.
    #[error("serialization error: {message}")]
    SerError { message: String },

    /// JSON deserialization error.
    #[error("deserialization error: {message}, text: {text}")]
    DeserError { message: String, text: String },

    #[error("HTTP error {status}")]
    TransportHttpError { status: u16, body: String },

    #[error("Other transport error: {message}")]
    OtherTransportError { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorResponse {
    /// The error code.
    pub code: i64,
    /// The error message (if any).
    pub message: String,
    /// The error data (if any).
    pub data: Option<String>,
}

impl RpcErrorResponse {
    pub fn as_display(&self) -> String {
        format!(
            "code {}: {}{}",
            self.code,
            self.message,
            self.data
                .as_ref()
                .map(|data| format!(", data: {data}"))
                .unwrap_or_default()
        )
    }
}

/// Why a node refused a raw transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    NonceTooLow,
    NonceTooHigh,
    AlreadyKnown,
    Underpriced,
    InsufficientFunds,
    GasLimit,
    PoolFull,
    /// No answer from the node; the transaction may or may not have been accepted
    Transport,
    Other,
}

/// Error taxonomy shared by every component of the worker protocol layer.
///
/// Only [`ProtocolError::Network`] is retryable. Everything else is terminal for the
/// attempt that produced it and must be surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "type")]
pub enum ProtocolError {
    #[error("Identity storage error at {path}: {message}")]
    Storage { path: String, message: String },

    #[error("RPC error on chain {chain_id:?} at {rpc_url}: {message}")]
    Network {
        chain_id: Option<u64>,
        rpc_url: String,
        message: String,
        kind: RpcErrorKind,
    },

    #[error("Gas estimation failed: {message}")]
    Estimation { message: String },

    #[error("Transaction build failed: {message}")]
    Build { message: String },

    #[error("Transaction signing failed: {message}")]
    Signing { message: String },

    #[error("Transaction rejected by the node ({rejection:?}): {message}")]
    Broadcast {
        message: String,
        rejection: RejectionKind,
    },

    #[error("Transaction {transaction_hash} not confirmed after {waited_secs}s")]
    TimedOut {
        transaction_hash: B256,
        waited_secs: u64,
    },

    #[error("Transaction {transaction_hash} was mined but reverted")]
    Reverted { transaction_hash: B256 },

    #[error("Invalid address: {address}")]
    InvalidAddress { address: String },

    #[error("Bad configuration: {message}")]
    Config { message: String },

    #[error("Failed to decode contract response of {function}: {message}")]
    Decode { function: String, message: String },
}

impl ProtocolError {
    /// Whether the same call may succeed if simply repeated later
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProtocolError::Network { .. })
    }

    pub fn storage(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        ProtocolError::Storage {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Builds a network error for ledgers that are not backed by an alloy transport
    pub fn network(message: impl Into<String>) -> Self {
        let message = message.into();
        ProtocolError::Network {
            chain_id: None,
            rpc_url: String::new(),
            kind: RpcErrorKind::OtherTransportError {
                message: message.clone(),
            },
            message,
        }
    }

    /// The structured RPC error response, if the node sent one
    pub fn rpc_response(&self) -> Option<&RpcErrorResponse> {
        match self {
            ProtocolError::Network {
                kind: RpcErrorKind::ErrorResp(response),
                ..
            } => Some(response),
            _ => None,
        }
    }
}

pub trait AlloyRpcErrorToProtocolError {
    fn to_network_error(&self, chain: &impl Chain) -> ProtocolError;
}

fn to_rpc_error_kind(err: &AlloyRpcError<TransportErrorKind>) -> RpcErrorKind {
    match err {
        AlloyRpcError::ErrorResp(err) => RpcErrorKind::ErrorResp(RpcErrorResponse {
            code: err.code,
            message: err.message.to_string(),
            data: err.data.as_ref().map(|data| data.to_string()),
        }),
        AlloyRpcError::NullResp => RpcErrorKind::NullResp,
        AlloyRpcError::UnsupportedFeature(feature) => RpcErrorKind::UnsupportedFeature {
            message: feature.to_string(),
        },
        AlloyRpcError::LocalUsageError(err) => RpcErrorKind::InternalError {
            message: err.to_string(),
        },
        AlloyRpcError::SerError(err) => RpcErrorKind::SerError {
            message: err.to_string(),
        },
        AlloyRpcError::DeserError { err, text } => RpcErrorKind::DeserError {
            message: err.to_string(),
            text: text.to_string(),
        },
        AlloyRpcError::Transport(err) => match err {
            TransportErrorKind::HttpError(err) => RpcErrorKind::TransportHttpError {
                status: err.status,
                body: err.body.to_string(),
            },
            _ => RpcErrorKind::OtherTransportError {
                message: err.to_string(),
            },
        },
    }
}

impl AlloyRpcErrorToProtocolError for AlloyRpcError<TransportErrorKind> {
    fn to_network_error(&self, chain: &impl Chain) -> ProtocolError {
        ProtocolError::Network {
            chain_id: chain.chain_id(),
            rpc_url: chain.read_url().to_string(),
            message: self.to_string(),
            kind: to_rpc_error_kind(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(ProtocolError::network("connection reset").is_retryable());
        assert!(
            !ProtocolError::TimedOut {
                transaction_hash: B256::ZERO,
                waited_secs: 120,
            }
            .is_retryable()
        );
        assert!(
            !ProtocolError::Broadcast {
                message: "nonce too low".to_string(),
                rejection: RejectionKind::NonceTooLow,
            }
            .is_retryable()
        );
        assert!(
            !ProtocolError::Estimation {
                message: "execution reverted".to_string(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn rpc_response_is_exposed_for_error_responses() {
        let error = ProtocolError::Network {
            chain_id: Some(1),
            rpc_url: "http://localhost:8545".to_string(),
            message: "nonce too low".to_string(),
            kind: RpcErrorKind::ErrorResp(RpcErrorResponse {
                code: -32000,
                message: "nonce too low".to_string(),
                data: None,
            }),
        };

        let response = error.rpc_response().expect("error response");
        assert_eq!(response.code, -32000);
        assert_eq!(response.as_display(), "code -32000: nonce too low");
        assert!(ProtocolError::network("timeout").rpc_response().is_none());
    }
}
