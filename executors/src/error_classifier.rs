use spotter_core::error::{ProtocolError, RejectionKind, RpcErrorKind};

/// Maps failures of `eth_sendRawTransaction` to a terminal [`ProtocolError::Broadcast`].
///
/// Submissions are never retried, so the classification only tells the caller (and the
/// logs) why the node refused and whether the transaction may still have reached the pool.
pub struct SendErrorClassifier;

impl SendErrorClassifier {
    pub fn classify(error: &ProtocolError) -> RejectionKind {
        match error {
            ProtocolError::Network {
                kind: RpcErrorKind::ErrorResp(response),
                ..
            } => Self::classify_message(&response.message),
            ProtocolError::Network { .. } => RejectionKind::Transport,
            ProtocolError::Broadcast { rejection, .. } => *rejection,
            other => Self::classify_message(&other.to_string()),
        }
    }

    /// Classify a node error message by the phrases geth-style nodes use
    pub fn classify_message(message: &str) -> RejectionKind {
        let msg_lower = message.to_lowercase();

        if msg_lower.contains("nonce too low") {
            RejectionKind::NonceTooLow
        } else if msg_lower.contains("nonce too high") {
            RejectionKind::NonceTooHigh
        } else if msg_lower.contains("already known") || msg_lower.contains("duplicate") {
            RejectionKind::AlreadyKnown
        } else if msg_lower.contains("underpriced") {
            RejectionKind::Underpriced
        } else if msg_lower.contains("insufficient funds") {
            RejectionKind::InsufficientFunds
        } else if msg_lower.contains("gas") {
            RejectionKind::GasLimit
        } else if msg_lower.contains("txpool") || msg_lower.contains("pool limit") {
            RejectionKind::PoolFull
        } else {
            RejectionKind::Other
        }
    }

    /// Whether the transaction may be in the pool despite the error
    pub fn may_have_landed(rejection: RejectionKind) -> bool {
        matches!(
            rejection,
            RejectionKind::NonceTooLow | RejectionKind::AlreadyKnown | RejectionKind::Transport
        )
    }

    pub fn into_broadcast_error(error: ProtocolError) -> ProtocolError {
        let rejection = Self::classify(&error);
        match error {
            ProtocolError::Broadcast { .. } => error,
            other => ProtocolError::Broadcast {
                message: other.to_string(),
                rejection,
            },
        }
    }
}
