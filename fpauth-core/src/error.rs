//! Error types for fpauth-core

use crate::handshake::HandshakeState;
use crate::kind::{AuthOp, HandshakeStage};
use crate::responder::AuthPhase;
use crate::sensor::SensorError;

/// Result type alias for fpauth operations
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed or truncated frame
///
/// Local to the failed decode: the session that produced it keeps running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// Fewer bytes available than the frame declares
    #[error("Frame truncated: expected {expected} bytes, got {actual} bytes")]
    Truncated {
        expected: usize,
        actual: usize,
    },

    /// Length prefix of zero leaves no room for the kind byte
    #[error("Frame length is zero")]
    EmptyFrame,

    /// Length prefix exceeds the configured limit
    #[error("Frame too large: {size} bytes (max: {max} bytes)")]
    FrameTooLarge {
        size: usize,
        max: usize,
    },

    /// Handshake payload length does not match its stage
    #[error("Bad handshake payload length: {0} bytes")]
    BadHandshakeLength(usize),

    /// Auth payload string is not valid UTF-8
    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame could not be decoded
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// Handshake message did not fit the current state; state was reset
    #[error("Handshake aborted: unexpected {stage} while {state}")]
    HandshakeAborted {
        stage: HandshakeStage,
        state: HandshakeState,
    },

    /// Auth traffic before the handshake completed, or out of order
    #[error("Protocol sequence error: {0}")]
    ProtocolSequence(String),

    /// A request arrived while another operation was running
    #[error("Operation in progress ({0}), request rejected")]
    OperationInProgress(AuthPhase),

    /// Auth op that a responder does not serve
    #[error("Unsupported auth request: {0}")]
    UnsupportedRequest(AuthOp),

    /// Sensor capability failure
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),
}

impl Error {
    /// Check if the operation in flight must be abandoned
    ///
    /// None of the core errors end a session; transport failures are
    /// reported by the transport crate.
    pub fn aborts_operation(&self) -> bool {
        matches!(
            self,
            Self::ProtocolSequence(_)
                | Self::HandshakeAborted { .. }
                | Self::Sensor(_)
        )
    }
}
