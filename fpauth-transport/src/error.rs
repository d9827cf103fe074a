//! Transport errors

use std::io;

use fpauth_core::FramingError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame arrived malformed or incomplete; the channel is still usable
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Connection closed by remote")]
    ConnectionClosed,

    /// Channel accepted only part of a frame
    #[error("Short write: {written} of {expected} bytes")]
    WriteFailed {
        written: usize,
        expected: usize,
    },

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Check if the session must be torn down and the channel reopened
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Framing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_is_not_fatal() {
        let framing = Error::from(FramingError::EmptyFrame);
        assert!(!framing.is_fatal());
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(Error::WriteFailed { written: 1, expected: 5 }.is_fatal());
    }
}
