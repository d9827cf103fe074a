//! High-level error types

use fpauth_types::Verdict;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] fpauth_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] fpauth_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] fpauth_types::Error),

    /// Host retry budget ran out
    #[error("No answer from device after {attempts} attempts")]
    Timeout {
        attempts: u32,
    },

    #[error("Could not open device: {0}")]
    Open(String),
}

impl Error {
    /// Check if the session is over and the channel must be reopened
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_fatal(),
            Self::Open(_) => true,
            _ => false,
        }
    }

    /// Check if this is Auth activity out of protocol order
    pub fn is_protocol_sequence(&self) -> bool {
        matches!(self, Self::Core(fpauth_core::Error::ProtocolSequence(_)))
    }

    /// Verdict a credential hook sees for this failure
    pub fn to_verdict(&self) -> Verdict {
        Verdict::Unavailable(self.to_string())
    }
}

impl From<fpauth_core::FramingError> for Error {
    fn from(e: fpauth_core::FramingError) -> Self {
        Self::Core(e.into())
    }
}
