//! Outcome reported to the credential hook

use std::fmt;

/// Tri-state result of one host-initiated operation
///
/// The credential hook maps this onto its own result codes. It never sees
/// framing internals, only the optional reason text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Fingerprint verified, or enroll/revoke succeeded
    Granted,

    /// Fingerprint rejected, or enroll/revoke failed on the device
    Denied,

    /// No trustworthy answer could be obtained
    Unavailable(String),
}

impl Verdict {
    /// Check if access was granted
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Check if the device could not be reached or did not answer
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Reason text for an unavailable verdict
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Unavailable(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted => f.write_str("granted"),
            Self::Denied => f.write_str("denied"),
            Self::Unavailable(reason) => write!(f, "unavailable: {}", reason),
        }
    }
}
