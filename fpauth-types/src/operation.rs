//! Operations the host can request and sensor-side identifiers

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A credential operation requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Bind a new fingerprint to a username
    Enroll,

    /// Check a presented fingerprint
    Verify,

    /// Remove stored fingerprint bindings
    Revoke,
}

impl Operation {
    /// Get operation name
    pub fn name(self) -> &'static str {
        match self {
            Self::Enroll => "enroll",
            Self::Verify => "verify",
            Self::Revoke => "revoke",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enroll" | "set" => Ok(Self::Enroll),
            "verify" | "check" => Ok(Self::Verify),
            "revoke" | "delete" => Ok(Self::Revoke),
            other => Err(Error::Parse(format!("unknown operation: {other:?}"))),
        }
    }
}

/// Template slot identifier reported by the fingerprint sensor
///
/// Slot 0 is never a valid enrollment result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u16);

impl UserId {
    /// Check that the sensor returned a usable slot
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<u16> for UserId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operation_parse() {
        assert_eq!("enroll".parse::<Operation>().unwrap(), Operation::Enroll);
        assert_eq!(" Verify ".parse::<Operation>().unwrap(), Operation::Verify);
        assert_eq!("delete".parse::<Operation>().unwrap(), Operation::Revoke);
    }

    #[test]
    fn test_operation_parse_unknown() {
        let result = "format".parse::<Operation>();
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_user_id_validity() {
        assert!(!UserId(0).is_valid());
        assert!(UserId(17).is_valid());
        assert_eq!(UserId::from(42).to_string(), "#42");
    }
}
