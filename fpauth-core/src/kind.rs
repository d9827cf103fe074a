//! Wire discriminants
//!
//! Out-of-range values are clamped to `Undefined`/`Invalid` rather than
//! rejected, so newer peers can add kinds without breaking older ones.

use std::fmt;

use fpauth_types::Operation;

/// Frame kind tag
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    Debug = 0,
    Handshake = 1,
    Auth = 2,
    Undefined = 3,
}

impl PacketKind {
    /// Get kind name
    pub fn name(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Handshake => "HANDSHAKE",
            Self::Auth => "AUTH",
            Self::Undefined => "UNDEFINED",
        }
    }
}

impl From<PacketKind> for u8 {
    fn from(kind: PacketKind) -> u8 {
        kind as u8
    }
}

impl From<u8> for PacketKind {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Debug,
            1 => Self::Handshake,
            2 => Self::Auth,
            _ => Self::Undefined,
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}

/// Handshake stage
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeStage {
    Invalid = 0,
    Syn = 1,
    Ack = 2,
    SynAck = 3,
}

impl HandshakeStage {
    /// Check if this stage carries an ack number on the wire
    pub fn carries_ack(self) -> bool {
        matches!(self, Self::Ack | Self::SynAck)
    }

    /// Get stage name
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Syn => "SYN",
            Self::Ack => "ACK",
            Self::SynAck => "SYN_ACK",
        }
    }
}

impl From<HandshakeStage> for u8 {
    fn from(stage: HandshakeStage) -> u8 {
        stage as u8
    }
}

impl From<u8> for HandshakeStage {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Syn,
            2 => Self::Ack,
            3 => Self::SynAck,
            _ => Self::Invalid,
        }
    }
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Auth operation code
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AuthOp {
    SetUser = 0,
    SetUserResponse = 1,
    CheckUser = 2,
    CheckUserResponse = 3,
    RevokeUser = 4,
    RevokeUserResponse = 5,
    Invalid = 6,
}

impl AuthOp {
    /// Request op that starts the given operation
    pub fn request_for(operation: Operation) -> Self {
        match operation {
            Operation::Enroll => Self::SetUser,
            Operation::Verify => Self::CheckUser,
            Operation::Revoke => Self::RevokeUser,
        }
    }

    /// Check if this is a request (host to device)
    pub fn is_request(self) -> bool {
        matches!(self, Self::SetUser | Self::CheckUser | Self::RevokeUser)
    }

    /// Check if this is a response (device to host)
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::SetUserResponse | Self::CheckUserResponse | Self::RevokeUserResponse
        )
    }

    /// Response op matching this request
    pub fn response(self) -> Option<Self> {
        match self {
            Self::SetUser => Some(Self::SetUserResponse),
            Self::CheckUser => Some(Self::CheckUserResponse),
            Self::RevokeUser => Some(Self::RevokeUserResponse),
            _ => None,
        }
    }

    /// Get op name
    pub fn name(self) -> &'static str {
        match self {
            Self::SetUser => "SET_USER",
            Self::SetUserResponse => "SET_USER_RESPONSE",
            Self::CheckUser => "CHECK_USER",
            Self::CheckUserResponse => "CHECK_USER_RESPONSE",
            Self::RevokeUser => "REVOKE_USER",
            Self::RevokeUserResponse => "REVOKE_USER_RESPONSE",
            Self::Invalid => "INVALID",
        }
    }
}

impl From<AuthOp> for u8 {
    fn from(op: AuthOp) -> u8 {
        op as u8
    }
}

impl From<u8> for AuthOp {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::SetUser,
            1 => Self::SetUserResponse,
            2 => Self::CheckUser,
            3 => Self::CheckUserResponse,
            4 => Self::RevokeUser,
            5 => Self::RevokeUserResponse,
            _ => Self::Invalid,
        }
    }
}

impl fmt::Display for AuthOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}
