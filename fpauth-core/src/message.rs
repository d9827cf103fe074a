//! Typed payloads carried inside frames
//!
//! ```text
//! Handshake: [stage:u8]{ack:u32 BE, only for ACK and SYN_ACK}
//! Auth:      [op:u8][len:u32 BE][utf8 bytes: len]
//! Debug:     [utf8 text]{optional trailing NUL}
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    error::FramingError,
    frame::{wire_len, Frame},
    kind::{AuthOp, HandshakeStage, PacketKind},
};

/// Handshake payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeMessage {
    pub stage: HandshakeStage,

    /// Present iff `stage` is `Ack` or `SynAck`
    pub ack: Option<u32>,
}

impl HandshakeMessage {
    /// Size of a payload without an ack number
    pub const SHORT_LEN: usize = 1;

    /// Size of a payload with an ack number
    pub const LONG_LEN: usize = 5;

    pub fn syn() -> Self {
        Self { stage: HandshakeStage::Syn, ack: None }
    }

    pub fn ack(ack: u32) -> Self {
        Self { stage: HandshakeStage::Ack, ack: Some(ack) }
    }

    pub fn syn_ack(ack: u32) -> Self {
        Self { stage: HandshakeStage::SynAck, ack: Some(ack) }
    }

    /// Encode payload bytes
    ///
    /// The ack number is written only for stages that carry one; a missing
    /// ack on such a stage is written as zero.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LONG_LEN);
        buf.put_u8(self.stage.into());

        if self.stage.carries_ack() {
            buf.put_u32(self.ack.unwrap_or(0));
        }

        buf.freeze()
    }

    /// Decode payload bytes
    ///
    /// # Errors
    ///
    /// [`FramingError::BadHandshakeLength`] unless the payload is exactly one
    /// byte for `Syn`/`Invalid` or exactly five bytes for `Ack`/`SynAck`.
    pub fn decode(mut payload: &[u8]) -> Result<Self, FramingError> {
        let len = payload.len();
        if len == 0 {
            return Err(FramingError::BadHandshakeLength(len));
        }

        let stage = HandshakeStage::from(payload.get_u8());

        match (stage.carries_ack(), len) {
            (false, Self::SHORT_LEN) => Ok(Self { stage, ack: None }),
            (true, Self::LONG_LEN) => Ok(Self {
                stage,
                ack: Some(payload.get_u32()),
            }),
            _ => Err(FramingError::BadHandshakeLength(len)),
        }
    }
}

impl fmt::Display for HandshakeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ack {
            Some(ack) => write!(f, "{}(ack={})", self.stage, ack),
            None => write!(f, "{}", self.stage),
        }
    }
}

impl From<HandshakeMessage> for Frame {
    fn from(message: HandshakeMessage) -> Self {
        Frame::new(PacketKind::Handshake, message.encode())
    }
}

/// Auth payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMessage {
    pub op: AuthOp,

    /// Username for requests, outcome text for responses
    pub payload: String,
}

impl AuthMessage {
    /// Size of op byte plus string length
    pub const HEADER_LEN: usize = 5;

    pub fn new(op: AuthOp, payload: impl Into<String>) -> Self {
        Self {
            op,
            payload: payload.into(),
        }
    }

    /// Encode payload bytes
    pub fn encode(&self) -> Bytes {
        let text = self.payload.as_bytes();
        let mut buf = BytesMut::with_capacity(Self::HEADER_LEN + text.len());

        buf.put_u8(self.op.into());
        buf.put_u32(wire_len(text.len()));
        buf.put_slice(text);

        buf.freeze()
    }

    /// Decode payload bytes
    ///
    /// Bytes past the declared string length are ignored.
    ///
    /// # Errors
    ///
    /// - [`FramingError::Truncated`] if the header or the string is short
    /// - [`FramingError::InvalidUtf8`] if the string is not UTF-8
    pub fn decode(mut payload: &[u8]) -> Result<Self, FramingError> {
        if payload.len() < Self::HEADER_LEN {
            return Err(FramingError::Truncated {
                expected: Self::HEADER_LEN,
                actual: payload.len(),
            });
        }

        let op = AuthOp::from(payload.get_u8());
        let declared = payload.get_u32() as usize;

        if payload.len() < declared {
            return Err(FramingError::Truncated {
                expected: declared,
                actual: payload.len(),
            });
        }

        let text = std::str::from_utf8(&payload[..declared])
            .map_err(|_| FramingError::InvalidUtf8)?;

        Ok(Self::new(op, text))
    }
}

impl fmt::Display for AuthMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.op, self.payload)
    }
}

impl From<AuthMessage> for Frame {
    fn from(message: AuthMessage) -> Self {
        Frame::new(PacketKind::Auth, message.encode())
    }
}

/// Decode Debug payload text
///
/// Strips exactly one trailing NUL; invalid UTF-8 is replaced rather than
/// rejected since the text is only ever logged.
pub fn decode_debug(payload: &[u8]) -> String {
    let text = payload.strip_suffix(&[0]).unwrap_or(payload);
    String::from_utf8_lossy(text).into_owned()
}

/// A frame classified by kind with its payload decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Debug(String),
    Handshake(HandshakeMessage),
    Auth(AuthMessage),

    /// Kind this endpoint does not understand; payload kept for diagnostics
    Undefined(Bytes),
}

impl Message {
    /// Classify a frame and decode its payload
    pub fn from_frame(frame: &Frame) -> Result<Self, FramingError> {
        match frame.kind {
            PacketKind::Debug => Ok(Self::Debug(decode_debug(&frame.payload))),
            PacketKind::Handshake => HandshakeMessage::decode(&frame.payload).map(Self::Handshake),
            PacketKind::Auth => AuthMessage::decode(&frame.payload).map(Self::Auth),
            PacketKind::Undefined => Ok(Self::Undefined(frame.payload.clone())),
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Debug(text) => Frame::debug(text),
            Message::Handshake(handshake) => handshake.into(),
            Message::Auth(auth) => auth.into(),
            Message::Undefined(payload) => Frame::new(PacketKind::Undefined, payload),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug(text) => write!(f, "DEBUG {:?}", text),
            Self::Handshake(handshake) => write!(f, "HANDSHAKE {}", handshake),
            Self::Auth(auth) => write!(f, "AUTH {}", auth),
            Self::Undefined(payload) => write!(f, "UNDEFINED ({} bytes)", payload.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_handshake_lengths() {
        assert_eq!(HandshakeMessage::syn().encode().len(), 1);
        assert_eq!(HandshakeMessage::ack(1).encode().len(), 5);
        assert_eq!(&HandshakeMessage::syn_ack(0x01020304).encode()[..], &[3, 1, 2, 3, 4]);
    }

    #[test]
    fn test_handshake_decode_stage_without_ack() {
        assert_eq!(HandshakeMessage::decode(&[1]).unwrap(), HandshakeMessage::syn());

        let invalid = HandshakeMessage::decode(&[9]).unwrap();
        assert_eq!(invalid.stage, HandshakeStage::Invalid);
        assert_eq!(invalid.ack, None);
    }

    #[test]
    fn test_handshake_bad_lengths() {
        // SYN_ACK without its ack number
        assert_eq!(HandshakeMessage::decode(&[3]), Err(FramingError::BadHandshakeLength(1)));
        // SYN with an ack number
        assert_eq!(
            HandshakeMessage::decode(&[1, 0, 0, 0, 0]),
            Err(FramingError::BadHandshakeLength(5))
        );
        assert_eq!(HandshakeMessage::decode(&[]), Err(FramingError::BadHandshakeLength(0)));
        assert_eq!(
            HandshakeMessage::decode(&[2, 0, 0]),
            Err(FramingError::BadHandshakeLength(3))
        );
    }

    #[test]
    fn test_auth_layout() {
        let message = AuthMessage::new(AuthOp::CheckUser, "alice");
        assert_eq!(
            &message.encode()[..],
            &[2, 0, 0, 0, 5, b'a', b'l', b'i', b'c', b'e']
        );
    }

    #[test]
    fn test_auth_short_string() {
        let result = AuthMessage::decode(&[2, 0, 0, 0, 5, b'a', b'l']);
        assert_eq!(result, Err(FramingError::Truncated { expected: 5, actual: 2 }));
    }

    #[test]
    fn test_auth_short_header() {
        let result = AuthMessage::decode(&[2, 0]);
        assert!(matches!(result, Err(FramingError::Truncated { expected: 5, .. })));
    }

    #[test]
    fn test_auth_trailing_bytes_ignored() {
        let decoded = AuthMessage::decode(&[3, 0, 0, 0, 2, b'O', b'K', 4, 0, 0]).unwrap();
        assert_eq!(decoded, AuthMessage::new(AuthOp::CheckUserResponse, "OK"));
    }

    #[test]
    fn test_auth_invalid_utf8() {
        let result = AuthMessage::decode(&[0, 0, 0, 0, 2, 0xFF, 0xFE]);
        assert_eq!(result, Err(FramingError::InvalidUtf8));
    }

    #[test]
    fn test_auth_unknown_op_clamped() {
        let decoded = AuthMessage::decode(&[42, 0, 0, 0, 0]).unwrap();
        assert_eq!(decoded.op, AuthOp::Invalid);
    }

    #[test]
    fn test_debug_strips_one_nul() {
        assert_eq!(decode_debug(b"USB PLUGGED\0"), "USB PLUGGED");
        assert_eq!(decode_debug(b"x\0\0"), "x\0");
        assert_eq!(decode_debug(b"plain"), "plain");
    }

    #[test]
    fn test_message_classification() {
        let frame: Frame = HandshakeMessage::syn_ack(0).into();
        assert_eq!(
            Message::from_frame(&frame).unwrap(),
            Message::Handshake(HandshakeMessage::syn_ack(0))
        );

        let frame = Frame::new(PacketKind::Undefined, vec![1u8, 2]);
        assert!(matches!(Message::from_frame(&frame), Ok(Message::Undefined(p)) if p.len() == 2));

        let frame = Frame::new(PacketKind::Handshake, vec![3u8]);
        assert!(Message::from_frame(&frame).is_err());
    }

    proptest! {
        #[test]
        fn prop_syn_payload_is_one_byte(_seed in any::<u8>()) {
            prop_assert_eq!(HandshakeMessage::syn().encode().len(), 1);
        }

        #[test]
        fn prop_ack_payload_is_five_bytes(ack in any::<u32>(), syn_ack in any::<bool>()) {
            let message = if syn_ack {
                HandshakeMessage::syn_ack(ack)
            } else {
                HandshakeMessage::ack(ack)
            };
            let encoded = message.encode();

            prop_assert_eq!(encoded.len(), 5);
            prop_assert_eq!(HandshakeMessage::decode(&encoded).unwrap(), message);
        }

        #[test]
        fn prop_auth_message_survives_framing(op in 0u8..6, name in "\\PC{0,32}") {
            let message = AuthMessage::new(AuthOp::from(op), name);
            let frame: Frame = message.clone().into();
            let decoded = Frame::decode(frame.encode()).unwrap();

            prop_assert_eq!(Message::from_frame(&decoded).unwrap(), Message::Auth(message));
        }
    }
}
